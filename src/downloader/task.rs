use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 下载任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 已创建，工作器尚未启动轮询
    Created,
    /// 等待元数据（magnet 已提交，种子信息未就绪）
    AwaitingMetadata,
    /// 传输中
    Transferring,
    /// 已暂停
    Paused,
    /// 已完成
    Completed,
    /// 失败
    Failed,
    /// 已取消
    Cancelled,
}

impl TaskStatus {
    /// 是否为终态（进入后任务不再变化）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// 下载任务记录
///
/// 唯一写者是持有它的工作器，其他持有方只读快照。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    /// 任务ID（进程内自增，不复用）
    pub id: u64,
    /// magnet 链接
    pub magnet: String,
    /// 保存目录
    pub save_path: PathBuf,
    /// 任务状态
    pub status: TaskStatus,
    /// 进度百分比 0-100，只增不减
    pub progress: u8,
    /// 下载速率 (KB/s，十进制)
    pub download_kbs: f64,
    /// 上传速率 (KB/s，十进制)
    pub upload_kbs: f64,
    /// 最近一条状态描述
    pub message: String,
    /// 创建时间 (Unix timestamp)
    pub created_at: i64,
    /// 结束时间 (Unix timestamp)
    pub finished_at: Option<i64>,
}

impl DownloadTask {
    pub fn new(id: u64, magnet: String, save_path: PathBuf) -> Self {
        Self {
            id,
            magnet,
            save_path,
            status: TaskStatus::Created,
            progress: 0,
            download_kbs: 0.0,
            upload_kbs: 0.0,
            message: "已创建".to_string(),
            created_at: chrono::Utc::now().timestamp(),
            finished_at: None,
        }
    }

    /// 更新进度，保证只增不减
    pub fn set_progress(&mut self, percent: u8) {
        self.progress = self.progress.max(percent.min(100));
    }

    /// 标记为等待元数据
    pub fn mark_awaiting_metadata(&mut self) {
        self.status = TaskStatus::AwaitingMetadata;
        self.message = "等待元数据...".to_string();
    }

    /// 标记为传输中
    pub fn mark_transferring(&mut self) {
        self.status = TaskStatus::Transferring;
    }

    /// 标记为暂停
    pub fn mark_paused(&mut self) {
        self.status = TaskStatus::Paused;
        self.message = "已暂停".to_string();
    }

    /// 标记为已完成
    pub fn mark_completed(&mut self) {
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.download_kbs = 0.0;
        self.upload_kbs = 0.0;
        self.message = "下载完成".to_string();
        self.finished_at = Some(chrono::Utc::now().timestamp());
    }

    /// 标记为失败
    pub fn mark_failed(&mut self, error: String) {
        self.status = TaskStatus::Failed;
        self.download_kbs = 0.0;
        self.upload_kbs = 0.0;
        self.message = error;
        self.finished_at = Some(chrono::Utc::now().timestamp());
    }

    /// 标记为已取消
    pub fn mark_cancelled(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.download_kbs = 0.0;
        self.upload_kbs = 0.0;
        self.message = "已取消".to_string();
        self.finished_at = Some(chrono::Utc::now().timestamp());
    }
}
