//! 下载事件
//!
//! 工作器通过无界通道向观察者推送事件，发送永不阻塞。
//! 同一任务的事件保持产生顺序，跨任务不保证顺序。

use serde::{Deserialize, Serialize};

/// 事件优先级（WebSocket 层可据此决定丢弃策略）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    /// 周期性进度，可丢
    Low,
    /// 暂停/恢复确认
    Medium,
    /// 终态事件，必达
    High,
}

/// 下载事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// 周期性进度更新（每任务每轮询间隔至多一条）
    Progress {
        id: u64,
        percent: u8,
        phase: String,
        download_kbs: f64,
        upload_kbs: f64,
    },
    /// 暂停已实际作用于引擎
    Paused { id: u64 },
    /// 恢复已实际作用于引擎
    Resumed { id: u64 },
    /// 下载完成
    Completed { id: u64, save_path: String },
    /// 下载失败
    Failed { id: u64, error: String },
    /// 已取消
    Cancelled { id: u64 },
}

impl DownloadEvent {
    /// 事件所属任务ID
    pub fn task_id(&self) -> u64 {
        match self {
            DownloadEvent::Progress { id, .. }
            | DownloadEvent::Paused { id }
            | DownloadEvent::Resumed { id }
            | DownloadEvent::Completed { id, .. }
            | DownloadEvent::Failed { id, .. }
            | DownloadEvent::Cancelled { id } => *id,
        }
    }

    /// 是否为终态事件（任务随后不再产生事件）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadEvent::Completed { .. }
                | DownloadEvent::Failed { .. }
                | DownloadEvent::Cancelled { .. }
        )
    }

    pub fn priority(&self) -> EventPriority {
        match self {
            DownloadEvent::Progress { .. } => EventPriority::Low,
            DownloadEvent::Paused { .. } | DownloadEvent::Resumed { .. } => EventPriority::Medium,
            DownloadEvent::Completed { .. }
            | DownloadEvent::Failed { .. }
            | DownloadEvent::Cancelled { .. } => EventPriority::High,
        }
    }

    /// 事件类型名（与 serde tag 一致，用于日志和订阅匹配）
    pub fn event_type_name(&self) -> &'static str {
        match self {
            DownloadEvent::Progress { .. } => "progress",
            DownloadEvent::Paused { .. } => "paused",
            DownloadEvent::Resumed { .. } => "resumed",
            DownloadEvent::Completed { .. } => "completed",
            DownloadEvent::Failed { .. } => "failed",
            DownloadEvent::Cancelled { .. } => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tag() {
        let event = DownloadEvent::Progress {
            id: 3,
            percent: 42,
            phase: "downloading".to_string(),
            download_kbs: 512.0,
            upload_kbs: 16.5,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "progress");
        assert_eq!(json["id"], 3);
        assert_eq!(json["percent"], 42);
    }

    #[test]
    fn test_terminal_events() {
        assert!(DownloadEvent::Completed {
            id: 1,
            save_path: "/tmp".to_string()
        }
        .is_terminal());
        assert!(DownloadEvent::Failed {
            id: 1,
            error: "x".to_string()
        }
        .is_terminal());
        assert!(DownloadEvent::Cancelled { id: 1 }.is_terminal());
        assert!(!DownloadEvent::Paused { id: 1 }.is_terminal());
    }

    #[test]
    fn test_priority_ordering() {
        let progress = DownloadEvent::Progress {
            id: 1,
            percent: 0,
            phase: "downloading".to_string(),
            download_kbs: 0.0,
            upload_kbs: 0.0,
        };
        let completed = DownloadEvent::Completed {
            id: 1,
            save_path: "/tmp".to_string(),
        };
        assert!(progress.priority() < completed.priority());
        assert_eq!(completed.task_id(), 1);
        assert_eq!(completed.event_type_name(), "completed");
    }
}
