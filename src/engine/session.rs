//! BT 引擎抽象层
//!
//! 真实的 BitTorrent 引擎（libtorrent 等）以动态库形式存在，版本间 API 差异很大。
//! 这里定义一组窄的对象安全 trait，把引擎隔离在进程边界之外：
//! 上层只依赖 `TorrentEngine` / `TorrentSession` / `TorrentHandle`，
//! 具体后端通过依赖注入提供。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 引擎层错误
#[derive(Debug, Error)]
pub enum EngineError {
    /// 引擎库加载失败或未注入后端
    #[error("BT 引擎不可用")]
    Unavailable,

    /// 引擎不认识这个设置键（能力探测时的正常结果）
    #[error("引擎不支持设置项: {0}")]
    UnsupportedSetting(String),

    /// 引擎 API 形态不匹配（例如旧版本没有参数对象接口）
    #[error("引擎 API 不匹配: {0}")]
    ApiMismatch(String),

    /// 引擎调用本身失败
    #[error("引擎调用失败: {0}")]
    Call(String),
}

/// 会话级设置值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// 存储分配模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// 预分配
    Allocate,
    /// 稀疏文件（默认，按需落盘）
    Sparse,
}

/// 新式添加接口的参数对象
#[derive(Debug, Clone)]
pub struct AddTorrentParams {
    pub magnet: String,
    pub save_path: PathBuf,
    pub storage_mode: StorageMode,
}

impl AddTorrentParams {
    pub fn new(magnet: impl Into<String>, save_path: impl Into<PathBuf>) -> Self {
        Self {
            magnet: magnet.into(),
            save_path: save_path.into(),
            storage_mode: StorageMode::Sparse,
        }
    }
}

/// 引擎状态快照（一次轮询查询的返回值）
#[derive(Debug, Clone, Copy)]
pub struct EngineStatus {
    /// 完成比例 0.0..=1.0
    pub fraction_done: f64,
    /// 下载速率（字节/秒）
    pub download_rate: f64,
    /// 上传速率（字节/秒）
    pub upload_rate: f64,
    /// 引擎内部状态码，见 `phase_label`
    pub state_code: u8,
    /// 元数据（种子信息）是否已就绪
    pub has_metadata: bool,
}

/// 引擎状态码
pub const STATE_DOWNLOADING_METADATA: u8 = 2;
pub const STATE_DOWNLOADING: u8 = 3;
pub const STATE_FINISHED: u8 = 4;
pub const STATE_SEEDING: u8 = 5;

/// 状态码转人类可读阶段标签
pub fn phase_label(code: u8) -> String {
    const LABELS: [&str; 8] = [
        "queued for checking",
        "checking files",
        "downloading metadata",
        "downloading",
        "finished",
        "seeding",
        "allocating",
        "checking fastresume",
    ];
    match LABELS.get(code as usize) {
        Some(label) => (*label).to_string(),
        None => format!("unknown({})", code),
    }
}

/// 引擎入口：负责创建会话
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    async fn new_session(&self) -> Result<Box<dyn TorrentSession>, EngineError>;
}

/// 一个引擎会话，对应一组网络监听与若干种子
#[async_trait]
pub trait TorrentSession: Send + Sync {
    /// 应用一批会话设置。任一键不被支持即整体失败，
    /// 调用方据此做逐键能力探测。
    async fn apply_settings(
        &self,
        settings: &[(String, SettingValue)],
    ) -> Result<(), EngineError>;

    /// 新式添加接口（参数对象）。旧引擎返回 `ApiMismatch`。
    async fn add_torrent(
        &self,
        params: AddTorrentParams,
    ) -> Result<Box<dyn TorrentHandle>, EngineError>;

    /// 旧式添加接口（magnet + 路径直传）
    async fn add_magnet_legacy(
        &self,
        magnet: &str,
        save_path: &Path,
    ) -> Result<Box<dyn TorrentHandle>, EngineError>;

    /// 从会话中移除种子（不删除已下载数据）
    async fn remove_torrent(&self, handle: &dyn TorrentHandle) -> Result<(), EngineError>;
}

/// 单个种子的控制句柄
#[async_trait]
pub trait TorrentHandle: Send + Sync {
    async fn status(&self) -> Result<EngineStatus, EngineError>;
    async fn pause(&self) -> Result<(), EngineError>;
    async fn resume(&self) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_label_known_codes() {
        assert_eq!(phase_label(STATE_DOWNLOADING_METADATA), "downloading metadata");
        assert_eq!(phase_label(STATE_DOWNLOADING), "downloading");
        assert_eq!(phase_label(STATE_SEEDING), "seeding");
    }

    #[test]
    fn test_phase_label_unknown_code() {
        assert_eq!(phase_label(42), "unknown(42)");
    }

    #[test]
    fn test_add_torrent_params_default_sparse() {
        let params = AddTorrentParams::new("magnet:?xt=urn:btih:abc", "/tmp/dl");
        assert_eq!(params.storage_mode, StorageMode::Sparse);
    }
}
