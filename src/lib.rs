// Magnet Downloader Rust Library
// 磁力搜索与下载编排核心库

// 配置管理模块
pub mod config;

// 下载编排模块
pub mod downloader;

// BT 引擎接入模块
pub mod engine;

// 日志模块
pub mod logging;

// 资源站抓取模块
pub mod scraper;

// Web服务器模块
pub mod server;

// 导出常用类型
pub use config::AppConfig;
pub use downloader::{
    ControlSignal, DownloadError, DownloadEvent, DownloadManager, DownloadTask, TaskStatus,
};
pub use engine::{EngineError, SimTorrentEngine, TorrentEngine};
pub use scraper::{SearchClient, SearchResult};
pub use server::{AppState, WebSocketManager};
