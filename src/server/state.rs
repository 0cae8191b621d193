// 应用状态

use crate::config::AppConfig;
use crate::downloader::DownloadManager;
use crate::engine::{SimTorrentEngine, TorrentEngine};
use crate::scraper::SearchClient;
use crate::server::websocket::WebSocketManager;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// 应用全局状态
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Arc<RwLock<AppConfig>>,
    /// 下载管理器
    pub download_manager: Arc<DownloadManager>,
    /// 资源站搜索客户端
    pub search_client: Arc<SearchClient>,
    /// WebSocket 连接管理器
    pub ws_manager: Arc<WebSocketManager>,
}

impl AppState {
    /// 创建新的应用状态
    pub async fn new() -> anyhow::Result<Self> {
        // 加载配置
        let config = AppConfig::load_or_default("config/app.toml").await;

        // 根据配置选择 BT 引擎后端。引擎缺席时服务仍可启动，
        // 创建下载任务会返回 503。
        let engine: Option<Arc<dyn TorrentEngine>> = match config.engine.backend.as_str() {
            "sim" => {
                info!("使用模拟 BT 引擎后端");
                Some(Arc::new(SimTorrentEngine::default()))
            }
            "none" => {
                warn!("引擎后端配置为 none，下载功能不可用");
                None
            }
            other => {
                warn!("未知的引擎后端 \"{}\"，下载功能不可用", other);
                None
            }
        };

        let download_manager = Arc::new(DownloadManager::new(
            engine,
            &config.download,
            config.engine.listen_interface.clone(),
        ));

        let search_client = Arc::new(SearchClient::new(&config.scraper)?);

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            download_manager,
            search_client,
            ws_manager: Arc::new(WebSocketManager::new()),
        })
    }
}
