// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 下载配置
    #[serde(default)]
    pub download: DownloadConfig,
    /// 引擎配置
    #[serde(default)]
    pub engine: EngineConfig,
    /// 资源站抓取配置
    #[serde(default)]
    pub scraper: ScraperConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8765
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// 下载配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// 默认下载目录
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// 状态轮询间隔（秒）
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// 元数据等待轮询次数上限
    #[serde(default = "default_metadata_max_polls")]
    pub metadata_max_polls: u32,
    /// 移除任务时等待工作器退出的宽限期（秒）
    #[serde(default = "default_remove_grace_secs")]
    pub remove_grace_secs: u64,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_metadata_max_polls() -> u32 {
    120
}

fn default_remove_grace_secs() -> u64 {
    3
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            poll_interval_secs: default_poll_interval_secs(),
            metadata_max_polls: default_metadata_max_polls(),
            remove_grace_secs: default_remove_grace_secs(),
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 后端选择："sim"（内置模拟引擎）或 "none"（无引擎，创建任务将被拒绝）。
    /// 真实引擎通过依赖注入接入，不走此配置。
    #[serde(default = "default_engine_backend")]
    pub backend: String,
    /// 引擎监听的网络接口
    #[serde(default = "default_listen_interface")]
    pub listen_interface: String,
}

fn default_engine_backend() -> String {
    "sim".to_string()
}

fn default_listen_interface() -> String {
    "0.0.0.0:6881".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: default_engine_backend(),
            listen_interface: default_listen_interface(),
        }
    }
}

/// 资源站抓取配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// 站点地址
    #[serde(default = "default_scraper_base_url")]
    pub base_url: String,
    /// 请求 UA（站点对非浏览器 UA 返回 403）
    #[serde(default = "default_scraper_user_agent")]
    pub user_agent: String,
    /// 请求超时（秒）
    #[serde(default = "default_scraper_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scraper_base_url() -> String {
    "https://fitgirl-repacks.site".to_string()
}

fn default_scraper_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_scraper_timeout_secs() -> u64 {
    30
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_scraper_base_url(),
            user_agent: default_scraper_user_agent(),
            timeout_secs: default_scraper_timeout_secs(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("读取配置文件失败")?;
        let config: AppConfig = toml::from_str(&content).context("解析配置文件失败")?;
        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;

        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("创建配置目录失败")?;
        }
        fs::write(path, content).await.context("写入配置文件失败")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {}", e);
                let default_config = Self::default();
                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("保存默认配置失败: {}", e);
                }
                default_config
            }
        }
    }
}
