//! 下载任务 API 处理器

use crate::downloader::{ControlSignal, DownloadError, DownloadEvent, DownloadTask};
use crate::server::handlers::ApiResponse;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};

/// 创建下载任务请求
#[derive(Debug, Deserialize)]
pub struct CreateDownloadRequest {
    /// 磁力链接
    pub magnet: String,
    /// 保存目录（缺省使用配置中的下载目录）
    pub save_dir: Option<String>,
}

/// 从详情页创建下载任务请求
#[derive(Debug, Deserialize)]
pub struct CreateFromPageRequest {
    /// 资源详情页 URL
    pub page_url: String,
    /// 保存目录（缺省使用配置中的下载目录）
    pub save_dir: Option<String>,
}

/// 创建下载任务响应
#[derive(Debug, Serialize)]
pub struct CreatedDownload {
    /// 新任务 ID
    pub id: u64,
}

/// 解析保存目录：请求优先，其次取配置
async fn resolve_save_dir(state: &AppState, save_dir: Option<String>) -> PathBuf {
    match save_dir {
        Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => {
            let config = state.config.read().await;
            config.download.download_dir.clone()
        }
    }
}

/// 把任务事件转投给 WebSocket 订阅者
fn forward_events(state: &AppState, mut rx: mpsc::UnboundedReceiver<DownloadEvent>) {
    let ws = state.ws_manager.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            ws.send_if_subscribed(&event);
        }
    });
}

/// 创建下载任务
///
/// POST /api/v1/downloads
pub async fn create_download(
    State(state): State<AppState>,
    Json(request): Json<CreateDownloadRequest>,
) -> Json<ApiResponse<CreatedDownload>> {
    if request.magnet.trim().is_empty() {
        return Json(ApiResponse::error(400, "磁力链接不能为空".to_string()));
    }

    let save_path = resolve_save_dir(&state, request.save_dir).await;

    match state
        .download_manager
        .create(request.magnet, save_path)
        .await
    {
        Ok((id, rx)) => {
            forward_events(&state, rx);
            info!("API创建下载任务: id={}", id);
            Json(ApiResponse::success(CreatedDownload { id }))
        }
        Err(e @ DownloadError::EngineUnavailable) => {
            error!("创建下载任务失败: {}", e);
            Json(ApiResponse::error(503, e.to_string()))
        }
        Err(e) => Json(ApiResponse::error(500, e.to_string())),
    }
}

/// 从资源详情页创建下载任务
///
/// 先抓取页面提取磁力链接，再走常规创建流程。
///
/// POST /api/v1/downloads/from-page
pub async fn create_download_from_page(
    State(state): State<AppState>,
    Json(request): Json<CreateFromPageRequest>,
) -> Json<ApiResponse<CreatedDownload>> {
    let magnet = match state.search_client.find_magnet(&request.page_url).await {
        Ok(magnet) => magnet,
        Err(e) => {
            error!("提取磁力链接失败: {} - {}", request.page_url, e);
            let code = match e {
                crate::scraper::ScrapeError::MagnetNotFound => 404,
                crate::scraper::ScrapeError::Network(_) => 502,
            };
            return Json(ApiResponse::error(code, e.to_string()));
        }
    };

    let save_path = resolve_save_dir(&state, request.save_dir).await;

    match state.download_manager.create(magnet, save_path).await {
        Ok((id, rx)) => {
            forward_events(&state, rx);
            info!("API从详情页创建下载任务: id={}", id);
            Json(ApiResponse::success(CreatedDownload { id }))
        }
        Err(e @ DownloadError::EngineUnavailable) => {
            error!("创建下载任务失败: {}", e);
            Json(ApiResponse::error(503, e.to_string()))
        }
        Err(e) => Json(ApiResponse::error(500, e.to_string())),
    }
}

/// 获取全部下载任务（按创建顺序）
///
/// GET /api/v1/downloads
pub async fn get_all_downloads(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<DownloadTask>>> {
    let tasks = state.download_manager.list().await;
    Json(ApiResponse::success(tasks))
}

/// 获取单个下载任务
///
/// GET /api/v1/downloads/:id
pub async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Json<ApiResponse<DownloadTask>> {
    match state.download_manager.get(id).await {
        Some(task) => Json(ApiResponse::success(task)),
        None => Json(ApiResponse::error(404, format!("下载任务不存在: {}", id))),
    }
}

/// 暂停下载任务
///
/// POST /api/v1/downloads/:id/pause
pub async fn pause_download(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Json<ApiResponse<()>> {
    if state
        .download_manager
        .send_signal(id, ControlSignal::Pause)
        .await
    {
        Json(ApiResponse::success(()))
    } else {
        Json(ApiResponse::error(
            404,
            format!("下载任务不存在或已结束: {}", id),
        ))
    }
}

/// 恢复下载任务
///
/// POST /api/v1/downloads/:id/resume
pub async fn resume_download(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Json<ApiResponse<()>> {
    if state
        .download_manager
        .send_signal(id, ControlSignal::Resume)
        .await
    {
        Json(ApiResponse::success(()))
    } else {
        Json(ApiResponse::error(
            404,
            format!("下载任务不存在或已结束: {}", id),
        ))
    }
}

/// 删除下载任务
///
/// 运行中的任务先发送停止信号并等待工作器退出。
///
/// DELETE /api/v1/downloads/:id
pub async fn delete_download(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Json<ApiResponse<()>> {
    if state.download_manager.remove(id).await {
        info!("API删除下载任务: id={}", id);
        Json(ApiResponse::success(()))
    } else {
        Json(ApiResponse::error(404, format!("下载任务不存在: {}", id)))
    }
}
