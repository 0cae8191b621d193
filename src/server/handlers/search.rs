//! 资源搜索 API 处理器

use crate::scraper::{ScrapeError, SearchResult};
use crate::server::handlers::ApiResponse;
use crate::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::{error, info};

/// 搜索请求
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// 搜索关键词
    pub query: String,
}

/// 提取磁力链接请求
#[derive(Debug, Deserialize)]
pub struct MagnetRequest {
    /// 资源详情页 URL
    pub page_url: String,
}

/// 搜索资源站
///
/// POST /api/v1/search
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Json<ApiResponse<Vec<SearchResult>>> {
    if request.query.trim().is_empty() {
        return Json(ApiResponse::error(400, "搜索关键词不能为空".to_string()));
    }

    match state.search_client.search(&request.query).await {
        Ok(results) => {
            info!("搜索完成: \"{}\" 命中 {} 条", request.query, results.len());
            Json(ApiResponse::success(results))
        }
        Err(e) => {
            error!("搜索失败: \"{}\" - {}", request.query, e);
            Json(ApiResponse::error(502, e.to_string()))
        }
    }
}

/// 从详情页提取磁力链接
///
/// POST /api/v1/magnet
pub async fn find_magnet(
    State(state): State<AppState>,
    Json(request): Json<MagnetRequest>,
) -> Json<ApiResponse<String>> {
    match state.search_client.find_magnet(&request.page_url).await {
        Ok(magnet) => Json(ApiResponse::success(magnet)),
        Err(e @ ScrapeError::MagnetNotFound) => {
            Json(ApiResponse::error(404, e.to_string()))
        }
        Err(e) => {
            error!("提取磁力链接失败: {} - {}", request.page_url, e);
            Json(ApiResponse::error(502, e.to_string()))
        }
    }
}
