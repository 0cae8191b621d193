// API处理器模块

pub mod download;
pub mod search;

pub use download::*;
pub use search::*;

use serde::Serialize;

/// 统一API响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// 状态码 (0: 成功, 其他: 错误码)
    pub code: i32,
    /// 消息
    pub message: String,
    /// 数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_shape() {
        let ok = ApiResponse::success(42u64);
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["data"], 42);

        let err: ApiResponse<u64> = ApiResponse::error(404, "下载任务不存在".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], 404);
        // 错误响应不携带 data 字段
        assert!(json.get("data").is_none());
    }
}
