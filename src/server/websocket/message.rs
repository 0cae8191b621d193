//! WebSocket 消息类型定义

use crate::downloader::{DownloadEvent, DownloadTask};
use serde::{Deserialize, Serialize};

/// 带事件ID与时间戳的事件封装
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    /// 全局递增事件ID
    pub event_id: u64,
    /// 服务端时间戳（毫秒）
    pub timestamp: i64,
    /// 事件内容
    #[serde(flatten)]
    pub event: DownloadEvent,
}

impl TimestampedEvent {
    pub fn new(event_id: u64, event: DownloadEvent) -> Self {
        Self {
            event_id,
            timestamp: chrono::Utc::now().timestamp_millis(),
            event,
        }
    }
}

/// 客户端发送给服务端的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    /// 心跳 Ping
    Ping {
        /// 客户端时间戳（毫秒）
        timestamp: i64,
    },
    /// 请求状态快照
    RequestSnapshot,
    /// 订阅事件
    ///
    /// 支持的订阅模式：
    /// - `download` - 所有下载事件
    /// - `download:*` - 所有下载事件（通配符）
    /// - `download:<id>` - 指定任务的事件
    /// - `*` - 所有事件
    Subscribe {
        /// 要订阅的模式列表
        subscriptions: Vec<String>,
    },
    /// 取消订阅事件
    Unsubscribe {
        /// 要取消订阅的模式列表
        subscriptions: Vec<String>,
    },
}

/// 服务端发送给客户端的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    /// 心跳 Pong
    Pong {
        /// 服务端时间戳（毫秒）
        timestamp: i64,
        /// 回显客户端时间戳（用于计算延迟）
        client_timestamp: Option<i64>,
    },
    /// 单个事件
    Event {
        #[serde(flatten)]
        event: TimestampedEvent,
    },
    /// 状态快照
    Snapshot {
        /// 下载任务列表（按创建顺序）
        downloads: Vec<DownloadTask>,
    },
    /// 连接成功
    Connected {
        /// 连接 ID
        connection_id: String,
        /// 服务端时间戳
        timestamp: i64,
    },
    /// 错误消息
    Error {
        /// 错误码
        code: String,
        /// 错误信息
        message: String,
    },
    /// 订阅成功
    SubscribeSuccess {
        /// 当前订阅列表
        subscriptions: Vec<String>,
    },
    /// 取消订阅成功
    UnsubscribeSuccess {
        /// 剩余订阅列表
        subscriptions: Vec<String>,
    },
}

impl WsServerMessage {
    /// 创建 Pong 消息
    pub fn pong(client_timestamp: Option<i64>) -> Self {
        Self::Pong {
            timestamp: chrono::Utc::now().timestamp_millis(),
            client_timestamp,
        }
    }

    /// 创建 Connected 消息
    pub fn connected(connection_id: String) -> Self {
        Self::Connected {
            connection_id,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// 创建错误消息
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 创建单个事件消息
    pub fn event(event: TimestampedEvent) -> Self {
        Self::Event { event }
    }

    /// 创建订阅成功消息
    pub fn subscribe_success(subscriptions: Vec<String>) -> Self {
        Self::SubscribeSuccess { subscriptions }
    }

    /// 创建取消订阅成功消息
    pub fn unsubscribe_success(subscriptions: Vec<String>) -> Self {
        Self::UnsubscribeSuccess { subscriptions }
    }
}
