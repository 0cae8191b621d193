//! WebSocket 模块
//!
//! 提供 WebSocket 实时推送功能

mod handler;
mod manager;
mod message;

pub use handler::handle_websocket;
pub use manager::WebSocketManager;
pub use message::{TimestampedEvent, WsClientMessage, WsServerMessage};
