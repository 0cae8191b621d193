// Web服务器模块

pub mod handlers;
pub mod state;
pub mod websocket;

pub use state::AppState;
pub use websocket::WebSocketManager;
