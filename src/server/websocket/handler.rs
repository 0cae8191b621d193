//! WebSocket 路由处理器

use crate::server::websocket::message::{WsClientMessage, WsServerMessage};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// WebSocket 路由处理器
///
/// 升级 HTTP 连接为 WebSocket，处理消息收发
pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// 处理 WebSocket 连接
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!("新的 WebSocket 连接: {}", connection_id);

    // 注册连接
    let mut message_receiver = state.ws_manager.register(connection_id.clone());

    let (mut sender, mut receiver) = socket.split();

    // 发送连接成功消息
    let connected_msg = WsServerMessage::connected(connection_id.clone());
    if let Ok(json) = serde_json::to_string(&connected_msg) {
        if sender.send(Message::Text(json)).await.is_err() {
            error!("发送连接成功消息失败");
            state.ws_manager.unregister(&connection_id);
            return;
        }
    }

    let ws_manager = Arc::clone(&state.ws_manager);

    // 发送任务
    let send_task = tokio::spawn(async move {
        while let Some(message) = message_receiver.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("序列化消息失败: {}", e);
                }
            }
        }
    });

    let state_recv = state.clone();
    let conn_id_recv = connection_id.clone();

    // 接收任务
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    handle_client_message(&state_recv, &conn_id_recv, &text).await;
                }
                Message::Binary(data) => {
                    if let Ok(text) = String::from_utf8(data) {
                        handle_client_message(&state_recv, &conn_id_recv, &text).await;
                    }
                }
                Message::Ping(_) => {
                    state_recv.ws_manager.touch(&conn_id_recv);
                    debug!("收到 Ping: {}", conn_id_recv);
                }
                Message::Pong(_) => {
                    state_recv.ws_manager.touch(&conn_id_recv);
                    debug!("收到 Pong: {}", conn_id_recv);
                }
                Message::Close(_) => {
                    info!("收到关闭消息: {}", conn_id_recv);
                    break;
                }
            }
        }
    });

    // 任一方向断开即关闭连接
    tokio::select! {
        _ = send_task => {
            debug!("发送任务结束: {}", connection_id);
        }
        _ = recv_task => {
            debug!("接收任务结束: {}", connection_id);
        }
    }

    ws_manager.unregister(&connection_id);
    info!("WebSocket 连接已关闭: {}", connection_id);
}

/// 处理客户端消息
async fn handle_client_message(state: &AppState, connection_id: &str, text: &str) {
    state.ws_manager.touch(connection_id);

    match serde_json::from_str::<WsClientMessage>(text) {
        Ok(message) => match message {
            WsClientMessage::Ping { timestamp } => {
                let pong = WsServerMessage::pong(Some(timestamp));
                state.ws_manager.send_to(connection_id, pong);
            }
            WsClientMessage::RequestSnapshot => {
                debug!("收到状态快照请求: {}", connection_id);
                let downloads = state.download_manager.list().await;
                state
                    .ws_manager
                    .send_to(connection_id, WsServerMessage::Snapshot { downloads });
            }
            WsClientMessage::Subscribe { subscriptions } => {
                debug!("收到订阅请求: {} - {:?}", connection_id, subscriptions);
                state.ws_manager.subscribe(connection_id, subscriptions);

                let current_subs = state.ws_manager.get_subscriptions(connection_id);
                state.ws_manager.send_to(
                    connection_id,
                    WsServerMessage::subscribe_success(current_subs),
                );
            }
            WsClientMessage::Unsubscribe { subscriptions } => {
                debug!("收到取消订阅请求: {} - {:?}", connection_id, subscriptions);
                state.ws_manager.unsubscribe(connection_id, subscriptions);

                let current_subs = state.ws_manager.get_subscriptions(connection_id);
                state.ws_manager.send_to(
                    connection_id,
                    WsServerMessage::unsubscribe_success(current_subs),
                );
            }
        },
        Err(e) => {
            warn!("解析客户端消息失败: {} - {}", connection_id, e);
            let error = WsServerMessage::error("PARSE_ERROR", format!("消息解析失败: {}", e));
            state.ws_manager.send_to(connection_id, error);
        }
    }
}
