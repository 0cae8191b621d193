//! WebSocket 连接管理器
//!
//! 管理所有 WebSocket 连接与订阅关系。
//! 事件由工作器按轮询间隔产生（每任务每秒至多一条进度），
//! 量级很小，直接逐连接推送，不做批量与节流。

use crate::downloader::DownloadEvent;
use crate::server::websocket::message::{TimestampedEvent, WsServerMessage};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// WebSocket 连接信息
#[derive(Debug)]
pub struct WsConnection {
    /// 连接 ID
    pub id: String,
    /// 消息发送通道
    pub sender: mpsc::UnboundedSender<WsServerMessage>,
    /// 连接时间
    #[allow(dead_code)]
    pub connected_at: Instant,
    /// 最后活动时间
    pub last_active: Instant,
}

/// WebSocket 管理器
#[derive(Debug)]
pub struct WebSocketManager {
    /// 所有连接
    connections: DashMap<String, WsConnection>,
    /// 订阅管理：connection_id -> 订阅模式集合
    subscriptions: DashMap<String, HashSet<String>>,
    /// 全局事件 ID 计数器
    event_id_counter: AtomicU64,
}

impl WebSocketManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            subscriptions: DashMap::new(),
            event_id_counter: AtomicU64::new(1),
        }
    }

    // ==================== 连接管理 ====================

    /// 注册新连接，返回用于接收服务端消息的接收器
    pub fn register(&self, connection_id: String) -> mpsc::UnboundedReceiver<WsServerMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        self.connections.insert(
            connection_id.clone(),
            WsConnection {
                id: connection_id.clone(),
                sender,
                connected_at: now,
                last_active: now,
            },
        );
        info!("WebSocket 连接已注册: {}", connection_id);

        receiver
    }

    /// 移除连接并清理其订阅
    pub fn unregister(&self, connection_id: &str) {
        if self.connections.remove(connection_id).is_some() {
            self.subscriptions.remove(connection_id);
            info!("WebSocket 连接已移除并清理: {}", connection_id);
        }
    }

    /// 更新连接活动时间
    pub fn touch(&self, connection_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(connection_id) {
            conn.last_active = Instant::now();
        }
    }

    /// 获取连接数量
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// 向指定连接发送消息
    pub fn send_to(&self, connection_id: &str, message: WsServerMessage) -> bool {
        let conn = match self.connections.get(connection_id) {
            Some(c) => c,
            None => {
                debug!("连接不存在: {}", connection_id);
                return false;
            }
        };

        match conn.sender.send(message) {
            Ok(_) => true,
            Err(e) => {
                warn!("发送消息失败（可能连接已关闭）: {} - {}", connection_id, e);
                false
            }
        }
    }

    /// 广播消息给所有连接（仅用于非订阅场景）
    pub fn broadcast(&self, message: WsServerMessage) {
        let mut failed_connections = Vec::new();

        for conn in self.connections.iter() {
            if conn.sender.send(message.clone()).is_err() {
                failed_connections.push(conn.id.clone());
            }
        }

        for id in failed_connections {
            self.unregister(&id);
        }
    }

    /// 清理超时连接
    pub fn cleanup_stale_connections(&self, timeout: Duration) {
        let now = Instant::now();
        let mut stale_connections = Vec::new();

        for conn in self.connections.iter() {
            if now.duration_since(conn.last_active) > timeout {
                stale_connections.push(conn.id.clone());
            }
        }

        for id in stale_connections {
            warn!("清理超时连接: {}", id);
            self.unregister(&id);
        }
    }

    // ==================== 订阅管理 ====================

    /// 添加订阅
    pub fn subscribe(&self, connection_id: &str, patterns: Vec<String>) {
        let mut conn_subs = self
            .subscriptions
            .entry(connection_id.to_string())
            .or_default();
        for pattern in patterns {
            conn_subs.insert(pattern);
        }
        info!("连接 {} 订阅更新: {:?}", connection_id, conn_subs.value());
    }

    /// 移除订阅
    pub fn unsubscribe(&self, connection_id: &str, patterns: Vec<String>) {
        if let Some(mut conn_subs) = self.subscriptions.get_mut(connection_id) {
            for pattern in patterns {
                conn_subs.remove(&pattern);
            }
            info!("连接 {} 取消订阅，剩余: {:?}", connection_id, conn_subs.value());
        }
    }

    /// 获取连接的订阅列表
    pub fn get_subscriptions(&self, connection_id: &str) -> Vec<String> {
        self.subscriptions
            .get(connection_id)
            .map(|subs| subs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 检查订阅集合是否匹配一个下载事件
    fn matches(subs: &HashSet<String>, event: &DownloadEvent) -> bool {
        subs.contains("*")
            || subs.contains("download")
            || subs.contains("download:*")
            || subs.contains(&format!("download:{}", event.task_id()))
    }

    // ==================== 事件推送 ====================

    /// 向所有订阅匹配的连接推送下载事件
    pub fn send_if_subscribed(&self, event: &DownloadEvent) {
        if self.connection_count() == 0 {
            return;
        }

        let event_id = self.event_id_counter.fetch_add(1, Ordering::SeqCst);
        let timestamped = TimestampedEvent::new(event_id, event.clone());

        for conn in self.connections.iter() {
            let subscribed = self
                .subscriptions
                .get(&conn.id)
                .map(|subs| Self::matches(&subs, event))
                .unwrap_or(false);
            if !subscribed {
                continue;
            }

            if self.send_to(&conn.id, WsServerMessage::event(timestamped.clone())) {
                debug!(
                    "WS事件已发送: 连接={}, 事件={}, 任务={}, 事件ID={}",
                    conn.id,
                    event.event_type_name(),
                    event.task_id(),
                    event_id
                );
            }
        }
    }
}

impl Default for WebSocketManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress_event(id: u64) -> DownloadEvent {
        DownloadEvent::Progress {
            id,
            percent: 10,
            phase: "downloading".to_string(),
            download_kbs: 100.0,
            upload_kbs: 1.0,
        }
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let manager = WebSocketManager::new();

        let _receiver = manager.register("conn-1".to_string());
        assert_eq!(manager.connection_count(), 1);

        manager.unregister("conn-1");
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_send_to_connection() {
        let manager = WebSocketManager::new();
        let mut receiver = manager.register("conn-1".to_string());

        manager.send_to("conn-1", WsServerMessage::pong(None));

        let msg = receiver.recv().await.unwrap();
        match msg {
            WsServerMessage::Pong { .. } => {}
            _ => panic!("Expected Pong message"),
        }
    }

    #[tokio::test]
    async fn test_subscribe_and_send() {
        let manager = WebSocketManager::new();
        let mut receiver = manager.register("conn-1".to_string());

        manager.subscribe("conn-1", vec!["download".to_string()]);
        manager.send_if_subscribed(&progress_event(1));

        let msg = receiver.recv().await.unwrap();
        match msg {
            WsServerMessage::Event { event } => {
                assert_eq!(event.event.task_id(), 1);
            }
            _ => panic!("Expected Event message"),
        }
    }

    #[tokio::test]
    async fn test_per_task_subscription() {
        let manager = WebSocketManager::new();
        let mut receiver = manager.register("conn-1".to_string());

        manager.subscribe("conn-1", vec!["download:2".to_string()]);

        // 任务 1 的事件不匹配，任务 2 的匹配
        manager.send_if_subscribed(&progress_event(1));
        manager.send_if_subscribed(&progress_event(2));

        let msg = receiver.recv().await.unwrap();
        match msg {
            WsServerMessage::Event { event } => assert_eq!(event.event.task_id(), 2),
            _ => panic!("Expected Event message"),
        }
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_subscription_no_event() {
        let manager = WebSocketManager::new();
        let mut receiver = manager.register("conn-1".to_string());

        manager.send_if_subscribed(&progress_event(1));

        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_events() {
        let manager = WebSocketManager::new();
        let mut receiver = manager.register("conn-1".to_string());

        manager.subscribe("conn-1", vec!["download:*".to_string()]);
        manager.unsubscribe("conn-1", vec!["download:*".to_string()]);

        manager.send_if_subscribed(&progress_event(1));
        assert!(receiver.try_recv().is_err());
    }
}
