//! 下载任务注册表
//!
//! 管理器持有全部任务记录与信号收件箱，负责分配任务ID、
//! 派生工作器、转投控制信号、带宽限期地移除任务。
//! 注册表完全驻留内存，进程重启后不恢复任务。

use crate::config::DownloadConfig;
use crate::downloader::events::DownloadEvent;
use crate::downloader::signal::{ControlSignal, SignalBox};
use crate::downloader::task::DownloadTask;
use crate::downloader::worker::{TaskPolicy, TransferWorker};
use crate::engine::adapter::EngineAdapter;
use crate::engine::session::TorrentEngine;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 下载管理层错误
#[derive(Debug, Error)]
pub enum DownloadError {
    /// 引擎未注入或加载失败，拒绝创建任务
    #[error("BT 引擎不可用，无法创建下载任务")]
    EngineUnavailable,

    #[error("下载任务不存在: {0}")]
    NotFound(u64),
}

/// 注册表中的一个任务条目
struct TaskEntry {
    task: Arc<RwLock<DownloadTask>>,
    signals: Arc<SignalBox>,
    join: Mutex<Option<JoinHandle<()>>>,
}

/// 下载管理器
pub struct DownloadManager {
    engine: Option<Arc<dyn TorrentEngine>>,
    tasks: DashMap<u64, Arc<TaskEntry>>,
    /// 创建顺序（list 按此返回）
    order: RwLock<Vec<u64>>,
    /// 任务ID自增计数器，进程内不复用
    next_id: AtomicU64,
    policy: TaskPolicy,
    listen_interface: String,
    /// 移除任务时等待工作器退出的宽限期
    remove_grace: Duration,
}

impl DownloadManager {
    pub fn new(
        engine: Option<Arc<dyn TorrentEngine>>,
        config: &DownloadConfig,
        listen_interface: String,
    ) -> Self {
        Self::with_policy(
            engine,
            TaskPolicy {
                poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
                metadata_max_polls: config.metadata_max_polls.max(1),
            },
            listen_interface,
            Duration::from_secs(config.remove_grace_secs),
        )
    }

    pub fn with_policy(
        engine: Option<Arc<dyn TorrentEngine>>,
        policy: TaskPolicy,
        listen_interface: String,
        remove_grace: Duration,
    ) -> Self {
        Self {
            engine,
            tasks: DashMap::new(),
            order: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            policy,
            listen_interface,
            remove_grace,
        }
    }

    /// 引擎是否就绪
    pub fn engine_available(&self) -> bool {
        self.engine.is_some()
    }

    /// 创建并立即启动一个下载任务。
    ///
    /// 返回任务ID与该任务的事件接收端，由调用方决定如何消费事件。
    pub async fn create(
        &self,
        magnet: String,
        save_path: PathBuf,
    ) -> Result<(u64, mpsc::UnboundedReceiver<DownloadEvent>), DownloadError> {
        let engine = self
            .engine
            .clone()
            .ok_or(DownloadError::EngineUnavailable)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let task = Arc::new(RwLock::new(DownloadTask::new(id, magnet, save_path.clone())));
        let signals = Arc::new(SignalBox::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = TransferWorker {
            task: task.clone(),
            signals: signals.clone(),
            events: tx,
            policy: self.policy.clone(),
            adapter: EngineAdapter::new(engine),
            listen_interface: self.listen_interface.clone(),
        };
        let join = tokio::spawn(worker.run());

        self.tasks.insert(
            id,
            Arc::new(TaskEntry {
                task,
                signals,
                join: Mutex::new(Some(join)),
            }),
        );
        self.order.write().await.push(id);

        info!("创建下载任务: id={}, 保存目录={}", id, save_path.display());
        Ok((id, rx))
    }

    /// 按创建顺序返回全部任务快照
    pub async fn list(&self) -> Vec<DownloadTask> {
        let order = self.order.read().await;
        let mut tasks = Vec::with_capacity(order.len());
        for id in order.iter() {
            if let Some(entry) = self.tasks.get(id) {
                tasks.push(entry.task.read().await.clone());
            }
        }
        tasks
    }

    /// 任务快照
    pub async fn get(&self, id: u64) -> Option<DownloadTask> {
        let entry = self.tasks.get(&id)?.value().clone();
        let task = entry.task.read().await.clone();
        Some(task)
    }

    /// 向任务投递控制信号。
    ///
    /// 未知ID或已终态的任务静默忽略，返回 false。
    pub async fn send_signal(&self, id: u64, signal: ControlSignal) -> bool {
        let Some(entry) = self.tasks.get(&id).map(|e| e.value().clone()) else {
            return false;
        };
        if entry.task.read().await.status.is_terminal() {
            return false;
        }
        entry.signals.send(signal);
        true
    }

    /// 移除任务。
    ///
    /// 活跃任务先投递 Stop，在宽限期内等待工作器退出，之后才摘除记录，
    /// 等待期间 get/list 仍能看到任务；超时也照常移除
    /// （工作器会在下一次停止检查时自行退出）。未知ID是幂等空操作。
    pub async fn remove(&self, id: u64) -> bool {
        let Some(entry) = self.tasks.get(&id).map(|e| e.value().clone()) else {
            return false;
        };

        let terminal = entry.task.read().await.status.is_terminal();
        if !terminal {
            entry.signals.send(ControlSignal::Stop);
        }
        if let Some(join) = entry.join.lock().await.take() {
            if tokio::time::timeout(self.remove_grace, join).await.is_err() {
                // 不强杀：取消始终是协作式的
                warn!("任务 {} 未在宽限期内退出，记录照常移除", id);
            }
        }

        self.tasks.remove(&id);
        self.order.write().await.retain(|x| *x != id);

        info!("下载任务已移除: id={}", id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::task::TaskStatus;
    use crate::engine::sim::{SimScript, SimTorrentEngine};

    fn manager_with(script: SimScript) -> (DownloadManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let manager = DownloadManager::with_policy(
            Some(Arc::new(SimTorrentEngine::new(script))),
            TaskPolicy::default(),
            "0.0.0.0:6881".to_string(),
            Duration::from_secs(3),
        );
        (manager, dir)
    }

    fn slow_script() -> SimScript {
        SimScript {
            metadata_polls: u32::MAX,
            ..SimScript::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_are_sequential_and_never_reused() {
        let (manager, dir) = manager_with(slow_script());
        let path = dir.path().to_path_buf();

        let (id1, _rx1) = manager
            .create("magnet:?xt=urn:btih:a".to_string(), path.clone())
            .await
            .unwrap();
        let (id2, _rx2) = manager
            .create("magnet:?xt=urn:btih:b".to_string(), path.clone())
            .await
            .unwrap();
        assert!(manager.remove(id1).await);

        // 移除后的ID不会被复用
        let (id3, _rx3) = manager
            .create("magnet:?xt=urn:btih:c".to_string(), path)
            .await
            .unwrap();
        assert!(id1 < id2 && id2 < id3);
    }

    #[tokio::test]
    async fn test_create_without_engine_is_rejected() {
        let manager = DownloadManager::with_policy(
            None,
            TaskPolicy::default(),
            "0.0.0.0:6881".to_string(),
            Duration::from_secs(3),
        );
        assert!(!manager.engine_available());

        let result = manager
            .create("magnet:?xt=urn:btih:a".to_string(), PathBuf::from("/tmp/dl"))
            .await;
        assert!(matches!(result, Err(DownloadError::EngineUnavailable)));
        assert!(manager.list().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_preserves_creation_order() {
        let (manager, dir) = manager_with(slow_script());
        let path = dir.path().to_path_buf();

        let mut ids = Vec::new();
        for i in 0..3 {
            let (id, _rx) = manager
                .create(format!("magnet:?xt=urn:btih:{}", i), path.clone())
                .await
                .unwrap();
            ids.push(id);
        }

        let listed: Vec<u64> = manager.list().await.iter().map(|t| t.id).collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_and_remove_unknown_id_are_noops() {
        let (manager, _dir) = manager_with(slow_script());

        assert!(!manager.send_signal(999, ControlSignal::Pause).await);
        assert!(!manager.remove(999).await);
        assert!(manager.get(999).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_active_task_stops_worker() {
        let (manager, dir) = manager_with(slow_script());
        let (id, mut rx) = manager
            .create("magnet:?xt=urn:btih:a".to_string(), dir.path().to_path_buf())
            .await
            .unwrap();

        assert!(manager.remove(id).await);
        assert!(manager.get(id).await.is_none());

        // 工作器在宽限期内退出，收尾事件是取消
        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert_eq!(last, Some(DownloadEvent::Cancelled { id }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_visible_during_remove_grace() {
        let (manager, dir) = manager_with(slow_script());
        let manager = Arc::new(manager);
        let (id, _rx) = manager
            .create("magnet:?xt=urn:btih:a".to_string(), dir.path().to_path_buf())
            .await
            .unwrap();

        let remover = manager.clone();
        let remove_handle = tokio::spawn(async move { remover.remove(id).await });
        // 让移除流程先跑到宽限等待
        tokio::task::yield_now().await;

        // 宽限等待期间记录仍可见
        assert!(manager.get(id).await.is_some());
        assert_eq!(manager.list().await.len(), 1);

        assert!(remove_handle.await.unwrap());
        assert!(manager.get(id).await.is_none());
        assert!(manager.list().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_to_terminal_task_is_ignored() {
        // 立即完成的脚本
        let script = SimScript {
            metadata_polls: 0,
            progress: vec![1.0],
            ..SimScript::default()
        };
        let (manager, dir) = manager_with(script);
        let (id, mut rx) = manager
            .create("magnet:?xt=urn:btih:a".to_string(), dir.path().to_path_buf())
            .await
            .unwrap();

        // 等工作器跑完
        while rx.recv().await.is_some() {}
        assert_eq!(manager.get(id).await.unwrap().status, TaskStatus::Completed);

        assert!(!manager.send_signal(id, ControlSignal::Pause).await);
        // 终态任务的移除只删记录
        assert!(manager.remove(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_tasks_are_independent() {
        let script = SimScript {
            metadata_polls: 0,
            progress: vec![0.0, 0.0, 0.5, 1.0],
            ..SimScript::default()
        };
        let (manager, dir) = manager_with(script);
        let path = dir.path().to_path_buf();

        let (id1, mut rx1) = manager
            .create("magnet:?xt=urn:btih:a".to_string(), path.clone())
            .await
            .unwrap();
        let (id2, mut rx2) = manager
            .create("magnet:?xt=urn:btih:b".to_string(), path)
            .await
            .unwrap();

        // 停掉第一个，第二个不受影响照常完成
        manager.send_signal(id1, ControlSignal::Stop).await;

        let mut last1 = None;
        while let Some(event) = rx1.recv().await {
            last1 = Some(event);
        }
        let mut last2 = None;
        while let Some(event) = rx2.recv().await {
            last2 = Some(event);
        }

        assert_eq!(last1, Some(DownloadEvent::Cancelled { id: id1 }));
        assert!(matches!(last2, Some(DownloadEvent::Completed { id, .. }) if id == id2));
    }
}
