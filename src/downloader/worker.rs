//! 下载工作器
//!
//! 每个下载任务对应一个独立的 tokio 任务，独占自己的引擎会话与句柄。
//! 工作器是任务记录的唯一写者；控制面只通过 `SignalBox` 置标志位，
//! 工作器在每轮轮询的固定位置消费，因此信号生效延迟不超过一个轮询间隔。
//!
//! 每轮轮询的固定顺序：
//! 停止检查 → 暂停/恢复应用 → 状态查询 → 记录与事件更新 → 终态判定 → 休眠。

use crate::downloader::events::DownloadEvent;
use crate::downloader::signal::SignalBox;
use crate::downloader::task::DownloadTask;
use crate::engine::adapter::EngineAdapter;
use crate::engine::session::{phase_label, TorrentHandle, TorrentSession, STATE_SEEDING};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// 轮询参数
#[derive(Debug, Clone)]
pub struct TaskPolicy {
    /// 两次状态查询之间的间隔
    pub poll_interval: Duration,
    /// 元数据等待的轮询次数上限，超过即判定失败
    pub metadata_max_polls: u32,
}

impl Default for TaskPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            metadata_max_polls: 120,
        }
    }
}

/// 分数进度转百分比（向下取整，钳制到 0-100）
pub(crate) fn percent_from_fraction(fraction: f64) -> u8 {
    (fraction * 100.0).floor().clamp(0.0, 100.0) as u8
}

/// 工作器当前所处的活跃阶段（恢复时回到对应状态）
#[derive(Clone, Copy)]
enum ActivePhase {
    Metadata,
    Transfer,
}

pub(crate) struct TransferWorker {
    pub(crate) task: Arc<RwLock<DownloadTask>>,
    pub(crate) signals: Arc<SignalBox>,
    pub(crate) events: mpsc::UnboundedSender<DownloadEvent>,
    pub(crate) policy: TaskPolicy,
    pub(crate) adapter: EngineAdapter,
    pub(crate) listen_interface: String,
}

impl TransferWorker {
    /// 任务主循环。任何失败都转化为终态事件，不向外冒泡。
    pub(crate) async fn run(self) {
        let (id, magnet, save_path) = {
            let task = self.task.read().await;
            (task.id, task.magnet.clone(), task.save_path.clone())
        };
        debug!("下载工作器启动: 任务 {}", id);

        let session = match self.adapter.create_session(&self.listen_interface).await {
            Ok(session) => session,
            Err(e) => {
                self.fail(id, format!("创建引擎会话失败: {}", e)).await;
                return;
            }
        };

        let handle = match self
            .adapter
            .start_transfer(session.as_ref(), &magnet, &save_path)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                self.fail(id, format!("添加种子失败: {}", e)).await;
                return;
            }
        };

        self.task.write().await.mark_awaiting_metadata();
        let mut is_paused = false;

        // === 元数据等待阶段 ===
        let mut waited = 0u32;
        loop {
            if self.signals.stop_requested() {
                self.cancel(id, session.as_ref(), handle.as_ref()).await;
                return;
            }
            self.apply_pause_resume(id, handle.as_ref(), &mut is_paused, ActivePhase::Metadata)
                .await;

            match handle.status().await {
                Ok(status) if status.has_metadata => break,
                Ok(_) => {}
                Err(e) => {
                    self.fail(id, format!("状态查询失败: {}", e)).await;
                    return;
                }
            }

            waited += 1;
            if waited > self.policy.metadata_max_polls {
                self.fail(
                    id,
                    format!("获取元数据超时（{} 次轮询未就绪）", self.policy.metadata_max_polls),
                )
                .await;
                return;
            }
            tokio::time::sleep(self.policy.poll_interval).await;
        }

        if !is_paused {
            self.task.write().await.mark_transferring();
        }

        // === 传输阶段 ===
        let mut last_percent: u8 = 0;
        loop {
            if self.signals.stop_requested() {
                self.cancel(id, session.as_ref(), handle.as_ref()).await;
                return;
            }
            self.apply_pause_resume(id, handle.as_ref(), &mut is_paused, ActivePhase::Transfer)
                .await;

            let status = match handle.status().await {
                Ok(status) => status,
                Err(e) => {
                    self.fail(id, format!("状态查询失败: {}", e)).await;
                    return;
                }
            };

            // 引擎回报抖动不会让对外进度倒退
            let percent = last_percent.max(percent_from_fraction(status.fraction_done));
            last_percent = percent;

            // 本地暂停标志优先于引擎上报的阶段
            let phase = if is_paused {
                "paused".to_string()
            } else {
                phase_label(status.state_code)
            };
            let download_kbs = status.download_rate / 1000.0;
            let upload_kbs = status.upload_rate / 1000.0;

            {
                let mut task = self.task.write().await;
                task.set_progress(percent);
                task.download_kbs = download_kbs;
                task.upload_kbs = upload_kbs;
                task.message = format!("{} - {}%", phase, percent);
            }

            self.emit(DownloadEvent::Progress {
                id,
                percent,
                phase,
                download_kbs,
                upload_kbs,
            });

            if percent >= 100 || status.state_code == STATE_SEEDING {
                self.complete(id, &save_path).await;
                return;
            }

            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }

    /// 消费暂停/恢复标志。
    ///
    /// 引擎调用失败时标志保留，下一轮重试；信号在当前状态下
    /// 不适用时直接消费（重复暂停、未暂停时的恢复都是空操作）。
    async fn apply_pause_resume(
        &self,
        id: u64,
        handle: &dyn TorrentHandle,
        is_paused: &mut bool,
        phase: ActivePhase,
    ) {
        if self.signals.pause_requested() {
            if *is_paused {
                self.signals.clear_pause();
            } else {
                match handle.pause().await {
                    Ok(()) => {
                        self.signals.clear_pause();
                        *is_paused = true;
                        self.task.write().await.mark_paused();
                        self.emit(DownloadEvent::Paused { id });
                        info!("任务 {} 已暂停", id);
                    }
                    Err(e) => debug!("任务 {} 暂停未生效，下轮重试: {}", id, e),
                }
            }
        }

        if self.signals.resume_requested() {
            if !*is_paused {
                self.signals.clear_resume();
            } else {
                match handle.resume().await {
                    Ok(()) => {
                        self.signals.clear_resume();
                        *is_paused = false;
                        {
                            let mut task = self.task.write().await;
                            match phase {
                                ActivePhase::Transfer => task.mark_transferring(),
                                ActivePhase::Metadata => task.mark_awaiting_metadata(),
                            }
                        }
                        self.emit(DownloadEvent::Resumed { id });
                        info!("任务 {} 已恢复", id);
                    }
                    Err(e) => debug!("任务 {} 恢复未生效，下轮重试: {}", id, e),
                }
            }
        }
    }

    /// 停止路径：尽力做引擎侧清理，无论成败都以取消收尾
    async fn cancel(&self, id: u64, session: &dyn TorrentSession, handle: &dyn TorrentHandle) {
        if let Err(e) = session.remove_torrent(handle).await {
            warn!("任务 {} 引擎侧移除失败（忽略）: {}", id, e);
        }
        self.task.write().await.mark_cancelled();
        self.emit(DownloadEvent::Cancelled { id });
        info!("任务 {} 已取消", id);
    }

    async fn fail(&self, id: u64, error: String) {
        warn!("任务 {} 失败: {}", id, error);
        self.task.write().await.mark_failed(error.clone());
        self.emit(DownloadEvent::Failed { id, error });
    }

    async fn complete(&self, id: u64, save_path: &Path) {
        self.task.write().await.mark_completed();
        self.emit(DownloadEvent::Completed {
            id,
            save_path: save_path.display().to_string(),
        });
        info!("✓ 任务 {} 下载完成: {}", id, save_path.display());
    }

    /// 事件推送永不阻塞；观察者掉线只是丢弃
    fn emit(&self, event: DownloadEvent) {
        let _ = self.events.send(event);
    }
}
