//! 模拟引擎后端
//!
//! 按脚本演绎一个确定性的引擎：元数据延迟、进度曲线、各类故障注入
//! 都由 `SimScript` 描述。测试套件用它驱动状态机，本地集成联调时
//! 也可以作为内置后端运行（`[engine] backend = "sim"`）。

use crate::engine::session::{
    AddTorrentParams, EngineError, EngineStatus, SettingValue, TorrentEngine, TorrentHandle,
    TorrentSession, STATE_DOWNLOADING, STATE_DOWNLOADING_METADATA, STATE_SEEDING,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// 模拟引擎的行为脚本
#[derive(Debug, Clone)]
pub struct SimScript {
    /// 会话接受的设置键集合，其余键返回 `UnsupportedSetting`
    pub accepted_settings: HashSet<String>,
    /// 前 N 次状态查询报告"元数据未就绪"
    pub metadata_polls: u32,
    /// 进度样本序列。元数据就绪后，每次非暂停的状态查询消费一个样本，
    /// 耗尽后停在最后一个值
    pub progress: Vec<f64>,
    /// 第 N 次状态查询（从 1 计）返回错误
    pub fail_status_at: Option<u32>,
    /// 前 N 次 pause 调用失败
    pub fail_pause_times: u32,
    /// 前 N 次 resume 调用失败
    pub fail_resume_times: u32,
    /// remove_torrent 调用失败
    pub fail_remove: bool,
    /// 只支持旧式添加接口（新式返回 `ApiMismatch`）
    pub legacy_only: bool,
    /// 多键批量 apply_settings 失败（单键探测仍成功）
    pub reject_batch: bool,
    /// 从第 N 次状态查询起报告做种状态
    pub seed_from_call: Option<u32>,
    /// 传输中报告的下载速率（字节/秒）
    pub download_rate: f64,
    /// 传输中报告的上传速率（字节/秒）
    pub upload_rate: f64,
}

impl Default for SimScript {
    fn default() -> Self {
        Self {
            accepted_settings: [
                "enable_dht",
                "enable_lsd",
                "enable_upnp",
                "enable_natpmp",
                "listen_interfaces",
                "enable_pex",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            metadata_polls: 2,
            progress: (0..=100).map(|i| i as f64 / 100.0).collect(),
            fail_status_at: None,
            fail_pause_times: 0,
            fail_resume_times: 0,
            fail_remove: false,
            legacy_only: false,
            reject_batch: false,
            seed_from_call: None,
            download_rate: 256_000.0,
            upload_rate: 32_000.0,
        }
    }
}

/// 供测试检视的共享内部状态
#[derive(Debug, Default)]
pub struct SimProbe {
    /// 每次成功 apply_settings 的键列表
    pub applied_batches: Mutex<Vec<Vec<String>>>,
    /// 实际走的添加路径："params" 或 "legacy"
    pub add_path: Mutex<Option<&'static str>>,
    /// remove_torrent 是否已调用成功
    pub removed: AtomicBool,
    pub pause_calls: AtomicU32,
    pub resume_calls: AtomicU32,
}

/// 模拟引擎入口
pub struct SimTorrentEngine {
    script: SimScript,
    pub probe: Arc<SimProbe>,
}

impl SimTorrentEngine {
    pub fn new(script: SimScript) -> Self {
        Self {
            script,
            probe: Arc::new(SimProbe::default()),
        }
    }
}

impl Default for SimTorrentEngine {
    fn default() -> Self {
        Self::new(SimScript::default())
    }
}

#[async_trait]
impl TorrentEngine for SimTorrentEngine {
    async fn new_session(&self) -> Result<Box<dyn TorrentSession>, EngineError> {
        Ok(Box::new(SimSession {
            script: self.script.clone(),
            probe: self.probe.clone(),
        }))
    }
}

struct SimSession {
    script: SimScript,
    probe: Arc<SimProbe>,
}

#[async_trait]
impl TorrentSession for SimSession {
    async fn apply_settings(
        &self,
        settings: &[(String, SettingValue)],
    ) -> Result<(), EngineError> {
        if settings.len() > 1 && self.script.reject_batch {
            return Err(EngineError::Call("批量设置应用失败".to_string()));
        }
        for (key, _) in settings {
            if !self.script.accepted_settings.contains(key) {
                return Err(EngineError::UnsupportedSetting(key.clone()));
            }
        }
        self.probe
            .applied_batches
            .lock()
            .push(settings.iter().map(|(k, _)| k.clone()).collect());
        Ok(())
    }

    async fn add_torrent(
        &self,
        _params: AddTorrentParams,
    ) -> Result<Box<dyn TorrentHandle>, EngineError> {
        if self.script.legacy_only {
            return Err(EngineError::ApiMismatch(
                "没有参数对象形态的添加接口".to_string(),
            ));
        }
        *self.probe.add_path.lock() = Some("params");
        Ok(Box::new(SimHandle::new(self.script.clone(), self.probe.clone())))
    }

    async fn add_magnet_legacy(
        &self,
        _magnet: &str,
        _save_path: &Path,
    ) -> Result<Box<dyn TorrentHandle>, EngineError> {
        *self.probe.add_path.lock() = Some("legacy");
        Ok(Box::new(SimHandle::new(self.script.clone(), self.probe.clone())))
    }

    async fn remove_torrent(&self, _handle: &dyn TorrentHandle) -> Result<(), EngineError> {
        if self.script.fail_remove {
            return Err(EngineError::Call("模拟移除失败".to_string()));
        }
        self.probe.removed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct HandleState {
    status_calls: u32,
    cursor: usize,
    paused: bool,
}

struct SimHandle {
    script: SimScript,
    probe: Arc<SimProbe>,
    state: Mutex<HandleState>,
}

impl SimHandle {
    fn new(script: SimScript, probe: Arc<SimProbe>) -> Self {
        Self {
            script,
            probe,
            state: Mutex::new(HandleState::default()),
        }
    }
}

#[async_trait]
impl TorrentHandle for SimHandle {
    async fn status(&self) -> Result<EngineStatus, EngineError> {
        let mut state = self.state.lock();
        state.status_calls += 1;
        let call = state.status_calls;

        if self.script.fail_status_at == Some(call) {
            return Err(EngineError::Call("模拟状态查询失败".to_string()));
        }

        let has_metadata = call > self.script.metadata_polls;
        let fraction = if has_metadata {
            let idx = state.cursor.min(self.script.progress.len().saturating_sub(1));
            let value = self.script.progress.get(idx).copied().unwrap_or(0.0);
            if !state.paused {
                state.cursor += 1;
            }
            value
        } else {
            0.0
        };

        let state_code = if self.script.seed_from_call.map_or(false, |n| call >= n) {
            STATE_SEEDING
        } else if !has_metadata {
            STATE_DOWNLOADING_METADATA
        } else if fraction >= 1.0 {
            STATE_SEEDING
        } else {
            STATE_DOWNLOADING
        };

        let transferring = has_metadata && !state.paused && fraction < 1.0;
        Ok(EngineStatus {
            fraction_done: fraction,
            download_rate: if transferring { self.script.download_rate } else { 0.0 },
            upload_rate: if transferring { self.script.upload_rate } else { 0.0 },
            state_code,
            has_metadata,
        })
    }

    async fn pause(&self) -> Result<(), EngineError> {
        let call = self.probe.pause_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.script.fail_pause_times {
            return Err(EngineError::Call("模拟暂停失败".to_string()));
        }
        self.state.lock().paused = true;
        Ok(())
    }

    async fn resume(&self) -> Result<(), EngineError> {
        let call = self.probe.resume_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.script.fail_resume_times {
            return Err(EngineError::Call("模拟恢复失败".to_string()));
        }
        self.state.lock().paused = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn handle_from(script: SimScript) -> Box<dyn TorrentHandle> {
        let engine = SimTorrentEngine::new(script);
        let session = engine.new_session().await.unwrap();
        session
            .add_torrent(AddTorrentParams::new("magnet:?xt=urn:btih:abc", "/tmp/dl"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_metadata_delay_then_progress() {
        let script = SimScript {
            metadata_polls: 2,
            progress: vec![0.25, 0.75],
            ..SimScript::default()
        };
        let handle = handle_from(script).await;

        assert!(!handle.status().await.unwrap().has_metadata);
        assert!(!handle.status().await.unwrap().has_metadata);

        let st = handle.status().await.unwrap();
        assert!(st.has_metadata);
        assert_eq!(st.fraction_done, 0.25);
        // 样本耗尽后停在最后一个值
        assert_eq!(handle.status().await.unwrap().fraction_done, 0.75);
        assert_eq!(handle.status().await.unwrap().fraction_done, 0.75);
    }

    #[tokio::test]
    async fn test_pause_freezes_progress() {
        let script = SimScript {
            metadata_polls: 0,
            progress: vec![0.1, 0.2, 0.3],
            ..SimScript::default()
        };
        let handle = handle_from(script).await;

        assert_eq!(handle.status().await.unwrap().fraction_done, 0.1);
        handle.pause().await.unwrap();
        assert_eq!(handle.status().await.unwrap().fraction_done, 0.2);
        assert_eq!(handle.status().await.unwrap().fraction_done, 0.2);
        handle.resume().await.unwrap();
        assert_eq!(handle.status().await.unwrap().fraction_done, 0.2);
        assert_eq!(handle.status().await.unwrap().fraction_done, 0.3);
    }

    #[tokio::test]
    async fn test_status_failure_injection() {
        let script = SimScript {
            metadata_polls: 0,
            fail_status_at: Some(2),
            ..SimScript::default()
        };
        let handle = handle_from(script).await;

        assert!(handle.status().await.is_ok());
        assert!(handle.status().await.is_err());
    }
}
