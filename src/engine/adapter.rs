//! 引擎适配器
//!
//! 不同版本的引擎支持的会话设置集合不同，PEX 开关的键名历史上改过几次，
//! 添加种子的接口也有新旧两种形态。适配器在这里做能力协商与降级，
//! 上层（下载工作器）拿到的是已经协商好的会话与句柄。

use crate::engine::session::{
    AddTorrentParams, EngineError, SettingValue, TorrentEngine, TorrentHandle, TorrentSession,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// PEX 开关在各版本引擎中的键名别名，按新到旧的顺序尝试
const PEX_ALIASES: [&str; 3] = ["enable_pex", "enable_peer_exchange", "pex"];

/// 引擎适配器：持有引擎入口，负责会话创建与种子添加
#[derive(Clone)]
pub struct EngineAdapter {
    engine: Arc<dyn TorrentEngine>,
}

impl EngineAdapter {
    pub fn new(engine: Arc<dyn TorrentEngine>) -> Self {
        Self { engine }
    }

    /// 可选会话设置的候选列表（不含 PEX，PEX 另走别名探测）
    fn optional_settings(listen_interface: &str) -> Vec<(String, SettingValue)> {
        vec![
            ("enable_dht".to_string(), SettingValue::Bool(true)),
            ("enable_lsd".to_string(), SettingValue::Bool(true)),
            ("enable_upnp".to_string(), SettingValue::Bool(true)),
            ("enable_natpmp".to_string(), SettingValue::Bool(true)),
            (
                "listen_interfaces".to_string(),
                SettingValue::Str(listen_interface.to_string()),
            ),
        ]
    }

    /// 创建会话并做能力协商。
    ///
    /// 每个候选设置单独探测，不被支持的静默丢弃；探测通过的集合
    /// 最后批量应用一次，批量应用失败也不致命（逐键探测时已经生效过）。
    pub async fn create_session(
        &self,
        listen_interface: &str,
    ) -> Result<Box<dyn TorrentSession>, EngineError> {
        let session = self.engine.new_session().await?;

        let mut candidates = Self::optional_settings(listen_interface);

        // PEX 键名别名按顺序尝试，取第一个被接受的
        for alias in PEX_ALIASES {
            let probe = (alias.to_string(), SettingValue::Bool(true));
            if session.apply_settings(std::slice::from_ref(&probe)).await.is_ok() {
                debug!("PEX 设置键协商成功: {}", alias);
                candidates.push(probe);
                break;
            }
        }

        let mut accepted = Vec::new();
        for candidate in candidates {
            match session.apply_settings(std::slice::from_ref(&candidate)).await {
                Ok(()) => accepted.push(candidate),
                Err(e) => debug!("引擎不支持设置 {}，已跳过: {}", candidate.0, e),
            }
        }

        if !accepted.is_empty() {
            if let Err(e) = session.apply_settings(&accepted).await {
                // 逐键探测时各项已分别生效，批量失败只记录
                warn!("批量应用会话设置失败（忽略）: {}", e);
            }
        }

        info!(
            "引擎会话已创建，协商通过 {} 项设置: [{}]",
            accepted.len(),
            accepted
                .iter()
                .map(|(k, _)| k.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(session)
    }

    /// 向会话添加一个 magnet 下载。
    ///
    /// 先确保目标目录存在；优先走新式参数对象接口，
    /// 引擎报 `ApiMismatch` 时回退到旧式接口。
    pub async fn start_transfer(
        &self,
        session: &dyn TorrentSession,
        magnet: &str,
        save_path: &Path,
    ) -> Result<Box<dyn TorrentHandle>, EngineError> {
        tokio::fs::create_dir_all(save_path)
            .await
            .map_err(|e| EngineError::Call(format!("创建下载目录失败: {}", e)))?;

        match session.add_torrent(AddTorrentParams::new(magnet, save_path)).await {
            Ok(handle) => Ok(handle),
            Err(EngineError::ApiMismatch(reason)) => {
                debug!("新式添加接口不可用（{}），回退旧式接口", reason);
                session.add_magnet_legacy(magnet, save_path).await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sim::{SimScript, SimTorrentEngine};
    use std::collections::HashSet;

    fn engine_with(script: SimScript) -> (EngineAdapter, Arc<SimTorrentEngine>) {
        let engine = Arc::new(SimTorrentEngine::new(script));
        (EngineAdapter::new(engine.clone()), engine)
    }

    #[tokio::test]
    async fn test_probe_keeps_accepted_drops_rejected() {
        let script = SimScript {
            accepted_settings: ["enable_dht", "listen_interfaces", "enable_pex"]
                .iter()
                .map(|s| s.to_string())
                .collect::<HashSet<_>>(),
            ..SimScript::default()
        };
        let (adapter, engine) = engine_with(script);

        adapter.create_session("0.0.0.0:6881").await.unwrap();

        let batches = engine.probe.applied_batches.lock().clone();
        // 最后一次是批量应用，只含协商通过的键
        let last: HashSet<String> = batches.last().unwrap().iter().cloned().collect();
        assert_eq!(
            last,
            ["enable_dht", "listen_interfaces", "enable_pex"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        );
        assert!(!batches.iter().flatten().any(|k| k == "enable_upnp"));
    }

    #[tokio::test]
    async fn test_pex_alias_fallback_to_legacy_key() {
        let mut accepted: HashSet<String> =
            ["enable_dht", "enable_lsd", "enable_upnp", "enable_natpmp", "listen_interfaces"]
                .iter()
                .map(|s| s.to_string())
                .collect();
        accepted.insert("pex".to_string());
        let script = SimScript { accepted_settings: accepted, ..SimScript::default() };
        let (adapter, engine) = engine_with(script);

        adapter.create_session("0.0.0.0:6881").await.unwrap();

        let batches = engine.probe.applied_batches.lock().clone();
        let last = batches.last().unwrap();
        assert!(last.iter().any(|k| k == "pex"));
        assert!(!last.iter().any(|k| k == "enable_pex"));
    }

    #[tokio::test]
    async fn test_batch_apply_failure_is_tolerated() {
        let script = SimScript { reject_batch: true, ..SimScript::default() };
        let (adapter, _engine) = engine_with(script);

        let result = adapter.create_session("0.0.0.0:6881").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_start_transfer_falls_back_to_legacy_api() {
        let script = SimScript { legacy_only: true, ..SimScript::default() };
        let (adapter, engine) = engine_with(script);
        let session = adapter.create_session("0.0.0.0:6881").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let handle = adapter
            .start_transfer(session.as_ref(), "magnet:?xt=urn:btih:abc", dir.path())
            .await;

        assert!(handle.is_ok());
        assert_eq!(*engine.probe.add_path.lock(), Some("legacy"));
    }

    #[tokio::test]
    async fn test_start_transfer_creates_destination_dir() {
        let (adapter, engine) = engine_with(SimScript::default());
        let session = adapter.create_session("0.0.0.0:6881").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("games").join("repack");
        adapter
            .start_transfer(session.as_ref(), "magnet:?xt=urn:btih:abc", &nested)
            .await
            .unwrap();

        assert!(nested.is_dir());
        assert_eq!(*engine.probe.add_path.lock(), Some("params"));
    }
}
