//! BT 引擎接入层：trait 抽象、能力协商适配器、模拟后端

pub mod adapter;
pub mod session;
pub mod sim;

pub use adapter::EngineAdapter;
pub use session::{
    phase_label, AddTorrentParams, EngineError, EngineStatus, SettingValue, StorageMode,
    TorrentEngine, TorrentHandle, TorrentSession, STATE_SEEDING,
};
pub use sim::{SimScript, SimTorrentEngine};
