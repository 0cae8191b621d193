//! 控制信号
//!
//! 控制面与工作器之间只通过三个原子标志通信：Stop / Pause / Resume。
//! 发送方置位后立即返回，工作器在每轮轮询的固定位置消费。
//! 重复置位没有额外效果（幂等），Stop 一旦置位不再清除。

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// 控制信号种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlSignal {
    Pause,
    Resume,
    Stop,
}

/// 每个任务一份的信号收件箱
#[derive(Debug, Default)]
pub struct SignalBox {
    stop: CancellationToken,
    pause: AtomicBool,
    resume: AtomicBool,
}

impl SignalBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// 投递一个信号（非阻塞，幂等）
    pub fn send(&self, signal: ControlSignal) {
        match signal {
            ControlSignal::Stop => self.stop.cancel(),
            ControlSignal::Pause => self.pause.store(true, Ordering::SeqCst),
            ControlSignal::Resume => self.resume.store(true, Ordering::SeqCst),
        }
    }

    /// Stop 是否已置位（粘性，不可清除）
    pub fn stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn pause_requested(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    pub fn resume_requested(&self) -> bool {
        self.resume.load(Ordering::SeqCst)
    }

    /// 暂停已成功作用于引擎后由工作器清除；失败则保留，下轮重试
    pub fn clear_pause(&self) {
        self.pause.store(false, Ordering::SeqCst);
    }

    pub fn clear_resume(&self) {
        self.resume.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_are_idempotent() {
        let signals = SignalBox::new();

        signals.send(ControlSignal::Pause);
        signals.send(ControlSignal::Pause);
        assert!(signals.pause_requested());

        signals.clear_pause();
        assert!(!signals.pause_requested());
    }

    #[test]
    fn test_stop_is_sticky() {
        let signals = SignalBox::new();
        assert!(!signals.stop_requested());

        signals.send(ControlSignal::Stop);
        assert!(signals.stop_requested());
        // 没有任何清除路径
        assert!(signals.stop_requested());
    }

    #[test]
    fn test_flags_are_independent() {
        let signals = SignalBox::new();

        signals.send(ControlSignal::Pause);
        signals.send(ControlSignal::Resume);
        assert!(signals.pause_requested());
        assert!(signals.resume_requested());

        signals.clear_resume();
        assert!(signals.pause_requested());
        assert!(!signals.resume_requested());
    }
}
