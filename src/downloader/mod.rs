pub mod events;
pub mod manager;
pub mod signal;
pub mod task;
pub mod worker;

pub use events::{DownloadEvent, EventPriority};
pub use manager::{DownloadError, DownloadManager};
pub use signal::{ControlSignal, SignalBox};
pub use task::{DownloadTask, TaskStatus};
pub use worker::TaskPolicy;
