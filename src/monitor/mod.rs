pub mod dedup;
pub mod listener;
pub mod payment_monitor;
pub mod scheduler;
pub mod watermark;

pub use dedup::DedupLedger;
pub use listener::{ListenerId, ListenerInfo, LoggingListener, PaymentListener};
pub use payment_monitor::PaymentMonitor;
pub use scheduler::{PollScheduler, SchedulerConfig, SchedulerStats, StopHandle};
pub use watermark::{resolve_anchor, WatermarkTracker};
