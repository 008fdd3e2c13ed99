pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod retry;

pub use blockchain::{InMemoryLedger, LedgerClient, RpcClient};
pub use config::{AppConfig, LoggingConfig, MonitorConfig, NodeConf, RpcConfig};
pub use error::{ConfigError, ListenerError, MonitorError, Result, TransportError};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use models::{BlockHash, BlockInfo, MonitorStatus, PassReport, TransactionCategory, TransactionRecord, TxId};
pub use monitor::{
    ListenerId, ListenerInfo, LoggingListener, PaymentListener, PaymentMonitor, PollScheduler, SchedulerConfig,
    SchedulerStats, StopHandle,
};
pub use retry::{RetryConfig, RetryManager};
