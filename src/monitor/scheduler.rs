use log::{debug, info};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::logging::{ErrorLogger, LogContext};
use crate::models::BlockHash;
use crate::monitor::PaymentMonitor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time from the start of one pass to the start of the next
    pub poll_interval: Duration,
    /// Shortest sleep between two checks of the due time
    pub min_sleep: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5_000),
            min_sleep: Duration::from_millis(100),
        }
    }
}

impl From<&MonitorConfig> for SchedulerConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            min_sleep: config.min_sleep(),
        }
    }
}

/// One-way stop signal shared between the scheduler and its controllers
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to exit after the pass in flight. Idempotent.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!("Requesting payment monitor shutdown");
        }
        self.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub passes: u64,
    pub failures: u64,
}

/// Drives `PaymentMonitor::check_now` at a fixed interval.
///
/// Passes never overlap. A failed pass is logged and the loop keeps going;
/// the monitor state is untouched so the next pass repeats the same work.
///
/// With a start block set, each tick first tries to initialize the monitor
/// there. No pass runs until that succeeds, so a node that is down at boot
/// only delays the first pass.
pub struct PollScheduler {
    monitor: Arc<PaymentMonitor>,
    config: SchedulerConfig,
    start_block: Option<BlockHash>,
    stop: StopHandle,
}

impl PollScheduler {
    pub fn new(monitor: Arc<PaymentMonitor>, config: SchedulerConfig) -> Self {
        Self {
            monitor,
            config,
            start_block: None,
            stop: StopHandle::new(),
        }
    }

    /// Scheduler with the configured timing, initializing at `start_block` when one is set
    pub fn from_config(monitor: Arc<PaymentMonitor>, config: &MonitorConfig) -> Self {
        let scheduler = Self::new(monitor, SchedulerConfig::from(config));
        match config.start_block() {
            Some(block) => scheduler.with_start_block(block),
            None => scheduler,
        }
    }

    pub fn with_start_block(mut self, block: BlockHash) -> Self {
        self.start_block = Some(block);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run passes until stopped
    pub async fn run(&self) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut next_due = Instant::now();
        let mut pending_start = self.start_block.clone();

        let context = LogContext::new("scheduler", "start")
            .with_metadata("poll_interval_ms", serde_json::json!(self.config.poll_interval.as_millis() as u64))
            .with_metadata("monitor_depth", serde_json::json!(self.monitor.monitor_depth()));
        context.info("Payment monitor scheduler started");

        while !self.stop.is_stopped() {
            let now = Instant::now();
            if now >= next_due {
                next_due = now + self.config.poll_interval;

                if let Some(block) = pending_start.take() {
                    if let Err(e) = self.initialize(&block).await {
                        stats.failures += 1;
                        let context = LogContext::new("scheduler", "initialize")
                            .with_block_hash(&block)
                            .with_metadata("failures", serde_json::json!(stats.failures));
                        ErrorLogger::log_error(&e, Some(context));
                        pending_start = Some(block);
                        continue;
                    }
                }

                stats.passes += 1;

                if let Err(e) = self.monitor.check_now().await {
                    stats.failures += 1;
                    let context = LogContext::new("scheduler", "pass")
                        .with_metadata("pass", serde_json::json!(stats.passes));
                    ErrorLogger::log_error(&e, Some(context));
                }
                continue;
            }

            let pause = next_due.saturating_duration_since(now).max(self.config.min_sleep);
            tokio::select! {
                _ = sleep(pause) => {}
                _ = self.stop.notify.notified() => {
                    debug!("Scheduler woken by stop request");
                }
            }
        }

        let context = LogContext::new("scheduler", "stop")
            .with_metadata("passes", serde_json::json!(stats.passes))
            .with_metadata("failures", serde_json::json!(stats.failures));
        context.info("Payment monitor scheduler stopped");

        stats
    }

    /// A monitor that already has a watermark keeps it
    async fn initialize(&self, block: &BlockHash) -> Result<(), MonitorError> {
        match self.monitor.initialize(block.clone()).await {
            Err(MonitorError::AlreadyInitialized { existing }) => {
                LogContext::new("scheduler", "initialize")
                    .with_block_hash(&existing)
                    .warn(&format!("Monitor already initialized, ignoring start block {}", block));
                Ok(())
            }
            other => other,
        }
    }

    /// Run the loop on a tokio task
    pub fn spawn(self) -> (StopHandle, JoinHandle<SchedulerStats>) {
        let handle = self.stop_handle();
        let task = tokio::spawn(async move { self.run().await });
        (handle, task)
    }
}
