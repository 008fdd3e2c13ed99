use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::blockchain::LedgerClient;
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{BlockHash, MonitorStatus, PassReport};
use crate::monitor::dedup::DedupLedger;
use crate::monitor::listener::{dispatch_block, dispatch_payment, ListenerId, ListenerInfo, ListenerRegistry, PaymentListener};
use crate::monitor::watermark::{resolve_anchor, WatermarkTracker};

struct MonitorState {
    watermark: WatermarkTracker,
    dedup: DedupLedger,
    listeners: ListenerRegistry,
}

/// Reorg-tolerant watcher for incoming payments and new best blocks.
///
/// Every pass re-queries the ledger from an anchor `monitor_depth` blocks
/// behind the watermark, delivers each receipt at most once per watermark
/// epoch, and advances the watermark when the node reports a new tip.
///
/// All state sits behind one async mutex held for the whole pass, listener
/// callbacks included. A listener therefore must not await this monitor's
/// methods from inside a callback.
pub struct PaymentMonitor {
    ledger: Arc<dyn LedgerClient>,
    monitor_depth: u32,
    state: Mutex<MonitorState>,
}

impl PaymentMonitor {
    pub fn new(ledger: Arc<dyn LedgerClient>, monitor_depth: u32) -> Self {
        Self {
            ledger,
            monitor_depth,
            state: Mutex::new(MonitorState {
                watermark: WatermarkTracker::new(monitor_depth),
                dedup: DedupLedger::new(),
                listeners: ListenerRegistry::new(),
            }),
        }
    }

    /// Monitor with the configured depth, initialized at `start_block` when one is set
    pub async fn from_config(ledger: Arc<dyn LedgerClient>, config: &MonitorConfig) -> Result<Self> {
        let monitor = Self::new(ledger, config.monitor_depth);
        if let Some(start_block) = config.start_block() {
            monitor.initialize(start_block).await?;
        }
        Ok(monitor)
    }

    /// Set the starting watermark. Allowed once.
    pub async fn initialize(&self, block: BlockHash) -> Result<()> {
        let mut state = self.state.lock().await;
        state.watermark.ensure_uninitialized()?;

        let anchor = resolve_anchor(self.ledger.as_ref(), Some(&block), self.monitor_depth).await?;

        let context = LogContext::new("payment_monitor", "initialize")
            .with_block_hash(&block)
            .with_metadata("anchor", json!(anchor.as_ref().map(BlockHash::as_str)));
        context.info(&format!("Watermark initialized at {}", block));

        state.watermark.commit(block, anchor);
        Ok(())
    }

    /// Run one reconciliation pass now, waiting for any pass in flight to finish first
    pub async fn check_now(&self) -> Result<PassReport> {
        let mut state = self.state.lock().await;
        let monitor = PerformanceMonitor::new("reconciliation_pass")
            .with_metadata("anchor", json!(state.watermark.anchor_block().map(BlockHash::as_str)));

        let result = self.reconcile(&mut state).await;
        let duration = monitor.finish_with_result(&result);

        if let Ok(report) = &result {
            MetricsLogger::log_pass_completed(report, duration);
        }
        result
    }

    async fn reconcile(&self, state: &mut MonitorState) -> Result<PassReport> {
        let anchor = state.watermark.anchor_block().cloned();
        let since = self.ledger.transactions_since(anchor.as_ref()).await?;
        let listeners = state.listeners.snapshot();

        let mut report = PassReport {
            anchor,
            transactions_scanned: since.transactions.len(),
            ..PassReport::default()
        };

        let tip = since.last_block;
        // nothing is mutated or dispatched until the new anchor is known
        let new_anchor = if state.watermark.is_new_tip(&tip) {
            let anchor = resolve_anchor(self.ledger.as_ref(), Some(&tip), self.monitor_depth).await?;
            state.dedup.reset_epoch();
            Some(anchor)
        } else {
            None
        };

        for transaction in since.transactions.iter().filter(|t| t.is_deposit_receipt()) {
            report.receipts_seen += 1;
            if !state.dedup.observe(transaction) {
                continue;
            }
            report.listener_failures += dispatch_payment(&listeners, transaction);
            report.payments_dispatched += 1;
            MetricsLogger::log_payment_dispatched(&transaction.txid, transaction.amount, listeners.len());
        }

        let Some(new_anchor) = new_anchor else {
            return Ok(report);
        };

        let previous = state.watermark.last_block().cloned();
        state.watermark.commit(tip.clone(), new_anchor);
        MetricsLogger::log_block_advanced(previous.as_ref(), &tip, state.watermark.anchor_block());

        report.listener_failures += dispatch_block(&listeners, &tip);
        report.advanced_to = Some(tip);
        Ok(report)
    }

    pub async fn add_listener(&self, listener: Arc<dyn PaymentListener>) -> ListenerId {
        let mut state = self.state.lock().await;
        let id = state.listeners.add(listener);
        LogContext::new("payment_monitor", "add_listener")
            .with_metadata("listener_id", json!(id))
            .debug(&format!("Listener {} registered", id));
        id
    }

    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        self.state.lock().await.listeners.remove(id)
    }

    pub async fn listeners(&self) -> Vec<ListenerInfo> {
        self.state.lock().await.listeners.infos()
    }

    pub async fn last_block(&self) -> Option<BlockHash> {
        self.state.lock().await.watermark.last_block().cloned()
    }

    pub async fn anchor_block(&self) -> Option<BlockHash> {
        self.state.lock().await.watermark.anchor_block().cloned()
    }

    pub fn monitor_depth(&self) -> u32 {
        self.monitor_depth
    }

    pub async fn status(&self) -> MonitorStatus {
        let state = self.state.lock().await;
        MonitorStatus {
            last_block: state.watermark.last_block().cloned(),
            anchor_block: state.watermark.anchor_block().cloned(),
            monitor_depth: self.monitor_depth,
            seen_in_epoch: state.dedup.len(),
            listener_count: state.listeners.len(),
        }
    }

    /// Deposit address for `account`, created on the node if it has none yet
    pub async fn account_address(&self, account: &str) -> Result<String> {
        Ok(self.ledger.resolve_or_create_address(account).await?)
    }
}
