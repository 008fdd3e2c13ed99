use serde::Serialize;

use super::BlockHash;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Block the ledger was queried from (`None` = unscoped query)
    pub anchor: Option<BlockHash>,
    pub transactions_scanned: usize,
    pub receipts_seen: usize,
    pub payments_dispatched: usize,
    pub listener_failures: usize,
    /// New watermark, if the pass moved it
    pub advanced_to: Option<BlockHash>,
}

impl PassReport {
    pub fn advanced(&self) -> bool {
        self.advanced_to.is_some()
    }
}

/// Point-in-time view of the monitor state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub last_block: Option<BlockHash>,
    pub anchor_block: Option<BlockHash>,
    pub monitor_depth: u32,
    pub seen_in_epoch: usize,
    pub listener_count: usize,
}
