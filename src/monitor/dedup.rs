use std::collections::HashSet;

use crate::models::{TransactionRecord, TxId};

/// Transaction ids already delivered in the current watermark epoch
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<TxId>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time a deposit receipt is observed in this epoch.
    /// Other categories are never recorded.
    pub fn observe(&mut self, transaction: &TransactionRecord) -> bool {
        if !transaction.is_deposit_receipt() {
            return false;
        }
        self.seen.insert(transaction.txid.clone())
    }

    pub fn contains(&self, txid: &TxId) -> bool {
        self.seen.contains(txid)
    }

    pub fn reset_epoch(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
