use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::blockchain::LedgerClient;
use crate::error::TransportError;
use crate::models::{BlockHash, BlockInfo, TransactionRecord, TransactionsSinceBlock};

#[derive(Default)]
struct LedgerState {
    blocks: HashMap<BlockHash, BlockInfo>,
    tip: Option<BlockHash>,
    transactions: Vec<TransactionRecord>,
    addresses: HashMap<String, Vec<String>>,
    failures_pending: u32,
    block_failures_pending: u32,
    since_queries: Vec<Option<BlockHash>>,
    get_block_calls: usize,
}

/// Scripted in-process ledger.
///
/// Holds a block tree, a current tip and the transaction list the next
/// `listsinceblock` answers with. Tests and demos drive reorgs by adding
/// blocks on a fork and moving the tip.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger holding a linear chain, first hash is genesis
    pub fn with_chain(hashes: &[&str]) -> Self {
        let ledger = Self::new();
        for hash in hashes {
            ledger.push_block(hash);
        }
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a block on top of the current tip and make it the new tip
    pub fn push_block(&self, hash: &str) -> BlockHash {
        let mut state = self.lock();
        let previous = state.tip.clone();
        let height = previous
            .as_ref()
            .and_then(|p| state.blocks.get(p))
            .map(|b| b.height + 1)
            .unwrap_or(0);

        let mut block = BlockInfo::new(hash, previous.clone());
        block.height = height;
        if let Some(parent) = previous.as_ref().and_then(|p| state.blocks.get_mut(p)) {
            parent.next_block_hash = Some(block.hash.clone());
        }

        let hash = block.hash.clone();
        state.blocks.insert(hash.clone(), block);
        state.tip = Some(hash.clone());
        hash
    }

    /// Insert a block with an explicit parent without touching the tip
    pub fn add_block(&self, hash: &str, previous: Option<&str>) {
        let mut state = self.lock();
        let previous = previous.map(BlockHash::from);
        let height = previous
            .as_ref()
            .and_then(|p| state.blocks.get(p))
            .map(|b| b.height + 1)
            .unwrap_or(0);

        let mut block = BlockInfo::new(hash, previous);
        block.height = height;
        state.blocks.insert(block.hash.clone(), block);
    }

    pub fn set_tip(&self, hash: &str) {
        self.lock().tip = Some(BlockHash::from(hash));
    }

    pub fn tip(&self) -> Option<BlockHash> {
        self.lock().tip.clone()
    }

    /// Transactions returned by every following `transactions_since` call
    pub fn set_transactions(&self, transactions: Vec<TransactionRecord>) {
        self.lock().transactions = transactions;
    }

    pub fn set_addresses(&self, account: &str, addresses: Vec<String>) {
        self.lock().addresses.insert(account.to_string(), addresses);
    }

    /// Forget a block, as a pruned node would
    pub fn prune_block(&self, hash: &str) {
        self.lock().blocks.remove(&BlockHash::from(hash));
    }

    /// Fail the next `count` calls of any kind
    pub fn fail_next(&self, count: u32) {
        self.lock().failures_pending = count;
    }

    /// Fail the next `count` block lookups only
    pub fn fail_next_block_lookups(&self, count: u32) {
        self.lock().block_failures_pending = count;
    }

    /// Anchors the monitor queried with, oldest first
    pub fn since_queries(&self) -> Vec<Option<BlockHash>> {
        self.lock().since_queries.clone()
    }

    pub fn get_block_calls(&self) -> usize {
        self.lock().get_block_calls
    }

    fn take_failure(state: &mut LedgerState) -> Result<(), TransportError> {
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(TransportError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn transactions_since(
        &self,
        anchor: Option<&BlockHash>,
    ) -> Result<TransactionsSinceBlock, TransportError> {
        let mut state = self.lock();
        state.since_queries.push(anchor.cloned());
        Self::take_failure(&mut state)?;

        let last_block = state
            .tip
            .clone()
            .ok_or_else(|| TransportError::Unavailable("ledger has no blocks".to_string()))?;

        Ok(TransactionsSinceBlock {
            transactions: state.transactions.clone(),
            last_block,
        })
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<Option<BlockInfo>, TransportError> {
        let mut state = self.lock();
        state.get_block_calls += 1;
        Self::take_failure(&mut state)?;
        if state.block_failures_pending > 0 {
            state.block_failures_pending -= 1;
            return Err(TransportError::Timeout { seconds: 0 });
        }

        Ok(state.blocks.get(hash).cloned())
    }

    async fn resolve_or_create_address(&self, account: &str) -> Result<String, TransportError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;

        let addresses = state.addresses.entry(account.to_string()).or_default();
        if let Some(address) = addresses.first() {
            return Ok(address.clone());
        }

        let address = format!("R{}{:04}", account, addresses.len() + 1);
        addresses.push(address.clone());
        Ok(address)
    }
}
