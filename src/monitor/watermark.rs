use log::debug;

use crate::blockchain::LedgerClient;
use crate::error::{MonitorError, TransportError};
use crate::models::BlockHash;

/// Last fully processed block plus the query anchor `monitor_depth` blocks behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkTracker {
    last_block: Option<BlockHash>,
    anchor_block: Option<BlockHash>,
    monitor_depth: u32,
}

impl WatermarkTracker {
    pub fn new(monitor_depth: u32) -> Self {
        Self {
            last_block: None,
            anchor_block: None,
            monitor_depth,
        }
    }

    pub fn last_block(&self) -> Option<&BlockHash> {
        self.last_block.as_ref()
    }

    pub fn anchor_block(&self) -> Option<&BlockHash> {
        self.anchor_block.as_ref()
    }

    pub fn monitor_depth(&self) -> u32 {
        self.monitor_depth
    }

    pub fn is_initialized(&self) -> bool {
        self.last_block.is_some()
    }

    /// Whether `tip` differs from the current watermark
    pub fn is_new_tip(&self, tip: &BlockHash) -> bool {
        self.last_block.as_ref() != Some(tip)
    }

    /// Refuse a second starting point
    pub fn ensure_uninitialized(&self) -> Result<(), MonitorError> {
        match &self.last_block {
            Some(existing) => Err(MonitorError::AlreadyInitialized {
                existing: existing.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Move the watermark. The anchor must already be resolved for `last_block`.
    pub fn commit(&mut self, last_block: BlockHash, anchor_block: Option<BlockHash>) {
        self.last_block = Some(last_block);
        self.anchor_block = anchor_block;
    }
}

/// Walk up to `depth` parent links back from `from`.
///
/// Stops at genesis, or at the last block the ledger could still resolve when
/// a link points to a block it no longer knows. Only transport failures are errors.
pub async fn resolve_anchor(
    ledger: &dyn LedgerClient,
    from: Option<&BlockHash>,
    depth: u32,
) -> Result<Option<BlockHash>, TransportError> {
    let mut anchor = match from {
        Some(hash) => hash.clone(),
        None => return Ok(None),
    };
    // block whose parent link led to `anchor`
    let mut child: Option<BlockHash> = None;

    for hop in 0..depth {
        let block = match ledger.get_block(&anchor).await? {
            Some(block) => block,
            None => {
                debug!("Anchor walk stopped after {} hops: block {} not found", hop, anchor);
                if let Some(resolved) = child {
                    anchor = resolved;
                }
                break;
            }
        };

        match block.previous_block_hash {
            Some(previous) => child = Some(std::mem::replace(&mut anchor, previous)),
            None => {
                debug!("Anchor walk reached genesis {} after {} hops", anchor, hop);
                break;
            }
        }
    }

    Ok(Some(anchor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::InMemoryLedger;

    fn chain(len: usize) -> (InMemoryLedger, Vec<String>) {
        let hashes: Vec<String> = (0..len).map(|i| format!("B{:03}", i)).collect();
        let refs: Vec<&str> = hashes.iter().map(String::as_str).collect();
        (InMemoryLedger::with_chain(&refs), hashes)
    }

    #[test]
    fn test_tracker_starts_empty() {
        let tracker = WatermarkTracker::new(6);
        assert!(tracker.last_block().is_none());
        assert!(tracker.anchor_block().is_none());
        assert!(!tracker.is_initialized());
        assert!(tracker.is_new_tip(&BlockHash::from("B000")));
    }

    #[test]
    fn test_commit_and_reinitialize() {
        let mut tracker = WatermarkTracker::new(6);
        assert!(tracker.ensure_uninitialized().is_ok());

        tracker.commit(BlockHash::from("B100"), Some(BlockHash::from("B094")));
        assert_eq!(tracker.last_block(), Some(&BlockHash::from("B100")));
        assert_eq!(tracker.anchor_block(), Some(&BlockHash::from("B094")));
        assert!(!tracker.is_new_tip(&BlockHash::from("B100")));

        match tracker.ensure_uninitialized() {
            Err(MonitorError::AlreadyInitialized { existing }) => assert_eq!(existing, BlockHash::from("B100")),
            other => panic!("expected AlreadyInitialized, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_anchor_exact_depth() {
        let (ledger, hashes) = chain(20);
        let tip = BlockHash::from(hashes[19].as_str());

        let anchor = resolve_anchor(&ledger, Some(&tip), 6).await.unwrap();
        assert_eq!(anchor, Some(BlockHash::from(hashes[13].as_str())));
        assert_eq!(ledger.get_block_calls(), 6);
    }

    #[tokio::test]
    async fn test_anchor_depth_zero_is_watermark() {
        let (ledger, hashes) = chain(3);
        let tip = BlockHash::from(hashes[2].as_str());

        let anchor = resolve_anchor(&ledger, Some(&tip), 0).await.unwrap();
        assert_eq!(anchor, Some(tip));
        assert_eq!(ledger.get_block_calls(), 0);
    }

    #[tokio::test]
    async fn test_anchor_stops_at_genesis() {
        let (ledger, hashes) = chain(3);
        let tip = BlockHash::from(hashes[2].as_str());

        let anchor = resolve_anchor(&ledger, Some(&tip), 10).await.unwrap();
        assert_eq!(anchor, Some(BlockHash::from("B000")));
    }

    #[tokio::test]
    async fn test_anchor_stops_at_pruned_block() {
        let (ledger, hashes) = chain(10);
        ledger.prune_block("B006");
        let tip = BlockHash::from(hashes[9].as_str());

        let anchor = resolve_anchor(&ledger, Some(&tip), 6).await.unwrap();
        assert_eq!(anchor, Some(BlockHash::from("B007")));
        assert_eq!(ledger.get_block_calls(), 4);
    }

    #[tokio::test]
    async fn test_anchor_unknown_watermark_stays_put() {
        let (ledger, _) = chain(3);
        let unknown = BlockHash::from("orphaned");

        let anchor = resolve_anchor(&ledger, Some(&unknown), 6).await.unwrap();
        assert_eq!(anchor, Some(unknown));
    }

    #[tokio::test]
    async fn test_anchor_without_watermark() {
        let (ledger, _) = chain(3);
        let anchor = resolve_anchor(&ledger, None, 6).await.unwrap();
        assert!(anchor.is_none());
        assert_eq!(ledger.get_block_calls(), 0);
    }

    #[tokio::test]
    async fn test_anchor_transport_failure_propagates() {
        let (ledger, hashes) = chain(10);
        ledger.fail_next_block_lookups(1);
        let tip = BlockHash::from(hashes[9].as_str());

        let result = resolve_anchor(&ledger, Some(&tip), 6).await;
        assert!(matches!(result, Err(TransportError::Timeout { .. })));
    }
}
