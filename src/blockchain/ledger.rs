use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::{BlockHash, BlockInfo, TransactionsSinceBlock};

/// Read access to a wallet-enabled full node.
///
/// The monitor only needs these three calls; everything else the node offers
/// is irrelevant to payment tracking.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Wallet transactions in blocks after `anchor` (all of them when `None`),
    /// together with the node's current best block.
    async fn transactions_since(
        &self,
        anchor: Option<&BlockHash>,
    ) -> Result<TransactionsSinceBlock, TransportError>;

    /// Block header data. `Ok(None)` when the node does not know the block.
    async fn get_block(&self, hash: &BlockHash) -> Result<Option<BlockInfo>, TransportError>;

    /// First address of `account`, creating one if the account has none
    async fn resolve_or_create_address(&self, account: &str) -> Result<String, TransportError>;
}
