use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash of a block as reported by the node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHash(String);

impl BlockHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockHash {
    fn from(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

impl From<String> for BlockHash {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

/// Transaction identifier (`txid`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    pub fn new(txid: impl Into<String>) -> Self {
        Self(txid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxId {
    fn from(txid: &str) -> Self {
        Self(txid.to_string())
    }
}

impl From<String> for TxId {
    fn from(txid: String) -> Self {
        Self(txid)
    }
}

/// Wallet classification of a transaction entry.
///
/// Only [`TransactionCategory::Receive`] entries are deposit receipts.
/// Categories the node invents later deserialize as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionCategory {
    Send,
    Receive,
    Generate,
    Immature,
    Orphan,
    Move,
    Unknown,
}

impl TransactionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::Send => "send",
            TransactionCategory::Receive => "receive",
            TransactionCategory::Generate => "generate",
            TransactionCategory::Immature => "immature",
            TransactionCategory::Orphan => "orphan",
            TransactionCategory::Move => "move",
            TransactionCategory::Unknown => "unknown",
        }
    }
}

impl From<String> for TransactionCategory {
    fn from(category: String) -> Self {
        match category.as_str() {
            "send" => TransactionCategory::Send,
            "receive" => TransactionCategory::Receive,
            "generate" => TransactionCategory::Generate,
            "immature" => TransactionCategory::Immature,
            "orphan" => TransactionCategory::Orphan,
            "move" => TransactionCategory::Move,
            _ => TransactionCategory::Unknown,
        }
    }
}

impl From<TransactionCategory> for String {
    fn from(category: TransactionCategory) -> Self {
        category.as_str().to_string()
    }
}

/// One wallet transaction entry as returned by `listsinceblock`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub txid: TxId,
    pub category: TransactionCategory,
    pub account: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub amount: f64,
    pub fee: Option<f64>,
    #[serde(default)]
    pub confirmations: i64,
    #[serde(rename = "blockhash")]
    pub block_hash: Option<BlockHash>,
    #[serde(rename = "blockindex")]
    pub block_index: Option<u32>,
    #[serde(rename = "blocktime")]
    pub block_time: Option<i64>,
    pub time: Option<i64>,
    #[serde(rename = "timereceived")]
    pub time_received: Option<i64>,
    pub comment: Option<String>,
    #[serde(rename = "to")]
    pub comment_to: Option<String>,
}

impl TransactionRecord {
    pub fn new(txid: impl Into<TxId>, category: TransactionCategory) -> Self {
        Self {
            txid: txid.into(),
            category,
            account: None,
            address: None,
            amount: 0.0,
            fee: None,
            confirmations: 0,
            block_hash: None,
            block_index: None,
            block_time: None,
            time: None,
            time_received: None,
            comment: None,
            comment_to: None,
        }
    }

    pub fn receive(txid: impl Into<TxId>, amount: f64) -> Self {
        Self::new(txid, TransactionCategory::Receive).with_amount(amount)
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    pub fn with_account(mut self, account: &str) -> Self {
        self.account = Some(account.to_string());
        self
    }

    /// Incoming funds to one of the wallet's accounts
    pub fn is_deposit_receipt(&self) -> bool {
        self.category == TransactionCategory::Receive
    }
}

/// Response of `listsinceblock`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionsSinceBlock {
    pub transactions: Vec<TransactionRecord>,
    /// Best block the node reports at query time
    #[serde(rename = "lastblock")]
    pub last_block: BlockHash,
}

/// Subset of `getblock` the monitor needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub hash: BlockHash,
    /// Absent at genesis
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: Option<BlockHash>,
    #[serde(rename = "nextblockhash")]
    pub next_block_hash: Option<BlockHash>,
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub confirmations: i64,
    #[serde(default)]
    pub time: i64,
}

impl BlockInfo {
    pub fn new(hash: impl Into<BlockHash>, previous: Option<BlockHash>) -> Self {
        Self {
            hash: hash.into(),
            previous_block_hash: previous,
            next_block_hash: None,
            height: 0,
            confirmations: 0,
            time: 0,
        }
    }
}
