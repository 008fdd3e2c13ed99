pub mod transaction;
pub mod report;

pub use transaction::{BlockHash, BlockInfo, TransactionCategory, TransactionRecord, TransactionsSinceBlock, TxId};
pub use report::{MonitorStatus, PassReport};
