pub mod ledger;
pub mod memory;
pub mod rpc_client;

pub use ledger::LedgerClient;
pub use memory::InMemoryLedger;
pub use rpc_client::RpcClient;
