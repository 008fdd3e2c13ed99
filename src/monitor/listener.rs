use serde::Serialize;
use serde_json::json;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::ListenerError;
use crate::logging::{ErrorLogger, LogContext};
use crate::models::{BlockHash, TransactionRecord};

/// Receiver of monitor events.
///
/// Callbacks run while the monitor holds its state lock, so an implementation
/// must not await any `PaymentMonitor` method from inside a callback. Hand the
/// event to a channel or spawned task instead.
pub trait PaymentListener: Send + Sync {
    /// Label used in logs and listener listings
    fn name(&self) -> &str {
        "listener"
    }

    /// The watermark moved to `block`. Monitor state already reflects it.
    fn on_block_advanced(&self, _block: &BlockHash) -> Result<(), ListenerError> {
        Ok(())
    }

    /// A deposit receipt seen for the first time in the current epoch
    fn on_payment_received(&self, _transaction: &TransactionRecord) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Handle returned by listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerInfo {
    pub id: ListenerId,
    pub name: String,
}

#[derive(Clone)]
pub struct Registration {
    pub id: ListenerId,
    pub listener: Arc<dyn PaymentListener>,
}

/// Ordered listener table. Registration order is notification order.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Vec<Registration>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. Registering the same handle twice returns the first id.
    pub fn add(&mut self, listener: Arc<dyn PaymentListener>) -> ListenerId {
        if let Some(existing) = self.entries.iter().find(|r| Arc::ptr_eq(&r.listener, &listener)) {
            return existing.id;
        }

        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push(Registration { id, listener });
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|r| r.id != id);
        self.entries.len() != before
    }

    pub fn infos(&self) -> Vec<ListenerInfo> {
        self.entries
            .iter()
            .map(|r| ListenerInfo {
                id: r.id,
                name: r.listener.name().to_string(),
            })
            .collect()
    }

    /// Point-in-time copy used for one dispatch round
    pub fn snapshot(&self) -> Vec<Registration> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn invoke<F>(registration: &Registration, event: &str, callback: F) -> bool
where
    F: FnOnce(&dyn PaymentListener) -> Result<(), ListenerError>,
{
    let listener = registration.listener.as_ref();
    let outcome = match catch_unwind(AssertUnwindSafe(|| callback(listener))) {
        Ok(result) => result,
        Err(payload) => Err(ListenerError::Panicked(panic_message(payload))),
    };

    match outcome {
        Ok(()) => true,
        Err(error) => {
            ErrorLogger::log_listener_failure(listener.name(), event, &error);
            false
        }
    }
}

/// Deliver a payment to every listener in order. Returns the number of failed listeners.
pub fn dispatch_payment(listeners: &[Registration], transaction: &TransactionRecord) -> usize {
    listeners
        .iter()
        .filter(|r| !invoke(r, "payment_received", |l| l.on_payment_received(transaction)))
        .count()
}

/// Deliver a block advance to every listener in order. Returns the number of failed listeners.
pub fn dispatch_block(listeners: &[Registration], block: &BlockHash) -> usize {
    listeners
        .iter()
        .filter(|r| !invoke(r, "block_advanced", |l| l.on_block_advanced(block)))
        .count()
}

/// Writes every event to the log
pub struct LoggingListener;

impl PaymentListener for LoggingListener {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_block_advanced(&self, block: &BlockHash) -> Result<(), ListenerError> {
        LogContext::new("listener", "block_advanced")
            .with_block_hash(block)
            .info(&format!("New best block {}", block));
        Ok(())
    }

    fn on_payment_received(&self, transaction: &TransactionRecord) -> Result<(), ListenerError> {
        LogContext::new("listener", "payment_received")
            .with_txid(&transaction.txid)
            .with_metadata("amount", json!(transaction.amount))
            .with_metadata("address", json!(transaction.address))
            .with_metadata("confirmations", json!(transaction.confirmations))
            .info(&format!("Received {} in {}", transaction.amount, transaction.txid));
        Ok(())
    }
}
