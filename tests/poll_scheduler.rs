use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout};

use komodo_payment_monitor::error::ListenerError;
use komodo_payment_monitor::{
    BlockHash, InMemoryLedger, PaymentListener, PaymentMonitor, PollScheduler, SchedulerConfig, StopHandle,
    TransactionRecord,
};

fn config(poll_interval_ms: u64) -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_millis(poll_interval_ms),
        min_sleep: Duration::from_millis(5),
    }
}

fn ledger() -> Arc<InMemoryLedger> {
    Arc::new(InMemoryLedger::with_chain(&["G", "B1", "B2", "B3"]))
}

/// Stops the scheduler from inside a callback
struct StopOnBlock {
    stop: Mutex<Option<StopHandle>>,
    blocks: Mutex<Vec<BlockHash>>,
}

impl PaymentListener for StopOnBlock {
    fn on_block_advanced(&self, block: &BlockHash) -> Result<(), ListenerError> {
        self.blocks.lock().unwrap().push(block.clone());
        if let Some(stop) = self.stop.lock().unwrap().as_ref() {
            stop.stop();
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_scheduler_polls_repeatedly() {
    let ledger = ledger();
    let monitor = Arc::new(PaymentMonitor::new(ledger.clone(), 2));
    let scheduler = PollScheduler::new(monitor, config(30));

    let (stop, task) = scheduler.spawn();
    sleep(Duration::from_millis(200)).await;
    stop.stop();
    let stats = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

    assert!(stats.passes >= 3, "expected several passes, got {}", stats.passes);
    assert_eq!(stats.failures, 0);
    assert_eq!(ledger.since_queries().len() as u64, stats.passes);
}

#[tokio::test]
async fn test_scheduler_survives_failed_passes() {
    let ledger = ledger();
    ledger.fail_next(2);
    ledger.set_transactions(vec![TransactionRecord::receive("tx1", 1.0)]);
    let monitor = Arc::new(PaymentMonitor::new(ledger.clone(), 2));
    let scheduler = PollScheduler::new(monitor.clone(), config(20));

    let (stop, task) = scheduler.spawn();
    sleep(Duration::from_millis(250)).await;
    stop.stop();
    let stats = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

    assert_eq!(stats.failures, 2);
    assert!(stats.passes > 2);
    assert_eq!(monitor.last_block().await, Some(BlockHash::from("B3")));
}

#[tokio::test]
async fn test_stop_interrupts_long_sleep() {
    let monitor = Arc::new(PaymentMonitor::new(ledger(), 2));
    let scheduler = PollScheduler::new(monitor, config(60_000));

    let (stop, task) = scheduler.spawn();
    sleep(Duration::from_millis(50)).await;
    stop.stop();
    stop.stop();

    let stats = timeout(Duration::from_secs(1), task)
        .await
        .expect("scheduler should stop promptly")
        .unwrap();
    assert_eq!(stats.passes, 1);
}

#[tokio::test]
async fn test_stop_during_pass_lets_it_finish() {
    let ledger = ledger();
    let monitor = Arc::new(PaymentMonitor::new(ledger.clone(), 2));
    let listener = Arc::new(StopOnBlock {
        stop: Mutex::new(None),
        blocks: Mutex::new(Vec::new()),
    });
    monitor.add_listener(listener.clone()).await;

    let scheduler = PollScheduler::new(monitor.clone(), config(10));
    *listener.stop.lock().unwrap() = Some(scheduler.stop_handle());

    let stats = timeout(Duration::from_secs(1), scheduler.run()).await.unwrap();

    assert_eq!(stats.passes, 1);
    assert_eq!(*listener.blocks.lock().unwrap(), vec![BlockHash::from("B3")]);
    assert_eq!(monitor.last_block().await, Some(BlockHash::from("B3")));
}

#[tokio::test]
async fn test_manual_check_alongside_scheduler() {
    let ledger = ledger();
    ledger.set_transactions(vec![TransactionRecord::receive("tx1", 1.0)]);
    let monitor = Arc::new(PaymentMonitor::new(ledger.clone(), 2));
    let scheduler = PollScheduler::new(monitor.clone(), config(15));

    let (stop, task) = scheduler.spawn();
    for _ in 0..5 {
        monitor.check_now().await.unwrap();
        sleep(Duration::from_millis(10)).await;
    }
    stop.stop();
    timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

    let status = monitor.status().await;
    assert_eq!(status.last_block, Some(BlockHash::from("B3")));
    assert_eq!(status.seen_in_epoch, 1);
}

#[tokio::test]
async fn test_start_block_retried_until_node_answers() {
    let ledger = ledger();
    ledger.fail_next_block_lookups(3);
    let monitor = Arc::new(PaymentMonitor::new(ledger.clone(), 2));
    let scheduler = PollScheduler::new(monitor.clone(), config(10)).with_start_block(BlockHash::from("B2"));

    let (stop, task) = scheduler.spawn();
    sleep(Duration::from_millis(200)).await;
    stop.stop();
    let stats = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

    assert_eq!(stats.failures, 3);
    assert!(stats.passes >= 1);
    assert_eq!(monitor.last_block().await, Some(BlockHash::from("B3")));
    // the first pass already queried from the start block's anchor
    assert_eq!(ledger.since_queries()[0], Some(BlockHash::from("G")));
}

#[tokio::test]
async fn test_no_pass_runs_before_start_block_is_set() {
    let ledger = ledger();
    ledger.fail_next_block_lookups(1_000);
    let monitor = Arc::new(PaymentMonitor::new(ledger.clone(), 2));
    let scheduler = PollScheduler::new(monitor.clone(), config(10)).with_start_block(BlockHash::from("B2"));

    let (stop, task) = scheduler.spawn();
    sleep(Duration::from_millis(80)).await;
    stop.stop();
    let stats = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

    assert_eq!(stats.passes, 0);
    assert!(stats.failures >= 2);
    assert!(ledger.since_queries().is_empty());
    assert!(monitor.last_block().await.is_none());
}
