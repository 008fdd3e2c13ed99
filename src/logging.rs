use log::{info, warn, error, debug, trace, LevelFilter};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::LoggingConfig;
use crate::error::{ErrorSeverity, ListenerError, MonitorError, TransportError};
use crate::models::{BlockHash, PassReport, TxId};

/// Structured logging context for the monitor
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_block_hash(self, block_hash: &BlockHash) -> Self {
        self.with_metadata("block_hash", json!(block_hash.as_str()))
    }

    pub fn with_txid(self, txid: &TxId) -> Self {
        self.with_metadata("txid", json!(txid.as_str()))
    }

    pub fn with_listener(self, listener: &str) -> Self {
        self.with_metadata("listener", json!(listener))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_retry_count(self, retry_count: u32) -> Self {
        self.with_metadata("retry_count", json!(retry_count))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Times an operation and logs the outcome
pub struct PerformanceMonitor {
    pub start_time: SystemTime,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: SystemTime::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().unwrap_or_default().as_millis() as u64
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();

        let mut context = LogContext::new("performance", &self.operation)
            .with_duration_ms(duration);

        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }

        match result {
            Ok(_) => {
                context.debug(&format!("Operation completed successfully in {}ms", duration));
            }
            Err(e) => {
                context = context.with_metadata("error", json!(e.to_string()));
                context.warn(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Error logging utilities
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &MonitorError, context: Option<LogContext>) {
        let severity = error.severity();

        let mut log_context = context.unwrap_or_else(|| LogContext::new("error", "unknown"));
        log_context = log_context
            .with_metadata("error_type", json!(format!("{:?}", error)))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        if let Some(delay) = error.retry_delay() {
            log_context = log_context.with_metadata("retry_delay_seconds", json!(delay));
        }

        let message = format!("Error occurred: {}", error);

        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_context.error(&message),
            ErrorSeverity::Medium => log_context.warn(&message),
            ErrorSeverity::Low => log_context.info(&message),
        }
    }

    pub fn log_retry_attempt(operation: &str, error: &TransportError, attempt: u32, max_attempts: u32) {
        let context = LogContext::new("retry", operation)
            .with_retry_count(attempt)
            .with_metadata("max_attempts", json!(max_attempts))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        if attempt == max_attempts {
            context.error(&format!("Final attempt failed: {}", error));
        } else {
            context.warn(&format!("Attempt {} of {} failed: {}", attempt, max_attempts, error));
        }
    }

    pub fn log_recovery_success(operation: &str, attempts: u32, total_duration_ms: u64) {
        let context = LogContext::new("retry", "success")
            .with_metadata("operation", json!(operation))
            .with_retry_count(attempts)
            .with_duration_ms(total_duration_ms);

        context.info(&format!("Operation recovered after {} attempts in {}ms", attempts, total_duration_ms));
    }

    pub fn log_listener_failure(listener: &str, event: &str, error: &ListenerError) {
        let context = LogContext::new("dispatcher", event)
            .with_listener(listener)
            .with_metadata("error", json!(error.to_string()));

        context.error(&format!("Listener '{}' failed on {}: {}", listener, event, error));
    }
}

/// Application metrics and monitoring
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_pass_completed(report: &PassReport, duration_ms: u64) {
        let context = LogContext::new("metrics", "pass_completed")
            .with_metadata("anchor", json!(report.anchor.as_ref().map(BlockHash::as_str)))
            .with_metadata("transactions_scanned", json!(report.transactions_scanned))
            .with_metadata("payments_dispatched", json!(report.payments_dispatched))
            .with_metadata("listener_failures", json!(report.listener_failures))
            .with_duration_ms(duration_ms);

        if report.payments_dispatched > 0 || report.advanced() {
            context.info(&format!(
                "Pass dispatched {} payments, watermark {}",
                report.payments_dispatched,
                report
                    .advanced_to
                    .as_ref()
                    .map(|b| format!("advanced to {}", b))
                    .unwrap_or_else(|| "unchanged".to_string())
            ));
        } else {
            context.debug(&format!("Pass scanned {} transactions, nothing new", report.transactions_scanned));
        }
    }

    pub fn log_block_advanced(previous: Option<&BlockHash>, tip: &BlockHash, anchor: Option<&BlockHash>) {
        let context = LogContext::new("metrics", "block_advanced")
            .with_block_hash(tip)
            .with_metadata("previous", json!(previous.map(BlockHash::as_str)))
            .with_metadata("anchor", json!(anchor.map(BlockHash::as_str)));

        context.info(&format!("Watermark advanced to {}", tip));
    }

    pub fn log_payment_dispatched(txid: &TxId, amount: f64, listeners: usize) {
        let context = LogContext::new("metrics", "payment_dispatched")
            .with_txid(txid)
            .with_metadata("amount", json!(amount))
            .with_metadata("listeners", json!(listeners));

        context.debug(&format!("Payment {} dispatched to {} listeners", txid, listeners));
    }
}

fn parse_level(level: &str) -> LevelFilter {
    match level {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Initialize structured logging for the application
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pretty = config.format != "json";

    env_logger::Builder::new()
        .filter_level(parse_level(&config.level))
        .parse_default_env()
        .format(move |buf, record| {
            use std::io::Write;

            let line = record.args().to_string();
            if let Ok(json_value) = serde_json::from_str::<Value>(&line) {
                if pretty {
                    writeln!(buf, "{}", serde_json::to_string_pretty(&json_value)?)
                } else {
                    writeln!(buf, "{}", line)
                }
            } else {
                writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    line
                )
            }
        })
        .try_init()?;

    info!("Structured logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_creation() {
        let context = LogContext::new("test_component", "test_operation");
        assert_eq!(context.component, "test_component");
        assert_eq!(context.operation, "test_operation");
        assert!(context.metadata.is_empty());
    }

    #[test]
    fn test_log_context_with_metadata() {
        let context = LogContext::new("test", "test")
            .with_block_hash(&BlockHash::from("B100"))
            .with_txid(&TxId::from("tx1"))
            .with_listener("audit");

        assert_eq!(context.metadata.get("block_hash"), Some(&json!("B100")));
        assert_eq!(context.metadata.get("txid"), Some(&json!("tx1")));
        assert_eq!(context.metadata.get("listener"), Some(&json!("audit")));
    }

    #[test]
    fn test_performance_monitor() {
        let monitor = PerformanceMonitor::new("test_operation")
            .with_metadata("test_key", json!("test_value"));

        assert_eq!(monitor.operation, "test_operation");
        assert_eq!(monitor.metadata.get("test_key"), Some(&json!("test_value")));

        let result: Result<(), String> = Err("node down".to_string());
        monitor.finish_with_result(&result);
    }

    #[test]
    fn test_log_context_format_message() {
        let context = LogContext::new("monitor", "pass")
            .with_metadata("key", json!("value"));

        let message = context.format_message("INFO", "test message");

        let parsed: Value = serde_json::from_str(&message).expect("Should be valid JSON");
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["component"], "monitor");
        assert_eq!(parsed["operation"], "pass");
        assert_eq!(parsed["message"], "test message");
        assert_eq!(parsed["key"], "value");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), LevelFilter::Trace);
        assert_eq!(parse_level("warn"), LevelFilter::Warn);
        assert_eq!(parse_level("bogus"), LevelFilter::Info);
    }

    #[test]
    fn test_metrics_logging() {
        let report = PassReport {
            anchor: Some(BlockHash::from("B094")),
            transactions_scanned: 2,
            receipts_seen: 1,
            payments_dispatched: 1,
            listener_failures: 0,
            advanced_to: Some(BlockHash::from("B100")),
        };

        // These should not panic
        MetricsLogger::log_rpc_call("listsinceblock", 25, true);
        MetricsLogger::log_pass_completed(&report, 30);
        MetricsLogger::log_block_advanced(None, &BlockHash::from("B100"), Some(&BlockHash::from("B094")));
        MetricsLogger::log_payment_dispatched(&TxId::from("tx1"), 1.5, 2);
        ErrorLogger::log_listener_failure("audit", "payment_received", &ListenerError::Failed("db down".to_string()));
    }
}
