use std::time::Duration;
use tokio::time::sleep;

use crate::config::RpcConfig;
use crate::error::TransportError;
use crate::logging::{ErrorLogger, LogContext, PerformanceMonitor};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn from_rpc_config(config: &RpcConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_delay_ms: config.retry_delay_ms,
            max_delay_ms: config.max_retry_delay_ms,
            ..Self::default()
        }
    }

    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Retry mechanism with exponential backoff and jitter
pub struct RetryManager {
    config: RetryConfig,
    operation_name: String,
}

impl RetryManager {
    pub fn new(operation_name: &str, config: RetryConfig) -> Self {
        Self {
            config,
            operation_name: operation_name.to_string(),
        }
    }

    /// Execute an operation, repeating it while it fails with a recoverable error
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, TransportError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, TransportError>>,
    {
        let monitor = PerformanceMonitor::new(&format!("retry_{}", self.operation_name));
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        ErrorLogger::log_recovery_success(&self.operation_name, attempt, monitor.elapsed_ms());
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            if !error.is_recoverable() {
                let context = LogContext::new("retry", &self.operation_name)
                    .with_retry_count(attempt)
                    .with_metadata("reason", serde_json::json!("non_recoverable"));
                context.debug(&format!("Non-recoverable error, not retrying: {}", error));
                return Err(error);
            }

            ErrorLogger::log_retry_attempt(&self.operation_name, &error, attempt, max_attempts);
            if attempt >= max_attempts {
                return Err(error);
            }

            let delay = self.calculate_delay(attempt);
            let context = LogContext::new("retry", &self.operation_name)
                .with_retry_count(attempt)
                .with_metadata("delay_ms", serde_json::json!(delay.as_millis() as u64));
            context.debug(&format!("Retrying in {}ms (attempt {} of {})", delay.as_millis(), attempt, max_attempts));

            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Calculate delay for the given attempt number
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay_ms as f64;
        let exponential_delay = base_delay * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let capped_delay = exponential_delay.min(self.config.max_delay_ms as f64);

        let final_delay = if self.config.jitter {
            let jitter_factor = 0.1; // 10% jitter
            let jitter = capped_delay * jitter_factor * (rand::random::<f64>() - 0.5);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_retry_config_from_rpc_config() {
        let rpc = RpcConfig {
            max_retries: 7,
            retry_delay_ms: 250,
            max_retry_delay_ms: 2_000,
            ..RpcConfig::default()
        };
        let config = RetryConfig::from_rpc_config(&rpc);
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.initial_delay_ms, 250);
        assert_eq!(config.max_delay_ms, 2_000);
        assert!(config.jitter);
    }

    #[tokio::test]
    async fn test_retry_manager_success_on_first_attempt() {
        let retry_manager = RetryManager::new("test_operation", fast_config(3));

        let result = retry_manager.execute(|| async { Ok::<i32, TransportError>(42) }).await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_manager_recovers_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let retry_manager = RetryManager::new("flaky", fast_config(3));

        let result = retry_manager
            .execute(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TransportError::Connection("refused".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_manager_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let retry_manager = RetryManager::new("down", fast_config(2));

        let result = retry_manager
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TransportError::Timeout { seconds: 1 })
            })
            .await;

        assert!(matches!(result, Err(TransportError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_manager_non_recoverable_error() {
        let calls = &AtomicU32::new(0);
        let retry_manager = RetryManager::new("bad_request", fast_config(5));

        let result = retry_manager
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TransportError::InvalidResponse("missing result".to_string()))
            })
            .await;

        assert!(result.is_err());
        // Should fail immediately without retries for non-recoverable errors
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 200,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: false,
        };

        let retry_manager = RetryManager::new("test", config);

        assert_eq!(retry_manager.calculate_delay(1).as_millis(), 200); // 200 * 2^0
        assert_eq!(retry_manager.calculate_delay(2).as_millis(), 400); // 200 * 2^1
        assert_eq!(retry_manager.calculate_delay(3).as_millis(), 800); // 200 * 2^2
    }

    #[test]
    fn test_delay_calculation_with_max_cap() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay_ms: 500,
            max_delay_ms: 2_000,
            backoff_multiplier: 3.0,
            jitter: false,
        };

        let retry_manager = RetryManager::new("test", config);

        // 500 * 3^4 = 40500, capped
        assert_eq!(retry_manager.calculate_delay(5).as_millis(), 2_000);
    }

    #[test]
    fn test_delay_with_jitter_stays_near_base() {
        let config = RetryConfig {
            jitter: true,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            ..RetryConfig::default()
        };
        let retry_manager = RetryManager::new("test", config);

        let delay = retry_manager.calculate_delay(1).as_millis();
        assert!((950..=1_050).contains(&delay));
    }
}
