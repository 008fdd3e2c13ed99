use thiserror::Error;

use crate::models::BlockHash;

/// Main error type for the payment monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Ledger transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Watermark already initialized at block {existing}")]
    AlreadyInitialized { existing: BlockHash },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while talking to the ledger node
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i32, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Wrong response id (expected: {expected}, response: {got})")]
    ResponseIdMismatch { expected: String, got: String },

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Raised by a listener callback. Never leaves the dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    #[error("Listener failed: {0}")]
    Failed(String),

    #[error("Listener panicked: {0}")]
    Panicked(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Node error code for "block not found"
pub const RPC_INVALID_ADDRESS_OR_KEY: i32 = -5;
/// Node error code returned while the node is still loading its index
pub const RPC_IN_WARMUP: i32 = -28;

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that require immediate attention
    Critical,
    /// High priority errors that affect functionality
    High,
    /// Medium priority errors that may affect performance
    Medium,
    /// Low priority errors that are mostly informational
    Low,
}

impl TransportError {
    /// Whether a single RPC call failing with this error is worth repeating
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::Timeout { .. } => true,
            TransportError::Connection(_) => true,
            TransportError::Unavailable(_) => true,
            TransportError::Status { status, .. } => *status >= 500 || *status == 429,
            TransportError::Http(e) => e.is_timeout() || e.is_connect(),
            TransportError::Method { code, .. } => *code == RPC_IN_WARMUP,

            TransportError::Json(_) => false,
            TransportError::InvalidResponse(_) => false,
            TransportError::ResponseIdMismatch { .. } => false,
        }
    }

    /// True when the node rejected our credentials
    pub fn is_authentication(&self) -> bool {
        matches!(self, TransportError::Status { status: 401 | 403, .. })
    }
}

impl MonitorError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MonitorError::Config(_) => ErrorSeverity::Critical,
            MonitorError::AlreadyInitialized { .. } => ErrorSeverity::High,

            MonitorError::Transport(e) if e.is_authentication() => ErrorSeverity::High,
            MonitorError::Transport(TransportError::Connection(_)) => ErrorSeverity::High,
            MonitorError::Transport(TransportError::ResponseIdMismatch { .. }) => ErrorSeverity::High,

            MonitorError::Transport(TransportError::Timeout { .. }) => ErrorSeverity::Medium,
            MonitorError::Transport(TransportError::Method { .. }) => ErrorSeverity::Medium,

            MonitorError::Transport(TransportError::Unavailable(_)) => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }

    /// Check if the error is recoverable (the next pass may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            MonitorError::Transport(_) => true,

            // Programmer or operator errors
            MonitorError::AlreadyInitialized { .. } => false,
            MonitorError::Config(_) => false,
        }
    }

    /// Get suggested retry delay in seconds for recoverable errors
    pub fn retry_delay(&self) -> Option<u64> {
        if !self.is_recoverable() {
            return None;
        }

        match self {
            MonitorError::Transport(TransportError::Timeout { .. }) => Some(5),
            MonitorError::Transport(TransportError::Connection(_)) => Some(10),
            MonitorError::Transport(TransportError::Method { code, .. }) if *code == RPC_IN_WARMUP => Some(15),
            _ => Some(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let critical_error = MonitorError::Config(ConfigError::InvalidUrl("ftp://node".to_string()));
        assert_eq!(critical_error.severity(), ErrorSeverity::Critical);

        let high_error = MonitorError::Transport(TransportError::Status {
            status: 401,
            body: "Unauthorized".to_string(),
        });
        assert_eq!(high_error.severity(), ErrorSeverity::High);

        let medium_error = MonitorError::Transport(TransportError::Timeout { seconds: 30 });
        assert_eq!(medium_error.severity(), ErrorSeverity::Medium);

        let low_error = MonitorError::Transport(TransportError::Unavailable("maintenance".to_string()));
        assert_eq!(low_error.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_error_recoverability() {
        let recoverable = MonitorError::Transport(TransportError::Timeout { seconds: 30 });
        assert!(recoverable.is_recoverable());

        let twice = MonitorError::AlreadyInitialized { existing: BlockHash::from("00ab") };
        assert!(!twice.is_recoverable());
        assert_eq!(twice.retry_delay(), None);
    }

    #[test]
    fn test_transport_recoverability() {
        assert!(TransportError::Connection("refused".to_string()).is_recoverable());
        assert!(TransportError::Status { status: 503, body: String::new() }.is_recoverable());
        assert!(TransportError::Method { code: RPC_IN_WARMUP, message: "Loading block index".to_string() }.is_recoverable());

        assert!(!TransportError::Status { status: 401, body: String::new() }.is_recoverable());
        assert!(!TransportError::Method { code: -32601, message: "Method not found".to_string() }.is_recoverable());
        assert!(!TransportError::InvalidResponse("no result".to_string()).is_recoverable());
    }

    #[test]
    fn test_retry_delay() {
        let timeout_error = MonitorError::Transport(TransportError::Timeout { seconds: 30 });
        assert_eq!(timeout_error.retry_delay(), Some(5));

        let warmup = MonitorError::Transport(TransportError::Method {
            code: RPC_IN_WARMUP,
            message: "Loading block index...".to_string(),
        });
        assert_eq!(warmup.retry_delay(), Some(15));
    }

    #[test]
    fn test_error_display() {
        let error = MonitorError::Transport(TransportError::Method {
            code: -32601,
            message: "Method not found".to_string(),
        });
        assert_eq!(
            format!("{}", error),
            "Ledger transport error: RPC method error: code=-32601, message=Method not found"
        );

        let error = MonitorError::AlreadyInitialized { existing: BlockHash::from("B100") };
        assert_eq!(format!("{}", error), "Watermark already initialized at block B100");
    }

    #[test]
    fn test_listener_error_display() {
        assert_eq!(
            ListenerError::Panicked("boom".to_string()).to_string(),
            "Listener panicked: boom"
        );
    }
}
