use thiserror::Error;

/// Bridge error types covering configuration, publishing, and scheduling failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The publishing sink refused a line.
    #[error("sink rejected line: {0}")]
    Sink(String),

    /// I/O operation error.
    #[error("I/O error: {0}")]
    Io(String),

    /// A meter with the same id is already registered.
    #[error("meter already registered: {0}")]
    DuplicateMeter(String),

    /// Poll scheduler lifecycle error.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Convenience type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
