//! Error types for Tally

/// Main error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("Buffer fault: {0}")]
    BufferFault(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TallyError {
    /// Whether this error points at a broken locking invariant rather than
    /// a recoverable storage condition. Fatal errors must not be swallowed
    /// by retry logic.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BufferFault(_))
    }
}

impl From<mongodb::error::Error> for TallyError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Ledger(err.to_string())
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, TallyError>;
