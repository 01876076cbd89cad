use thiserror::Error;

/// Errors raised by the ledger store.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("malformed ledger file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid chain: {0}")]
    InvalidChain(String),
    #[error("invalid transaction amount: {0}")]
    InvalidAmount(f64),
}

/// Errors that terminate a metered session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("malformed deposit field: {0:?}")]
    Deposit(String),
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
