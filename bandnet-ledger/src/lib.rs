pub mod block;
pub mod config;
pub mod error;
pub mod ledger;
pub mod session;
pub mod storage;

// Re-export commonly used types for easy access
pub use block::{Block, Transaction, TxKind, GENESIS_PREV_HASH};
pub use config::NodeConfig;
pub use error::{LedgerError, SessionError};
pub use ledger::{Ledger, DEFAULT_DIFFICULTY};
pub use session::{run_session, SessionSummary, DEPOSIT_FIELD_LEN, PROVIDER_IDENTITY};
