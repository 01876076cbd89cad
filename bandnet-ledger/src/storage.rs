//! Disk persistence for the ledger: the whole chain as one pretty-printed
//! JSON document, rewritten on every seal.

use std::fs;
use std::path::Path;

use crate::block::Block;
use crate::error::LedgerError;

/// Load every block from the ledger file, in stored order.
pub fn load_chain(path: &Path) -> Result<Vec<Block>, LedgerError> {
    let raw = fs::read_to_string(path)?;
    let chain = serde_json::from_str(&raw)?;
    Ok(chain)
}

/// Write the full chain to `path`. Goes through a sibling temp file and an
/// atomic rename so a crash mid-write never leaves a truncated ledger behind.
pub fn save_chain(path: &Path, chain: &[Block]) -> Result<(), LedgerError> {
    let json = serde_json::to_string_pretty(chain)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
