//! Node configuration consumed by the ledger core.

use std::env;
use std::path::PathBuf;

use crate::ledger::DEFAULT_DIFFICULTY;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Where the JSON ledger file lives.
    pub ledger_path: PathBuf,
    /// Leading zero hex characters required of every sealed block's digest.
    pub difficulty: usize,
    /// Tokens charged per megabyte relayed.
    pub rate_per_mb: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            ledger_path: PathBuf::from("vpn_ledger.json"),
            difficulty: DEFAULT_DIFFICULTY,
            rate_per_mb: 10.0,
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables and defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = env::var("BANDNET_LEDGER_PATH") {
            if !path.trim().is_empty() {
                config.ledger_path = PathBuf::from(path);
            }
        }

        if let Ok(difficulty_str) = env::var("BANDNET_DIFFICULTY") {
            if let Ok(difficulty) = difficulty_str.parse::<usize>() {
                if difficulty >= 1 {
                    config.difficulty = difficulty;
                }
            }
        }

        if let Ok(rate_str) = env::var("BANDNET_RATE_PER_MB") {
            if let Ok(rate) = rate_str.parse::<f64>() {
                if rate >= 0.0 {
                    config.rate_per_mb = rate;
                }
            }
        }

        config
    }
}
