use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, HASH_HEX_SIZE};
use crate::error::{LedgerError, Result};

/// Parameters fixed for the lifetime of a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Required count of leading `'0'` hex characters in a mined digest.
    pub difficulty: usize,
    /// Amount credited to the reward address after each mined ledger block.
    pub mining_reward: i64,
    /// Give up after this many nonces. `None` searches until found or cancelled.
    pub max_attempts: Option<u64>,
    /// Split the nonce search across the rayon pool.
    pub parallel: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            max_attempts: None,
            parallel: false,
        }
    }
}

impl ChainConfig {
    pub fn with_difficulty(difficulty: usize) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// A difficulty longer than the digest itself can never be satisfied.
    pub fn check(&self) -> Result<()> {
        if self.difficulty > HASH_HEX_SIZE {
            return Err(LedgerError::DifficultyOutOfRange {
                difficulty: self.difficulty,
                max: HASH_HEX_SIZE,
            });
        }
        Ok(())
    }
}
