use crate::{
    constants::{CANCEL_POLL_INTERVAL, HASH_HEX_SIZE, PROGRESS_LOG_INTERVAL},
    digest_with_nonce,
    pow::meets_difficulty,
    Block, ChainConfig, LedgerError, Payload, Result,
};
use rayon::prelude::*;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Shared flag that stops an in-flight nonce search. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Once set the flag stays set.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MiningStats {
    pub nonce: u64,
    pub attempts: u64,
    pub elapsed: Duration,
}

/// Proof-of-work search: varies the nonce until the digest starts with
/// `difficulty` zero characters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Miner {
    difficulty: usize,
    max_attempts: Option<u64>,
    parallel: bool,
}

impl Miner {
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty,
            max_attempts: None,
            parallel: false,
        }
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            difficulty: config.difficulty,
            max_attempts: config.max_attempts,
            parallel: config.parallel,
        }
    }

    /// Bound the search. At least one nonce is always tried.
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Mines `block` in place, starting from its current nonce. The digest is
    /// recomputed from the current fields before the first check, so a stale
    /// digest never passes. On error the block is left untouched.
    pub fn mine<P: Payload>(&self, block: &mut Block<P>, cancel: &CancelToken) -> Result<MiningStats> {
        if self.difficulty > HASH_HEX_SIZE {
            return Err(LedgerError::DifficultyOutOfRange {
                difficulty: self.difficulty,
                max: HASH_HEX_SIZE,
            });
        }
        let prefix = block.digest_prefix()?;
        let started = Instant::now();

        let (nonce, attempts) = if self.parallel {
            self.search_parallel(&prefix, block.nonce, cancel, started)?
        } else {
            self.search(&prefix, block.nonce, cancel, started)?
        };

        block.nonce = nonce;
        block.digest = digest_with_nonce(&prefix, nonce);
        let stats = MiningStats {
            nonce,
            attempts,
            elapsed: started.elapsed(),
        };
        info!(
            "Mined block: {} (nonce {}, {} attempts in {:?})",
            block.digest, nonce, attempts, stats.elapsed
        );
        Ok(stats)
    }

    fn search(
        &self,
        prefix: &str,
        mut nonce: u64,
        cancel: &CancelToken,
        started: Instant,
    ) -> Result<(u64, u64)> {
        let mut attempts = 0u64;
        loop {
            attempts += 1;
            if meets_difficulty(&digest_with_nonce(prefix, nonce), self.difficulty) {
                return Ok((nonce, attempts));
            }
            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(LedgerError::AttemptBudgetExhausted { attempts });
            }
            if attempts % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(LedgerError::MiningCancelled { attempts });
            }
            if attempts % PROGRESS_LOG_INTERVAL == 0 {
                log_progress(attempts, started);
            }
            nonce = nonce.checked_add(1).ok_or(LedgerError::NonceSpaceExhausted)?;
        }
    }

    /// Splits the nonce range across the rayon pool. Which qualifying nonce
    /// wins is not deterministic.
    fn search_parallel(
        &self,
        prefix: &str,
        start: u64,
        cancel: &CancelToken,
        started: Instant,
    ) -> Result<(u64, u64)> {
        let last = match self.max_attempts {
            Some(max) => start.saturating_add(max.max(1) - 1),
            None => u64::MAX,
        };
        let attempts = AtomicU64::new(0);

        let found = (start..=last).into_par_iter().find_any(|nonce| {
            if cancel.is_cancelled() {
                return true;
            }
            let n = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            if n % PROGRESS_LOG_INTERVAL == 0 {
                log_progress(n, started);
            }
            meets_difficulty(&digest_with_nonce(prefix, *nonce), self.difficulty)
        });
        let attempts = attempts.into_inner();

        match found {
            Some(nonce) if meets_difficulty(&digest_with_nonce(prefix, nonce), self.difficulty) => {
                Ok((nonce, attempts))
            }
            _ if cancel.is_cancelled() => Err(LedgerError::MiningCancelled { attempts }),
            _ if self.max_attempts.is_some() => Err(LedgerError::AttemptBudgetExhausted { attempts }),
            _ => Err(LedgerError::NonceSpaceExhausted),
        }
    }
}

fn log_progress(attempts: u64, started: Instant) {
    debug!(
        "Mining attempts: {} ({:.1} KH/s)",
        attempts,
        attempts as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON) / 1000.0
    );
}
