//! Proof-of-work search over the block nonce.
//!
//! A digest satisfies difficulty `d` when its first `d` hex characters are `'0'`,
//! so each unit of difficulty is roughly four bits of leading zeros.

use rayon::prelude::*;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::debug;

use crate::{
    block::BlockContent,
    config::ChainConfig,
    constants::{CANCEL_POLL_INTERVAL, DEFAULT_DIFFICULTY, HASH_HEX_SIZE, PARALLEL_BATCH},
    error::{LedgerError, Result},
};

/// Winning nonce and its digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof {
    pub nonce: u64,
    pub hash: String,
    /// Nonces covered by the search, counting the winner.
    pub attempts: u64,
}

/// Nonce searcher.
///
/// By default the search is sequential and unbounded: it blocks the calling thread
/// until a nonce is found, which is only probabilistically guaranteed. Bounding it
/// with [`Miner::with_max_attempts`] or attaching a flag with [`Miner::with_cancel`]
/// turns non-termination into an explicit error.
#[derive(Clone, Debug)]
pub struct Miner {
    difficulty: u32,
    max_attempts: Option<u64>,
    parallel: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

impl Miner {
    pub fn new(difficulty: u32) -> Self {
        Self {
            difficulty,
            max_attempts: None,
            parallel: false,
            cancel: None,
        }
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            difficulty: config.difficulty,
            max_attempts: config.max_attempts,
            parallel: config.parallel,
            cancel: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Split the nonce space across the rayon pool. The lowest valid nonce still wins.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn max_attempts(&self) -> Option<u64> {
        self.max_attempts
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn check(&self) -> Result<()> {
        if self.difficulty as usize > HASH_HEX_SIZE {
            return Err(LedgerError::DifficultyOutOfRange {
                difficulty: self.difficulty,
            });
        }
        Ok(())
    }

    /// Search from nonce zero for the first nonce whose digest meets the difficulty.
    pub fn search(&self, content: &BlockContent<'_>) -> Result<Proof> {
        self.check()?;
        if self.parallel {
            self.search_parallel(content)
        } else {
            self.search_sequential(content)
        }
    }

    fn limit(&self) -> u64 {
        self.max_attempts.unwrap_or(u64::MAX)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn search_sequential(&self, content: &BlockContent<'_>) -> Result<Proof> {
        let limit = self.limit();
        let mut nonce = 0u64;
        loop {
            if nonce >= limit {
                return Err(self.exhausted(content.index, nonce));
            }
            if nonce % CANCEL_POLL_INTERVAL == 0 && self.is_cancelled() {
                return Err(LedgerError::Cancelled {
                    index: content.index,
                    attempts: nonce,
                });
            }
            let hash = content.digest(nonce);
            if meets_difficulty(&hash, self.difficulty) {
                return Ok(Proof {
                    nonce,
                    hash,
                    attempts: nonce + 1,
                });
            }
            nonce += 1;
        }
    }

    fn search_parallel(&self, content: &BlockContent<'_>) -> Result<Proof> {
        let limit = self.limit();
        let difficulty = self.difficulty;
        let mut start = 0u64;
        while start < limit {
            if self.is_cancelled() {
                return Err(LedgerError::Cancelled {
                    index: content.index,
                    attempts: start,
                });
            }
            let end = start.saturating_add(PARALLEL_BATCH).min(limit);
            // find_first keeps the winner identical to the sequential search.
            let found = (start..end)
                .into_par_iter()
                .find_first(|nonce| meets_difficulty(&content.digest(*nonce), difficulty));
            if let Some(nonce) = found {
                return Ok(Proof {
                    nonce,
                    hash: content.digest(nonce),
                    attempts: nonce + 1,
                });
            }
            debug!(index = content.index, searched = end, "no valid nonce in batch");
            start = end;
        }
        Err(self.exhausted(content.index, limit))
    }

    fn exhausted(&self, index: u64, attempts: u64) -> LedgerError {
        LedgerError::NonTermination {
            index,
            difficulty: self.difficulty,
            attempts,
        }
    }
}

/// Number of leading `'0'` characters in a hex digest.
pub fn leading_zero_hex(hash: &str) -> u32 {
    hash.bytes().take_while(|b| *b == b'0').count() as u32
}

pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    leading_zero_hex(hash) >= difficulty
}
