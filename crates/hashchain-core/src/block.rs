use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::info;

use crate::{
    constants::{GENESIS_PAYLOAD, GENESIS_PREVIOUS_HASH, HASH_HEX_SIZE, TIMESTAMP_FORMAT},
    error::{LedgerError, Result},
    pow::{self, Miner, Proof},
};

/// The hashed fields of a block, everything except the nonce and the hash itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockContent<'a> {
    pub index: u64,
    pub timestamp: u64,
    pub payload: &'a str,
    pub previous_hash: &'a str,
}

impl BlockContent<'_> {
    /// Preimage for `nonce`. Strings are length-prefixed so field boundaries are unambiguous.
    pub fn hash_bytes(&self, nonce: u64) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(8 + 8 + 8 + self.payload.len() + 8 + self.previous_hash.len() + 8);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(self.payload.as_bytes());
        bytes.extend_from_slice(&(self.previous_hash.len() as u64).to_le_bytes());
        bytes.extend_from_slice(self.previous_hash.as_bytes());
        bytes.extend_from_slice(&nonce.to_le_bytes());
        bytes
    }

    /// Lowercase hex SHA-256 of the preimage.
    pub fn digest(&self, nonce: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.hash_bytes(nonce));
        hex::encode(hasher.finalize())
    }
}

/// A mined ledger entry.
///
/// Fields are read-only once mining finishes. `hash` always records the digest found
/// at mining time, so any later change to the other fields shows up as a mismatch
/// against [`Block::compute_hash`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Block {
    index: u64,
    /// Unix time in milliseconds.
    timestamp: u64,
    payload: String,
    previous_hash: String,
    nonce: u64,
    hash: String,
}

impl Block {
    /// Mine a block stamped with the current time, searching without bound.
    pub fn new(
        index: u64,
        payload: impl Into<String>,
        previous_hash: impl Into<String>,
        difficulty: u32,
    ) -> Result<Self> {
        Self::mine(index, payload, previous_hash, &Miner::new(difficulty))
    }

    pub fn mine(
        index: u64,
        payload: impl Into<String>,
        previous_hash: impl Into<String>,
        miner: &Miner,
    ) -> Result<Self> {
        Self::mine_at(index, now_millis(), payload, previous_hash, miner)
    }

    pub fn mine_at(
        index: u64,
        timestamp: u64,
        payload: impl Into<String>,
        previous_hash: impl Into<String>,
        miner: &Miner,
    ) -> Result<Self> {
        let payload = payload.into();
        let previous_hash = previous_hash.into();
        miner.check()?;
        check_previous_hash(index, &previous_hash)?;

        let content = BlockContent {
            index,
            timestamp,
            payload: &payload,
            previous_hash: &previous_hash,
        };
        let Proof { nonce, hash, .. } = miner.search(&content)?;
        info!("Mined block {} with nonce {} and hash {}", index, nonce, hash);

        Ok(Self {
            index,
            timestamp,
            payload,
            previous_hash,
            nonce,
            hash,
        })
    }

    pub fn genesis(miner: &Miner) -> Result<Self> {
        Self::mine(0, GENESIS_PAYLOAD, GENESIS_PREVIOUS_HASH, miner)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn content(&self) -> BlockContent<'_> {
        BlockContent {
            index: self.index,
            timestamp: self.timestamp,
            payload: &self.payload,
            previous_hash: &self.previous_hash,
        }
    }

    /// Digest of the current fields with the stored nonce.
    pub fn compute_hash(&self) -> String {
        self.content().digest(self.nonce)
    }

    /// Re-run the nonce search from zero over the current fields.
    pub fn recompute(&self, miner: &Miner) -> Result<Proof> {
        miner.search(&self.content())
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        pow::meets_difficulty(&self.hash, difficulty)
    }

    pub fn datetime(&self) -> Option<DateTime<Local>> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp as i64).map(|t| t.with_timezone(&Local))
    }

    pub fn formatted_timestamp(&self) -> String {
        self.datetime()
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

// In-place mutation for tamper simulation. Nothing here re-mines.
#[cfg(any(test, feature = "tamper"))]
impl Block {
    pub fn tamper_payload(&mut self, payload: impl Into<String>) {
        self.payload = payload.into();
    }

    pub fn tamper_previous_hash(&mut self, previous_hash: impl Into<String>) {
        self.previous_hash = previous_hash.into();
    }

    pub fn tamper_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    pub fn tamper_hash(&mut self, hash: impl Into<String>) {
        self.hash = hash.into();
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block {}:", self.index)?;
        writeln!(f, "  Timestamp: {}", self.formatted_timestamp())?;
        writeln!(f, "  Payload: {}", self.payload)?;
        writeln!(f, "  Previous Hash: {}", self.previous_hash)?;
        writeln!(f, "  Current Hash: {}", self.hash)?;
        writeln!(f, "  Nonce: {}", self.nonce)
    }
}

/// True for a lowercase hex string of digest length.
pub fn is_hex_digest(s: &str) -> bool {
    s.len() == HASH_HEX_SIZE && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn check_previous_hash(index: u64, previous_hash: &str) -> Result<()> {
    if index == 0 {
        if previous_hash != GENESIS_PREVIOUS_HASH {
            return Err(LedgerError::InvalidGenesisReference {
                found: previous_hash.to_string(),
            });
        }
    } else if !is_hex_digest(previous_hash) {
        return Err(LedgerError::MalformedPreviousHash {
            index,
            found: previous_hash.to_string(),
        });
    }
    Ok(())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
