//! Mining and validation settings for a [`Chain`](crate::chain::Chain).

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{
    constants::{DEFAULT_DIFFICULTY, HASH_HEX_SIZE},
    error::{LedgerError, Result},
};

/// How `Chain::validate` decides whether a block's stored hash still matches its content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyPolicy {
    /// Hash the current fields with the stored nonce. Constant cost.
    #[default]
    StoredNonce,
    /// Search again from nonce zero and compare the digest found. Costs as much as mining.
    Remine,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Required leading `'0'` hex characters.
    pub difficulty: u32,
    /// Upper bound on nonces tried per search; `None` searches until success.
    pub max_attempts: Option<u64>,
    pub parallel: bool,
    pub verify: VerifyPolicy,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_attempts: None,
            parallel: false,
            verify: VerifyPolicy::StoredNonce,
        }
    }
}

impl ChainConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.check()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn check(&self) -> Result<()> {
        if self.difficulty as usize > HASH_HEX_SIZE {
            return Err(LedgerError::DifficultyOutOfRange {
                difficulty: self.difficulty,
            });
        }
        if self.max_attempts == Some(0) {
            return Err(LedgerError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
