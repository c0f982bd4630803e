use serde::Serialize;
use std::{fmt, slice};
use tracing::{debug, info};

use crate::{
    block::Block,
    config::{ChainConfig, VerifyPolicy},
    constants::GENESIS_PREVIOUS_HASH,
    error::{LedgerError, Result},
    pow::Miner,
    validation::{FindingKind, ValidationReport},
};

/// Append-only sequence of mined blocks, starting from a genesis block.
#[derive(Clone, Debug, Serialize)]
pub struct Chain {
    config: ChainConfig,
    blocks: Vec<Block>,
}

#[allow(clippy::len_without_is_empty)]
impl Chain {
    pub fn new() -> Result<Self> {
        Self::with_config(ChainConfig::default())
    }

    /// Check `config` and mine the genesis block with it.
    pub fn with_config(config: ChainConfig) -> Result<Self> {
        config.check()?;
        let genesis = Block::genesis(&Miner::from_config(&config))?;
        info!(difficulty = config.difficulty, "chain initialised");
        Ok(Self {
            config,
            blocks: vec![genesis],
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    /// A miner configured like the one `add` uses. Attach a cancel flag and pass it to
    /// [`Chain::add_with`] to make appends interruptible.
    pub fn miner(&self) -> Miner {
        Miner::from_config(&self.config)
    }

    /// Mine a block carrying `payload` on top of the current tip and append it.
    pub fn add(&mut self, payload: impl Into<String>) -> Result<&Block> {
        let miner = self.miner();
        self.add_with(payload, &miner)
    }

    /// Append using `miner`. Under [`VerifyPolicy::Remine`] the miner must search at exactly
    /// the chain difficulty, since validation re-runs the search at that difficulty and a
    /// stronger miner would commit a nonce it cannot reproduce.
    pub fn add_with(&mut self, payload: impl Into<String>, miner: &Miner) -> Result<&Block> {
        let difficulty = self.config.difficulty;
        if miner.difficulty() < difficulty {
            return Err(LedgerError::InvalidConfig(format!(
                "miner difficulty {} is below chain difficulty {}",
                miner.difficulty(),
                difficulty
            )));
        }
        if self.config.verify == VerifyPolicy::Remine && miner.difficulty() != difficulty {
            return Err(LedgerError::InvalidConfig(format!(
                "re-mined chains need miner difficulty {} to match chain difficulty {}",
                miner.difficulty(),
                difficulty
            )));
        }
        let index = self.blocks.len();
        let previous_hash = self.last().hash().to_string();
        let block = Block::mine(index as u64, payload, previous_hash, miner)?;
        self.blocks.push(block);
        Ok(&self.blocks[index])
    }

    /// Check every block's hash and every link to its predecessor.
    ///
    /// Tampering is reported through the returned findings. The only error is a
    /// genesis block that does not reference the sentinel hash.
    pub fn validate(&self) -> Result<ValidationReport> {
        let genesis = self.genesis();
        if genesis.previous_hash() != GENESIS_PREVIOUS_HASH {
            return Err(LedgerError::InvalidGenesisReference {
                found: genesis.previous_hash().to_string(),
            });
        }

        let miner = self.miner();
        let mut report = ValidationReport::new(self.blocks.len());
        for (i, block) in self.blocks.iter().enumerate() {
            let position = i as u64;
            self.check_hash(position, block, &miner, &mut report);

            if let Some(prev) = i.checked_sub(1).and_then(|p| self.blocks.get(p)) {
                if block.previous_hash() != prev.hash() {
                    report.push(
                        position,
                        FindingKind::InvalidPreviousHash {
                            expected: prev.hash().to_string(),
                            found: block.previous_hash().to_string(),
                        },
                    );
                }
            }
        }
        debug!(checked = report.checked, findings = report.findings().len(), "chain validated");
        Ok(report)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok_and(|report| report.is_valid())
    }

    fn check_hash(
        &self,
        position: u64,
        block: &Block,
        miner: &Miner,
        report: &mut ValidationReport,
    ) {
        let recomputed = block.compute_hash();
        if recomputed != block.hash() {
            report.push(
                position,
                FindingKind::Tampered {
                    stored: block.hash().to_string(),
                    recomputed,
                },
            );
            return;
        }
        match self.config.verify {
            VerifyPolicy::StoredNonce => {
                if !block.meets_difficulty(self.config.difficulty) {
                    report.push(
                        position,
                        FindingKind::InsufficientWork {
                            difficulty: self.config.difficulty,
                        },
                    );
                }
            }
            VerifyPolicy::Remine => match block.recompute(miner) {
                Ok(proof) if proof.hash != block.hash() => report.push(
                    position,
                    FindingKind::Tampered {
                        stored: block.hash().to_string(),
                        recomputed: proof.hash,
                    },
                ),
                Ok(_) => {}
                Err(e) => report.push(
                    position,
                    FindingKind::Unverifiable {
                        reason: e.to_string(),
                    },
                ),
            },
        }
    }

    /// Drop every block and mine a fresh genesis.
    pub fn reset(&mut self) -> Result<()> {
        let genesis = Block::genesis(&self.miner())?;
        self.blocks = vec![genesis];
        info!("chain reset");
        Ok(())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    /// The tip. Never absent since every chain starts with a genesis block.
    pub fn last(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Direct mutable access for tamper simulation.
    #[cfg(any(test, feature = "tamper"))]
    pub fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Block;
    type IntoIter = slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            writeln!(f, "{block}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::meets_difficulty;
    use std::sync::{atomic::AtomicBool, Arc};

    fn seeded(config: ChainConfig) -> Chain {
        let mut chain = Chain::with_config(config).unwrap();
        for payload in ["A pays B 10", "B pays C 5", "C pays D 4"] {
            chain.add(payload).unwrap();
        }
        chain
    }

    #[test]
    fn genesis_invariant() {
        let chain = Chain::new().unwrap();
        assert_eq!(chain.len(), 1);
        let genesis = chain.genesis();
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.previous_hash(), GENESIS_PREVIOUS_HASH);
        assert!(genesis.hash().starts_with("00"));
        assert!(chain.is_valid());
    }

    #[test]
    fn add_links_to_previous_block() {
        let chain = seeded(ChainConfig::default());
        assert_eq!(chain.len(), 4);
        for (i, pair) in chain.blocks().windows(2).enumerate() {
            assert_eq!(pair[1].index(), i as u64 + 1);
            assert_eq!(pair[1].previous_hash(), pair[0].hash());
            assert_eq!(pair[1].hash(), pair[1].compute_hash());
        }
    }

    #[test]
    fn add_returns_appended_block() {
        let mut chain = Chain::new().unwrap();
        let hash = chain.add("A pays B 10").unwrap().hash().to_string();
        assert_eq!(chain.last().hash(), hash);
        assert_eq!(chain.last().payload(), "A pays B 10");
    }

    #[test]
    fn untampered_chain_is_valid_for_both_policies() {
        for verify in [VerifyPolicy::StoredNonce, VerifyPolicy::Remine] {
            let chain = seeded(ChainConfig {
                verify,
                ..ChainConfig::default()
            });
            let report = chain.validate().unwrap();
            assert!(report.is_valid(), "{verify:?}: {report}");
            assert_eq!(report.checked, 4);
        }
    }

    #[test]
    fn payload_tampering_detected_for_both_policies() {
        for verify in [VerifyPolicy::StoredNonce, VerifyPolicy::Remine] {
            let mut chain = seeded(ChainConfig {
                verify,
                ..ChainConfig::default()
            });
            chain.block_mut(2).unwrap().tamper_payload("B pays C 500");
            let report = chain.validate().unwrap();
            assert!(!report.is_valid());
            assert_eq!(report.tampered(), vec![2], "{verify:?}");
            // block 3 still points at block 2's stored hash
            assert!(report.broken_links().is_empty());
        }
    }

    #[test]
    fn link_tampering_detected() {
        let mut chain = seeded(ChainConfig::default());
        let forged = "00".repeat(32);
        chain.block_mut(2).unwrap().tamper_previous_hash(forged.clone());
        let report = chain.validate().unwrap();
        assert_eq!(report.broken_links(), vec![2]);
        // previous_hash is part of the preimage, so the block's own hash breaks too
        assert_eq!(report.tampered(), vec![2]);
        assert!(report.for_block(2).any(|f| matches!(
            &f.kind,
            FindingKind::InvalidPreviousHash { found, .. } if *found == forged
        )));
    }

    #[test]
    fn remined_block_breaks_successor_link() {
        let mut chain = seeded(ChainConfig::default());
        let block = chain.get(1).unwrap();
        let remined = Block::mine(1, "A pays B 99", block.previous_hash(), &chain.miner()).unwrap();
        *chain.block_mut(1).unwrap() = remined;
        let report = chain.validate().unwrap();
        assert!(report.tampered().is_empty());
        assert_eq!(report.broken_links(), vec![2]);
    }

    #[test]
    fn consistent_low_work_hash_is_insufficient_work() {
        let mut chain = seeded(ChainConfig::default());
        let content = chain.get(3).unwrap().content();
        let (nonce, hash) = (0u64..)
            .map(|n| (n, content.digest(n)))
            .find(|(_, h)| !meets_difficulty(h, 2))
            .unwrap();
        let block = chain.block_mut(3).unwrap();
        block.tamper_nonce(nonce);
        block.tamper_hash(hash);
        let report = chain.validate().unwrap();
        assert!(report.tampered().is_empty());
        assert_eq!(
            report.findings(),
            &[crate::validation::Finding {
                index: 3,
                kind: FindingKind::InsufficientWork { difficulty: 2 },
            }]
        );
    }

    #[test]
    fn remine_rejects_off_schedule_nonce() {
        let config = ChainConfig {
            difficulty: 1,
            verify: VerifyPolicy::Remine,
            ..ChainConfig::default()
        };
        let mut chain = seeded(config);
        let block = chain.get(2).unwrap();
        let content = block.content();
        let lucky = (block.nonce() + 1..)
            .find(|n| meets_difficulty(&content.digest(*n), 1))
            .unwrap();
        let lucky_hash = content.digest(lucky);
        let block = chain.block_mut(2).unwrap();
        block.tamper_nonce(lucky);
        block.tamper_hash(lucky_hash.clone());

        // the cheap check accepts any valid nonce
        let mut stored_nonce_chain = chain.clone();
        stored_nonce_chain.config.verify = VerifyPolicy::StoredNonce;
        assert!(stored_nonce_chain.validate().unwrap().tampered().is_empty());

        let report = chain.validate().unwrap();
        assert_eq!(report.tampered(), vec![2]);
        // block 3 still links to the original hash
        assert_eq!(report.broken_links(), vec![3]);
    }

    #[test]
    fn bounded_remine_reports_unverifiable() {
        let mut chain = seeded(ChainConfig {
            difficulty: 2,
            verify: VerifyPolicy::Remine,
            ..ChainConfig::default()
        });
        chain.config.max_attempts = Some(1);
        let report = chain.validate().unwrap();
        let unverifiable: Vec<u64> = report
            .findings()
            .iter()
            .filter(|f| matches!(f.kind, FindingKind::Unverifiable { .. }))
            .map(|f| f.index)
            .collect();
        let expected: Vec<u64> = chain
            .iter()
            .enumerate()
            .filter(|(_, b)| b.nonce() > 0)
            .map(|(i, _)| i as u64)
            .collect();
        assert_eq!(unverifiable, expected);
    }

    #[test]
    fn validation_is_idempotent() {
        let mut chain = seeded(ChainConfig::default());
        assert_eq!(chain.validate().unwrap(), chain.validate().unwrap());
        chain.block_mut(3).unwrap().tamper_payload("C pays D 100");
        let first = chain.validate().unwrap();
        let second = chain.validate().unwrap();
        assert_eq!(first, second);
        assert!(!first.is_valid());
    }

    #[test]
    fn genesis_payload_tampering_detected() {
        let mut chain = seeded(ChainConfig::default());
        chain.block_mut(0).unwrap().tamper_payload("Forged Genesis");
        assert_eq!(chain.validate().unwrap().tampered(), vec![0]);
    }

    #[test]
    fn malformed_genesis_reference_is_error() {
        let mut chain = seeded(ChainConfig::default());
        chain.block_mut(0).unwrap().tamper_previous_hash("1");
        let err = chain.validate().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidGenesisReference { found } if found == "1"));
        assert!(!chain.is_valid());
    }

    #[test]
    fn bounded_add_reports_non_termination() {
        let mut chain = Chain::with_config(ChainConfig {
            difficulty: 0,
            ..ChainConfig::default()
        })
        .unwrap();
        let miner = Miner::new(64).with_max_attempts(10);
        let err = chain.add_with("x", &miner).unwrap_err();
        assert!(matches!(err, LedgerError::NonTermination { index: 1, .. }));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn cancelled_add_leaves_chain_unchanged() {
        let mut chain = Chain::new().unwrap();
        let miner = chain.miner().with_cancel(Arc::new(AtomicBool::new(true)));
        let err = chain.add_with("x", &miner).unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled { index: 1, .. }));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn weaker_miner_rejected() {
        let mut chain = Chain::new().unwrap();
        let err = chain.add_with("x", &Miner::new(1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidConfig(_)));
    }

    #[test]
    fn parallel_chain_is_valid() {
        let chain = seeded(ChainConfig {
            parallel: true,
            verify: VerifyPolicy::Remine,
            ..ChainConfig::default()
        });
        assert!(chain.is_valid());
    }

    #[test]
    fn reset_keeps_only_fresh_genesis() {
        let mut chain = seeded(ChainConfig::default());
        chain.reset().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.genesis().previous_hash(), GENESIS_PREVIOUS_HASH);
        assert!(chain.is_valid());
    }

    #[test]
    fn display_prints_blocks_in_order() {
        let chain = seeded(ChainConfig::default());
        let text = chain.to_string();
        let positions: Vec<usize> = (0..4)
            .map(|i| text.find(&format!("Block {i}:")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("Payload: C pays D 4"));
    }

    #[test]
    fn invalid_config_rejected() {
        let err = Chain::with_config(ChainConfig {
            difficulty: 70,
            ..ChainConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, LedgerError::DifficultyOutOfRange { difficulty: 70 }));
    }

    #[test]
    fn remine_chain_rejects_stronger_miner() {
        let mut chain = Chain::with_config(ChainConfig {
            difficulty: 1,
            verify: VerifyPolicy::Remine,
            ..ChainConfig::default()
        })
        .unwrap();
        for payload in ["A pays B 10", "B pays C 5", "C pays D 4"] {
            let err = chain.add_with(payload, &Miner::new(3)).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidConfig(_)));
        }
        assert_eq!(chain.len(), 1);

        let miner = chain.miner().with_cancel(Arc::new(AtomicBool::new(false)));
        for payload in ["A pays B 10", "B pays C 5", "C pays D 4"] {
            chain.add_with(payload, &miner).unwrap();
        }
        let report = chain.validate().unwrap();
        assert!(report.is_valid(), "{report}");
    }

    #[test]
    fn stored_nonce_chain_accepts_stronger_miner() {
        let mut chain = Chain::with_config(ChainConfig {
            difficulty: 1,
            ..ChainConfig::default()
        })
        .unwrap();
        for payload in ["A pays B 10", "B pays C 5", "C pays D 4"] {
            chain.add_with(payload, &Miner::new(3)).unwrap();
        }
        assert!(chain.iter().skip(1).all(|b| b.meets_difficulty(3)));
        assert!(chain.validate().unwrap().is_valid());
    }

    #[test]
    fn bounded_remine_still_flags_tampered_payload() {
        let mut chain = seeded(ChainConfig {
            verify: VerifyPolicy::Remine,
            ..ChainConfig::default()
        });
        chain.config.max_attempts = Some(1);
        chain.block_mut(2).unwrap().tamper_payload("B pays C 500");
        let report = chain.validate().unwrap();
        assert_eq!(report.tampered(), vec![2]);
        assert!(report
            .for_block(2)
            .all(|f| matches!(f.kind, FindingKind::Tampered { .. })));
    }
}
