//! Structured results of [`Chain::validate`](crate::chain::Chain::validate).
//!
//! Tampering is an ordinary outcome here, never an error.

use serde::Serialize;
use std::fmt;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    /// The stored hash no longer matches the block's fields.
    Tampered { stored: String, recomputed: String },
    /// `previous_hash` differs from the predecessor's stored hash.
    InvalidPreviousHash { expected: String, found: String },
    /// The stored hash lacks the leading zeros the chain requires.
    InsufficientWork { difficulty: u32 },
    /// A bounded re-mine ended without a digest to compare.
    Unverifiable { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub index: u64,
    #[serde(flatten)]
    pub kind: FindingKind,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FindingKind::Tampered { .. } => write!(f, "Block {} is tampered", self.index),
            FindingKind::InvalidPreviousHash { .. } => {
                write!(f, "Block {} has an invalid previous hash", self.index)
            }
            FindingKind::InsufficientWork { difficulty } => write!(
                f,
                "Block {} does not meet difficulty {}",
                self.index, difficulty
            ),
            FindingKind::Unverifiable { reason } => {
                write!(f, "Block {} could not be verified: {}", self.index, reason)
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Blocks inspected, genesis included.
    pub checked: usize,
    findings: Vec<Finding>,
}

impl ValidationReport {
    pub(crate) fn new(checked: usize) -> Self {
        Self {
            checked,
            findings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn for_block(&self, index: u64) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.index == index)
    }

    /// Indices whose stored hash failed to reproduce.
    pub fn tampered(&self) -> Vec<u64> {
        self.indices(|kind| matches!(kind, FindingKind::Tampered { .. }))
    }

    pub fn broken_links(&self) -> Vec<u64> {
        self.indices(|kind| matches!(kind, FindingKind::InvalidPreviousHash { .. }))
    }

    fn indices(&self, pred: impl Fn(&FindingKind) -> bool) -> Vec<u64> {
        self.findings
            .iter()
            .filter(|f| pred(&f.kind))
            .map(|f| f.index)
            .collect()
    }

    pub(crate) fn push(&mut self, index: u64, kind: FindingKind) {
        let finding = Finding { index, kind };
        warn!("{finding}");
        self.findings.push(finding);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return write!(f, "chain of {} blocks is valid", self.checked);
        }
        for finding in &self.findings {
            writeln!(f, "{finding}")?;
        }
        Ok(())
    }
}
