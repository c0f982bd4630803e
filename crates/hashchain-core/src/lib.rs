//! A minimal append-only ledger secured by proof-of-work and hash-chain linkage.
//!
//! [`Chain`] mines a genesis block on creation and every block appended after it.
//! [`Chain::validate`] recomputes digests and links and reports any tampering as
//! [`Finding`]s rather than errors.

pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod pow;
pub mod validation;

pub use block::{Block, BlockContent};
pub use chain::Chain;
pub use config::{ChainConfig, VerifyPolicy};
pub use error::{LedgerError, Result};
pub use pow::{Miner, Proof};
pub use validation::{Finding, FindingKind, ValidationReport};
