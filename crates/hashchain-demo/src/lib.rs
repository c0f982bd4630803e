//! Seed, tamper and re-validate scenario used by the `hashchain-demo` binary.

use anyhow::{Context, Result};
use hashchain_core::{Chain, ChainConfig, ValidationReport};
use tracing::info;

pub const DEFAULT_PAYLOADS: [&str; 3] = ["A pays B 10", "B pays C 5", "C pays D 4"];
pub const DEFAULT_TAMPER_INDEX: usize = 3;
pub const DEFAULT_TAMPER_PAYLOAD: &str = "C pays D 100";

#[derive(Clone, Debug)]
pub struct Scenario {
    pub payloads: Vec<String>,
    pub tamper_index: usize,
    pub tamper_payload: String,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            payloads: DEFAULT_PAYLOADS.iter().map(|p| p.to_string()).collect(),
            tamper_index: DEFAULT_TAMPER_INDEX,
            tamper_payload: DEFAULT_TAMPER_PAYLOAD.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Outcome {
    /// Chain state before tampering.
    pub seeded: Chain,
    pub before: ValidationReport,
    /// Chain state after tampering.
    pub tampered: Chain,
    pub after: ValidationReport,
}

/// Build a chain from `scenario.payloads`, validate it, overwrite one payload in place
/// and validate again.
pub fn run(config: ChainConfig, scenario: &Scenario) -> Result<Outcome> {
    let mut chain = Chain::with_config(config).context("failed to mine genesis block")?;
    for payload in &scenario.payloads {
        chain
            .add(payload.as_str())
            .with_context(|| format!("failed to mine block for {payload:?}"))?;
    }
    let before = chain.validate()?;
    let seeded = chain.clone();

    info!(index = scenario.tamper_index, "tampering with block");
    chain
        .block_mut(scenario.tamper_index)
        .with_context(|| {
            format!(
                "no block {} to tamper with (chain has {})",
                scenario.tamper_index,
                seeded.len()
            )
        })?
        .tamper_payload(scenario.tamper_payload.as_str());
    let after = chain.validate()?;

    Ok(Outcome {
        seeded,
        before,
        tampered: chain,
        after,
    })
}
