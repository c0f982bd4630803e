use anyhow::Result;
use clap::{Parser, ValueEnum};
use hashchain_core::{ChainConfig, VerifyPolicy};
use hashchain_demo::{Scenario, DEFAULT_TAMPER_INDEX, DEFAULT_TAMPER_PAYLOAD};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "hashchain-demo")]
#[command(about = "Mine a small proof-of-work chain, tamper with one block and re-validate")]
struct Args {
    /// TOML file with chain settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Leading zero hex characters required per block hash
    #[arg(long)]
    difficulty: Option<u32>,

    /// Give up on a block after this many nonces
    #[arg(long)]
    max_attempts: Option<u64>,

    /// Mine on all cores
    #[arg(long)]
    parallel: bool,

    /// How stored hashes are re-checked
    #[arg(long, value_enum)]
    verify: Option<Verify>,

    /// Block whose payload gets overwritten
    #[arg(long, default_value_t = DEFAULT_TAMPER_INDEX)]
    tamper_index: usize,

    #[arg(long, default_value = DEFAULT_TAMPER_PAYLOAD)]
    tamper_payload: String,

    /// Print chains and reports as JSON
    #[arg(long)]
    json: bool,

    /// Payloads to seed the chain with (defaults to three sample transfers)
    payloads: Vec<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Verify {
    StoredNonce,
    Remine,
}

impl From<Verify> for VerifyPolicy {
    fn from(v: Verify) -> Self {
        match v {
            Verify::StoredNonce => VerifyPolicy::StoredNonce,
            Verify::Remine => VerifyPolicy::Remine,
        }
    }
}

fn chain_config(args: &Args) -> Result<ChainConfig> {
    let mut config = match &args.config {
        Some(path) => ChainConfig::load(path)?,
        None => ChainConfig::default(),
    };
    if let Some(difficulty) = args.difficulty {
        config.difficulty = difficulty;
    }
    if args.max_attempts.is_some() {
        config.max_attempts = args.max_attempts;
    }
    if args.parallel {
        config.parallel = true;
    }
    if let Some(verify) = args.verify {
        config.verify = verify.into();
    }
    config.check()?;
    Ok(config)
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let args = Args::parse();
    let config = chain_config(&args)?;
    let mut scenario = Scenario {
        tamper_index: args.tamper_index,
        tamper_payload: args.tamper_payload.clone(),
        ..Scenario::default()
    };
    if !args.payloads.is_empty() {
        scenario.payloads = args.payloads.clone();
    }

    let outcome = hashchain_demo::run(config, &scenario)?;

    if args.json {
        let out = serde_json::json!({
            "seeded": outcome.seeded,
            "before": outcome.before,
            "tampered": outcome.tampered,
            "after": outcome.after,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Blockchain state:");
    println!("{}", outcome.seeded);
    println!(
        "Is the chain valid before tampering? {}",
        outcome.before.is_valid()
    );

    println!(
        "\nTampering with block {}: payload set to {:?}\n",
        scenario.tamper_index, scenario.tamper_payload
    );
    println!("Checking the chain after tampering...");
    print!("{}", outcome.after);
    if outcome.after.is_valid() {
        println!("\nThe chain is still valid.");
    } else {
        println!("\nThe chain is INVALID due to tampering.");
    }
    Ok(())
}
