use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// A bounded search ran out of nonces. Unbounded searches never return this.
    #[error("no nonce satisfies difficulty {difficulty} for block {index} after {attempts} attempts")]
    NonTermination {
        index: u64,
        difficulty: u32,
        attempts: u64,
    },

    #[error("mining of block {index} cancelled after {attempts} attempts")]
    Cancelled { index: u64, attempts: u64 },

    #[error("genesis block must reference \"0\", found {found:?}")]
    InvalidGenesisReference { found: String },

    #[error("block {index} references a malformed previous hash {found:?}")]
    MalformedPreviousHash { index: u64, found: String },

    #[error("difficulty {difficulty} exceeds the 64-character digest")]
    DifficultyOutOfRange { difficulty: u32 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
