use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("difficulty {difficulty} exceeds the digest length of {max} characters")]
    DifficultyOutOfRange { difficulty: usize, max: usize },

    #[error("payload cannot be serialized canonically: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },

    #[error("no qualifying nonce within {attempts} attempts")]
    AttemptBudgetExhausted { attempts: u64 },

    #[error("nonce space exhausted")]
    NonceSpaceExhausted,

    #[error("block rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error("ledger actor is no longer running")]
    ActorClosed,

    #[error("mining task failed: {0}")]
    MiningTask(#[from] tokio::task::JoinError),
}

/// First integrity violation found while scanning a chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("block {index}: stored digest does not match its contents")]
    DigestMismatch { index: usize },

    #[error("block {index}: previous digest does not match the preceding block")]
    BrokenLink { index: usize },

    #[error("block {index}: digest does not meet difficulty {difficulty}")]
    InsufficientWork { index: usize, difficulty: usize },

    #[error("block {index}: payload can no longer be serialized")]
    Unserializable { index: usize },
}
