use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod actor;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod mine;

pub use config::ChainConfig;
pub use error::{LedgerError, Result, ValidationError};

use constants::{GENESIS_PREVIOUS_DIGEST, GENESIS_TIMESTAMP};

/// Content a block can carry. The payload kind decides whether blocks of its
/// chain carry a sequence index in their digest input.
pub trait Payload: Serialize + Clone {
    const INDEXED: bool;

    fn genesis() -> Self;
}

/// Free-form data blocks.
impl Payload for serde_json::Value {
    const INDEXED: bool = true;

    fn genesis() -> Self {
        serde_json::Value::from(constants::GENESIS_DATA)
    }
}

/// Transaction-list blocks.
impl Payload for Vec<Transaction> {
    const INDEXED: bool = false;

    fn genesis() -> Self {
        Vec::new()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// `None` for reward issuance.
    pub from_address: Option<String>,
    pub to_address: String,
    pub amount: i64,
}

impl Transaction {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: i64) -> Self {
        Self {
            from_address: Some(from.into()),
            to_address: to.into(),
            amount,
        }
    }

    pub fn reward(to: impl Into<String>, amount: i64) -> Self {
        Self {
            from_address: None,
            to_address: to.into(),
            amount,
        }
    }

    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block<P> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    pub timestamp: String,
    pub payload: P,
    pub previous_digest: String,
    pub nonce: u64,
    pub digest: String,
}

impl<P: Payload> Block<P> {
    /// Builds an unmined block. The previous digest is filled in when the block
    /// is linked to a chain tip.
    pub fn new(index: Option<u64>, timestamp: impl Into<String>, payload: P) -> Result<Self> {
        let mut block = Self {
            index,
            timestamp: timestamp.into(),
            payload,
            previous_digest: String::new(),
            nonce: 0,
            digest: String::new(),
        };
        block.digest = block.compute_digest()?;
        Ok(block)
    }

    /// The fixed, unmined root of every chain carrying `P`.
    pub fn genesis() -> Result<Self> {
        let index = if P::INDEXED { Some(0) } else { None };
        let mut block = Self::new(index, GENESIS_TIMESTAMP, P::genesis())?;
        block.previous_digest = GENESIS_PREVIOUS_DIGEST.to_string();
        block.digest = block.compute_digest()?;
        Ok(block)
    }

    /// Everything that feeds the digest except the nonce, in digest order:
    /// index, previous digest, timestamp, canonical payload.
    pub fn digest_prefix(&self) -> Result<String> {
        let payload = canonical_json(&self.payload)?;
        let mut prefix = String::with_capacity(
            20 + self.previous_digest.len() + self.timestamp.len() + payload.len(),
        );
        if let Some(index) = self.index {
            prefix.push_str(&index.to_string());
        }
        prefix.push_str(&self.previous_digest);
        prefix.push_str(&self.timestamp);
        prefix.push_str(&payload);
        Ok(prefix)
    }

    pub fn compute_digest(&self) -> Result<String> {
        Ok(digest_with_nonce(&self.digest_prefix()?, self.nonce))
    }

    /// Whether the stored digest still matches the block's fields.
    pub fn has_valid_digest(&self) -> bool {
        matches!(self.compute_digest(), Ok(d) if d == self.digest)
    }
}

/// Serializes a payload the same way every time. Map keys in
/// `serde_json::Value` are kept sorted, so equal values give equal strings.
pub fn canonical_json<P: Serialize>(payload: &P) -> Result<String> {
    Ok(serde_json::to_string(payload)?)
}

pub fn digest_with_nonce(prefix: &str, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(nonce.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

pub mod pow {
    /// Number of leading `'0'` characters in a hex digest.
    pub fn leading_zero_chars(digest: &str) -> usize {
        digest.bytes().take_while(|b| *b == b'0').count()
    }

    /// True when the first `difficulty` characters of `digest` are all `'0'`.
    pub fn meets_difficulty(digest: &str, difficulty: usize) -> bool {
        digest.len() >= difficulty && leading_zero_chars(digest) >= difficulty
    }
}
