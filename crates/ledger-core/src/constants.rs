pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const GENESIS_PREVIOUS_DIGEST: &str = "0";
pub const GENESIS_TIMESTAMP: &str = "01/01/2018";
pub const GENESIS_DATA: &str = "Genesis Block";
pub const DEFAULT_DIFFICULTY: usize = 2;
pub const DEFAULT_MINING_REWARD: i64 = 100;
/// How many nonces the miner tries between cancellation checks.
pub const CANCEL_POLL_INTERVAL: u64 = 1024;
pub const PROGRESS_LOG_INTERVAL: u64 = 100_000;
