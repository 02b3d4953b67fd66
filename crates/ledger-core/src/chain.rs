use crate::{
    mine::{CancelToken, Miner},
    pow::meets_difficulty,
    Block, ChainConfig, Payload, Result, ValidationError,
};
use tracing::{info, warn};

/// Ordered, hash-linked sequence of blocks rooted at a fixed genesis block.
#[derive(Clone, Debug)]
pub struct Chain<P> {
    blocks: Vec<Block<P>>,
    config: ChainConfig,
    miner: Miner,
}

impl<P: Payload> Chain<P> {
    /// Creates the chain together with its genesis block, so a chain is never empty.
    pub fn new(config: ChainConfig) -> Result<Self> {
        config.check()?;
        let genesis = Block::genesis()?;
        Ok(Self {
            blocks: vec![genesis],
            miner: Miner::from_config(&config),
            config,
        })
    }

    pub fn with_difficulty(difficulty: usize) -> Result<Self> {
        Self::new(ChainConfig::with_difficulty(difficulty))
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn difficulty(&self) -> usize {
        self.config.difficulty
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn blocks(&self) -> &[Block<P>] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; kept for the `len`/`is_empty` pair.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The tip.
    pub fn latest_block(&self) -> &Block<P> {
        // genesis is pushed in `new` and blocks are never removed
        &self.blocks[self.blocks.len() - 1]
    }

    /// Raw mutable access to a committed block. Changes made here bypass
    /// mining and linkage and are what `validate` is meant to catch.
    pub fn block_mut(&mut self, index: usize) -> Option<&mut Block<P>> {
        self.blocks.get_mut(index)
    }

    /// Links `block` to the tip, mines it and appends it. Blocks until a nonce
    /// is found or the configured attempt budget runs out.
    pub fn add_block(&mut self, block: Block<P>) -> Result<&Block<P>> {
        self.add_block_cancellable(block, &CancelToken::new())
    }

    pub fn add_block_cancellable(
        &mut self,
        mut block: Block<P>,
        cancel: &CancelToken,
    ) -> Result<&Block<P>> {
        block.previous_digest = self.latest_block().digest.clone();
        self.miner.mine(&mut block, cancel)?;
        self.append_mined(block)
    }

    /// Appends a block mined elsewhere. It must link to the current tip, carry
    /// a self-consistent digest and meet the chain's difficulty.
    pub fn append_mined(&mut self, block: Block<P>) -> Result<&Block<P>> {
        let index = self.blocks.len();
        if block.previous_digest != self.latest_block().digest {
            return Err(ValidationError::BrokenLink { index }.into());
        }
        check_block(&block, index, self.config.difficulty)?;

        info!("Appended block {} with digest {}", index, block.digest);
        self.blocks.push(block);
        Ok(self.latest_block())
    }

    /// Scans blocks 1.. for the first block whose digest is stale, whose link
    /// to its predecessor is broken, or whose digest lacks the required work.
    /// The genesis block is not checked.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        for (index, pair) in self.blocks.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let index = index + 1;
            check_block(current, index, self.config.difficulty)?;
            if current.previous_digest != previous.digest {
                return Err(ValidationError::BrokenLink { index });
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("chain validation failed: {e}");
                false
            }
        }
    }
}

fn check_block<P: Payload>(
    block: &Block<P>,
    index: usize,
    difficulty: usize,
) -> std::result::Result<(), ValidationError> {
    let recomputed = block
        .compute_digest()
        .map_err(|_| ValidationError::Unserializable { index })?;
    if recomputed != block.digest {
        return Err(ValidationError::DigestMismatch { index });
    }
    if !meets_difficulty(&block.digest, difficulty) {
        return Err(ValidationError::InsufficientWork { index, difficulty });
    }
    Ok(())
}
