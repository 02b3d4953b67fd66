//! Account balances derived from the transactions committed to a chain.
//!
//! Nothing here checks that a sender can afford what it sends: balances are a
//! plain fold over committed transactions and may go negative. Balances are
//! summed as `i128`, wide enough that any chain of `i64` amounts fits.

use crate::{
    chain::Chain,
    mine::CancelToken,
    Block, ChainConfig, Result, Transaction, ValidationError,
};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

#[derive(Clone, Debug)]
pub struct Ledger {
    chain: Chain<Vec<Transaction>>,
    pending: Vec<Transaction>,
}

impl Ledger {
    pub fn new(config: ChainConfig) -> Result<Self> {
        Ok(Self {
            chain: Chain::new(config)?,
            pending: Vec::new(),
        })
    }

    pub fn chain(&self) -> &Chain<Vec<Transaction>> {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut Chain<Vec<Transaction>> {
        &mut self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn mining_reward(&self) -> i64 {
        self.chain.config().mining_reward
    }

    /// Queues a transaction for the next mined block. No checks are made.
    pub fn create_transaction(&mut self, tx: Transaction) {
        self.pending.push(tx);
    }

    pub fn mine_pending_transactions(&mut self, reward_address: &str) -> Result<&Block<Vec<Transaction>>> {
        self.mine_pending_transactions_cancellable(reward_address, &CancelToken::new())
    }

    /// Mines every pending transaction into a new block. On success the
    /// pending list is replaced by a single reward for `reward_address`; on
    /// failure it is left as it was.
    pub fn mine_pending_transactions_cancellable(
        &mut self,
        reward_address: &str,
        cancel: &CancelToken,
    ) -> Result<&Block<Vec<Transaction>>> {
        let mut block = self.next_block()?;
        self.chain.miner().mine(&mut block, cancel)?;
        self.commit_block(block, reward_address)
    }

    /// An unmined block holding a snapshot of the pending list, linked to the tip.
    pub fn next_block(&self) -> Result<Block<Vec<Transaction>>> {
        let mut block = Block::new(None, now_millis().to_string(), self.pending.clone())?;
        block.previous_digest = self.chain.latest_block().digest.clone();
        Ok(block)
    }

    /// Appends a mined block and starts the next pending list with the reward.
    /// Transactions queued after the block was built are dropped.
    pub fn commit_block(
        &mut self,
        block: Block<Vec<Transaction>>,
        reward_address: &str,
    ) -> Result<&Block<Vec<Transaction>>> {
        let dropped = self.pending.len().saturating_sub(block.payload.len());
        let reward = Transaction::reward(reward_address, self.mining_reward());
        self.chain.append_mined(block)?;
        if dropped > 0 {
            info!("{dropped} transactions queued during mining were discarded");
        }
        self.pending = vec![reward];
        Ok(self.chain.latest_block())
    }

    /// Net of everything `address` received minus everything it sent, over
    /// committed blocks only.
    pub fn balance_of(&self, address: &str) -> i128 {
        let mut balance = 0i128;
        for tx in self.committed() {
            if tx.from_address.as_deref() == Some(address) {
                balance -= i128::from(tx.amount);
            }
            if tx.to_address == address {
                balance += i128::from(tx.amount);
            }
        }
        balance
    }

    /// Balance of every address that appears in a committed transaction.
    pub fn balances(&self) -> BTreeMap<String, i128> {
        let mut balances = BTreeMap::new();
        for tx in self.committed() {
            let amount = i128::from(tx.amount);
            if let Some(from) = &tx.from_address {
                *balances.entry(from.clone()).or_insert(0) -= amount;
            }
            *balances.entry(tx.to_address.clone()).or_insert(0) += amount;
        }
        balances
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.chain.validate()
    }

    pub fn is_valid(&self) -> bool {
        self.chain.is_valid()
    }

    fn committed(&self) -> impl Iterator<Item = &Transaction> {
        self.chain.blocks().iter().flat_map(|b| b.payload.iter())
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LedgerError;

    fn ledger() -> Ledger {
        Ledger::new(ChainConfig::with_difficulty(1)).unwrap()
    }

    #[test]
    fn balance_fold_example() {
        let mut ledger = ledger();
        ledger.create_transaction(Transaction::reward("A", 100));
        ledger.mine_pending_transactions("miner").unwrap();
        ledger.create_transaction(Transaction::new("A", "B", 40));
        ledger.mine_pending_transactions("miner").unwrap();

        assert_eq!(ledger.balance_of("A"), 60);
        assert_eq!(ledger.balance_of("B"), 40);
        assert!(ledger.is_valid());
    }

    #[test]
    fn reward_is_credited_only_once_committed() {
        let mut ledger = ledger();
        ledger.mine_pending_transactions("miner").unwrap();
        assert_eq!(ledger.balance_of("miner"), 0);
        assert_eq!(ledger.pending(), &[Transaction::reward("miner", 100)]);

        ledger.mine_pending_transactions("miner").unwrap();
        assert_eq!(ledger.balance_of("miner"), 100);
    }

    #[test]
    fn pending_transactions_are_excluded() {
        let mut ledger = ledger();
        ledger.create_transaction(Transaction::new("A", "B", 5));
        assert_eq!(ledger.balance_of("B"), 0);
        assert_eq!(ledger.pending().len(), 1);
    }

    #[test]
    fn overspend_goes_negative() {
        let mut ledger = ledger();
        ledger.create_transaction(Transaction::new("A", "B", 25));
        ledger.mine_pending_transactions("miner").unwrap();
        assert_eq!(ledger.balance_of("A"), -25);
    }

    #[test]
    fn self_transfer_nets_to_zero() {
        let mut ledger = ledger();
        ledger.create_transaction(Transaction::new("A", "A", 10));
        ledger.mine_pending_transactions("miner").unwrap();
        assert_eq!(ledger.balance_of("A"), 0);
    }

    #[test]
    fn extreme_amounts_do_not_overflow() {
        let mut ledger = ledger();
        ledger.create_transaction(Transaction::new("A", "B", i64::MIN));
        ledger.create_transaction(Transaction::reward("C", i64::MAX));
        ledger.create_transaction(Transaction::reward("C", 1));
        ledger.mine_pending_transactions("miner").unwrap();

        assert_eq!(ledger.balance_of("A"), -i128::from(i64::MIN));
        assert_eq!(ledger.balance_of("B"), i128::from(i64::MIN));
        assert_eq!(ledger.balance_of("C"), i128::from(i64::MAX) + 1);

        let balances = ledger.balances();
        assert_eq!(balances.get("A"), Some(&(1i128 << 63)));
        assert_eq!(balances.get("C"), Some(&(1i128 << 63)));
        assert!(ledger.is_valid());
    }

    #[test]
    fn balances_lists_every_address() {
        let mut ledger = ledger();
        ledger.create_transaction(Transaction::reward("A", 100));
        ledger.create_transaction(Transaction::new("A", "B", 30));
        ledger.mine_pending_transactions("miner").unwrap();
        ledger.mine_pending_transactions("miner").unwrap();

        let balances = ledger.balances();
        assert_eq!(balances.get("A"), Some(&70));
        assert_eq!(balances.get("B"), Some(&30));
        assert_eq!(balances.get("miner"), Some(&100));
        assert_eq!(balances.len(), 3);
    }

    #[test]
    fn mined_block_carries_pending_snapshot() {
        let mut ledger = ledger();
        let tx = Transaction::new("A", "B", 1);
        ledger.create_transaction(tx.clone());
        let block = ledger.mine_pending_transactions("miner").unwrap();
        assert_eq!(block.payload, vec![tx]);
        assert_eq!(block.index, None);
    }

    #[test]
    fn failed_mine_keeps_pending() {
        let config = ChainConfig {
            difficulty: 64,
            max_attempts: Some(8),
            ..ChainConfig::default()
        };
        let mut ledger = Ledger::new(config).unwrap();
        ledger.create_transaction(Transaction::new("A", "B", 1));
        let err = ledger.mine_pending_transactions("miner").unwrap_err();
        assert!(matches!(err, LedgerError::AttemptBudgetExhausted { .. }));
        assert_eq!(ledger.pending(), &[Transaction::new("A", "B", 1)]);
        assert_eq!(ledger.chain().len(), 1);
    }

    #[test]
    fn transactions_queued_during_mining_are_discarded() {
        let mut ledger = ledger();
        ledger.create_transaction(Transaction::new("A", "B", 1));
        let mut block = ledger.next_block().unwrap();
        ledger.create_transaction(Transaction::new("C", "D", 2));
        ledger
            .chain()
            .miner()
            .mine(&mut block, &CancelToken::new())
            .unwrap();
        ledger.commit_block(block, "miner").unwrap();
        assert_eq!(ledger.pending(), &[Transaction::reward("miner", 100)]);
        assert_eq!(ledger.balance_of("D"), 0);
    }

    #[test]
    fn tampered_amount_is_detected() {
        let mut ledger = ledger();
        ledger.create_transaction(Transaction::new("A", "B", 40));
        ledger.mine_pending_transactions("miner").unwrap();
        ledger.chain_mut().block_mut(1).unwrap().payload[0].amount = 4000;
        assert_eq!(
            ledger.validate(),
            Err(ValidationError::DigestMismatch { index: 1 })
        );
    }
}
