//! Single-owner task around a [`Ledger`]. Commands are served strictly in
//! order, so callers on different tasks never observe a half-applied mine.

use crate::{
    ledger::Ledger,
    mine::CancelToken,
    Block, LedgerError, Result, Transaction,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const MAILBOX_SIZE: usize = 64;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    CreateTransaction(Transaction, Reply<()>),
    MinePending {
        reward_address: String,
        cancel: CancelToken,
        reply: Reply<Result<Block<Vec<Transaction>>>>,
    },
    BalanceOf(String, Reply<i128>),
    IsValid(Reply<bool>),
    LatestBlock(Reply<Block<Vec<Transaction>>>),
    Pending(Reply<Vec<Transaction>>),
    Shutdown,
}

/// Cloneable front for a ledger owned by a background task.
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    tx: mpsc::Sender<Command>,
}

impl LedgerHandle {
    /// Moves `ledger` into a new task. The join handle yields it back after
    /// [`LedgerHandle::shutdown`] or once every handle is dropped.
    pub fn spawn(ledger: Ledger) -> (Self, JoinHandle<Ledger>) {
        let (tx, rx) = mpsc::channel(MAILBOX_SIZE);
        let task = tokio::spawn(run(ledger, rx));
        (Self { tx }, task)
    }

    pub async fn create_transaction(&self, tx: Transaction) -> Result<()> {
        self.request(|reply| Command::CreateTransaction(tx, reply)).await
    }

    /// Mining runs on the blocking pool. Commands sent meanwhile wait until
    /// the block is committed or the search fails.
    pub async fn mine_pending_transactions(
        &self,
        reward_address: impl Into<String>,
        cancel: CancelToken,
    ) -> Result<Block<Vec<Transaction>>> {
        let reward_address = reward_address.into();
        self.request(|reply| Command::MinePending {
            reward_address,
            cancel,
            reply,
        })
        .await?
    }

    pub async fn balance_of(&self, address: impl Into<String>) -> Result<i128> {
        let address = address.into();
        self.request(|reply| Command::BalanceOf(address, reply)).await
    }

    pub async fn is_valid(&self) -> Result<bool> {
        self.request(Command::IsValid).await
    }

    pub async fn latest_block(&self) -> Result<Block<Vec<Transaction>>> {
        self.request(Command::LatestBlock).await
    }

    pub async fn pending(&self) -> Result<Vec<Transaction>> {
        self.request(Command::Pending).await
    }

    /// Asks the task to stop after the commands already queued.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| LedgerError::ActorClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| LedgerError::ActorClosed)?;
        rx.await.map_err(|_| LedgerError::ActorClosed)
    }
}

async fn run(mut ledger: Ledger, mut rx: mpsc::Receiver<Command>) -> Ledger {
    info!("ledger actor started");
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::CreateTransaction(tx, reply) => {
                ledger.create_transaction(tx);
                let _ = reply.send(());
            }
            Command::MinePending {
                reward_address,
                cancel,
                reply,
            } => {
                let result = mine(&mut ledger, &reward_address, cancel).await;
                let _ = reply.send(result);
            }
            Command::BalanceOf(address, reply) => {
                let _ = reply.send(ledger.balance_of(&address));
            }
            Command::IsValid(reply) => {
                let _ = reply.send(ledger.is_valid());
            }
            Command::LatestBlock(reply) => {
                let _ = reply.send(ledger.chain().latest_block().clone());
            }
            Command::Pending(reply) => {
                let _ = reply.send(ledger.pending().to_vec());
            }
            Command::Shutdown => {
                debug!("ledger actor shutdown requested");
                break;
            }
        }
    }
    info!("ledger actor stopped");
    ledger
}

async fn mine(
    ledger: &mut Ledger,
    reward_address: &str,
    cancel: CancelToken,
) -> Result<Block<Vec<Transaction>>> {
    let mut block = ledger.next_block()?;
    let miner = ledger.chain().miner().clone();
    let block = tokio::task::spawn_blocking(move || {
        miner.mine(&mut block, &cancel).map(|_| block)
    })
    .await??;
    ledger.commit_block(block, reward_address).cloned()
}
