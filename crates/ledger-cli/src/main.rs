use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ledger_core::{
    actor::LedgerHandle,
    chain::Chain,
    ledger::Ledger,
    mine::CancelToken,
    Block, ChainConfig, Transaction,
};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Walk through mining, validating and tampering with a proof-of-work chain")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct MiningArgs {
    /// Leading zero hex characters required in each mined digest
    #[arg(long, default_value_t = 2)]
    difficulty: usize,
    /// Give up on a block after this many nonces
    #[arg(long)]
    max_attempts: Option<u64>,
    /// Search nonces on every core
    #[arg(long)]
    parallel: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine two data blocks, then tamper with the first and re-check the chain
    Demo {
        #[command(flatten)]
        mining: MiningArgs,
        /// Print the final chain as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move coins between addresses and print the resulting balances
    Ledger {
        #[command(flatten)]
        mining: MiningArgs,
        /// Amount credited for each mined block
        #[arg(long, default_value_t = 100)]
        reward: i64,
        /// Address that receives mining rewards
        #[arg(long, default_value = "miner")]
        miner: String,
    },
}

impl MiningArgs {
    fn config(&self) -> ChainConfig {
        ChainConfig {
            difficulty: self.difficulty,
            max_attempts: self.max_attempts,
            parallel: self.parallel,
            ..ChainConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling mining");
                cancel.cancel();
            }
        });
    }

    let cli = Cli::parse();
    match cli.cmd {
        Command::Demo { mining, json } => {
            let config = mining.config();
            tokio::task::spawn_blocking(move || run_demo(config, json, &cancel)).await??;
        }
        Command::Ledger {
            mining,
            reward,
            miner,
        } => {
            let config = ChainConfig {
                mining_reward: reward,
                ..mining.config()
            };
            run_ledger(config, &miner, cancel).await?;
        }
    }
    Ok(())
}

fn run_demo(config: ChainConfig, json: bool, cancel: &CancelToken) -> Result<()> {
    let mut chain = Chain::<Value>::new(config)?;

    println!("Mining block 1 ...");
    chain.add_block_cancellable(Block::new(Some(1), "10/07/2018", json!({ "amount": 4 }))?, cancel)?;
    println!("Mining block 2 ...");
    chain.add_block_cancellable(Block::new(Some(2), "12/07/2018", json!({ "amount": 7 }))?, cancel)?;
    println!("valid: {}", chain.is_valid());

    if let Some(block) = chain.block_mut(1) {
        block.payload = json!({ "amount": 100 });
    }
    println!("valid after tampering: {}", chain.is_valid());

    let miner = chain.miner().clone();
    if let Some(block) = chain.block_mut(1) {
        miner.mine(block, cancel)?;
    }
    println!("valid after remining the tampered block: {}", chain.is_valid());
    if let Err(e) = chain.validate() {
        println!("reason: {e}");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(chain.blocks())?);
    }
    Ok(())
}

async fn run_ledger(config: ChainConfig, miner: &str, cancel: CancelToken) -> Result<()> {
    let (handle, task) = LedgerHandle::spawn(Ledger::new(config)?);

    handle.create_transaction(Transaction::new("address1", "address2", 100)).await?;
    handle.create_transaction(Transaction::new("address2", "address1", 50)).await?;

    println!("Starting the miner ...");
    handle.mine_pending_transactions(miner, cancel.clone()).await?;
    println!("Balance of {miner}: {}", handle.balance_of(miner).await?);

    println!("Starting the miner again ...");
    handle.mine_pending_transactions(miner, cancel).await?;
    println!("Balance of {miner}: {}", handle.balance_of(miner).await?);
    for address in ["address1", "address2"] {
        println!("Balance of {address}: {}", handle.balance_of(address).await?);
    }
    println!("valid: {}", handle.is_valid().await?);

    handle.shutdown().await?;
    task.await?;
    Ok(())
}
