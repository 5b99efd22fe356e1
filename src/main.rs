//! Epoch Bot CLI
//!
//! Runs the managed accounts against the epoch betting game.

use alloy::primitives::U256;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use epoch_bot::{generate_wallets, AccountStore, ChainClient, Config, Mode, Orchestrator, RpcChainClient, RpcSettings};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "epoch-bot")]
#[command(about = "Multi-account bot for the on-chain epoch betting game")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Accounts processed at the same time (overrides CONCURRENCY)
    #[arg(short, long, global = true)]
    concurrency: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint the NFT and approve the game for every account
    Enroll,

    /// Place one bet per account on the current epoch
    Play,

    /// Claim winnings for the given epochs
    Claim {
        /// Epoch numbers to claim
        #[arg(required = true, num_args = 1..)]
        epochs: Vec<u64>,
    },

    /// Print the game's current epoch
    Epoch,

    /// Generate fresh accounts into the accounts file
    Generate {
        /// Number of accounts to create
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    config.validate()?;

    match cli.command {
        Commands::Enroll => run_mode(&config, Mode::Enroll).await?,
        Commands::Play => run_mode(&config, Mode::Play).await?,
        Commands::Claim { epochs } => {
            let epochs = epochs.into_iter().map(U256::from).collect();
            run_mode(&config, Mode::Claim { epochs }).await?
        }
        Commands::Epoch => show_epoch(&config).await?,
        Commands::Generate { count } => generate_accounts(&config, count)?,
    }

    Ok(())
}

async fn run_mode(config: &Config, mode: Mode) -> Result<()> {
    let accounts = AccountStore::load(&config.accounts_path)?;
    if accounts.is_empty() {
        bail!("No accounts in {}", config.accounts_path.display());
    }

    let client = RpcChainClient::connect(RpcSettings::from_config(config))
        .await
        .context("Failed to connect to RPC node")?;

    let orchestrator = Orchestrator::from_config(Arc::new(client), config)?;
    let summary = orchestrator.run(&accounts, &mode).await;

    if summary.failed() > 0 || summary.skipped() > 0 {
        warn!("{} finished with problems: {}", mode, summary);
    }
    Ok(())
}

async fn show_epoch(config: &Config) -> Result<()> {
    let client = RpcChainClient::connect(RpcSettings::from_config(config))
        .await
        .context("Failed to connect to RPC node")?;
    let epoch = client.read_current_epoch().await?;
    println!("Current epoch: {}", epoch);
    Ok(())
}

fn generate_accounts(config: &Config, count: usize) -> Result<()> {
    if count == 0 {
        bail!("Count must be at least 1");
    }

    let wallets = generate_wallets(count);
    if let Some(backup) = AccountStore::save(&config.accounts_path, &wallets)? {
        info!("Previous accounts backed up to {}", backup.display());
    }

    info!("Wrote {} accounts to {}", wallets.len(), config.accounts_path.display());
    for wallet in &wallets {
        println!("{}", wallet.address);
    }
    Ok(())
}
