//! Epoch Bot Library
//!
//! Drives a pool of managed accounts through an on-chain epoch betting game:
//!
//! 1. **Enroll**: mint the membership NFT and approve the game to spend the
//!    stake token.
//! 2. **Play**: place one bet per account on the current epoch, stake and
//!    side drawn by the betting strategy.
//! 3. **Claim**: collect winnings for finished epochs.
//!
//! Every transaction is a signed EIP-1559 contract call with freshly fetched
//! fees and nonce.

pub mod config;
pub mod services;
pub mod types;
pub mod wallet;

pub use config::Config;
pub use services::{ChainClient, ChainError, Orchestrator, RpcChainClient, RpcSettings};
pub use types::{Mode, Operation, OperationKind, OperationReport, Outcome, RunSummary, Stage};
pub use wallet::{generate_wallet, generate_wallets, wallet_from_private_key, AccountStore, GeneratedWallet, ManagedAccount};
