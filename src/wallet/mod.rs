//! Wallet management for the managed account pool
//!
//! Provides key generation and the on-disk accounts file.

mod generator;
mod store;

pub use generator::{generate_wallet, generate_wallets, wallet_from_private_key, GeneratedWallet};
pub use store::{AccountStore, ManagedAccount, SigningKey};
