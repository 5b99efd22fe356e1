//! Wallet generation using alloy

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One record of the accounts file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedWallet {
    /// Private key in hex format (0x prefixed)
    pub private_key: String,
    /// Checksummed address (0x prefixed)
    pub address: String,
}

/// Generate a new random wallet
pub fn generate_wallet() -> GeneratedWallet {
    let signer = PrivateKeySigner::random();

    GeneratedWallet {
        private_key: format!("0x{}", hex::encode(signer.to_bytes())),
        address: signer.address().to_checksum(None),
    }
}

pub fn generate_wallets(count: usize) -> Vec<GeneratedWallet> {
    (0..count).map(|_| generate_wallet()).collect()
}

/// Derive the address controlled by a private key
pub fn wallet_from_private_key(private_key: &str) -> Result<Address> {
    let signer: PrivateKeySigner = private_key.parse().context("Failed to parse private key")?;

    Ok(signer.address())
}
