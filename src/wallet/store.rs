//! Accounts file and the in-memory account pool
//!
//! The file is a JSON array of `{ "privateKey", "address" }` records. It is
//! read once at startup; the keys stay inside this module and the signer.

use super::generator::{wallet_from_private_key, GeneratedWallet};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Hex private key. Never printed.
#[derive(Clone)]
pub struct SigningKey(String);

impl SigningKey {
    pub fn new(private_key: impl Into<String>) -> Self {
        Self(private_key.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

/// A signing identity managed by the bot
#[derive(Debug)]
pub struct ManagedAccount {
    pub address: Address,
    key: SigningKey,
}

impl ManagedAccount {
    pub fn new(address: Address, key: SigningKey) -> Self {
        Self { address, key }
    }

    /// Build an account whose address is derived from the key
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        Ok(Self {
            address: wallet_from_private_key(private_key)?,
            key: SigningKey::new(private_key),
        })
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }
}

/// Read-only pool of managed accounts, in file order
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: Vec<ManagedAccount>,
}

impl AccountStore {
    pub fn from_accounts(accounts: Vec<ManagedAccount>) -> Self {
        Self { accounts }
    }

    /// Load the accounts file.
    ///
    /// A key that parses but derives a different address than recorded makes
    /// the whole file invalid. A key that does not parse is kept so that only
    /// that account fails when it is signed for.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read accounts file {}", path.display()))?;
        let records: Vec<GeneratedWallet> =
            serde_json::from_str(&contents).context("Failed to parse accounts file")?;

        let mut accounts = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let address = Address::from_str(&record.address)
                .with_context(|| format!("Invalid address in account #{}", index))?;

            match record.private_key.parse::<PrivateKeySigner>() {
                Ok(signer) if signer.address() != address => {
                    bail!(
                        "Account #{} key derives {:?}, file records {:?}",
                        index,
                        signer.address(),
                        address
                    );
                }
                Ok(_) => {}
                Err(_) => {
                    warn!("[Accounts] Account #{} ({:?}) has malformed key material", index, address);
                }
            }

            accounts.push(ManagedAccount::new(address, SigningKey::new(record.private_key)));
        }

        info!("[Accounts] Loaded {} accounts from {}", accounts.len(), path.display());
        Ok(Self { accounts })
    }

    /// Write a fresh accounts file. An existing file is first copied to
    /// `accounts-<unix millis>.json` next to it; the backup path is returned.
    pub fn save(path: &Path, wallets: &[GeneratedWallet]) -> Result<Option<PathBuf>> {
        let backup = if path.exists() {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("accounts");
            let backup = path.with_file_name(format!(
                "{}-{}.json",
                stem,
                chrono::Utc::now().timestamp_millis()
            ));
            fs::copy(path, &backup)
                .with_context(|| format!("Failed to back up {}", path.display()))?;
            info!("[Accounts] Previous accounts copied to {}", backup.display());
            Some(backup)
        } else {
            None
        };

        let json = serde_json::to_string_pretty(wallets)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(backup)
    }

    pub fn accounts(&self) -> &[ManagedAccount] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
