//! Configuration management for the epoch bot

use alloy::primitives::{address, Address, U256};
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::retry::RetryConfig;
use crate::services::strategy::SidePolicy;

/// Arbitrum Sepolia
pub const DEFAULT_CHAIN_ID: u64 = 421614;
pub const DEFAULT_RPC_URL: &str = "https://sepolia-rollup.arbitrum.io/rpc";

/// Deployed game contracts; swapped per network through the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    /// ERC-20 stake token
    pub token: Address,
    /// ERC-721 membership NFT
    pub nft: Address,
    /// Epoch betting game
    pub game: Address,
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            token: address!("304F4A54Ec4D66107a58080869990d982b348b9C"),
            nft: address!("9aaa9404a86618FB084d4CD277d07fB9fd3C36a9"),
            game: address!("49f9D992310f194cB3F0019A6F13ca2f3Df9c52B"),
        }
    }
}

/// Fixed gas limit per operation (no estimation round-trip)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasLimits {
    pub approve: u64,
    pub mint: u64,
    pub bet: u64,
    pub claim: u64,
}

impl GasLimits {
    pub fn uniform(gas: u64) -> Self {
        Self {
            approve: gas,
            mint: gas,
            bet: gas,
            claim: gas,
        }
    }
}

impl Default for GasLimits {
    fn default() -> Self {
        Self::uniform(300_000)
    }
}

/// Bet sizing settings
#[derive(Debug, Clone)]
pub struct BettingConfig {
    /// Smallest whole-token stake (inclusive)
    pub stake_min: u64,
    /// Largest whole-token stake (inclusive)
    pub stake_max: u64,
    /// Decimals of the stake token
    pub token_decimals: u8,
    pub side_policy: SidePolicy,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            stake_min: 5_000,
            stake_max: 100_000,
            token_decimals: 18,
            side_policy: SidePolicy::Parity,
            seed: None,
        }
    }
}

impl BettingConfig {
    /// `stake` scaled to token units, or `None` if it does not fit in a uint256
    pub fn token_amount(&self, stake: u64) -> Option<U256> {
        U256::from(10u64)
            .checked_pow(U256::from(self.token_decimals))?
            .checked_mul(U256::from(stake))
    }
}

/// Bot configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON-RPC endpoint of the node
    pub rpc_url: String,

    /// Chain id the node must report
    pub chain_id: u64,

    pub contracts: ContractAddresses,

    /// Path to the accounts JSON file
    pub accounts_path: PathBuf,

    pub gas_limits: GasLimits,

    pub betting: BettingConfig,

    /// Percent applied to the latest base fee when computing max fee (120 = 1.2x)
    pub base_fee_multiplier_pct: u64,

    /// Per-request HTTP timeout
    pub rpc_timeout: Duration,

    /// Maximum wait for one receipt
    pub receipt_timeout: Duration,

    /// Delay between receipt polls
    pub receipt_poll_interval: Duration,

    /// Extra receipt waits after a timeout before giving up (never resends)
    pub receipt_rechecks: u32,

    /// Accounts processed in parallel (1 = strictly sequential)
    pub concurrency: usize,

    /// Pause after each account
    pub account_delay: Duration,

    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            contracts: ContractAddresses::default(),
            accounts_path: PathBuf::from("accounts.json"),
            gas_limits: GasLimits::default(),
            betting: BettingConfig::default(),
            base_fee_multiplier_pct: 120,
            rpc_timeout: Duration::from_secs(30),
            receipt_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_millis(1000),
            receipt_rechecks: 1,
            concurrency: 1,
            account_delay: Duration::ZERO,
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build configuration from a variable map; unset or empty keys use defaults
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let rpc_url = get("RPC_URL").map(str::to_string).unwrap_or(defaults.rpc_url);
        let chain_id = parse_or(get("CHAIN_ID"), "CHAIN_ID", defaults.chain_id)?;

        let contracts = ContractAddresses {
            token: parse_address(get("TOKEN_ADDRESS"), "TOKEN_ADDRESS", defaults.contracts.token)?,
            nft: parse_address(get("NFT_ADDRESS"), "NFT_ADDRESS", defaults.contracts.nft)?,
            game: parse_address(get("GAME_ADDRESS"), "GAME_ADDRESS", defaults.contracts.game)?,
        };

        let accounts_path = get("ACCOUNTS_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.accounts_path);

        let gas_limits = match get("GAS_LIMIT") {
            Some(_) => GasLimits::uniform(parse_or(get("GAS_LIMIT"), "GAS_LIMIT", 300_000)?),
            None => defaults.gas_limits,
        };

        let side_policy = match get("SIDE_POLICY") {
            Some(v) => v.parse::<SidePolicy>().map_err(anyhow::Error::msg)?,
            None => defaults.betting.side_policy,
        };

        let betting = BettingConfig {
            stake_min: parse_or(get("STAKE_MIN"), "STAKE_MIN", defaults.betting.stake_min)?,
            stake_max: parse_or(get("STAKE_MAX"), "STAKE_MAX", defaults.betting.stake_max)?,
            token_decimals: parse_or(get("TOKEN_DECIMALS"), "TOKEN_DECIMALS", defaults.betting.token_decimals)?,
            side_policy,
            seed: get("BET_SEED")
                .map(|v| v.parse().context("BET_SEED must be an integer"))
                .transpose()?,
        };

        let retry = RetryConfig {
            max_retries: parse_or(get("MAX_RETRIES"), "MAX_RETRIES", defaults.retry.max_retries)?,
            initial_delay_ms: parse_or(
                get("RETRY_INITIAL_DELAY_MS"),
                "RETRY_INITIAL_DELAY_MS",
                defaults.retry.initial_delay_ms,
            )?,
            max_delay_ms: parse_or(get("RETRY_MAX_DELAY_MS"), "RETRY_MAX_DELAY_MS", defaults.retry.max_delay_ms)?,
            ..defaults.retry
        };

        let config = Self {
            rpc_url,
            chain_id,
            contracts,
            accounts_path,
            gas_limits,
            betting,
            base_fee_multiplier_pct: parse_or(
                get("BASE_FEE_MULTIPLIER_PCT"),
                "BASE_FEE_MULTIPLIER_PCT",
                defaults.base_fee_multiplier_pct,
            )?,
            rpc_timeout: Duration::from_secs(parse_or(get("RPC_TIMEOUT_SECS"), "RPC_TIMEOUT_SECS", 30)?),
            receipt_timeout: Duration::from_secs(parse_or(
                get("RECEIPT_TIMEOUT_SECS"),
                "RECEIPT_TIMEOUT_SECS",
                120,
            )?),
            receipt_poll_interval: Duration::from_millis(parse_or(
                get("RECEIPT_POLL_INTERVAL_MS"),
                "RECEIPT_POLL_INTERVAL_MS",
                1000,
            )?),
            receipt_rechecks: parse_or(get("RECEIPT_RECHECKS"), "RECEIPT_RECHECKS", defaults.receipt_rechecks)?,
            concurrency: parse_or(get("CONCURRENCY"), "CONCURRENCY", defaults.concurrency)?,
            account_delay: Duration::from_millis(parse_or(get("ACCOUNT_DELAY_MS"), "ACCOUNT_DELAY_MS", 0)?),
            retry,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.betting.stake_min > self.betting.stake_max {
            bail!(
                "STAKE_MIN ({}) must not exceed STAKE_MAX ({})",
                self.betting.stake_min,
                self.betting.stake_max
            );
        }
        if self.betting.token_decimals > 60 {
            bail!("TOKEN_DECIMALS ({}) is out of range", self.betting.token_decimals);
        }
        if self.betting.token_amount(self.betting.stake_max).is_none() {
            bail!(
                "STAKE_MAX ({}) with TOKEN_DECIMALS ({}) overflows uint256",
                self.betting.stake_max,
                self.betting.token_decimals
            );
        }
        if self.concurrency == 0 {
            bail!("CONCURRENCY must be at least 1");
        }
        if self.base_fee_multiplier_pct < 100 {
            bail!("BASE_FEE_MULTIPLIER_PCT must be at least 100");
        }
        if self.receipt_poll_interval.is_zero() {
            bail!("RECEIPT_POLL_INTERVAL_MS must be positive");
        }
        Ok(())
    }
}

fn parse_or<T>(value: Option<&str>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", key, v, e)),
        None => Ok(default),
    }
}

fn parse_address(value: Option<&str>, key: &str, default: Address) -> Result<Address> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", key, v, e)),
        None => Ok(default),
    }
}
