//! Chain-facing services for the epoch bot

pub mod chain_client;
pub mod chain_errors;
pub mod orchestrator;
pub mod retry;
pub mod signer;
pub mod strategy;
pub mod tx_builder;

#[cfg(test)]
mod mock_node;

pub use chain_client::{ChainClient, RpcChainClient, RpcSettings};
pub use chain_errors::{ChainError, SubmissionReason};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use retry::{with_retry, RetryConfig, Retryable};
pub use signer::{LocalTransactionSigner, TransactionSigner};
pub use strategy::{BetChoice, BettingStrategy, SidePolicy};
pub use tx_builder::{AbiKeccakHasher, MintKeyHasher, TransactionBuilder};
