//! Core types for the epoch bot

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::services::chain_errors::ChainError;

/// EIP-1559 fee quote, fetched fresh for every transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeParameters {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    /// Only meaningful for blob transactions; never set for contract calls
    pub max_fee_per_blob_gas: Option<u128>,
}

/// Envelope type of a built transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Eip1559,
}

/// A contract call ready to be signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedCall {
    pub to: Address,
    pub input: Bytes,
    pub nonce: u64,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub fees: FeeParameters,
    pub tx_type: TransactionType,
}

/// Serialized EIP-2718 envelope. Not `Clone`: it is handed to the node once.
#[derive(Debug)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
    pub sender: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failure,
}

/// Terminal on-chain record of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub status: ReceiptStatus,
    pub block_number: u64,
    pub block_hash: Option<B256>,
}

/// Which game function a bet calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetSide {
    High,
    Low,
}

impl fmt::Display for BetSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetSide::High => write!(f, "betHigh"),
            BetSide::Low => write!(f, "betLow"),
        }
    }
}

/// Fully resolved arguments of a single bet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetParameters {
    pub epoch: U256,
    pub side: BetSide,
    /// Whole-token stake as drawn by the strategy
    pub stake: u64,
    /// `stake` scaled to the token's decimals
    pub amount: U256,
}

/// A contract interaction the orchestrator can perform for an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Approve,
    Mint,
    Bet(BetParameters),
    Claim { epochs: Vec<U256> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Approve,
    Mint,
    Bet,
    Claim,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Approve => write!(f, "approve"),
            OperationKind::Mint => write!(f, "mint"),
            OperationKind::Bet => write!(f, "bet"),
            OperationKind::Claim => write!(f, "claim"),
        }
    }
}

/// What one orchestrator invocation does for every account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Mint the NFT, then approve the game to spend tokens
    Enroll,
    /// Place one bet on the current epoch
    Play,
    /// Claim winnings for the given epochs
    Claim { epochs: Vec<U256> },
}

impl Mode {
    pub fn operations(&self) -> Vec<OperationKind> {
        match self {
            Mode::Enroll => vec![OperationKind::Mint, OperationKind::Approve],
            Mode::Play => vec![OperationKind::Bet],
            Mode::Claim { .. } => vec![OperationKind::Claim],
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Enroll => write!(f, "enroll"),
            Mode::Play => write!(f, "play"),
            Mode::Claim { epochs } => write!(f, "claim ({} epochs)", epochs.len()),
        }
    }
}

/// Lifecycle stage of one transaction cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    FeesFetched,
    NonceFetched,
    CallBuilt,
    Signed,
    Broadcast,
    Confirmed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::FeesFetched => "fees-fetched",
            Stage::NonceFetched => "nonce-fetched",
            Stage::CallBuilt => "call-built",
            Stage::Signed => "signed",
            Stage::Broadcast => "broadcast",
            Stage::Confirmed => "confirmed",
        };
        write!(f, "{}", name)
    }
}

/// A failed cycle, tagged with the stage it was in when the error happened
#[derive(Debug)]
pub struct CycleFailure {
    pub stage: Stage,
    pub error: ChainError,
}

impl fmt::Display for CycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.error.kind(), self.stage, self.error)
    }
}

/// Successful end of a cycle
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub tx_hash: B256,
    pub nonce: u64,
    pub block_number: u64,
    pub bet: Option<BetParameters>,
}

#[derive(Debug)]
pub enum Outcome {
    Confirmed(Confirmation),
    Failed(CycleFailure),
    /// Not attempted because an earlier transaction of the account may still be pending
    Skipped { reason: String },
}

/// Result of one operation for one account
#[derive(Debug)]
pub struct OperationReport {
    pub address: Address,
    pub operation: OperationKind,
    pub outcome: Outcome,
}

impl OperationReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Confirmed(_))
    }

    pub fn confirmation(&self) -> Option<&Confirmation> {
        match &self.outcome {
            Outcome::Confirmed(c) => Some(c),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&CycleFailure> {
        match &self.outcome {
            Outcome::Failed(f) => Some(f),
            _ => None,
        }
    }
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Confirmed(c) => match &c.bet {
                Some(bet) => write!(
                    f,
                    "Done {} for {:?} {} {} {}",
                    self.operation, self.address, c.tx_hash, bet.side, bet.stake
                ),
                None => write!(f, "Done {} for {:?} {}", self.operation, self.address, c.tx_hash),
            },
            Outcome::Failed(failure) => {
                write!(f, "Failed {} for {:?}: {}", self.operation, self.address, failure)
            }
            Outcome::Skipped { reason } => {
                write!(f, "Skipped {} for {:?}: {}", self.operation, self.address, reason)
            }
        }
    }
}

/// Everything one orchestrator invocation produced, in account order
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<OperationReport>,
}

impl RunSummary {
    pub fn confirmed(&self) -> usize {
        self.reports.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.failure().is_some()).count()
    }

    pub fn skipped(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Skipped { .. }))
            .count()
    }

    pub fn for_address(&self, address: Address) -> impl Iterator<Item = &OperationReport> {
        self.reports.iter().filter(move |r| r.address == address)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} operations: {} confirmed, {} failed, {} skipped",
            self.reports.len(),
            self.confirmed(),
            self.failed(),
            self.skipped()
        )
    }
}
