//! In-memory chain used by the orchestrator tests
//!
//! Decodes every broadcast envelope, enforces per-sender nonce ordering and
//! mines accepted transactions instantly unless told otherwise.

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::services::chain_client::ChainClient;
use crate::services::chain_errors::{ChainError, SubmissionReason};
use crate::types::{FeeParameters, ReceiptStatus, SignedTransaction, TransactionReceipt};

#[derive(Debug, Clone)]
pub struct SubmittedTx {
    pub sender: Address,
    pub hash: B256,
    pub nonce: u64,
    pub to: Address,
    pub input: Bytes,
    pub chain_id: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Default)]
struct State {
    nonces: HashMap<Address, u64>,
    fees: FeeParameters,
    epoch: U256,
    block_number: u64,
    submitted: Vec<SubmittedTx>,
    receipts: HashMap<B256, TransactionReceipt>,
    stalled: HashSet<Address>,
    reverting: HashSet<Address>,
    senders: HashMap<B256, Address>,
    receipt_waits: HashMap<Address, u32>,
    fee_failures: u32,
    broadcast_failures: u32,
    dropped_responses: u32,
    fee_quotes: u32,
    epoch_reads: u32,
    broadcast_attempts: u32,
}

pub struct MockNode {
    state: Mutex<State>,
}

impl MockNode {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                fees: FeeParameters {
                    max_fee_per_gas: 2_000_000_000,
                    max_priority_fee_per_gas: 1_000_000,
                    max_fee_per_blob_gas: None,
                },
                block_number: 100,
                ..Default::default()
            }),
        }
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().unwrap().nonces.insert(address, nonce);
    }

    pub fn set_fees(&self, fees: FeeParameters) {
        self.state.lock().unwrap().fees = fees;
    }

    pub fn set_epoch(&self, epoch: U256) {
        self.state.lock().unwrap().epoch = epoch;
    }

    /// Accept this sender's transactions but never mine them
    pub fn stall(&self, sender: Address) {
        self.state.lock().unwrap().stalled.insert(sender);
    }

    /// Mine calls to `target` with a failed status
    pub fn revert_calls_to(&self, target: Address) {
        self.state.lock().unwrap().reverting.insert(target);
    }

    pub fn fail_next_fee_quotes(&self, count: u32) {
        self.state.lock().unwrap().fee_failures = count;
    }

    pub fn fail_next_broadcasts(&self, count: u32) {
        self.state.lock().unwrap().broadcast_failures = count;
    }

    /// Accept the next broadcasts but answer them with a network error
    pub fn drop_next_broadcast_responses(&self, count: u32) {
        self.state.lock().unwrap().dropped_responses = count;
    }

    pub fn submitted(&self) -> Vec<SubmittedTx> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn receipt_waits(&self, sender: Address) -> u32 {
        self.state
            .lock()
            .unwrap()
            .receipt_waits
            .get(&sender)
            .copied()
            .unwrap_or(0)
    }

    pub fn fee_quotes(&self) -> u32 {
        self.state.lock().unwrap().fee_quotes
    }

    pub fn epoch_reads(&self) -> u32 {
        self.state.lock().unwrap().epoch_reads
    }

    pub fn broadcast_attempts(&self) -> u32 {
        self.state.lock().unwrap().broadcast_attempts
    }
}

#[async_trait]
impl ChainClient for MockNode {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(421614)
    }

    async fn estimate_fees(&self) -> Result<FeeParameters, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.fee_quotes += 1;
        if state.fee_failures > 0 {
            state.fee_failures -= 1;
            return Err(ChainError::Network("connection reset".to_string()));
        }
        Ok(state.fees)
    }

    async fn get_nonce(&self, address: Address) -> Result<u64, ChainError> {
        Ok(self.state.lock().unwrap().nonces.get(&address).copied().unwrap_or(0))
    }

    async fn read_current_epoch(&self) -> Result<U256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.epoch_reads += 1;
        Ok(state.epoch)
    }

    async fn broadcast(&self, tx: SignedTransaction) -> Result<B256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.broadcast_attempts += 1;
        if state.broadcast_failures > 0 {
            state.broadcast_failures -= 1;
            return Err(ChainError::Network("connection reset".to_string()));
        }

        let envelope = TxEnvelope::decode_2718(&mut tx.raw.as_ref())
            .map_err(|e| ChainError::NodeRejection(format!("undecodable transaction: {}", e)))?;
        let inner = envelope
            .as_eip1559()
            .ok_or_else(|| ChainError::NodeRejection("expected an EIP-1559 transaction".to_string()))?
            .tx();
        let to = inner
            .to
            .to()
            .copied()
            .ok_or_else(|| ChainError::NodeRejection("contract creation not expected".to_string()))?;

        let expected = state.nonces.get(&tx.sender).copied().unwrap_or(0);
        if inner.nonce < expected {
            return Err(ChainError::Submission {
                reason: SubmissionReason::NonceTooLow,
            });
        }
        if inner.nonce > expected {
            return Err(ChainError::Submission {
                reason: SubmissionReason::NonceTooHigh,
            });
        }
        if state.senders.contains_key(&tx.hash) {
            return Err(ChainError::Submission {
                reason: SubmissionReason::AlreadyKnown,
            });
        }

        state.submitted.push(SubmittedTx {
            sender: tx.sender,
            hash: tx.hash,
            nonce: inner.nonce,
            to,
            input: inner.input.clone(),
            chain_id: inner.chain_id,
            max_fee_per_gas: inner.max_fee_per_gas,
            max_priority_fee_per_gas: inner.max_priority_fee_per_gas,
        });
        state.senders.insert(tx.hash, tx.sender);

        if !state.stalled.contains(&tx.sender) {
            state.block_number += 1;
            let status = if state.reverting.contains(&to) {
                ReceiptStatus::Failure
            } else {
                ReceiptStatus::Success
            };
            let receipt = TransactionReceipt {
                transaction_hash: tx.hash,
                status,
                block_number: state.block_number,
                block_hash: Some(B256::repeat_byte(0x0b)),
            };
            state.receipts.insert(tx.hash, receipt);
            state.nonces.insert(tx.sender, expected + 1);
        }

        if state.dropped_responses > 0 {
            state.dropped_responses -= 1;
            return Err(ChainError::Network("request timed out".to_string()));
        }
        Ok(tx.hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256, max_wait: Duration) -> Result<TransactionReceipt, ChainError> {
        let receipt = {
            let mut state = self.state.lock().unwrap();
            if let Some(sender) = state.senders.get(&tx_hash).copied() {
                *state.receipt_waits.entry(sender).or_insert(0) += 1;
            }
            state.receipts.get(&tx_hash).cloned()
        };

        match receipt {
            Some(receipt) if receipt.status == ReceiptStatus::Success => Ok(receipt),
            Some(receipt) => Err(ChainError::ExecutionReverted {
                tx_hash: tx_hash.to_string(),
                block_number: receipt.block_number,
            }),
            None => {
                tokio::time::sleep(max_wait).await;
                Err(ChainError::ConfirmationTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited: max_wait,
                })
            }
        }
    }
}
