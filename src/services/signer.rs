//! Transaction signing
//!
//! Turns an unsigned call plus a signing key into a serialized EIP-2718
//! envelope ready for `eth_sendRawTransaction`.

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{keccak256, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;

use crate::services::chain_errors::ChainError;
use crate::types::{SignedTransaction, UnsignedCall};
use crate::wallet::SigningKey;

pub trait TransactionSigner: Send + Sync {
    /// Sign `call` with `key`. Must not log or retain the key.
    fn sign(&self, call: &UnsignedCall, key: &SigningKey) -> Result<SignedTransaction, ChainError>;
}

/// Signs in-process with a local secp256k1 key
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransactionSigner;

impl TransactionSigner for LocalTransactionSigner {
    fn sign(&self, call: &UnsignedCall, key: &SigningKey) -> Result<SignedTransaction, ChainError> {
        let signer: PrivateKeySigner = key
            .expose()
            .parse()
            .map_err(|_| ChainError::InvalidKey("malformed key material".to_string()))?;

        let mut tx = TxEip1559 {
            chain_id: call.chain_id,
            nonce: call.nonce,
            gas_limit: call.gas_limit,
            max_fee_per_gas: call.fees.max_fee_per_gas,
            max_priority_fee_per_gas: call.fees.max_priority_fee_per_gas,
            to: TxKind::Call(call.to),
            value: U256::ZERO,
            access_list: Default::default(),
            input: call.input.clone(),
        };

        let signature = signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| ChainError::InvalidKey(format!("signing failed: {}", e)))?;
        let envelope: TxEnvelope = tx.into_signed(signature).into();
        let raw = envelope.encoded_2718();

        Ok(SignedTransaction {
            hash: keccak256(&raw),
            raw: raw.into(),
            sender: signer.address(),
        })
    }
}
