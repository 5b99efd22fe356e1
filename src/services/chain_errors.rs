//! Chain error differentiation
//!
//! Parses node JSON-RPC failures into structured kinds so the orchestrator
//! can decide what is safe to retry and what to report.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why the node refused a raw transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionReason {
    /// Nonce already used (or the transaction was replaced)
    NonceTooLow,
    /// Nonce ahead of the account's next expected nonce
    NonceTooHigh,
    /// Balance cannot cover gas * max fee
    InsufficientFunds,
    /// Fee below the node's minimum or below the replaced transaction
    Underpriced,
    /// Node already has this exact transaction
    AlreadyKnown,
    Other(String),
}

impl fmt::Display for SubmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionReason::NonceTooLow => write!(f, "nonce too low"),
            SubmissionReason::NonceTooHigh => write!(f, "nonce too high"),
            SubmissionReason::InsufficientFunds => write!(f, "insufficient funds for gas"),
            SubmissionReason::Underpriced => write!(f, "transaction underpriced"),
            SubmissionReason::AlreadyKnown => write!(f, "already known"),
            SubmissionReason::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Structured chain interaction errors
#[derive(Debug, Error)]
pub enum ChainError {
    /// Transport failure, timeout or a transient HTTP status
    #[error("network error: {0}")]
    Network(String),
    /// Node answered a read/estimate call with an error or an unusable result
    #[error("node rejected request: {0}")]
    NodeRejection(String),
    /// Node refused a raw transaction
    #[error("submission rejected: {reason}")]
    Submission { reason: SubmissionReason },
    /// No receipt within the allotted wait; the transaction may still land
    #[error("no receipt for {tx_hash} after {waited:?}")]
    ConfirmationTimeout { tx_hash: String, waited: Duration },
    /// Included in a block with failure status
    #[error("execution reverted in {tx_hash} (block {block_number})")]
    ExecutionReverted { tx_hash: String, block_number: u64 },
    /// Key material cannot produce a signature
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    /// Node serves a different network than configured
    #[error("chain id mismatch: expected {expected}, node reports {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
}

/// JSON-RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl ChainError {
    /// Classify a JSON-RPC error returned for `eth_sendRawTransaction`
    pub fn from_submission_error(err: &RpcErrorObject) -> Self {
        let msg_lower = err.message.to_lowercase();

        // "replacement transaction underpriced" is a fee problem, not a nonce one
        let reason = if msg_lower.contains("nonce too low")
            || (msg_lower.contains("replacement transaction") && !msg_lower.contains("underpriced"))
        {
            SubmissionReason::NonceTooLow
        } else if msg_lower.contains("nonce too high") || msg_lower.contains("nonce gap") {
            SubmissionReason::NonceTooHigh
        } else if msg_lower.contains("insufficient funds") || msg_lower.contains("insufficient balance") {
            SubmissionReason::InsufficientFunds
        } else if msg_lower.contains("underpriced")
            || msg_lower.contains("max fee per gas less than block base fee")
            || msg_lower.contains("fee too low")
        {
            SubmissionReason::Underpriced
        } else if msg_lower.contains("already known") || msg_lower.contains("known transaction") {
            SubmissionReason::AlreadyKnown
        } else {
            SubmissionReason::Other(format!("{} (code {})", err.message, err.code))
        };

        ChainError::Submission { reason }
    }

    /// Classify a JSON-RPC error returned for any non-submission call
    pub fn from_rpc_error(method: &str, err: &RpcErrorObject) -> Self {
        // -32005 is the conventional "limit exceeded" code
        if err.code == -32005 || err.message.to_lowercase().contains("rate limit") {
            return ChainError::Network(format!("{} rate limited: {}", method, err.message));
        }
        ChainError::NodeRejection(format!("{} failed: {} (code {})", method, err.message, err.code))
    }

    /// Classify a transport error
    pub fn from_network_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ChainError::Network("request timed out".to_string())
        } else if err.is_connect() {
            ChainError::Network("connection failed".to_string())
        } else {
            ChainError::Network(err.to_string())
        }
    }

    /// Classify a non-2xx HTTP status from the RPC endpoint
    pub fn from_http_status(status: u16, body: &str) -> Self {
        if status == 429 || status >= 500 {
            ChainError::Network(format!("HTTP {}: {}", status, body))
        } else {
            ChainError::NodeRejection(format!("HTTP {}: {}", status, body))
        }
    }

    /// Stable label used in log lines and reports
    pub fn kind(&self) -> &'static str {
        match self {
            ChainError::Network(_) => "NetworkError",
            ChainError::NodeRejection(_) => "NodeRejection",
            ChainError::Submission { .. } => "SubmissionError",
            ChainError::ConfirmationTimeout { .. } => "ConfirmationTimeout",
            ChainError::ExecutionReverted { .. } => "ExecutionReverted",
            ChainError::InvalidKey(_) => "InvalidKeyError",
            ChainError::ChainIdMismatch { .. } => "ChainIdMismatch",
        }
    }

    /// Whether a fresh attempt (new fees, new nonce) may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::Network(_))
    }
}
