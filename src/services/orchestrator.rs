//! Transaction lifecycle orchestrator
//!
//! Drives every managed account through the operations of the selected mode.
//! Each operation is one cycle:
//!
//! `Idle -> FeesFetched -> NonceFetched -> CallBuilt -> Signed -> Broadcast -> Confirmed`
//!
//! Any error ends the cycle as `Failed`, tagged with the stage it happened
//! in. Fees, nonce and epoch are fetched again for every cycle. An account
//! never has two transactions in flight; different accounts may run
//! concurrently up to the configured limit.

use alloy::primitives::B256;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::services::chain_client::ChainClient;
use crate::services::chain_errors::ChainError;
use crate::services::retry::{with_retry, RetryConfig, Retryable};
use crate::services::signer::{LocalTransactionSigner, TransactionSigner};
use crate::services::strategy::BettingStrategy;
use crate::services::tx_builder::{AbiKeccakHasher, MintKeyHasher, TransactionBuilder};
use crate::types::{
    Confirmation, CycleFailure, Mode, Operation, OperationKind, OperationReport, Outcome, RunSummary, Stage,
    TransactionReceipt,
};
use crate::wallet::{AccountStore, ManagedAccount};

/// Runtime knobs of the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Maximum wait for one receipt
    pub receipt_timeout: Duration,
    /// Further waits on the same hash after a timeout
    pub receipt_rechecks: u32,
    /// Accounts processed at the same time
    pub concurrency: usize,
    /// Pause after each account
    pub account_delay: Duration,
    pub retry: RetryConfig,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            receipt_timeout: config.receipt_timeout,
            receipt_rechecks: config.receipt_rechecks,
            concurrency: config.concurrency.max(1),
            account_delay: config.account_delay,
            retry: config.retry.clone(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            receipt_timeout: Duration::from_secs(120),
            receipt_rechecks: 1,
            concurrency: 1,
            account_delay: Duration::ZERO,
            retry: RetryConfig::default(),
        }
    }
}

/// Only transient failures that happened before anything reached the node
/// are retried; the retry starts over from `Idle`.
impl Retryable for CycleFailure {
    fn is_retryable(&self) -> bool {
        self.stage < Stage::Signed && self.error.is_retryable()
    }
}

/// Why later operations of the account must wait, if `failure` may have
/// left a transaction on the account's next nonce.
fn unresolved_submission(failure: &CycleFailure) -> Option<String> {
    match &failure.error {
        ChainError::ConfirmationTimeout { tx_hash, .. } => {
            Some(format!("transaction {} may still be pending", tx_hash))
        }
        // the node may have accepted it before the response was lost
        ChainError::Network(_) if failure.stage >= Stage::Signed => {
            Some("outcome of the previous broadcast is unknown".to_string())
        }
        _ => None,
    }
}

/// Stage tracker for one cycle
struct Cycle {
    stage: Stage,
}

impl Cycle {
    fn new() -> Self {
        Self { stage: Stage::Idle }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "cycle moved backwards: {} -> {}", self.stage, next);
        self.stage = next;
    }

    fn fail(&self, error: ChainError) -> CycleFailure {
        CycleFailure {
            stage: self.stage,
            error,
        }
    }
}

pub struct Orchestrator<C, S = LocalTransactionSigner, H = AbiKeccakHasher> {
    client: Arc<C>,
    signer: S,
    builder: TransactionBuilder<H>,
    strategy: BettingStrategy,
    settings: OrchestratorSettings,
}

impl<C: ChainClient> Orchestrator<C> {
    pub fn new(
        client: Arc<C>,
        builder: TransactionBuilder,
        strategy: BettingStrategy,
        settings: OrchestratorSettings,
    ) -> Self {
        Self::with_signer(client, LocalTransactionSigner, builder, strategy, settings)
    }

    /// Wire an orchestrator with the stock signer and hasher from configuration
    pub fn from_config(client: Arc<C>, config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            client,
            TransactionBuilder::new(config.contracts, config.chain_id, config.gas_limits),
            BettingStrategy::new(&config.betting)?,
            OrchestratorSettings::from_config(config),
        ))
    }
}

impl<C, S, H> Orchestrator<C, S, H>
where
    C: ChainClient,
    S: TransactionSigner,
    H: MintKeyHasher,
{
    pub fn with_signer(
        client: Arc<C>,
        signer: S,
        builder: TransactionBuilder<H>,
        strategy: BettingStrategy,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            client,
            signer,
            builder,
            strategy,
            settings,
        }
    }

    /// Run the mode once over every account
    pub async fn run(&self, accounts: &AccountStore, mode: &Mode) -> RunSummary {
        info!(
            "Starting {} for {} accounts (concurrency {})",
            mode,
            accounts.len(),
            self.settings.concurrency
        );

        let per_account: Vec<Vec<OperationReport>> = stream::iter(accounts.accounts())
            .map(|account| self.run_account(account, mode))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let summary = RunSummary {
            reports: per_account.into_iter().flatten().collect(),
        };
        info!("Finished {}: {}", mode, summary);
        summary
    }

    async fn run_account(&self, account: &ManagedAccount, mode: &Mode) -> Vec<OperationReport> {
        let mut reports = Vec::new();
        let mut pending: Option<String> = None;

        for kind in mode.operations() {
            let report = match &pending {
                Some(reason) => OperationReport {
                    address: account.address,
                    operation: kind,
                    outcome: Outcome::Skipped { reason: reason.clone() },
                },
                None => self.execute(account, kind, mode).await,
            };

            match &report.outcome {
                Outcome::Confirmed(_) => info!("{}", report),
                Outcome::Failed(failure) => {
                    error!("{}", report);
                    pending = unresolved_submission(failure);
                }
                Outcome::Skipped { .. } => warn!("{}", report),
            }
            reports.push(report);
        }

        if !self.settings.account_delay.is_zero() {
            sleep(self.settings.account_delay).await;
        }
        reports
    }

    /// Perform one operation for one account, retrying transient failures
    pub async fn execute(&self, account: &ManagedAccount, kind: OperationKind, mode: &Mode) -> OperationReport {
        let label = format!("{} for {:?}", kind, account.address);
        let outcome = match with_retry(&self.settings.retry, &label, || self.run_cycle(account, kind, mode)).await {
            Ok(confirmation) => Outcome::Confirmed(confirmation),
            Err(failure) => Outcome::Failed(failure),
        };

        OperationReport {
            address: account.address,
            operation: kind,
            outcome,
        }
    }

    async fn run_cycle(
        &self,
        account: &ManagedAccount,
        kind: OperationKind,
        mode: &Mode,
    ) -> Result<Confirmation, CycleFailure> {
        let mut cycle = Cycle::new();

        let fees = self.client.estimate_fees().await.map_err(|e| cycle.fail(e))?;
        cycle.advance(Stage::FeesFetched);

        let nonce = self
            .client
            .get_nonce(account.address)
            .await
            .map_err(|e| cycle.fail(e))?;
        cycle.advance(Stage::NonceFetched);

        let operation = self.resolve_operation(kind, mode).await.map_err(|e| cycle.fail(e))?;
        let call = self.builder.build(&operation, account.address, nonce, fees);
        cycle.advance(Stage::CallBuilt);

        let signed = self
            .signer
            .sign(&call, account.signing_key())
            .map_err(|e| cycle.fail(e))?;
        cycle.advance(Stage::Signed);

        let tx_hash = self.client.broadcast(signed).await.map_err(|e| cycle.fail(e))?;
        cycle.advance(Stage::Broadcast);
        debug!("{} for {:?} broadcast as {} (nonce {})", kind, account.address, tx_hash, nonce);

        let receipt = self.await_receipt(tx_hash).await.map_err(|e| cycle.fail(e))?;
        cycle.advance(Stage::Confirmed);

        Ok(Confirmation {
            tx_hash: receipt.transaction_hash,
            nonce,
            block_number: receipt.block_number,
            bet: match operation {
                Operation::Bet(bet) => Some(bet),
                _ => None,
            },
        })
    }

    /// Turn an operation kind into concrete arguments. Bets read the epoch here,
    /// right before the call is built.
    async fn resolve_operation(&self, kind: OperationKind, mode: &Mode) -> Result<Operation, ChainError> {
        Ok(match kind {
            OperationKind::Approve => Operation::Approve,
            OperationKind::Mint => Operation::Mint,
            OperationKind::Claim => Operation::Claim {
                epochs: match mode {
                    Mode::Claim { epochs } => epochs.clone(),
                    _ => Vec::new(),
                },
            },
            OperationKind::Bet => {
                let epoch = self.client.read_current_epoch().await?;
                let choice = self.strategy.choose_bet().await;
                Operation::Bet(self.strategy.bet_parameters(epoch, choice))
            }
        })
    }

    /// Wait for the receipt, re-checking the same hash after a timeout.
    /// Never resends.
    async fn await_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, ChainError> {
        let started = Instant::now();
        let mut rechecks = 0;

        loop {
            match self.client.wait_for_receipt(tx_hash, self.settings.receipt_timeout).await {
                Err(ChainError::ConfirmationTimeout { .. }) if rechecks < self.settings.receipt_rechecks => {
                    rechecks += 1;
                    warn!(
                        "No receipt for {} yet, re-checking ({}/{})",
                        tx_hash, rechecks, self.settings.receipt_rechecks
                    );
                }
                Err(ChainError::ConfirmationTimeout { .. }) => {
                    return Err(ChainError::ConfirmationTimeout {
                        tx_hash: tx_hash.to_string(),
                        waited: started.elapsed(),
                    });
                }
                other => return other,
            }
        }
    }
}
