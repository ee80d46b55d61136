//! Batched transaction submission with retry and error classification
//!
//! One batch runs through an explicit attempt loop:
//! `Pending -> Submitting -> {Success, Retrying -> Submitting, PermanentFailure}`.
//! Every ledger failure is decoded exactly once into a closed [`FailureKind`]
//! and matched exhaustively; transient kinds sleep a fixed backoff and burn
//! one attempt from the shared budget, permanent kinds terminate the batch.

use crate::ledger::{LedgerClient, LedgerError, TransactionResultCodes};
use crate::metrics;
use crate::observability::CorrelationId;
use crate::signer::DistributorSigner;
use crate::tx::{self, TransactionDraft};
use crate::types::{AssetSpec, SubmissionOutcome};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Shared retry budget per batch
pub const MAX_ATTEMPTS: u32 = 5;

/// Backoff after a transport-level failure or an underpriced fee
const SLOW_RETRY: Duration = Duration::from_secs(5);

/// Backoff after a stale sequence number or an expired validity window
const FAST_RETRY: Duration = Duration::from_secs(1);

/// Operation codes meaning the recipient lacks authorization for the asset
const UNAUTHORIZED_OP_CODES: [&str; 2] = ["op_no_trust", "op_not_authorized"];

/// Operation code meaning the distributor cannot fund the operation
const UNDERFUNDED_OP_CODE: &str = "op_underfunded";

/// A ledger failure decoded once into the action the state machine takes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Gateway timeout or transport failure without structured codes
    NetworkTransient,

    /// Stale sequence number; the fresh snapshot on the next attempt resolves it
    SequenceTransient,

    /// Validity window elapsed before the transaction closed
    ExpiredTransient,

    /// Offered fee fell below the network's current requirement
    FeeTransient,

    /// Named operation indices rejected for missing authorization
    OperationsRejected { unauthorized: Vec<usize> },

    /// Distributor balance cannot cover an operation; retrying cannot change it
    ResourceExhaustion,

    /// Anything else; permanent after scrubbing
    Unclassified(String),
}

impl FailureKind {
    pub fn classify(error: &LedgerError) -> Self {
        match error {
            LedgerError::Transport(_) | LedgerError::GatewayTimeout => Self::NetworkTransient,
            LedgerError::Rejected { codes } => Self::from_result_codes(codes),
            LedgerError::UnexpectedResponse { .. } | LedgerError::MalformedResponse(_) => {
                Self::Unclassified(error.to_string())
            }
        }
    }

    /// Combined-code policy for `tx_failed`: underfunding escalates over
    /// everything else, then authorization pruning, then unclassified.
    fn from_result_codes(codes: &TransactionResultCodes) -> Self {
        match codes.transaction.as_str() {
            "tx_bad_seq" => Self::SequenceTransient,
            "tx_too_late" => Self::ExpiredTransient,
            "tx_insufficient_fee" => Self::FeeTransient,
            "tx_insufficient_balance" => Self::ResourceExhaustion,
            "tx_failed" => {
                if codes.operations.iter().any(|c| c == UNDERFUNDED_OP_CODE) {
                    return Self::ResourceExhaustion;
                }
                let unauthorized: Vec<usize> = codes
                    .operations
                    .iter()
                    .enumerate()
                    .filter(|(_, code)| UNAUTHORIZED_OP_CODES.contains(&code.as_str()))
                    .map(|(index, _)| index)
                    .collect();
                if unauthorized.is_empty() {
                    Self::Unclassified(format!(
                        "operation codes: {}",
                        codes.operations.join(", ")
                    ))
                } else {
                    Self::OperationsRejected { unauthorized }
                }
            }
            other => Self::Unclassified(format!("transaction code: {}", other)),
        }
    }

    /// Fixed backoff before the next attempt, for the retried kinds
    fn backoff(&self) -> Option<Duration> {
        match self {
            Self::NetworkTransient | Self::FeeTransient => Some(SLOW_RETRY),
            Self::SequenceTransient | Self::ExpiredTransient => Some(FAST_RETRY),
            Self::OperationsRejected { .. }
            | Self::ResourceExhaustion
            | Self::Unclassified(_) => None,
        }
    }
}

/// Submitter tuning, taken from `[distribution]` config
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    pub base_fee: u32,
    pub validity_window_secs: i64,
    pub max_attempts: u32,
    pub network_passphrase: String,
}

/// Builds, signs and submits one batch at a time against the shared
/// distributor account.
pub struct TransactionSubmitter {
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<DistributorSigner>,
    config: SubmitterConfig,
    /// Single submission slot for the distributor account. Concurrent
    /// requests queue here; racing the sequence number would only breed
    /// spurious stale-sequence retries.
    submit_permit: Mutex<()>,
}

impl TransactionSubmitter {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<DistributorSigner>,
        config: SubmitterConfig,
    ) -> Self {
        Self {
            ledger,
            signer,
            config,
            submit_permit: Mutex::new(()),
        }
    }

    /// Run one batch to a terminal outcome. The permit is held for the whole
    /// retry loop; there is no mid-sequence cancellation.
    pub async fn submit_batch(
        &self,
        batch: &[AssetSpec],
        target: &str,
        correlation: &CorrelationId,
    ) -> SubmissionOutcome {
        let _permit = self.submit_permit.lock().await;
        let started = std::time::Instant::now();
        let outcome = self.run(batch, target, correlation).await;
        metrics::metrics()
            .submit_latency
            .observe(started.elapsed().as_secs_f64());
        outcome
    }

    async fn run(
        &self,
        batch: &[AssetSpec],
        target: &str,
        correlation: &CorrelationId,
    ) -> SubmissionOutcome {
        let mut ops: Vec<AssetSpec> = batch.to_vec();
        let mut excluded = 0usize;

        for attempt in 1..=self.config.max_attempts {
            debug!(
                correlation = %correlation,
                attempt,
                ops = ops.len(),
                "submitting batch"
            );

            let error = match self.attempt(&ops, target).await {
                Ok(hash) => {
                    metrics::metrics().batches_submitted.inc();
                    return if excluded > 0 {
                        SubmissionOutcome::PartialSuccess { hash, excluded }
                    } else {
                        SubmissionOutcome::Success { hash }
                    };
                }
                Err(error) => error,
            };

            match FailureKind::classify(&error) {
                FailureKind::OperationsRejected { unauthorized } => {
                    let rejected: HashSet<usize> = unauthorized.into_iter().collect();
                    let before = ops.len();
                    ops = ops
                        .into_iter()
                        .enumerate()
                        .filter(|(index, _)| !rejected.contains(index))
                        .map(|(_, asset)| asset)
                        .collect();
                    let pruned = before - ops.len();
                    excluded += pruned;
                    metrics::metrics().ops_pruned.inc_by(pruned as u64);
                    warn!(
                        correlation = %correlation,
                        attempt,
                        pruned,
                        remaining = ops.len(),
                        "recipient not authorized for some assets, pruning"
                    );
                    if ops.is_empty() {
                        return self.fail(
                            "no eligible operations remain: recipient missing required authorization",
                        );
                    }
                    // retry the reduced batch immediately, within the same budget
                }
                FailureKind::ResourceExhaustion => {
                    warn!(correlation = %correlation, attempt, "distributor underfunded");
                    return self.fail("distributor underfunded");
                }
                FailureKind::Unclassified(detail) => {
                    warn!(correlation = %correlation, attempt, "unclassified submission failure");
                    return self.fail(&detail);
                }
                transient => {
                    if attempt == self.config.max_attempts {
                        break;
                    }
                    // backoff() is Some for every transient kind
                    let delay = transient.backoff().unwrap_or(FAST_RETRY);
                    metrics::metrics().submission_retries.inc();
                    warn!(
                        correlation = %correlation,
                        attempt,
                        error = %error,
                        ?delay,
                        "transient submission failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        self.fail("retry budget exhausted")
    }

    /// One submission cycle: fresh snapshot, rebuilt validity window, sign,
    /// submit.
    async fn attempt(&self, ops: &[AssetSpec], target: &str) -> Result<String, LedgerError> {
        let snapshot = self.ledger.load_account(self.signer.account_id()).await?;
        let now = chrono::Utc::now().timestamp();
        let draft = TransactionDraft::build(
            self.signer.account_id(),
            snapshot.sequence,
            self.config.base_fee,
            self.config.validity_window_secs,
            now,
            ops,
            target,
        );
        let signed = tx::sign_draft(&draft, &self.signer, &self.config.network_passphrase);
        let result = self.ledger.submit(&signed.envelope_base64).await?;
        Ok(result.hash)
    }

    /// Terminal failure; the reason is scrubbed of the signing seed before it
    /// can leave the submitter.
    fn fail(&self, reason: &str) -> SubmissionOutcome {
        metrics::metrics().batches_failed.inc();
        SubmissionOutcome::PermanentFailure {
            reason: self.signer.scrub(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(transaction: &str, operations: &[&str]) -> LedgerError {
        LedgerError::Rejected {
            codes: TransactionResultCodes {
                transaction: transaction.to_string(),
                operations: operations.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_classify_transport_kinds() {
        assert_eq!(
            FailureKind::classify(&LedgerError::Transport("reset".into())),
            FailureKind::NetworkTransient
        );
        assert_eq!(
            FailureKind::classify(&LedgerError::GatewayTimeout),
            FailureKind::NetworkTransient
        );
    }

    #[test]
    fn test_classify_transaction_codes() {
        assert_eq!(
            FailureKind::classify(&rejected("tx_bad_seq", &[])),
            FailureKind::SequenceTransient
        );
        assert_eq!(
            FailureKind::classify(&rejected("tx_too_late", &[])),
            FailureKind::ExpiredTransient
        );
        assert_eq!(
            FailureKind::classify(&rejected("tx_insufficient_fee", &[])),
            FailureKind::FeeTransient
        );
        assert_eq!(
            FailureKind::classify(&rejected("tx_insufficient_balance", &[])),
            FailureKind::ResourceExhaustion
        );
    }

    #[test]
    fn test_classify_unauthorized_indices() {
        let kind = FailureKind::classify(&rejected(
            "tx_failed",
            &["op_success", "op_no_trust", "op_success", "op_not_authorized"],
        ));
        assert_eq!(
            kind,
            FailureKind::OperationsRejected {
                unauthorized: vec![1, 3]
            }
        );
    }

    #[test]
    fn test_underfunding_escalates_over_pruning() {
        let kind =
            FailureKind::classify(&rejected("tx_failed", &["op_no_trust", "op_underfunded"]));
        assert_eq!(kind, FailureKind::ResourceExhaustion);
    }

    #[test]
    fn test_unknown_codes_are_unclassified() {
        assert!(matches!(
            FailureKind::classify(&rejected("tx_failed", &["op_bad_claimant"])),
            FailureKind::Unclassified(_)
        ));
        assert!(matches!(
            FailureKind::classify(&rejected("tx_malformed", &[])),
            FailureKind::Unclassified(_)
        ));
    }

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(FailureKind::NetworkTransient.backoff(), Some(SLOW_RETRY));
        assert_eq!(FailureKind::FeeTransient.backoff(), Some(SLOW_RETRY));
        assert_eq!(FailureKind::SequenceTransient.backoff(), Some(FAST_RETRY));
        assert_eq!(FailureKind::ExpiredTransient.backoff(), Some(FAST_RETRY));
        assert_eq!(FailureKind::ResourceExhaustion.backoff(), None);
    }
}
