//! Distribution orchestration: drives one request from validation to replies

use crate::batch::plan_batches;
use crate::catalog::AssetCatalog;
use crate::cooldown::CooldownGuard;
use crate::metrics;
use crate::strkey;
use crate::submitter::TransactionSubmitter;
use crate::types::{AppState, DistributionRequest, SubmissionOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Outbound notification capability, implemented by the messaging front-end.
/// Delivery is best-effort; the orchestrator never depends on confirmation.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn notify(&self, requester_id: u64, text: &str);
}

/// Reply channel that only writes to the log. Used until a front-end is
/// attached, and as the fallback sink in tests.
pub struct LogReplyChannel;

#[async_trait]
impl ReplyChannel for LogReplyChannel {
    async fn notify(&self, requester_id: u64, text: &str) {
        info!(requester_id, "reply: {}", text);
    }
}

/// Aggregate result of one distribution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionReport {
    /// Per-batch outcomes, in submission order
    pub outcomes: Vec<SubmissionOutcome>,

    /// Hashes of every batch that committed
    pub hashes: Vec<String>,
}

impl DistributionReport {
    /// True when at least one batch produced a hash
    pub fn any_committed(&self) -> bool {
        !self.hashes.is_empty()
    }
}

/// How a request left the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Target failed address validation; nothing was submitted
    RejectedInvalidAddress,

    /// Same requester, same address, inside the cooldown window
    RejectedCooldown { wait_secs: i64 },

    /// Batches ran to terminal outcomes (possibly zero batches)
    Completed(DistributionReport),
}

/// Sequences one distribution: validate, admit, plan, submit, record, reply.
pub struct DistributionOrchestrator {
    catalog: Arc<dyn AssetCatalog>,
    submitter: Arc<TransactionSubmitter>,
    cooldown: Arc<CooldownGuard>,
    reply: Arc<dyn ReplyChannel>,
    state: AppState,
    max_ops: usize,
}

impl DistributionOrchestrator {
    pub fn new(
        catalog: Arc<dyn AssetCatalog>,
        submitter: Arc<TransactionSubmitter>,
        cooldown: Arc<CooldownGuard>,
        reply: Arc<dyn ReplyChannel>,
        state: AppState,
        max_ops: usize,
    ) -> Self {
        Self {
            catalog,
            submitter,
            cooldown,
            reply,
            state,
            max_ops,
        }
    }

    pub async fn handle_request(&self, request: DistributionRequest) -> RequestOutcome {
        let correlation = request.correlation.clone();
        self.state.record_request().await;
        metrics::metrics().requests_total.inc();

        if !strkey::is_valid_account_id(&request.target) {
            self.state.record_invalid_address().await;
            metrics::metrics().requests_invalid_address.inc();
            warn!(correlation = %correlation, "rejected: invalid target address");
            self.reply
                .notify(
                    request.requester_id,
                    "That does not look like a valid account address. \
                     Send the public address the transfers should go to.",
                )
                .await;
            return RequestOutcome::RejectedInvalidAddress;
        }

        let now = chrono::Utc::now().timestamp();
        if !self
            .cooldown
            .admit(request.requester_id, &request.target, now)
        {
            let wait_secs = self
                .cooldown
                .remaining_secs(request.requester_id, &request.target, now)
                .unwrap_or(0);
            self.state.record_cooldown_rejection().await;
            metrics::metrics().requests_cooldown_rejected.inc();
            info!(correlation = %correlation, wait_secs, "rejected: cooling down");
            self.reply
                .notify(
                    request.requester_id,
                    &format!(
                        "This address was served moments ago. Try again in {}s.",
                        wait_secs
                    ),
                )
                .await;
            return RequestOutcome::RejectedCooldown { wait_secs };
        }

        let batches = plan_batches(self.catalog.assets(), self.max_ops);
        if batches.is_empty() {
            self.reply
                .notify(
                    request.requester_id,
                    "No assets are configured for distribution right now.",
                )
                .await;
            return RequestOutcome::Completed(DistributionReport {
                outcomes: Vec::new(),
                hashes: Vec::new(),
            });
        }

        info!(
            correlation = %correlation,
            target = %request.target,
            batches = batches.len(),
            assets = self.catalog.assets().len(),
            "starting distribution"
        );
        metrics::metrics().active_distributions.inc();

        let mut outcomes = Vec::with_capacity(batches.len());
        let mut hashes = Vec::new();
        for (index, batch) in batches.iter().enumerate() {
            let outcome = self
                .submitter
                .submit_batch(batch, &request.target, &correlation)
                .await;
            if let Some(hash) = outcome.hash() {
                hashes.push(hash.to_string());
            }
            let failed = outcome.is_failure();
            outcomes.push(outcome);
            if failed {
                // Earlier hashes stay valid; remaining batches are skipped
                // since the submitter already spent its full budget.
                warn!(
                    correlation = %correlation,
                    batch = index,
                    "batch failed permanently, aborting remaining batches"
                );
                break;
            }
        }

        metrics::metrics().active_distributions.dec();

        let committed = !hashes.is_empty();
        if committed {
            self.cooldown.record_success(
                request.requester_id,
                &request.target,
                chrono::Utc::now().timestamp(),
            );
        }
        self.state
            .record_distribution(committed, outcomes.len() as u64)
            .await;

        let report = DistributionReport { outcomes, hashes };
        self.reply
            .notify(request.requester_id, &summarize(&report))
            .await;
        info!(
            correlation = %correlation,
            committed = report.hashes.len(),
            failed = report.outcomes.iter().filter(|o| o.is_failure()).count(),
            "distribution finished"
        );
        RequestOutcome::Completed(report)
    }
}

/// Human-readable summary sent back to the requester
fn summarize(report: &DistributionReport) -> String {
    let excluded: usize = report
        .outcomes
        .iter()
        .map(|o| match o {
            SubmissionOutcome::PartialSuccess { excluded, .. } => *excluded,
            _ => 0,
        })
        .sum();
    let failure = report.outcomes.iter().find_map(|o| match o {
        SubmissionOutcome::PermanentFailure { reason } => Some(reason.as_str()),
        _ => None,
    });

    match (report.any_committed(), failure) {
        (true, None) => {
            let mut text = format!(
                "Done! Submitted {} transaction(s): {}",
                report.hashes.len(),
                report.hashes.join(", ")
            );
            if excluded > 0 {
                text.push_str(&format!(
                    " ({} asset(s) skipped: missing authorization)",
                    excluded
                ));
            }
            text
        }
        (true, Some(reason)) => format!(
            "Partially done: {} transaction(s) went through ({}), but a later batch failed: {}",
            report.hashes.len(),
            report.hashes.join(", "),
            reason
        ),
        (false, Some(reason)) => format!("Distribution failed: {}", reason),
        (false, None) => "Nothing was distributed.".to_string(),
    }
}
