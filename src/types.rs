//! Common types used throughout the application

use crate::observability::CorrelationId;
use crate::strkey::{self, StrKeyError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Maximum asset code length accepted by the ledger
const MAX_ASSET_CODE_LEN: usize = 12;

/// Maximum decimal places an asset amount may carry
const MAX_AMOUNT_SCALE: u32 = 7;

/// Validation failures raised when constructing an [`AssetSpec`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("asset code must be non-empty")]
    EmptyCode,

    #[error("asset code '{0}' exceeds {MAX_ASSET_CODE_LEN} characters")]
    CodeTooLong(String),

    #[error("asset code '{0}' contains non-alphanumeric characters")]
    InvalidCode(String),

    #[error("amount '{0}' is not a positive decimal")]
    InvalidAmount(String),

    #[error("amount '{0}' has more than {MAX_AMOUNT_SCALE} decimal places")]
    AmountTooPrecise(String),

    #[error("invalid issuer address: {0}")]
    InvalidIssuer(#[from] StrKeyError),
}

/// A single asset to give away: code, issuing account and per-claim amount.
///
/// Invariants are enforced once here, at construction; downstream code never
/// re-validates. Fields are private so a constructed spec stays immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetSpec {
    code: String,
    issuer: Option<String>,
    amount: String,
}

impl AssetSpec {
    /// Validate and build an asset spec. `issuer: None` means the native asset.
    pub fn new(code: &str, issuer: Option<&str>, amount: &str) -> Result<Self, AssetError> {
        if code.is_empty() {
            return Err(AssetError::EmptyCode);
        }
        if code.len() > MAX_ASSET_CODE_LEN {
            return Err(AssetError::CodeTooLong(code.to_string()));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AssetError::InvalidCode(code.to_string()));
        }

        let parsed = Decimal::from_str(amount)
            .map_err(|_| AssetError::InvalidAmount(amount.to_string()))?;
        if parsed <= Decimal::ZERO {
            return Err(AssetError::InvalidAmount(amount.to_string()));
        }
        if parsed.scale() > MAX_AMOUNT_SCALE {
            return Err(AssetError::AmountTooPrecise(amount.to_string()));
        }

        if let Some(issuer) = issuer {
            strkey::decode_account_id(issuer)?;
        }

        Ok(Self {
            code: code.to_string(),
            issuer: issuer.map(str::to_string),
            amount: amount.to_string(),
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    /// True for the ledger's native asset (no issuer, no trustline needed)
    pub fn is_native(&self) -> bool {
        self.issuer.is_none()
    }

    /// The (code, issuer) pair a holder needs a trustline for.
    /// None for the native asset.
    pub fn trustline_key(&self) -> Option<(String, String)> {
        self.issuer
            .as_ref()
            .map(|issuer| (self.code.clone(), issuer.clone()))
    }
}

impl std::fmt::Display for AssetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.issuer {
            Some(issuer) => write!(f, "{} {}:{}", self.amount, self.code, issuer),
            None => write!(f, "{} {} (native)", self.amount, self.code),
        }
    }
}

/// One inbound request to distribute the configured assets to an address
#[derive(Debug, Clone)]
pub struct DistributionRequest {
    /// Identity of the requester on the messaging side
    pub requester_id: u64,

    /// Target account id the claimable transfers are earmarked for
    pub target: String,

    /// Correlation id threaded through logs for this request
    pub correlation: CorrelationId,
}

impl DistributionRequest {
    pub fn new(requester_id: u64, target: impl Into<String>) -> Self {
        Self {
            requester_id,
            target: target.into(),
            correlation: CorrelationId::new(),
        }
    }
}

/// Receiver side of the inbound request channel (fed by the messaging front-end)
pub type RequestReceiver = mpsc::UnboundedReceiver<DistributionRequest>;

/// Sender side of the inbound request channel
pub type RequestSender = mpsc::UnboundedSender<DistributionRequest>;

/// Terminal result of submitting one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Every operation in the batch committed
    Success { hash: String },

    /// The batch committed after pruning operations the recipient was not
    /// authorized to receive
    PartialSuccess { hash: String, excluded: usize },

    /// The batch will never commit; reason is safe to surface to the requester
    PermanentFailure { reason: String },
}

impl SubmissionOutcome {
    /// Transaction hash, if the batch produced one
    pub fn hash(&self) -> Option<&str> {
        match self {
            Self::Success { hash } | Self::PartialSuccess { hash, .. } => Some(hash),
            Self::PermanentFailure { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::PermanentFailure { .. })
    }
}

/// Point-in-time view of the distributor account, re-fetched before every
/// submission attempt since the sequence number moves with each committed
/// transaction.
#[derive(Debug, Clone)]
pub struct DistributorAccountSnapshot {
    /// Current sequence number; the next transaction must use sequence + 1
    pub sequence: i64,

    /// (code, issuer) pairs the account holds trustlines for. Native balance
    /// is not represented here.
    pub balances: HashSet<(String, String)>,
}

/// Application statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub requests_total: u64,
    pub requests_invalid_address: u64,
    pub requests_cooldown_rejected: u64,
    pub distributions_success: u64,
    pub distributions_failed: u64,
    pub batches_submitted: u64,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<RwLock<Stats>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(Stats::default())),
        }
    }

    pub async fn record_request(&self) {
        self.stats.write().await.requests_total += 1;
    }

    pub async fn record_invalid_address(&self) {
        self.stats.write().await.requests_invalid_address += 1;
    }

    pub async fn record_cooldown_rejection(&self) {
        self.stats.write().await.requests_cooldown_rejected += 1;
    }

    pub async fn record_distribution(&self, success: bool, batches: u64) {
        let mut stats = self.stats.write().await;
        if success {
            stats.distributions_success += 1;
        } else {
            stats.distributions_failed += 1;
        }
        stats.batches_submitted += batches;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
