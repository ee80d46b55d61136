//! Ledger endpoint capability: account loading and transaction submission
//!
//! The submission engine only ever talks to [`LedgerClient`]; the bundled
//! implementation is a thin HTTP adapter for a Horizon-compatible endpoint.
//! Tests substitute scripted mocks.

use crate::types::DistributorAccountSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Structured result codes returned for a rejected transaction
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionResultCodes {
    /// Transaction-level code, e.g. `tx_bad_seq` or `tx_failed`
    pub transaction: String,

    /// Per-operation codes in operation order, present for `tx_failed`
    #[serde(default)]
    pub operations: Vec<String>,
}

/// Successful submission response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSuccess {
    pub hash: String,
}

/// Errors crossing the ledger boundary
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Transport-level failure with no structured response
    #[error("transport error: {0}")]
    Transport(String),

    /// Gateway gave up before the transaction reached a ledger close
    #[error("gateway timeout")]
    GatewayTimeout,

    /// The ledger rejected the transaction with structured result codes
    #[error("transaction rejected: {}", .codes.transaction)]
    Rejected { codes: TransactionResultCodes },

    /// Unexpected HTTP response carrying no result codes
    #[error("unexpected response (status {status}): {message}")]
    UnexpectedResponse { status: u16, message: String },

    /// Response body that could not be decoded
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Capability interface consumed by the submission engine
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch the current sequence number and trustline set of an account
    async fn load_account(
        &self,
        account_id: &str,
    ) -> Result<DistributorAccountSnapshot, LedgerError>;

    /// Submit a signed, base64-encoded transaction envelope
    async fn submit(&self, envelope_base64: &str) -> Result<SubmitSuccess, LedgerError>;
}

/// HTTP adapter for a Horizon-compatible ledger endpoint
pub struct HorizonClient {
    base_url: String,
    http: reqwest::Client,
}

impl HorizonClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn map_transport(err: reqwest::Error) -> LedgerError {
        if err.is_timeout() {
            LedgerError::GatewayTimeout
        } else {
            LedgerError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    sequence: String,
    #[serde(default)]
    balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    #[serde(default)]
    asset_code: Option<String>,
    #[serde(default)]
    asset_issuer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    extras: Option<ErrorExtras>,
}

#[derive(Debug, Deserialize)]
struct ErrorExtras {
    result_codes: Option<TransactionResultCodes>,
}

/// Pull structured result codes out of an error body, if present
fn decode_result_codes(body: &str) -> Option<TransactionResultCodes> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.extras)
        .and_then(|e| e.result_codes)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[async_trait]
impl LedgerClient for HorizonClient {
    async fn load_account(
        &self,
        account_id: &str,
    ) -> Result<DistributorAccountSnapshot, LedgerError> {
        let url = format!("{}/accounts/{}", self.base_url, account_id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::UnexpectedResponse {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }

        let account: AccountResponse = resp
            .json()
            .await
            .map_err(|e| LedgerError::MalformedResponse(e.to_string()))?;
        let sequence = account
            .sequence
            .parse::<i64>()
            .map_err(|_| LedgerError::MalformedResponse(format!(
                "non-numeric sequence '{}'",
                account.sequence
            )))?;

        let balances: HashSet<(String, String)> = account
            .balances
            .into_iter()
            .filter_map(|b| Some((b.asset_code?, b.asset_issuer?)))
            .collect();

        Ok(DistributorAccountSnapshot { sequence, balances })
    }

    async fn submit(&self, envelope_base64: &str) -> Result<SubmitSuccess, LedgerError> {
        let url = format!("{}/transactions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .form(&[("tx", envelope_base64)])
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = resp.status();
        if status.is_success() {
            let body: SubmitResponse = resp
                .json()
                .await
                .map_err(|e| LedgerError::MalformedResponse(e.to_string()))?;
            return Ok(SubmitSuccess { hash: body.hash });
        }

        if status.as_u16() == 504 {
            return Err(LedgerError::GatewayTimeout);
        }

        let body = resp.text().await.unwrap_or_default();
        match decode_result_codes(&body) {
            Some(codes) => Err(LedgerError::Rejected { codes }),
            None => Err(LedgerError::UnexpectedResponse {
                status: status.as_u16(),
                message: truncate(&body, 200),
            }),
        }
    }
}
