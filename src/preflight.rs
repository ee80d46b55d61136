//! Startup trustline pre-flight check
//!
//! The distributor must already hold a trustline for every non-native asset
//! it is configured to give away. A single unmet trustline anywhere blocks
//! the whole service from starting.

use crate::ledger::{LedgerClient, LedgerError};
use crate::types::AssetSpec;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("ledger error during preflight: {0}")]
    Ledger(#[from] LedgerError),

    #[error("distributor is missing trustlines for: {}", format_pairs(.0))]
    MissingTrustlines(Vec<(String, String)>),
}

fn format_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(code, issuer)| format!("{}:{}", code, issuer))
        .collect::<Vec<_>>()
        .join(", ")
}

/// (code, issuer) pairs required by `required` but absent from `balances`.
/// Native assets are exempt by definition. Sorted for stable reporting.
pub fn missing_trustlines<'a>(
    balances: &HashSet<(String, String)>,
    required: impl IntoIterator<Item = &'a AssetSpec>,
) -> Vec<(String, String)> {
    let mut missing: Vec<_> = required
        .into_iter()
        .filter_map(AssetSpec::trustline_key)
        .filter(|key| !balances.contains(key))
        .collect();
    missing.sort();
    missing.dedup();
    missing
}

/// Load the distributor account and verify every configured asset is held.
/// Succeeds silently; fails closed with the full missing list.
pub async fn check(
    ledger: &dyn LedgerClient,
    distributor: &str,
    required: &[AssetSpec],
) -> Result<(), PreflightError> {
    let snapshot = ledger.load_account(distributor).await?;
    let missing = missing_trustlines(&snapshot.balances, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PreflightError::MissingTrustlines(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strkey;
    use crate::types::DistributorAccountSnapshot;
    use async_trait::async_trait;

    fn issuer(n: u8) -> String {
        strkey::encode_account_id(&[n; 32])
    }

    #[test]
    fn test_missing_set_computed() {
        let iss1 = issuer(1);
        let iss2 = issuer(2);
        let balances: HashSet<_> = [("USDC".to_string(), iss1.clone())].into();
        let required = vec![
            AssetSpec::new("USDC", Some(&iss1), "5").unwrap(),
            AssetSpec::new("EUR", Some(&iss2), "5").unwrap(),
        ];

        let missing = missing_trustlines(&balances, &required);
        assert_eq!(missing, vec![("EUR".to_string(), iss2)]);
    }

    #[test]
    fn test_native_assets_exempt() {
        let balances = HashSet::new();
        let required = vec![AssetSpec::new("XLM", None, "10").unwrap()];
        assert!(missing_trustlines(&balances, &required).is_empty());
    }

    #[test]
    fn test_duplicate_requirements_reported_once() {
        let iss = issuer(3);
        let balances = HashSet::new();
        let required = vec![
            AssetSpec::new("GOLD", Some(&iss), "1").unwrap(),
            AssetSpec::new("GOLD", Some(&iss), "2").unwrap(),
        ];
        assert_eq!(missing_trustlines(&balances, &required).len(), 1);
    }

    struct FixedLedger(DistributorAccountSnapshot);

    #[async_trait]
    impl LedgerClient for FixedLedger {
        async fn load_account(
            &self,
            _account_id: &str,
        ) -> Result<DistributorAccountSnapshot, LedgerError> {
            Ok(self.0.clone())
        }

        async fn submit(
            &self,
            _envelope_base64: &str,
        ) -> Result<crate::ledger::SubmitSuccess, LedgerError> {
            unreachable!("preflight never submits")
        }
    }

    #[tokio::test]
    async fn test_check_fails_closed_and_enumerates_all() {
        let iss1 = issuer(1);
        let iss2 = issuer(2);
        let ledger = FixedLedger(DistributorAccountSnapshot {
            sequence: 7,
            balances: HashSet::new(),
        });
        let required = vec![
            AssetSpec::new("USDC", Some(&iss1), "5").unwrap(),
            AssetSpec::new("EUR", Some(&iss2), "5").unwrap(),
        ];

        match check(&ledger, "GDISTRIBUTOR", &required).await {
            Err(PreflightError::MissingTrustlines(missing)) => assert_eq!(missing.len(), 2),
            other => panic!("expected missing trustlines, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_succeeds_when_all_held() {
        let iss1 = issuer(1);
        let ledger = FixedLedger(DistributorAccountSnapshot {
            sequence: 7,
            balances: [("USDC".to_string(), iss1.clone())].into(),
        });
        let required = vec![AssetSpec::new("USDC", Some(&iss1), "5").unwrap()];
        assert!(check(&ledger, "GDISTRIBUTOR", &required).await.is_ok());
    }
}
