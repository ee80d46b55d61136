//! Distributor signing key management
//!
//! The seed never leaves this module: every outward-facing error string is
//! passed through [`DistributorSigner::scrub`] before it can reach logs or
//! the reply channel.

use crate::strkey::{self, StrKeyError};
use ed25519_dalek::{Signer as _, SigningKey};
use thiserror::Error;
use zeroize::Zeroizing;

/// Placeholder substituted for the seed in scrubbed messages
const REDACTED: &str = "[redacted]";

#[derive(Debug, Clone, Error)]
pub enum SignerError {
    #[error("invalid signing seed: {0}")]
    InvalidSeed(#[from] StrKeyError),
}

/// Holds the distributor's ed25519 signing key and the only copy of the
/// seed string, both zeroized on drop.
pub struct DistributorSigner {
    signing_key: SigningKey,
    seed_strkey: Zeroizing<String>,
    account_id: String,
}

impl DistributorSigner {
    /// Build a signer from a strkey-encoded secret seed ('S...')
    pub fn from_secret_seed(seed: &str) -> Result<Self, SignerError> {
        let raw = Zeroizing::new(strkey::decode_seed(seed)?);
        let signing_key = SigningKey::from_bytes(&raw);
        let account_id = strkey::encode_account_id(&signing_key.verifying_key().to_bytes());
        Ok(Self {
            signing_key,
            seed_strkey: Zeroizing::new(seed.to_string()),
            account_id,
        })
    }

    /// Public account id derived from the seed
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Sign a payload, returning the raw 64-byte signature
    pub fn sign(&self, payload: &[u8]) -> [u8; 64] {
        self.signing_key.sign(payload).to_bytes()
    }

    /// Replace every occurrence of the exact seed string in `message`.
    /// Applied to all error text before it leaves the submitter.
    pub fn scrub(&self, message: &str) -> String {
        message.replace(self.seed_strkey.as_str(), REDACTED)
    }
}

impl std::fmt::Debug for DistributorSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributorSigner")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}
