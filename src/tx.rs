//! Transaction draft building, envelope encoding and hashing

use crate::signer::DistributorSigner;
use crate::types::AssetSpec;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use sha2::{Digest, Sha256};

/// Hard ledger limit on operations per transaction
pub const MAX_OPS_PER_TX: usize = 100;

/// One create-claimable-balance operation: earmark `asset` for `claimant`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateClaimableBalanceOp {
    pub asset: AssetSpec,
    pub claimant: String,
}

/// An unsigned transaction covering one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub source_account: String,
    /// Sequence the transaction consumes (snapshot sequence + 1)
    pub sequence: i64,
    /// Total fee in stroops: base fee times operation count
    pub fee: u32,
    /// Upper time bound; past this the ledger rejects the transaction
    pub valid_until_unix: i64,
    pub operations: Vec<CreateClaimableBalanceOp>,
}

impl TransactionDraft {
    /// Build a draft for `batch`, all operations claimable by `claimant`.
    /// The validity window is anchored at `now_unix` and must be recomputed
    /// for every submission attempt.
    pub fn build(
        source_account: &str,
        snapshot_sequence: i64,
        base_fee: u32,
        window_secs: i64,
        now_unix: i64,
        batch: &[AssetSpec],
        claimant: &str,
    ) -> Self {
        debug_assert!(batch.len() <= MAX_OPS_PER_TX);
        Self {
            source_account: source_account.to_string(),
            sequence: snapshot_sequence + 1,
            fee: base_fee * batch.len() as u32,
            valid_until_unix: now_unix + window_secs,
            operations: batch
                .iter()
                .map(|asset| CreateClaimableBalanceOp {
                    asset: asset.clone(),
                    claimant: claimant.to_string(),
                })
                .collect(),
        }
    }

    /// Deterministic binary encoding of the draft: big-endian integers,
    /// length-prefixed strings, one-byte option tags.
    pub fn payload(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.operations.len() * 96);
        put_str(&mut buf, &self.source_account);
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.fee.to_be_bytes());
        buf.extend_from_slice(&self.valid_until_unix.to_be_bytes());
        buf.extend_from_slice(&(self.operations.len() as u32).to_be_bytes());
        for op in &self.operations {
            put_str(&mut buf, op.asset.code());
            match op.asset.issuer() {
                Some(issuer) => {
                    buf.push(1);
                    put_str(&mut buf, issuer);
                }
                None => buf.push(0),
            }
            put_str(&mut buf, op.asset.amount());
            put_str(&mut buf, &op.claimant);
        }
        buf
    }
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// A signed envelope ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub envelope_base64: String,
    /// Hex transaction hash, bound to the network passphrase
    pub hash: String,
}

/// Hash the draft against the network and sign it with the distributor key.
///
/// The signing preimage is sha256(network id || payload) with
/// network id = sha256(passphrase), so an envelope for one network can never
/// be replayed on another.
pub fn sign_draft(
    draft: &TransactionDraft,
    signer: &DistributorSigner,
    network_passphrase: &str,
) -> SignedTransaction {
    let payload = draft.payload();
    let network_id: [u8; 32] = Sha256::digest(network_passphrase.as_bytes()).into();

    let mut preimage = Vec::with_capacity(32 + payload.len());
    preimage.extend_from_slice(&network_id);
    preimage.extend_from_slice(&payload);
    let hash: [u8; 32] = Sha256::digest(&preimage).into();

    let signature = signer.sign(&hash);

    let mut envelope = payload;
    envelope.extend_from_slice(&signature);

    SignedTransaction {
        envelope_base64: BASE64_STANDARD.encode(&envelope),
        hash: hex::encode(hash),
    }
}
