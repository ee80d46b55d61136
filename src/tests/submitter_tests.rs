//! State-machine tests for the transaction submitter

use super::test_helpers::*;
use crate::ledger::LedgerError;
use crate::observability::CorrelationId;
use crate::signer::DistributorSigner;
use crate::types::SubmissionOutcome;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn cid() -> CorrelationId {
    CorrelationId::from("test")
}

#[tokio::test(start_paused = true)]
async fn test_success_on_first_attempt() {
    let ledger = MockLedger::new(100);
    ledger.script_submit(vec![MockLedger::ok("abc123")]);
    let submitter = submitter_with(Arc::clone(&ledger), test_signer());

    let outcome = submitter
        .submit_batch(&assets(3), &target_address(), &cid())
        .await;

    assert_eq!(
        outcome,
        SubmissionOutcome::Success {
            hash: "abc123".to_string()
        }
    );
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.load_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_envelope_carries_batch_and_fee() {
    let ledger = MockLedger::new(100);
    let signer = test_signer();
    let submitter = submitter_with(Arc::clone(&ledger), Arc::clone(&signer));

    submitter
        .submit_batch(&assets(3), &target_address(), &cid())
        .await;

    let envelopes = ledger.envelopes.lock().unwrap();
    let decoded = decode_envelope(&envelopes[0]);
    assert_eq!(decoded.source, signer.account_id());
    assert_eq!(decoded.sequence, 101);
    assert_eq!(decoded.fee, 300);
    assert_eq!(decoded.ops.len(), 3);
    assert!(decoded
        .ops
        .iter()
        .all(|(_, _, _, claimant)| *claimant == target_address()));
}

#[tokio::test(start_paused = true)]
async fn test_five_network_transients_exhaust_budget() {
    let ledger = MockLedger::new(100);
    ledger.script_submit(vec![
        MockLedger::transport("connection reset"),
        MockLedger::transport("connection reset"),
        Err(LedgerError::GatewayTimeout),
        MockLedger::transport("connection reset"),
        Err(LedgerError::GatewayTimeout),
    ]);
    let submitter = submitter_with(Arc::clone(&ledger), test_signer());

    let outcome = submitter
        .submit_batch(&assets(1), &target_address(), &cid())
        .await;

    assert_eq!(
        outcome,
        SubmissionOutcome::PermanentFailure {
            reason: "retry budget exhausted".to_string()
        }
    );
    // exactly five attempts, never a sixth
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 5);
    assert_eq!(ledger.load_calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_underfunded_is_immediately_terminal() {
    let ledger = MockLedger::new(100);
    ledger.script_submit(vec![MockLedger::rejected("tx_failed", &["op_underfunded"])]);
    let submitter = submitter_with(Arc::clone(&ledger), test_signer());

    let outcome = submitter
        .submit_batch(&assets(2), &target_address(), &cid())
        .await;

    assert_eq!(
        outcome,
        SubmissionOutcome::PermanentFailure {
            reason: "distributor underfunded".to_string()
        }
    );
    // no further network calls after the terminal classification
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.load_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_balance_code_is_terminal() {
    let ledger = MockLedger::new(100);
    ledger.script_submit(vec![MockLedger::rejected("tx_insufficient_balance", &[])]);
    let submitter = submitter_with(Arc::clone(&ledger), test_signer());

    let outcome = submitter
        .submit_batch(&assets(1), &target_address(), &cid())
        .await;

    assert!(outcome.is_failure());
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_index_pruned_order_preserved() {
    let ledger = MockLedger::new(100);
    ledger.script_submit(vec![
        MockLedger::rejected("tx_failed", &["op_success", "op_no_trust", "op_success"]),
        MockLedger::ok("h2"),
    ]);
    let submitter = submitter_with(Arc::clone(&ledger), test_signer());

    let outcome = submitter
        .submit_batch(&assets(3), &target_address(), &cid())
        .await;

    assert_eq!(
        outcome,
        SubmissionOutcome::PartialSuccess {
            hash: "h2".to_string(),
            excluded: 1
        }
    );

    let envelopes = ledger.envelopes.lock().unwrap();
    assert_eq!(envelopes.len(), 2);
    let retried = decode_envelope(&envelopes[1]);
    let codes: Vec<&str> = retried.ops.iter().map(|(code, ..)| code.as_str()).collect();
    assert_eq!(codes, vec!["TOK0", "TOK2"]);
}

#[tokio::test(start_paused = true)]
async fn test_pruning_to_empty_batch_is_terminal() {
    let ledger = MockLedger::new(100);
    ledger.script_submit(vec![MockLedger::rejected("tx_failed", &["op_no_trust"])]);
    let submitter = submitter_with(Arc::clone(&ledger), test_signer());

    let outcome = submitter
        .submit_batch(&assets(1), &target_address(), &cid())
        .await;

    match outcome {
        SubmissionOutcome::PermanentFailure { reason } => {
            assert!(reason.contains("no eligible operations remain"));
        }
        other => panic!("expected permanent failure, got {:?}", other),
    }
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_pruning_accumulates_exclusions() {
    let ledger = MockLedger::new(100);
    ledger.script_submit(vec![
        MockLedger::rejected("tx_failed", &["op_no_trust", "op_success", "op_success"]),
        MockLedger::rejected("tx_failed", &["op_success", "op_not_authorized"]),
        MockLedger::ok("h3"),
    ]);
    let submitter = submitter_with(Arc::clone(&ledger), test_signer());

    let outcome = submitter
        .submit_batch(&assets(3), &target_address(), &cid())
        .await;

    assert_eq!(
        outcome,
        SubmissionOutcome::PartialSuccess {
            hash: "h3".to_string(),
            excluded: 2
        }
    );
    let envelopes = ledger.envelopes.lock().unwrap();
    let final_batch = decode_envelope(&envelopes[2]);
    let codes: Vec<&str> = final_batch
        .ops
        .iter()
        .map(|(code, ..)| code.as_str())
        .collect();
    assert_eq!(codes, vec!["TOK1"]);
}

#[tokio::test(start_paused = true)]
async fn test_stale_sequence_retried_with_fresh_snapshot() {
    let ledger = MockLedger::new(100);
    ledger.script_submit(vec![
        MockLedger::rejected("tx_bad_seq", &[]),
        MockLedger::ok("h2"),
    ]);
    let submitter = submitter_with(Arc::clone(&ledger), test_signer());

    let outcome = submitter
        .submit_batch(&assets(1), &target_address(), &cid())
        .await;

    assert_eq!(
        outcome,
        SubmissionOutcome::Success {
            hash: "h2".to_string()
        }
    );
    let envelopes = ledger.envelopes.lock().unwrap();
    let first = decode_envelope(&envelopes[0]);
    let second = decode_envelope(&envelopes[1]);
    // a fresh snapshot was taken for the retry; the sequence moved on
    assert_eq!(first.sequence, 101);
    assert_eq!(second.sequence, 102);
}

#[tokio::test(start_paused = true)]
async fn test_fee_and_expiry_transients_are_retried() {
    let ledger = MockLedger::new(100);
    ledger.script_submit(vec![
        MockLedger::rejected("tx_insufficient_fee", &[]),
        MockLedger::rejected("tx_too_late", &[]),
        MockLedger::ok("h3"),
    ]);
    let submitter = submitter_with(Arc::clone(&ledger), test_signer());

    let outcome = submitter
        .submit_batch(&assets(1), &target_address(), &cid())
        .await;

    assert_eq!(
        outcome,
        SubmissionOutcome::Success {
            hash: "h3".to_string()
        }
    );
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unclassified_error_is_scrubbed_of_seed() {
    let seed = test_seed();
    let signer = Arc::new(DistributorSigner::from_secret_seed(&seed).unwrap());
    let ledger = MockLedger::new(100);
    ledger.script_submit(vec![Err(LedgerError::UnexpectedResponse {
        status: 500,
        message: format!("internal error while signing with {}", seed),
    })]);
    let submitter = submitter_with(Arc::clone(&ledger), signer);

    let outcome = submitter
        .submit_batch(&assets(1), &target_address(), &cid())
        .await;

    match outcome {
        SubmissionOutcome::PermanentFailure { reason } => {
            assert!(!reason.contains(&seed), "seed leaked: {}", reason);
            assert!(reason.contains("[redacted]"));
        }
        other => panic!("expected permanent failure, got {:?}", other),
    }
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_transaction_code_is_permanent() {
    let ledger = MockLedger::new(100);
    ledger.script_submit(vec![MockLedger::rejected("tx_malformed", &[])]);
    let submitter = submitter_with(Arc::clone(&ledger), test_signer());

    let outcome = submitter
        .submit_batch(&assets(1), &target_address(), &cid())
        .await;

    match outcome {
        SubmissionOutcome::PermanentFailure { reason } => {
            assert!(reason.contains("tx_malformed"));
        }
        other => panic!("expected permanent failure, got {:?}", other),
    }
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 1);
}
