//! Confirmation tracking tests.

use std::time::Duration;

use serde_json::json;
use stakeflow::blockchain::confirmation::ConfirmationTracker;
use stakeflow::blockchain::types::{Commitment, ConfirmationOutcome, RpcError, SubmittedTransaction};

mod common;
use common::{landed, FakeRpc, EXPIRY_HEIGHT, START_HEIGHT};

fn submitted() -> SubmittedTransaction {
    SubmittedTransaction {
        signature: "sig1".to_string(),
        blockhash: common::BLOCKHASH.to_string(),
        submitted_at_block_height: START_HEIGHT,
        expiry_block_height: EXPIRY_HEIGHT,
    }
}

#[tokio::test(start_paused = true)]
async fn test_confirms_after_pending_polls() {
    let rpc = FakeRpc::new("https://rpc.example");
    rpc.queue_status(vec![
        Ok(None),
        Ok(Some(landed(Commitment::Processed))),
        Ok(Some(landed(Commitment::Confirmed))),
    ]);

    let outcome = common::tracker().await_confirmation(&submitted(), rpc.as_ref()).await;

    assert_eq!(outcome, ConfirmationOutcome::Confirmed);
    let polls = rpc.call_times("getSignatureStatuses");
    assert_eq!(polls.len(), 3);
    assert_eq!(polls[1] - polls[0], Duration::from_secs(2));
    assert_eq!(polls[2] - polls[1], Duration::from_secs(2));
    assert_eq!(rpc.calls("getSignatureStatuses/history"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_higher_commitment_satisfies_target() {
    let rpc = FakeRpc::new("https://rpc.example");
    rpc.set_status(Ok(Some(landed(Commitment::Finalized))));

    let outcome = common::tracker().await_confirmation(&submitted(), rpc.as_ref()).await;

    assert_eq!(outcome, ConfirmationOutcome::Confirmed);
    assert_eq!(rpc.calls("getBlockHeight"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_program_error_is_failed_on_chain() {
    let rpc = FakeRpc::new("https://rpc.example");
    rpc.set_status(Ok(Some(common::failed_on_chain(json!({"InstructionError": [1, {"Custom": 6001}]})))));

    let outcome = common::tracker().await_confirmation(&submitted(), rpc.as_ref()).await;

    match outcome {
        ConfirmationOutcome::FailedOnChain(reason) => assert!(reason.contains("6001"), "raw error kept: {}", reason),
        other => panic!("expected FailedOnChain, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_expired_when_not_found_past_expiry() {
    let rpc = FakeRpc::new("https://rpc.example");
    rpc.queue_block_height(vec![Ok(EXPIRY_HEIGHT - 1), Ok(EXPIRY_HEIGHT)]);
    rpc.set_block_height(Ok(EXPIRY_HEIGHT + 1));

    let outcome = common::tracker().await_confirmation(&submitted(), rpc.as_ref()).await;

    assert_eq!(outcome, ConfirmationOutcome::Expired);
    assert_eq!(rpc.calls("getSignatureStatuses"), 3, "Still valid at the expiry height itself");
    assert_eq!(rpc.calls("getSignatureStatuses/history"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_history_lookup_finds_late_landing() {
    let rpc = FakeRpc::new("https://rpc.example");
    rpc.set_block_height(Ok(EXPIRY_HEIGHT + 10));
    rpc.set_history(Ok(Some(landed(Commitment::Confirmed))));

    let outcome = common::tracker().await_confirmation(&submitted(), rpc.as_ref()).await;

    assert_eq!(outcome, ConfirmationOutcome::Confirmed);
}

#[tokio::test(start_paused = true)]
async fn test_history_lookup_finds_late_failure() {
    let rpc = FakeRpc::new("https://rpc.example");
    rpc.set_block_height(Ok(EXPIRY_HEIGHT + 10));
    rpc.set_history(Ok(Some(common::failed_on_chain(json!("InsufficientFundsForRent")))));

    let outcome = common::tracker().await_confirmation(&submitted(), rpc.as_ref()).await;

    assert!(matches!(outcome, ConfirmationOutcome::FailedOnChain(_)));
}

#[tokio::test(start_paused = true)]
async fn test_landed_below_commitment_keeps_polling() {
    let rpc = FakeRpc::new("https://rpc.example");
    rpc.set_block_height(Ok(EXPIRY_HEIGHT + 10));
    rpc.queue_history(vec![Ok(Some(landed(Commitment::Processed)))]);
    rpc.queue_status(vec![Ok(None), Ok(Some(landed(Commitment::Confirmed)))]);

    let outcome = common::tracker().await_confirmation(&submitted(), rpc.as_ref()).await;

    assert_eq!(outcome, ConfirmationOutcome::Confirmed);
    assert_eq!(rpc.calls("getSignatureStatuses/history"), 1);
    assert_eq!(rpc.calls("getSignatureStatuses"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_lookups_back_off_then_confirm() {
    let rpc = FakeRpc::new("https://rpc.example");
    rpc.queue_status(vec![
        Err(common::rate_limited()),
        Err(common::rate_limited()),
        Err(common::rate_limited()),
        Ok(Some(landed(Commitment::Confirmed))),
    ]);

    let outcome = common::tracker().await_confirmation(&submitted(), rpc.as_ref()).await;

    assert_eq!(outcome, ConfirmationOutcome::Confirmed);
    let times = rpc.call_times("getSignatureStatuses");
    assert_eq!(times.len(), 4);
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    // Rate limits back off from 4x the 500ms base.
    assert_eq!(gaps, vec![Duration::from_secs(2), Duration::from_secs(4), Duration::from_secs(8)]);
}

#[tokio::test(start_paused = true)]
async fn test_lookup_failures_are_indeterminate_not_failed() {
    let rpc = FakeRpc::down("https://rpc.example", common::transient("connection reset"));

    let outcome = common::tracker().await_confirmation(&submitted(), rpc.as_ref()).await;

    assert_eq!(outcome, ConfirmationOutcome::IndeterminateAfterRetries);
    assert_eq!(rpc.calls("getSignatureStatuses"), 6);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_lookup_is_indeterminate() {
    let rpc = FakeRpc::new("https://rpc.example");
    rpc.set_status(Err(RpcError::Rejected { code: -32602, message: "Invalid param".into() }));

    let outcome = common::tracker().await_confirmation(&submitted(), rpc.as_ref()).await;

    assert_eq!(outcome, ConfirmationOutcome::IndeterminateAfterRetries);
    assert_eq!(rpc.calls("getSignatureStatuses"), 1, "Fatal errors are not retried");
}

#[tokio::test(start_paused = true)]
async fn test_bounded_wait() {
    let rpc = FakeRpc::new("https://rpc.example");
    rpc.set_status(Ok(Some(landed(Commitment::Processed))));

    let tracker = ConfirmationTracker::new(
        common::confirmation_policy(),
        Commitment::Finalized,
        Duration::from_secs(2),
        Duration::from_secs(30),
    );
    let start = tokio::time::Instant::now();
    let outcome = tracker.await_confirmation(&submitted(), rpc.as_ref()).await;

    assert_eq!(outcome, ConfirmationOutcome::IndeterminateAfterRetries);
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_never_resubmits() {
    let rpc = FakeRpc::new("https://rpc.example");
    rpc.set_block_height(Ok(EXPIRY_HEIGHT + 1));

    let _ = common::tracker().await_confirmation(&submitted(), rpc.as_ref()).await;

    assert_eq!(rpc.calls("sendTransaction"), 0);
    assert_eq!(rpc.calls("getLatestBlockhash"), 0);
}
