mod common;

use common::*;
use pay_flight::domain::id::EventId;
use pay_flight::infra::postgres::attempt_repo::{
    AttemptOutcome, claim_attempt, ensure_attempt, record_result,
};
use pay_flight::services::checkout::{CheckoutOutcome, start_checkout};
use pay_flight::services::webhook_apply::{Applied, ProviderEvent, apply_event_once};
use std::sync::Arc;
use std::time::Duration;

// ── at-most-one winner ─────────────────────────────────────────────────────
// 8 tasks run ensure+claim on the same key. The conditional update is
// the only arbiter; exactly 1 task may observe claimed = true.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_have_exactly_one_winner() {
    let pool = setup_pool("pay_flight_test_concurrency").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let new = make_attempt("key_race_claim", 5000);
            let attempt = ensure_attempt(&pool, &new).await.unwrap();
            claim_attempt(&pool, &attempt, &new).await.unwrap()
        }));
    }

    let mut winners = 0;
    let mut losers = 0;
    for h in handles {
        if h.await.unwrap().claimed {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    assert_eq!(winners, 1, "exactly 1 winner");
    assert_eq!(losers, 7, "7 losers");
    assert_eq!(count_attempts(&pool, "key_race_claim").await, 1);
}

// ── single canonical row ───────────────────────────────────────────────────
// 5 tasks race the first insert. The unique constraint means they all
// converge on one row with one id.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ensure_converges_on_one_row() {
    let pool = setup_pool("pay_flight_test_concurrency").await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            ensure_attempt(&pool, &make_attempt("key_race_ensure", 5000))
                .await
                .unwrap()
                .id()
        }));
    }

    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap());
    }
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), 1, "all callers saw the same row");
    assert_eq!(count_attempts(&pool, "key_race_ensure").await, 1);
}

// ── full single-flight scenario ────────────────────────────────────────────
// Three concurrent handlers start the same checkout. Exactly one performs
// the external call; all three return the same URL.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_handlers_one_external_call_same_url() {
    let pool = setup_pool("pay_flight_test_concurrency").await;
    let provider = Arc::new(CountingProvider::new(Duration::from_millis(20)));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let pool = pool.clone();
        let provider = provider.clone();
        handles.push(tokio::spawn(async move {
            let req = make_checkout_request("demo-checkout-key", 5000);
            start_checkout(&pool, provider.as_ref(), req).await.unwrap()
        }));
    }

    for h in handles {
        match h.await.unwrap() {
            CheckoutOutcome::Ready(attempt) => {
                assert_eq!(attempt.checkout_url(), Some(TEST_CHECKOUT_URL));
                assert_eq!(attempt.stripe_checkout_session_id(), Some(TEST_SESSION_ID));
            }
            CheckoutOutcome::Pending(attempt) => {
                panic!("handler did not converge: {:?}", attempt.status())
            }
        }
    }

    assert_eq!(provider.call_count(), 1, "external call ran exactly once");
    assert_eq!(count_attempts(&pool, "demo-checkout-key").await, 1);
}

// ── webhook exactly-once ───────────────────────────────────────────────────
// 10 concurrent deliveries of one event id: 1 Fresh, 9 Duplicate, and
// the side effect runs once.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_webhook_applies_once() {
    let pool = setup_pool("pay_flight_test_concurrency").await;

    let new = make_attempt("key_webhook_race", 5000);
    let attempt = ensure_attempt(&pool, &new).await.unwrap();
    let claim = claim_attempt(&pool, &attempt, &new).await.unwrap();
    assert!(claim.claimed);
    record_result(
        &pool,
        attempt.id(),
        &AttemptOutcome::succeeded("cs_whrace".into(), "https://pay.example/cs_whrace".into()),
    )
    .await
    .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let event = ProviderEvent {
                event_id: EventId::new("evt_whrace_same").unwrap(),
                event_type: "checkout.session.completed".to_string(),
                session_id: Some("cs_whrace".to_string()),
                payload: serde_json::json!({"type": "checkout.session.completed"}),
            };
            apply_event_once(&pool, &event).await.unwrap()
        }));
    }

    let mut fresh = 0;
    let mut duplicates = 0;
    for h in handles {
        match h.await.unwrap() {
            Applied::Fresh(_) => fresh += 1,
            Applied::Duplicate => duplicates += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    assert_eq!(fresh, 1, "exactly 1 applied");
    assert_eq!(duplicates, 9, "9 duplicates");
    assert_eq!(count_events(&pool, "evt_whrace_same").await, 1);
}
