//! Verifier pipeline tests: clock-driven window rollover, deadlines,
//! cancellation, store faults and emitted events.

mod support;

use std::time::Duration;

use keygate_core::RateLimitConfig;
use keygate_verify::CallContext;
use keygate_verify::VerifyCode;
use keygate_verify::VerifyError;
use keygate_verify::VerifyRequest;
use support::credential;
use support::Harness;
use support::API_ID;
use support::NOW_MS;
use support::WORKSPACE_ID;
use tokio_util::sync::CancellationToken;

fn request(key: &str, cost: Option<u64>) -> VerifyRequest {
    VerifyRequest {
        key: key.into(),
        api_id: API_ID.into(),
        cost,
    }
}

async fn rate_limited_harness(window_ms: u64, async_mode: bool) -> Harness {
    let harness = Harness::new().await;
    let mut key = credential("key_rl", "sk_window");
    key.rate_limit = Some(RateLimitConfig {
        limit: 10,
        window_ms,
        async_mode,
    });
    harness.add(key).await;
    harness
}

#[tokio::test]
async fn test_window_rollover_restores_budget() {
    let harness = rate_limited_harness(60_000, false).await;
    let ctx = CallContext::new();
    let drain = request("sk_window", Some(10));

    let first = harness.verifier.verify(&drain, None, &ctx).await.unwrap();
    assert_eq!(first.code, VerifyCode::Valid);
    assert_eq!(first.rate_limit.unwrap().remaining, 0);

    let limited = harness.verifier.verify(&request("sk_window", None), None, &ctx).await.unwrap();
    assert_eq!(limited.code, VerifyCode::RateLimited);
    assert!(!limited.valid);
    let reset_at_ms = limited.rate_limit.unwrap().reset_at_ms;

    harness.clock.set_ms(reset_at_ms);
    let fresh = harness.verifier.verify(&request("sk_window", None), None, &ctx).await.unwrap();
    assert_eq!(fresh.code, VerifyCode::Valid);
    let state = fresh.rate_limit.unwrap();
    assert_eq!(state.remaining, 9);
    assert_eq!(state.reset_at_ms, reset_at_ms + 60_000);
}

#[tokio::test]
async fn test_previous_window_is_cleaned_up() {
    let harness = rate_limited_harness(60_000, false).await;
    let ctx = CallContext::new();

    harness.verifier.verify(&request("sk_window", None), None, &ctx).await.unwrap();
    assert_eq!(harness.windows.len().await, 1);

    harness.clock.advance_ms(60_000);
    harness.verifier.verify(&request("sk_window", None), None, &ctx).await.unwrap();
    assert_eq!(harness.windows.len().await, 1);
}

#[tokio::test]
async fn test_async_rate_limit_settles_in_store() {
    let harness = rate_limited_harness(60_000, true).await;
    let ctx = CallContext::new();

    let result = harness.verifier.verify(&request("sk_window", Some(4)), None, &ctx).await.unwrap();
    assert_eq!(result.code, VerifyCode::Valid);
    assert_eq!(result.rate_limit.unwrap().remaining, 6);

    for _ in 0..100 {
        if !harness.windows.is_empty().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(harness.windows.len().await, 1);
}

#[tokio::test]
async fn test_window_below_minimum_is_internal_error() {
    let harness = rate_limited_harness(500, false).await;

    let err = harness.verifier.verify(&request("sk_window", None), None, &CallContext::new()).await.unwrap_err();

    assert!(matches!(err, VerifyError::Internal { operation: "rate_limit", .. }));
    assert_eq!(err.status(), 500);
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let harness = Harness::new().await;
    harness.add(credential("key_1", "sk_slow")).await;
    harness.store.set_latency(Duration::from_millis(500));

    let ctx = CallContext::with_timeout(Duration::from_millis(20));
    let err = harness.verifier.verify(&request("sk_slow", None), None, &ctx).await.unwrap_err();

    assert!(matches!(err, VerifyError::Timeout { operation: "find_credential" }));
    assert_eq!(err.code(), "TIMEOUT");
}

#[tokio::test]
async fn test_cancelled_request_stops_before_store() {
    let harness = Harness::new().await;
    harness.add(credential("key_1", "sk_cancelled")).await;

    let token = CancellationToken::new();
    token.cancel();
    let ctx = CallContext::new().with_cancellation(token);
    let err = harness.verifier.verify(&request("sk_cancelled", None), None, &ctx).await.unwrap_err();

    assert!(matches!(err, VerifyError::Cancelled { .. }));
    assert_eq!(err.status(), 503);
}

#[tokio::test]
async fn test_cancellation_interrupts_slow_step() {
    let harness = Harness::new().await;
    harness.add(credential("key_1", "sk_interrupted")).await;
    harness.store.set_latency(Duration::from_secs(5));

    let token = CancellationToken::new();
    let ctx = CallContext::new().with_cancellation(token.clone());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let err = harness.verifier.verify(&request("sk_interrupted", None), None, &ctx).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, VerifyError::Cancelled { operation: "find_credential" }));
}

#[tokio::test]
async fn test_store_outage_is_internal_error() {
    let harness = Harness::new().await;
    harness.add(credential("key_1", "sk_outage")).await;
    harness.store.set_unavailable(true);

    let err = harness.verifier.verify(&request("sk_outage", None), None, &CallContext::new()).await.unwrap_err();

    assert!(matches!(err, VerifyError::Internal { operation: "find_credential", .. }));
    assert_eq!(err.code(), "INTERNAL_SERVER_ERROR");
}

#[tokio::test]
async fn test_window_store_outage_is_internal_error() {
    let harness = rate_limited_harness(60_000, false).await;
    harness.windows.set_unavailable(true);

    let err = harness.verifier.verify(&request("sk_window", None), None, &CallContext::new()).await.unwrap_err();

    assert!(matches!(err, VerifyError::Internal { operation: "rate_limit", .. }));
}

#[tokio::test]
async fn test_events_emitted_for_soft_verdicts_only() {
    let harness = Harness::new().await;
    harness.add(credential("key_ok", "sk_event_ok")).await;
    let mut expired = credential("key_expired", "sk_event_expired");
    expired.expires_at_ms = Some(NOW_MS);
    harness.add(expired).await;
    let ctx = CallContext::new();

    harness.verifier.verify(&request("sk_event_ok", None), None, &ctx).await.unwrap();
    harness.verifier.verify(&request("sk_event_expired", None), None, &ctx).await.unwrap();
    harness.verifier.verify(&request("sk_unknown", None), None, &ctx).await.unwrap_err();

    let events = harness.events.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].key_id, "key_ok");
    assert_eq!(events[0].code, VerifyCode::Valid);
    assert_eq!(events[0].workspace_id, WORKSPACE_ID);
    assert_eq!(events[0].api_id, API_ID);
    assert_eq!(events[0].time_ms, NOW_MS);
    assert_eq!(events[1].key_id, "key_expired");
    assert_eq!(events[1].code, VerifyCode::Expired);
}

#[tokio::test]
async fn test_soft_verdict_skips_quota() {
    let harness = Harness::new().await;
    let mut key = credential("key_off", "sk_off_quota");
    key.enabled = false;
    key.remaining_uses = Some(3);
    harness.add(key).await;

    let result = harness.verifier.verify(&request("sk_off_quota", None), None, &CallContext::new()).await.unwrap();

    assert_eq!(result.code, VerifyCode::Disabled);
    assert_eq!(harness.store.remaining_uses("key_off").await, Some(3));
}

#[tokio::test]
async fn test_cost_draws_from_quota() {
    let harness = Harness::new().await;
    let mut key = credential("key_q", "sk_quota_cost");
    key.remaining_uses = Some(5);
    harness.add(key).await;
    let ctx = CallContext::new();

    let first = harness.verifier.verify(&request("sk_quota_cost", Some(3)), None, &ctx).await.unwrap();
    assert_eq!(first.code, VerifyCode::Valid);
    assert_eq!(harness.store.remaining_uses("key_q").await, Some(2));

    let second = harness.verifier.verify(&request("sk_quota_cost", Some(3)), None, &ctx).await.unwrap();
    assert_eq!(second.code, VerifyCode::UsageExceeded);
    assert_eq!(harness.store.remaining_uses("key_q").await, Some(2));
}

#[tokio::test]
async fn test_demo_fixtures_verify() {
    use std::sync::Arc;

    use keygate::config::VerifyConfig;
    use keygate::AppConfig;
    use keygate::AppState;
    use keygate_core::DeterministicCredentialStore;
    use keygate_core::DeterministicKeyValueStore;
    use keygate_core::StoreFixtures;
    use keygate_time::SimulatedClock;

    let raw = include_str!("../demos/fixtures.json");
    let fixtures: StoreFixtures = serde_json::from_str(raw).unwrap();
    let store = DeterministicCredentialStore::new();
    store.load_fixtures(fixtures).await.unwrap();

    let verifier = keygate::build_verifier(
        &AppConfig::default(),
        store.clone(),
        DeterministicKeyValueStore::new(),
        Arc::new(SimulatedClock::new(NOW_MS)),
        None,
    );
    let router = keygate::build_router(AppState::new(verifier, &VerifyConfig::default()));

    let (status, body) = support::post_verify(
        router,
        serde_json::json!({"key": "sk_dev_0123456789", "apiId": "api_dev"}),
        &[],
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["code"], "VALID");
    assert_eq!(body["permissions"], serde_json::json!(["documents.read"]));
    assert_eq!(body["ratelimit"]["remaining"], 9);
    assert_eq!(store.remaining_uses("key_dev").await, Some(999));
}
