//! End-to-end breaker behaviour through the client, on tokio's paused clock

mod common;

use std::time::Duration;

use circuit_guard::{CallResult, CircuitBreakerError, CircuitState};
use common::*;
use tokio::sync::mpsc;
use tokio::time::Instant;

const NO_DELAY: Duration = Duration::ZERO;

#[tokio::test(start_paused = true)]
async fn test_reference_scenario_open_probe_close() {
    init_test_logging();
    let client = scenario_client("reference_scenario");
    let counter = InvocationCounter::new();

    for _ in 0..3 {
        let result = client.submit(counter.failing("boom", NO_DELAY)).await;
        assert!(matches!(result, Err(CircuitBreakerError::OperationFailed(_))));
    }
    assert_eq!(counter.count(), 3);

    // 4th call is rejected immediately, task untouched
    let started = Instant::now();
    let result = client.submit(counter.succeeding("ok", NO_DELAY)).await;
    assert!(result.unwrap_err().is_circuit_open());
    assert_elapsed_near(started.elapsed(), Duration::ZERO);
    assert_eq!(counter.count(), 3);

    tokio::time::sleep(Duration::from_millis(110)).await;

    // Probe runs the real task and closes the gate
    let result = client.submit(counter.succeeding("recovered", NO_DELAY)).await;
    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(counter.count(), 4);

    let metrics = client.breaker().metrics().await.unwrap();
    assert_eq!(metrics.current_state, CircuitState::Closed);
    assert_eq!(metrics.failure_count, 0);

    let result = client.submit(counter.succeeding("normal", NO_DELAY)).await;
    assert_eq!(result.unwrap(), "normal");
    assert_eq!(counter.count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_threshold_boundary() {
    let client = scenario_client("threshold_boundary");

    fail_n_times(&client, 2).await;
    let metrics = client.breaker().metrics().await.unwrap();
    assert_eq!(metrics.current_state, CircuitState::Closed);
    assert_eq!(metrics.failure_count, 2);

    fail_n_times(&client, 1).await;
    let metrics = client.breaker().metrics().await.unwrap();
    assert_eq!(metrics.current_state, CircuitState::Open);
    assert_eq!(metrics.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_while_open_skips_task_and_counter() {
    let client = scenario_client("fallback_open");
    let counter = InvocationCounter::new();
    fail_n_times(&client, 3).await;

    let before = client.breaker().metrics().await.unwrap();
    let value = client
        .submit_with_fallback(counter.succeeding("fresh", NO_DELAY), "cached".to_string())
        .await;

    assert_eq!(value, "cached");
    assert_eq!(counter.count(), 0);

    let after = client.breaker().metrics().await.unwrap();
    assert_eq!(after.current_state, CircuitState::Open);
    assert_eq!(after.failure_count, before.failure_count);
    assert_eq!(after.failure_total, before.failure_total);
    assert_eq!(after.fallback_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_rejections_are_not_counted() {
    let client = scenario_client("open_not_counted");
    fail_n_times(&client, 3).await;

    for _ in 0..5 {
        let result = client.submit(|| async { Ok("x".to_string()) }).await;
        assert!(result.unwrap_err().is_circuit_open());
    }

    let metrics = client.breaker().metrics().await.unwrap();
    assert_eq!(metrics.failure_total, 3);
    assert_eq!(metrics.short_circuited, 5);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_rearms_fresh_cool_down() {
    let client = scenario_client("failed_probe");
    let counter = InvocationCounter::new();

    let opened_at = Instant::now();
    fail_n_times(&client, 3).await;

    tokio::time::sleep(Duration::from_millis(110)).await;
    assert_eq!(client.breaker().state().await.unwrap(), CircuitState::HalfOpen);

    // Probe fails 40ms in, re-opening at t=150ms
    let result = client.submit(counter.failing("still down", Duration::from_millis(40))).await;
    assert!(result.is_err());
    let reopened_at = Instant::now();
    assert_elapsed_near(reopened_at - opened_at, Duration::from_millis(150));
    assert_eq!(client.breaker().state().await.unwrap(), CircuitState::Open);

    // 70ms after re-open: more than reset_wait since the first open, still open
    tokio::time::sleep(Duration::from_millis(70)).await;
    let result = client.submit(counter.succeeding("early", NO_DELAY)).await;
    assert!(result.unwrap_err().is_circuit_open());
    assert_eq!(counter.count(), 1);

    // 110ms after re-open the next call is a real probe
    tokio::time::sleep(Duration::from_millis(40)).await;
    let result = client.submit(counter.succeeding("back", NO_DELAY)).await;
    assert_eq!(result.unwrap(), "back");
    assert_eq!(counter.count(), 2);
    assert_eq!(client.breaker().state().await.unwrap(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_probe_after_long_open_period() {
    let client = scenario_client("long_open");
    let counter = InvocationCounter::new();
    fail_n_times(&client, 3).await;

    tokio::time::sleep(Duration::from_secs(60)).await;

    let result = client.submit(counter.succeeding("ok", NO_DELAY)).await;
    assert!(result.is_ok());
    assert_eq!(counter.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_failure() {
    let client = scenario_client("timeouts");
    let counter = InvocationCounter::new();

    for _ in 0..3 {
        let started = Instant::now();
        let result = client
            .submit(counter.succeeding("eventually", Duration::from_millis(200)))
            .await;
        assert!(result.unwrap_err().is_timeout());
        assert_elapsed_near(started.elapsed(), Duration::from_millis(50));
    }

    let metrics = client.breaker().metrics().await.unwrap();
    assert_eq!(metrics.current_state, CircuitState::Open);
    assert_eq!(metrics.timeout_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_task_is_isolated() {
    let client = scenario_client("panics");

    async fn explode() -> Result<String, String> {
        panic!("handler bug")
    }

    let result = client.submit(explode).await;
    match result {
        Err(CircuitBreakerError::TaskPanicked { message, .. }) => assert_eq!(message, "handler bug"),
        other => panic!("Expected TaskPanicked, got {other:?}"),
    }

    let metrics = client.breaker().metrics().await.unwrap();
    assert_eq!(metrics.failure_count, 1);
    assert_eq!(metrics.panic_count, 1);

    // Breaker keeps serving
    let result = client.submit(|| async { Ok("alive".to_string()) }).await;
    assert_eq!(result.unwrap(), "alive");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_probes_first_outcome_wins() {
    let client = scenario_client("concurrent_probes");
    let counter = InvocationCounter::new();
    fail_n_times(&client, 3).await;
    tokio::time::sleep(Duration::from_millis(110)).await;

    let fast = client.submit(counter.succeeding("fast", Duration::from_millis(10)));
    let slow = client.submit(counter.failing("slow", Duration::from_millis(30)));
    let (fast, slow) = tokio::join!(fast, slow);

    assert_eq!(fast.unwrap(), "fast");
    assert!(slow.is_err());
    assert_eq!(counter.count(), 2);

    // Success closed the gate; the later failure counted against Closed
    let metrics = client.breaker().metrics().await.unwrap();
    assert_eq!(metrics.current_state, CircuitState::Closed);
    assert_eq!(metrics.failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_each_call_gets_exactly_one_outcome() {
    let client = scenario_client("exactly_once");
    let (tx, mut rx) = mpsc::unbounded_channel::<CallResult<String, String>>();
    let counter = InvocationCounter::new();

    client.submit_for(counter.succeeding("a", NO_DELAY), tx.clone()).await;
    client.submit_for(counter.failing("b", NO_DELAY), tx.clone()).await;
    client
        .submit_for(counter.succeeding("c", Duration::from_millis(500)), tx.clone())
        .await;
    drop(tx);

    let mut outcomes = Vec::new();
    while let Some(outcome) = rx.recv().await {
        outcomes.push(outcome);
    }

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, Err(e) if e.is_timeout()))
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_call_answered_after_shutdown() {
    let client = scenario_client("shutdown_in_flight");
    let (tx, mut rx) = mpsc::unbounded_channel::<CallResult<String, String>>();

    client
        .submit_for(|| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok("finished".to_string())
        }, tx)
        .await;
    client.breaker().shutdown().await.unwrap();

    assert_eq!(rx.recv().await.unwrap().unwrap(), "finished");
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_late_success_after_failed_probe_reopened_gate() {
    let client = scenario_client("late_probe_success");
    let counter = InvocationCounter::new();
    fail_n_times(&client, 3).await;
    tokio::time::sleep(Duration::from_millis(110)).await;
    let probes_started = Instant::now();

    let fast = client.submit(counter.failing("fast failure", Duration::from_millis(10)));
    let slow = client.submit(counter.succeeding("late ok", Duration::from_millis(30)));
    let (fast, slow) = tokio::join!(fast, slow);

    // The failure re-opened the gate; the later success is only relayed
    assert!(matches!(fast, Err(CircuitBreakerError::OperationFailed(_))));
    assert_eq!(slow.unwrap(), "late ok");
    assert_eq!(counter.count(), 2);

    let metrics = client.breaker().metrics().await.unwrap();
    assert_eq!(metrics.current_state, CircuitState::Open);
    assert_eq!(metrics.failure_count, 0);

    // Cool-down still runs from the re-open at +10ms, not from the late success
    tokio::time::sleep_until(probes_started + Duration::from_millis(105)).await;
    assert_eq!(client.breaker().state().await.unwrap(), CircuitState::Open);

    tokio::time::sleep_until(probes_started + Duration::from_millis(115)).await;
    assert_eq!(
        client.breaker().state().await.unwrap(),
        CircuitState::HalfOpen
    );
}
