//! Shared helpers for circuit breaker integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use circuit_guard::{BreakerClient, CircuitBreakerConfig};

pub type TestClient = BreakerClient<String, String>;

/// Thresholds from the reference scenario: 3 failures, 50ms run timeout, 100ms cool-down
pub fn scenario_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::new(3, Duration::from_millis(50), Duration::from_millis(100))
        .expect("scenario thresholds are valid")
}

pub fn scenario_client(name: &str) -> TestClient {
    BreakerClient::spawn(name, scenario_config())
}

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("circuit_guard=debug")
        .try_init();
}

/// Counts how many times the guarded task actually ran
#[derive(Debug, Clone, Default)]
pub struct InvocationCounter {
    count: Arc<AtomicUsize>,
}

impl InvocationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Task that succeeds with `value` after `delay`
    pub fn succeeding(
        &self,
        value: &str,
        delay: Duration,
    ) -> impl FnOnce() -> futures::future::BoxFuture<'static, Result<String, String>> + Send + 'static
    {
        let count = self.count.clone();
        let value = value.to_string();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(value)
            })
        }
    }

    /// Task that fails with `message` after `delay`
    pub fn failing(
        &self,
        message: &str,
        delay: Duration,
    ) -> impl FnOnce() -> futures::future::BoxFuture<'static, Result<String, String>> + Send + 'static
    {
        let count = self.count.clone();
        let message = message.to_string();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Err(message)
            })
        }
    }
}

/// Drive the client's breaker open with `n` immediate failures
pub async fn fail_n_times(client: &TestClient, n: u32) {
    for _ in 0..n {
        let result = client
            .submit(|| async { Err::<String, _>("downstream error".to_string()) })
            .await;
        assert!(result.is_err());
    }
}

/// Paused-clock timings land on the timer wheel's millisecond ticks
pub fn assert_elapsed_near(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(2),
        "elapsed {actual:?}, expected about {expected:?}"
    );
}
