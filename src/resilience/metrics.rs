//! Point-in-time view of a circuit breaker's control state and call counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::circuit_breaker::CircuitState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub component: String,
    pub current_state: CircuitState,

    /// Consecutive failures recorded while closed
    pub failure_count: u32,

    /// Every submitted call, dispatched or short-circuited
    pub total_calls: u64,
    pub success_count: u64,
    /// Counted failures: task errors, timeouts and runner crashes
    pub failure_total: u64,
    pub timeout_count: u64,
    pub panic_count: u64,
    /// Calls answered without running the task (error or fallback)
    pub short_circuited: u64,
    pub fallback_count: u64,

    pub state_transitions: u64,
    pub last_transition_at: Option<DateTime<Utc>>,
}

impl CircuitBreakerMetrics {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            current_state: CircuitState::Closed,
            failure_count: 0,
            total_calls: 0,
            success_count: 0,
            failure_total: 0,
            timeout_count: 0,
            panic_count: 0,
            short_circuited: 0,
            fallback_count: 0,
            state_transitions: 0,
            last_transition_at: None,
        }
    }

    /// Calls that actually reached a task runner and reported back
    pub fn completed_calls(&self) -> u64 {
        self.success_count + self.failure_total
    }

    pub fn failure_rate(&self) -> f64 {
        let completed = self.completed_calls();
        if completed == 0 {
            return 0.0;
        }
        self.failure_total as f64 / completed as f64
    }

    /// Closed and failing less than 10% of completed calls
    pub fn is_healthy(&self) -> bool {
        if self.current_state != CircuitState::Closed {
            return false;
        }
        if self.completed_calls() < 10 {
            return true;
        }
        self.failure_rate() < 0.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_metrics_are_healthy() {
        let metrics = CircuitBreakerMetrics::new("fresh");
        assert_eq!(metrics.failure_rate(), 0.0);
        assert!(metrics.is_healthy());
    }

    #[test]
    fn test_failure_rate_and_health() {
        let mut metrics = CircuitBreakerMetrics::new("busy");
        metrics.success_count = 16;
        metrics.failure_total = 4;

        assert_eq!(metrics.completed_calls(), 20);
        assert!((metrics.failure_rate() - 0.2).abs() < f64::EPSILON);
        assert!(!metrics.is_healthy());

        metrics.failure_total = 1;
        assert!(metrics.is_healthy());

        metrics.current_state = CircuitState::HalfOpen;
        assert!(!metrics.is_healthy());
    }

    #[test]
    fn test_serializes_state_in_snake_case() {
        let mut metrics = CircuitBreakerMetrics::new("json");
        metrics.current_state = CircuitState::HalfOpen;

        let value = serde_json::to_value(&metrics).unwrap();
        assert_eq!(value["current_state"], "half_open");
        assert_eq!(value["component"], "json");
    }
}
