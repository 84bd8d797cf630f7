//! Store metrics collection.

use metrics::{counter, histogram};
use std::time::Instant;

/// Record a store operation duration.
pub fn record_op_duration(op_name: &str, duration_secs: f64) {
    histogram!(
        "store_op_duration_seconds",
        "op" => op_name.to_string()
    )
    .record(duration_secs);
}

/// Record a visit written to the ledger.
pub fn record_visit_recorded() {
    counter!("visits_recorded_total").increment(1);
}

/// Record a candidate place merged into an existing one.
pub fn record_place_merged() {
    counter!("places_merged_total").increment(1);
}

/// Record notifications fanned out after a mutation.
pub fn record_notifications_fanned_out(count: usize) {
    counter!("notifications_fanned_out_total").increment(count as u64);
}

/// A helper to time store operations and record metrics.
///
/// Usage:
/// ```ignore
/// let timer = OpTimer::new("create_or_append");
/// let result = ledger.create_or_append(...).await;
/// timer.record();
/// ```
pub struct OpTimer {
    op_name: String,
    start: Instant,
}

impl OpTimer {
    pub fn new(op_name: impl Into<String>) -> Self {
        Self {
            op_name: op_name.into(),
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_op_duration(&self.op_name, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_timer_creation() {
        let timer = OpTimer::new("test_op");
        assert_eq!(timer.op_name, "test_op");
    }

    #[test]
    fn test_op_timer_with_string() {
        let name = String::from("test_op");
        let timer = OpTimer::new(name);
        assert_eq!(timer.op_name, "test_op");
    }
}
