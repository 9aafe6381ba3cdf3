//! Timing instrumentation for units of work.
//!
//! A [`PerformanceMonitor`] is constructed explicitly and handed to whatever needs it (the
//! application keeps one in [`AppState`](crate::AppState)). Work is timed by wrapping it with
//! [`PerformanceMonitor::timed`], which returns the timed unit of work:
//!
//! ```ignore
//! let outcome = monitor.timed("handler.momo", handler.handle("momo", payload)).await;
//! ```
//!
//! Every measurement is also recorded on the `hookgate_work_duration_seconds` histogram.

use std::{future::Future, time::Duration};

use dashmap::DashMap;
use metrics::histogram;
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
struct LabelStats {
    count: u64,
    total: Duration,
    max: Duration,
}

/// Aggregated timings for one label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingStats {
    pub label: String,
    pub count: u64,
    pub total_ms: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
}

impl TimingStats {
    fn from_parts(label: &str, stats: &LabelStats) -> Self {
        let total_ms = stats.total.as_secs_f64() * 1000.0;
        Self {
            label: label.to_string(),
            count: stats.count,
            total_ms,
            mean_ms: if stats.count == 0 { 0.0 } else { total_ms / stats.count as f64 },
            max_ms: stats.max.as_secs_f64() * 1000.0,
        }
    }
}

/// Per-label duration statistics.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    stats: DashMap<String, LabelStats>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one measurement under `label`
    pub fn record(&self, label: &str, elapsed: Duration) {
        histogram!("hookgate_work_duration_seconds", "label" => label.to_string()).record(elapsed.as_secs_f64());

        let mut entry = self.stats.entry(label.to_string()).or_default();
        entry.count += 1;
        entry.total += elapsed;
        entry.max = entry.max.max(elapsed);
    }

    /// Wrap `work` so that its duration is recorded under `label` when it completes.
    ///
    /// The measurement is taken whether the work succeeds or fails.
    pub async fn timed<Fut: Future>(&self, label: &str, work: Fut) -> Fut::Output {
        let start = Instant::now();
        let output = work.await;
        let elapsed = start.elapsed();
        tracing::trace!(label, elapsed_ms = elapsed.as_millis() as u64, "Timed work completed");
        self.record(label, elapsed);
        output
    }

    pub fn get(&self, label: &str) -> Option<TimingStats> {
        self.stats.get(label).map(|stats| TimingStats::from_parts(label, &stats))
    }

    /// All labels seen so far, sorted by label
    pub fn snapshot(&self) -> Vec<TimingStats> {
        let mut snapshot: Vec<TimingStats> = self
            .stats
            .iter()
            .map(|entry| TimingStats::from_parts(entry.key(), entry.value()))
            .collect();
        snapshot.sort_by(|a, b| a.label.cmp(&b.label));
        snapshot
    }

    pub fn reset(&self) {
        self.stats.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_timed_records_duration() {
        let monitor = PerformanceMonitor::new();

        let value = monitor
            .timed("sleepy", async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                42
            })
            .await;

        assert_eq!(value, 42);
        let stats = monitor.get("sleepy").expect("label should be recorded");
        assert_eq!(stats.count, 1);
        assert!(stats.total_ms >= 100.0 && stats.total_ms < 105.0, "{stats:?}");
    }

    #[tokio::test]
    async fn test_timed_records_failures_too() {
        let monitor = PerformanceMonitor::new();
        let result: Result<(), &str> = monitor.timed("failing", async { Err("boom") }).await;

        assert!(result.is_err());
        assert_eq!(monitor.get("failing").unwrap().count, 1);
    }

    #[test]
    fn test_aggregates_per_label() {
        let monitor = PerformanceMonitor::new();
        monitor.record("b", Duration::from_millis(10));
        monitor.record("a", Duration::from_millis(30));
        monitor.record("a", Duration::from_millis(10));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].label, "a");
        assert_eq!(snapshot[0].count, 2);
        assert_eq!(snapshot[0].total_ms, 40.0);
        assert_eq!(snapshot[0].mean_ms, 20.0);
        assert_eq!(snapshot[0].max_ms, 30.0);
        assert_eq!(snapshot[1].label, "b");

        monitor.reset();
        assert!(monitor.snapshot().is_empty());
        assert!(monitor.get("a").is_none());
    }

    #[tokio::test]
    async fn test_shared_across_tasks() {
        let monitor = Arc::new(PerformanceMonitor::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let monitor = monitor.clone();
                tokio::spawn(async move { monitor.timed("concurrent", async {}).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(monitor.get("concurrent").unwrap().count, 8);
    }
}
