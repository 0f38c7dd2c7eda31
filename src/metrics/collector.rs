//! Per-operation execution ledger.
//!
//! Every dispatched operation appends one [`ToolMetric`] to a bounded history and
//! folds its duration into the operation's running [`ToolStats`]. History eviction
//! is FIFO and never touches the aggregates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

fn millis(d: Duration) -> f64 {
    (d.as_secs_f64() * 100_000.0).round() / 100.0
}

/// One completed operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolMetric {
    pub operation_name: String,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub success: bool,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(millis(*d))
}

/// Lifetime aggregate for one operation name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolStats {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub total_duration: Duration,
    pub min_duration: Option<Duration>,
    pub max_duration: Duration,
}

impl ToolStats {
    fn record(&mut self, duration: Duration, success: bool) {
        self.total_calls += 1;
        if success {
            self.successful_calls += 1;
        } else {
            self.failed_calls += 1;
        }
        self.total_duration += duration;
        self.min_duration = Some(self.min_duration.map_or(duration, |min| min.min(duration)));
        self.max_duration = self.max_duration.max(duration);
    }

    /// Mean duration, computed in nanoseconds so call counts past `u32::MAX`
    /// neither wrap nor divide by zero.
    pub fn avg_duration(&self) -> Duration {
        match self.total_duration.as_nanos().checked_div(u128::from(self.total_calls)) {
            Some(nanos) => Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)),
            None => Duration::ZERO,
        }
    }

    /// Percentage of successful calls, 0 when nothing ran.
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.successful_calls as f64 / self.total_calls as f64 * 100.0
    }

    pub fn report(&self, operation_name: &str) -> ToolStatsReport {
        ToolStatsReport {
            operation_name: operation_name.to_string(),
            total_calls: self.total_calls,
            successful_calls: self.successful_calls,
            failed_calls: self.failed_calls,
            success_rate_percent: (self.success_rate() * 100.0).round() / 100.0,
            avg_duration_ms: millis(self.avg_duration()),
            min_duration_ms: millis(self.min_duration.unwrap_or_default()),
            max_duration_ms: millis(self.max_duration),
            total_duration_ms: millis(self.total_duration),
        }
    }
}

/// Serializable view of [`ToolStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolStatsReport {
    pub operation_name: String,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub success_rate_percent: f64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub total_duration_ms: f64,
}

/// Whole-process overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub uptime_seconds: f64,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub success_rate_percent: f64,
    pub avg_execution_time_ms: f64,
    pub unique_operations: usize,
    pub most_used_operation: Option<String>,
    pub slowest_operation: Option<String>,
}

struct Ledger {
    history: VecDeque<ToolMetric>,
    stats: HashMap<String, ToolStats>,
    started_at: Instant,
}

/// Bounded-history metrics ledger shared by all dispatches.
#[derive(Clone)]
pub struct MetricsCollector {
    ledger: Arc<Mutex<Ledger>>,
    capacity: usize,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl MetricsCollector {
    /// Create a collector retaining at most `capacity` raw metrics.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ledger: Arc::new(Mutex::new(Ledger {
                history: VecDeque::with_capacity(capacity),
                stats: HashMap::new(),
                started_at: Instant::now(),
            })),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record one finished operation.
    pub fn record(
        &self,
        operation_name: &str,
        duration: Duration,
        success: bool,
        error_message: Option<String>,
    ) {
        let metric = ToolMetric {
            operation_name: operation_name.to_string(),
            duration,
            success,
            error_message,
            timestamp: Utc::now(),
        };

        let mut ledger = self.lock();
        if ledger.history.len() == self.capacity {
            ledger.history.pop_front();
        }
        ledger.history.push_back(metric);
        ledger
            .stats
            .entry(operation_name.to_string())
            .or_default()
            .record(duration, success);
    }

    /// Stats for one operation.
    pub fn stats_for(&self, operation_name: &str) -> Option<ToolStats> {
        self.lock().stats.get(operation_name).cloned()
    }

    /// Reports for one operation, or all operations sorted by name.
    pub fn stats(&self, operation_name: Option<&str>) -> Vec<ToolStatsReport> {
        let ledger = self.lock();
        match operation_name {
            Some(name) => ledger
                .stats
                .get(name)
                .map(|s| vec![s.report(name)])
                .unwrap_or_default(),
            None => {
                let mut reports: Vec<ToolStatsReport> = ledger
                    .stats
                    .iter()
                    .map(|(name, s)| s.report(name))
                    .collect();
                reports.sort_by(|a, b| a.operation_name.cmp(&b.operation_name));
                reports
            }
        }
    }

    /// Newest metrics first.
    pub fn recent(&self, limit: usize) -> Vec<ToolMetric> {
        self.select(limit, |_| true)
    }

    /// Newest failures first.
    pub fn failed(&self, limit: usize) -> Vec<ToolMetric> {
        self.select(limit, |m| !m.success)
    }

    /// Newest metrics at or above `threshold` first.
    pub fn slow(&self, threshold: Duration, limit: usize) -> Vec<ToolMetric> {
        self.select(limit, |m| m.duration >= threshold)
    }

    fn select(&self, limit: usize, keep: impl Fn(&ToolMetric) -> bool) -> Vec<ToolMetric> {
        self.lock()
            .history
            .iter()
            .rev()
            .filter(|m| keep(m))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of raw metrics currently retained.
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn summary(&self) -> MetricsSummary {
        let ledger = self.lock();

        let mut total = 0u64;
        let mut successful = 0u64;
        let mut total_duration = Duration::ZERO;
        for s in ledger.stats.values() {
            total += s.total_calls;
            successful += s.successful_calls;
            total_duration += s.total_duration;
        }

        // Ties resolve to the alphabetically first name
        let most_used = ledger
            .stats
            .iter()
            .max_by(|(an, a), (bn, b)| a.total_calls.cmp(&b.total_calls).then(bn.cmp(an)))
            .map(|(name, _)| name.clone());
        let slowest = ledger
            .stats
            .iter()
            .max_by(|(an, a), (bn, b)| a.avg_duration().cmp(&b.avg_duration()).then(bn.cmp(an)))
            .map(|(name, _)| name.clone());

        let (success_rate, avg) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                successful as f64 / total as f64 * 100.0,
                millis(total_duration) / total as f64,
            )
        };

        MetricsSummary {
            uptime_seconds: ledger.started_at.elapsed().as_secs_f64(),
            total_executions: total,
            successful_executions: successful,
            failed_executions: total - successful,
            success_rate_percent: (success_rate * 100.0).round() / 100.0,
            avg_execution_time_ms: (avg * 100.0).round() / 100.0,
            unique_operations: ledger.stats.len(),
            most_used_operation: most_used,
            slowest_operation: slowest,
        }
    }

    /// Drop all history and aggregates and restart the uptime clock.
    pub fn reset(&self) {
        let mut ledger = self.lock();
        ledger.history.clear();
        ledger.stats.clear();
        ledger.started_at = Instant::now();
    }

    /// Full snapshot: summary, every operation's stats and the retained history.
    pub fn export(&self) -> Value {
        let summary = self.summary();
        let stats = self.stats(None);
        let history: Vec<ToolMetric> = self.lock().history.iter().cloned().collect();
        json!({
            "summary": summary,
            "tool_stats": stats,
            "history": history,
            "exported_at": Utc::now(),
        })
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("capacity", &self.capacity)
            .field("history_len", &self.history_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_record_updates_stats() {
        let metrics = MetricsCollector::default();
        metrics.record("list-jobs", ms(100), true, None);
        metrics.record("list-jobs", ms(300), false, Some("timeout".to_string()));

        let stats = metrics.stats_for("list-jobs").unwrap();
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.successful_calls, 1);
        assert_eq!(stats.failed_calls, 1);
        assert_eq!(stats.min_duration, Some(ms(100)));
        assert_eq!(stats.max_duration, ms(300));
        assert_eq!(stats.avg_duration(), ms(200));
        assert_eq!(stats.success_rate(), 50.0);
    }

    #[test]
    fn test_avg_duration_with_huge_call_counts() {
        let empty = ToolStats::default();
        assert_eq!(empty.avg_duration(), Duration::ZERO);

        // 2^32 calls would wrap to a zero divisor as u32
        let wrapped = ToolStats {
            total_calls: 1 << 32,
            total_duration: ms(1) * (1 << 20),
            ..Default::default()
        };
        assert_eq!(wrapped.avg_duration(), Duration::from_nanos(244));

        let uneven = ToolStats {
            total_calls: 3,
            total_duration: ms(100),
            ..Default::default()
        };
        assert_eq!(uneven.avg_duration(), Duration::from_nanos(33_333_333));
    }

    #[test]
    fn test_history_is_bounded_but_stats_are_lifetime() {
        let metrics = MetricsCollector::new(3);
        for i in 0..5 {
            metrics.record("get-build-info", ms(i), true, None);
        }

        assert_eq!(metrics.history_len(), 3);
        let recent = metrics.recent(10);
        assert_eq!(recent[0].duration, ms(4));
        assert_eq!(recent[2].duration, ms(2));
        assert_eq!(metrics.stats_for("get-build-info").unwrap().total_calls, 5);
    }

    #[test]
    fn test_failed_and_slow_filters() {
        let metrics = MetricsCollector::default();
        metrics.record("a", ms(10), true, None);
        metrics.record("b", ms(2000), false, Some("boom".to_string()));
        metrics.record("c", ms(1500), true, None);

        let failed = metrics.failed(50);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error_message.as_deref(), Some("boom"));

        let slow = metrics.slow(ms(1000), 50);
        assert_eq!(slow.len(), 2);
        assert_eq!(slow[0].operation_name, "c");
        assert_eq!(metrics.slow(ms(1000), 1).len(), 1);
    }

    #[test]
    fn test_summary() {
        let metrics = MetricsCollector::default();
        metrics.record("list-jobs", ms(10), true, None);
        metrics.record("list-jobs", ms(30), true, None);
        metrics.record("get-build-console", ms(500), false, Some("404".to_string()));

        let summary = metrics.summary();
        assert_eq!(summary.total_executions, 3);
        assert_eq!(summary.successful_executions, 2);
        assert_eq!(summary.failed_executions, 1);
        assert_eq!(summary.unique_operations, 2);
        assert_eq!(summary.most_used_operation.as_deref(), Some("list-jobs"));
        assert_eq!(summary.slowest_operation.as_deref(), Some("get-build-console"));
        assert_eq!(summary.avg_execution_time_ms, 180.0);
    }

    #[test]
    fn test_empty_summary() {
        let summary = MetricsCollector::default().summary();
        assert_eq!(summary.total_executions, 0);
        assert_eq!(summary.success_rate_percent, 0.0);
        assert!(summary.most_used_operation.is_none());
    }

    #[test]
    fn test_reset_and_export() {
        let metrics = MetricsCollector::default();
        metrics.record("health-check", ms(5), true, None);

        let export = metrics.export();
        assert_eq!(export["summary"]["total_executions"], 1);
        assert_eq!(export["tool_stats"][0]["operation_name"], "health-check");
        assert_eq!(export["history"][0]["duration_ms"], 5.0);

        metrics.reset();
        assert_eq!(metrics.history_len(), 0);
        assert!(metrics.stats(None).is_empty());
    }

    #[test]
    fn test_totals_stay_consistent_under_concurrency() {
        let metrics = MetricsCollector::new(50);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        metrics.record("list-nodes", ms(1), (i + t) % 3 != 0, None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = metrics.stats_for("list-nodes").unwrap();
        assert_eq!(stats.total_calls, 400);
        assert_eq!(stats.total_calls, stats.successful_calls + stats.failed_calls);
        assert_eq!(metrics.history_len(), 50);
    }
}
