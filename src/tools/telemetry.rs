//! Local cache and metrics inspection. Nothing here touches Jenkins.

use super::{ToolContext, ToolParams};
use crate::error::ValidationResult;
use crate::metrics::{MetricsCollector, UpstreamMetrics};
use crate::validation::{self, Args};
use schemars::JsonSchema;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Executions at least this long show up in the `slow` list.
pub const SLOW_OPERATION_THRESHOLD: Duration = Duration::from_millis(1000);

pub const DEFAULT_RECENT_METRICS: i64 = 10;
pub const MAX_RECENT_METRICS: i64 = 100;

#[derive(Debug, Clone, Default, JsonSchema)]
pub struct CacheStatsParams {
    /// Include per-entry age and expiry details
    #[schemars(default)]
    pub include_entries: bool,
}

impl ToolParams for CacheStatsParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            include_entries: validation::optional_bool(args, "include_entries", false)?,
        })
    }
}

#[derive(Debug, Clone, JsonSchema)]
pub struct MetricsParams {
    /// Only report statistics for this operation
    pub operation: Option<String>,

    /// Number of recent, failed and slow executions to list (0-100, default 10)
    #[schemars(default = "default_recent_metrics")]
    #[schemars(range(min = 0, max = 100))]
    pub recent: i64,
}

fn default_recent_metrics() -> i64 {
    DEFAULT_RECENT_METRICS
}

impl ToolParams for MetricsParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            operation: validation::optional_str(args, "operation")?,
            recent: validation::optional_clamped_int(
                args,
                "recent",
                DEFAULT_RECENT_METRICS,
                0,
                MAX_RECENT_METRICS,
            )?,
        })
    }
}

#[derive(Debug, Clone, Default, JsonSchema)]
pub struct ClearCacheParams {
    /// Only drop keys starting with this prefix (e.g. `job_details:api:`)
    pub pattern: Option<String>,
}

impl ToolParams for ClearCacheParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            pattern: validation::optional_str(args, "pattern")?,
        })
    }
}

/// Cache and metrics views.
pub struct TelemetryTools {
    ctx: Arc<ToolContext>,
    metrics: MetricsCollector,
    upstream: UpstreamMetrics,
}

impl TelemetryTools {
    pub fn new(ctx: Arc<ToolContext>, metrics: MetricsCollector, upstream: UpstreamMetrics) -> Self {
        Self {
            ctx,
            metrics,
            upstream,
        }
    }

    pub fn get_cache_stats(&self, params: CacheStatsParams) -> Value {
        let cache = self.ctx.cache();
        let mut report = json!({ "stats": cache.stats() });
        if params.include_entries {
            report["entries"] = json!(cache.entries());
        }
        report
    }

    pub fn get_metrics(&self, params: MetricsParams) -> Value {
        let limit = params.recent as usize;
        json!({
            "summary": self.metrics.summary(),
            "stats": self.metrics.stats(params.operation.as_deref()),
            "recent": self.metrics.recent(limit),
            "failed": self.metrics.failed(limit),
            "slow": self.metrics.slow(SLOW_OPERATION_THRESHOLD, limit),
            "upstream": self.upstream.summary(),
        })
    }

    pub fn clear_cache(&self, params: ClearCacheParams) -> Value {
        let cache = self.ctx.cache();
        let removed = match params.pattern.as_deref() {
            Some(prefix) => cache.invalidate_pattern(prefix),
            None => cache.clear(),
        };
        tracing::info!(removed, pattern = ?params.pattern, "Cleared cache");

        json!({
            "removed": removed,
            "pattern": params.pattern,
        })
    }
}
