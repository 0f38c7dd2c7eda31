//! Operation handlers for the Jenkins gateway.
//!
//! This module provides four categories of tools:
//! - **Jobs**: list, inspect, create, copy, delete, enable/disable, rename, configure
//! - **Builds**: build details, console output, trigger and stop
//! - **System**: queue, nodes and health check
//! - **Telemetry**: cache and metrics inspection
//!
//! Handlers receive already validated parameters. Cacheable reads go through
//! [`ToolContext::cached`]; mutations invalidate the affected keys on success.

pub mod builds;
pub mod jobs;
pub mod system;
pub mod telemetry;

pub use builds::{BuildParams, BuildTools, ConsoleParams, TriggerBuildParams};
pub use jobs::{
    CopyJobParams, CreateJobFromDataParams, CreateJobParams, JobDetailsParams, JobNameParams,
    JobTools, ListJobsParams, RenameJobParams, UpdateJobConfigParams,
};
pub use system::{HealthReport, NodeNameParams, SystemTools};
pub use telemetry::{CacheStatsParams, ClearCacheParams, MetricsParams, TelemetryTools};

use crate::cache::{CacheManager, Stale};
use crate::client::AsyncJenkinsClient;
use crate::config::Config;
use crate::connection::ConnectionCache;
use crate::error::{UpstreamResult, ValidationResult};
use crate::validation::Args;
use schemars::JsonSchema;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Typed parameters for one operation, extracted from the raw argument map.
pub trait ToolParams: Sized + JsonSchema {
    fn from_args(args: &Args) -> ValidationResult<Self>;
}

/// Parameters for operations that take no arguments.
#[derive(Debug, Clone, Default, JsonSchema)]
pub struct NoParams {}

impl ToolParams for NoParams {
    fn from_args(_args: &Args) -> ValidationResult<Self> {
        Ok(Self {})
    }
}

/// State shared by all handlers.
pub struct ToolContext {
    connection: Arc<ConnectionCache>,
    cache: CacheManager<Value>,
    config: Arc<Config>,
}

impl ToolContext {
    pub fn new(
        connection: Arc<ConnectionCache>,
        cache: CacheManager<Value>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            connection,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &CacheManager<Value> {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connection(&self) -> &ConnectionCache {
        &self.connection
    }

    /// The shared upstream adapter, connecting on first use.
    pub async fn client(&self) -> UpstreamResult<Arc<dyn AsyncJenkinsClient>> {
        self.connection.get_client().await
    }

    /// Serve `key` from the cache or populate it with `fetch`.
    pub async fn cached<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> UpstreamResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = UpstreamResult<Value>>,
    {
        self.cached_with(key, move || async move {
            fetch().await.map(|value| (value, ttl))
        })
        .await
    }

    /// Like [`cached`](Self::cached), but `fetch` chooses the TTL from the value.
    pub async fn cached_with<F, Fut>(&self, key: &str, fetch: F) -> UpstreamResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = UpstreamResult<(Value, Duration)>>,
    {
        let mut fetched = false;
        let result = self
            .cache
            .get_or_fetch_with(key, || {
                fetched = true;
                fetch()
            })
            .await;
        tracing::debug!(key, cache_hit = !fetched && result.is_ok(), "Cache lookup");
        result
    }

    /// Drop stale entries after a successful mutation.
    pub fn invalidate(&self, stale: &[Stale]) -> usize {
        let removed: usize = stale.iter().map(|s| s.apply(&self.cache)).sum();
        if removed > 0 {
            tracing::debug!(removed, "Invalidated cache entries");
        }
        removed
    }
}
