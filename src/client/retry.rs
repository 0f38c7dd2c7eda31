//! Retry policy for upstream calls.
//!
//! Each adapter call is classified by [`CallKind`]. Reads are retried on any
//! transient failure; writes only when repeating them cannot duplicate an effect
//! on the server. Delays grow exponentially from the configured base delay.

use crate::client::AsyncJenkinsClient;
use crate::config::Config;
use crate::error::{UpstreamError, UpstreamResult};
use crate::metrics::UpstreamMetrics;
use crate::models::*;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for a single backoff delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// How safe it is to repeat a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// No server-side effect
    Read,

    /// Repeating yields the same end state (enable, disable, config update)
    IdempotentWrite,

    /// Repeating may duplicate the effect (trigger, create, delete, ...)
    NonIdempotentWrite,
}

impl CallKind {
    /// Whether `error` is worth another attempt for this kind of call.
    ///
    /// Authentication, permission and not-found failures are never retried.
    /// Non-idempotent writes are only retried when the request provably never
    /// reached the server.
    pub fn should_retry(self, error: &UpstreamError) -> bool {
        match (self, error) {
            (_, UpstreamError::ConnectionFailure { .. }) => true,
            (CallKind::Read | CallKind::IdempotentWrite, UpstreamError::Timeout { .. }) => true,
            (CallKind::Read, UpstreamError::RemoteFault { status, .. }) => {
                status.map_or(true, |code| code >= 500)
            }
            _ => false,
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: MAX_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: MAX_RETRY_DELAY,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt + 1`: `base * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(
        &self,
        kind: CallKind,
        operation: &str,
        metrics: &UpstreamMetrics,
        mut call: F,
    ) -> UpstreamResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = UpstreamResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && kind.should_retry(&err) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Upstream call failed, retrying"
                    );
                    metrics.record_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Applies a [`RetryPolicy`] to every call of an inner adapter.
#[derive(Clone)]
pub struct RetryingClient {
    inner: Arc<dyn AsyncJenkinsClient>,
    policy: RetryPolicy,
    metrics: UpstreamMetrics,
}

impl RetryingClient {
    pub fn new(
        inner: Arc<dyn AsyncJenkinsClient>,
        policy: RetryPolicy,
        metrics: UpstreamMetrics,
    ) -> Self {
        Self {
            inner,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl AsyncJenkinsClient for RetryingClient {
    async fn whoami(&self) -> UpstreamResult<ServerStatus> {
        self.policy
            .run(CallKind::Read, "whoami", &self.metrics, move || self.inner.whoami())
            .await
    }

    async fn list_jobs(&self) -> UpstreamResult<Vec<JobSummary>> {
        self.policy
            .run(CallKind::Read, "list_jobs", &self.metrics, move || {
                self.inner.list_jobs()
            })
            .await
    }

    async fn get_job_info(&self, job: &str) -> UpstreamResult<JobInfo> {
        self.policy
            .run(CallKind::Read, "get_job_info", &self.metrics, move || {
                self.inner.get_job_info(job)
            })
            .await
    }

    async fn create_job(&self, job: &str, config_xml: &str) -> UpstreamResult<()> {
        self.policy
            .run(CallKind::NonIdempotentWrite, "create_job", &self.metrics, move || {
                self.inner.create_job(job, config_xml)
            })
            .await
    }

    async fn delete_job(&self, job: &str) -> UpstreamResult<()> {
        self.policy
            .run(CallKind::NonIdempotentWrite, "delete_job", &self.metrics, move || {
                self.inner.delete_job(job)
            })
            .await
    }

    async fn enable_job(&self, job: &str) -> UpstreamResult<()> {
        self.policy
            .run(CallKind::IdempotentWrite, "enable_job", &self.metrics, move || {
                self.inner.enable_job(job)
            })
            .await
    }

    async fn disable_job(&self, job: &str) -> UpstreamResult<()> {
        self.policy
            .run(CallKind::IdempotentWrite, "disable_job", &self.metrics, move || {
                self.inner.disable_job(job)
            })
            .await
    }

    async fn rename_job(&self, job: &str, new_name: &str) -> UpstreamResult<()> {
        self.policy
            .run(CallKind::NonIdempotentWrite, "rename_job", &self.metrics, move || {
                self.inner.rename_job(job, new_name)
            })
            .await
    }

    async fn get_job_config(&self, job: &str) -> UpstreamResult<String> {
        self.policy
            .run(CallKind::Read, "get_job_config", &self.metrics, move || {
                self.inner.get_job_config(job)
            })
            .await
    }

    async fn update_job_config(&self, job: &str, config_xml: &str) -> UpstreamResult<()> {
        self.policy
            .run(
                CallKind::IdempotentWrite,
                "update_job_config",
                &self.metrics,
                move || self.inner.update_job_config(job, config_xml),
            )
            .await
    }

    async fn get_build_info(&self, job: &str, number: u64) -> UpstreamResult<BuildInfo> {
        self.policy
            .run(CallKind::Read, "get_build_info", &self.metrics, move || {
                self.inner.get_build_info(job, number)
            })
            .await
    }

    async fn get_console_text(&self, job: &str, number: u64) -> UpstreamResult<String> {
        self.policy
            .run(CallKind::Read, "get_console_text", &self.metrics, move || {
                self.inner.get_console_text(job, number)
            })
            .await
    }

    async fn trigger_build(
        &self,
        job: &str,
        parameters: Option<&Map<String, Value>>,
    ) -> UpstreamResult<QueuedBuild> {
        self.policy
            .run(
                CallKind::NonIdempotentWrite,
                "trigger_build",
                &self.metrics,
                move || self.inner.trigger_build(job, parameters),
            )
            .await
    }

    async fn stop_build(&self, job: &str, number: u64) -> UpstreamResult<()> {
        self.policy
            .run(CallKind::NonIdempotentWrite, "stop_build", &self.metrics, move || {
                self.inner.stop_build(job, number)
            })
            .await
    }

    async fn get_queue(&self) -> UpstreamResult<Vec<QueueItem>> {
        self.policy
            .run(CallKind::Read, "get_queue", &self.metrics, move || {
                self.inner.get_queue()
            })
            .await
    }

    async fn get_queue_item(&self, id: u64) -> UpstreamResult<QueueItem> {
        self.policy
            .run(CallKind::Read, "get_queue_item", &self.metrics, move || {
                self.inner.get_queue_item(id)
            })
            .await
    }

    async fn list_nodes(&self) -> UpstreamResult<Vec<NodeInfo>> {
        self.policy
            .run(CallKind::Read, "list_nodes", &self.metrics, move || {
                self.inner.list_nodes()
            })
            .await
    }

    async fn get_node_info(&self, node: &str) -> UpstreamResult<NodeInfo> {
        self.policy
            .run(CallKind::Read, "get_node_info", &self.metrics, move || {
                self.inner.get_node_info(node)
            })
            .await
    }
}
