//! Operation dispatch.
//!
//! [`ToolDispatcher::dispatch`] is the single entry point for every request:
//! it resolves the operation name, validates the arguments into the typed
//! parameter struct, runs the handler and records exactly one metric, whatever
//! the outcome.

pub mod operation;

pub use operation::Operation;

use crate::cache::CacheManager;
use crate::config::Config;
use crate::connection::ConnectionCache;
use crate::error::{ServerIdentity, ToolError, UpstreamError};
use crate::metrics::{MetricsCollector, UpstreamMetrics};
use crate::tools::{BuildTools, JobTools, SystemTools, TelemetryTools, ToolContext, ToolParams};
use crate::validation::Args;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Metrics bucket shared by every name that is not an operation.
pub const UNKNOWN_OPERATION: &str = "unknown";

/// Routes operation names to their handlers.
pub struct ToolDispatcher {
    ctx: Arc<ToolContext>,
    jobs: JobTools,
    builds: BuildTools,
    system: SystemTools,
    telemetry: TelemetryTools,
    metrics: MetricsCollector,
    identity: ServerIdentity,
}

impl ToolDispatcher {
    pub fn new(
        connection: Arc<ConnectionCache>,
        cache: CacheManager<Value>,
        config: Arc<Config>,
        metrics: MetricsCollector,
        upstream: UpstreamMetrics,
    ) -> Self {
        let identity = config.identity();
        let ctx = Arc::new(ToolContext::new(connection, cache, config));

        Self {
            jobs: JobTools::new(ctx.clone()),
            builds: BuildTools::new(ctx.clone()),
            system: SystemTools::new(ctx.clone()),
            telemetry: TelemetryTools::new(ctx.clone(), metrics.clone(), upstream),
            ctx,
            metrics,
            identity,
        }
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn cache(&self) -> &CacheManager<Value> {
        self.ctx.cache()
    }

    pub fn connection(&self) -> &ConnectionCache {
        self.ctx.connection()
    }

    /// Run the operation `name` with `args`.
    pub async fn dispatch(&self, name: &str, args: &Args) -> Result<Value, ToolError> {
        let start = Instant::now();

        let (bucket, result) = match name.parse::<Operation>() {
            Ok(op) => (
                op.as_str(),
                AssertUnwindSafe(self.execute(op, args))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(ToolError::internal(name, "operation panicked"))),
            ),
            Err(_) => (UNKNOWN_OPERATION, Err(ToolError::unknown_operation(name))),
        };

        let elapsed = start.elapsed();
        let duration_ms = elapsed.as_millis() as u64;
        match &result {
            Ok(_) => {
                self.metrics.record(bucket, elapsed, true, None);
                tracing::info!(operation = name, duration_ms, "Operation completed");
            }
            Err(err) => {
                self.metrics
                    .record(bucket, elapsed, false, Some(err.message.clone()));
                tracing::warn!(
                    operation = name,
                    duration_ms,
                    kind = ?err.kind,
                    error = %err.message,
                    "Operation failed"
                );
            }
        }

        result
    }

    async fn execute(&self, op: Operation, args: &Args) -> Result<Value, ToolError> {
        let name = op.as_str();
        let outcome = match op {
            Operation::ListJobs => self.jobs.list_jobs(parse(op, args)?).await,
            Operation::GetJobDetails => self.jobs.get_job_details(parse(op, args)?).await,
            Operation::GetLastBuildNumber => {
                self.jobs.get_last_build_number(parse(op, args)?).await
            }
            Operation::GetLastBuildTimestamp => {
                self.jobs.get_last_build_timestamp(parse(op, args)?).await
            }
            Operation::CreateJob => self.jobs.create_job(parse(op, args)?).await,
            Operation::CreateJobFromCopy => self.jobs.create_job_from_copy(parse(op, args)?).await,
            Operation::CreateJobFromData => self.jobs.create_job_from_data(parse(op, args)?).await,
            Operation::DeleteJob => self.jobs.delete_job(parse(op, args)?).await,
            Operation::EnableJob => self.jobs.enable_job(parse(op, args)?).await,
            Operation::DisableJob => self.jobs.disable_job(parse(op, args)?).await,
            Operation::RenameJob => self.jobs.rename_job(parse(op, args)?).await,
            Operation::GetJobConfig => self.jobs.get_job_config(parse(op, args)?).await,
            Operation::UpdateJobConfig => self.jobs.update_job_config(parse(op, args)?).await,

            Operation::GetBuildInfo => self.builds.get_build_info(parse(op, args)?).await,
            Operation::GetBuildConsole => self.builds.get_build_console(parse(op, args)?).await,
            Operation::TriggerBuild => self.builds.trigger_build(parse(op, args)?).await,
            Operation::StopBuild => self.builds.stop_build(parse(op, args)?).await,

            Operation::GetQueueInfo => self.system.get_queue_info().await,
            Operation::ListNodes => self.system.list_nodes().await,
            Operation::GetNodeInfo => self.system.get_node_info(parse(op, args)?).await,
            Operation::HealthCheck => {
                let report = self.system.health_check().await;
                return serde_json::to_value(report)
                    .map_err(|e| ToolError::internal(name, e.to_string()));
            }

            Operation::GetCacheStats => Ok(self.telemetry.get_cache_stats(parse(op, args)?)),
            Operation::GetMetrics => Ok(self.telemetry.get_metrics(parse(op, args)?)),
            Operation::ClearCache => Ok(self.telemetry.clear_cache(parse(op, args)?)),
        };

        outcome.map_err(|err: UpstreamError| ToolError::upstream(name, &err, &self.identity))
    }
}

fn parse<P: ToolParams>(op: Operation, args: &Args) -> Result<P, ToolError> {
    P::from_args(args).map_err(|err| ToolError::validation(op.as_str(), &err))
}
