//! The operation catalogue: names, descriptions and input schemas.

use crate::tools::{
    BuildParams, CacheStatsParams, ClearCacheParams, ConsoleParams, CopyJobParams,
    CreateJobFromDataParams, CreateJobParams, JobDetailsParams, JobNameParams, ListJobsParams,
    MetricsParams, NoParams, NodeNameParams, RenameJobParams, TriggerBuildParams,
    UpdateJobConfigParams,
};
use schemars::JsonSchema;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Every operation the gateway answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListJobs,
    GetJobDetails,
    GetBuildInfo,
    GetBuildConsole,
    GetLastBuildNumber,
    GetLastBuildTimestamp,
    TriggerBuild,
    StopBuild,
    CreateJob,
    CreateJobFromCopy,
    CreateJobFromData,
    DeleteJob,
    EnableJob,
    DisableJob,
    RenameJob,
    GetJobConfig,
    UpdateJobConfig,
    GetQueueInfo,
    ListNodes,
    GetNodeInfo,
    HealthCheck,
    GetCacheStats,
    GetMetrics,
    ClearCache,
}

impl Operation {
    pub const ALL: [Operation; 24] = [
        Operation::ListJobs,
        Operation::GetJobDetails,
        Operation::GetBuildInfo,
        Operation::GetBuildConsole,
        Operation::GetLastBuildNumber,
        Operation::GetLastBuildTimestamp,
        Operation::TriggerBuild,
        Operation::StopBuild,
        Operation::CreateJob,
        Operation::CreateJobFromCopy,
        Operation::CreateJobFromData,
        Operation::DeleteJob,
        Operation::EnableJob,
        Operation::DisableJob,
        Operation::RenameJob,
        Operation::GetJobConfig,
        Operation::UpdateJobConfig,
        Operation::GetQueueInfo,
        Operation::ListNodes,
        Operation::GetNodeInfo,
        Operation::HealthCheck,
        Operation::GetCacheStats,
        Operation::GetMetrics,
        Operation::ClearCache,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::ListJobs => "list-jobs",
            Operation::GetJobDetails => "get-job-details",
            Operation::GetBuildInfo => "get-build-info",
            Operation::GetBuildConsole => "get-build-console",
            Operation::GetLastBuildNumber => "get-last-build-number",
            Operation::GetLastBuildTimestamp => "get-last-build-timestamp",
            Operation::TriggerBuild => "trigger-build",
            Operation::StopBuild => "stop-build",
            Operation::CreateJob => "create-job",
            Operation::CreateJobFromCopy => "create-job-from-copy",
            Operation::CreateJobFromData => "create-job-from-data",
            Operation::DeleteJob => "delete-job",
            Operation::EnableJob => "enable-job",
            Operation::DisableJob => "disable-job",
            Operation::RenameJob => "rename-job",
            Operation::GetJobConfig => "get-job-config",
            Operation::UpdateJobConfig => "update-job-config",
            Operation::GetQueueInfo => "get-queue-info",
            Operation::ListNodes => "list-nodes",
            Operation::GetNodeInfo => "get-node-info",
            Operation::HealthCheck => "health-check",
            Operation::GetCacheStats => "get-cache-stats",
            Operation::GetMetrics => "get-metrics",
            Operation::ClearCache => "clear-cache",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Operation::ListJobs => "List all Jenkins jobs with optional filtering",
            Operation::GetJobDetails => {
                "Get detailed information about a Jenkins job, including its most recent builds"
            }
            Operation::GetBuildInfo => "Get information about a specific build",
            Operation::GetBuildConsole => {
                "Get console output from a build. Long logs are truncated to max_lines; \
                 set tail_only to see the end of the log"
            }
            Operation::GetLastBuildNumber => "Get the last build number for a job",
            Operation::GetLastBuildTimestamp => "Get the timestamp of the last build",
            Operation::TriggerBuild => {
                "Trigger a Jenkins job build with optional parameters, optionally waiting \
                 for it to leave the queue"
            }
            Operation::StopBuild => "Stop a running Jenkins build",
            Operation::CreateJob => "Create a new Jenkins job with XML configuration",
            Operation::CreateJobFromCopy => "Create a new job by copying an existing one",
            Operation::CreateJobFromData => {
                "Create a job from structured data (auto-generated XML)"
            }
            Operation::DeleteJob => "Delete an existing Jenkins job",
            Operation::EnableJob => "Enable a disabled Jenkins job",
            Operation::DisableJob => "Disable a Jenkins job",
            Operation::RenameJob => "Rename an existing Jenkins job",
            Operation::GetJobConfig => "Get the configuration XML for a job",
            Operation::UpdateJobConfig => "Update the configuration XML for a job",
            Operation::GetQueueInfo => "Get information about the Jenkins build queue",
            Operation::ListNodes => "List all Jenkins nodes/agents",
            Operation::GetNodeInfo => "Get information about a specific Jenkins node",
            Operation::HealthCheck => {
                "Check Jenkins server health and connection status. \
                 Useful for troubleshooting connectivity issues."
            }
            Operation::GetCacheStats => "Get cache statistics for this gateway",
            Operation::GetMetrics => {
                "Get execution metrics: per-operation statistics and recent, failed and slow calls"
            }
            Operation::ClearCache => "Clear cached Jenkins data, optionally by key prefix",
        }
    }

    /// JSON Schema of the operation's arguments.
    pub fn input_schema(self) -> Map<String, Value> {
        match self {
            Operation::ListJobs => schema::<ListJobsParams>(),
            Operation::GetJobDetails => schema::<JobDetailsParams>(),
            Operation::GetBuildInfo | Operation::StopBuild => schema::<BuildParams>(),
            Operation::GetBuildConsole => schema::<ConsoleParams>(),
            Operation::GetLastBuildNumber
            | Operation::GetLastBuildTimestamp
            | Operation::DeleteJob
            | Operation::EnableJob
            | Operation::DisableJob
            | Operation::GetJobConfig => schema::<JobNameParams>(),
            Operation::TriggerBuild => schema::<TriggerBuildParams>(),
            Operation::CreateJob => schema::<CreateJobParams>(),
            Operation::CreateJobFromCopy => schema::<CopyJobParams>(),
            Operation::CreateJobFromData => schema::<CreateJobFromDataParams>(),
            Operation::RenameJob => schema::<RenameJobParams>(),
            Operation::UpdateJobConfig => schema::<UpdateJobConfigParams>(),
            Operation::GetQueueInfo | Operation::ListNodes | Operation::HealthCheck => {
                schema::<NoParams>()
            }
            Operation::GetNodeInfo => schema::<NodeNameParams>(),
            Operation::GetCacheStats => schema::<CacheStatsParams>(),
            Operation::GetMetrics => schema::<MetricsParams>(),
            Operation::ClearCache => schema::<ClearCacheParams>(),
        }
    }
}

fn schema<T: JsonSchema>() -> Map<String, Value> {
    match serde_json::to_value(schemars::schema_for!(T)) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}
