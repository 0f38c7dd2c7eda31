//! Job tools.
//!
//! Listing and inspection are cached reads; every other operation mutates the
//! job on the server and invalidates the cache entries derived from it.

use super::{ToolContext, ToolParams};
use crate::cache::keys;
use crate::config_xml;
use crate::error::{UpstreamResult, ValidationResult};
use crate::models::BuildInfo;
use crate::validation::{self, Args};
use schemars::JsonSchema;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Default number of recent builds included in job details.
pub const DEFAULT_RECENT_BUILDS: i64 = 3;

/// Upper bound on recent builds fetched per job details request.
pub const MAX_RECENT_BUILDS: i64 = 10;

fn default_recent_builds() -> i64 {
    DEFAULT_RECENT_BUILDS
}

fn default_root_tag() -> String {
    "project".to_string()
}

/// Parameters for `list-jobs`.
#[derive(Debug, Clone, Default, JsonSchema)]
pub struct ListJobsParams {
    /// Case-insensitive substring the job name must contain, stored lowercased
    pub filter: Option<String>,
}

impl ToolParams for ListJobsParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            filter: validation::optional_str(args, "filter")?.map(|f| f.to_lowercase()),
        })
    }
}

/// Parameters naming a single job.
#[derive(Debug, Clone, JsonSchema)]
pub struct JobNameParams {
    /// Job name; use `folder/job` for jobs inside folders
    pub job_name: String,
}

impl ToolParams for JobNameParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            job_name: validation::job_name(args, "job_name")?,
        })
    }
}

/// Parameters for `get-job-details`.
#[derive(Debug, Clone, JsonSchema)]
pub struct JobDetailsParams {
    /// Job name; use `folder/job` for jobs inside folders
    pub job_name: String,

    /// Number of recent builds to include (0-10)
    #[schemars(default = "default_recent_builds")]
    #[schemars(range(min = 0, max = 10))]
    pub max_recent_builds: i64,
}

impl ToolParams for JobDetailsParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            job_name: validation::job_name(args, "job_name")?,
            max_recent_builds: validation::optional_clamped_int(
                args,
                "max_recent_builds",
                DEFAULT_RECENT_BUILDS,
                0,
                MAX_RECENT_BUILDS,
            )?,
        })
    }
}

/// Parameters for `create-job`.
#[derive(Debug, Clone, JsonSchema)]
pub struct CreateJobParams {
    /// Name of the new job
    pub job_name: String,

    /// Complete `config.xml` document
    pub config_xml: String,
}

impl ToolParams for CreateJobParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            job_name: validation::job_name(args, "job_name")?,
            config_xml: validation::required_xml(args, "config_xml")?,
        })
    }
}

/// Parameters for `create-job-from-copy`.
#[derive(Debug, Clone, JsonSchema)]
pub struct CopyJobParams {
    /// Name of the new job
    pub new_job_name: String,

    /// Existing job whose configuration is copied
    pub source_job_name: String,
}

impl ToolParams for CopyJobParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            new_job_name: validation::job_name(args, "new_job_name")?,
            source_job_name: validation::job_name(args, "source_job_name")?,
        })
    }
}

/// Parameters for `create-job-from-data`.
#[derive(Debug, Clone, JsonSchema)]
pub struct CreateJobFromDataParams {
    /// Name of the new job
    pub job_name: String,

    /// Configuration as a JSON object; nested objects become elements and
    /// arrays become repeated `<item>` elements
    pub config_data: Map<String, Value>,

    /// Root element of the generated document
    #[schemars(default = "default_root_tag")]
    pub root_tag: String,

    /// Generated document
    #[schemars(skip)]
    pub config_xml: String,
}

impl ToolParams for CreateJobFromDataParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        let job_name = validation::job_name(args, "job_name")?;
        let config_data = validation::required_object(args, "config_data")?;
        let root_tag = validation::element_name(args, "root_tag", "project")?;
        let config_xml = config_xml::from_json(&root_tag, &config_data)
            .map_err(|reason| crate::error::ValidationError::new("config_data", reason))?;

        Ok(Self {
            job_name,
            config_data,
            root_tag,
            config_xml,
        })
    }
}

/// Parameters for `rename-job`.
#[derive(Debug, Clone, JsonSchema)]
pub struct RenameJobParams {
    /// Current job name
    pub job_name: String,

    /// New name, within the same folder
    pub new_name: String,
}

impl ToolParams for RenameJobParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            job_name: validation::job_name(args, "job_name")?,
            new_name: validation::required_str(args, "new_name")?,
        })
    }
}

/// Parameters for `update-job-config`.
#[derive(Debug, Clone, JsonSchema)]
pub struct UpdateJobConfigParams {
    /// Job name; use `folder/job` for jobs inside folders
    pub job_name: String,

    /// Replacement `config.xml` document
    pub config_xml: String,
}

impl ToolParams for UpdateJobConfigParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            job_name: validation::job_name(args, "job_name")?,
            config_xml: validation::required_xml(args, "config_xml")?,
        })
    }
}

/// Full name a job gets after `rename-job`: renames stay inside the job's folder.
fn renamed_full_name(job_name: &str, new_name: &str) -> String {
    if new_name.contains('/') {
        return new_name.to_string();
    }
    match job_name.trim_matches('/').rsplit_once('/') {
        Some((folder, _)) => format!("{}/{}", folder, new_name),
        None => new_name.to_string(),
    }
}

fn build_summary(build: &BuildInfo) -> Value {
    json!({
        "number": build.number,
        "result": build.result,
        "timestamp": build.timestamp,
        "duration_seconds": build.duration_seconds(),
    })
}

/// Job listing, inspection and management tools.
pub struct JobTools {
    ctx: Arc<ToolContext>,
}

impl JobTools {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    /// List all jobs, optionally filtered by a case-insensitive name substring.
    pub async fn list_jobs(&self, params: ListJobsParams) -> UpstreamResult<Value> {
        let ctx = &self.ctx;
        let key = keys::jobs_list(params.filter.as_deref());

        ctx.cached(&key, ctx.config().cache_ttl(), || async {
            let jobs = ctx.client().await?.list_jobs().await?;
            let listed: Vec<Value> = jobs
                .iter()
                .filter(|job| match params.filter.as_deref() {
                    Some(needle) => job.qualified_name().to_lowercase().contains(needle),
                    None => true,
                })
                .map(|job| {
                    json!({
                        "name": job.qualified_name(),
                        "url": job.url,
                        "status": job.color.as_deref().unwrap_or("unknown"),
                    })
                })
                .collect();

            Ok(json!({
                "count": listed.len(),
                "filter": params.filter,
                "jobs": listed,
            }))
        })
        .await
    }

    /// Job details plus a summary of its most recent builds.
    ///
    /// Recent builds are fetched concurrently; a build that cannot be fetched
    /// is logged and left out.
    pub async fn get_job_details(&self, params: JobDetailsParams) -> UpstreamResult<Value> {
        let ctx = &self.ctx;
        let job = params.job_name.as_str();
        let key = keys::job_details(job, params.max_recent_builds);

        ctx.cached(&key, ctx.config().cache_short_ttl(), || async {
            let client = ctx.client().await?;
            let info = client.get_job_info(job).await?;

            let numbers = info.recent_build_numbers(params.max_recent_builds as usize);
            tracing::debug!(job, count = numbers.len(), "Fetching recent builds");
            let fetches = numbers.iter().map(|&number| {
                let client = client.clone();
                async move { (number, client.get_build_info(job, number).await) }
            });

            let recent: Vec<Value> = futures::future::join_all(fetches)
                .await
                .into_iter()
                .filter_map(|(number, result)| match result {
                    Ok(build) => Some(build_summary(&build)),
                    Err(e) => {
                        tracing::warn!(job, number, error = %e, "Could not fetch build");
                        None
                    }
                })
                .collect();

            Ok(json!({
                "name": info.name,
                "fullName": info.full_name,
                "url": info.url,
                "description": info.description.unwrap_or_default(),
                "buildable": info.buildable,
                "color": info.color,
                "lastBuild": info.last_build,
                "lastSuccessfulBuild": info.last_successful_build,
                "lastFailedBuild": info.last_failed_build,
                "recentBuildsCount": recent.len(),
                "recentBuilds": recent,
            }))
        })
        .await
    }

    /// Number of the latest build, or `null` if the job never ran.
    pub async fn get_last_build_number(&self, params: JobNameParams) -> UpstreamResult<Value> {
        let ctx = &self.ctx;
        let job = params.job_name.as_str();

        ctx.cached(
            &keys::last_build_number(job),
            ctx.config().cache_short_ttl(),
            || async {
                let info = ctx.client().await?.get_job_info(job).await?;
                Ok(json!({
                    "job_name": job,
                    "last_build_number": info.latest_build_number(),
                }))
            },
        )
        .await
    }

    /// Start time (epoch ms) of the latest build, or `null` if the job never ran.
    pub async fn get_last_build_timestamp(&self, params: JobNameParams) -> UpstreamResult<Value> {
        let ctx = &self.ctx;
        let job = params.job_name.as_str();

        ctx.cached(
            &keys::last_build_timestamp(job),
            ctx.config().cache_short_ttl(),
            || async {
                let client = ctx.client().await?;
                let number = client.get_job_info(job).await?.latest_build_number();
                let timestamp = match number {
                    Some(number) => Some(client.get_build_info(job, number).await?.timestamp),
                    None => None,
                };
                Ok(json!({
                    "job_name": job,
                    "build_number": number,
                    "timestamp": timestamp,
                }))
            },
        )
        .await
    }

    pub async fn create_job(&self, params: CreateJobParams) -> UpstreamResult<Value> {
        self.ctx
            .client()
            .await?
            .create_job(&params.job_name, &params.config_xml)
            .await?;
        self.ctx.invalidate(&[keys::all_jobs_lists()]);
        tracing::info!(job = %params.job_name, "Created job");

        Ok(json!({"job_name": params.job_name, "created": true}))
    }

    /// Copy a job's configuration under a new name. References to the source
    /// job's own name inside the configuration are pointed at the copy.
    pub async fn create_job_from_copy(&self, params: CopyJobParams) -> UpstreamResult<Value> {
        let client = self.ctx.client().await?;
        let source_xml = client.get_job_config(&params.source_job_name).await?;
        let config = config_xml::rewrite_job_references(
            &source_xml,
            &params.source_job_name,
            &params.new_job_name,
        );

        client.create_job(&params.new_job_name, &config).await?;
        self.ctx.invalidate(&[keys::all_jobs_lists()]);
        tracing::info!(
            job = %params.new_job_name,
            source = %params.source_job_name,
            "Created job from copy"
        );

        Ok(json!({
            "job_name": params.new_job_name,
            "source_job_name": params.source_job_name,
            "created": true,
        }))
    }

    pub async fn create_job_from_data(
        &self,
        params: CreateJobFromDataParams,
    ) -> UpstreamResult<Value> {
        self.ctx
            .client()
            .await?
            .create_job(&params.job_name, &params.config_xml)
            .await?;
        self.ctx.invalidate(&[keys::all_jobs_lists()]);
        tracing::info!(
            job = %params.job_name,
            root_tag = %params.root_tag,
            "Created job from data"
        );

        Ok(json!({
            "job_name": params.job_name,
            "root_tag": params.root_tag,
            "created": true,
        }))
    }

    pub async fn delete_job(&self, params: JobNameParams) -> UpstreamResult<Value> {
        self.ctx
            .client()
            .await?
            .delete_job(&params.job_name)
            .await?;
        self.ctx.invalidate(&keys::whole_job(&params.job_name));
        tracing::info!(job = %params.job_name, "Deleted job");

        Ok(json!({"job_name": params.job_name, "deleted": true}))
    }

    pub async fn enable_job(&self, params: JobNameParams) -> UpstreamResult<Value> {
        self.ctx
            .client()
            .await?
            .enable_job(&params.job_name)
            .await?;
        self.ctx.invalidate(&keys::job_state(&params.job_name));

        Ok(json!({"job_name": params.job_name, "enabled": true}))
    }

    pub async fn disable_job(&self, params: JobNameParams) -> UpstreamResult<Value> {
        self.ctx
            .client()
            .await?
            .disable_job(&params.job_name)
            .await?;
        self.ctx.invalidate(&keys::job_state(&params.job_name));

        Ok(json!({"job_name": params.job_name, "enabled": false}))
    }

    pub async fn rename_job(&self, params: RenameJobParams) -> UpstreamResult<Value> {
        self.ctx
            .client()
            .await?
            .rename_job(&params.job_name, &params.new_name)
            .await?;

        let new_full_name = renamed_full_name(&params.job_name, &params.new_name);
        let mut stale = keys::whole_job(&params.job_name);
        stale.extend(keys::whole_job(&new_full_name));
        self.ctx.invalidate(&stale);
        tracing::info!(job = %params.job_name, new_name = %new_full_name, "Renamed job");

        Ok(json!({"job_name": params.job_name, "new_name": new_full_name}))
    }

    pub async fn get_job_config(&self, params: JobNameParams) -> UpstreamResult<Value> {
        let ctx = &self.ctx;
        let job = params.job_name.as_str();

        ctx.cached(&keys::job_config(job), ctx.config().cache_ttl(), || async {
            let config_xml = ctx.client().await?.get_job_config(job).await?;
            Ok(json!({"job_name": job, "config_xml": config_xml}))
        })
        .await
    }

    pub async fn update_job_config(&self, params: UpdateJobConfigParams) -> UpstreamResult<Value> {
        self.ctx
            .client()
            .await?
            .update_job_config(&params.job_name, &params.config_xml)
            .await?;
        self.ctx.invalidate(&keys::job_configuration(&params.job_name));
        tracing::info!(job = %params.job_name, "Updated job configuration");

        Ok(json!({"job_name": params.job_name, "updated": true}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Args {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_renamed_full_name_stays_in_folder() {
        assert_eq!(renamed_full_name("api", "api-v2"), "api-v2");
        assert_eq!(renamed_full_name("team/api", "api-v2"), "team/api-v2");
        assert_eq!(renamed_full_name("team/api", "other/api"), "other/api");
    }

    #[test]
    fn test_job_details_params_clamp() {
        let params =
            JobDetailsParams::from_args(&args(json!({"job_name": "api", "max_recent_builds": 50})))
                .unwrap();
        assert_eq!(params.max_recent_builds, MAX_RECENT_BUILDS);

        let params = JobDetailsParams::from_args(&args(json!({"job_name": "api"}))).unwrap();
        assert_eq!(params.max_recent_builds, DEFAULT_RECENT_BUILDS);

        let err = JobDetailsParams::from_args(&args(json!({
            "job_name": "api",
            "max_recent_builds": "many"
        })))
        .unwrap_err();
        assert_eq!(err.field, "max_recent_builds");
    }

    #[test]
    fn test_create_job_from_data_generates_xml() {
        let params = CreateJobFromDataParams::from_args(&args(json!({
            "job_name": "nightly",
            "config_data": {"description": "Nightly build", "disabled": false},
            "root_tag": "flow-definition"
        })))
        .unwrap();

        assert!(params.config_xml.starts_with("<flow-definition>"));
        assert!(params.config_xml.contains("<description>Nightly build</description>"));
    }

    #[test]
    fn test_create_job_from_data_rejects_bad_keys() {
        let err = CreateJobFromDataParams::from_args(&args(json!({
            "job_name": "nightly",
            "config_data": {"bad key": 1}
        })))
        .unwrap_err();
        assert_eq!(err.field, "config_data");
    }

    #[test]
    fn test_create_job_rejects_malformed_xml() {
        let err = CreateJobParams::from_args(&args(json!({
            "job_name": "api",
            "config_xml": "<project><builders></project>"
        })))
        .unwrap_err();
        assert_eq!(err.field, "config_xml");
    }
}
