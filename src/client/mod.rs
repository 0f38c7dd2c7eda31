//! HTTP client for the Jenkins REST API.
//!
//! [`JenkinsClient`] is synchronous (`ureq`) and performs exactly one attempt per
//! call, including the primary/raw fallback for reads. [`AsyncJenkinsClientImpl`]
//! moves it onto the blocking pool and [`RetryingClient`] layers the retry policy
//! on top of any [`AsyncJenkinsClient`].

mod async_wrapper;
mod fallback;
pub mod retry;

pub use async_wrapper::{AsyncJenkinsClient, AsyncJenkinsClientImpl};
pub use retry::{CallKind, RetryPolicy, RetryingClient};

use crate::config::Config;
use crate::error::{ErrorContext, UpstreamError, UpstreamResult};
use crate::metrics::{HttpTimer, UpstreamMetrics};
use crate::models::build::BUILD_TREE;
use crate::models::job::{JOBS_TREE, JOB_TREE};
use crate::models::node::{node_path_segment, NODE_FIELDS};
use crate::models::queue::{QUEUE_ITEM_TREE, QUEUE_TREE};
use crate::models::*;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

static QUEUE_LOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/queue/item/(\d+)").expect("valid queue location regex"));

/// Longest error body excerpt kept in error details.
const ERROR_BODY_LIMIT: usize = 200;

/// Translate a job name into its URL path. Folder jobs (`team/api`) map to
/// nested `job/` segments.
pub fn job_path(job: &str) -> String {
    job.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| format!("/job/{}", urlencoding::encode(segment)))
        .collect()
}

/// Split `team/api` into (`/job/team`, `api`). Top-level jobs have an empty parent path.
fn split_parent(job: &str) -> (String, &str) {
    let trimmed = job.trim_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, leaf)) => (job_path(parent), leaf),
        None => (String::new(), trimmed),
    }
}

/// Extract the queue item id from a trigger response `Location` header.
pub fn parse_queue_id(location: &str) -> Option<u64> {
    QUEUE_LOCATION
        .captures(location)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Render a JSON parameter value as a query string value.
fn parameter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_LIMIT {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(ERROR_BODY_LIMIT).collect();
        format!("{}...", cut)
    }
}

/// HTTP client for a single Jenkins server.
#[derive(Clone)]
pub struct JenkinsClient {
    /// Base URL, e.g. `https://ci.example.com`
    base_url: String,

    /// Precomputed `Authorization: Basic` header value
    auth_header: String,

    /// HTTP client agent
    agent: Arc<ureq::Agent>,

    /// Traffic counters
    metrics: UpstreamMetrics,
}

impl JenkinsClient {
    /// Create a new JenkinsClient from configuration.
    pub fn new(config: &Config, metrics: UpstreamMetrics) -> Self {
        if !config.verify_ssl {
            tracing::warn!(
                "JENKINS_VERIFY_SSL=false is not supported; certificates are still verified"
            );
        }

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout())
            .timeout_read(config.read_timeout())
            .timeout(config.request_timeout())
            .build();

        Self {
            base_url: config.jenkins_url.clone(),
            auth_header: basic_auth(&config.username, &config.api_token),
            agent: Arc::new(agent),
            metrics,
        }
    }

    /// Create a JenkinsClient with a custom base URL (useful for testing).
    #[doc(hidden)]
    pub fn with_base_url(base_url: String, username: &str, api_token: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();

        Self {
            base_url,
            auth_header: basic_auth(username, api_token),
            agent: Arc::new(agent),
            metrics: UpstreamMetrics::new(),
        }
    }

    /// Get a reference to the traffic counters.
    pub fn metrics(&self) -> &UpstreamMetrics {
        &self.metrics
    }

    /// Build a full URL from a path.
    fn build_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Execute one authenticated request.
    fn send(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&str>,
        context: &ErrorContext,
    ) -> UpstreamResult<ureq::Response> {
        let timer = HttpTimer::new(self.metrics.clone());
        let url = self.build_url(path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .agent
            .request(method, &url)
            .set("Authorization", &self.auth_header);
        for (name, value) in query {
            request = request.query(name, value);
        }

        let result = match body {
            Some(xml) => request
                .set("Content-Type", "application/xml; charset=utf-8")
                .send_string(xml),
            None => request.call(),
        };

        match result {
            Ok(response) => {
                timer.complete();
                Ok(response)
            }
            Err(e) => {
                timer.complete_with_error();
                let err = map_error(e, context);
                tracing::debug!("{} {} - Error: {}", method, url, err);
                Err(err)
            }
        }
    }

    fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &ErrorContext,
    ) -> UpstreamResult<ureq::Response> {
        self.send("GET", path, query, None, context)
    }

    fn post(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &ErrorContext,
    ) -> UpstreamResult<ureq::Response> {
        self.send("POST", path, query, None, context)
    }

    fn post_xml(
        &self,
        path: &str,
        query: &[(&str, &str)],
        xml: &str,
        context: &ErrorContext,
    ) -> UpstreamResult<ureq::Response> {
        self.send("POST", path, query, Some(xml), context)
    }

    fn delete(&self, path: &str, context: &ErrorContext) -> UpstreamResult<ureq::Response> {
        self.send("DELETE", path, &[], None, context)
    }

    /// GET a JSON document and decode it strictly into `T`.
    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        tree: Option<&str>,
        context: &ErrorContext,
    ) -> UpstreamResult<T> {
        let query: Vec<(&str, &str)> = tree.map(|t| ("tree", t)).into_iter().collect();
        let body = read_body(self.get(path, &query, context)?, context)?;
        decode(&body, context)
    }

    /// Narrowed `tree=` request first, unfiltered document on fallback.
    fn get_json_with_fallback<T: DeserializeOwned>(
        &self,
        path: &str,
        tree: &str,
        context: &ErrorContext,
    ) -> UpstreamResult<T> {
        fallback::primary_then_raw(
            context,
            &self.metrics,
            || self.get_json(path, Some(tree), context),
            || self.get_json(path, None, context),
        )
    }

    // ========================= Server =========================

    /// Probe the server: authenticated user plus the `X-Jenkins` version header.
    pub fn whoami(&self) -> UpstreamResult<ServerStatus> {
        let context = ErrorContext::global("whoami");
        let response = self
            .get("/me/api/json", &[], &context)
            .map_err(UpstreamError::into_public)?;
        let version = response.header("X-Jenkins").map(str::to_string);
        let body = read_body(response, &context)?;
        let user: UserInfo = decode(&body, &context).map_err(UpstreamError::into_public)?;
        Ok(ServerStatus { user, version })
    }

    // ========================= Jobs =========================

    pub fn list_jobs(&self) -> UpstreamResult<Vec<JobSummary>> {
        let context = ErrorContext::global("list_jobs");
        let list: JobList = self.get_json_with_fallback("/api/json", JOBS_TREE, &context)?;
        Ok(list.jobs)
    }

    pub fn get_job_info(&self, job: &str) -> UpstreamResult<JobInfo> {
        let context = ErrorContext::new("get_job_info", Some(job.to_string()));
        let path = format!("{}/api/json", job_path(job));
        self.get_json_with_fallback(&path, JOB_TREE, &context)
    }

    /// Create `job` from a config document. Folder-qualified names are created
    /// inside their folder.
    pub fn create_job(&self, job: &str, config_xml: &str) -> UpstreamResult<()> {
        let context = ErrorContext::new("create_job", Some(job.to_string()));
        let (parent, leaf) = split_parent(job);
        let path = format!("{}/createItem", parent);
        self.post_xml(&path, &[("name", leaf)], config_xml, &context)
            .map(drop)
            .map_err(UpstreamError::into_public)
    }

    /// Delete via `doDelete`, falling back to HTTP `DELETE` on the job URL.
    pub fn delete_job(&self, job: &str) -> UpstreamResult<()> {
        let context = ErrorContext::new("delete_job", Some(job.to_string()));
        let base = job_path(job);
        fallback::primary_then_raw(
            &context,
            &self.metrics,
            || self.post(&format!("{}/doDelete", base), &[], &context).map(drop),
            || self.delete(&format!("{}/", base), &context).map(drop),
        )
    }

    pub fn enable_job(&self, job: &str) -> UpstreamResult<()> {
        self.job_action(job, "enable", "enable_job")
    }

    pub fn disable_job(&self, job: &str) -> UpstreamResult<()> {
        self.job_action(job, "disable", "disable_job")
    }

    /// Rename within the same folder. `new_name` is the new leaf name.
    pub fn rename_job(&self, job: &str, new_name: &str) -> UpstreamResult<()> {
        let context = ErrorContext::new("rename_job", Some(job.to_string()));
        let (_, leaf) = split_parent(new_name);
        let path = format!("{}/doRename", job_path(job));
        self.post(&path, &[("newName", leaf)], &context)
            .map(drop)
            .map_err(UpstreamError::into_public)
    }

    pub fn get_job_config(&self, job: &str) -> UpstreamResult<String> {
        let context = ErrorContext::new("get_job_config", Some(job.to_string()));
        let path = format!("{}/config.xml", job_path(job));
        let response = self
            .get(&path, &[], &context)
            .map_err(UpstreamError::into_public)?;
        read_body(response, &context)
    }

    pub fn update_job_config(&self, job: &str, config_xml: &str) -> UpstreamResult<()> {
        let context = ErrorContext::new("update_job_config", Some(job.to_string()));
        let path = format!("{}/config.xml", job_path(job));
        self.post_xml(&path, &[], config_xml, &context)
            .map(drop)
            .map_err(UpstreamError::into_public)
    }

    fn job_action(&self, job: &str, action: &str, operation: &str) -> UpstreamResult<()> {
        let context = ErrorContext::new(operation, Some(job.to_string()));
        let path = format!("{}/{}", job_path(job), action);
        self.post(&path, &[], &context)
            .map(drop)
            .map_err(UpstreamError::into_public)
    }

    // ========================= Builds =========================

    pub fn get_build_info(&self, job: &str, number: u64) -> UpstreamResult<BuildInfo> {
        let context = ErrorContext::new("get_build_info", Some(format!("{}#{}", job, number)));
        let path = format!("{}/{}/api/json", job_path(job), number);
        self.get_json_with_fallback(&path, BUILD_TREE, &context)
    }

    /// Full console log. Primary is the progressive log endpoint, raw is `consoleText`.
    pub fn get_console_text(&self, job: &str, number: u64) -> UpstreamResult<String> {
        let context = ErrorContext::new("get_console_text", Some(format!("{}#{}", job, number)));
        let base = format!("{}/{}", job_path(job), number);
        fallback::primary_then_raw(
            &context,
            &self.metrics,
            || {
                let response = self.get(
                    &format!("{}/logText/progressiveText", base),
                    &[("start", "0")],
                    &context,
                )?;
                read_body(response, &context)
            },
            || {
                let response = self.get(&format!("{}/consoleText", base), &[], &context)?;
                read_body(response, &context)
            },
        )
    }

    /// Queue a build. Parameterised jobs use `buildWithParameters`.
    pub fn trigger_build(
        &self,
        job: &str,
        parameters: Option<&Map<String, Value>>,
    ) -> UpstreamResult<QueuedBuild> {
        let context = ErrorContext::new("trigger_build", Some(job.to_string()));
        let rendered: Vec<(String, String)> = parameters
            .map(|params| {
                params
                    .iter()
                    .map(|(name, value)| (name.clone(), parameter_value(value)))
                    .collect()
            })
            .unwrap_or_default();
        let query: Vec<(&str, &str)> = rendered
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        let endpoint = if parameters.is_some() {
            "buildWithParameters"
        } else {
            "build"
        };
        let path = format!("{}/{}", job_path(job), endpoint);
        let response = self
            .post(&path, &query, &context)
            .map_err(UpstreamError::into_public)?;

        let location = response.header("Location").map(str::to_string);
        Ok(QueuedBuild {
            queue_id: location.as_deref().and_then(parse_queue_id),
            location,
        })
    }

    pub fn stop_build(&self, job: &str, number: u64) -> UpstreamResult<()> {
        let context = ErrorContext::new("stop_build", Some(format!("{}#{}", job, number)));
        let path = format!("{}/{}/stop", job_path(job), number);
        self.post(&path, &[], &context)
            .map(drop)
            .map_err(UpstreamError::into_public)
    }

    // ========================= Queue =========================

    pub fn get_queue(&self) -> UpstreamResult<Vec<QueueItem>> {
        let context = ErrorContext::global("get_queue");
        let queue: Queue = self.get_json_with_fallback("/queue/api/json", QUEUE_TREE, &context)?;
        Ok(queue.items)
    }

    pub fn get_queue_item(&self, id: u64) -> UpstreamResult<QueueItem> {
        let context = ErrorContext::new("get_queue_item", Some(id.to_string()));
        let path = format!("/queue/item/{}/api/json", id);
        self.get_json_with_fallback(&path, QUEUE_ITEM_TREE, &context)
    }

    // ========================= Nodes =========================

    pub fn list_nodes(&self) -> UpstreamResult<Vec<NodeInfo>> {
        let context = ErrorContext::global("list_nodes");
        let tree = format!("computer[{}]", NODE_FIELDS);
        let list: NodeList = self.get_json_with_fallback("/computer/api/json", &tree, &context)?;
        Ok(list.computer)
    }

    pub fn get_node_info(&self, node: &str) -> UpstreamResult<NodeInfo> {
        let context = ErrorContext::new("get_node_info", Some(node.to_string()));
        let path = format!("/computer/{}/api/json", node_path_segment(node));
        self.get_json_with_fallback(&path, NODE_FIELDS, &context)
    }
}

fn basic_auth(username: &str, api_token: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", username, api_token));
    format!("Basic {}", encoded)
}

fn read_body(response: ureq::Response, context: &ErrorContext) -> UpstreamResult<String> {
    response.into_string().map_err(|e| {
        let detail = e.to_string();
        if is_timeout_message(&detail) {
            UpstreamError::Timeout {
                context: context.clone(),
                detail,
            }
        } else {
            UpstreamError::RemoteFault {
                context: context.clone(),
                status: None,
                detail: format!("Failed to read response body: {}", detail),
            }
        }
    })
}

fn decode<T: DeserializeOwned>(body: &str, context: &ErrorContext) -> UpstreamResult<T> {
    serde_json::from_str(body).map_err(|e| UpstreamError::MalformedResponse {
        context: context.clone(),
        detail: e.to_string(),
    })
}

fn is_timeout_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("timed out") || lower.contains("timeout")
}

/// Map a ureq error to an UpstreamError.
///
/// Failures before the request is sent (DNS, refused or timed-out connect) are
/// connection failures; a read timeout leaves the outcome unknown and is a timeout.
fn map_error(error: ureq::Error, context: &ErrorContext) -> UpstreamError {
    let context = context.clone();
    match error {
        ureq::Error::Status(code, response) => {
            let detail = response
                .into_string()
                .map(|body| excerpt(&body))
                .unwrap_or_else(|_| "Unknown error".to_string());

            match code {
                401 => UpstreamError::AuthenticationFailure { context },
                403 => UpstreamError::PermissionDenied { context },
                404 => UpstreamError::NotFound { context },
                400 | 405 | 501 => UpstreamError::Unsupported {
                    context,
                    status: code,
                    detail,
                },
                _ => UpstreamError::RemoteFault {
                    context,
                    status: Some(code),
                    detail,
                },
            }
        }
        ureq::Error::Transport(transport) => {
            let detail = transport.to_string();
            match transport.kind() {
                ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => {
                    UpstreamError::ConnectionFailure { context, detail }
                }
                ureq::ErrorKind::Io if is_timeout_message(&detail) => {
                    UpstreamError::Timeout { context, detail }
                }
                _ => UpstreamError::RemoteFault {
                    context,
                    status: None,
                    detail,
                },
            }
        }
    }
}
