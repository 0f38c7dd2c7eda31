//! `jenkins://` resources.
//!
//! Every job is exposed as `jenkins://job/{name}`. Reads go through the
//! dispatcher like tool calls, so they share the response cache and show up
//! in the operation metrics.

use crate::dispatcher::ToolDispatcher;
use crate::validation::Args;
use rmcp::model::{Annotated, RawResource, ReadResourceResult, Resource, ResourceContents};
use rmcp::ErrorData as McpError;
use serde_json::{json, Value};

pub const SCHEME: &str = "jenkins://";
pub const ERROR_URI: &str = "jenkins://error";

const JSON_MIME: &str = "application/json";
const TEXT_MIME: &str = "text/plain";

fn resource(uri: String, name: String, description: String, mime_type: &str) -> Resource {
    Annotated {
        raw: RawResource {
            uri,
            name,
            title: None,
            description: Some(description),
            mime_type: Some(mime_type.to_string()),
            size: None,
            icons: None,
        },
        annotations: None,
    }
}

fn contents(uri: &str, mime_type: &str, text: String) -> ReadResourceResult {
    ReadResourceResult {
        contents: vec![ResourceContents::TextResourceContents {
            uri: uri.to_string(),
            mime_type: Some(mime_type.to_string()),
            text,
            meta: None,
        }],
    }
}

fn job_args(job: &str) -> Args {
    let mut args = Args::new();
    args.insert("job_name".into(), Value::from(job));
    args
}

/// One resource per job. If the job list cannot be fetched the listing holds a
/// single `jenkins://error` entry describing the failure.
pub async fn list(dispatcher: &ToolDispatcher) -> Vec<Resource> {
    let listing = match dispatcher.dispatch("list-jobs", &Args::new()).await {
        Ok(listing) => listing,
        Err(err) => {
            tracing::error!(error = %err.message, "Failed to list resources");
            return vec![resource(
                ERROR_URI.to_string(),
                "Error connecting to Jenkins".to_string(),
                format!("Error: {}", err.message),
                TEXT_MIME,
            )];
        }
    };

    listing["jobs"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|job| {
            let name = job["name"].as_str()?;
            let status = job["status"].as_str().unwrap_or("unknown");
            Some(resource(
                format!("{}job/{}", SCHEME, name),
                format!("Job: {}", name),
                format!("Jenkins job: {} (status: {})", name, status),
                JSON_MIME,
            ))
        })
        .collect()
}

/// Read one `jenkins://` resource.
pub async fn read(
    dispatcher: &ToolDispatcher,
    uri: &str,
) -> Result<ReadResourceResult, McpError> {
    let path = uri
        .strip_prefix(SCHEME)
        .ok_or_else(|| {
            McpError::invalid_params(format!("Unsupported URI scheme: {}", uri), None)
        })?
        .trim_start_matches('/');

    if path.is_empty() {
        return Err(McpError::invalid_params(
            "Invalid Jenkins URI: missing path",
            None,
        ));
    }
    if path == "error" {
        return Ok(contents(
            uri,
            TEXT_MIME,
            "Failed to connect to Jenkins server. Please check your configuration.".to_string(),
        ));
    }

    let job = path.strip_prefix("job/").ok_or_else(|| {
        McpError::resource_not_found(format!("Unknown Jenkins resource: {}", path), None)
    })?;

    match read_job(dispatcher, job).await {
        Ok(document) => Ok(contents(uri, JSON_MIME, super::render(&document))),
        Err(message) => {
            tracing::error!(job, error = %message, "Error reading resource");
            Ok(contents(
                uri,
                TEXT_MIME,
                format!("Error retrieving job information: {}", message),
            ))
        }
    }
}

/// The latest build of `job`, or the job itself when it has never run or the
/// build cannot be fetched.
async fn read_job(dispatcher: &ToolDispatcher, job: &str) -> Result<Value, String> {
    let args = job_args(job);
    let last = dispatcher
        .dispatch("get-last-build-number", &args)
        .await
        .map_err(|err| err.message)?;

    if let Some(number) = last["last_build_number"].as_u64() {
        let mut build_args = job_args(job);
        build_args.insert("build_number".into(), json!(number));
        match dispatcher.dispatch("get-build-info", &build_args).await {
            Ok(build) => return Ok(build),
            Err(err) => {
                tracing::warn!(job, number, error = %err.message, "Could not fetch build info");
            }
        }
    }

    dispatcher
        .dispatch("get-job-details", &args)
        .await
        .map_err(|err| err.message)
}
