//! Async wrapper around synchronous JenkinsClient.
//!
//! This module provides an async interface to the synchronous JenkinsClient by using
//! `tokio::task::spawn_blocking` to run HTTP operations on a dedicated thread pool,
//! preventing blocking of the async runtime.

use crate::client::JenkinsClient;
use crate::error::{ErrorContext, UpstreamError, UpstreamResult};
use crate::models::*;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Upstream adapter contract: one logical call per method.
///
/// Implementations return errors from the public taxonomy only
/// (`Unsupported` and `MalformedResponse` never escape).
#[async_trait]
pub trait AsyncJenkinsClient: Send + Sync {
    /// Connection probe: authenticated user and server version.
    async fn whoami(&self) -> UpstreamResult<ServerStatus>;

    async fn list_jobs(&self) -> UpstreamResult<Vec<JobSummary>>;
    async fn get_job_info(&self, job: &str) -> UpstreamResult<JobInfo>;
    async fn create_job(&self, job: &str, config_xml: &str) -> UpstreamResult<()>;
    async fn delete_job(&self, job: &str) -> UpstreamResult<()>;
    async fn enable_job(&self, job: &str) -> UpstreamResult<()>;
    async fn disable_job(&self, job: &str) -> UpstreamResult<()>;
    async fn rename_job(&self, job: &str, new_name: &str) -> UpstreamResult<()>;
    async fn get_job_config(&self, job: &str) -> UpstreamResult<String>;
    async fn update_job_config(&self, job: &str, config_xml: &str) -> UpstreamResult<()>;

    async fn get_build_info(&self, job: &str, number: u64) -> UpstreamResult<BuildInfo>;
    async fn get_console_text(&self, job: &str, number: u64) -> UpstreamResult<String>;
    async fn trigger_build(
        &self,
        job: &str,
        parameters: Option<&Map<String, Value>>,
    ) -> UpstreamResult<QueuedBuild>;
    async fn stop_build(&self, job: &str, number: u64) -> UpstreamResult<()>;

    async fn get_queue(&self) -> UpstreamResult<Vec<QueueItem>>;
    async fn get_queue_item(&self, id: u64) -> UpstreamResult<QueueItem>;

    async fn list_nodes(&self) -> UpstreamResult<Vec<NodeInfo>>;
    async fn get_node_info(&self, node: &str) -> UpstreamResult<NodeInfo>;
}

/// Async wrapper around synchronous JenkinsClient.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous HTTP
/// operations on a dedicated thread pool, preventing blocking
/// the async runtime.
#[derive(Clone)]
pub struct AsyncJenkinsClientImpl {
    client: Arc<JenkinsClient>,
}

impl AsyncJenkinsClientImpl {
    pub fn new(client: JenkinsClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    async fn blocking<T, F>(&self, operation: &str, call: F) -> UpstreamResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&JenkinsClient) -> UpstreamResult<T> + Send + 'static,
    {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || call(&client))
            .await
            .map_err(|e| UpstreamError::RemoteFault {
                context: ErrorContext::global(operation),
                status: None,
                detail: format!("Task join error: {}", e),
            })?
    }
}

#[async_trait]
impl AsyncJenkinsClient for AsyncJenkinsClientImpl {
    async fn whoami(&self) -> UpstreamResult<ServerStatus> {
        self.blocking("whoami", |client| client.whoami()).await
    }

    async fn list_jobs(&self) -> UpstreamResult<Vec<JobSummary>> {
        self.blocking("list_jobs", |client| client.list_jobs()).await
    }

    async fn get_job_info(&self, job: &str) -> UpstreamResult<JobInfo> {
        let job = job.to_string();
        self.blocking("get_job_info", move |client| client.get_job_info(&job))
            .await
    }

    async fn create_job(&self, job: &str, config_xml: &str) -> UpstreamResult<()> {
        let job = job.to_string();
        let config_xml = config_xml.to_string();
        self.blocking("create_job", move |client| {
            client.create_job(&job, &config_xml)
        })
        .await
    }

    async fn delete_job(&self, job: &str) -> UpstreamResult<()> {
        let job = job.to_string();
        self.blocking("delete_job", move |client| client.delete_job(&job))
            .await
    }

    async fn enable_job(&self, job: &str) -> UpstreamResult<()> {
        let job = job.to_string();
        self.blocking("enable_job", move |client| client.enable_job(&job))
            .await
    }

    async fn disable_job(&self, job: &str) -> UpstreamResult<()> {
        let job = job.to_string();
        self.blocking("disable_job", move |client| client.disable_job(&job))
            .await
    }

    async fn rename_job(&self, job: &str, new_name: &str) -> UpstreamResult<()> {
        let job = job.to_string();
        let new_name = new_name.to_string();
        self.blocking("rename_job", move |client| client.rename_job(&job, &new_name))
            .await
    }

    async fn get_job_config(&self, job: &str) -> UpstreamResult<String> {
        let job = job.to_string();
        self.blocking("get_job_config", move |client| client.get_job_config(&job))
            .await
    }

    async fn update_job_config(&self, job: &str, config_xml: &str) -> UpstreamResult<()> {
        let job = job.to_string();
        let config_xml = config_xml.to_string();
        self.blocking("update_job_config", move |client| {
            client.update_job_config(&job, &config_xml)
        })
        .await
    }

    async fn get_build_info(&self, job: &str, number: u64) -> UpstreamResult<BuildInfo> {
        let job = job.to_string();
        self.blocking("get_build_info", move |client| {
            client.get_build_info(&job, number)
        })
        .await
    }

    async fn get_console_text(&self, job: &str, number: u64) -> UpstreamResult<String> {
        let job = job.to_string();
        self.blocking("get_console_text", move |client| {
            client.get_console_text(&job, number)
        })
        .await
    }

    async fn trigger_build(
        &self,
        job: &str,
        parameters: Option<&Map<String, Value>>,
    ) -> UpstreamResult<QueuedBuild> {
        let job = job.to_string();
        let parameters = parameters.cloned();
        self.blocking("trigger_build", move |client| {
            client.trigger_build(&job, parameters.as_ref())
        })
        .await
    }

    async fn stop_build(&self, job: &str, number: u64) -> UpstreamResult<()> {
        let job = job.to_string();
        self.blocking("stop_build", move |client| client.stop_build(&job, number))
            .await
    }

    async fn get_queue(&self) -> UpstreamResult<Vec<QueueItem>> {
        self.blocking("get_queue", |client| client.get_queue()).await
    }

    async fn get_queue_item(&self, id: u64) -> UpstreamResult<QueueItem> {
        self.blocking("get_queue_item", move |client| client.get_queue_item(id))
            .await
    }

    async fn list_nodes(&self) -> UpstreamResult<Vec<NodeInfo>> {
        self.blocking("list_nodes", |client| client.list_nodes()).await
    }

    async fn get_node_info(&self, node: &str) -> UpstreamResult<NodeInfo> {
        let node = node.to_string();
        self.blocking("get_node_info", move |client| client.get_node_info(&node))
            .await
    }
}
