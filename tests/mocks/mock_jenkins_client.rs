use async_trait::async_trait;
use jenkins_mcp_gateway::client::AsyncJenkinsClient;
use jenkins_mcp_gateway::error::{ErrorContext, UpstreamError, UpstreamResult};
use jenkins_mcp_gateway::models::{
    BuildInfo, BuildRef, JobInfo, JobSummary, NodeInfo, QueueItem, QueuedBuild, ServerStatus,
    UserInfo,
};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct State {
    jobs: Vec<JobSummary>,
    job_info: HashMap<String, JobInfo>,
    builds: HashMap<(String, u64), BuildInfo>,
    consoles: HashMap<(String, u64), String>,
    configs: HashMap<String, String>,
    queue: Vec<QueueItem>,
    queue_items: HashMap<u64, VecDeque<QueueItem>>,
    nodes: Vec<NodeInfo>,
    version: Option<String>,
    next_queue_id: u64,
    failures: HashMap<String, VecDeque<UpstreamError>>,
    call_counts: HashMap<String, usize>,
    created: Vec<(String, String)>,
    triggered: Vec<(String, Option<Map<String, Value>>)>,
    delay: Option<Duration>,
}

/// Mock Jenkins adapter for testing.
///
/// Serves canned records from memory, counts calls per method, and can be told to
/// fail the next calls to a method with scripted errors.
#[allow(dead_code)]
#[derive(Clone)]
pub struct MockJenkinsClient {
    state: Arc<Mutex<State>>,
}

#[allow(dead_code)]
impl MockJenkinsClient {
    pub fn new() -> Self {
        let state = State {
            version: Some("2.440.1".to_string()),
            next_queue_id: 100,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Add a job with the given builds (newest last). The last build is `lastBuild`.
    pub fn add_job(&self, name: &str, builds: &[u64]) {
        let mut state = self.state.lock().unwrap();
        state.jobs.push(JobSummary {
            name: name.rsplit('/').next().unwrap_or(name).to_string(),
            full_name: Some(name.to_string()),
            url: format!("http://jenkins/job/{}/", name),
            color: Some("blue".to_string()),
        });
        let last = builds.last().map(|&number| BuildRef { number });
        state.job_info.insert(
            name.to_string(),
            JobInfo {
                name: name.to_string(),
                full_name: Some(name.to_string()),
                url: format!("http://jenkins/job/{}/", name),
                description: None,
                buildable: true,
                color: Some("blue".to_string()),
                last_build: last,
                last_completed_build: last,
                last_successful_build: last,
                last_failed_build: None,
                builds: builds.iter().rev().map(|&number| BuildRef { number }).collect(),
            },
        );
        for &number in builds {
            state
                .builds
                .insert((name.to_string(), number), sample_build(number, false));
        }
    }

    pub fn add_build(&self, job: &str, build: BuildInfo) {
        let mut state = self.state.lock().unwrap();
        state.builds.insert((job.to_string(), build.number), build);
    }

    pub fn set_console(&self, job: &str, number: u64, text: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .consoles
            .insert((job.to_string(), number), text.to_string());
    }

    pub fn set_config(&self, job: &str, xml: &str) {
        let mut state = self.state.lock().unwrap();
        state.configs.insert(job.to_string(), xml.to_string());
    }

    pub fn add_queue_item(&self, item: QueueItem) {
        let mut state = self.state.lock().unwrap();
        state.queue.push(item);
    }

    /// Answers for successive `get_queue_item(id)` calls. The last answer repeats.
    pub fn script_queue_item(&self, id: u64, answers: Vec<QueueItem>) {
        let mut state = self.state.lock().unwrap();
        state.queue_items.insert(id, answers.into());
    }

    pub fn add_node(&self, name: &str, offline: bool) {
        let mut state = self.state.lock().unwrap();
        state.nodes.push(NodeInfo {
            display_name: name.to_string(),
            description: None,
            offline,
            temporarily_offline: false,
            offline_cause_reason: None,
            num_executors: 2,
            idle: true,
        });
    }

    pub fn set_version(&self, version: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.version = version.map(String::from);
    }

    /// Make the next call to `method` fail with `error`. Calls queue up.
    pub fn fail_next(&self, method: &str, error: UpstreamError) {
        let mut state = self.state.lock().unwrap();
        state
            .failures
            .entry(method.to_string())
            .or_default()
            .push_back(error);
    }

    /// Delay every call, to widen concurrency windows.
    pub fn set_delay(&self, delay: Duration) {
        let mut state = self.state.lock().unwrap();
        state.delay = Some(delay);
    }

    /// Get the number of times a method was called.
    pub fn get_call_count(&self, method: &str) -> usize {
        let state = self.state.lock().unwrap();
        *state.call_counts.get(method).unwrap_or(&0)
    }

    /// Calls across every method.
    pub fn total_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.call_counts.values().sum()
    }

    pub fn created_jobs(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn triggered_builds(&self) -> Vec<(String, Option<Map<String, Value>>)> {
        self.state.lock().unwrap().triggered.clone()
    }

    /// Count the call, wait out any delay, and pop a scripted failure.
    async fn track_call(&self, method: &str) -> UpstreamResult<()> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            *state.call_counts.entry(method.to_string()).or_insert(0) += 1;
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        match state.failures.get_mut(method).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn not_found(method: &str, target: &str) -> UpstreamError {
        UpstreamError::NotFound {
            context: ErrorContext::new(method, Some(target.to_string())),
        }
    }
}

impl Default for MockJenkinsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
pub fn sample_build(number: u64, building: bool) -> BuildInfo {
    serde_json::from_value(json!({
        "number": number,
        "result": if building { Value::Null } else { Value::from("SUCCESS") },
        "building": building,
        "timestamp": 1_700_000_000_000i64 + number as i64 * 60_000,
        "duration": 42_000,
        "url": format!("http://jenkins/job/api/{}/", number),
        "changeSet": {
            "items": [{"msg": "Fix flaky test", "author": {"fullName": "Dana"}}]
        }
    }))
    .unwrap()
}

#[allow(dead_code)]
pub fn queue_item(id: u64, job: &str, build_number: Option<u64>) -> QueueItem {
    serde_json::from_value(json!({
        "id": id,
        "task": {"name": job, "url": format!("http://jenkins/job/{}/", job)},
        "why": if build_number.is_none() { Value::from("Waiting for next available executor") } else { Value::Null },
        "inQueueSince": 1_700_000_000_000i64,
        "executable": build_number.map(|number| json!({"number": number})),
    }))
    .unwrap()
}

#[async_trait]
impl AsyncJenkinsClient for MockJenkinsClient {
    async fn whoami(&self) -> UpstreamResult<ServerStatus> {
        self.track_call("whoami").await?;
        let state = self.state.lock().unwrap();
        Ok(ServerStatus {
            user: UserInfo {
                id: Some("bot".to_string()),
                full_name: Some("CI Bot".to_string()),
            },
            version: state.version.clone(),
        })
    }

    async fn list_jobs(&self) -> UpstreamResult<Vec<JobSummary>> {
        self.track_call("list_jobs").await?;
        Ok(self.state.lock().unwrap().jobs.clone())
    }

    async fn get_job_info(&self, job: &str) -> UpstreamResult<JobInfo> {
        self.track_call("get_job_info").await?;
        let state = self.state.lock().unwrap();
        state
            .job_info
            .get(job)
            .cloned()
            .ok_or_else(|| Self::not_found("get_job_info", job))
    }

    async fn create_job(&self, job: &str, config_xml: &str) -> UpstreamResult<()> {
        self.track_call("create_job").await?;
        let mut state = self.state.lock().unwrap();
        state.created.push((job.to_string(), config_xml.to_string()));
        state.configs.insert(job.to_string(), config_xml.to_string());
        Ok(())
    }

    async fn delete_job(&self, job: &str) -> UpstreamResult<()> {
        self.track_call("delete_job").await?;
        let mut state = self.state.lock().unwrap();
        state.job_info.remove(job);
        state.jobs.retain(|j| j.qualified_name() != job);
        Ok(())
    }

    async fn enable_job(&self, _job: &str) -> UpstreamResult<()> {
        self.track_call("enable_job").await
    }

    async fn disable_job(&self, _job: &str) -> UpstreamResult<()> {
        self.track_call("disable_job").await
    }

    async fn rename_job(&self, _job: &str, _new_name: &str) -> UpstreamResult<()> {
        self.track_call("rename_job").await
    }

    async fn get_job_config(&self, job: &str) -> UpstreamResult<String> {
        self.track_call("get_job_config").await?;
        let state = self.state.lock().unwrap();
        state
            .configs
            .get(job)
            .cloned()
            .ok_or_else(|| Self::not_found("get_job_config", job))
    }

    async fn update_job_config(&self, job: &str, config_xml: &str) -> UpstreamResult<()> {
        self.track_call("update_job_config").await?;
        let mut state = self.state.lock().unwrap();
        state.configs.insert(job.to_string(), config_xml.to_string());
        Ok(())
    }

    async fn get_build_info(&self, job: &str, number: u64) -> UpstreamResult<BuildInfo> {
        self.track_call("get_build_info").await?;
        let state = self.state.lock().unwrap();
        state
            .builds
            .get(&(job.to_string(), number))
            .cloned()
            .ok_or_else(|| Self::not_found("get_build_info", job))
    }

    async fn get_console_text(&self, job: &str, number: u64) -> UpstreamResult<String> {
        self.track_call("get_console_text").await?;
        let state = self.state.lock().unwrap();
        state
            .consoles
            .get(&(job.to_string(), number))
            .cloned()
            .ok_or_else(|| Self::not_found("get_console_text", job))
    }

    async fn trigger_build(
        &self,
        job: &str,
        parameters: Option<&Map<String, Value>>,
    ) -> UpstreamResult<QueuedBuild> {
        self.track_call("trigger_build").await?;
        let mut state = self.state.lock().unwrap();
        state.triggered.push((job.to_string(), parameters.cloned()));
        let queue_id = state.next_queue_id;
        state.next_queue_id += 1;
        Ok(QueuedBuild {
            queue_id: Some(queue_id),
            location: Some(format!("http://jenkins/queue/item/{}/", queue_id)),
        })
    }

    async fn stop_build(&self, _job: &str, _number: u64) -> UpstreamResult<()> {
        self.track_call("stop_build").await
    }

    async fn get_queue(&self) -> UpstreamResult<Vec<QueueItem>> {
        self.track_call("get_queue").await?;
        Ok(self.state.lock().unwrap().queue.clone())
    }

    async fn get_queue_item(&self, id: u64) -> UpstreamResult<QueueItem> {
        self.track_call("get_queue_item").await?;
        let mut state = self.state.lock().unwrap();
        let answers = state
            .queue_items
            .get_mut(&id)
            .ok_or_else(|| Self::not_found("get_queue_item", &id.to_string()))?;
        if answers.len() > 1 {
            Ok(answers.pop_front().unwrap())
        } else {
            answers
                .front()
                .cloned()
                .ok_or_else(|| Self::not_found("get_queue_item", &id.to_string()))
        }
    }

    async fn list_nodes(&self) -> UpstreamResult<Vec<NodeInfo>> {
        self.track_call("list_nodes").await?;
        Ok(self.state.lock().unwrap().nodes.clone())
    }

    async fn get_node_info(&self, node: &str) -> UpstreamResult<NodeInfo> {
        self.track_call("get_node_info").await?;
        let state = self.state.lock().unwrap();
        state
            .nodes
            .iter()
            .find(|n| n.display_name == node)
            .cloned()
            .ok_or_else(|| Self::not_found("get_node_info", node))
    }
}
