//! Shared test doubles for integration tests.

pub mod mock_jenkins_client;

#[allow(unused_imports)]
pub use mock_jenkins_client::{queue_item, sample_build, MockJenkinsClient};

use async_trait::async_trait;
use jenkins_mcp_gateway::cache::CacheManager;
use jenkins_mcp_gateway::client::AsyncJenkinsClient;
use jenkins_mcp_gateway::connection::{ClientFactory, ConnectionCache};
use jenkins_mcp_gateway::error::{UpstreamError, UpstreamResult};
use jenkins_mcp_gateway::metrics::{MetricsCollector, UpstreamMetrics};
use jenkins_mcp_gateway::{Config, ToolDispatcher};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Factory handing out one shared adapter, counting how often it was asked.
#[allow(dead_code)]
pub struct MockClientFactory {
    client: Arc<dyn AsyncJenkinsClient>,
    connects: AtomicUsize,
    failures: Mutex<VecDeque<UpstreamError>>,
    delay: Option<Duration>,
}

#[allow(dead_code)]
impl MockClientFactory {
    pub fn new(client: Arc<dyn AsyncJenkinsClient>) -> Self {
        Self {
            client,
            connects: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the next `connect` fail with `error`.
    pub fn fail_next(&self, error: UpstreamError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn connect(&self) -> UpstreamResult<Arc<dyn AsyncJenkinsClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failures.lock().unwrap().pop_front();
        match failure {
            Some(err) => Err(err),
            None => Ok(self.client.clone()),
        }
    }
}

/// Settings used by dispatcher tests.
#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        jenkins_url: "http://jenkins.test".to_string(),
        username: "bot".to_string(),
        api_token: "secret".to_string(),
        build_start_timeout_secs: 5,
        ..Default::default()
    }
}

/// A dispatcher wired to `client` through a counting factory.
#[allow(dead_code)]
pub fn dispatcher_with(
    client: Arc<dyn AsyncJenkinsClient>,
    config: Config,
) -> (ToolDispatcher, Arc<MockClientFactory>) {
    let factory = Arc::new(MockClientFactory::new(client));
    let connection = Arc::new(ConnectionCache::new(factory.clone()));
    let metrics = MetricsCollector::new(config.metrics_history);
    let dispatcher = ToolDispatcher::new(
        connection,
        CacheManager::new(),
        Arc::new(config),
        metrics,
        UpstreamMetrics::new(),
    );
    (dispatcher, factory)
}

/// Build an argument map from a `json!` object literal.
#[allow(dead_code)]
pub fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
