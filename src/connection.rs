//! Lazily established, shared upstream connection.
//!
//! The first caller builds the adapter through a [`ClientFactory`] and probes it
//! with `whoami`. Concurrent callers wait for that attempt. A failed attempt caches
//! nothing, so the next caller tries again.

use crate::client::{
    AsyncJenkinsClient, AsyncJenkinsClientImpl, JenkinsClient, RetryPolicy, RetryingClient,
};
use crate::config::Config;
use crate::error::UpstreamResult;
use crate::metrics::UpstreamMetrics;
use crate::models::ServerStatus;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Builds upstream adapters.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self) -> UpstreamResult<Arc<dyn AsyncJenkinsClient>>;
}

/// Factory for the real HTTP adapter, wrapped in the configured retry policy.
pub struct HttpClientFactory {
    config: Config,
    metrics: UpstreamMetrics,
}

impl HttpClientFactory {
    pub fn new(config: Config, metrics: UpstreamMetrics) -> Self {
        Self { config, metrics }
    }
}

#[async_trait]
impl ClientFactory for HttpClientFactory {
    async fn connect(&self) -> UpstreamResult<Arc<dyn AsyncJenkinsClient>> {
        let client = JenkinsClient::new(&self.config, self.metrics.clone());
        let adapter: Arc<dyn AsyncJenkinsClient> = Arc::new(AsyncJenkinsClientImpl::new(client));
        Ok(Arc::new(RetryingClient::new(
            adapter,
            RetryPolicy::from_config(&self.config),
            self.metrics.clone(),
        )))
    }
}

struct Connected {
    client: Arc<dyn AsyncJenkinsClient>,

    /// Probe answer from when the connection was established
    status: ServerStatus,
}

/// Once-guarded upstream connection shared by all dispatches.
pub struct ConnectionCache {
    factory: Arc<dyn ClientFactory>,
    connected: OnceCell<Connected>,
}

impl ConnectionCache {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            connected: OnceCell::new(),
        }
    }

    /// Return the shared adapter, connecting and probing on first use.
    pub async fn get_client(&self) -> UpstreamResult<Arc<dyn AsyncJenkinsClient>> {
        let connected = self
            .connected
            .get_or_try_init(|| async {
                tracing::debug!("Establishing Jenkins connection");
                let client = self.factory.connect().await?;
                match client.whoami().await {
                    Ok(status) => {
                        tracing::info!(
                            user = status.user.id.as_deref().unwrap_or("anonymous"),
                            version = status.version.as_deref().unwrap_or("unknown"),
                            "Connected to Jenkins"
                        );
                        Ok(Connected { client, status })
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Jenkins connection probe failed");
                        Err(e)
                    }
                }
            })
            .await?;
        Ok(connected.client.clone())
    }

    /// The adapter, if a connection has already been established.
    pub fn peek(&self) -> Option<Arc<dyn AsyncJenkinsClient>> {
        self.connected.get().map(|c| c.client.clone())
    }

    /// What the connection probe reported, once connected.
    pub fn probe_status(&self) -> Option<ServerStatus> {
        self.connected.get().map(|c| c.status.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.connected.initialized()
    }
}
