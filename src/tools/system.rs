//! Queue, node and health tools.

use super::{ToolContext, ToolParams};
use crate::cache::keys;
use crate::error::{ServerIdentity, UpstreamError, UpstreamResult, ValidationResult};
use crate::models::ServerStatus;
use crate::validation::{self, Args};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Probes slower than this are reported as `Healthy (Slow)`.
pub const SLOW_RESPONSE_THRESHOLD: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, JsonSchema)]
pub struct NodeNameParams {
    /// Node name; `built-in` or `master` addresses the controller
    pub node_name: String,
}

impl ToolParams for NodeNameParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            node_name: validation::required_str(args, "node_name")?,
        })
    }
}

/// Individual health checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthChecks {
    pub server_url: String,
    pub username: String,
    pub server_reachable: bool,
    pub authentication_valid: bool,
    pub api_responsive: bool,
    pub server_version: Option<String>,
    pub response_time_ms: Option<f64>,
    pub timestamp: String,
}

/// Result of `health-check`. Always produced, even when Jenkins is unreachable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub healthy: bool,
    pub checks: HealthChecks,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub troubleshooting: Vec<String>,
}

impl HealthReport {
    /// Assess a `whoami` probe that took `elapsed`.
    pub fn from_probe(
        identity: &ServerIdentity,
        probe: Result<&ServerStatus, &UpstreamError>,
        elapsed: Duration,
        timestamp: String,
    ) -> Self {
        let mut checks = HealthChecks {
            server_url: identity.server_url.clone(),
            username: identity.username.clone(),
            server_reachable: false,
            authentication_valid: false,
            api_responsive: false,
            server_version: None,
            response_time_ms: None,
            timestamp,
        };

        let err = match probe {
            Ok(status) => {
                checks.server_reachable = true;
                checks.authentication_valid = true;
                checks.api_responsive = status.version.is_some();
                checks.server_version = status.version.clone();
                checks.response_time_ms =
                    Some((elapsed.as_secs_f64() * 100_000.0).round() / 100.0);

                let status = if !checks.api_responsive {
                    "Partially Healthy"
                } else if elapsed > SLOW_RESPONSE_THRESHOLD {
                    "Healthy (Slow)"
                } else {
                    "Healthy"
                };
                return Self {
                    status: status.to_string(),
                    healthy: true,
                    checks,
                    error: None,
                    troubleshooting: Vec::new(),
                };
            }
            Err(err) => err,
        };

        let status = match err {
            UpstreamError::Timeout { .. } => "Timeout",
            UpstreamError::ConnectionFailure { .. } => "Connection Failed",
            UpstreamError::AuthenticationFailure { .. } => {
                checks.server_reachable = true;
                "Authentication Failed"
            }
            _ => {
                checks.server_reachable = err.status().is_some();
                "Error"
            }
        };

        let mut troubleshooting = Vec::new();
        if !checks.server_reachable {
            troubleshooting.extend([
                "Verify Jenkins is running".to_string(),
                format!("Check the URL is correct: {}", identity.server_url),
                format!("Test with: curl {}/api/json", identity.server_url),
                "Check firewall and VPN settings".to_string(),
            ]);
        } else if status == "Authentication Failed" {
            troubleshooting.extend([
                format!("Verify username is correct: {}", identity.username),
                "Check the API token is valid".to_string(),
                "Generate a new token in Jenkins under Your Name > Configure > API Token"
                    .to_string(),
                "Update JENKINS_TOKEN with the new token".to_string(),
            ]);
        } else {
            troubleshooting.push("Check Jenkins logs for more details".to_string());
        }

        Self {
            status: status.to_string(),
            healthy: false,
            checks,
            error: Some(err.to_string()),
            troubleshooting,
        }
    }
}

/// Queue, agents and server health.
pub struct SystemTools {
    ctx: Arc<ToolContext>,
}

impl SystemTools {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    pub async fn get_queue_info(&self) -> UpstreamResult<Value> {
        let ctx = &self.ctx;
        ctx.cached(keys::QUEUE_INFO, ctx.config().cache_short_ttl(), || async {
            let queue = ctx.client().await?.get_queue().await?;
            let items: Vec<Value> = queue
                .iter()
                .map(|item| {
                    json!({
                        "id": item.id,
                        "job": item.task_name(),
                        "inQueueSince": item.in_queue_since,
                        "why": item.why,
                        "blocked": item.blocked,
                    })
                })
                .collect();

            Ok(json!({
                "count": items.len(),
                "items": items,
            }))
        })
        .await
    }

    pub async fn list_nodes(&self) -> UpstreamResult<Value> {
        let ctx = &self.ctx;
        ctx.cached(keys::NODES_LIST, ctx.config().cache_ttl(), || async {
            let nodes = ctx.client().await?.list_nodes().await?;
            let nodes: Vec<Value> = nodes
                .iter()
                .map(|node| {
                    json!({
                        "name": node.display_name,
                        "description": node.description,
                        "offline": node.offline,
                        "executors": node.num_executors,
                    })
                })
                .collect();

            Ok(json!({
                "count": nodes.len(),
                "nodes": nodes,
            }))
        })
        .await
    }

    pub async fn get_node_info(&self, params: NodeNameParams) -> UpstreamResult<Value> {
        let ctx = &self.ctx;
        let name = params.node_name.as_str();
        ctx.cached(&keys::node_info(name), ctx.config().cache_ttl(), || async {
            let node = ctx.client().await?.get_node_info(name).await?;
            Ok(json!({
                "name": node.display_name,
                "description": node.description,
                "offline": node.offline,
                "temporarilyOffline": node.temporarily_offline,
                "offlineCause": node.offline_cause_reason,
                "executors": node.num_executors,
            }))
        })
        .await
    }

    /// Probe the server with `whoami`.
    ///
    /// An established connection is probed again. Otherwise establishing the
    /// connection is the probe, so the server is only asked once.
    pub async fn health_check(&self) -> HealthReport {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let start = Instant::now();

        let probe = match self.ctx.connection().peek() {
            Some(client) => client.whoami().await,
            None => match self.ctx.connection().get_client().await {
                Ok(_) => Ok(self.ctx.connection().probe_status().unwrap_or_default()),
                Err(e) => Err(e),
            },
        };

        let report = HealthReport::from_probe(
            &self.ctx.config().identity(),
            probe.as_ref(),
            start.elapsed(),
            timestamp,
        );
        if report.healthy {
            tracing::debug!(status = %report.status, "Health check passed");
        } else {
            tracing::warn!(status = %report.status, error = ?report.error, "Health check failed");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorContext;
    use crate::models::UserInfo;

    fn identity() -> ServerIdentity {
        ServerIdentity {
            server_url: "https://ci.example.com".to_string(),
            username: "bot".to_string(),
        }
    }

    fn status(version: Option<&str>) -> ServerStatus {
        ServerStatus {
            user: UserInfo {
                id: Some("bot".to_string()),
                full_name: None,
            },
            version: version.map(String::from),
        }
    }

    #[test]
    fn test_healthy_probe() {
        let status = status(Some("2.440.1"));
        let report = HealthReport::from_probe(
            &identity(),
            Ok(&status),
            Duration::from_millis(120),
            "now".to_string(),
        );
        assert_eq!(report.status, "Healthy");
        assert!(report.healthy);
        assert_eq!(report.checks.server_version.as_deref(), Some("2.440.1"));
        assert_eq!(report.checks.response_time_ms, Some(120.0));
        assert!(report.troubleshooting.is_empty());
    }

    #[test]
    fn test_slow_and_partial_probe() {
        let versioned = status(Some("2.440.1"));
        let report = HealthReport::from_probe(
            &identity(),
            Ok(&versioned),
            Duration::from_millis(2500),
            "now".to_string(),
        );
        assert_eq!(report.status, "Healthy (Slow)");

        let unversioned = status(None);
        let report = HealthReport::from_probe(
            &identity(),
            Ok(&unversioned),
            Duration::from_millis(10),
            "now".to_string(),
        );
        assert_eq!(report.status, "Partially Healthy");
        assert!(!report.checks.api_responsive);
    }

    #[test]
    fn test_failed_probes() {
        let ctx = ErrorContext::global("whoami");

        let err = UpstreamError::AuthenticationFailure {
            context: ctx.clone(),
        };
        let report =
            HealthReport::from_probe(&identity(), Err(&err), Duration::ZERO, "now".to_string());
        assert_eq!(report.status, "Authentication Failed");
        assert!(!report.healthy);
        assert!(report.checks.server_reachable);
        assert!(report.troubleshooting[0].contains("bot"));

        let err = UpstreamError::ConnectionFailure {
            context: ctx.clone(),
            detail: "connection refused".to_string(),
        };
        let report =
            HealthReport::from_probe(&identity(), Err(&err), Duration::ZERO, "now".to_string());
        assert_eq!(report.status, "Connection Failed");
        assert!(!report.checks.server_reachable);
        assert!(report.error.as_deref().unwrap().contains("connection refused"));

        let err = UpstreamError::Timeout {
            context: ctx,
            detail: "timed out".to_string(),
        };
        let report =
            HealthReport::from_probe(&identity(), Err(&err), Duration::ZERO, "now".to_string());
        assert_eq!(report.status, "Timeout");
        assert!(report.checks.response_time_ms.is_none());
    }
}
