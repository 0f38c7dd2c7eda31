//! Jenkins MCP Gateway - a Model Context Protocol server for Jenkins.
//!
//! The gateway exposes Jenkins jobs, builds, queue and nodes to AI assistants as
//! MCP tools. Reads are served through a TTL cache with single-flight fetches,
//! upstream calls are retried according to their idempotency, and every
//! operation is timed in a bounded metrics ledger.
//!
//! # Architecture
//!
//! - **config**: Configuration from environment variables and env files
//! - **error**: Upstream, validation and configuration errors, and the client-facing payload
//! - **models**: Jenkins JSON records
//! - **client**: Blocking HTTP adapter, async wrapper, retry policy and raw-path fallback
//! - **connection**: Lazily established, shared upstream connection
//! - **cache**: TTL cache and key scheme
//! - **metrics**: Per-operation ledger and HTTP counters
//! - **validation**: Typed argument extraction
//! - **config_xml**: Job config XML generation and rewriting
//! - **tools**: Operation handlers
//! - **dispatcher**: Name resolution, validation, metrics and error mapping
//! - **server**: MCP protocol server

pub mod cache;
pub mod client;
pub mod config;
pub mod config_xml;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod models;
pub mod server;
pub mod tools;
pub mod validation;

// Re-export commonly used types
pub use cache::{CacheManager, CacheStats};
pub use client::{AsyncJenkinsClient, JenkinsClient, RetryPolicy, RetryingClient};
pub use config::Config;
pub use connection::{ClientFactory, ConnectionCache, HttpClientFactory};
pub use dispatcher::{Operation, ToolDispatcher};
pub use error::{
    ConfigError, ErrorContext, ErrorKind, ToolError, UpstreamError, UpstreamResult,
    ValidationError,
};
pub use metrics::{MetricsCollector, MetricsSummary, UpstreamMetrics};
pub use server::JenkinsMcpServer;
