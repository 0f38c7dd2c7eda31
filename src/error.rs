//! Error types for the Jenkins MCP Gateway.
//!
//! This module defines custom error types using `thiserror` for precise error handling,
//! plus the serializable [`ToolError`] payload returned to MCP clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// The operation and target an upstream error was raised for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Adapter operation name (e.g. `get_build_info`)
    pub operation: String,

    /// Job name, build reference or node name, when the call has one
    pub target: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>, target: Option<String>) -> Self {
        Self {
            operation: operation.into(),
            target,
        }
    }

    /// Context for calls without a specific target (queue, nodes, whoami).
    pub fn global(operation: impl Into<String>) -> Self {
        Self::new(operation, None)
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{} [{}]", self.operation, target),
            None => write!(f, "{}", self.operation),
        }
    }
}

/// Errors raised by the upstream Jenkins adapter.
///
/// `Unsupported` and `MalformedResponse` are internal: they trigger the raw-path
/// fallback and are converted to `RemoteFault` if the fallback fails the same way.
#[derive(Error, Debug, Clone)]
pub enum UpstreamError {
    /// Connect or read timeout
    #[error("Request timed out during {context}: {detail}")]
    Timeout { context: ErrorContext, detail: String },

    /// Request never reached the server (DNS failure, connection refused)
    #[error("Connection failed during {context}: {detail}")]
    ConnectionFailure { context: ErrorContext, detail: String },

    /// HTTP 401
    #[error("Authentication failed during {context}")]
    AuthenticationFailure { context: ErrorContext },

    /// HTTP 403
    #[error("Permission denied during {context}")]
    PermissionDenied { context: ErrorContext },

    /// HTTP 404
    #[error("Resource not found during {context}")]
    NotFound { context: ErrorContext },

    /// 5xx, unexpected status, or a failure after the request was sent
    #[error("Remote fault during {context}: {detail}")]
    RemoteFault {
        context: ErrorContext,
        status: Option<u16>,
        detail: String,
    },

    /// HTTP 400/405/501 on the primary path
    #[error("Call not supported during {context} (status {status}): {detail}")]
    Unsupported {
        context: ErrorContext,
        status: u16,
        detail: String,
    },

    /// Body could not be decoded into the expected record
    #[error("Malformed response during {context}: {detail}")]
    MalformedResponse { context: ErrorContext, detail: String },
}

impl UpstreamError {
    pub fn context(&self) -> &ErrorContext {
        match self {
            UpstreamError::Timeout { context, .. }
            | UpstreamError::ConnectionFailure { context, .. }
            | UpstreamError::AuthenticationFailure { context }
            | UpstreamError::PermissionDenied { context }
            | UpstreamError::NotFound { context }
            | UpstreamError::RemoteFault { context, .. }
            | UpstreamError::Unsupported { context, .. }
            | UpstreamError::MalformedResponse { context, .. } => context,
        }
    }

    /// HTTP status associated with the error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::AuthenticationFailure { .. } => Some(401),
            UpstreamError::PermissionDenied { .. } => Some(403),
            UpstreamError::NotFound { .. } => Some(404),
            UpstreamError::RemoteFault { status, .. } => *status,
            UpstreamError::Unsupported { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error may be answered by retrying the same endpoint on the raw path.
    pub fn is_fallback_trigger(&self) -> bool {
        matches!(
            self,
            UpstreamError::Unsupported { .. } | UpstreamError::MalformedResponse { .. }
        )
    }

    /// Collapse the internal fallback triggers into the public taxonomy.
    pub fn into_public(self) -> Self {
        match self {
            UpstreamError::Unsupported {
                context,
                status,
                detail,
            } => UpstreamError::RemoteFault {
                context,
                status: Some(status),
                detail,
            },
            UpstreamError::MalformedResponse { context, detail } => UpstreamError::RemoteFault {
                context,
                status: None,
                detail,
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UpstreamError::Timeout { .. } => ErrorKind::Timeout,
            UpstreamError::ConnectionFailure { .. } => ErrorKind::ConnectionFailure,
            UpstreamError::AuthenticationFailure { .. } => ErrorKind::AuthenticationFailure,
            UpstreamError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            UpstreamError::NotFound { .. } => ErrorKind::NotFound,
            UpstreamError::RemoteFault { .. }
            | UpstreamError::Unsupported { .. }
            | UpstreamError::MalformedResponse { .. } => ErrorKind::RemoteFault,
        }
    }
}

/// A caller-supplied argument failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid argument '{field}': {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    /// Environment variable has invalid value
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    /// Failed to load .env file
    #[error("Failed to load .env file: {0}")]
    DotenvError(String),

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Other(String),
}

/// Error classes reported to MCP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    Timeout,
    ConnectionFailure,
    AuthenticationFailure,
    PermissionDenied,
    NotFound,
    RemoteFault,
    UnknownOperation,
    Internal,
}

/// Structured error payload returned by the dispatcher.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    pub troubleshooting: Vec<String>,
    pub context: Map<String, Value>,
}

/// Details used to personalise troubleshooting steps.
#[derive(Debug, Clone, Default)]
pub struct ServerIdentity {
    pub server_url: String,
    pub username: String,
}

impl ToolError {
    pub fn validation(operation: &str, err: &ValidationError) -> Self {
        let mut context = Map::new();
        context.insert("operation".into(), Value::from(operation));
        context.insert("field".into(), Value::from(err.field.clone()));
        Self {
            kind: ErrorKind::ValidationError,
            message: format!("Invalid input for {}: {}", operation, err),
            troubleshooting: vec!["Check the parameter values and try again".to_string()],
            context,
        }
    }

    pub fn unknown_operation(name: &str) -> Self {
        let mut context = Map::new();
        context.insert("operation".into(), Value::from(name));
        Self {
            kind: ErrorKind::UnknownOperation,
            message: format!("Unknown tool: {}", name),
            troubleshooting: vec!["List the available tools and check the spelling".to_string()],
            context,
        }
    }

    pub fn internal(operation: &str, message: impl Into<String>) -> Self {
        let mut context = Map::new();
        context.insert("operation".into(), Value::from(operation));
        Self {
            kind: ErrorKind::Internal,
            message: message.into(),
            troubleshooting: generic_steps(),
            context,
        }
    }

    /// Translate an adapter error into a payload with remediation guidance.
    pub fn upstream(operation: &str, err: &UpstreamError, identity: &ServerIdentity) -> Self {
        let url = &identity.server_url;
        let troubleshooting = match err.kind() {
            ErrorKind::Timeout => vec![
                "Check Jenkins server is running".to_string(),
                format!("Verify URL is correct: {}", url),
                "Ensure network/VPN connection is active".to_string(),
                "Check firewall settings".to_string(),
            ],
            ErrorKind::ConnectionFailure => vec![
                "Verify Jenkins server is accessible".to_string(),
                "Check port is correct (usually 8080)".to_string(),
                "Ensure firewall allows connection".to_string(),
                format!("Test with: curl {}/api/json", url),
            ],
            ErrorKind::AuthenticationFailure => vec![
                format!("Verify username is correct: {}", identity.username),
                "Check API token is valid (not expired)".to_string(),
                "Generate a new token in Jenkins under Your Name > Configure > API Token"
                    .to_string(),
                "Update JENKINS_TOKEN with the new token".to_string(),
            ],
            ErrorKind::PermissionDenied => vec![
                "Check user has permission to access Jenkins".to_string(),
                "Verify user has permission for this operation".to_string(),
                "Contact Jenkins admin to grant necessary permissions".to_string(),
            ],
            ErrorKind::NotFound => vec![
                "Check job/resource name is correct (case-sensitive)".to_string(),
                "Verify resource exists in Jenkins".to_string(),
                "Ensure user has permission to view the resource".to_string(),
                "Try listing all jobs with the 'list-jobs' tool".to_string(),
            ],
            _ => generic_steps(),
        };

        let ctx = err.context();
        let mut context = Map::new();
        context.insert("operation".into(), Value::from(operation));
        context.insert("upstream_call".into(), Value::from(ctx.operation.clone()));
        if let Some(target) = &ctx.target {
            context.insert("target".into(), Value::from(target.clone()));
        }
        if let Some(status) = err.status() {
            context.insert("status".into(), Value::from(status));
        }
        if err.kind() == ErrorKind::PermissionDenied {
            context.insert("username".into(), Value::from(identity.username.clone()));
        }

        Self {
            kind: err.kind(),
            message: err.to_string(),
            troubleshooting,
            context,
        }
    }
}

fn generic_steps() -> Vec<String> {
    vec![
        "Run the 'health-check' tool to verify connection".to_string(),
        "Check Jenkins logs for more details".to_string(),
        "Verify all parameters are correct".to_string(),
        "Try the operation manually in Jenkins UI".to_string(),
    ]
}

/// Convenience type alias for Results with UpstreamError
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Convenience type alias for Results with ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Convenience type alias for Results with ValidationError
pub type ValidationResult<T> = Result<T, ValidationError>;
