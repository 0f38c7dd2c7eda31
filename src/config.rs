//! Configuration management for the Jenkins MCP Gateway.
//!
//! This module handles loading and validating configuration from environment variables.
//! It avoids polluting stdout (which MCP uses for communication) by loading the
//! .env file through `dotenvy`, which never prints.

use crate::error::{ConfigError, ConfigResult, ServerIdentity};
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Configuration for the Jenkins MCP Gateway.
#[derive(Clone)]
pub struct Config {
    /// Jenkins base URL, without trailing slash
    pub jenkins_url: String,

    /// Jenkins username
    pub username: String,

    /// API token (preferred) or password
    pub api_token: String,

    /// Whether `api_token` came from JENKINS_TOKEN rather than JENKINS_PASSWORD
    pub uses_token: bool,

    /// Overall request timeout in seconds (default: 30)
    pub timeout: u64,

    /// Connect timeout in seconds (default: 10)
    pub connect_timeout: u64,

    /// Read timeout in seconds (default: 30)
    pub read_timeout: u64,

    /// Retries after the first attempt (default: 3)
    pub max_retries: u32,

    /// Base backoff delay in milliseconds (default: 500)
    pub retry_base_delay_ms: u64,

    /// Default console line limit (default: 1000)
    pub console_max_lines: usize,

    /// TTL for stable reads such as job lists and configs (default: 30)
    pub cache_ttl_secs: u64,

    /// TTL for volatile reads such as queue and running builds (default: 5)
    pub cache_short_ttl_secs: u64,

    /// Metrics history capacity (default: 1000)
    pub metrics_history: usize,

    /// How long trigger-build waits for a queued build to start (default: 30)
    pub build_start_timeout_secs: u64,

    /// Requested TLS verification. Certificates are always verified.
    pub verify_ssl: bool,

    /// Log level (default: "error")
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `JENKINS_URL`: Base URL of the Jenkins server
    /// - `JENKINS_USERNAME`: User to authenticate as
    /// - `JENKINS_TOKEN` or `JENKINS_PASSWORD`: Credential (token preferred)
    ///
    /// Optional environment variables:
    /// - `JENKINS_TIMEOUT` (5-300, default 30)
    /// - `JENKINS_CONNECT_TIMEOUT` (2-60, default 10)
    /// - `JENKINS_READ_TIMEOUT` (5-300, default 30)
    /// - `JENKINS_MAX_RETRIES` (0-10, default 3)
    /// - `JENKINS_RETRY_BASE_DELAY_MS` (0-60000, default 500)
    /// - `JENKINS_CONSOLE_MAX_LINES` (10-50000, default 1000)
    /// - `JENKINS_CACHE_TTL_SECS` (default 30)
    /// - `JENKINS_CACHE_SHORT_TTL_SECS` (default 5)
    /// - `JENKINS_METRICS_HISTORY` (default 1000)
    /// - `JENKINS_BUILD_START_TIMEOUT_SECS` (default 30)
    /// - `JENKINS_VERIFY_SSL` (default true)
    /// - `LOG_LEVEL`: Logging level (default: "error")
    pub fn from_env() -> ConfigResult<Self> {
        // Try to load .env file if it exists (but don't fail if it doesn't)
        let _ = dotenvy::dotenv();
        Self::from_current_env()
    }

    /// Load configuration after reading a specific env file.
    ///
    /// Unlike [`Config::from_env`], a missing or unreadable file is an error.
    pub fn from_env_file(path: &Path) -> ConfigResult<Self> {
        dotenvy::from_path(path)
            .map_err(|e| ConfigError::DotenvError(format!("{}: {}", path.display(), e)))?;
        Self::from_current_env()
    }

    fn from_current_env() -> ConfigResult<Self> {
        let jenkins_url = env::var("JENKINS_URL")
            .map_err(|_| ConfigError::MissingVar("JENKINS_URL".to_string()))?;
        let jenkins_url = jenkins_url.trim().trim_end_matches('/').to_string();

        if !jenkins_url.starts_with("http://") && !jenkins_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                var: "JENKINS_URL".to_string(),
                reason: "Must start with http:// or https://".to_string(),
            });
        }

        let username = env::var("JENKINS_USERNAME")
            .map_err(|_| ConfigError::MissingVar("JENKINS_USERNAME".to_string()))?;
        if username.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                var: "JENKINS_USERNAME".to_string(),
                reason: "Cannot be empty".to_string(),
            });
        }

        let (api_token, uses_token) = Self::credential()?;

        let timeout = Self::parse_env_u64_in("JENKINS_TIMEOUT", 30, 5, 300)?;
        let connect_timeout = Self::parse_env_u64_in("JENKINS_CONNECT_TIMEOUT", 10, 2, 60)?;
        let read_timeout = Self::parse_env_u64_in("JENKINS_READ_TIMEOUT", 30, 5, 300)?;
        let max_retries = Self::parse_env_u64_in("JENKINS_MAX_RETRIES", 3, 0, 10)? as u32;
        let retry_base_delay_ms =
            Self::parse_env_u64_in("JENKINS_RETRY_BASE_DELAY_MS", 500, 0, 60_000)?;
        let console_max_lines =
            Self::parse_env_u64_in("JENKINS_CONSOLE_MAX_LINES", 1000, 10, 50_000)? as usize;
        let cache_ttl_secs = Self::parse_env_u64("JENKINS_CACHE_TTL_SECS", 30)?;
        let cache_short_ttl_secs = Self::parse_env_u64("JENKINS_CACHE_SHORT_TTL_SECS", 5)?;
        let metrics_history =
            Self::parse_env_u64_in("JENKINS_METRICS_HISTORY", 1000, 1, 1_000_000)? as usize;
        let build_start_timeout_secs =
            Self::parse_env_u64("JENKINS_BUILD_START_TIMEOUT_SECS", 30)?;
        let verify_ssl = Self::parse_env_bool("JENKINS_VERIFY_SSL", true)?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "error".to_string());

        Ok(Config {
            jenkins_url,
            username: username.trim().to_string(),
            api_token,
            uses_token,
            timeout,
            connect_timeout,
            read_timeout,
            max_retries,
            retry_base_delay_ms,
            console_max_lines,
            cache_ttl_secs,
            cache_short_ttl_secs,
            metrics_history,
            build_start_timeout_secs,
            verify_ssl,
            log_level,
        })
    }

    /// Token wins over password when both are set.
    fn credential() -> ConfigResult<(String, bool)> {
        let non_empty = |var: &str| {
            env::var(var)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(token) = non_empty("JENKINS_TOKEN") {
            return Ok((token, true));
        }
        if let Some(password) = non_empty("JENKINS_PASSWORD") {
            return Ok((password, false));
        }
        Err(ConfigError::MissingVar(
            "JENKINS_TOKEN or JENKINS_PASSWORD".to_string(),
        ))
    }

    /// "token" or "password", for startup logging.
    pub fn auth_method(&self) -> &'static str {
        if self.uses_token {
            "token"
        } else {
            "password"
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_short_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_short_ttl_secs)
    }

    pub fn identity(&self) -> ServerIdentity {
        ServerIdentity {
            server_url: self.jenkins_url.clone(),
            username: self.username.clone(),
        }
    }

    /// Parse an environment variable as u64 with a default value.
    fn parse_env_u64(var_name: &str, default: u64) -> ConfigResult<u64> {
        match env::var(var_name) {
            Ok(val) => val.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse an environment variable as u64 and require it to lie in `min..=max`.
    fn parse_env_u64_in(var_name: &str, default: u64, min: u64, max: u64) -> ConfigResult<u64> {
        let value = Self::parse_env_u64(var_name, default)?;
        if value < min || value > max {
            return Err(ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be between {} and {}, got: {}", min, max, value),
            });
        }
        Ok(value)
    }

    fn parse_env_bool(var_name: &str, default: bool) -> ConfigResult<bool> {
        match env::var(var_name) {
            Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    var: var_name.to_string(),
                    reason: format!("Must be true or false, got: {}", val),
                }),
            },
            Err(_) => Ok(default),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("jenkins_url", &self.jenkins_url)
            .field("username", &self.username)
            .field("api_token", &"<redacted>")
            .field("auth_method", &self.auth_method())
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("console_max_lines", &self.console_max_lines)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("cache_short_ttl_secs", &self.cache_short_ttl_secs)
            .field("metrics_history", &self.metrics_history)
            .field("build_start_timeout_secs", &self.build_start_timeout_secs)
            .field("verify_ssl", &self.verify_ssl)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            jenkins_url: String::new(),
            username: String::new(),
            api_token: String::new(),
            uses_token: true,
            timeout: 30,
            connect_timeout: 10,
            read_timeout: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
            console_max_lines: 1000,
            cache_ttl_secs: 30,
            cache_short_ttl_secs: 5,
            metrics_history: 1000,
            build_start_timeout_secs: 30,
            verify_ssl: true,
            log_level: "error".to_string(),
        }
    }
}
