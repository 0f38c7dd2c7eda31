//! Build tools.

use super::{ToolContext, ToolParams};
use crate::cache::keys;
use crate::error::{UpstreamResult, ValidationResult};
use crate::validation::{self, Args};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Bounds for `max_lines` on console requests.
pub const MIN_CONSOLE_LINES: i64 = 10;
pub const MAX_CONSOLE_LINES: i64 = 10_000;

/// Interval between queue polls while waiting for a triggered build to start.
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Parameters naming a single build.
#[derive(Debug, Clone, JsonSchema)]
pub struct BuildParams {
    /// Job name; use `folder/job` for jobs inside folders
    pub job_name: String,

    /// Build number
    #[schemars(range(min = 0))]
    pub build_number: u64,
}

impl ToolParams for BuildParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            job_name: validation::job_name(args, "job_name")?,
            build_number: validation::build_number(args, "build_number")?,
        })
    }
}

/// Parameters for `get-build-console`.
#[derive(Debug, Clone, JsonSchema)]
pub struct ConsoleParams {
    /// Job name; use `folder/job` for jobs inside folders
    pub job_name: String,

    /// Build number
    #[schemars(range(min = 0))]
    pub build_number: u64,

    /// Maximum lines to return (10-10000, default from server configuration)
    #[schemars(range(min = 10, max = 10000))]
    pub max_lines: Option<i64>,

    /// Return the last lines instead of the first ones
    #[schemars(default)]
    pub tail_only: bool,
}

impl ToolParams for ConsoleParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        let max_lines = match args.get("max_lines").filter(|v| !v.is_null()) {
            Some(_) => Some(validation::optional_clamped_int(
                args,
                "max_lines",
                MIN_CONSOLE_LINES,
                MIN_CONSOLE_LINES,
                MAX_CONSOLE_LINES,
            )?),
            None => None,
        };

        Ok(Self {
            job_name: validation::job_name(args, "job_name")?,
            build_number: validation::build_number(args, "build_number")?,
            max_lines,
            tail_only: validation::optional_bool(args, "tail_only", false)?,
        })
    }
}

/// Parameters for `trigger-build`.
#[derive(Debug, Clone, JsonSchema)]
pub struct TriggerBuildParams {
    /// Job name; use `folder/job` for jobs inside folders
    pub job_name: String,

    /// Build parameters for parameterised jobs
    pub parameters: Option<Map<String, Value>>,

    /// Wait until the build leaves the queue and report its number
    #[schemars(default)]
    pub wait_for_start: bool,
}

impl ToolParams for TriggerBuildParams {
    fn from_args(args: &Args) -> ValidationResult<Self> {
        Ok(Self {
            job_name: validation::job_name(args, "job_name")?,
            parameters: validation::optional_object(args, "parameters")?,
            wait_for_start: validation::optional_bool(args, "wait_for_start", false)?,
        })
    }
}

/// A window onto a console log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleExcerpt {
    pub total_lines: usize,
    pub shown_lines: usize,
    pub truncated: bool,
    pub notice: String,
    pub output: String,
}

/// Keep at most `max_lines` lines, from the start or (with `tail_only`) the end.
pub fn excerpt_console(text: &str, max_lines: usize, tail_only: bool) -> ConsoleExcerpt {
    let lines: Vec<&str> = text.split('\n').collect();
    let total = lines.len();

    if total <= max_lines {
        return ConsoleExcerpt {
            total_lines: total,
            shown_lines: total,
            truncated: false,
            notice: format!("Complete output: {} lines", total),
            output: text.to_string(),
        };
    }

    let omitted = total - max_lines;
    let (shown, notice) = if tail_only {
        (
            &lines[omitted..],
            format!(
                "Showing last {} of {} lines - {} earlier lines omitted. \
                 Increase max_lines to see more (max: {})",
                max_lines, total, omitted, MAX_CONSOLE_LINES
            ),
        )
    } else {
        (
            &lines[..max_lines],
            format!(
                "Showing first {} of {} lines - {} later lines truncated. \
                 Set tail_only=true to see the last {} lines, or increase max_lines (max: {})",
                max_lines, total, omitted, max_lines, MAX_CONSOLE_LINES
            ),
        )
    };

    ConsoleExcerpt {
        total_lines: total,
        shown_lines: shown.len(),
        truncated: true,
        notice,
        output: shown.join("\n"),
    }
}

/// Build inspection and control tools.
pub struct BuildTools {
    ctx: Arc<ToolContext>,
}

impl BuildTools {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    /// Build details. Running builds are cached briefly; finished builds no
    /// longer change and use the standard TTL.
    pub async fn get_build_info(&self, params: BuildParams) -> UpstreamResult<Value> {
        let ctx = &self.ctx;
        let job = params.job_name.as_str();
        let number = params.build_number;

        ctx.cached_with(&keys::build_info(job, number), || async {
            let build = ctx.client().await?.get_build_info(job, number).await?;
            let ttl = if build.building {
                ctx.config().cache_short_ttl()
            } else {
                ctx.config().cache_ttl()
            };

            let value = json!({
                "number": build.number,
                "result": build.result,
                "status": build.status(),
                "timestamp": build.timestamp,
                "duration_seconds": build.duration_seconds(),
                "url": build.url,
                "building": build.building,
                "changes": build.changes(),
            });
            Ok((value, ttl))
        })
        .await
    }

    pub async fn get_build_console(&self, params: ConsoleParams) -> UpstreamResult<Value> {
        let max_lines = params
            .max_lines
            .map(|n| n as usize)
            .unwrap_or(self.ctx.config().console_max_lines);

        let text = self
            .ctx
            .client()
            .await?
            .get_console_text(&params.job_name, params.build_number)
            .await?;
        let excerpt = excerpt_console(&text, max_lines, params.tail_only);

        Ok(json!({
            "job_name": params.job_name,
            "build_number": params.build_number,
            "total_lines": excerpt.total_lines,
            "shown_lines": excerpt.shown_lines,
            "truncated": excerpt.truncated,
            "tail_only": params.tail_only,
            "notice": excerpt.notice,
            "output": excerpt.output,
        }))
    }

    /// Queue a build and, if asked, wait for it to start.
    pub async fn trigger_build(&self, params: TriggerBuildParams) -> UpstreamResult<Value> {
        let client = self.ctx.client().await?;
        let queued = client
            .trigger_build(&params.job_name, params.parameters.as_ref())
            .await?;
        self.ctx.invalidate(&keys::job_builds(&params.job_name));
        tracing::info!(
            job = %params.job_name,
            queue_id = ?queued.queue_id,
            "Triggered build"
        );

        let mut status = "queued";
        let mut build_number = None;
        if params.wait_for_start {
            match queued.queue_id {
                Some(queue_id) => {
                    let (started, outcome) = self.wait_for_start(queue_id).await;
                    build_number = started;
                    status = outcome;
                }
                None => {
                    tracing::warn!(
                        job = %params.job_name,
                        "No queue location returned, cannot wait for build start"
                    );
                }
            }
        }

        Ok(json!({
            "job_name": params.job_name,
            "queue_id": queued.queue_id,
            "build_number": build_number,
            "status": status,
            "parameters": params.parameters,
        }))
    }

    /// Poll a queue item until it carries a build number, is cancelled, or the
    /// configured wait expires.
    async fn wait_for_start(&self, queue_id: u64) -> (Option<u64>, &'static str) {
        let deadline = tokio::time::Instant::now()
            + Duration::from_secs(self.ctx.config().build_start_timeout_secs);

        loop {
            let item = match self.ctx.client().await {
                Ok(client) => client.get_queue_item(queue_id).await,
                Err(e) => Err(e),
            };

            match item {
                Ok(item) if item.cancelled => return (None, "cancelled"),
                Ok(item) => {
                    if let Some(number) = item.build_number() {
                        return (Some(number), "started");
                    }
                }
                Err(e) => {
                    tracing::warn!(queue_id, error = %e, "Stopped polling queue item");
                    return (None, "queued");
                }
            }

            if tokio::time::Instant::now() + QUEUE_POLL_INTERVAL > deadline {
                tracing::debug!(queue_id, "Build did not start before the wait expired");
                return (None, "queued");
            }
            tokio::time::sleep(QUEUE_POLL_INTERVAL).await;
        }
    }

    pub async fn stop_build(&self, params: BuildParams) -> UpstreamResult<Value> {
        self.ctx
            .client()
            .await?
            .stop_build(&params.job_name, params.build_number)
            .await?;
        self.ctx.invalidate(&keys::job_builds(&params.job_name));
        tracing::info!(job = %params.job_name, build = params.build_number, "Stopped build");

        Ok(json!({
            "job_name": params.job_name,
            "build_number": params.build_number,
            "stopped": true,
        }))
    }
}
