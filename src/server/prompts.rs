//! Analysis prompts.
//!
//! Prompts gather Jenkins data through the dispatcher and wrap it in a single
//! user message. Upstream failures do not fail the request: the prompt turns
//! into one asking for help diagnosing the failure.

use crate::dispatcher::ToolDispatcher;
use crate::validation::Args;
use rmcp::model::{
    GetPromptResult, JsonObject, Prompt, PromptArgument, PromptMessage, PromptMessageRole,
};
use rmcp::ErrorData as McpError;
use serde_json::{json, Value};

pub const ANALYZE_JOB_STATUS: &str = "analyze-job-status";
pub const ANALYZE_BUILD_LOGS: &str = "analyze-build-logs";

/// Console text beyond this many characters is cut from build log prompts.
pub const MAX_CONSOLE_CHARS: usize = 10_000;

fn argument(name: &str, description: &str, required: bool) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        title: None,
        description: Some(description.to_string()),
        required: Some(required),
    }
}

pub fn list() -> Vec<Prompt> {
    vec![
        Prompt::new(
            ANALYZE_JOB_STATUS,
            Some("Analyze the status of Jenkins jobs"),
            Some(vec![argument(
                "detail_level",
                "Level of analysis detail (brief/detailed)",
                false,
            )]),
        ),
        Prompt::new(
            ANALYZE_BUILD_LOGS,
            Some("Analyze build logs for a specific job"),
            Some(vec![
                argument("job_name", "Name of the Jenkins job", true),
                argument("build_number", "Build number (default: latest)", false),
            ]),
        ),
    ]
}

fn user_prompt(description: String, text: String) -> GetPromptResult {
    GetPromptResult {
        description: Some(description),
        messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
    }
}

/// Render the prompt `name` with `arguments`.
pub async fn get(
    dispatcher: &ToolDispatcher,
    name: &str,
    arguments: &JsonObject,
) -> Result<GetPromptResult, McpError> {
    match name {
        ANALYZE_JOB_STATUS => Ok(job_status(dispatcher, arguments).await),
        ANALYZE_BUILD_LOGS => build_logs(dispatcher, arguments).await,
        other => Err(McpError::invalid_params(
            format!("Unknown prompt: {}", other),
            None,
        )),
    }
}

async fn job_status(dispatcher: &ToolDispatcher, arguments: &JsonObject) -> GetPromptResult {
    let detail = match arguments.get("detail_level").and_then(Value::as_str) {
        Some("detailed") => " Provide extensive analysis.",
        _ => "",
    };

    let listing = match dispatcher.dispatch("list-jobs", &Args::new()).await {
        Ok(listing) => listing,
        Err(err) => {
            tracing::error!(
                prompt = ANALYZE_JOB_STATUS,
                error = %err.message,
                "Prompt data unavailable"
            );
            return user_prompt(
                "Error retrieving Jenkins jobs".to_string(),
                format!(
                    "I tried to get information about Jenkins jobs but encountered an error: {}\n\n\
                     Please help diagnose what might be wrong with my Jenkins connection or configuration.",
                    err.message
                ),
            );
        }
    };

    let jobs: Vec<String> = listing["jobs"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|job| {
            format!(
                "- {}: Status={}",
                job["name"].as_str().unwrap_or_default(),
                job["status"].as_str().unwrap_or("unknown")
            )
        })
        .collect();

    user_prompt(
        "Analyze Jenkins job statuses".to_string(),
        format!(
            "Here are the current Jenkins jobs to analyze:{}\n\n{}\n\n\
             Please provide insights on the status of these jobs, identify any potential issues, \
             and suggest next steps to maintain a healthy CI/CD environment.",
            detail,
            jobs.join("\n")
        ),
    )
}

/// `build_number` may arrive as a JSON number or as a numeric string.
fn requested_build(arguments: &JsonObject) -> Result<Option<u64>, McpError> {
    let invalid = |value: &Value| {
        McpError::invalid_params(
            format!("build_number must be a non-negative integer, got {}", value),
            None,
        )
    };
    match arguments.get("build_number") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(&Value::from(s.as_str()))),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| invalid(value)),
    }
}

/// Keep the first [`MAX_CONSOLE_CHARS`] characters of `console`.
pub fn truncate_console(console: &str) -> String {
    match console.char_indices().nth(MAX_CONSOLE_CHARS) {
        Some((cut, _)) => format!("{}\n... (output truncated)", &console[..cut]),
        None => console.to_string(),
    }
}

async fn build_logs(
    dispatcher: &ToolDispatcher,
    arguments: &JsonObject,
) -> Result<GetPromptResult, McpError> {
    let job = arguments
        .get("job_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|job| !job.is_empty())
        .ok_or_else(|| McpError::invalid_params("Missing required argument: job_name", None))?;
    let requested = requested_build(arguments)?;

    match fetch_build_log(dispatcher, job, requested).await {
        Ok(Some(prompt)) => Ok(prompt),
        Ok(None) => Ok(user_prompt(
            format!("No builds found for job: {}", job),
            format!(
                "I tried to analyze build logs for the Jenkins job '{}', but no builds were found.\n\n\
                 Please help me understand why this job might not have any builds and suggest how to investigate.",
                job
            ),
        )),
        Err(message) => {
            tracing::error!(
                prompt = ANALYZE_BUILD_LOGS,
                job,
                error = %message,
                "Prompt data unavailable"
            );
            Ok(user_prompt(
                "Error retrieving build information".to_string(),
                format!(
                    "I tried to analyze build logs for the Jenkins job '{}' but encountered an error: {}\n\n\
                     Please help diagnose what might be wrong with my Jenkins connection, configuration, or the job itself.",
                    job, message
                ),
            ))
        }
    }
}

async fn call(dispatcher: &ToolDispatcher, name: &str, args: Value) -> Result<Value, String> {
    let args: Args = args.as_object().cloned().unwrap_or_default();
    dispatcher.dispatch(name, &args).await.map_err(|err| err.message)
}

/// `None` when no build was requested and the job has never run.
async fn fetch_build_log(
    dispatcher: &ToolDispatcher,
    job: &str,
    requested: Option<u64>,
) -> Result<Option<GetPromptResult>, String> {
    let number = match requested {
        Some(number) => number,
        None => {
            let last =
                call(dispatcher, "get-last-build-number", json!({"job_name": job})).await?;
            match last["last_build_number"].as_u64() {
                Some(number) => number,
                None => return Ok(None),
            }
        }
    };

    let build = call(
        dispatcher,
        "get-build-info",
        json!({"job_name": job, "build_number": number}),
    )
    .await?;
    let console = call(
        dispatcher,
        "get-build-console",
        json!({"job_name": job, "build_number": number, "max_lines": 10_000}),
    )
    .await?;

    let result = build["result"].as_str().unwrap_or("UNKNOWN");
    let duration = build["duration_seconds"].as_f64().unwrap_or(0.0);
    let output = truncate_console(console["output"].as_str().unwrap_or_default());

    Ok(Some(user_prompt(
        format!("Analysis of build #{} for job: {}", number, job),
        format!(
            "Please analyze the following Jenkins build logs for job '{}' (build #{}).\n\n\
             Build result: {}\n\
             Build duration: {:.1} seconds\n\n\
             Console output:\n```\n{}\n```\n\n\
             Please identify any issues, errors, or warnings in these logs. \
             If there are problems, suggest how to fix them. \
             If the build was successful, summarize what happened.",
            job, number, result, duration, output
        ),
    )))
}
