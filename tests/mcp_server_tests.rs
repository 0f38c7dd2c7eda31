//! Tests for the MCP layer: tool listing, rendering of dispatch outcomes, and
//! the `jenkins://` resources and analysis prompts.

mod mocks;

use jenkins_mcp_gateway::error::{ErrorContext, UpstreamError};
use jenkins_mcp_gateway::JenkinsMcpServer;
use mocks::{args, dispatcher_with, test_config, MockJenkinsClient};
use rmcp::model::{GetPromptResult, ReadResourceResult};
use rmcp::ServerHandler;
use serde_json::{json, Value};
use std::sync::Arc;

fn server_with(mock: &MockJenkinsClient) -> JenkinsMcpServer {
    let (dispatcher, _) = dispatcher_with(Arc::new(mock.clone()), test_config());
    JenkinsMcpServer::new(Arc::new(dispatcher))
}

/// Serialize a tool result and decode the JSON document in its text content.
fn decode(result: &rmcp::model::CallToolResult) -> (bool, Value) {
    let raw = serde_json::to_value(result).unwrap();
    let is_error = raw["isError"].as_bool().unwrap_or(false);
    let text = raw["content"][0]["text"].as_str().unwrap().to_string();
    (is_error, serde_json::from_str(&text).unwrap())
}

/// Text of the first resource contents entry, with its mime type.
fn resource_text(result: &ReadResourceResult) -> (String, String) {
    let raw = serde_json::to_value(result).unwrap();
    (
        raw["contents"][0]["mimeType"].as_str().unwrap().to_string(),
        raw["contents"][0]["text"].as_str().unwrap().to_string(),
    )
}

/// Description and text of a single-message prompt.
fn prompt_text(result: &GetPromptResult) -> (String, String) {
    let raw = serde_json::to_value(result).unwrap();
    assert_eq!(raw["messages"].as_array().unwrap().len(), 1);
    assert_eq!(raw["messages"][0]["role"], "user");
    (
        raw["description"].as_str().unwrap().to_string(),
        raw["messages"][0]["content"]["text"].as_str().unwrap().to_string(),
    )
}

#[test]
fn test_server_info() {
    let mock = MockJenkinsClient::new();
    let info = server_with(&mock).get_info();

    assert_eq!(info.server_info.name, "jenkins-mcp-gateway");
    assert!(info.capabilities.tools.is_some());
    assert!(info.capabilities.resources.is_some());
    assert!(info.capabilities.prompts.is_some());
    assert!(info.instructions.unwrap().contains("health-check"));
}

#[test]
fn test_tool_names_are_dashed_and_unique() {
    let tools = JenkinsMcpServer::tools();
    let mut names: Vec<String> = tools.iter().map(|t| t.name.to_string()).collect();
    names.sort();
    names.dedup();

    assert_eq!(names.len(), tools.len());
    assert!(names.iter().all(|n| !n.contains('_')));
    assert!(names.contains(&"get-build-console".to_string()));
    assert!(names.contains(&"clear-cache".to_string()));
}

#[tokio::test]
async fn test_successful_call_renders_pretty_json() {
    let mock = MockJenkinsClient::new();
    mock.add_job("api", &[1]);
    mock.add_job("web", &[]);
    let server = server_with(&mock);

    let result = server.call("list-jobs", args(json!({}))).await;
    let (is_error, body) = decode(&result);

    assert!(!is_error);
    assert_eq!(body["count"], 2);
    assert_eq!(body["jobs"][0]["name"], "api");
}

#[tokio::test]
async fn test_validation_failure_is_error_result() {
    let mock = MockJenkinsClient::new();
    let server = server_with(&mock);

    let result = server
        .call("get-build-info", args(json!({"job_name": "api", "build_number": -1})))
        .await;
    let (is_error, body) = decode(&result);

    assert!(is_error);
    assert_eq!(body["kind"], "validation_error");
    assert_eq!(body["context"]["field"], "build_number");
    assert!(!body["troubleshooting"].as_array().unwrap().is_empty());
    assert_eq!(mock.total_calls(), 0);
}

#[tokio::test]
async fn test_unknown_tool_is_error_result_and_recorded() {
    let mock = MockJenkinsClient::new();
    let server = server_with(&mock);

    let result = server.call("launch-rocket", args(json!({}))).await;
    let (is_error, body) = decode(&result);

    assert!(is_error);
    assert_eq!(body["kind"], "unknown_operation");

    let metrics = server.dispatcher().metrics();
    assert!(metrics.stats_for("launch-rocket").is_none());
    assert_eq!(metrics.stats_for("unknown").unwrap().failed_calls, 1);
    assert!(metrics.recent(1)[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("launch-rocket"));
}

#[tokio::test]
async fn test_resources_list_every_job_through_the_cache() {
    let mock = MockJenkinsClient::new();
    mock.add_job("api", &[1]);
    mock.add_job("team/web", &[]);
    let server = server_with(&mock);

    let resources = server.resources().await;
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[1].raw.uri, "jenkins://job/team/web");
    assert_eq!(resources[1].raw.name, "Job: team/web");
    assert_eq!(
        resources[1].raw.description.as_deref(),
        Some("Jenkins job: team/web (status: blue)")
    );
    assert_eq!(resources[1].raw.mime_type.as_deref(), Some("application/json"));

    server.resources().await;
    assert_eq!(mock.get_call_count("list_jobs"), 1);
    let stats = server.dispatcher().metrics().stats_for("list-jobs").unwrap();
    assert_eq!(stats.total_calls, 2);
}

#[tokio::test]
async fn test_resources_report_unreachable_server() {
    let mock = MockJenkinsClient::new();
    mock.fail_next(
        "list_jobs",
        UpstreamError::ConnectionFailure {
            context: ErrorContext::new("list_jobs", None),
            detail: "connection refused".to_string(),
        },
    );
    let server = server_with(&mock);

    let resources = server.resources().await;
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].raw.uri, "jenkins://error");
    assert_eq!(resources[0].raw.mime_type.as_deref(), Some("text/plain"));
    assert!(resources[0]
        .raw
        .description
        .as_deref()
        .unwrap()
        .starts_with("Error: "));

    let (mime, text) = resource_text(&server.read("jenkins://error").await.unwrap());
    assert_eq!(mime, "text/plain");
    assert!(text.contains("check your configuration"));
}

#[tokio::test]
async fn test_read_job_resource_prefers_last_build() {
    let mock = MockJenkinsClient::new();
    mock.add_job("api", &[10, 11]);
    mock.add_job("team/web", &[]);
    let server = server_with(&mock);

    let (mime, text) = resource_text(&server.read("jenkins://job/api").await.unwrap());
    let build: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(mime, "application/json");
    assert_eq!(build["number"], 11);
    assert_eq!(build["result"], "SUCCESS");

    let (_, text) = resource_text(&server.read("jenkins://job/team/web").await.unwrap());
    let job: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(job["fullName"], "team/web");
    assert!(job["lastBuild"].is_null());

    server.read("jenkins://job/api").await.unwrap();
    assert_eq!(mock.get_call_count("get_build_info"), 1);
}

#[tokio::test]
async fn test_read_missing_job_is_error_text() {
    let mock = MockJenkinsClient::new();
    let server = server_with(&mock);

    let (mime, text) = resource_text(&server.read("jenkins://job/ghost").await.unwrap());
    assert_eq!(mime, "text/plain");
    assert!(text.starts_with("Error retrieving job information:"));
}

#[tokio::test]
async fn test_read_rejects_other_uris() {
    let mock = MockJenkinsClient::new();
    let server = server_with(&mock);

    assert!(server.read("https://jenkins/job/api").await.is_err());
    assert!(server.read("jenkins://").await.is_err());
    assert!(server.read("jenkins://nodes/agent-1").await.is_err());
    assert_eq!(mock.total_calls(), 0);
}

#[test]
fn test_prompt_catalogue() {
    let prompts = JenkinsMcpServer::prompts();
    let names: Vec<&str> = prompts.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["analyze-job-status", "analyze-build-logs"]);

    let status_args = prompts[0].arguments.as_ref().unwrap();
    assert_eq!(status_args[0].name, "detail_level");
    assert_eq!(status_args[0].required, Some(false));
}

#[tokio::test]
async fn test_job_status_prompt() {
    let mock = MockJenkinsClient::new();
    mock.add_job("api", &[1]);
    mock.add_job("web", &[]);
    let server = server_with(&mock);

    let brief = server
        .prompt("analyze-job-status", &args(json!({})))
        .await
        .unwrap();
    let (description, text) = prompt_text(&brief);
    assert_eq!(description, "Analyze Jenkins job statuses");
    assert!(text.starts_with(
        "Here are the current Jenkins jobs to analyze:\n\n- api: Status=blue\n- web: Status=blue"
    ));
    assert!(!text.contains("extensive"));

    let detailed = server
        .prompt("analyze-job-status", &args(json!({"detail_level": "detailed"})))
        .await
        .unwrap();
    let (_, text) = prompt_text(&detailed);
    assert!(text
        .starts_with("Here are the current Jenkins jobs to analyze: Provide extensive analysis."));
    assert!(text.ends_with("maintain a healthy CI/CD environment."));
    assert_eq!(mock.get_call_count("list_jobs"), 1);
}

#[tokio::test]
async fn test_job_status_prompt_turns_failure_into_diagnosis() {
    let mock = MockJenkinsClient::new();
    mock.fail_next(
        "list_jobs",
        UpstreamError::ConnectionFailure {
            context: ErrorContext::new("list_jobs", None),
            detail: "connection refused".to_string(),
        },
    );
    let server = server_with(&mock);

    let result = server
        .prompt("analyze-job-status", &args(json!({})))
        .await
        .unwrap();
    let (description, text) = prompt_text(&result);
    assert_eq!(description, "Error retrieving Jenkins jobs");
    assert!(text.contains("encountered an error"));
}

#[tokio::test]
async fn test_build_logs_prompt_truncates_console() {
    let mock = MockJenkinsClient::new();
    mock.add_job("api", &[11, 12]);
    let console: String = (0..300)
        .map(|i| format!("[{:03}] {}\n", i, "compiling module ".repeat(4)))
        .collect();
    mock.set_console("api", 12, &console);
    mock.set_console("api", 11, "Started by user bot\nFinished: SUCCESS");
    let server = server_with(&mock);

    let latest = server
        .prompt("analyze-build-logs", &args(json!({"job_name": "api"})))
        .await
        .unwrap();
    let (description, text) = prompt_text(&latest);
    assert_eq!(description, "Analysis of build #12 for job: api");
    assert!(text.contains("Build result: SUCCESS\nBuild duration: 42.0 seconds"));
    assert!(text.contains("\n... (output truncated)\n```"));
    assert!(!text.contains("[299]"));

    let older = server
        .prompt(
            "analyze-build-logs",
            &args(json!({"job_name": "api", "build_number": "11"})),
        )
        .await
        .unwrap();
    let (description, text) = prompt_text(&older);
    assert_eq!(description, "Analysis of build #11 for job: api");
    assert!(text.contains("Finished: SUCCESS\n```"));
    assert!(!text.contains("truncated"));

    let metrics = server.dispatcher().metrics();
    assert_eq!(metrics.stats_for("get-build-console").unwrap().total_calls, 2);
    assert_eq!(metrics.stats_for("get-last-build-number").unwrap().total_calls, 1);
}

#[tokio::test]
async fn test_build_logs_prompt_without_builds() {
    let mock = MockJenkinsClient::new();
    mock.add_job("team/web", &[]);
    let server = server_with(&mock);

    let result = server
        .prompt("analyze-build-logs", &args(json!({"job_name": "team/web"})))
        .await
        .unwrap();
    let (description, text) = prompt_text(&result);
    assert_eq!(description, "No builds found for job: team/web");
    assert!(text.contains("no builds were found"));
    assert_eq!(mock.get_call_count("get_console_text"), 0);
}

#[tokio::test]
async fn test_prompt_argument_errors() {
    let mock = MockJenkinsClient::new();
    let server = server_with(&mock);

    assert!(server
        .prompt("analyze-build-logs", &args(json!({})))
        .await
        .is_err());
    assert!(server
        .prompt(
            "analyze-build-logs",
            &args(json!({"job_name": "api", "build_number": "latest"}))
        )
        .await
        .is_err());
    assert!(server
        .prompt("summarize-everything", &args(json!({})))
        .await
        .is_err());
    assert_eq!(mock.total_calls(), 0);
}
