//! MCP server for the Jenkins gateway.
//!
//! Every operation is listed as an MCP tool and every `call_tool` request goes
//! through [`ToolDispatcher::dispatch`], including unknown names and malformed
//! arguments, so validation, metrics and error payloads behave the same for all
//! of them. Jobs are also exposed as `jenkins://` resources, next to two
//! analysis prompts; both fetch their data through the same dispatcher.

pub mod prompts;
pub mod resources;

use crate::dispatcher::{Operation, ToolDispatcher};
use crate::error::ToolError;
use anyhow::Result;
use rmcp::model::*;
use rmcp::service::{RequestContext, RoleServer};
use rmcp::transport::io::stdio;
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};
use serde_json::Value;
use std::sync::Arc;

/// The Jenkins MCP server.
#[derive(Clone)]
pub struct JenkinsMcpServer {
    dispatcher: Arc<ToolDispatcher>,
}

impl JenkinsMcpServer {
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Tool descriptors for every operation.
    pub fn tools() -> Vec<Tool> {
        Operation::ALL
            .iter()
            .map(|op| Tool::new(op.as_str(), op.description(), Arc::new(op.input_schema())))
            .collect()
    }

    /// Every job as a `jenkins://job/{name}` resource.
    pub async fn resources(&self) -> Vec<Resource> {
        resources::list(&self.dispatcher).await
    }

    /// Contents of one `jenkins://` resource.
    pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        resources::read(&self.dispatcher, uri).await
    }

    pub fn prompts() -> Vec<Prompt> {
        prompts::list()
    }

    /// Render the prompt `name`.
    pub async fn prompt(
        &self,
        name: &str,
        arguments: &JsonObject,
    ) -> Result<GetPromptResult, McpError> {
        prompts::get(&self.dispatcher, name, arguments).await
    }

    /// Dispatch a tool call and render the outcome as MCP content.
    pub async fn call(&self, name: &str, arguments: JsonObject) -> CallToolResult {
        match self.dispatcher.dispatch(name, &arguments).await {
            Ok(value) => CallToolResult::success(vec![Content::text(render(&value))]),
            Err(err) => CallToolResult::error(vec![Content::text(render_error(&err))]),
        }
    }
}

fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn render_error(err: &ToolError) -> String {
    serde_json::to_string_pretty(err).unwrap_or_else(|_| err.message.clone())
}

impl ServerHandler for JenkinsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities {
                tools: Some(Default::default()),
                resources: Some(Default::default()),
                prompts: Some(Default::default()),
                ..Default::default()
            },
            server_info: Implementation {
                name: "jenkins-mcp-gateway".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                title: None,
                website_url: None,
            },
            instructions: Some(
                "MCP server for Jenkins CI/CD - inspect jobs, builds, queue and nodes, \
                 trigger and stop builds, and manage job configuration. \
                 Each job is readable as a jenkins://job/{name} resource; the \
                 analyze-job-status and analyze-build-logs prompts summarize job health \
                 and build logs. Run health-check first if calls fail."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: Self::tools(),
            next_cursor: None,
        })
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = self.resources().await;
        tracing::debug!(count = resources.len(), "Listing resources");
        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read(&request.uri).await
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult {
            prompts: Self::prompts(),
            next_cursor: None,
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        let arguments = request.arguments.unwrap_or_default();
        self.prompt(&request.name, &arguments).await
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = request.arguments.unwrap_or_default();
        Ok(self.call(&request.name, arguments).await)
    }
}

/// Run the MCP server over stdio until the client disconnects.
pub async fn run_server(server: JenkinsMcpServer) -> Result<()> {
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
