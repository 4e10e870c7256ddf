//! MCP client plumbing on top of `rmcp`.
//!
//! `ToolTransport` is one initialized session; `Connector` opens one from a
//! resolved `ToolServerConfig`. Tests swap in their own `Connector` to stand in
//! for remote servers.

use std::collections::BTreeMap;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::model::{CallToolRequestParam, JsonObject, Tool};
use rmcp::service::{RoleClient, RunningService, ServiceError};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess};
use rmcp::ServiceExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::gateway::resolver::{NetworkTarget, ProcessTarget, ToolServerConfig};
use crate::gateway::GatewayError;

#[derive(Debug, Clone, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

impl From<Tool> for ToolDescriptor {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name.into_owned(),
            description: tool.description.map(|d| d.into_owned()),
            input_schema: Some(Value::Object((*tool.input_schema).clone())),
        }
    }
}

#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Every tool the server exposes, all pages included.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError>;

    /// Invokes `name` and returns the `CallToolResult` as JSON.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, GatewayError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        config: &ToolServerConfig,
    ) -> Result<Arc<dyn ToolTransport>, GatewayError>;
}

/// Default connector: Streamable HTTP for network targets, a child process
/// speaking stdio for process targets.
#[derive(Debug, Default)]
pub struct McpConnector;

#[async_trait]
impl Connector for McpConnector {
    async fn connect(
        &self,
        config: &ToolServerConfig,
    ) -> Result<Arc<dyn ToolTransport>, GatewayError> {
        let timeout = config.timeout();
        let handshake = async {
            match config {
                ToolServerConfig::Network(target) => {
                    ().serve(http_transport(target)?).await.map_err(|e| {
                        GatewayError::Transport(format!(
                            "initialize {}: {e}",
                            target.endpoint
                        ))
                    })
                }
                ToolServerConfig::Process(target) => {
                    ().serve(child_transport(target)?).await.map_err(|e| {
                        GatewayError::Transport(format!("initialize '{}': {e}", target.command))
                    })
                }
            }
        };

        let service = tokio::time::timeout(timeout, handshake)
            .await
            .map_err(|_| timed_out("initialize", timeout))??;

        if let Some(info) = service.peer_info() {
            debug!(
                "Tool server initialized: {} {}",
                info.server_info.name, info.server_info.version
            );
        }
        Ok(Arc::new(McpSession { service, timeout }))
    }
}

fn http_transport(
    target: &NetworkTarget,
) -> Result<StreamableHttpClientTransport<reqwest::Client>, GatewayError> {
    let client = reqwest::Client::builder()
        .default_headers(header_map(&target.headers))
        .connect_timeout(target.timeout)
        .build()
        .map_err(|e| {
            GatewayError::Configuration(format!("HTTP client for {}: {e}", target.endpoint))
        })?;

    Ok(StreamableHttpClientTransport::with_client(
        client,
        StreamableHttpClientTransportConfig::with_uri(target.endpoint.as_str()),
    ))
}

fn child_transport(target: &ProcessTarget) -> Result<TokioChildProcess, GatewayError> {
    TokioChildProcess::new(Command::new(&target.command).configure(|cmd| {
        cmd.args(&target.args)
            .envs(&target.env)
            .stderr(Stdio::inherit());
    }))
    .map_err(|e| GatewayError::Transport(format!("failed to spawn '{}': {e}", target.command)))
}

fn header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!("Skipping invalid tool server header '{key}'"),
        }
    }
    map
}

/// A live `rmcp` client session. Dropping it closes the connection.
struct McpSession {
    service: RunningService<RoleClient, ()>,
    timeout: Duration,
}

impl McpSession {
    async fn bounded<T>(
        &self,
        method: &str,
        call: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, GatewayError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| timed_out(method, self.timeout))?
            .map_err(service_error)
    }
}

#[async_trait]
impl ToolTransport for McpSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError> {
        let tools = self
            .bounded("tools/list", self.service.list_all_tools())
            .await?;
        Ok(tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, GatewayError> {
        let request = CallToolRequestParam {
            name: name.to_string().into(),
            arguments: tool_arguments(arguments)?,
        };
        let result = self
            .bounded("tools/call", self.service.call_tool(request))
            .await?;
        serde_json::to_value(result)
            .map_err(|e| GatewayError::MalformedResponse(format!("tools/call result: {e}")))
    }
}

fn tool_arguments(arguments: Value) -> Result<Option<JsonObject>, GatewayError> {
    match arguments {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        other => Err(GatewayError::InvalidInput(format!(
            "tool arguments must be a JSON object, got {other}"
        ))),
    }
}

/// Server-side JSON-RPC errors leave the connection usable; everything else
/// means it is gone.
fn service_error(error: ServiceError) -> GatewayError {
    match error {
        ServiceError::McpError(data) => {
            GatewayError::MalformedResponse(format!("server rejected the request: {}", data.message))
        }
        other => GatewayError::Transport(other.to_string()),
    }
}

fn timed_out(method: &str, timeout: Duration) -> GatewayError {
    GatewayError::Transport(format!(
        "{method} timed out after {}ms",
        timeout.as_millis()
    ))
}
