//! Conversion Gateway: uploaded documents to markdown via the MarkItDown MCP server.
//!
//! No fallback at this layer: every gateway error reaches the caller. The
//! upload handler decides whether the bundled PDF parser can stand in.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

use crate::gateway::normalize;
use crate::gateway::{Connector, GatewayClient, GatewayError, ServiceProfile, ToolServerSettings};

pub mod handlers;
pub mod local_pdf;

pub const CONVERT_TOOL_ID: &str = "convert_to_markdown";

pub static MARKITDOWN: ServiceProfile = ServiceProfile {
    name: "markitdown",
    env_prefix: "MARKITDOWN",
    default_url: "http://127.0.0.1:3001/mcp",
    launcher: None,
    fallback_command: "uvx",
    fallback_args: &["markitdown-mcp"],
    output_dir_env: None,
};

pub struct ConversionGateway {
    client: GatewayClient,
}

impl ConversionGateway {
    pub fn new(settings: ToolServerSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            client: GatewayClient::new(&MARKITDOWN, settings, CONVERT_TOOL_ID, connector, None),
        }
    }

    /// Converts a remote URL, local file URI, or `data:` URI to markdown.
    pub async fn convert(&self, uri: &str) -> Result<String, GatewayError> {
        if uri.trim().is_empty() {
            return Err(GatewayError::InvalidInput(
                "A non-empty URI is required to convert a document to markdown.".to_string(),
            ));
        }

        let response = self.client.call_tool(json!({ "uri": uri })).await?;
        normalize::extract_text(&response)
    }
}

/// Inline `data:` URI for an uploaded file.
pub fn data_uri(content_type: Option<&str>, bytes: &[u8]) -> String {
    let mime = content_type
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("application/octet-stream");
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}
