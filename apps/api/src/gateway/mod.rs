//! External tool gateway: lazily connected MCP tool servers reached over HTTP or
//! a spawned stdio process.
//!
//! Layers, leaves first:
//! - `resolver`    settings -> `ToolServerConfig` (network or process target)
//! - `transport`   `rmcp` client sessions (Streamable HTTP / stdio), plus the `Connector` seam
//! - `client`      one cached session + tool map per remote service
//! - `normalize`   heterogeneous tool output -> single text payload
//! - `output_dir`  process-wide scratch directory, created once

use thiserror::Error;

pub mod client;
pub mod normalize;
pub mod output_dir;
pub mod resolver;
pub mod transport;

pub use client::GatewayClient;
pub use output_dir::OutputDir;
pub use resolver::{ServiceProfile, ToolServerSettings};
pub use transport::{Connector, McpConnector};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Bad URL or setup value. Fatal for the gateway until config is fixed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Server unreachable, or reachable without the expected tool.
    #[error("Tool '{tool}' is unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("Malformed tool response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(
        "PDF generator did not report an output path. Ensure the Markdown2PDF server writes into the configured output directory."
    )]
    RenderOutputNotFound,

    /// Failure on an already established connection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The tool answered with `isError: true`.
    #[error("Tool '{tool}' reported an error: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Operator-facing misconfiguration, as opposed to a transient outage.
    pub fn is_configuration(&self) -> bool {
        matches!(self, GatewayError::Configuration(_))
    }
}
