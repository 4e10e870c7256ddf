//! Tool Normalizer: pure extraction of the single text payload a caller needs.

use serde::Deserialize;
use serde_json::Value;

use crate::gateway::GatewayError;

/// The two shapes a tool answer arrives in.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ToolInvocationResult {
    Text(String),
    Envelope { content: Vec<Value> },
}

impl ToolInvocationResult {
    /// Plain text as-is; otherwise the first content part whose `text` is a string.
    pub fn into_text(self) -> Result<String, GatewayError> {
        match self {
            ToolInvocationResult::Text(text) => Ok(text),
            ToolInvocationResult::Envelope { content } => content
                .into_iter()
                .find_map(|part| match part {
                    Value::Object(mut fields) => match fields.remove("text") {
                        Some(Value::String(text)) => Some(text),
                        _ => None,
                    },
                    _ => None,
                })
                .ok_or_else(|| {
                    GatewayError::MalformedResponse(
                        "tool response did not include text content".to_string(),
                    )
                }),
        }
    }
}

pub fn extract_text(response: &Value) -> Result<String, GatewayError> {
    ToolInvocationResult::deserialize(response)
        .map_err(|_| {
            GatewayError::MalformedResponse(
                "expected text or an object with a content list".to_string(),
            )
        })?
        .into_text()
}
