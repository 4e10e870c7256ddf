//! Gateway Client: one lazily created session per remote service.
//!
//! The session (connection + discovered tool map) is created on first use and
//! then reused for the life of the process. Initialisation happens under the
//! slot lock, so concurrent first callers wait on the same attempt instead of
//! opening duplicate connections. Callers that were already waiting when an
//! attempt fails receive that failure; later callers start a fresh attempt. A
//! transport failure on a live session clears it so the next call reconnects.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::gateway::normalize;
use crate::gateway::resolver::{self, ServiceProfile, ToolServerSettings};
use crate::gateway::transport::{Connector, ToolDescriptor, ToolTransport};
use crate::gateway::{GatewayError, OutputDir};

pub struct GatewaySession {
    transport: Arc<dyn ToolTransport>,
    tools: BTreeMap<String, ToolDescriptor>,
    /// Server-side name of the tool this gateway calls (may be namespaced).
    resolved: String,
}

impl GatewaySession {
    pub fn resolved_tool(&self) -> &str {
        &self.resolved
    }

    fn descriptor(&self) -> Option<&ToolDescriptor> {
        self.tools.get(&self.resolved)
    }
}

impl ToolDescriptor {
    /// Keys the tool's input schema marks `required` that `arguments` lacks.
    fn missing_arguments(&self, arguments: &Value) -> Vec<String> {
        self.input_schema
            .as_ref()
            .and_then(|schema| schema.get("required"))
            .and_then(Value::as_array)
            .map(|required| {
                required
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|key| arguments.get(*key).is_none())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct SessionSlot {
    session: Option<Arc<GatewaySession>>,
    /// Last failed attempt, tagged with the attempt count at which it finished.
    failure: Option<(u64, GatewayError)>,
}

pub struct GatewayClient {
    profile: &'static ServiceProfile,
    settings: ToolServerSettings,
    tool_id: &'static str,
    connector: Arc<dyn Connector>,
    output_dir: Option<Arc<OutputDir>>,
    slot: Mutex<SessionSlot>,
    finished_attempts: AtomicU64,
}

impl GatewayClient {
    pub fn new(
        profile: &'static ServiceProfile,
        settings: ToolServerSettings,
        tool_id: &'static str,
        connector: Arc<dyn Connector>,
        output_dir: Option<Arc<OutputDir>>,
    ) -> Self {
        Self {
            profile,
            settings,
            tool_id,
            connector,
            output_dir,
            slot: Mutex::new(SessionSlot::default()),
            finished_attempts: AtomicU64::new(0),
        }
    }

    /// Returns the cached session, connecting and discovering tools on first use.
    pub async fn ensure_tools(&self) -> Result<Arc<GatewaySession>, GatewayError> {
        let arrived = self.finished_attempts.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;
        if let Some(session) = &slot.session {
            return Ok(Arc::clone(session));
        }
        if let Some((finished, error)) = &slot.failure {
            if *finished > arrived {
                return Err(self.shared_failure(error));
            }
        }

        let outcome = self.open_session().await;
        let finished = self.finished_attempts.fetch_add(1, Ordering::AcqRel) + 1;
        match outcome {
            Ok(session) => {
                let session = Arc::new(session);
                slot.session = Some(Arc::clone(&session));
                slot.failure = None;
                Ok(session)
            }
            Err(error) => {
                slot.failure = Some((finished, self.shared_failure(&error)));
                Err(error)
            }
        }
    }

    /// Calls this gateway's tool with `arguments` and returns the raw result.
    pub async fn call_tool(&self, arguments: Value) -> Result<Value, GatewayError> {
        let session = self.ensure_tools().await?;
        if let Some(descriptor) = session.descriptor() {
            let missing = descriptor.missing_arguments(&arguments);
            if !missing.is_empty() {
                return Err(GatewayError::InvalidInput(format!(
                    "'{}' requires: {}",
                    session.resolved,
                    missing.join(", ")
                )));
            }
        }
        debug!("[{}] calling '{}'", self.profile.name, session.resolved);

        let result = session
            .transport
            .call_tool(&session.resolved, arguments)
            .await;

        match result {
            Ok(value) if is_tool_error(&value) => Err(GatewayError::ToolFailed {
                tool: self.tool_id.to_string(),
                message: normalize::extract_text(&value)
                    .unwrap_or_else(|_| "no details provided".to_string()),
            }),
            Ok(value) => Ok(value),
            Err(error @ GatewayError::Transport(_)) => {
                self.forget(&session).await;
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    /// Drops `stale` only if it is still the cached session.
    async fn forget(&self, stale: &Arc<GatewaySession>) {
        let mut slot = self.slot.lock().await;
        if slot.session.as_ref().is_some_and(|s| Arc::ptr_eq(s, stale)) {
            warn!(
                "[{}] connection failed; next call will reconnect",
                self.profile.name
            );
            slot.session = None;
        }
    }

    async fn open_session(&self) -> Result<GatewaySession, GatewayError> {
        let config =
            resolver::resolve(self.profile, &self.settings, self.output_dir.as_deref()).await?;
        debug!(
            "[{}] connecting (timeout {:?})",
            self.profile.name,
            config.timeout()
        );

        let transport = self
            .connector
            .connect(&config)
            .await
            .map_err(|e| self.unavailable(e))?;
        let tools = transport
            .list_tools()
            .await
            .map_err(|e| self.unavailable(e))?
            .into_iter()
            .map(|tool| {
                if let Some(description) = &tool.description {
                    debug!("[{}] tool '{}': {}", self.profile.name, tool.name, description);
                }
                (tool.name.clone(), tool)
            })
            .collect::<BTreeMap<_, _>>();

        let resolved = find_tool(&tools, self.tool_id).ok_or_else(|| {
            GatewayError::ToolUnavailable {
                tool: self.tool_id.to_string(),
                reason: format!(
                    "{} server did not expose it. Ensure the server is running and reachable.",
                    self.profile.name
                ),
            }
        })?;

        info!(
            "[{}] connected; {} tool(s) discovered, using '{}'",
            self.profile.name,
            tools.len(),
            resolved
        );

        Ok(GatewaySession {
            transport,
            tools,
            resolved,
        })
    }

    /// Copy of an attempt's failure for the callers that waited on it.
    fn shared_failure(&self, error: &GatewayError) -> GatewayError {
        match error {
            GatewayError::Configuration(reason) => GatewayError::Configuration(reason.clone()),
            GatewayError::ToolUnavailable { tool, reason } => GatewayError::ToolUnavailable {
                tool: tool.clone(),
                reason: reason.clone(),
            },
            other => GatewayError::ToolUnavailable {
                tool: self.tool_id.to_string(),
                reason: other.to_string(),
            },
        }
    }

    fn unavailable(&self, error: GatewayError) -> GatewayError {
        match error {
            GatewayError::Configuration(_) => error,
            other => GatewayError::ToolUnavailable {
                tool: self.tool_id.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Exact match first, then a namespaced `<prefix>_<tool_id>` variant.
fn find_tool(tools: &BTreeMap<String, ToolDescriptor>, tool_id: &str) -> Option<String> {
    if tools.contains_key(tool_id) {
        return Some(tool_id.to_string());
    }
    let suffix = format!("_{tool_id}");
    tools.keys().find(|name| name.ends_with(&suffix)).cloned()
}

fn is_tool_error(result: &Value) -> bool {
    result.get("isError").and_then(Value::as_bool) == Some(true)
}
