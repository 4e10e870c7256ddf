//! Resume formatter: asks the model to tidy markdown layout without changing facts.
//!
//! Model replies are interpreted leniently. A JSON reply with both fields is
//! used as-is, any other non-empty reply is shown verbatim, and an empty reply
//! keeps the original markdown.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm_client::{Completion, LlmError};
use crate::resume::repair::recover_json;

pub mod handlers;
pub mod prompts;

pub const UNSTRUCTURED_SUMMARY: &str =
    "Formatter returned unstructured markdown; showing the direct output.";
pub const UNCHANGED_SUMMARY: &str =
    "Formatter could not adjust the markdown. Showing original content.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedResume {
    pub markdown: String,
    pub summary: String,
}

pub async fn format_resume(
    markdown: &str,
    style_hints: Option<&str>,
    llm: &dyn Completion,
) -> Result<FormattedResume, LlmError> {
    let prompt = prompts::format_prompt(markdown, style_hints);
    let reply = llm.complete(prompts::FORMATTER_SYSTEM, &prompt).await?;
    Ok(interpret_reply(markdown, reply.trim()))
}

fn interpret_reply(original: &str, reply: &str) -> FormattedResume {
    if reply.is_empty() {
        warn!("Formatter returned nothing; keeping original markdown");
        return FormattedResume {
            markdown: original.to_string(),
            summary: UNCHANGED_SUMMARY.to_string(),
        };
    }

    let structured = recover_json(reply)
        .and_then(|value| serde_json::from_value::<FormattedResume>(value).ok());
    match structured {
        Some(formatted) => formatted,
        None => {
            debug!("Formatter reply was not the expected JSON; using it verbatim");
            FormattedResume {
                markdown: reply.to_string(),
                summary: UNSTRUCTURED_SUMMARY.to_string(),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;

    use super::*;

    /// Replies with a fixed text, or fails when `reply` is `None`.
    pub struct ScriptedModel {
        pub reply: Option<String>,
    }

    impl ScriptedModel {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
            }
        }
    }

    #[async_trait]
    impl Completion for ScriptedModel {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
            assert!(prompt.contains("Resume markdown:"));
            self.reply.clone().ok_or(LlmError::Api {
                status: 529,
                message: "overloaded".to_string(),
            })
        }
    }
}
