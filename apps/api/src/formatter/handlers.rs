use axum::{body::Bytes, extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::formatter::{format_resume, FormattedResume};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatRequest {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub style_hints: Option<String>,
}

/// POST /api/format-resume
pub async fn handle_format_resume(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<FormattedResume>, AppError> {
    let request: FormatRequest = serde_json::from_slice(&body).map_err(|_| {
        AppError::Validation("Expected a JSON payload with resume markdown.".to_string())
    })?;
    let markdown = request
        .markdown
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Provide non-empty markdown to format.".to_string()))?;

    let llm = state.llm.as_deref().ok_or_else(|| {
        AppError::Unavailable("Formatter is not configured. Set ANTHROPIC_API_KEY.".to_string())
    })?;

    let formatted = format_resume(&markdown, request.style_hints.as_deref(), llm)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(Json(FormattedResume {
        markdown: formatted.markdown.trim().to_string(),
        summary: formatted.summary,
    }))
}
