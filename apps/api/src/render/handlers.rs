use axum::{body::Bytes, extract::State, Json};
use serde_json::Value;

use crate::errors::AppError;
use crate::render::gateway::RenderResult;
use crate::render::request::RenderRequest;
use crate::state::AppState;

/// POST /api/resume-pdf
/// Answers with a PDF or, when rendering is unavailable, a markdown download.
/// Only request validation produces an error status.
pub async fn handle_render_pdf(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RenderResult>, AppError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|_| {
        AppError::Validation(
            "Expected a JSON payload with resume markdown and layout options.".to_string(),
        )
    })?;
    let request = serde_json::from_value::<RenderRequest>(payload)
        .map_err(|e| {
            AppError::Validation(format!("Invalid payload provided for PDF generation: {e}"))
        })?
        .validated()
        .map_err(AppError::Validation)?;

    Ok(Json(state.renderer.render(&request).await))
}
