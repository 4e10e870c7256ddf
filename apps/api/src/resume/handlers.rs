use std::time::Duration;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::resume::merge::UpdatePayload;
use crate::resume::models::ResumeDocument;
use crate::resume::store::{OutcomeKind, Snapshot, UpdateReport};
use crate::state::AppState;

const CHANGE_WAIT: Duration = Duration::from_secs(25);

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub version: u64,
    pub document: ResumeDocument,
}

impl From<Snapshot> for ResumeResponse {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            version: snapshot.version,
            document: snapshot.document.as_ref().clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangesQuery {
    #[serde(default)]
    pub after: u64,
}

/// GET /api/resume
pub async fn handle_get_resume(State(state): State<AppState>) -> Json<ResumeResponse> {
    Json(state.resume.snapshot().await.into())
}

/// POST /api/resume/update
/// Accepts a JSON value or raw agent text. Always 200: the outcome says what happened.
pub async fn handle_update_resume(
    State(state): State<AppState>,
    body: String,
) -> Json<UpdateReport> {
    let payload = match serde_json::from_str::<Value>(&body) {
        Ok(value) => UpdatePayload::Value(value),
        Err(_) => UpdatePayload::Text(body),
    };
    Json(state.resume.apply(payload).await)
}

/// PUT /api/resume
/// Direct edit from the UI: full replacement, validated against the current schema.
pub async fn handle_replace_resume(
    State(state): State<AppState>,
    Json(document): Json<Value>,
) -> Result<Json<UpdateReport>, AppError> {
    let report = state.resume.replace(document).await;
    if report.outcome == OutcomeKind::Rejected {
        return Err(AppError::Validation(report.reason.unwrap_or_default()));
    }
    Ok(Json(report))
}

/// GET /api/resume/changes?after=N
/// Long-poll: answers as soon as the version passes `after`, or with the
/// current snapshot once the wait elapses.
pub async fn handle_resume_changes(
    State(state): State<AppState>,
    Query(query): Query<ChangesQuery>,
) -> Json<ResumeResponse> {
    let mut changes = state.resume.subscribe();
    // Elapsed and closed both fall through to the current snapshot.
    let _ = tokio::time::timeout(CHANGE_WAIT, changes.wait_for(|v| *v > query.after)).await;
    Json(state.resume.snapshot().await.into())
}
