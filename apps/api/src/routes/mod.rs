pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::convert::handlers::handle_convert_upload;
use crate::formatter::handlers::handle_format_resume;
use crate::render::handlers::handle_render_pdf;
use crate::resume::handlers::{
    handle_get_resume, handle_replace_resume, handle_resume_changes, handle_update_resume,
};
use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health::health_handler))
        // Document conversion and rendering
        .route(
            "/api/markitdown",
            post(handle_convert_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/resume-pdf", post(handle_render_pdf))
        .route("/api/format-resume", post(handle_format_resume))
        // Shared resume state
        .route(
            "/api/resume",
            get(handle_get_resume).put(handle_replace_resume),
        )
        .route("/api/resume/update", post(handle_update_resume))
        .route("/api/resume/changes", get(handle_resume_changes))
        .with_state(state)
}
