use axum::Json;
use serde_json::{json, Value};

/// GET /health
/// Liveness only: tool servers are connected lazily and are not probed here.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "resume-api"
    }))
}
