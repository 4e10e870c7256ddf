use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::convert::{data_uri, local_pdf};
use crate::errors::AppError;
use crate::state::AppState;

const FILE_FIELD: &str = "file";
const MISSING_FILE: &str = "Expected a single file upload under the `file` field.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub markdown: String,
    pub file_name: String,
    /// Set when the bundled parser stood in for the converter service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
}

struct Upload {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

/// POST /api/markitdown
/// Multipart upload (`file` field) converted to markdown.
pub async fn handle_convert_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConvertResponse>, AppError> {
    let mut multipart = multipart.map_err(|_| AppError::Validation(MISSING_FILE.to_string()))?;
    let limit = state.config.max_upload_bytes;
    let upload = read_upload(&mut multipart, limit).await?;

    let uri = data_uri(upload.content_type.as_deref(), &upload.data);
    match state.converter.convert(&uri).await {
        Ok(markdown) => Ok(Json(ConvertResponse {
            markdown: markdown.trim().to_string(),
            file_name: upload.file_name,
            source: None,
        })),
        Err(e) if local_pdf::is_pdf(&upload.file_name, upload.content_type.as_deref()) => {
            warn!(
                "Converter failed for '{}'; using bundled PDF parser: {e}",
                upload.file_name
            );
            let markdown = local_pdf::extract_markdown(upload.data)
                .await
                .map_err(|local| {
                    warn!("Bundled PDF parser failed too: {local:#}");
                    AppError::Gateway(e)
                })?;
            Ok(Json(ConvertResponse {
                markdown,
                file_name: upload.file_name,
                source: Some("local-pdf"),
            }))
        }
        Err(e) => Err(e.into()),
    }
}

async fn read_upload(multipart: &mut Multipart, limit: usize) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

        if data.len() > limit {
            return Err(too_large(limit));
        }
        return Ok(Upload {
            file_name,
            content_type,
            data,
        });
    }
    Err(AppError::Validation(MISSING_FILE.to_string()))
}

fn multipart_error(error: MultipartError, limit: usize) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(limit)
    } else {
        AppError::Validation(format!("Could not read the upload: {}", error.body_text()))
    }
}

fn too_large(limit: usize) -> AppError {
    AppError::PayloadTooLarge(format!(
        "File is too large. The current limit is {:.1} MB.",
        limit as f64 / (1024.0 * 1024.0)
    ))
}
