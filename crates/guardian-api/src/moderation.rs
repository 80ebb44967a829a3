use axum::{
    Extension, Json,
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::debug;

use guardian_types::api::ModerationResponse;
use guardian_types::models::Principal;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::ingest::ImageUpload;

/// Multipart form field carrying the image.
const IMAGE_FIELD: &str = "image";

/// POST /moderate: accepts a multipart form with an `image` field, or the
/// raw image as the request body. Returns `{ status, confidence }`.
pub async fn moderate(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    req: Request,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_upload(req, &state).await?;
    let record = state.workflow.ingest(&principal, upload).await?;

    let confidence = record
        .confidence
        .ok_or_else(|| ApiError::Internal(format!("image {} finalized without confidence", record.id)))?;

    Ok(Json(ModerationResponse {
        status: record.status,
        confidence,
    }))
}

/// Buffer the whole upload in memory. `None` means no image was sent.
async fn read_upload(req: Request, state: &AppState) -> Result<Option<ImageUpload>, ApiError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let is_multipart = content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if !is_multipart {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(ImageUpload {
            bytes,
            file_name: None,
            content_type,
        }));
    }

    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;

        return Ok(Some(ImageUpload {
            bytes,
            file_name,
            content_type,
        }));
    }

    Ok(None)
}

fn rejected(status: StatusCode, message: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(message)
    } else {
        ApiError::Validation(message)
    }
}
