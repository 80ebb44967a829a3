use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
};
use uuid::Uuid;

use guardian_types::api::{ImageListQuery, ImagePage, ImageResponse, UpdateImageRequest};
use guardian_types::models::Principal;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::store::{blocking, record_from_row};

const MAX_PAGE_SIZE: u32 = 100;
const MAX_FILE_NAME_LEN: usize = 255;

/// Malformed ids are reported exactly like missing ones.
fn parse_image_id(raw: &str) -> Result<String, ApiError> {
    raw.parse::<Uuid>()
        .map(|id| id.to_string())
        .map_err(|_| ApiError::not_found())
}

/// GET /images: the caller's moderated images, newest first.
pub async fn list_images(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    query: Result<Query<ImageListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;
    if query.page == 0 {
        return Err(ApiError::Validation("page must be at least 1".into()));
    }
    let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);
    let offset = u64::from(query.page - 1) * u64::from(page_size);

    let owner = principal.subject_id;
    let (count, rows) = blocking(&state.db, move |db| {
        let count = db.count_images(&owner)?;
        let rows = db.list_images(&owner, page_size, offset)?;
        Ok((count, rows))
    })
    .await?;

    let results = rows
        .into_iter()
        .map(|row| record_from_row(row).map(ImageResponse::from))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(ImagePage {
        count,
        page: query.page,
        page_size,
        results,
    }))
}

/// GET /images/{id}
pub async fn get_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_image_id(&image_id)?;
    let owner = principal.subject_id;

    let row = blocking(&state.db, move |db| db.get_image(&id, &owner))
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(ImageResponse::from(record_from_row(row)?)))
}

/// PATCH /images/{id}. Only `file_name` is writable.
pub async fn update_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<UpdateImageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_image_id(&image_id)?;
    let Json(req) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let file_name = req.file_name.trim().to_string();
    if file_name.is_empty() || file_name.chars().count() > MAX_FILE_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "file_name must be 1-{} characters",
            MAX_FILE_NAME_LEN
        )));
    }
    if file_name.contains(['/', '\\']) {
        return Err(ApiError::Validation("file_name must not contain path separators".into()));
    }

    let owner = principal.subject_id;
    let row = blocking(&state.db, move |db| db.rename_image(&id, &owner, &file_name))
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(ImageResponse::from(record_from_row(row)?)))
}

/// DELETE /images/{id}
pub async fn delete_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_image_id(&image_id)?;
    let owner = principal.subject_id;

    let removed = blocking(&state.db, move |db| db.delete_image(&id, &owner)).await?;
    if !removed {
        return Err(ApiError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /images/{id}/content: the stored bytes, with their sha256 as ETag.
pub async fn get_image_content(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_image_id(&image_id)?;
    let owner = principal.subject_id;

    let content = blocking(&state.db, move |db| db.get_image_content(&id, &owner))
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok((
        [
            (header::CONTENT_TYPE, content.content_type),
            (header::ETAG, format!("\"{}\"", content.sha256)),
        ],
        content.content,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_ids_must_be_uuids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_image_id(&id.to_string()).unwrap(), id.to_string());
        assert!(matches!(parse_image_id("../etc/passwd"), Err(ApiError::NotFound(_))));
        assert!(matches!(parse_image_id("42"), Err(ApiError::NotFound(_))));
    }
}
