//! Image upload handlers.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::header,
    response::IntoResponse,
};
use bytes::Bytes;

use crate::api::state::AppState;
use crate::domain::{ApiResponse, UploadResponse};
use crate::error::{AppError, Result};

/// Multipart field carrying the image.
const IMAGE_FIELD: &str = "image";

/// Store the `image` field of a multipart upload.
///
/// # Errors
///
/// Returns `BadRequest` when the field is missing, not an image, or too large.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(ToString::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let image = state
            .image_service
            .upload(filename, &content_type, data)
            .await?;
        return Ok(Json(ApiResponse::with_message(
            UploadResponse {
                url: image.url(),
                id: image.id,
            },
            "Image uploaded successfully",
        )));
    }

    Err(AppError::BadRequest("No image file provided".to_string()))
}

/// Serve a stored image with its content type.
///
/// # Errors
///
/// Returns `NotFound` for an unknown id.
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let image = state.image_service.get(&id).await?;
    Ok((
        [(header::CONTENT_TYPE, image.content_type)],
        Bytes::from(image.data),
    ))
}
