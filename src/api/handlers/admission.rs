//! Admission handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::api::state::AppState;
use crate::domain::{Admission, ApiResponse, ListResponse, NewAdmission, StatusUpdate};
use crate::error::Result;

/// List all admissions, newest first.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn list_admissions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ListResponse<Admission>>>> {
    let admissions = state.admission_service.list().await?;
    Ok(Json(ApiResponse::success(ListResponse::new(admissions))))
}

/// Submit an admission.
///
/// # Errors
///
/// Returns a validation error for a bad form or a conflict when allocation
/// keeps colliding.
pub async fn create_admission(
    State(state): State<AppState>,
    Json(form): Json<NewAdmission>,
) -> Result<(StatusCode, Json<ApiResponse<Admission>>)> {
    let admission = state.admission_service.submit(form).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            admission,
            "Admission submitted successfully",
        )),
    ))
}

/// Get an admission by id.
///
/// # Errors
///
/// Returns `NotFound` for an unknown id.
pub async fn get_admission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Admission>>> {
    Ok(Json(ApiResponse::success(
        state.admission_service.get(&id).await?,
    )))
}

/// Set the review status of an admission.
///
/// # Errors
///
/// Returns `BadRequest` for an unknown status and `NotFound` for an unknown id.
pub async fn update_admission_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<ApiResponse<Admission>>> {
    let admission = state
        .admission_service
        .update_status(&id, &update.status)
        .await?;
    Ok(Json(ApiResponse::with_message(admission, "Status updated")))
}
