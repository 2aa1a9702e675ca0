//! Competition application handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::api::state::AppState;
use crate::domain::{
    ApiResponse, CompetitionApplication, DeleteResponse, ListResponse, NewCompetitionApplication,
    RollLookupQuery, StatusUpdate,
};
use crate::error::Result;

/// List all applications, newest first.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn list_applications(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ListResponse<CompetitionApplication>>>> {
    let applications = state.competition_service.list().await?;
    Ok(Json(ApiResponse::success(ListResponse::new(applications))))
}

/// Submit an application and allocate its roll number.
///
/// # Errors
///
/// Returns a validation error for a bad form or a conflict when allocation
/// keeps colliding.
pub async fn create_application(
    State(state): State<AppState>,
    Json(form): Json<NewCompetitionApplication>,
) -> Result<(StatusCode, Json<ApiResponse<CompetitionApplication>>)> {
    let application = state.competition_service.submit(form).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            application,
            "Application submitted successfully",
        )),
    ))
}

/// Get an application by id.
///
/// # Errors
///
/// Returns `NotFound` for an unknown id.
pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CompetitionApplication>>> {
    let application = state.competition_service.get(&id).await?;
    Ok(Json(ApiResponse::success(application)))
}

/// Look up an admit card by roll number, optionally checking the date of birth.
///
/// # Errors
///
/// Returns `NotFound` for an unknown roll number and `Forbidden` when the
/// date of birth does not match.
pub async fn get_by_roll_number(
    State(state): State<AppState>,
    Path(roll_number): Path<String>,
    Query(query): Query<RollLookupQuery>,
) -> Result<Json<ApiResponse<CompetitionApplication>>> {
    let application = state
        .competition_service
        .find_by_roll(&roll_number, query.dob.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(application)))
}

/// Update the payment status of an application.
///
/// # Errors
///
/// Returns `BadRequest` for an unknown status and `NotFound` for an unknown id.
pub async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<ApiResponse<CompetitionApplication>>> {
    let application = state
        .competition_service
        .update_payment(&id, &update.status)
        .await?;
    Ok(Json(ApiResponse::with_message(
        application,
        "Payment status updated",
    )))
}

/// Delete an application.
///
/// # Errors
///
/// Returns `NotFound` for an unknown id.
pub async fn delete_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeleteResponse>>> {
    state.competition_service.delete(&id).await?;
    Ok(Json(ApiResponse::with_message(
        DeleteResponse { deleted: id },
        "Application deleted",
    )))
}
