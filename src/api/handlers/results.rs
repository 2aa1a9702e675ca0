//! Exam result handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::state::AppState;
use crate::domain::{
    ApiResponse, BulkCreateRequest, BulkCreateResponse, DeleteResponse, ExamResult, ListResponse,
    PublishRequest, PublishResponse, RecalculateRequest, RecalculateResponse, ResultInput,
    ResultStats, SearchMiss, TopPerformer,
};
use crate::error::{ErrorCode, Result};
use crate::service::SearchOutcome;

type ResultList = Json<ApiResponse<ListResponse<ExamResult>>>;

/// Public search by roll number.
///
/// A miss is a 404 whose `data.isPublished` tells the caller whether
/// results are out yet.
///
/// # Errors
///
/// Returns `BadRequest` for a blank roll number or a storage error.
pub async fn search_result(
    State(state): State<AppState>,
    Path(roll_number): Path<String>,
) -> Result<Response> {
    let response = match state.result_service.search(&roll_number).await? {
        SearchOutcome::Found(result) => Json(ApiResponse::success(*result)).into_response(),
        SearchOutcome::NotPublished(message) => miss(ErrorCode::NOT_PUBLISHED, message, false),
        SearchOutcome::Missing(message) => miss(ErrorCode::NOT_FOUND, message, true),
    };
    Ok(response)
}

fn miss(code: ErrorCode, message: String, is_published: bool) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse {
            code: code.as_i32(),
            message,
            data: Some(SearchMiss { is_published }),
        }),
    )
        .into_response()
}

/// All published results by rank.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn list_published(State(state): State<AppState>) -> Result<ResultList> {
    let results = state.result_service.published().await?;
    Ok(Json(ApiResponse::success(ListResponse::new(results))))
}

/// Published results for one subject.
///
/// # Errors
///
/// Returns `BadRequest` for an unknown subject.
pub async fn list_by_subject(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Result<ResultList> {
    let results = state.result_service.by_subject(&subject).await?;
    Ok(Json(ApiResponse::success(ListResponse::new(results))))
}

/// Top published results with the default limit.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn top_results(State(state): State<AppState>) -> Result<ResultList> {
    let results = state.result_service.top(None).await?;
    Ok(Json(ApiResponse::success(ListResponse::new(results))))
}

/// Top published results; a non-numeric limit falls back to the default.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn top_results_limited(
    State(state): State<AppState>,
    Path(limit): Path<String>,
) -> Result<ResultList> {
    let results = state.result_service.top(limit.parse().ok()).await?;
    Ok(Json(ApiResponse::success(ListResponse::new(results))))
}

/// Leaderboard of the top three in Computer.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn top3(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ListResponse<TopPerformer>>>> {
    let performers = state.result_service.top3(None).await?;
    Ok(Json(ApiResponse::success(ListResponse::new(performers))))
}

/// Leaderboard of the top three in a subject.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn top3_by_subject(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Result<Json<ApiResponse<ListResponse<TopPerformer>>>> {
    let performers = state.result_service.top3(Some(&subject)).await?;
    Ok(Json(ApiResponse::success(ListResponse::new(performers))))
}

/// Create or update a result by roll number.
///
/// # Errors
///
/// Returns a validation error for a missing or invalid field.
pub async fn create_result(
    State(state): State<AppState>,
    Json(input): Json<ResultInput>,
) -> Result<(StatusCode, Json<ApiResponse<ExamResult>>)> {
    let (result, created) = state.result_service.upsert(input).await?;
    let response = if created {
        (
            StatusCode::CREATED,
            Json(ApiResponse::with_message(result, "Result created successfully")),
        )
    } else {
        (
            StatusCode::OK,
            Json(ApiResponse::with_message(result, "Result updated successfully")),
        )
    };
    Ok(response)
}

/// Upsert many results, reporting per-item failures.
///
/// # Errors
///
/// Returns `BadRequest` for an empty list.
pub async fn bulk_create_results(
    State(state): State<AppState>,
    Json(request): Json<BulkCreateRequest>,
) -> Result<Json<ApiResponse<BulkCreateResponse>>> {
    let report = state.result_service.bulk_upsert(request.results).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Publish all results or the listed roll numbers.
///
/// # Errors
///
/// Returns `BadRequest` when the request names nothing.
pub async fn publish_results(
    State(state): State<AppState>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<ApiResponse<PublishResponse>>> {
    let modified_count = state.result_service.publish(request).await?;
    Ok(Json(ApiResponse::with_message(
        PublishResponse { modified_count },
        format!("{modified_count} results published"),
    )))
}

/// Delete a result by roll number.
///
/// # Errors
///
/// Returns `NotFound` for an unknown roll number.
pub async fn delete_result(
    State(state): State<AppState>,
    Path(roll_number): Path<String>,
) -> Result<Json<ApiResponse<DeleteResponse>>> {
    let result = state.result_service.delete(&roll_number).await?;
    Ok(Json(ApiResponse::with_message(
        DeleteResponse {
            deleted: result.roll_number,
        },
        "Result deleted successfully",
    )))
}

/// Aggregate statistics over every result.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn result_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ResultStats>>> {
    Ok(Json(ApiResponse::success(
        state.result_service.stats().await?,
    )))
}

/// Re-rank results by marks.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn recalculate_ranks(
    State(state): State<AppState>,
    Json(request): Json<RecalculateRequest>,
) -> Result<Json<ApiResponse<RecalculateResponse>>> {
    let report = state
        .result_service
        .recalculate_ranks(request.published_only)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}
