//! Series handlers

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use core_kernel::{DealerId, SeriesId};
use domain_numbering::{Issuance, RecordedEvent, SeriesQuery, SeriesStatistics};

use crate::dto::series::*;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequestMetadata;
use crate::{error::ApiError, AppState};

fn respond(state: &AppState, series: &domain_numbering::PolicySeries) -> Json<SeriesResponse> {
    Json(SeriesResponse::from_series(
        series,
        &state.allocator.config().threshold,
    ))
}

/// Creates a series
pub async fn create_series(
    State(state): State<AppState>,
    RequestMetadata(metadata): RequestMetadata,
    ApiJson(request): ApiJson<CreateSeriesRequest>,
) -> Result<(StatusCode, Json<SeriesResponse>), ApiError> {
    request.validate()?;
    let series = state
        .allocator
        .create_series(request.into(), &metadata)
        .await?;
    Ok((StatusCode::CREATED, respond(&state, &series)))
}

/// Lists series
pub async fn list_series(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListSeriesParams>,
) -> Result<Json<Vec<SeriesResponse>>, ApiError> {
    params.validate()?;
    let series = state.allocator.list_series(&params.into_query()).await?;
    let threshold = state.allocator.config().threshold;
    Ok(Json(
        series
            .iter()
            .map(|s| SeriesResponse::from_series(s, &threshold))
            .collect(),
    ))
}

/// Lists the live series owned by a dealer
pub async fn list_dealer_series(
    State(state): State<AppState>,
    ApiPath(dealer_id): ApiPath<DealerId>,
) -> Result<Json<Vec<SeriesResponse>>, ApiError> {
    let series = state
        .allocator
        .list_series(&SeriesQuery::by_dealer(dealer_id))
        .await?;
    let threshold = state.allocator.config().threshold;
    Ok(Json(
        series
            .iter()
            .map(|s| SeriesResponse::from_series(s, &threshold))
            .collect(),
    ))
}

/// Gets a series by ID
pub async fn get_series(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SeriesId>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let series = state.allocator.get_series(id).await?;
    Ok(respond(&state, &series))
}

/// Updates code, range or description
pub async fn update_series(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SeriesId>,
    RequestMetadata(metadata): RequestMetadata,
    ApiJson(request): ApiJson<UpdateSeriesRequest>,
) -> Result<Json<SeriesResponse>, ApiError> {
    request.validate()?;
    let series = state
        .allocator
        .update_series(id, request.into(), &metadata)
        .await?;
    Ok(respond(&state, &series))
}

/// Deletes a series
pub async fn delete_series(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SeriesId>,
    RequestMetadata(metadata): RequestMetadata,
) -> Result<Json<DeleteResponse>, ApiError> {
    let outcome = state.allocator.delete_series(id, &metadata).await?;
    Ok(Json(DeleteResponse {
        series_id: id,
        outcome,
    }))
}

/// Issues the next bare number
pub async fn next_number(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SeriesId>,
) -> Result<Json<NextNumberResponse>, ApiError> {
    let number = state.allocator.get_next_number(id).await?;
    Ok(Json(NextNumberResponse {
        series_id: id,
        number,
    }))
}

/// Issues the next number formatted as a policy number
pub async fn generate_policy_number(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SeriesId>,
) -> Result<(StatusCode, Json<PolicyNumberResponse>), ApiError> {
    let issued = state.allocator.generate_full_policy_number(id).await?;
    Ok((StatusCode::CREATED, Json(issued.into())))
}

/// Resolves a formatted policy number to its issuance
pub async fn resolve_policy_number(
    State(state): State<AppState>,
    ApiPath((id, policy_number)): ApiPath<(SeriesId, String)>,
) -> Result<Json<ResolvedPolicyNumberResponse>, ApiError> {
    let issuance = state
        .allocator
        .resolve_policy_number(id, &policy_number)
        .await?;
    Ok(Json(ResolvedPolicyNumberResponse::new(policy_number, issuance)))
}

/// Moves a series to another dealer
pub async fn assign_dealer(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SeriesId>,
    RequestMetadata(metadata): RequestMetadata,
    ApiJson(request): ApiJson<AssignDealerRequest>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let series = state
        .allocator
        .assign_dealer(id, request.dealer_id, &metadata)
        .await?;
    Ok(respond(&state, &series))
}

/// Raises the end number of a series
pub async fn extend_range(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SeriesId>,
    RequestMetadata(metadata): RequestMetadata,
    ApiJson(request): ApiJson<ExtendRangeRequest>,
) -> Result<Json<SeriesResponse>, ApiError> {
    request.validate()?;
    let series = state
        .allocator
        .extend_range(id, request.new_end_number, &request.reason, &metadata)
        .await?;
    Ok(respond(&state, &series))
}

/// Usage statistics of a series
pub async fn series_statistics(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SeriesId>,
) -> Result<Json<SeriesStatistics>, ApiError> {
    Ok(Json(state.allocator.get_series_statistics(id).await?))
}

/// Series near or at depletion, most urgent first
pub async fn near_depletion(
    State(state): State<AppState>,
) -> Result<Json<Vec<SeriesStatistics>>, ApiError> {
    Ok(Json(state.allocator.list_near_depletion().await?))
}

/// Issuance log of a series
pub async fn issuance_history(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SeriesId>,
) -> Result<Json<Vec<Issuance>>, ApiError> {
    Ok(Json(state.allocator.issuance_history(id).await?))
}

/// Audit trail of a series
pub async fn series_events(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SeriesId>,
) -> Result<Json<Vec<RecordedEvent>>, ApiError> {
    Ok(Json(state.allocator.series_events(id).await?))
}
