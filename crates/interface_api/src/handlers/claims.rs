//! Claims handlers
//!
//! Every handler resolves the caller from the `Actor` the auth middleware
//! placed in request extensions and delegates to `ClaimService`.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use validator::Validate;

use core_kernel::ClaimId;
use domain_claims::{Actor, ClaimCounts, ClaimQuery, ClaimStatus, NewClaim};

use crate::dto::claims::*;
use crate::export::{self, ExportFormat};
use crate::{error::ApiError, AppState};

fn parse_claim_id(raw: &str) -> Result<ClaimId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("no claim with id {}", raw)))
}

/// Creates one or more claims for the caller
pub async fn create_claims(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateClaimsRequest>,
) -> Result<(StatusCode, Json<Vec<ClaimResponse>>), ApiError> {
    request.validate()?;
    let items: Vec<NewClaim> = request.items.into_iter().map(NewClaim::from).collect();

    let created = state.service.submit_claims(&actor, items).await?;

    Ok((
        StatusCode::CREATED,
        Json(created.into_iter().map(ClaimResponse::from).collect()),
    ))
}

/// Lists claims within the caller's scope
pub async fn list_claims(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<ListClaimsParams>,
) -> Result<Json<Vec<ClaimResponse>>, ApiError> {
    let query = ClaimQuery::try_from(params)?;
    let claims = state.service.list_claims(&actor, query).await?;
    Ok(Json(claims.into_iter().map(ClaimResponse::from).collect()))
}

/// Pending/approved/rejected totals within the caller's scope
pub async fn claim_counts(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ClaimCounts>, ApiError> {
    Ok(Json(state.service.counts(&actor).await?))
}

/// Admin report of claims created between two days, as a file download
pub async fn export_claims(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let claims = state
        .service
        .export_claims(&actor, params.from, params.to, params.status.as_deref())
        .await?;
    let format: ExportFormat = params.format.as_deref().unwrap_or_default().parse()?;

    let body = export::render(format, &claims)?;
    let status = params
        .status
        .as_deref()
        .and_then(|s| s.parse::<ClaimStatus>().ok());
    let file_name = export::file_name(params.from, params.to, status, format);

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// Gets a claim by ID
pub async fn get_claim(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let id = parse_claim_id(&id)?;
    let claim = state.service.get_claim(id, &actor).await?;
    Ok(Json(claim.into()))
}

/// Edits a claim's details
pub async fn edit_claim(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<EditClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let id = parse_claim_id(&id)?;
    let claim = state.service.edit_claim(id, &actor, request.into()).await?;
    Ok(Json(claim.into()))
}

/// Approves or rejects a claim
pub async fn decide_claim(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let id = parse_claim_id(&id)?;
    let claim = state.service.decide(id, &actor, request.into()).await?;
    Ok(Json(claim.into()))
}

/// Opens a recall
pub async fn request_recall(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<RecallRequestBody>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let id = parse_claim_id(&id)?;
    let claim = state.service.request_recall(id, &actor, request.into()).await?;
    Ok(Json(claim.into()))
}

/// Attaches the admin's exhibit to an open recall
pub async fn attach_recall_exhibit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<FileRefRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let id = parse_claim_id(&id)?;
    let claim = state
        .service
        .attach_recall_exhibit(id, &actor, request.file_ref)
        .await?;
    Ok(Json(claim.into()))
}

/// Answers an open recall
pub async fn respond_to_recall(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<RecallResponseBody>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let id = parse_claim_id(&id)?;
    let claim = state
        .service
        .respond_to_recall(id, &actor, request.into())
        .await?;
    Ok(Json(claim.into()))
}

/// Withdraws an open recall
pub async fn cancel_recall(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let id = parse_claim_id(&id)?;
    let claim = state.service.cancel_recall(id, &actor, request.comment).await?;
    Ok(Json(claim.into()))
}

/// Records the employee's change request note
pub async fn request_change(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let id = parse_claim_id(&id)?;
    let claim = state.service.request_change(id, &actor, request.comment).await?;
    Ok(Json(claim.into()))
}

/// Replaces the claim's receipt reference
pub async fn attach_receipt(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<FileRefRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let id = parse_claim_id(&id)?;
    let claim = state.service.attach_receipt(id, &actor, request.file_ref).await?;
    Ok(Json(claim.into()))
}
