use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};

use crate::{
    dto::{admin_dto::AttemptStatistics, attempt_dto::AttemptListItem},
    error::Result,
    middleware::auth::Claims,
    models::audit_log::AuditLog,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/admin/statistics",
    responses(
        (status = 200, description = "Attempt statistics", body = AttemptStatistics)
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn statistics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let stats = state.attempt_service.statistics().await?;
    Ok(Json(stats))
}

#[utoipa::path(
    get,
    path = "/api/admin/assessments/{id}/attempts",
    params(
        ("id" = i64, Path, description = "Assessment ID")
    ),
    responses(
        (status = 200, description = "All attempts of the assessment", body = [AttemptListItem]),
        (status = 404, description = "Assessment not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn assessment_attempts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let items = state.attempt_service.list_for_assessment(id).await?;
    Ok(Json(items))
}

#[utoipa::path(
    delete,
    path = "/api/admin/attempts/{id}",
    params(
        ("id" = i64, Path, description = "Attempt ID")
    ),
    responses(
        (status = 204, description = "Attempt deleted"),
        (status = 404, description = "Attempt not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state
        .attempt_service
        .delete_attempt(claims.user_id()?, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/admin/assessments/{id}",
    params(
        ("id" = i64, Path, description = "Assessment ID")
    ),
    responses(
        (status = 204, description = "Assessment and its attempts deleted"),
        (status = 404, description = "Assessment not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete_assessment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state
        .assessment_service
        .delete_assessment(claims.user_id()?, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/admin/attempts/{id}/audit",
    params(
        ("id" = i64, Path, description = "Attempt ID")
    ),
    responses(
        (status = 200, description = "Audit trail of the attempt, oldest first", body = [AuditLog])
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn attempt_audit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let rows = state.audit_service.for_entity("attempt", id).await?;
    Ok(Json(rows))
}
