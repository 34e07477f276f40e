use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use validator::Validate;

use crate::{
    config::get_config,
    dto::invitation_dto::{CreateInvitationsRequest, CreateInvitationsResponse, InvitationView},
    error::Result,
    middleware::auth::Claims,
    utils::json::Json,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/assessments/{id}/invitations",
    params(
        ("id" = i64, Path, description = "Assessment ID")
    ),
    request_body = CreateInvitationsRequest,
    responses(
        (status = 201, description = "Invitations created", body = CreateInvitationsResponse),
        (status = 400, description = "Invalid or repeated e-mail, or assessment not published"),
        (status = 404, description = "Assessment not found"),
        (status = 409, description = "A student was already invited by this recruiter")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create_invitations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
    Json(payload): Json<CreateInvitationsRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let recruiter_id = claims.user_id()?;

    let batch = state
        .invitation_service
        .invite(recruiter_id, assessment_id, &payload.emails)
        .await?;

    let config = get_config();
    let mut invitations = Vec::with_capacity(batch.attempts.len());
    for attempt in batch.attempts {
        let link = config.invitation_link(attempt.access_token.as_deref().unwrap_or_default());
        if let Err(e) = state
            .notification_service
            .notify_invitation(&attempt, &batch.assessment.name, &link)
            .await
        {
            tracing::error!(attempt_id = attempt.id, error = ?e, "failed to enqueue invitation mail");
        }
        invitations.push(InvitationView {
            attempt_id: attempt.id,
            email: attempt.student_email.unwrap_or_default(),
            link,
            status: attempt.status,
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateInvitationsResponse {
            assessment_id,
            invitations,
        }),
    ))
}
