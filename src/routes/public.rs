use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    dto::{
        attempt_dto::{
            AttemptResult, QuestionSheet, SaveAnswerRequest, SaveAnswerResponse,
            SubmitAttemptRequest,
        },
        invitation_dto::GuestInvitationView,
    },
    error::{Error, Result},
    models::attempt::{Attempt, Owner},
    routes::attempts::notify_completion,
    utils::json::Json,
    AppState,
};

fn guest_owner(attempt: &Attempt) -> Result<Owner> {
    attempt
        .student_email
        .as_deref()
        .map(Owner::guest)
        .ok_or_else(|| Error::NotFound("Invitation not found".to_string()))
}

/// Resolves an invitation token to its attempt and the guest who owns it.
async fn guest_attempt(state: &AppState, token: &str) -> Result<(Attempt, Owner)> {
    let attempt = state.attempt_service.find_by_token(token).await?;
    let owner = guest_owner(&attempt)?;
    Ok((attempt, owner))
}

#[utoipa::path(
    get,
    path = "/api/public/invitations/{token}",
    params(
        ("token" = String, Path, description = "Invitation access token")
    ),
    responses(
        (status = 200, description = "Invitation summary", body = GuestInvitationView),
        (status = 404, description = "Invitation not found")
    )
)]
#[axum::debug_handler]
pub async fn get_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse> {
    let view = state.attempt_service.invitation_overview(&token).await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/api/public/invitations/{token}/start",
    params(
        ("token" = String, Path, description = "Invitation access token")
    ),
    responses(
        (status = 200, description = "Attempt started, question sheet returned", body = QuestionSheet),
        (status = 404, description = "Invitation not found"),
        (status = 409, description = "Assessment already completed")
    )
)]
#[axum::debug_handler]
pub async fn start_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse> {
    let attempt = state.attempt_service.begin_invitation(&token).await?;
    let owner = guest_owner(&attempt)?;
    let sheet = state.attempt_service.question_sheet(attempt.id, &owner).await?;
    Ok(Json(sheet))
}

#[utoipa::path(
    patch,
    path = "/api/public/invitations/{token}/answer",
    params(
        ("token" = String, Path, description = "Invitation access token")
    ),
    request_body = SaveAnswerRequest,
    responses(
        (status = 200, description = "Draft saved", body = SaveAnswerResponse),
        (status = 409, description = "Attempt not started or already completed"),
        (status = 410, description = "Time limit exceeded")
    )
)]
#[axum::debug_handler]
pub async fn save_answer(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse> {
    let (attempt, owner) = guest_attempt(&state, &token).await?;
    let saved = state
        .attempt_service
        .save_answer(attempt.id, &owner, payload.question_id, payload.selected_choice_id)
        .await?;
    Ok(Json(saved))
}

#[utoipa::path(
    post,
    path = "/api/public/invitations/{token}/submit",
    params(
        ("token" = String, Path, description = "Invitation access token")
    ),
    request_body = SubmitAttemptRequest,
    responses(
        (status = 200, description = "Attempt graded and finalized", body = AttemptResult),
        (status = 400, description = "Answer sheet incomplete or malformed"),
        (status = 409, description = "Attempt not started or already completed")
    )
)]
#[axum::debug_handler]
pub async fn submit(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse> {
    let (attempt, owner) = guest_attempt(&state, &token).await?;
    let submission = state
        .attempt_service
        .submit(attempt.id, &owner, &payload.answers)
        .await?;
    notify_completion(&state, &submission).await;
    Ok(Json(submission.result))
}

#[utoipa::path(
    get,
    path = "/api/public/invitations/{token}/result",
    params(
        ("token" = String, Path, description = "Invitation access token")
    ),
    responses(
        (status = 200, description = "Score summary", body = AttemptResult),
        (status = 404, description = "Invitation not found or not completed")
    )
)]
#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse> {
    let (attempt, owner) = guest_attempt(&state, &token).await?;
    let result = state.attempt_service.get_result(attempt.id, &owner).await?;
    Ok(Json(result))
}
