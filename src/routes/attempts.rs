use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use validator::Validate;

use crate::{
    dto::attempt_dto::{
        AttemptListItem, AttemptResult, AttemptView, QuestionSheet, SaveAnswerRequest,
        SaveAnswerResponse, StartAttemptRequest, SubmitAttemptRequest,
    },
    error::Result,
    middleware::auth::Claims,
    models::answer::Answer,
    services::attempt_service::Submission,
    utils::json::Json,
    AppState,
};

/// Queues the "attempt completed" mail for the inviting recruiter. The
/// attempt is already committed, so a failure here is only logged.
pub(crate) async fn notify_completion(state: &AppState, submission: &Submission) {
    if let Err(e) = state
        .notification_service
        .notify_attempt_completed(&submission.attempt, submission.result.percentage)
        .await
    {
        tracing::error!(
            attempt_id = submission.attempt.id,
            error = ?e,
            "failed to enqueue completion notification"
        );
    }
}

#[utoipa::path(
    post,
    path = "/api/attempts/start",
    request_body = StartAttemptRequest,
    responses(
        (status = 201, description = "Attempt started", body = AttemptView),
        (status = 400, description = "Assessment is not published"),
        (status = 404, description = "Assessment not found"),
        (status = 409, description = "An attempt is already in progress")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let owner = claims.owner()?;
    let attempt = state
        .attempt_service
        .start(&owner, payload.assessment_id)
        .await?;
    Ok((StatusCode::CREATED, Json(AttemptView::from(attempt))))
}

#[utoipa::path(
    get,
    path = "/api/attempts",
    responses(
        (status = 200, description = "Attempts of the caller, newest first", body = [AttemptListItem])
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let owner = claims.owner()?;
    let items = state.attempt_service.list_for_owner(&owner).await?;
    Ok(Json(items))
}

#[utoipa::path(
    post,
    path = "/api/attempts/{id}/submit",
    params(
        ("id" = i64, Path, description = "Attempt ID")
    ),
    request_body = SubmitAttemptRequest,
    responses(
        (status = 200, description = "Attempt graded and finalized", body = AttemptResult),
        (status = 400, description = "Answer sheet incomplete or malformed"),
        (status = 403, description = "Attempt belongs to someone else"),
        (status = 404, description = "Attempt not found"),
        (status = 409, description = "Attempt already completed or not started")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse> {
    let owner = claims.owner()?;
    let submission = state
        .attempt_service
        .submit(id, &owner, &payload.answers)
        .await?;
    notify_completion(&state, &submission).await;
    Ok(Json(submission.result))
}

#[utoipa::path(
    get,
    path = "/api/attempts/{id}/result",
    params(
        ("id" = i64, Path, description = "Attempt ID")
    ),
    responses(
        (status = 200, description = "Score summary", body = AttemptResult),
        (status = 403, description = "Attempt belongs to someone else"),
        (status = 404, description = "Attempt not found or not completed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let owner = claims.owner()?;
    let result = state.attempt_service.get_result(id, &owner).await?;
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/api/attempts/{id}/questions",
    params(
        ("id" = i64, Path, description = "Attempt ID")
    ),
    responses(
        (status = 200, description = "Question sheet of the open attempt", body = QuestionSheet),
        (status = 409, description = "Attempt already completed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let owner = claims.owner()?;
    let sheet = state.attempt_service.question_sheet(id, &owner).await?;
    Ok(Json(sheet))
}

#[utoipa::path(
    patch,
    path = "/api/attempts/{id}/answer",
    params(
        ("id" = i64, Path, description = "Attempt ID")
    ),
    request_body = SaveAnswerRequest,
    responses(
        (status = 200, description = "Draft saved", body = SaveAnswerResponse),
        (status = 400, description = "Question or choice not part of the assessment"),
        (status = 409, description = "Attempt already completed"),
        (status = 410, description = "Time limit exceeded")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn save_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse> {
    let owner = claims.owner()?;
    let saved = state
        .attempt_service
        .save_answer(id, &owner, payload.question_id, payload.selected_choice_id)
        .await?;
    Ok(Json(saved))
}

#[utoipa::path(
    get,
    path = "/api/attempts/{id}/answers",
    params(
        ("id" = i64, Path, description = "Attempt ID")
    ),
    responses(
        (status = 200, description = "Graded answers", body = [Answer]),
        (status = 403, description = "Attempt belongs to someone else"),
        (status = 404, description = "Attempt not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_answers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let owner = claims.owner()?;
    let answers = state
        .attempt_service
        .answers_for(id, &owner, claims.is_admin())
        .await?;
    Ok(Json(answers))
}
