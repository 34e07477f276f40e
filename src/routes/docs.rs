use axum::{response::IntoResponse, Json};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::dto::admin_dto::AttemptStatistics;
use crate::dto::attempt_dto::{
    AnswerInput, AttemptListItem, AttemptResult, AttemptView, QuestionSheet, SaveAnswerRequest,
    SaveAnswerResponse, SheetChoice, SheetQuestion, StartAttemptRequest, SubmitAttemptRequest,
};
use crate::dto::invitation_dto::{
    CreateInvitationsRequest, CreateInvitationsResponse, GuestInvitationView, InvitationView,
};
use crate::models::answer::Answer;
use crate::models::attempt::{AttemptOrigin, AttemptStatus};
use crate::models::audit_log::AuditLog;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::attempts::start_attempt,
        crate::routes::attempts::list_attempts,
        crate::routes::attempts::submit_attempt,
        crate::routes::attempts::get_result,
        crate::routes::attempts::get_questions,
        crate::routes::attempts::save_answer,
        crate::routes::attempts::list_answers,
        crate::routes::public::get_invitation,
        crate::routes::public::start_invitation,
        crate::routes::public::save_answer,
        crate::routes::public::submit,
        crate::routes::public::get_result,
        crate::routes::invitations::create_invitations,
        crate::routes::admin::statistics,
        crate::routes::admin::assessment_attempts,
        crate::routes::admin::delete_attempt,
        crate::routes::admin::delete_assessment,
        crate::routes::admin::attempt_audit,
    ),
    components(schemas(
        AnswerInput,
        Answer,
        AttemptListItem,
        AttemptOrigin,
        AttemptResult,
        AttemptStatistics,
        AttemptStatus,
        AttemptView,
        AuditLog,
        CreateInvitationsRequest,
        CreateInvitationsResponse,
        GuestInvitationView,
        InvitationView,
        QuestionSheet,
        SaveAnswerRequest,
        SaveAnswerResponse,
        SheetChoice,
        SheetQuestion,
        StartAttemptRequest,
        SubmitAttemptRequest,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "assessment-backend", description = "Assessment attempts, grading and invitations")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
