use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::attempt::{Attempt, AttemptOrigin, AttemptStatus};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct StartAttemptRequest {
    #[validate(range(min = 1))]
    pub assessment_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerInput {
    pub question_id: i64,
    #[serde(default)]
    pub selected_choice_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveAnswerRequest {
    pub question_id: i64,
    #[serde(default)]
    pub selected_choice_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveAnswerResponse {
    pub saved: bool,
    pub question_id: i64,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttemptView {
    pub id: i64,
    pub assessment_id: i64,
    pub status: AttemptStatus,
    pub origin: AttemptOrigin,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub score: Option<i32>,
    pub total_marks: Option<i32>,
}

impl From<Attempt> for AttemptView {
    fn from(a: Attempt) -> Self {
        Self {
            id: a.id,
            assessment_id: a.assessment_id,
            status: a.status,
            origin: a.origin,
            start_time: a.start_time,
            end_time: a.end_time,
            score: a.score,
            total_marks: a.total_marks,
        }
    }
}

/// Score summary of a completed attempt. `total_score` is the mark-weighted
/// sum; `correct_answers` is the plain count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttemptResult {
    pub attempt_id: i64,
    pub total_questions: i64,
    pub total_score: i32,
    pub correct_answers: i64,
    pub total_marks: i32,
    pub percentage: f64,
    pub completed_at: DateTime<Utc>,
    pub force_finalized: bool,
}

/// Dashboard row: one attempt with the assessment's name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AttemptListItem {
    pub id: i64,
    pub assessment_id: i64,
    pub assessment_name: String,
    pub status: AttemptStatus,
    pub origin: AttemptOrigin,
    pub student_email: Option<String>,
    pub score: Option<i32>,
    pub total_marks: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SheetChoice {
    pub id: i64,
    pub choice_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SheetQuestion {
    pub id: i64,
    pub question_text: String,
    pub marks: i32,
    pub choices: Vec<SheetChoice>,
}

/// What the client renders while an attempt is open. Correct flags are never included.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionSheet {
    pub attempt_id: i64,
    pub assessment_id: i64,
    pub assessment_name: String,
    pub duration_minutes: i32,
    pub deadline: DateTime<Utc>,
    pub seconds_remaining: i64,
    pub questions: Vec<SheetQuestion>,
    pub saved_answers: Vec<AnswerInput>,
}
