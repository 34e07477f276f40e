use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A graded answer. `is_correct` is always computed server-side.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Answer {
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_choice_id: Option<i64>,
    pub is_correct: bool,
}

/// Autosaved selection for an attempt that has not been finalized yet.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerDraft {
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_choice_id: Option<i64>,
    pub saved_at: DateTime<Utc>,
}
