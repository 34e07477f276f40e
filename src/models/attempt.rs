use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "attempt_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Invited,
    Started,
    Completed,
}

/// How the attempt came to exist. Carries no grading semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "attempt_origin", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptOrigin {
    Invited,
    DirectAttempt,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attempt {
    pub id: i64,
    pub assessment_id: i64,
    pub user_id: Option<i64>,
    pub recruiter_id: Option<i64>,
    pub student_email: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub status: AttemptStatus,
    pub origin: AttemptOrigin,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub score: Option<i32>,
    pub total_marks: Option<i32>,
    pub total_questions: Option<i32>,
    pub correct_answers: Option<i32>,
    pub force_finalized: bool,
    pub created_at: DateTime<Utc>,
}

/// Who is taking an assessment: a registered user or an invited guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    User { user_id: i64 },
    Guest { email: String },
}

impl Owner {
    pub fn guest(email: &str) -> Self {
        Owner::Guest {
            email: normalize_email(email),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Owner::User { user_id } => Some(*user_id),
            Owner::Guest { .. } => None,
        }
    }

    pub fn owns(&self, attempt: &Attempt) -> bool {
        match self {
            Owner::User { user_id } => attempt.user_id == Some(*user_id),
            Owner::Guest { email } => attempt
                .student_email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email)),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
