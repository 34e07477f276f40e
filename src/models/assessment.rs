use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "assessment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assessment {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub status: AssessmentStatus,
    pub created_by_user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One question reference of an assessment, with its optional marks override.
/// `question_marks` is the question's own weight when it was linked and only
/// matters once the question has left the bank.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssessmentItem {
    pub question_id: i64,
    pub marks_override: Option<i32>,
    pub question_marks: i32,
}

/// Assessment header plus its ordered question list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentDefinition {
    pub assessment: Assessment,
    pub items: Vec<AssessmentItem>,
}

impl AssessmentDefinition {
    pub fn id(&self) -> i64 {
        self.assessment.id
    }

    pub fn question_ids(&self) -> Vec<i64> {
        self.items.iter().map(|i| i.question_id).collect()
    }

    pub fn contains(&self, question_id: i64) -> bool {
        self.items.iter().any(|i| i.question_id == question_id)
    }

    pub fn time_limit(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.assessment.duration_minutes) * 60)
    }

    pub fn is_published(&self) -> bool {
        self.assessment.status == AssessmentStatus::Published
    }
}
