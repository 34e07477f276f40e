use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidateEmail, ValidationError};

use crate::models::attempt::AttemptStatus;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateInvitationsRequest {
    #[validate(length(min = 1, max = 200), custom(function = "validate_emails"))]
    pub emails: Vec<String>,
}

fn validate_emails(emails: &Vec<String>) -> Result<(), ValidationError> {
    if emails.iter().all(|e| e.trim().to_string().validate_email()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_email"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvitationView {
    pub attempt_id: i64,
    pub email: String,
    pub link: String,
    pub status: AttemptStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateInvitationsResponse {
    pub assessment_id: i64,
    pub invitations: Vec<InvitationView>,
}

/// What a guest sees when opening an invitation link.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GuestInvitationView {
    pub attempt_id: i64,
    pub assessment_name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub total_questions: i64,
    pub status: AttemptStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
}
