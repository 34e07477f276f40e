use std::collections::HashSet;

use serde_json::json;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::models::assessment::Assessment;
use crate::models::attempt::{normalize_email, Attempt, AttemptOrigin, AttemptStatus};
use crate::services::assessment_service::load_definition;
use crate::services::audit_service;
use crate::utils::token::{generate_access_token, INVITATION_TOKEN_LENGTH};

#[derive(Debug, Clone)]
pub struct InvitationBatch {
    pub assessment: Assessment,
    pub attempts: Vec<Attempt>,
}

#[derive(Clone)]
pub struct InvitationService {
    pool: PgPool,
}

impl InvitationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates one invited attempt per address. Either every invitation is
    /// created or none is.
    pub async fn invite(
        &self,
        recruiter_id: i64,
        assessment_id: i64,
        emails: &[String],
    ) -> Result<InvitationBatch> {
        let emails = dedupe_emails(emails)?;

        let mut tx = self.pool.begin().await?;
        let definition = load_definition(&mut tx, assessment_id).await?;
        if !definition.is_published() {
            return Err(Error::BadRequest("Assessment is not published".to_string()));
        }

        let mut invited = Vec::with_capacity(emails.len());
        for email in &emails {
            let attempt = sqlx::query_as::<_, Attempt>(
                r#"INSERT INTO attempts (assessment_id, recruiter_id, student_email, access_token, status, origin)
                   VALUES ($1, $2, $3, $4, $5, $6)
                   RETURNING id, assessment_id, user_id, recruiter_id, student_email, access_token,
                             status, origin, start_time, end_time, score, total_marks, total_questions,
                             correct_answers, force_finalized, created_at"#,
            )
            .bind(assessment_id)
            .bind(recruiter_id)
            .bind(email)
            .bind(generate_access_token(INVITATION_TOKEN_LENGTH))
            .bind(AttemptStatus::Invited)
            .bind(AttemptOrigin::Invited)
            .fetch_one(&mut *tx)
            .await?;
            invited.push(attempt);
        }

        audit_service::record(
            &mut tx,
            Some(recruiter_id),
            "invitations_created",
            "assessment",
            assessment_id,
            Some(json!({ "emails": emails })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            recruiter_id,
            assessment_id,
            count = invited.len(),
            "invitations created"
        );
        Ok(InvitationBatch {
            assessment: definition.assessment,
            attempts: invited,
        })
    }
}

/// Normalizes addresses and rejects a list that names one twice.
fn dedupe_emails(emails: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::with_capacity(emails.len());
    let mut out = Vec::with_capacity(emails.len());
    for raw in emails {
        let email = normalize_email(raw);
        if email.is_empty() {
            return Err(Error::BadRequest("Empty e-mail address".to_string()));
        }
        if !seen.insert(email.clone()) {
            return Err(Error::BadRequest(format!(
                "{} appears more than once in the request",
                email
            )));
        }
        out.push(email);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_keeps_order() {
        let out = dedupe_emails(&[" B@y.org".into(), "a@x.com".into()]).unwrap();
        assert_eq!(out, vec!["b@y.org", "a@x.com"]);
    }

    #[test]
    fn repeated_address_differing_in_case_is_rejected() {
        let err = dedupe_emails(&["a@x.com".into(), "A@X.com ".into()]).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
