use serde_json::json;
use sqlx::{PgConnection, PgPool};

use crate::error::{Error, Result};
use crate::models::assessment::{Assessment, AssessmentDefinition, AssessmentItem};
use crate::services::audit_service;

#[derive(Clone)]
pub struct AssessmentService {
    pool: PgPool,
}

impl AssessmentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Question links, attempts, answers and drafts go with it.
    pub async fn delete_assessment(&self, admin_id: i64, assessment_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let name: Option<String> =
            sqlx::query_scalar(r#"DELETE FROM assessments WHERE id = $1 RETURNING name"#)
                .bind(assessment_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(name) = name else {
            return Err(Error::NotFound("Assessment not found".to_string()));
        };

        audit_service::record(
            &mut *tx,
            Some(admin_id),
            "assessment_deleted",
            "assessment",
            assessment_id,
            Some(json!({ "name": name })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(assessment_id, admin_id, "assessment deleted");
        Ok(())
    }
}

pub async fn load_definition(
    conn: &mut PgConnection,
    assessment_id: i64,
) -> Result<AssessmentDefinition> {
    let assessment = sqlx::query_as::<_, Assessment>(
        r#"SELECT id, name, description, duration_minutes, status, created_by_user_id, created_at, updated_at
           FROM assessments WHERE id = $1"#,
    )
    .bind(assessment_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound("Assessment not found".to_string()))?;

    let items = sqlx::query_as::<_, AssessmentItem>(
        r#"SELECT question_id, marks AS marks_override, question_marks
           FROM assessment_questions
           WHERE assessment_id = $1
           ORDER BY position, question_id"#,
    )
    .bind(assessment_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(AssessmentDefinition { assessment, items })
}
