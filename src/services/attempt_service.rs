use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{FromRow, PgConnection, PgPool};

use crate::dto::admin_dto::AttemptStatistics;
use crate::dto::attempt_dto::{
    AnswerInput, AttemptListItem, AttemptResult, QuestionSheet, SaveAnswerResponse, SheetChoice,
    SheetQuestion,
};
use crate::dto::invitation_dto::GuestInvitationView;
use crate::error::{Error, Result};
use crate::models::answer::{Answer, AnswerDraft};
use crate::models::attempt::{Attempt, AttemptOrigin, AttemptStatus, Owner};
use crate::services::assessment_service::load_definition;
use crate::services::grading_service::{self, GradingService};
use crate::services::question_service::{self, fetch_by_ids};
use crate::services::{audit_service, lifecycle};
use crate::utils::time::{seconds_until, Clock, SystemClock};

const ATTEMPT_COLUMNS: &str = "id, assessment_id, user_id, recruiter_id, student_email, access_token, \
     status, origin, start_time, end_time, score, total_marks, total_questions, correct_answers, \
     force_finalized, created_at";

/// A finalized attempt together with its score summary.
#[derive(Debug, Clone)]
pub struct Submission {
    pub attempt: Attempt,
    pub result: AttemptResult,
}

#[derive(FromRow)]
struct StatisticsRow {
    total_attempts: i64,
    completed_attempts: i64,
    average_score: Option<Decimal>,
    average_percentage: Option<Decimal>,
}

#[derive(Clone)]
pub struct AttemptService {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl AttemptService {
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Opens a direct attempt for a registered user.
    pub async fn start(&self, owner: &Owner, assessment_id: i64) -> Result<Attempt> {
        let Some(user_id) = owner.user_id() else {
            return Err(Error::BadRequest(
                "Invited students start through their invitation link".to_string(),
            ));
        };

        let mut tx = self.pool.begin().await?;
        let definition = load_definition(&mut tx, assessment_id).await?;
        if !definition.is_published() {
            return Err(Error::BadRequest("Assessment is not published".to_string()));
        }

        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            r#"INSERT INTO attempts (assessment_id, user_id, status, origin, start_time)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {ATTEMPT_COLUMNS}"#
        ))
        .bind(assessment_id)
        .bind(user_id)
        .bind(AttemptStatus::Started)
        .bind(AttemptOrigin::DirectAttempt)
        .bind(self.clock.now())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(attempt_id = attempt.id, user_id, assessment_id, "attempt started");
        Ok(attempt)
    }

    /// First access of an invitation link starts the clock; later accesses
    /// return the running attempt untouched.
    pub async fn begin_invitation(&self, token: &str) -> Result<Attempt> {
        let mut tx = self.pool.begin().await?;
        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE access_token = $1 FOR UPDATE"
        ))
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Invitation not found".to_string()))?;

        let attempt = match attempt.status {
            AttemptStatus::Completed => {
                return Err(Error::Conflict("Assessment already completed".to_string()))
            }
            AttemptStatus::Started => attempt,
            AttemptStatus::Invited => {
                let started = sqlx::query_as::<_, Attempt>(&format!(
                    r#"UPDATE attempts SET status = $2, start_time = $3
                       WHERE id = $1
                       RETURNING {ATTEMPT_COLUMNS}"#
                ))
                .bind(attempt.id)
                .bind(AttemptStatus::Started)
                .bind(self.clock.now())
                .fetch_one(&mut *tx)
                .await?;
                tracing::info!(attempt_id = started.id, "invitation opened, attempt started");
                started
            }
        };
        tx.commit().await?;
        Ok(attempt)
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Attempt> {
        sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE access_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Invitation not found".to_string()))
    }

    pub async fn invitation_overview(&self, token: &str) -> Result<GuestInvitationView> {
        let attempt = self.find_by_token(token).await?;
        let mut conn = self.pool.acquire().await?;
        let definition = load_definition(&mut conn, attempt.assessment_id).await?;
        let limit = definition.time_limit();

        Ok(GuestInvitationView {
            attempt_id: attempt.id,
            total_questions: definition.items.len() as i64,
            assessment_name: definition.assessment.name,
            description: definition.assessment.description,
            duration_minutes: definition.assessment.duration_minutes,
            status: attempt.status,
            start_time: attempt.start_time,
            deadline: attempt
                .start_time
                .map(|started_at| lifecycle::deadline(started_at, limit)),
        })
    }

    pub async fn get_attempt(&self, attempt_id: i64) -> Result<Attempt> {
        let mut conn = self.pool.acquire().await?;
        fetch_attempt(&mut conn, attempt_id, false).await
    }

    /// Grades and finalizes an attempt. Past the time limit the attempt is
    /// force-finalized with whatever answers were captured.
    pub async fn submit(
        &self,
        attempt_id: i64,
        owner: &Owner,
        answers: &[AnswerInput],
    ) -> Result<Submission> {
        let mut tx = self.pool.begin().await?;

        let attempt = fetch_attempt(&mut tx, attempt_id, true).await?;
        lifecycle::authorize(&attempt, owner)?;
        let started_at = lifecycle::ensure_open(&attempt)?;

        let definition = load_definition(&mut tx, attempt.assessment_id).await?;
        let now = self.clock.now();
        let expired = lifecycle::is_expired(started_at, definition.time_limit(), now);

        let drafts = if expired {
            load_drafts(&mut tx, attempt.id).await?
        } else {
            Vec::new()
        };
        let bank = question_service::index(fetch_by_ids(&mut tx, &definition.question_ids()).await?);
        let mut plan = lifecycle::plan_submission(&definition, &bank, answers, &drafts, expired)?;
        lifecycle::check_choices(&mut plan, &bank)?;

        let report = GradingService::grade(&definition.items, &bank, &plan.answers);

        for question_id in &report.missing_questions {
            tracing::warn!(
                attempt_id,
                question_id = *question_id,
                "assessment references a question missing from the bank, scoring it as zero"
            );
            audit_service::record(
                &mut tx,
                None,
                "grading_anomaly",
                "attempt",
                attempt.id,
                Some(json!({
                    "question_id": question_id,
                    "reason": "question_missing",
                })),
            )
            .await?;
        }

        for answer in &report.answers {
            sqlx::query(
                r#"INSERT INTO attempt_answers (attempt_id, question_id, selected_choice_id, is_correct)
                   VALUES ($1, $2, $3, $4)"#,
            )
            .bind(attempt.id)
            .bind(answer.question_id)
            .bind(answer.selected_choice_id)
            .bind(answer.is_correct)
            .execute(&mut *tx)
            .await?;
        }

        let total_questions = definition.items.len() as i32;
        let correct_answers = report.correct_answers as i32;
        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            r#"UPDATE attempts
               SET status = $2, score = $3, total_marks = $4, total_questions = $5,
                   correct_answers = $6, end_time = $7, force_finalized = $8
               WHERE id = $1
               RETURNING {ATTEMPT_COLUMNS}"#
        ))
        .bind(attempt.id)
        .bind(AttemptStatus::Completed)
        .bind(report.total_score)
        .bind(report.total_marks)
        .bind(total_questions)
        .bind(correct_answers)
        .bind(now)
        .bind(plan.force_finalized)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(r#"DELETE FROM answer_drafts WHERE attempt_id = $1"#)
            .bind(attempt.id)
            .execute(&mut *tx)
            .await?;

        audit_service::record(
            &mut tx,
            owner.user_id(),
            "attempt_submitted",
            "attempt",
            attempt.id,
            Some(json!({
                "score": report.total_score,
                "total_marks": report.total_marks,
                "correct_answers": report.correct_answers,
                "force_finalized": plan.force_finalized,
            })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            attempt_id,
            score = report.total_score,
            total_marks = report.total_marks,
            force_finalized = plan.force_finalized,
            "attempt submitted"
        );

        let result = AttemptResult {
            attempt_id: attempt.id,
            total_questions: i64::from(total_questions),
            total_score: report.total_score,
            correct_answers: report.correct_answers,
            total_marks: report.total_marks,
            percentage: report.percentage(),
            completed_at: now,
            force_finalized: plan.force_finalized,
        };
        Ok(Submission { attempt, result })
    }

    /// Autosaves one selection of an open attempt.
    pub async fn save_answer(
        &self,
        attempt_id: i64,
        owner: &Owner,
        question_id: i64,
        selected_choice_id: Option<i64>,
    ) -> Result<SaveAnswerResponse> {
        let mut tx = self.pool.begin().await?;

        let attempt = fetch_attempt(&mut tx, attempt_id, true).await?;
        lifecycle::authorize(&attempt, owner)?;
        let started_at = lifecycle::ensure_open(&attempt)?;

        let definition = load_definition(&mut tx, attempt.assessment_id).await?;
        let now = self.clock.now();
        if lifecycle::is_expired(started_at, definition.time_limit(), now) {
            return Err(Error::Expired(
                "Time limit exceeded, submit the attempt to finalize it".to_string(),
            ));
        }
        if !definition.contains(question_id) {
            return Err(Error::BadRequest(format!(
                "Question {} is not part of this assessment",
                question_id
            )));
        }
        let Some(question) = fetch_by_ids(&mut tx, &[question_id]).await?.pop() else {
            return Err(Error::BadRequest(format!(
                "Question {} is no longer available",
                question_id
            )));
        };
        if let Some(choice_id) = selected_choice_id {
            if !question.has_choice(choice_id) {
                return Err(Error::BadRequest(format!(
                    "Choice {} does not belong to question {}",
                    choice_id, question_id
                )));
            }
        }

        let saved_at: DateTime<Utc> = sqlx::query_scalar(
            r#"INSERT INTO answer_drafts (attempt_id, question_id, selected_choice_id, saved_at)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (attempt_id, question_id)
               DO UPDATE SET selected_choice_id = EXCLUDED.selected_choice_id, saved_at = EXCLUDED.saved_at
               RETURNING saved_at"#,
        )
        .bind(attempt.id)
        .bind(question_id)
        .bind(selected_choice_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(attempt_id, question_id, "answer draft saved");
        Ok(SaveAnswerResponse {
            saved: true,
            question_id,
            saved_at,
        })
    }

    /// Questions of an open attempt without their correct flags, plus saved drafts.
    pub async fn question_sheet(&self, attempt_id: i64, owner: &Owner) -> Result<QuestionSheet> {
        let mut conn = self.pool.acquire().await?;

        let attempt = fetch_attempt(&mut conn, attempt_id, false).await?;
        lifecycle::authorize(&attempt, owner)?;
        let started_at = lifecycle::ensure_open(&attempt)?;

        let definition = load_definition(&mut conn, attempt.assessment_id).await?;
        let bank = question_service::index(fetch_by_ids(&mut conn, &definition.question_ids()).await?);
        let drafts = load_drafts(&mut conn, attempt.id).await?;

        let questions = definition
            .items
            .iter()
            .filter_map(|item| {
                let question = bank.get(&item.question_id)?;
                Some(SheetQuestion {
                    id: question.id,
                    question_text: question.question_text.clone(),
                    marks: item.marks_override.unwrap_or(question.marks),
                    choices: question
                        .choices
                        .iter()
                        .map(|c| SheetChoice {
                            id: c.id,
                            choice_text: c.choice_text.clone(),
                        })
                        .collect(),
                })
            })
            .collect();

        let deadline = lifecycle::deadline(started_at, definition.time_limit());
        Ok(QuestionSheet {
            attempt_id: attempt.id,
            assessment_id: definition.id(),
            assessment_name: definition.assessment.name.clone(),
            duration_minutes: definition.assessment.duration_minutes,
            deadline,
            seconds_remaining: seconds_until(deadline, self.clock.now()),
            questions,
            saved_answers: drafts
                .into_iter()
                .map(|d| AnswerInput {
                    question_id: d.question_id,
                    selected_choice_id: d.selected_choice_id,
                })
                .collect(),
        })
    }

    /// Reads the score summary persisted when the attempt was finalized, so
    /// later changes to the assessment or the bank do not alter it.
    pub async fn get_result(&self, attempt_id: i64, owner: &Owner) -> Result<AttemptResult> {
        let mut conn = self.pool.acquire().await?;

        let attempt = fetch_attempt(&mut conn, attempt_id, false).await?;
        lifecycle::authorize(&attempt, owner)?;

        let (
            AttemptStatus::Completed,
            Some(score),
            Some(total_marks),
            Some(total_questions),
            Some(correct_answers),
            Some(completed_at),
        ) = (
            attempt.status,
            attempt.score,
            attempt.total_marks,
            attempt.total_questions,
            attempt.correct_answers,
            attempt.end_time,
        )
        else {
            return Err(Error::NotFound(
                "Result not available: attempt is not completed".to_string(),
            ));
        };

        Ok(AttemptResult {
            attempt_id: attempt.id,
            total_questions: total_questions.into(),
            total_score: score,
            correct_answers: correct_answers.into(),
            total_marks,
            percentage: grading_service::percentage(score.into(), total_marks.into()),
            completed_at,
            force_finalized: attempt.force_finalized,
        })
    }

    pub async fn list_for_owner(&self, owner: &Owner) -> Result<Vec<AttemptListItem>> {
        let filter = match owner {
            Owner::User { .. } => "a.user_id = $1",
            Owner::Guest { .. } => "a.student_email = $1",
        };
        let sql = format!(
            r#"SELECT a.id, a.assessment_id, s.name AS assessment_name, a.status, a.origin,
                      a.student_email, a.score, a.total_marks, a.start_time, a.end_time
               FROM attempts a
               JOIN assessments s ON s.id = a.assessment_id
               WHERE {filter}
               ORDER BY a.created_at DESC, a.id DESC"#
        );
        let query = sqlx::query_as::<_, AttemptListItem>(&sql);
        let rows = match owner {
            Owner::User { user_id } => query.bind(*user_id).fetch_all(&self.pool).await?,
            Owner::Guest { email } => query.bind(email.as_str()).fetch_all(&self.pool).await?,
        };
        Ok(rows)
    }

    /// Graded answers of an attempt. Readable by its owner or by an admin.
    pub async fn answers_for(
        &self,
        attempt_id: i64,
        caller: &Owner,
        is_admin: bool,
    ) -> Result<Vec<Answer>> {
        let mut conn = self.pool.acquire().await?;
        let attempt = fetch_attempt(&mut conn, attempt_id, false).await?;
        if !is_admin {
            lifecycle::authorize(&attempt, caller)?;
        }

        let rows = sqlx::query_as::<_, Answer>(
            r#"SELECT attempt_id, question_id, selected_choice_id, is_correct
               FROM attempt_answers WHERE attempt_id = $1 ORDER BY question_id"#,
        )
        .bind(attempt.id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    pub async fn list_for_assessment(&self, assessment_id: i64) -> Result<Vec<AttemptListItem>> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM assessments WHERE id = $1)"#)
                .bind(assessment_id)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(Error::NotFound("Assessment not found".to_string()));
        }

        let rows = sqlx::query_as::<_, AttemptListItem>(
            r#"SELECT a.id, a.assessment_id, s.name AS assessment_name, a.status, a.origin,
                      a.student_email, a.score, a.total_marks, a.start_time, a.end_time
               FROM attempts a
               JOIN assessments s ON s.id = a.assessment_id
               WHERE a.assessment_id = $1
               ORDER BY a.created_at DESC, a.id DESC"#,
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn statistics(&self) -> Result<AttemptStatistics> {
        let row = sqlx::query_as::<_, StatisticsRow>(
            r#"SELECT
                   COUNT(*) AS total_attempts,
                   COUNT(*) FILTER (WHERE status = 'completed') AS completed_attempts,
                   AVG(score) FILTER (WHERE status = 'completed') AS average_score,
                   AVG(COALESCE(score * 100.0 / NULLIF(total_marks, 0), 0))
                       FILTER (WHERE status = 'completed') AS average_percentage
               FROM attempts"#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AttemptStatistics {
            total_attempts: row.total_attempts,
            completed_attempts: row.completed_attempts,
            average_score: row
                .average_score
                .map(grading_service::to_rounded_f64)
                .unwrap_or(0.0),
            average_percentage: row
                .average_percentage
                .map(grading_service::to_rounded_f64)
                .unwrap_or(0.0),
            completion_rate: grading_service::percentage(
                row.completed_attempts,
                row.total_attempts,
            ),
        })
    }

    /// Answers and drafts go with it.
    pub async fn delete_attempt(&self, admin_id: i64, attempt_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<(i64, AttemptStatus)> = sqlx::query_as(
            r#"DELETE FROM attempts WHERE id = $1 RETURNING assessment_id, status"#,
        )
        .bind(attempt_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((assessment_id, status)) = deleted else {
            return Err(Error::NotFound("Attempt not found".to_string()));
        };

        audit_service::record(
            &mut tx,
            Some(admin_id),
            "attempt_deleted",
            "attempt",
            attempt_id,
            Some(json!({ "assessment_id": assessment_id, "status": status })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(attempt_id, admin_id, "attempt deleted");
        Ok(())
    }
}

async fn fetch_attempt(conn: &mut PgConnection, attempt_id: i64, lock: bool) -> Result<Attempt> {
    let sql = format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = $1{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, Attempt>(&sql)
        .bind(attempt_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))
}

async fn load_drafts(conn: &mut PgConnection, attempt_id: i64) -> Result<Vec<AnswerDraft>> {
    let rows = sqlx::query_as::<_, AnswerDraft>(
        r#"SELECT attempt_id, question_id, selected_choice_id, saved_at
           FROM answer_drafts WHERE attempt_id = $1 ORDER BY question_id"#,
    )
    .bind(attempt_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
