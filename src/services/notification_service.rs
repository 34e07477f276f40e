use crate::error::Result;
use crate::models::attempt::Attempt;
use crate::models::notification::{
    OutboxMessage, STATUS_FAILED, STATUS_PENDING, STATUS_SENDING, STATUS_SENT, STATUS_SKIPPED,
};
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;

pub const EVENT_INVITATION: &str = "invitation";
pub const EVENT_ATTEMPT_COMPLETED: &str = "attempt_completed";

/// A message left in `sending` this long is assumed orphaned by a worker that
/// died mid-delivery and becomes claimable again.
pub const SENDING_LEASE_SECS: i64 = 300;

const OUTBOX_COLUMNS: &str = "id, event_type, recipient, payload, target_url, http_status, response_body, \
     attempts, max_attempts, next_retry_at, status, created_at, updated_at";

/// Outbox of e-mail notifications, drained by a background worker that
/// posts each message to the mail relay.
#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
    client: Client,
    relay_url: Option<String>,
    relay_secret: Option<String>,
}

impl NotificationService {
    pub fn new(
        pool: PgPool,
        client: Client,
        relay_url: Option<String>,
        relay_secret: Option<String>,
    ) -> Self {
        Self {
            pool,
            client,
            relay_url,
            relay_secret,
        }
    }

    pub async fn enqueue(
        &self,
        event_type: &str,
        recipient: &str,
        payload: &JsonValue,
    ) -> Result<OutboxMessage> {
        let row = sqlx::query_as::<_, OutboxMessage>(&format!(
            r#"INSERT INTO notification_outbox (event_type, recipient, payload, target_url, status)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {OUTBOX_COLUMNS}"#
        ))
        .bind(event_type)
        .bind(recipient)
        .bind(payload)
        .bind(self.relay_url.as_deref())
        .bind(STATUS_PENDING)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn notify_invitation(
        &self,
        attempt: &Attempt,
        assessment_name: &str,
        link: &str,
    ) -> Result<Option<OutboxMessage>> {
        let Some(email) = attempt.student_email.as_deref() else {
            return Ok(None);
        };
        let payload = json!({
            "attempt_id": attempt.id,
            "assessment_id": attempt.assessment_id,
            "assessment_name": assessment_name,
            "link": link,
        });
        self.enqueue(EVENT_INVITATION, email, &payload).await.map(Some)
    }

    /// Tells the inviting recruiter that an invited student has finished.
    /// Direct attempts have no recruiter and produce nothing.
    pub async fn notify_attempt_completed(
        &self,
        attempt: &Attempt,
        percentage: f64,
    ) -> Result<Option<OutboxMessage>> {
        let Some(recruiter_id) = attempt.recruiter_id else {
            return Ok(None);
        };
        let recruiter_email: Option<String> =
            sqlx::query_scalar(r#"SELECT email FROM users WHERE id = $1"#)
                .bind(recruiter_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(recruiter_email) = recruiter_email else {
            tracing::warn!(recruiter_id, attempt_id = attempt.id, "recruiter no longer exists");
            return Ok(None);
        };

        let payload = json!({
            "attempt_id": attempt.id,
            "assessment_id": attempt.assessment_id,
            "student_email": attempt.student_email,
            "score": attempt.score,
            "total_marks": attempt.total_marks,
            "percentage": percentage,
            "force_finalized": attempt.force_finalized,
        });
        self.enqueue(EVENT_ATTEMPT_COMPLETED, &recruiter_email, &payload)
            .await
            .map(Some)
    }

    pub async fn deliver_once(&self, message: &OutboxMessage) -> Result<()> {
        let Some(target_url) = message.target_url.as_deref() else {
            sqlx::query(
                r#"UPDATE notification_outbox SET status = $1, updated_at = NOW() WHERE id = $2"#,
            )
            .bind(STATUS_SKIPPED)
            .bind(message.id)
            .execute(&self.pool)
            .await?;
            tracing::debug!(message_id = message.id, "no mail relay configured, skipping");
            return Ok(());
        };

        let body = json!({
            "event": message.event_type,
            "to": message.recipient,
            "data": message.payload,
        });
        let mut request = self.client.post(target_url).json(&body);
        if let Some(secret) = self.relay_secret.as_deref() {
            request = request.header("X-Relay-Secret", secret);
        }

        match request.send().await {
            Ok(resp) => {
                let status = i32::from(resp.status().as_u16());
                let text = resp.text().await.unwrap_or_default();
                let outcome = if (200..300).contains(&status) {
                    STATUS_SENT
                } else {
                    STATUS_FAILED
                };
                sqlx::query(
                    r#"UPDATE notification_outbox
                       SET http_status = $1, response_body = $2, status = $3,
                           attempts = attempts + 1, updated_at = NOW()
                       WHERE id = $4"#,
                )
                .bind(status)
                .bind(text)
                .bind(outcome)
                .bind(message.id)
                .execute(&self.pool)
                .await?;
            }
            Err(err) => {
                tracing::warn!(message_id = message.id, error = %err, "mail relay request failed");
                sqlx::query(
                    r#"UPDATE notification_outbox
                       SET response_body = $1, status = $2, attempts = attempts + 1, updated_at = NOW()
                       WHERE id = $3"#,
                )
                .bind(err.to_string())
                .bind(STATUS_FAILED)
                .bind(message.id)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Claims and delivers one due message. Returns `false` when nothing is due.
    /// Messages stuck in `sending` past the lease are claimed again.
    pub async fn run_once(&self) -> Result<bool> {
        let claimed = sqlx::query_as::<_, OutboxMessage>(&format!(
            r#"UPDATE notification_outbox SET status = $2, updated_at = NOW()
               WHERE id = (
                   SELECT id FROM notification_outbox
                   WHERE (status = $1 AND (next_retry_at IS NULL OR next_retry_at <= NOW()))
                      OR (status = $2 AND updated_at < NOW() - make_interval(secs => $3))
                   ORDER BY created_at ASC
                   LIMIT 1
                   FOR UPDATE SKIP LOCKED
               )
               RETURNING {OUTBOX_COLUMNS}"#
        ))
        .bind(STATUS_PENDING)
        .bind(STATUS_SENDING)
        .bind(SENDING_LEASE_SECS as f64)
        .fetch_optional(&self.pool)
        .await?;

        let Some(message) = claimed else { return Ok(false) };

        if let Err(e) = self.deliver_once(&message).await {
            tracing::error!(message_id = message.id, error = ?e, "notification delivery bookkeeping failed");
        }

        let (attempts, max_attempts, status): (i32, i32, String) = sqlx::query_as(
            r#"SELECT attempts, max_attempts, status FROM notification_outbox WHERE id = $1"#,
        )
        .bind(message.id)
        .fetch_one(&self.pool)
        .await?;

        if status == STATUS_FAILED && attempts < max_attempts {
            sqlx::query(
                r#"UPDATE notification_outbox
                   SET status = $1, next_retry_at = NOW() + make_interval(secs => $2)
                   WHERE id = $3"#,
            )
            .bind(STATUS_PENDING)
            .bind(retry_delay_secs(attempts) as f64)
            .bind(message.id)
            .execute(&self.pool)
            .await?;
        } else if status == STATUS_FAILED {
            tracing::warn!(message_id = message.id, attempts, "notification gave up after max attempts");
        }

        Ok(true)
    }
}

/// 30 s doubled per failed attempt, capped at one hour.
pub fn retry_delay_secs(attempts: i32) -> i64 {
    let exponent = attempts.saturating_sub(1).clamp(0, 20) as u32;
    (30_i64 << exponent).min(3600)
}
