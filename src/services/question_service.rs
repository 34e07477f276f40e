use std::collections::HashMap;

use sqlx::PgConnection;

use crate::error::Result;
use crate::models::question::{Choice, Question, QuestionRow};

/// Loads questions and their choices in two batched queries. Ids the bank
/// does not know are silently absent from the result.
pub async fn fetch_by_ids(conn: &mut PgConnection, ids: &[i64]) -> Result<Vec<Question>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, QuestionRow>(
        r#"SELECT id, question_text, marks FROM questions WHERE id = ANY($1) ORDER BY id"#,
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    let choices = sqlx::query_as::<_, Choice>(
        r#"SELECT id, question_id, choice_text, is_correct
           FROM choices WHERE question_id = ANY($1)
           ORDER BY question_id, id"#,
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<i64, Vec<Choice>> = HashMap::new();
    for choice in choices {
        grouped.entry(choice.question_id).or_default().push(choice);
    }

    Ok(rows
        .into_iter()
        .map(|row| Question {
            choices: grouped.remove(&row.id).unwrap_or_default(),
            id: row.id,
            question_text: row.question_text,
            marks: row.marks,
        })
        .collect())
}

pub fn index(questions: Vec<Question>) -> HashMap<i64, Question> {
    questions.into_iter().map(|q| (q.id, q)).collect()
}
