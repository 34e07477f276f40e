use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct QuestionRow {
    pub id: i64,
    pub question_text: String,
    pub marks: i32,
}

/// Question as served by the question bank, choices included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub marks: i32,
    pub choices: Vec<Choice>,
}

impl Question {
    /// The first choice flagged correct. Authoring guarantees exactly one;
    /// a mis-authored question without any yields `None`.
    pub fn correct_choice_id(&self) -> Option<i64> {
        self.choices.iter().find(|c| c.is_correct).map(|c| c.id)
    }

    pub fn has_choice(&self, choice_id: i64) -> bool {
        self.choices.iter().any(|c| c.id == choice_id)
    }
}
