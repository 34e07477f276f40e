//! Rules of the attempt state machine that do not touch storage: ownership,
//! state gates, the time limit and the shape of an acceptable answer sheet.
//! `AttemptService` applies them in order inside its transactions.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::dto::attempt_dto::AnswerInput;
use crate::error::{Error, Result};
use crate::models::answer::AnswerDraft;
use crate::models::assessment::AssessmentDefinition;
use crate::models::attempt::{Attempt, AttemptStatus, Owner};
use crate::models::question::Question;

/// Answers that will be graded, in assessment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPlan {
    pub answers: Vec<(i64, Option<i64>)>,
    pub force_finalized: bool,
}

pub fn authorize(attempt: &Attempt, owner: &Owner) -> Result<()> {
    if owner.owns(attempt) {
        Ok(())
    } else {
        Err(Error::Forbidden(
            "This attempt belongs to someone else".to_string(),
        ))
    }
}

/// Returns the start time of an attempt that may still receive answers.
pub fn ensure_open(attempt: &Attempt) -> Result<DateTime<Utc>> {
    match (attempt.status, attempt.start_time) {
        (AttemptStatus::Completed, _) => Err(Error::Conflict(
            "Assessment already completed".to_string(),
        )),
        (AttemptStatus::Invited, _) | (_, None) => Err(Error::Conflict(
            "Assessment has not been started".to_string(),
        )),
        (AttemptStatus::Started, Some(started_at)) => Ok(started_at),
    }
}

pub fn deadline(started_at: DateTime<Utc>, limit: Duration) -> DateTime<Utc> {
    started_at + limit
}

/// Expired once strictly more than `limit` has elapsed since the start.
pub fn is_expired(started_at: DateTime<Utc>, limit: Duration, now: DateTime<Utc>) -> bool {
    now - started_at > limit
}

/// Builds the set of answers to grade.
///
/// Within the time limit the payload must answer every assessment question the
/// bank still holds and nothing outside the assessment; an answer for a
/// question that has since left the bank is accepted and graded as zero.
/// Past the limit, the autosaved drafts overlaid by whatever the payload
/// carries are graded as they are, and answers to foreign questions are dropped.
pub fn plan_submission(
    definition: &AssessmentDefinition,
    bank: &HashMap<i64, Question>,
    submitted: &[AnswerInput],
    drafts: &[AnswerDraft],
    expired: bool,
) -> Result<SubmissionPlan> {
    let mut by_question: HashMap<i64, Option<i64>> = HashMap::with_capacity(submitted.len());
    for answer in submitted {
        if by_question
            .insert(answer.question_id, answer.selected_choice_id)
            .is_some()
        {
            return Err(Error::BadRequest(format!(
                "Question {} was answered more than once",
                answer.question_id
            )));
        }
    }

    if !expired {
        let foreign = by_question.keys().any(|id| !definition.contains(*id));
        let unanswered = definition
            .items
            .iter()
            .filter(|item| bank.contains_key(&item.question_id))
            .any(|item| !by_question.contains_key(&item.question_id));
        if foreign || unanswered {
            return Err(Error::BadRequest(
                "All questions must be answered".to_string(),
            ));
        }
        let answers = definition
            .items
            .iter()
            .filter_map(|item| {
                by_question
                    .get(&item.question_id)
                    .map(|selected| (item.question_id, *selected))
            })
            .collect();
        return Ok(SubmissionPlan {
            answers,
            force_finalized: false,
        });
    }

    let mut captured: HashMap<i64, Option<i64>> = drafts
        .iter()
        .map(|d| (d.question_id, d.selected_choice_id))
        .collect();
    for (question_id, selected) in by_question {
        if definition.contains(question_id) {
            captured.insert(question_id, selected);
        } else {
            tracing::warn!(
                assessment_id = definition.id(),
                question_id,
                "dropping late answer for a question outside the assessment"
            );
        }
    }

    let answers = definition
        .items
        .iter()
        .filter_map(|item| {
            captured
                .get(&item.question_id)
                .map(|selected| (item.question_id, *selected))
        })
        .collect();

    Ok(SubmissionPlan {
        answers,
        force_finalized: true,
    })
}

/// Rejects selections that are not choices of their question. On a
/// force-finalized sheet such a selection is cleared instead.
pub fn check_choices(plan: &mut SubmissionPlan, bank: &HashMap<i64, Question>) -> Result<()> {
    let lenient = plan.force_finalized;
    for (question_id, selected) in plan.answers.iter_mut() {
        let (Some(choice_id), Some(question)) = (*selected, bank.get(question_id)) else {
            continue;
        };
        if question.has_choice(choice_id) {
            continue;
        }
        if lenient {
            tracing::warn!(
                question_id = *question_id,
                choice_id,
                "clearing selection that does not belong to its question"
            );
            *selected = None;
        } else {
            return Err(Error::BadRequest(format!(
                "Choice {} does not belong to question {}",
                choice_id, question_id
            )));
        }
    }
    Ok(())
}
