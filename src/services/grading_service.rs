use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::assessment::AssessmentItem;
use crate::models::question::Question;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub selected_choice_id: Option<i64>,
    pub is_correct: bool,
    pub marks_awarded: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeReport {
    pub answers: Vec<GradedAnswer>,
    pub total_score: i32,
    pub total_marks: i32,
    pub correct_answers: i64,
    /// Referenced by the assessment but not returned by the question bank.
    pub missing_questions: Vec<i64>,
}

impl GradeReport {
    pub fn percentage(&self) -> f64 {
        percentage(self.total_score.into(), self.total_marks.into())
    }
}

pub struct GradingService;

impl GradingService {
    /// Grades `answers` (question id, selected choice) against the bank.
    ///
    /// The denominator covers every item of the assessment, answered or not.
    /// An item's weight is its override when set, otherwise the question's
    /// own marks. Questions missing from the bank keep their weight in the
    /// denominator (override, else the marks recorded when linked), score zero
    /// and get no graded answer; they are reported in `missing_questions`.
    pub fn grade(
        items: &[AssessmentItem],
        bank: &HashMap<i64, Question>,
        answers: &[(i64, Option<i64>)],
    ) -> GradeReport {
        let mut report = GradeReport::default();
        let mut weights: HashMap<i64, i32> = HashMap::with_capacity(items.len());

        for item in items {
            match bank.get(&item.question_id) {
                Some(question) => {
                    let marks = item.marks_override.unwrap_or(question.marks);
                    weights.insert(item.question_id, marks);
                    report.total_marks += marks;
                }
                None => {
                    report.total_marks += item.marks_override.unwrap_or(item.question_marks);
                    report.missing_questions.push(item.question_id);
                }
            }
        }

        for &(question_id, selected_choice_id) in answers {
            let (Some(question), Some(&marks)) = (bank.get(&question_id), weights.get(&question_id))
            else {
                tracing::warn!(question_id, "answer references a question that cannot be graded");
                continue;
            };

            let is_correct = match (selected_choice_id, question.correct_choice_id()) {
                (Some(selected), Some(correct)) => selected == correct,
                _ => false,
            };
            let marks_awarded = if is_correct { marks } else { 0 };

            report.total_score += marks_awarded;
            if is_correct {
                report.correct_answers += 1;
            }
            report.answers.push(GradedAnswer {
                question_id,
                selected_choice_id,
                is_correct,
                marks_awarded,
            });
        }

        report
    }
}

/// `part / whole * 100` rounded to two decimals; zero when `whole` is zero.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    let pct = Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole);
    to_rounded_f64(pct)
}

pub fn to_rounded_f64(value: Decimal) -> f64 {
    value.round_dp(2).to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Choice;

    fn question(id: i64, marks: i32, correct: Option<i64>, choice_ids: &[i64]) -> Question {
        Question {
            id,
            question_text: format!("Question {}", id),
            marks,
            choices: choice_ids
                .iter()
                .map(|&cid| Choice {
                    id: cid,
                    question_id: id,
                    choice_text: format!("Choice {}", cid),
                    is_correct: Some(cid) == correct,
                })
                .collect(),
        }
    }

    fn item(question_id: i64, marks_override: Option<i32>) -> AssessmentItem {
        AssessmentItem {
            question_id,
            marks_override,
            question_marks: 1,
        }
    }

    fn bank(questions: Vec<Question>) -> HashMap<i64, Question> {
        questions.into_iter().map(|q| (q.id, q)).collect()
    }

    #[test]
    fn weighted_score_over_all_marks() {
        let bank = bank(vec![
            question(1, 1, Some(11), &[10, 11]),
            question(2, 2, Some(21), &[20, 21]),
        ]);
        let items = [item(1, None), item(2, None)];

        let report = GradingService::grade(&items, &bank, &[(1, Some(11)), (2, Some(20))]);

        assert_eq!(report.total_score, 1);
        assert_eq!(report.total_marks, 3);
        assert_eq!(report.correct_answers, 1);
        assert_eq!(report.percentage(), 33.33);
        assert!(report.answers[0].is_correct);
        assert!(!report.answers[1].is_correct);
        assert_eq!(report.answers[1].marks_awarded, 0);
    }

    #[test]
    fn question_without_correct_choice_never_scores() {
        let bank = bank(vec![question(1, 5, None, &[10, 11])]);
        let items = [item(1, None)];

        for selection in [Some(10), Some(11), None] {
            let report = GradingService::grade(&items, &bank, &[(1, selection)]);
            assert_eq!(report.total_score, 0);
            assert_eq!(report.total_marks, 5);
            assert!(!report.answers[0].is_correct);
        }
    }

    #[test]
    fn unanswered_question_is_incorrect() {
        let bank = bank(vec![question(1, 1, Some(10), &[10, 11])]);
        let report = GradingService::grade(&[item(1, None)], &bank, &[(1, None)]);
        assert!(!report.answers[0].is_correct);
        assert_eq!(report.answers[0].selected_choice_id, None);
    }

    #[test]
    fn unsubmitted_questions_still_count_toward_total_marks() {
        let bank = bank(vec![
            question(1, 1, Some(10), &[10]),
            question(2, 2, Some(20), &[20]),
        ]);
        let report = GradingService::grade(&[item(1, None), item(2, None)], &bank, &[(1, Some(10))]);
        assert_eq!(report.total_score, 1);
        assert_eq!(report.total_marks, 3);
        assert_eq!(report.answers.len(), 1);
    }

    #[test]
    fn marks_override_replaces_question_weight() {
        let bank = bank(vec![question(1, 1, Some(10), &[10])]);
        let report = GradingService::grade(&[item(1, Some(4))], &bank, &[(1, Some(10))]);
        assert_eq!(report.total_score, 4);
        assert_eq!(report.total_marks, 4);
        assert_eq!(report.percentage(), 100.0);
    }

    #[test]
    fn missing_question_is_reported_and_skipped() {
        let bank = bank(vec![question(1, 1, Some(10), &[10])]);
        let report = GradingService::grade(
            &[item(1, None), item(2, None)],
            &bank,
            &[(1, Some(10)), (2, Some(99))],
        );
        assert_eq!(report.missing_questions, vec![2]);
        assert_eq!(report.answers.len(), 1);
        assert_eq!(report.total_score, 1);
        assert_eq!(report.total_marks, 2);
        assert_eq!(report.percentage(), 50.0);
    }

    #[test]
    fn missing_question_keeps_its_override_weight() {
        let bank = bank(vec![question(1, 1, Some(10), &[10])]);
        let items = [item(1, None), item(2, Some(3))];
        let report = GradingService::grade(&items, &bank, &[(1, Some(10))]);
        assert_eq!(report.total_marks, 4);
        assert_eq!(report.correct_answers, 1);
    }

    #[test]
    fn grading_is_deterministic() {
        let bank = bank(vec![
            question(1, 3, Some(10), &[10, 11]),
            question(2, 1, Some(21), &[20, 21]),
        ]);
        let items = [item(1, None), item(2, None)];
        let answers = [(1, Some(10)), (2, Some(20))];
        assert_eq!(
            GradingService::grade(&items, &bank, &answers),
            GradingService::grade(&items, &bank, &answers)
        );
    }

    #[test]
    fn percentage_handles_zero_marks_and_bounds() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(0, 7), 0.0);
        assert_eq!(percentage(7, 7), 100.0);
        assert_eq!(percentage(2, 3), 66.67);
    }
}
