//! Answer grading.
//!
//! Multiple choice answers must match the correct option exactly. Short
//! answers are matched against a comma-separated synonym list after trimming
//! and case folding. Nothing fuzzier than that: no edit distance, no partial
//! credit. A learner may overrule a failed short answer match, which forces
//! the outcome to correct.

use crate::model::{ExamSettings, Question, QuestionType};
use crate::session::QuestionState;

/// Normalize a short answer for comparison.
pub fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// The accepted answers of a short answer question, normalized.
pub fn accepted_answers(question: &Question) -> Vec<String> {
    question
        .correct_answer
        .split(',')
        .map(normalize_answer)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Grade `submitted` against `question`.
///
/// `overruled` always wins: the outcome is correct no matter what was
/// submitted.
pub fn evaluate(question: &Question, submitted: &str, overruled: bool) -> bool {
    if overruled {
        return true;
    }
    match question.kind {
        QuestionType::MultipleChoice => submitted == question.correct_answer,
        QuestionType::ShortAnswer => {
            let submitted = normalize_answer(submitted);
            !submitted.is_empty() && accepted_answers(question).contains(&submitted)
        }
    }
}

/// Whether the overrule affordance should be offered for `state`.
///
/// Only with instant feedback, only after a confirmed incorrect short
/// answer, and only once.
pub fn can_overrule(question: &Question, state: &QuestionState, settings: &ExamSettings) -> bool {
    settings.instant_feedback
        && state.is_answered
        && !state.is_correct
        && question.kind == QuestionType::ShortAnswer
        && !state.overruled
}
