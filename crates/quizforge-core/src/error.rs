//! Error types for sampling, validation and persistence.
//!
//! `PersistenceError` lives in `quizforge-core` rather than in the store crate
//! so the exam engine can classify collaborator failures without string
//! matching.

use thiserror::Error;

use crate::model::QuestionId;

/// Errors raised by the external question/attempt collaborator.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The backend rejected our credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend returned an error response.
    #[error("backend error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with something we could not decode.
    #[error("failed to decode backend response: {0}")]
    Decode(String),

    /// The backend is not reachable at all (e.g. disabled for tests).
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl PersistenceError {
    /// Returns `true` if retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PersistenceError::Timeout(_)
            | PersistenceError::Network(_)
            | PersistenceError::Unavailable(_) => true,
            PersistenceError::Api { status, .. } => *status >= 500 || *status == 429,
            PersistenceError::Unauthorized(_) | PersistenceError::Decode(_) => false,
        }
    }
}

/// A question that breaks the data model and must not reach a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("question {id}: multiple choice needs at least 2 options, found {count}")]
    TooFewOptions { id: QuestionId, count: usize },

    #[error("question {id}: multiple choice allows at most 6 options, found {count}")]
    TooManyOptions { id: QuestionId, count: usize },

    #[error("question {id}: duplicate option {option:?}")]
    DuplicateOption { id: QuestionId, option: String },

    #[error("question {id}: correct answer {answer:?} is not one of the options")]
    AnswerNotInOptions { id: QuestionId, answer: String },

    #[error("question {id}: short answer has no accepted answers")]
    EmptyAnswerKey { id: QuestionId },
}

/// Zero eligible questions. The variant tells the caller which stage ran dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EmptyPool {
    /// Sampling found nothing matching the requested settings.
    #[error("no questions match the selected settings")]
    NoMatchingQuestions,

    /// Hard-mode filtering removed everything: the learner has mastered the set.
    #[error("no hard questions remain, everything sampled is above the accuracy threshold")]
    Mastered,
}

/// Errors raised when sending a question report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("a report needs a reason")]
    BlankReason,

    #[error("there is no current question to report")]
    NoQuestion,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Errors surfaced when preparing an exam.
#[derive(Debug, Error)]
pub enum ExamError {
    #[error(transparent)]
    EmptyPool(#[from] EmptyPool),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(PersistenceError::Timeout(30).is_transient());
        assert!(PersistenceError::Network("reset".into()).is_transient());
        assert!(PersistenceError::Api {
            status: 503,
            message: "down".into()
        }
        .is_transient());
        assert!(!PersistenceError::Api {
            status: 400,
            message: "bad".into()
        }
        .is_transient());
        assert!(!PersistenceError::Unauthorized("nope".into()).is_transient());
    }

    #[test]
    fn exam_error_wraps_stage() {
        let err: ExamError = EmptyPool::Mastered.into();
        assert!(matches!(err, ExamError::EmptyPool(EmptyPool::Mastered)));
        assert!(err.to_string().contains("no hard questions"));
    }
}
