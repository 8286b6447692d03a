//! Collaborator traits for question and attempt storage.
//!
//! These async traits are implemented by the `quizforge-store` crate. The
//! wire format is owned by the implementation; the core only sees
//! [`Question`] and [`AttemptRecord`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::model::{AttemptRecord, Question, QuestionReport};

/// Optional narrowing for [`QuestionSource::list_questions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionFilter {
    #[serde(default)]
    pub category: Option<String>,
}

impl QuestionFilter {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
        }
    }

    pub fn matches(&self, question: &Question) -> bool {
        self.category
            .as_deref()
            .map_or(true, |c| question.category == c)
    }
}

/// Read access to the question repository.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Human-readable backend name (e.g. "memory").
    fn name(&self) -> &str;

    /// All questions, optionally restricted to one category.
    async fn list_questions(
        &self,
        filter: Option<&QuestionFilter>,
    ) -> Result<Vec<Question>, PersistenceError>;

    /// Up to `limit` random questions from one category.
    async fn sample_questions_by_category(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Question>, PersistenceError>;

    /// Up to `limit` random questions from any category.
    async fn sample_mixed_questions(&self, limit: usize)
        -> Result<Vec<Question>, PersistenceError>;

    /// Distinct categories holding at least one question, sorted.
    async fn list_categories(&self) -> Result<Vec<String>, PersistenceError> {
        let mut categories: Vec<String> = self
            .list_questions(None)
            .await?
            .into_iter()
            .map(|q| q.category)
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }
}

/// Append-only attempt history.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Append a batch of records. Existing records are never touched.
    async fn record_attempts(&self, records: &[AttemptRecord]) -> Result<(), PersistenceError>;

    /// Every record belonging to `user`, oldest first.
    async fn list_attempts(&self, user: &str) -> Result<Vec<AttemptRecord>, PersistenceError>;
}

/// Learner feedback on questions.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Queue `report` for review.
    async fn report_question(&self, report: &QuestionReport) -> Result<(), PersistenceError>;
}

/// A backend that serves questions, stores attempts and takes reports.
pub trait QuizBackend: QuestionSource + AttemptStore + ReportSink {}

impl<T: QuestionSource + AttemptStore + ReportSink + ?Sized> QuizBackend for T {}
