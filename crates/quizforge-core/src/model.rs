//! Core data model types for quizforge.
//!
//! Field names follow the persisted row layout (`question_text`,
//! `question_type`, `user_id`, `created_at`) so the same types can be read
//! straight from a backend.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InvariantViolation, ReportError};

/// Identifier of a question in the repository.
pub type QuestionId = i64;

/// Minimum number of options on a multiple choice question.
pub const MIN_OPTIONS: usize = 2;
/// Maximum number of options on a multiple choice question.
pub const MAX_OPTIONS: usize = 6;

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Pick one of a fixed set of options.
    MultipleChoice,
    /// Free text graded against a comma-separated synonym list.
    ShortAnswer,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::MultipleChoice => write!(f, "multiple_choice"),
            QuestionType::ShortAnswer => write!(f, "short_answer"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "multiple_choice" | "mc" => Ok(QuestionType::MultipleChoice),
            "short_answer" | "sa" | "essay" => Ok(QuestionType::ShortAnswer),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// A single question drawn into an exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(rename = "question_text")]
    pub text: String,
    #[serde(rename = "question_type")]
    pub kind: QuestionType,
    /// Candidate answers. Only meaningful for multiple choice.
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<String>,
    /// One literal option (multiple choice) or a comma-separated synonym list.
    pub correct_answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub explanation: String,
    pub category: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Question {
    pub fn is_multiple_choice(&self) -> bool {
        self.kind == QuestionType::MultipleChoice
    }

    /// Check the structural invariants of this question.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        match self.kind {
            QuestionType::MultipleChoice => {
                let count = self.options.len();
                if count < MIN_OPTIONS {
                    return Err(InvariantViolation::TooFewOptions { id: self.id, count });
                }
                if count > MAX_OPTIONS {
                    return Err(InvariantViolation::TooManyOptions { id: self.id, count });
                }
                let mut seen = HashSet::new();
                for option in &self.options {
                    if !seen.insert(option.as_str()) {
                        return Err(InvariantViolation::DuplicateOption {
                            id: self.id,
                            option: option.clone(),
                        });
                    }
                }
                if !seen.contains(self.correct_answer.as_str()) {
                    return Err(InvariantViolation::AnswerNotInOptions {
                        id: self.id,
                        answer: self.correct_answer.clone(),
                    });
                }
                Ok(())
            }
            QuestionType::ShortAnswer => {
                if self.correct_answer.split(',').all(|s| s.trim().is_empty()) {
                    return Err(InvariantViolation::EmptyAnswerKey { id: self.id });
                }
                Ok(())
            }
        }
    }
}

/// Immutable log entry of one graded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    #[serde(rename = "user_id")]
    pub user: String,
    pub question_id: QuestionId,
    #[serde(default)]
    pub category: String,
    pub is_correct: bool,
    #[serde(rename = "created_at")]
    pub timestamp: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn new(user: &str, question: &Question, is_correct: bool) -> Self {
        Self {
            user: user.to_string(),
            question_id: question.id,
            category: question.category.clone(),
            is_correct,
            timestamp: Utc::now(),
        }
    }
}

/// Per-session exam options. Fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSettings {
    /// Restrict to one category; `None` samples across all of them.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_true")]
    pub allow_backtracking: bool,
    #[serde(default = "default_true")]
    pub instant_feedback: bool,
    #[serde(default)]
    pub timed: bool,
    #[serde(default = "default_true")]
    pub record_stats: bool,
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self {
            category: None,
            allow_backtracking: true,
            instant_feedback: true,
            timed: false,
            record_stats: true,
        }
    }
}

impl ExamSettings {
    /// Settings for one category with everything else at its default.
    pub fn for_category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }
}

fn default_true() -> bool {
    true
}

/// Review state of a learner's report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Pending,
}

/// A learner flagging a question as wrong or unclear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionReport {
    pub question_id: QuestionId,
    pub reason: String,
    #[serde(default)]
    pub status: ReportStatus,
}

impl QuestionReport {
    /// A pending report. Blank reasons are rejected.
    pub fn new(question_id: QuestionId, reason: &str) -> Result<Self, ReportError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ReportError::BlankReason);
        }
        Ok(Self {
            question_id,
            reason: reason.to_string(),
            status: ReportStatus::Pending,
        })
    }
}
