//! Accuracy statistics folded from attempt history.
//!
//! Stats are always derived: the attempt log is the source of truth and
//! everything here can be recomputed from it at any time.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{AttemptRecord, Question, QuestionId};

/// Attempt counters for a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStat {
    pub question_id: QuestionId,
    pub attempts: u32,
    pub correct_count: u32,
}

impl QuestionStat {
    pub fn new(question_id: QuestionId) -> Self {
        Self {
            question_id,
            attempts: 0,
            correct_count: 0,
        }
    }

    /// Count one more graded attempt.
    pub fn apply(&mut self, is_correct: bool) {
        self.attempts = self.attempts.saturating_add(1);
        if is_correct {
            self.correct_count = self.correct_count.saturating_add(1);
        }
    }

    /// Fraction correct, or `None` before the first attempt.
    pub fn accuracy(&self) -> Option<f64> {
        (self.attempts > 0).then(|| f64::from(self.correct_count) / f64::from(self.attempts))
    }
}

/// Fold an attempt log into per-question stats.
pub fn fold(attempts: &[AttemptRecord]) -> HashMap<QuestionId, QuestionStat> {
    let mut stats: HashMap<QuestionId, QuestionStat> = HashMap::new();
    for record in attempts {
        stats
            .entry(record.question_id)
            .or_insert_with(|| QuestionStat::new(record.question_id))
            .apply(record.is_correct);
    }
    stats
}

/// Accuracy of a group of questions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Accuracy {
    /// Nothing attempted yet. Not the same as 0%.
    NoData,
    /// Fraction correct in `0.0..=1.0`.
    Ratio(f64),
}

impl Accuracy {
    fn from_counts(attempts: u64, correct: u64) -> Self {
        if attempts == 0 {
            Accuracy::NoData
        } else {
            Accuracy::Ratio(correct as f64 / attempts as f64)
        }
    }

    /// Rounded percentage, `None` when there is no data.
    pub fn percent(&self) -> Option<u32> {
        match self {
            Accuracy::NoData => None,
            Accuracy::Ratio(r) => Some((r * 100.0).round() as u32),
        }
    }
}

/// Aggregate over every question in a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: String,
    pub attempts: u64,
    pub correct: u64,
    /// Questions in the category.
    pub total_questions: usize,
    /// Questions in the category with at least one attempt.
    pub answered_questions: usize,
}

impl CategoryStat {
    fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            attempts: 0,
            correct: 0,
            total_questions: 0,
            answered_questions: 0,
        }
    }

    pub fn accuracy(&self) -> Accuracy {
        Accuracy::from_counts(self.attempts, self.correct)
    }
}

/// Per-category aggregates for `questions`, keyed and sorted by category.
pub fn category_stats(
    questions: &[Question],
    stats: &HashMap<QuestionId, QuestionStat>,
) -> BTreeMap<String, CategoryStat> {
    let mut out: BTreeMap<String, CategoryStat> = BTreeMap::new();
    for question in questions {
        let entry = out
            .entry(question.category.clone())
            .or_insert_with(|| CategoryStat::new(&question.category));
        entry.total_questions += 1;
        if let Some(stat) = stats.get(&question.id) {
            entry.attempts += u64::from(stat.attempts);
            entry.correct += u64::from(stat.correct_count);
            if stat.attempts > 0 {
                entry.answered_questions += 1;
            }
        }
    }
    out
}

/// Totals across the whole history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_attempts: u64,
    pub total_correct: u64,
    /// Distinct questions with at least one attempt.
    pub unique_answered: usize,
    /// Questions in the repository.
    pub total_questions: usize,
}

impl OverallStats {
    pub fn accuracy(&self) -> Accuracy {
        Accuracy::from_counts(self.total_attempts, self.total_correct)
    }
}

pub fn overall_stats(
    stats: &HashMap<QuestionId, QuestionStat>,
    total_questions: usize,
) -> OverallStats {
    let mut overall = OverallStats {
        total_attempts: 0,
        total_correct: 0,
        unique_answered: 0,
        total_questions,
    };
    for stat in stats.values() {
        overall.total_attempts += u64::from(stat.attempts);
        overall.total_correct += u64::from(stat.correct_count);
        if stat.attempts > 0 {
            overall.unique_answered += 1;
        }
    }
    overall
}

/// Display band for an accuracy, relative to the learner's chosen limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryBand {
    Strong,
    Fair,
    Weak,
    NoData,
}

/// Classify `accuracy` against `green_limit` (in percent). The fair band
/// starts ten points below the limit.
pub fn mastery_band(accuracy: Accuracy, green_limit: u32) -> MasteryBand {
    let Some(percent) = accuracy.percent() else {
        return MasteryBand::NoData;
    };
    if percent >= green_limit {
        MasteryBand::Strong
    } else if percent >= green_limit.saturating_sub(10) {
        MasteryBand::Fair
    } else {
        MasteryBand::Weak
    }
}
