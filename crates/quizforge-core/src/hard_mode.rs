//! Hard-mode filtering: keep only questions the learner has not mastered.

use std::collections::HashMap;

use crate::model::{Question, QuestionId};
use crate::statistics::QuestionStat;

/// Accuracy below which a question still counts as hard.
pub const DEFAULT_HARD_THRESHOLD: f64 = 0.60;

/// Whether a question with `stat` is still hard at `threshold`.
///
/// Unattempted questions are always hard.
pub fn is_hard(stat: Option<&QuestionStat>, threshold: f64) -> bool {
    match stat.and_then(QuestionStat::accuracy) {
        Some(accuracy) => accuracy < threshold,
        None => true,
    }
}

/// Keep the questions in `pool` that are unattempted or below `threshold`.
///
/// An empty result means the learner has mastered everything offered, which
/// callers report as [`EmptyPool::Mastered`](crate::error::EmptyPool::Mastered).
pub fn filter_hard(
    pool: &[Question],
    stats: &HashMap<QuestionId, QuestionStat>,
    threshold: f64,
) -> Vec<Question> {
    pool.iter()
        .filter(|q| is_hard(stats.get(&q.id), threshold))
        .cloned()
        .collect()
}
