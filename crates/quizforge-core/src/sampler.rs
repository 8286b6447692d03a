//! Weighted, stratified question sampling.
//!
//! Two modes:
//! - **Category**: `target_count` distinct questions from one category.
//! - **Mixed**: one question per category first (when the target allows it),
//!   then categories are drawn from a weighted lottery until the target is
//!   met, then any shortfall is backfilled from the rest of the pool.
//!
//! The final sequence is always shuffled so draw order never leaks into the
//! exam.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::model::{Question, QuestionId};
use crate::weights::{CategoryWeights, LotteryTable};

/// What to draw and how many.
#[derive(Debug, Clone, Default)]
pub struct SamplePlan {
    /// Restrict sampling to this category.
    pub category: Option<String>,
    /// Categories taking part in a mixed draw. Empty means "every category
    /// present in the pool".
    pub categories: Vec<String>,
    /// Number of questions wanted. Zero means no cap.
    pub target_count: usize,
    /// Questions that must not be drawn.
    pub exclude_ids: HashSet<QuestionId>,
}

impl SamplePlan {
    /// Single-category plan.
    pub fn category(category: impl Into<String>, target_count: usize) -> Self {
        Self {
            category: Some(category.into()),
            target_count,
            ..Self::default()
        }
    }

    /// Mixed plan across `categories`.
    pub fn mixed(categories: Vec<String>, target_count: usize) -> Self {
        Self {
            categories,
            target_count,
            ..Self::default()
        }
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = QuestionId>) -> Self {
        self.exclude_ids.extend(ids);
        self
    }
}

/// Draw questions from `pool` according to `plan`.
///
/// Malformed questions and duplicate ids are dropped before drawing. Returns
/// an empty vector when nothing qualifies.
pub fn sample<R: Rng + ?Sized>(
    pool: &[Question],
    plan: &SamplePlan,
    weights: &CategoryWeights,
    rng: &mut R,
) -> Vec<Question> {
    let eligible = eligible_questions(pool, &plan.exclude_ids);

    let mut picked = match &plan.category {
        Some(category) => sample_category(&eligible, category, plan.target_count, rng),
        None => sample_mixed(&eligible, plan, weights, rng),
    };

    picked.shuffle(rng);
    debug!(
        pool = pool.len(),
        eligible = eligible.len(),
        picked = picked.len(),
        target = plan.target_count,
        "sampled questions"
    );
    picked.into_iter().cloned().collect()
}

/// Drop excluded, duplicate and malformed questions.
fn eligible_questions<'a>(
    pool: &'a [Question],
    exclude_ids: &HashSet<QuestionId>,
) -> Vec<&'a Question> {
    let mut seen = HashSet::new();
    let mut eligible = Vec::with_capacity(pool.len());
    for question in pool {
        if exclude_ids.contains(&question.id) || !seen.insert(question.id) {
            continue;
        }
        if let Err(violation) = question.validate() {
            warn!(id = question.id, %violation, "excluding malformed question from sampling");
            continue;
        }
        eligible.push(question);
    }
    eligible
}

fn sample_category<'a, R: Rng + ?Sized>(
    eligible: &[&'a Question],
    category: &str,
    target_count: usize,
    rng: &mut R,
) -> Vec<&'a Question> {
    let mut candidates: Vec<&Question> = eligible
        .iter()
        .copied()
        .filter(|q| q.category == category)
        .collect();
    candidates.shuffle(rng);
    if target_count > 0 {
        candidates.truncate(target_count);
    }
    candidates
}

fn sample_mixed<'a, R: Rng + ?Sized>(
    eligible: &[&'a Question],
    plan: &SamplePlan,
    weights: &CategoryWeights,
    rng: &mut R,
) -> Vec<&'a Question> {
    let categories: Vec<String> = if plan.categories.is_empty() {
        let mut found: Vec<String> = eligible.iter().map(|q| q.category.clone()).collect();
        found.sort();
        found.dedup();
        found
    } else {
        plan.categories.clone()
    };

    let target = if plan.target_count == 0 {
        eligible.len()
    } else {
        plan.target_count.min(eligible.len())
    };

    // One shuffled bucket of pool indices per category; popping gives a random pick.
    let mut buckets: Vec<(String, Vec<usize>)> = Vec::with_capacity(categories.len());
    for category in &categories {
        if buckets.iter().any(|(name, _)| name == category) {
            continue;
        }
        let mut indices: Vec<usize> = eligible
            .iter()
            .enumerate()
            .filter(|(_, q)| &q.category == category)
            .map(|(i, _)| i)
            .collect();
        indices.shuffle(rng);
        buckets.push((category.clone(), indices));
    }

    let mut selected: Vec<usize> = Vec::with_capacity(target);

    // Baseline coverage: every category with questions shows up at least once.
    // The gate uses the requested count, not the pool-clamped target.
    let covers_all = plan.target_count == 0 || plan.target_count >= buckets.len();
    if covers_all {
        for (_, indices) in buckets.iter_mut() {
            if let Some(idx) = indices.pop() {
                selected.push(idx);
            }
        }
    }

    let live: Vec<&str> = buckets
        .iter()
        .filter(|(_, indices)| !indices.is_empty())
        .map(|(name, _)| name.as_str())
        .collect();
    let mut lottery = LotteryTable::new(&live, weights);

    while selected.len() < target {
        let Some(category) = lottery.draw(rng).map(str::to_string) else {
            break;
        };
        let Some((_, indices)) = buckets.iter_mut().find(|(name, _)| *name == category) else {
            lottery.remove(&category);
            continue;
        };
        if let Some(idx) = indices.pop() {
            selected.push(idx);
        }
        if indices.is_empty() {
            lottery.remove(&category);
        }
    }

    if selected.len() < target {
        backfill(&mut selected, eligible.len(), target, rng);
    }

    selected.into_iter().map(|i| eligible[i]).collect()
}

/// Top up `selected` with random unselected pool indices until `target`.
fn backfill<R: Rng + ?Sized>(
    selected: &mut Vec<usize>,
    pool_len: usize,
    target: usize,
    rng: &mut R,
) {
    let taken: HashSet<usize> = selected.iter().copied().collect();
    let mut rest: Vec<usize> = (0..pool_len).filter(|i| !taken.contains(i)).collect();
    rest.shuffle(rng);
    let missing = target.saturating_sub(selected.len());
    debug!(missing, available = rest.len(), "backfilling sample");
    selected.extend(rest.into_iter().take(missing));
}
