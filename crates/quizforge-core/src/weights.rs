//! Category sampling weights and the weighted category lottery.
//!
//! A higher weight means more questions from that category in mixed exams.
//! Categories without an entry weigh 1.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Weight of a category that has no entry in the table.
pub const DEFAULT_WEIGHT: u32 = 1;

/// Static mapping of category name to a positive sampling weight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryWeights {
    weights: BTreeMap<String, u32>,
}

impl CategoryWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a weight. Zero is clamped to 1 so every category stays drawable.
    pub fn with(mut self, category: impl Into<String>, weight: u32) -> Self {
        self.set(category, weight);
        self
    }

    pub fn set(&mut self, category: impl Into<String>, weight: u32) {
        self.weights.insert(category.into(), weight.max(1));
    }

    /// Weight of `category`, falling back to [`DEFAULT_WEIGHT`].
    pub fn weight(&self, category: &str) -> u32 {
        self.weights
            .get(category)
            .copied()
            .unwrap_or(DEFAULT_WEIGHT)
            .max(1)
    }

    /// Sum of the weights of `categories`.
    pub fn total_for<S: AsRef<str>>(&self, categories: &[S]) -> u64 {
        categories
            .iter()
            .map(|c| u64::from(self.weight(c.as_ref())))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for CategoryWeights {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        let mut weights = CategoryWeights::new();
        for (category, weight) in iter {
            weights.set(category, weight);
        }
        weights
    }
}

/// Weighted lottery over categories.
///
/// Each category holds `weight` tickets. Instead of materializing one entry
/// per ticket we store the running ticket total and binary search it, so a
/// draw is O(log n) in the number of categories.
#[derive(Debug, Clone)]
pub struct LotteryTable {
    categories: Vec<String>,
    cumulative: Vec<u64>,
}

impl LotteryTable {
    /// Build a lottery over `categories`. Duplicates are ignored.
    pub fn new<S: AsRef<str>>(categories: &[S], weights: &CategoryWeights) -> Self {
        let mut names: Vec<String> = Vec::with_capacity(categories.len());
        let mut cumulative = Vec::with_capacity(categories.len());
        let mut total = 0u64;
        for category in categories {
            let category = category.as_ref();
            if names.iter().any(|n| n == category) {
                continue;
            }
            total += u64::from(weights.weight(category));
            names.push(category.to_string());
            cumulative.push(total);
        }
        Self {
            categories: names,
            cumulative,
        }
    }

    /// Total number of tickets.
    pub fn total_tickets(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Draw a category, or `None` if the lottery has no tickets.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        let total = self.total_tickets();
        if total == 0 {
            return None;
        }
        let ticket = rng.gen_range(0..total);
        let idx = self.cumulative.partition_point(|&edge| edge <= ticket);
        self.categories.get(idx).map(String::as_str)
    }

    /// Remove a category (e.g. once it has no questions left).
    pub fn remove(&mut self, category: &str) {
        let Some(pos) = self.categories.iter().position(|c| c == category) else {
            return;
        };
        let removed = self.cumulative[pos] - if pos == 0 { 0 } else { self.cumulative[pos - 1] };
        self.categories.remove(pos);
        self.cumulative.remove(pos);
        for edge in &mut self.cumulative[pos..] {
            *edge -= removed;
        }
    }
}
