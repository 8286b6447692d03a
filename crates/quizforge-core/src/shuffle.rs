//! Per-question option shuffling.

use rand::Rng;

use crate::model::Question;

/// Permute the options of a multiple choice question in place.
///
/// Short answer questions are left alone. Grading compares option values,
/// so the new order never changes correctness.
pub fn shuffle_options<R: Rng + ?Sized>(question: &mut Question, rng: &mut R) {
    if !question.is_multiple_choice() {
        return;
    }
    let options = &mut question.options;
    for i in (1..options.len()).rev() {
        let j = rng.gen_range(0..=i);
        options.swap(i, j);
    }
}

/// Shuffle the options of every question in an exam.
pub fn shuffle_all<R: Rng + ?Sized>(questions: &mut [Question], rng: &mut R) {
    for question in questions {
        shuffle_options(question, rng);
    }
}
