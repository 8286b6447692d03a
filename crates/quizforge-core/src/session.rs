//! Exam session state machine.
//!
//! A session walks a fixed question sequence. With instant feedback each
//! question goes `Unanswered -> Selected -> Confirmed -> [Overruled]` and is
//! locked once confirmed. With deferred feedback a question is only ever
//! `Unanswered -> Selected` until [`ExamSession::finish`] grades everything
//! in one batch.
//!
//! Transitions never panic. Invalid calls return a [`Rejected`] reason and
//! leave the session untouched; out-of-range navigation is clamped.
//! Sessions are pure: attempt records are handed back to the caller, who
//! owns persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::evaluator::{can_overrule, evaluate};
use crate::model::{AttemptRecord, ExamSettings, Question};

/// Per-question progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionState {
    /// Raw submission, kept verbatim even when overruled.
    pub selected_option: Option<String>,
    pub is_answered: bool,
    pub is_correct: bool,
    pub overruled: bool,
}

impl QuestionState {
    fn has_selection(&self) -> bool {
        self.selected_option
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// Where the session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress { current_index: usize },
    Finished,
}

/// Why a transition was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("the session is finished")]
    Finished,
    #[error("the answer is locked")]
    Locked,
    #[error("nothing selected")]
    NoSelection,
    #[error("not one of the question's options")]
    UnknownOption,
    #[error("only available with instant feedback")]
    DeferredMode,
    #[error("backtracking is disabled")]
    BacktrackingDisabled,
    #[error("already at the first question")]
    AtStart,
    #[error("this answer cannot be overruled")]
    NotOverrulable,
}

/// Result of a confirmed answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub index: usize,
    pub correct: bool,
    /// Present when the session records stats.
    pub record: Option<AttemptRecord>,
}

/// Result of moving forward.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Moved(usize),
    Finished(ExamOutcome),
}

/// Final grading of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamOutcome {
    pub result: ExamResult,
    /// Records to persist. Empty with instant feedback, where each answer
    /// was already emitted on confirm.
    pub records: Vec<AttemptRecord>,
}

/// Score summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamResult {
    pub score: u32,
    pub total: usize,
    pub answered: usize,
    /// Wall-clock seconds, only tracked for timed sessions.
    pub elapsed_secs: Option<i64>,
}

impl ExamResult {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((f64::from(self.score) / self.total as f64) * 100.0).round() as u32
    }
}

/// Overview marker for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Current,
    Unanswered,
    Selected,
    Correct,
    Incorrect,
}

/// One learner working through one exam.
#[derive(Debug, Clone)]
pub struct ExamSession {
    id: Uuid,
    user: String,
    questions: Vec<Question>,
    settings: ExamSettings,
    states: Vec<QuestionState>,
    visited: Vec<bool>,
    current_index: usize,
    score: u32,
    finished: bool,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExamSession {
    pub fn new(user: impl Into<String>, questions: Vec<Question>, settings: ExamSettings) -> Self {
        let len = questions.len();
        let mut visited = vec![false; len];
        if let Some(first) = visited.first_mut() {
            *first = true;
        }
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user: user.into(),
            questions,
            settings,
            states: vec![QuestionState::default(); len],
            visited,
            current_index: 0,
            score: 0,
            finished: len == 0,
            started_at: now,
            finished_at: (len == 0).then_some(now),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn settings(&self) -> &ExamSettings {
        &self.settings
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn status(&self) -> SessionStatus {
        if self.finished {
            SessionStatus::Finished
        } else {
            SessionStatus::InProgress {
                current_index: self.current_index,
            }
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        if self.finished {
            return None;
        }
        self.questions.get(self.current_index)
    }

    pub fn state(&self, index: usize) -> Option<&QuestionState> {
        self.states.get(index)
    }

    pub fn current_state(&self) -> Option<&QuestionState> {
        self.states.get(self.current_index)
    }

    /// Whether feedback (correct answer, explanation) should be shown for
    /// the current question.
    pub fn shows_feedback(&self) -> bool {
        self.settings.instant_feedback && self.current_state().is_some_and(|s| s.is_answered)
    }

    /// Whether the learner may overrule the current question right now.
    pub fn can_overrule(&self) -> bool {
        match (self.current_question(), self.current_state()) {
            (Some(question), Some(state)) => can_overrule(question, state, &self.settings),
            _ => false,
        }
    }

    /// Pick an option (multiple choice) or type an answer (short answer).
    pub fn select(&mut self, option: impl Into<String>) -> Result<(), Rejected> {
        self.ensure_running()?;
        let option = option.into();
        let idx = self.current_index;
        if self.settings.instant_feedback && self.states[idx].is_answered {
            return Err(Rejected::Locked);
        }
        let question = &self.questions[idx];
        if question.is_multiple_choice() && !question.options.contains(&option) {
            return Err(Rejected::UnknownOption);
        }
        self.states[idx].selected_option = Some(option);
        Ok(())
    }

    /// Lock in and grade the current selection (instant feedback only).
    pub fn confirm(&mut self) -> Result<Confirmation, Rejected> {
        self.ensure_running()?;
        if !self.settings.instant_feedback {
            return Err(Rejected::DeferredMode);
        }
        let idx = self.current_index;
        let state = &self.states[idx];
        if state.is_answered {
            return Err(Rejected::Locked);
        }
        if !state.has_selection() {
            return Err(Rejected::NoSelection);
        }
        let question = &self.questions[idx];
        let submitted = state.selected_option.as_deref().unwrap_or_default();
        let correct = evaluate(question, submitted, state.overruled);
        let record = self
            .settings
            .record_stats
            .then(|| AttemptRecord::new(&self.user, question, correct));

        let state = &mut self.states[idx];
        state.is_answered = true;
        state.is_correct = correct;
        if correct {
            self.score += 1;
        }
        Ok(Confirmation {
            index: idx,
            correct,
            record,
        })
    }

    /// Contest a failed short answer; the scored outcome becomes correct.
    ///
    /// The raw submission is kept. A second call is rejected and changes
    /// nothing.
    pub fn overrule(&mut self) -> Result<(), Rejected> {
        self.ensure_running()?;
        if !self.can_overrule() {
            return Err(Rejected::NotOverrulable);
        }
        let state = &mut self.states[self.current_index];
        state.overruled = true;
        state.is_correct = true;
        self.score += 1;
        Ok(())
    }

    /// Move to the next question, finishing after the last one.
    pub fn advance(&mut self) -> Result<Advance, Rejected> {
        self.ensure_running()?;
        if self.current_index + 1 >= self.questions.len() {
            return self.finish().map(Advance::Finished);
        }
        self.move_to(self.current_index + 1);
        Ok(Advance::Moved(self.current_index))
    }

    /// Move to the previous question.
    pub fn retreat(&mut self) -> Result<(), Rejected> {
        self.ensure_running()?;
        if !self.settings.allow_backtracking {
            return Err(Rejected::BacktrackingDisabled);
        }
        if self.current_index == 0 {
            return Err(Rejected::AtStart);
        }
        self.move_to(self.current_index - 1);
        Ok(())
    }

    /// Jump to `index`, clamped to the last question.
    ///
    /// Without backtracking only forward jumps and jumps to already visited
    /// questions are allowed.
    pub fn jump_to(&mut self, index: usize) -> Result<usize, Rejected> {
        self.ensure_running()?;
        let target = index.min(self.questions.len() - 1);
        let allowed = self.settings.allow_backtracking
            || target >= self.current_index
            || self.visited[target];
        if !allowed {
            return Err(Rejected::BacktrackingDisabled);
        }
        self.move_to(target);
        Ok(target)
    }

    /// End the session.
    ///
    /// With deferred feedback this grades every selection (honoring recorded
    /// overrules) and returns one record per answered question when stats
    /// are recorded. With instant feedback the running score stands.
    pub fn finish(&mut self) -> Result<ExamOutcome, Rejected> {
        self.ensure_running()?;
        let mut records = Vec::new();
        if !self.settings.instant_feedback {
            let mut score = 0;
            for (question, state) in self.questions.iter().zip(self.states.iter_mut()) {
                if !state.has_selection() {
                    continue;
                }
                let submitted = state.selected_option.as_deref().unwrap_or_default();
                let correct = evaluate(question, submitted, state.overruled);
                state.is_answered = true;
                state.is_correct = correct;
                if correct {
                    score += 1;
                }
                if self.settings.record_stats {
                    records.push(AttemptRecord::new(&self.user, question, correct));
                }
            }
            self.score = score;
        }
        self.finished = true;
        self.finished_at = Some(Utc::now());
        Ok(ExamOutcome {
            result: self.result(),
            records,
        })
    }

    /// Current score summary. Before `finish` in deferred mode the score is 0.
    pub fn result(&self) -> ExamResult {
        let elapsed_secs = self.settings.timed.then(|| {
            let end = self.finished_at.unwrap_or_else(Utc::now);
            (end - self.started_at).num_seconds()
        });
        ExamResult {
            score: self.score,
            total: self.questions.len(),
            answered: self.states.iter().filter(|s| s.is_answered).count(),
            elapsed_secs,
        }
    }

    /// One marker per question, for an exam overview grid.
    pub fn overview(&self) -> Vec<QuestionStatus> {
        self.states
            .iter()
            .enumerate()
            .map(|(idx, state)| {
                if !self.finished && idx == self.current_index {
                    QuestionStatus::Current
                } else if state.is_answered {
                    if state.is_correct {
                        QuestionStatus::Correct
                    } else {
                        QuestionStatus::Incorrect
                    }
                } else if state.has_selection() {
                    QuestionStatus::Selected
                } else {
                    QuestionStatus::Unanswered
                }
            })
            .collect()
    }

    fn ensure_running(&self) -> Result<(), Rejected> {
        if self.finished {
            Err(Rejected::Finished)
        } else {
            Ok(())
        }
    }

    fn move_to(&mut self, index: usize) {
        self.current_index = index;
        self.visited[index] = true;
    }
}
