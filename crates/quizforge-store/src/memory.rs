//! In-memory store.
//!
//! Backs tests and offline use. Questions can be seeded from TOML bank files;
//! attempts live only as long as the store.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

use quizforge_core::error::PersistenceError;
use quizforge_core::model::{AttemptRecord, Question, QuestionReport};
use quizforge_core::parser::{load_bank_directory, validate_bank};
use quizforge_core::traits::{AttemptStore, QuestionFilter, QuestionSource, ReportSink};

/// A store holding questions and attempts in process memory.
pub struct MemoryStore {
    questions: RwLock<Vec<Question>>,
    attempts: Mutex<Vec<AttemptRecord>>,
    reports: Mutex<Vec<QuestionReport>>,
    rng: Mutex<StdRng>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    sample_calls: AtomicU32,
    write_calls: AtomicU32,
}

impl MemoryStore {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions: RwLock::new(questions),
            attempts: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
            rng: Mutex::new(StdRng::from_entropy()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            sample_calls: AtomicU32::new(0),
            write_calls: AtomicU32::new(0),
        }
    }

    /// Make the random samples reproducible.
    pub fn with_seed(self, seed: u64) -> Self {
        *lock(&self.rng) = StdRng::seed_from_u64(seed);
        self
    }

    /// Seed from every `.toml` bank below `dir`.
    ///
    /// Validation problems are logged, not fatal; the sampler drops malformed
    /// questions later anyway.
    pub fn from_bank_dir(dir: &Path) -> Result<Self> {
        let banks = load_bank_directory(dir)?;
        let mut questions = Vec::new();
        for bank in banks {
            for warning in validate_bank(&bank) {
                warn!(bank = %bank.id, question = ?warning.question_id, "{}", warning.message);
            }
            questions.extend(bank.questions);
        }
        debug!(questions = questions.len(), dir = %dir.display(), "loaded question banks");
        Ok(Self::new(questions))
    }

    pub fn add_questions(&self, questions: impl IntoIterator<Item = Question>) {
        self.questions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(questions);
    }

    /// Make every read fail with [`PersistenceError::Unavailable`].
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Make every write fail with [`PersistenceError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Snapshot of every stored attempt.
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        lock(&self.attempts).clone()
    }

    /// Snapshot of every queued report.
    pub fn reports(&self) -> Vec<QuestionReport> {
        lock(&self.reports).clone()
    }

    pub fn question_count(&self) -> usize {
        self.read_questions().len()
    }

    /// Number of random sample calls served.
    pub fn sample_calls(&self) -> u32 {
        self.sample_calls.load(Ordering::Relaxed)
    }

    /// Number of `record_attempts` calls, failed ones included.
    pub fn write_calls(&self) -> u32 {
        self.write_calls.load(Ordering::Relaxed)
    }

    fn read_questions(&self) -> std::sync::RwLockReadGuard<'_, Vec<Question>> {
        self.questions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_reads(&self) -> Result<(), PersistenceError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(PersistenceError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }

    fn pick(&self, candidates: Vec<&Question>, limit: usize) -> Vec<Question> {
        self.sample_calls.fetch_add(1, Ordering::Relaxed);
        let mut rng = lock(&self.rng);
        candidates
            .choose_multiple(&mut *rng, limit)
            .map(|q| (*q).clone())
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl QuestionSource for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_questions(
        &self,
        filter: Option<&QuestionFilter>,
    ) -> Result<Vec<Question>, PersistenceError> {
        self.check_reads()?;
        Ok(self
            .read_questions()
            .iter()
            .filter(|q| filter.map_or(true, |f| f.matches(q)))
            .cloned()
            .collect())
    }

    async fn sample_questions_by_category(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Question>, PersistenceError> {
        self.check_reads()?;
        let questions = self.read_questions();
        let candidates = questions.iter().filter(|q| q.category == category).collect();
        Ok(self.pick(candidates, limit))
    }

    async fn sample_mixed_questions(
        &self,
        limit: usize,
    ) -> Result<Vec<Question>, PersistenceError> {
        self.check_reads()?;
        let questions = self.read_questions();
        Ok(self.pick(questions.iter().collect(), limit))
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn record_attempts(&self, records: &[AttemptRecord]) -> Result<(), PersistenceError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(PersistenceError::Unavailable("writes disabled".into()));
        }
        lock(&self.attempts).extend_from_slice(records);
        Ok(())
    }

    async fn list_attempts(&self, user: &str) -> Result<Vec<AttemptRecord>, PersistenceError> {
        self.check_reads()?;
        Ok(lock(&self.attempts)
            .iter()
            .filter(|r| r.user == user)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportSink for MemoryStore {
    async fn report_question(&self, report: &QuestionReport) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(PersistenceError::Unavailable("writes disabled".into()));
        }
        lock(&self.reports).push(report.clone());
        Ok(())
    }
}
