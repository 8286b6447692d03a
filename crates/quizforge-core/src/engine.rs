//! Exam engine orchestrator.
//!
//! Fetches candidates from the backend, runs them through the sampler and
//! the hard-mode filter, shuffles options, and hands the result to an
//! [`ExamSession`]. [`ExamRun`] pairs a session with the backend so answers
//! are persisted as they are graded.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{EmptyPool, ExamError, PersistenceError, ReportError};
use crate::hard_mode::{filter_hard, DEFAULT_HARD_THRESHOLD};
use crate::model::{AttemptRecord, ExamSettings, Question, QuestionId, QuestionReport};
use crate::sampler::{sample, SamplePlan};
use crate::session::{Advance, Confirmation, ExamOutcome, ExamSession, Rejected};
use crate::shuffle::shuffle_all;
use crate::statistics::{
    category_stats, fold, mastery_band, overall_stats, CategoryStat, MasteryBand, OverallStats,
    QuestionStat,
};
use crate::traits::{AttemptStore, QuestionFilter, QuestionSource, QuizBackend, ReportSink};
use crate::weights::CategoryWeights;

/// How mixed exams get their candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingStrategy {
    /// Fetch the whole pool and sample locally.
    #[default]
    Local,
    /// Ask the backend for per-category random samples.
    Delegated,
}

/// Configuration for the exam engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamEngineConfig {
    /// Accuracy below which a question counts as hard.
    pub hard_threshold: f64,
    /// Question count for mixed exams requested without a limit.
    pub marathon_cap: usize,
    pub quick_exam_size: usize,
    pub standard_exam_size: usize,
    pub hard_exam_size: usize,
    pub sampling: SamplingStrategy,
    /// Percent accuracy shown as mastered.
    pub mastery_green_limit: u32,
}

impl Default for ExamEngineConfig {
    fn default() -> Self {
        Self {
            hard_threshold: DEFAULT_HARD_THRESHOLD,
            marathon_cap: 100,
            quick_exam_size: 10,
            standard_exam_size: 40,
            hard_exam_size: 50,
            sampling: SamplingStrategy::Local,
            mastery_green_limit: 70,
        }
    }
}

/// What kind of exam to build.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamRequest {
    pub settings: ExamSettings,
    /// Number of questions. Zero means all of a category, or the marathon
    /// cap for mixed exams.
    pub limit: usize,
    /// Keep only questions the learner has not mastered.
    pub hard_mode: bool,
}

impl ExamRequest {
    pub fn new(settings: ExamSettings, limit: usize) -> Self {
        Self {
            settings,
            limit,
            hard_mode: false,
        }
    }

    pub fn hard(mut self) -> Self {
        self.hard_mode = true;
        self
    }
}

/// A user's accuracy overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub overall: OverallStats,
    pub categories: BTreeMap<String, CategoryStat>,
    pub bands: BTreeMap<String, MasteryBand>,
}

/// The exam engine.
pub struct ExamEngine {
    backend: Arc<dyn QuizBackend>,
    weights: CategoryWeights,
    config: ExamEngineConfig,
}

impl ExamEngine {
    pub fn new(
        backend: Arc<dyn QuizBackend>,
        weights: CategoryWeights,
        config: ExamEngineConfig,
    ) -> Self {
        Self {
            backend,
            weights,
            config,
        }
    }

    pub fn config(&self) -> &ExamEngineConfig {
        &self.config
    }

    pub fn weights(&self) -> &CategoryWeights {
        &self.weights
    }

    /// Short mixed exam with instant feedback and backtracking.
    pub fn quick_exam(&self) -> ExamRequest {
        ExamRequest::new(ExamSettings::default(), self.config.quick_exam_size)
    }

    pub fn standard_exam(&self) -> ExamRequest {
        ExamRequest::new(ExamSettings::default(), self.config.standard_exam_size)
    }

    pub fn marathon_exam(&self) -> ExamRequest {
        ExamRequest::new(ExamSettings::default(), self.config.marathon_cap)
    }

    /// Instant-feedback drill on one category.
    pub fn category_drill(&self, category: impl Into<String>) -> ExamRequest {
        ExamRequest::new(
            ExamSettings::for_category(category),
            self.config.standard_exam_size,
        )
    }

    /// Hard-mode exam, mixed or restricted to `category`.
    pub fn hard_training(&self, category: Option<String>) -> ExamRequest {
        let settings = ExamSettings {
            category,
            ..ExamSettings::default()
        };
        ExamRequest::new(settings, self.config.hard_exam_size).hard()
    }

    /// Fold the user's attempt history into per-question stats.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn load_stats(
        &self,
        user: &str,
    ) -> Result<HashMap<QuestionId, QuestionStat>, PersistenceError> {
        let attempts = self.backend.list_attempts(user).await?;
        debug!(attempts = attempts.len(), "loaded attempt history");
        Ok(fold(&attempts))
    }

    /// Build the question sequence for `request`.
    ///
    /// `stats` is only consulted in hard mode.
    #[instrument(
        skip(self, request, stats, rng),
        fields(
            category = request.settings.category.as_deref().unwrap_or("mixed"),
            limit = request.limit,
            hard = request.hard_mode,
        )
    )]
    pub async fn prepare_questions<R: Rng + ?Sized>(
        &self,
        request: &ExamRequest,
        stats: &HashMap<QuestionId, QuestionStat>,
        rng: &mut R,
    ) -> Result<Vec<Question>, ExamError> {
        let mut questions = match &request.settings.category {
            Some(category) => {
                let candidates = if request.limit > 0 {
                    self.backend
                        .sample_questions_by_category(category, request.limit)
                        .await?
                } else {
                    let filter = QuestionFilter::category(category.as_str());
                    self.backend.list_questions(Some(&filter)).await?
                };
                let plan = SamplePlan::category(category.as_str(), request.limit);
                sample(&candidates, &plan, &self.weights, rng)
            }
            None => {
                let limit = if request.limit == 0 {
                    self.config.marathon_cap
                } else {
                    request.limit
                };
                let (candidates, categories) = match self.config.sampling {
                    SamplingStrategy::Local => (self.backend.list_questions(None).await?, vec![]),
                    SamplingStrategy::Delegated => self.fetch_delegated(limit).await?,
                };
                let plan = SamplePlan::mixed(categories, limit);
                sample(&candidates, &plan, &self.weights, rng)
            }
        };

        if questions.is_empty() {
            info!("no questions match the request");
            return Err(EmptyPool::NoMatchingQuestions.into());
        }

        if request.hard_mode {
            let before = questions.len();
            questions = filter_hard(&questions, stats, self.config.hard_threshold);
            debug!(before, after = questions.len(), "applied hard-mode filter");
            if questions.is_empty() {
                info!("every sampled question is mastered");
                return Err(EmptyPool::Mastered.into());
            }
        }

        shuffle_all(&mut questions, rng);
        Ok(questions)
    }

    /// Per-category quotas fetched concurrently, topped up with a mixed
    /// sample when the quotas come back short.
    ///
    /// Every category in the repository gets a quota, weighted ones by their
    /// table entry and the rest at weight 1.
    async fn fetch_delegated(
        &self,
        limit: usize,
    ) -> Result<(Vec<Question>, Vec<String>), PersistenceError> {
        let categories = self.backend.list_categories().await?;
        let total = self.weights.total_for(&categories);

        let mut candidates: Vec<Question> = Vec::new();
        let mut last_error = None;

        if total > 0 {
            let fetches = categories.iter().map(|category| {
                let weight = u64::from(self.weights.weight(category));
                let quota = ((weight * limit as u64) / total).max(1) as usize;
                self.backend.sample_questions_by_category(category, quota)
            });
            for (category, result) in categories.iter().zip(join_all(fetches).await) {
                match result {
                    Ok(mut batch) => candidates.append(&mut batch),
                    Err(e) => {
                        warn!(%category, error = %e, "category sample failed");
                        last_error = Some(e);
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        candidates.retain(|q| seen.insert(q.id));

        if candidates.len() < limit {
            let missing = limit - candidates.len();
            match self.backend.sample_mixed_questions(missing).await {
                Ok(extra) => {
                    debug!(missing, fetched = extra.len(), "backfilled mixed sample");
                    candidates.extend(extra.into_iter().filter(|q| seen.insert(q.id)));
                }
                Err(e) => {
                    warn!(error = %e, "mixed backfill failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if candidates.is_empty() => Err(e),
            _ => Ok((candidates, categories)),
        }
    }

    /// Prepare questions and open a session for `user`.
    pub async fn start<R: Rng + ?Sized>(
        &self,
        user: &str,
        request: &ExamRequest,
        rng: &mut R,
    ) -> Result<ExamRun, ExamError> {
        let stats = if request.hard_mode {
            self.load_stats(user).await?
        } else {
            HashMap::new()
        };
        let questions = self.prepare_questions(request, &stats, rng).await?;
        let session = ExamSession::new(user, questions, request.settings.clone());
        info!(session = %session.id(), questions = session.len(), "exam started");
        Ok(ExamRun {
            session,
            backend: Arc::clone(&self.backend),
        })
    }

    /// Accuracy overview for `user` across the whole repository.
    pub async fn progress(&self, user: &str) -> Result<ProgressReport, PersistenceError> {
        let questions = self.backend.list_questions(None).await?;
        let stats = self.load_stats(user).await?;
        let categories = category_stats(&questions, &stats);
        let bands = categories
            .iter()
            .map(|(name, stat)| {
                (
                    name.clone(),
                    mastery_band(stat.accuracy(), self.config.mastery_green_limit),
                )
            })
            .collect();
        Ok(ProgressReport {
            overall: overall_stats(&stats, questions.len()),
            categories,
            bands,
        })
    }
}

/// Outcome of a transition plus any failure to persist its records.
///
/// A warning never undoes the in-memory outcome.
#[derive(Debug)]
pub struct Persisted<T> {
    pub value: T,
    pub warning: Option<PersistenceError>,
}

/// A live session bound to the backend that stores its attempts.
pub struct ExamRun {
    session: ExamSession,
    backend: Arc<dyn QuizBackend>,
}

impl ExamRun {
    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    pub fn select(&mut self, option: impl Into<String>) -> Result<(), Rejected> {
        self.session.select(option)
    }

    pub fn overrule(&mut self) -> Result<(), Rejected> {
        self.session.overrule()
    }

    pub fn retreat(&mut self) -> Result<(), Rejected> {
        self.session.retreat()
    }

    pub fn jump_to(&mut self, index: usize) -> Result<usize, Rejected> {
        self.session.jump_to(index)
    }

    pub async fn confirm(&mut self) -> Result<Persisted<Confirmation>, Rejected> {
        let confirmation = self.session.confirm()?;
        let warning = match &confirmation.record {
            Some(record) => self.persist(std::slice::from_ref(record)).await,
            None => None,
        };
        Ok(Persisted {
            value: confirmation,
            warning,
        })
    }

    pub async fn advance(&mut self) -> Result<Persisted<Advance>, Rejected> {
        let advance = self.session.advance()?;
        let warning = match &advance {
            Advance::Finished(outcome) => self.persist(&outcome.records).await,
            Advance::Moved(_) => None,
        };
        Ok(Persisted {
            value: advance,
            warning,
        })
    }

    pub async fn finish(&mut self) -> Result<Persisted<ExamOutcome>, Rejected> {
        let outcome = self.session.finish()?;
        let warning = self.persist(&outcome.records).await;
        Ok(Persisted {
            value: outcome,
            warning,
        })
    }

    /// Flag the current question for review.
    #[instrument(skip(self, reason), fields(session = %self.session.id()))]
    pub async fn report(&self, reason: &str) -> Result<QuestionReport, ReportError> {
        let question = self
            .session
            .current_question()
            .ok_or(ReportError::NoQuestion)?;
        let report = QuestionReport::new(question.id, reason)?;
        self.backend.report_question(&report).await?;
        info!(question = report.question_id, "question reported");
        Ok(report)
    }

    async fn persist(&self, records: &[AttemptRecord]) -> Option<PersistenceError> {
        if records.is_empty() {
            return None;
        }
        match self.backend.record_attempts(records).await {
            Ok(()) => {
                debug!(count = records.len(), "recorded attempts");
                None
            }
            Err(e) => {
                warn!(
                    session = %self.session.id(),
                    count = records.len(),
                    transient = e.is_transient(),
                    error = %e,
                    "failed to record attempts, keeping local result"
                );
                Some(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionType;
    use crate::traits::{AttemptStore, QuestionSource, ReportSink};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        questions: Vec<Question>,
        attempts: Mutex<Vec<AttemptRecord>>,
        reports: Mutex<Vec<QuestionReport>>,
        fail_writes: AtomicBool,
        category_calls: AtomicUsize,
        mixed_calls: AtomicUsize,
    }

    #[async_trait]
    impl QuestionSource for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        async fn list_questions(
            &self,
            filter: Option<&QuestionFilter>,
        ) -> Result<Vec<Question>, PersistenceError> {
            Ok(self
                .questions
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
            self.category_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .questions
                .iter()
                .filter(|q| q.category == category)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn sample_mixed_questions(
            &self,
            limit: usize,
        ) -> Result<Vec<Question>, PersistenceError> {
            self.mixed_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.questions.iter().rev().take(limit).cloned().collect())
        }
    }

    #[async_trait]
    impl AttemptStore for FakeBackend {
        async fn record_attempts(&self, records: &[AttemptRecord]) -> Result<(), PersistenceError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PersistenceError::Network("connection reset".into()));
            }
            self.attempts.lock().unwrap().extend_from_slice(records);
            Ok(())
        }

        async fn list_attempts(&self, user: &str) -> Result<Vec<AttemptRecord>, PersistenceError> {
            Ok(self
                .attempts
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user == user)
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl ReportSink for FakeBackend {
        async fn report_question(&self, report: &QuestionReport) -> Result<(), PersistenceError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PersistenceError::Network("connection reset".into()));
            }
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        }
    }

    fn q(id: QuestionId, category: &str) -> Question {
        Question {
            id,
            text: format!("question {id}"),
            kind: QuestionType::MultipleChoice,
            options: vec!["rätt".into(), "fel".into(), "kanske".into()],
            correct_answer: "rätt".into(),
            explanation: String::new(),
            category: category.into(),
        }
    }

    fn backend() -> Arc<FakeBackend> {
        let mut questions = Vec::new();
        for id in 1..=10 {
            questions.push(q(id, "Urologi"));
        }
        for id in 11..=40 {
            questions.push(q(id, "Kirurgi"));
        }
        Arc::new(FakeBackend {
            questions,
            ..FakeBackend::default()
        })
    }

    fn engine(backend: Arc<FakeBackend>, config: ExamEngineConfig) -> ExamEngine {
        let weights = CategoryWeights::new().with("Kirurgi", 10).with("Urologi", 6);
        ExamEngine::new(backend, weights, config)
    }

    #[tokio::test]
    async fn category_exam_respects_limit() {
        let engine = engine(backend(), ExamEngineConfig::default());
        let request = ExamRequest::new(ExamSettings::for_category("Urologi"), 5);
        let mut rng = StdRng::seed_from_u64(1);
        let questions = engine
            .prepare_questions(&request, &HashMap::new(), &mut rng)
            .await
            .unwrap();
        assert_eq!(questions.len(), 5);
        assert!(questions.iter().all(|q| q.category == "Urologi"));
    }

    #[tokio::test]
    async fn category_without_limit_returns_everything() {
        let engine = engine(backend(), ExamEngineConfig::default());
        let request = ExamRequest::new(ExamSettings::for_category("Urologi"), 0);
        let mut rng = StdRng::seed_from_u64(2);
        let questions = engine
            .prepare_questions(&request, &HashMap::new(), &mut rng)
            .await
            .unwrap();
        assert_eq!(questions.len(), 10);
    }

    #[tokio::test]
    async fn unknown_category_is_empty_pool() {
        let engine = engine(backend(), ExamEngineConfig::default());
        let request = ExamRequest::new(ExamSettings::for_category("Onkologi"), 10);
        let mut rng = StdRng::seed_from_u64(3);
        let err = engine
            .prepare_questions(&request, &HashMap::new(), &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExamError::EmptyPool(EmptyPool::NoMatchingQuestions)
        ));
    }

    #[tokio::test]
    async fn mixed_without_limit_uses_marathon_cap() {
        let config = ExamEngineConfig {
            marathon_cap: 25,
            ..ExamEngineConfig::default()
        };
        let engine = engine(backend(), config);
        let request = ExamRequest::new(ExamSettings::default(), 0);
        let mut rng = StdRng::seed_from_u64(4);
        let questions = engine
            .prepare_questions(&request, &HashMap::new(), &mut rng)
            .await
            .unwrap();
        assert_eq!(questions.len(), 25);
        let ids: HashSet<_> = questions.iter().map(|q| q.id).collect();
        assert_eq!(ids.len(), 25);
    }

    #[tokio::test]
    async fn delegated_sampling_uses_category_quotas() {
        let fake = backend();
        let config = ExamEngineConfig {
            sampling: SamplingStrategy::Delegated,
            ..ExamEngineConfig::default()
        };
        let engine = engine(Arc::clone(&fake), config);
        let request = ExamRequest::new(ExamSettings::default(), 16);
        let mut rng = StdRng::seed_from_u64(5);
        let questions = engine
            .prepare_questions(&request, &HashMap::new(), &mut rng)
            .await
            .unwrap();
        // Quotas 10 and 6 fill the request without a mixed backfill.
        assert_eq!(questions.len(), 16);
        assert_eq!(fake.category_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fake.mixed_calls.load(Ordering::SeqCst), 0);
        let urologi = questions.iter().filter(|q| q.category == "Urologi").count();
        assert!(urologi >= 1);
    }

    #[tokio::test]
    async fn delegated_sampling_backfills_short_quotas() {
        let fake = backend();
        let config = ExamEngineConfig {
            sampling: SamplingStrategy::Delegated,
            ..ExamEngineConfig::default()
        };
        let engine = engine(Arc::clone(&fake), config);
        // Quotas are 21 and 12, but Urologi only has 10 questions. The
        // mixed top-up walks the pool from the end, past the Kirurgi quota.
        let request = ExamRequest::new(ExamSettings::default(), 34);
        let mut rng = StdRng::seed_from_u64(6);
        let questions = engine
            .prepare_questions(&request, &HashMap::new(), &mut rng)
            .await
            .unwrap();
        assert_eq!(fake.mixed_calls.load(Ordering::SeqCst), 1);
        assert_eq!(questions.len(), 34);
    }

    #[tokio::test]
    async fn delegated_sampling_covers_unweighted_categories() {
        let fake = backend();
        let config = ExamEngineConfig {
            sampling: SamplingStrategy::Delegated,
            ..ExamEngineConfig::default()
        };
        let weights = CategoryWeights::new().with("Kirurgi", 10);
        let engine = ExamEngine::new(Arc::clone(&fake) as Arc<dyn QuizBackend>, weights, config);
        let request = ExamRequest::new(ExamSettings::default(), 5);

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let questions = engine
                .prepare_questions(&request, &HashMap::new(), &mut rng)
                .await
                .unwrap();
            assert_eq!(questions.len(), 5);
            assert!(
                questions.iter().any(|q| q.category == "Urologi"),
                "seed {seed}: Urologi missing"
            );
        }
        assert_eq!(fake.category_calls.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn hard_mode_reports_mastered() {
        let fake = backend();
        let engine = engine(Arc::clone(&fake), ExamEngineConfig::default());
        let stats: HashMap<_, _> = fake
            .questions
            .iter()
            .map(|q| {
                (
                    q.id,
                    QuestionStat {
                        question_id: q.id,
                        attempts: 4,
                        correct_count: 4,
                    },
                )
            })
            .collect();
        let request = ExamRequest::new(ExamSettings::default(), 10).hard();
        let mut rng = StdRng::seed_from_u64(7);
        let err = engine
            .prepare_questions(&request, &stats, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, ExamError::EmptyPool(EmptyPool::Mastered)));
    }

    #[tokio::test]
    async fn hard_mode_keeps_weak_questions() {
        let fake = backend();
        let engine = engine(Arc::clone(&fake), ExamEngineConfig::default());
        let mut stats: HashMap<_, _> = fake
            .questions
            .iter()
            .map(|q| {
                (
                    q.id,
                    QuestionStat {
                        question_id: q.id,
                        attempts: 10,
                        correct_count: 9,
                    },
                )
            })
            .collect();
        stats.insert(
            3,
            QuestionStat {
                question_id: 3,
                attempts: 3,
                correct_count: 1,
            },
        );
        let request = ExamRequest::new(ExamSettings::default(), 0).hard();
        let mut rng = StdRng::seed_from_u64(8);
        let questions = engine
            .prepare_questions(&request, &stats, &mut rng)
            .await
            .unwrap();
        assert_eq!(questions.iter().map(|q| q.id).collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn run_persists_confirmed_answers() {
        let fake = backend();
        let engine = engine(Arc::clone(&fake), ExamEngineConfig::default());
        let request = ExamRequest::new(ExamSettings::for_category("Urologi"), 2);
        let mut rng = StdRng::seed_from_u64(9);
        let mut run = engine.start("anna", &request, &mut rng).await.unwrap();

        run.select("rätt").unwrap();
        let confirmed = run.confirm().await.unwrap();
        assert!(confirmed.value.correct);
        assert!(confirmed.warning.is_none());
        assert_eq!(fake.attempts.lock().unwrap().len(), 1);

        let stats = engine.load_stats("anna").await.unwrap();
        assert_eq!(stats.len(), 1);
    }

    #[tokio::test]
    async fn write_failure_is_a_warning() {
        let fake = backend();
        fake.fail_writes.store(true, Ordering::SeqCst);
        let engine = engine(Arc::clone(&fake), ExamEngineConfig::default());
        let request = ExamRequest::new(ExamSettings::for_category("Kirurgi"), 1);
        let mut rng = StdRng::seed_from_u64(10);
        let mut run = engine.start("anna", &request, &mut rng).await.unwrap();

        run.select("rätt").unwrap();
        let confirmed = run.confirm().await.unwrap();
        assert!(confirmed.value.correct);
        assert!(matches!(
            confirmed.warning,
            Some(PersistenceError::Network(_))
        ));
        assert_eq!(run.session().score(), 1);
    }

    #[tokio::test]
    async fn deferred_run_writes_one_batch_on_finish() {
        let fake = backend();
        let engine = engine(Arc::clone(&fake), ExamEngineConfig::default());
        let settings = ExamSettings {
            category: Some("Urologi".into()),
            instant_feedback: false,
            ..ExamSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(11);
        let mut run = engine
            .start("anna", &ExamRequest::new(settings, 3), &mut rng)
            .await
            .unwrap();

        run.select("rätt").unwrap();
        run.advance().await.unwrap();
        run.select("fel").unwrap();
        run.advance().await.unwrap();
        assert!(fake.attempts.lock().unwrap().is_empty());

        let finished = run.advance().await.unwrap();
        let Advance::Finished(outcome) = finished.value else {
            panic!("expected the last advance to finish");
        };
        assert_eq!(outcome.result.score, 1);
        assert_eq!(fake.attempts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn navigation_and_finish_go_through_the_run() {
        let fake = backend();
        let engine = engine(Arc::clone(&fake), ExamEngineConfig::default());
        let settings = ExamSettings {
            category: Some("Kirurgi".into()),
            instant_feedback: false,
            ..ExamSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(12);
        let mut run = engine
            .start("anna", &ExamRequest::new(settings, 4), &mut rng)
            .await
            .unwrap();

        assert_eq!(run.jump_to(3).unwrap(), 3);
        run.select("rätt").unwrap();
        run.retreat().unwrap();
        assert_eq!(run.session().current_index(), 2);
        run.select("fel").unwrap();
        assert_eq!(run.jump_to(10).unwrap(), 3);
        assert!(fake.attempts.lock().unwrap().is_empty());

        let Advance::Finished(outcome) = run.advance().await.unwrap().value else {
            panic!("advancing past the last question finishes");
        };
        assert_eq!(outcome.result.score, 1);
        assert_eq!(outcome.result.answered, 2);
        assert_eq!(fake.attempts.lock().unwrap().len(), 2);
        assert_eq!(run.select("rätt"), Err(Rejected::Finished));
    }

    #[tokio::test]
    async fn report_flags_the_current_question() {
        let fake = backend();
        let engine = engine(Arc::clone(&fake), ExamEngineConfig::default());
        let request = ExamRequest::new(ExamSettings::for_category("Urologi"), 1);
        let mut rng = StdRng::seed_from_u64(13);
        let mut run = engine.start("anna", &request, &mut rng).await.unwrap();
        let current = run.session().current_question().unwrap().id;

        assert!(matches!(
            run.report("   ").await,
            Err(ReportError::BlankReason)
        ));
        assert!(fake.reports.lock().unwrap().is_empty());

        let report = run.report("Två rätta svar").await.unwrap();
        assert_eq!(report.question_id, current);
        assert_eq!(fake.reports.lock().unwrap().as_slice(), &[report]);

        run.finish().await.unwrap();
        assert!(matches!(
            run.report("för sent").await,
            Err(ReportError::NoQuestion)
        ));
    }

    #[tokio::test]
    async fn report_failure_is_an_error() {
        let fake = backend();
        fake.fail_writes.store(true, Ordering::SeqCst);
        let engine = engine(Arc::clone(&fake), ExamEngineConfig::default());
        let request = ExamRequest::new(ExamSettings::for_category("Urologi"), 1);
        let mut rng = StdRng::seed_from_u64(14);
        let run = engine.start("anna", &request, &mut rng).await.unwrap();

        assert!(matches!(
            run.report("Oklar fråga").await,
            Err(ReportError::Persistence(PersistenceError::Network(_)))
        ));
    }

    #[tokio::test]
    async fn progress_report_bands() {
        let fake = backend();
        {
            let mut attempts = fake.attempts.lock().unwrap();
            attempts.push(AttemptRecord::new("anna", &q(11, "Kirurgi"), true));
            attempts.push(AttemptRecord::new("anna", &q(12, "Kirurgi"), false));
        }
        let engine = engine(Arc::clone(&fake), ExamEngineConfig::default());
        let report = engine.progress("anna").await.unwrap();
        assert_eq!(report.overall.total_attempts, 2);
        assert_eq!(report.overall.total_questions, 40);
        assert_eq!(report.bands["Kirurgi"], MasteryBand::Weak);
        assert_eq!(report.bands["Urologi"], MasteryBand::NoData);
    }

    #[test]
    fn presets_follow_config() {
        let engine = engine(backend(), ExamEngineConfig::default());
        assert_eq!(engine.quick_exam().limit, 10);
        assert!(!engine.quick_exam().hard_mode);
        assert_eq!(engine.standard_exam().limit, 40);
        assert_eq!(engine.marathon_exam().limit, 100);
        assert!(engine.marathon_exam().settings.category.is_none());

        let drill = engine.category_drill("Urologi");
        assert_eq!(drill.limit, 40);
        assert_eq!(drill.settings.category.as_deref(), Some("Urologi"));
        assert!(drill.settings.instant_feedback);

        let hard = engine.hard_training(None);
        assert_eq!(hard.limit, 50);
        assert!(hard.hard_mode);
        let lobby_hard = engine.hard_training(Some("Kirurgi".into()));
        assert_eq!(lobby_hard.settings.category.as_deref(), Some("Kirurgi"));
        assert!(lobby_hard.hard_mode);
    }
}
