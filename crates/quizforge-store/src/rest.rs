//! PostgREST store.
//!
//! Talks to a Supabase-style REST endpoint: plain table reads and inserts
//! under `/rest/v1/<table>` (questions, user answers, question reports),
//! random sampling through the
//! `get_random_questions` and `get_random_mixed_questions` RPC functions.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use quizforge_core::error::PersistenceError;
use quizforge_core::model::{AttemptRecord, Question, QuestionId, QuestionReport};
use quizforge_core::traits::{AttemptStore, QuestionFilter, QuestionSource, ReportSink};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const QUESTIONS_TABLE: &str = "rest/v1/questions";
const ANSWERS_TABLE: &str = "rest/v1/user_answers";
const REPORTS_TABLE: &str = "rest/v1/question_reports";
const RPC_CATEGORY_SAMPLE: &str = "rest/v1/rpc/get_random_questions";
const RPC_MIXED_SAMPLE: &str = "rest/v1/rpc/get_random_mixed_questions";

/// REST-backed question and attempt store.
pub struct RestStore {
    base_url: Url,
    api_key: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, PersistenceError> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        timeout_secs: u64,
    ) -> Result<Self, PersistenceError> {
        // Url::join replaces the last path segment unless the base ends in '/'.
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| {
            PersistenceError::Unavailable(format!("invalid base url {base_url}: {e}"))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            timeout_secs,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PersistenceError> {
        self.base_url
            .join(path)
            .map_err(|e| PersistenceError::Unavailable(format!("invalid endpoint {path}: {e}")))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, PersistenceError> {
        let response = self.authorized(request).send().await.map_err(|e| {
            if e.is_timeout() {
                PersistenceError::Timeout(self.timeout_secs)
            } else {
                PersistenceError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Unauthorized(body));
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Api {
                status,
                message: body,
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, PersistenceError> {
        response
            .json()
            .await
            .map_err(|e| PersistenceError::Decode(e.to_string()))
    }

    async fn rpc<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Vec<Question>, PersistenceError> {
        let url = self.endpoint(path)?;
        let response = self.send(self.client.post(url).json(body)).await?;
        Self::decode(response).await
    }
}

#[derive(Serialize)]
struct CategorySampleArgs<'a> {
    p_category: &'a str,
    p_limit: usize,
}

#[derive(Serialize)]
struct MixedSampleArgs {
    p_limit: usize,
}

#[derive(Deserialize)]
struct CategoryRow {
    category: String,
}

/// Row layout of the `user_answers` table.
#[derive(Serialize)]
struct AnswerRow<'a> {
    user_id: &'a str,
    question_id: QuestionId,
    is_correct: bool,
    created_at: DateTime<Utc>,
}

impl<'a> From<&'a AttemptRecord> for AnswerRow<'a> {
    fn from(record: &'a AttemptRecord) -> Self {
        Self {
            user_id: &record.user,
            question_id: record.question_id,
            is_correct: record.is_correct,
            created_at: record.timestamp,
        }
    }
}

#[async_trait]
impl QuestionSource for RestStore {
    fn name(&self) -> &str {
        "rest"
    }

    #[instrument(skip(self))]
    async fn list_questions(
        &self,
        filter: Option<&QuestionFilter>,
    ) -> Result<Vec<Question>, PersistenceError> {
        let mut url = self.endpoint(QUESTIONS_TABLE)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            if let Some(category) = filter.and_then(|f| f.category.as_deref()) {
                query.append_pair("category", &format!("eq.{category}"));
            }
        }
        let response = self.send(self.client.get(url)).await?;
        let questions: Vec<Question> = Self::decode(response).await?;
        debug!(count = questions.len(), "listed questions");
        Ok(questions)
    }

    #[instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<String>, PersistenceError> {
        let mut url = self.endpoint(QUESTIONS_TABLE)?;
        url.query_pairs_mut().append_pair("select", "category");
        let response = self.send(self.client.get(url)).await?;
        let rows: Vec<CategoryRow> = Self::decode(response).await?;
        let mut categories: Vec<String> = rows.into_iter().map(|r| r.category).collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    #[instrument(skip(self))]
    async fn sample_questions_by_category(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Question>, PersistenceError> {
        let args = CategorySampleArgs {
            p_category: category,
            p_limit: limit,
        };
        self.rpc(RPC_CATEGORY_SAMPLE, &args).await
    }

    #[instrument(skip(self))]
    async fn sample_mixed_questions(
        &self,
        limit: usize,
    ) -> Result<Vec<Question>, PersistenceError> {
        self.rpc(RPC_MIXED_SAMPLE, &MixedSampleArgs { p_limit: limit })
            .await
    }
}

#[async_trait]
impl AttemptStore for RestStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn record_attempts(&self, records: &[AttemptRecord]) -> Result<(), PersistenceError> {
        if records.is_empty() {
            return Ok(());
        }
        let rows: Vec<AnswerRow<'_>> = records.iter().map(AnswerRow::from).collect();
        let url = self.endpoint(ANSWERS_TABLE)?;
        self.send(
            self.client
                .post(url)
                .header("Prefer", "return=minimal")
                .json(&rows),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_attempts(&self, user: &str) -> Result<Vec<AttemptRecord>, PersistenceError> {
        let mut url = self.endpoint(ANSWERS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("user_id", &format!("eq.{user}"))
            .append_pair("select", "*")
            .append_pair("order", "created_at.asc");
        let response = self.send(self.client.get(url)).await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl ReportSink for RestStore {
    #[instrument(skip(self, report), fields(question = report.question_id))]
    async fn report_question(&self, report: &QuestionReport) -> Result<(), PersistenceError> {
        let url = self.endpoint(REPORTS_TABLE)?;
        self.send(
            self.client
                .post(url)
                .header("Prefer", "return=minimal")
                .json(report),
        )
        .await?;
        Ok(())
    }
}
