use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use rand::rng;
use rand::seq::SliceRandom;

use prep_core::model::{FilterSet, Question, QuestionId, ToggleSet};
use storage::repository::{QuestionQuery, QuestionRecord, QuestionRepository, StorageError};

use crate::error::SourceError;

/// Resolves bounded, optionally shuffled question lists from the bank.
///
/// Facet translation happens in `QuestionQuery::from_filters`; this adapter
/// adds retry, domain conversion, shuffling, and the limit cap. Shuffling is
/// an unweighted permutation after retrieval — plain fairness, nothing more.
#[derive(Clone)]
pub struct QuestionSource {
    repo: Arc<dyn QuestionRepository>,
    max_attempts: u32,
    base_delay: Duration,
}

impl QuestionSource {
    #[must_use]
    pub fn new(repo: Arc<dyn QuestionRepository>) -> Self {
        Self {
            repo,
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Override the retry schedule (attempts, first backoff delay).
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }

    /// Run a store call with exponential backoff.
    async fn retrying<T, F, Fut>(&self, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut last_err = None;
        for attempt in 0..self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(
                        "question store attempt {}/{} failed: {err}",
                        attempt + 1,
                        self.max_attempts
                    );
                    last_err = Some(err);
                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(self.base_delay * 2_u32.pow(attempt)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(StorageError::Connection("no attempts made".into())))
    }

    /// Fetch questions matching the filters.
    ///
    /// Malformed records are dropped with a warning instead of failing the
    /// whole fetch; an unrenderable question must never take the session
    /// down with it.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` when the bank stays unreachable after retries.
    pub async fn fetch(
        &self,
        filters: &FilterSet,
        toggles: &ToggleSet,
        limit: Option<u32>,
        shuffle: bool,
    ) -> Result<Vec<Question>, SourceError> {
        let mut query = QuestionQuery::from_filters(filters, toggles);
        query.limit = limit;

        let records = self.retrying(|| self.repo.fetch(&query)).await?;
        debug!("fetched {} question records", records.len());

        let mut questions = into_questions(records);
        if shuffle {
            questions.shuffle(&mut rng());
        }
        Ok(questions)
    }

    /// Count matching questions without fetching them.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` when the bank stays unreachable after retries.
    pub async fn count(
        &self,
        filters: &FilterSet,
        toggles: &ToggleSet,
    ) -> Result<u64, SourceError> {
        let query = QuestionQuery::from_filters(filters, toggles);
        Ok(self.retrying(|| self.repo.count(&query)).await?)
    }

    /// Fetch questions by id; missing ids are silently omitted.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` when the bank stays unreachable after retries.
    pub async fn fetch_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>, SourceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.retrying(|| self.repo.fetch_by_ids(ids)).await?;
        Ok(into_questions(records))
    }
}

fn into_questions(records: Vec<QuestionRecord>) -> Vec<Question> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.id;
            match record.into_question() {
                Ok(question) => Some(question),
                Err(err) => {
                    warn!("skipping malformed question {id}: {err}");
                    None
                }
            }
        })
        .collect()
}
