use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;

use prep_core::model::{
    parse_alternatives, DifficultyLabel, FilterSet, Notebook, NotebookId, Question, QuestionError,
    QuestionId, SessionSummary, ToggleSet, UserId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── QUESTION QUERY ────────────────────────────────────────────────────────────
//

/// Encodings the bank historically used for a truthy reviewed flag.
///
/// The column mixes booleans and strings; matching stays an explicit OR
/// across these representations instead of a normalized boolean check.
pub const REVIEWED_TRUTHY: &[&str] = &["true", "sim", "1"];

/// Sentinel the bank writes into the prompt of soft-deleted questions.
pub const DELETED_PROMPT_SENTINEL: &str = "deleted";

/// Wire-agnostic selection criteria for the question bank.
///
/// Each non-empty list is a membership predicate; the predicates are ANDed.
/// An empty list imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionQuery {
    pub subjects: Vec<String>,
    pub topics: Vec<String>,
    pub boards: Vec<String>,
    pub organizations: Vec<String>,
    pub roles: Vec<String>,
    pub education_levels: Vec<String>,
    pub modalities: Vec<String>,
    pub difficulty_labels: Vec<String>,
    pub years: Vec<i32>,
    pub reviewed_only: bool,
    pub with_comment_only: bool,
    pub limit: Option<u32>,
}

impl QuestionQuery {
    /// Translate a filter set plus toggles into selection criteria.
    ///
    /// Year values are numerically coerced; entries that do not parse are
    /// dropped rather than failing the whole query. History toggles have no
    /// store-side predicate and are ignored here.
    #[must_use]
    pub fn from_filters(filters: &FilterSet, toggles: &ToggleSet) -> Self {
        Self {
            subjects: filters.subjects.clone(),
            topics: filters.topics.clone(),
            boards: filters.boards.clone(),
            organizations: filters.organizations.clone(),
            roles: filters.roles.clone(),
            education_levels: filters.education_levels.clone(),
            modalities: filters.modalities.clone(),
            difficulty_labels: filters.difficulty_labels.clone(),
            years: filters
                .years
                .iter()
                .filter_map(|y| y.trim().parse::<i32>().ok())
                .collect(),
            reviewed_only: toggles.reviewed_only,
            with_comment_only: toggles.has_comment,
            limit: None,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Persisted shape of a question, before domain validation.
///
/// Keeps the raw warts of the bank: alternatives as a JSON payload, the
/// reviewed flag as an optional free-form string, and the soft-delete
/// convention of blanking the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRecord {
    pub id: QuestionId,
    pub subject: String,
    pub topic: Option<String>,
    pub prompt: String,
    /// Raw JSON payload, possibly double-encoded.
    pub alternatives: String,
    pub correct_label: String,
    pub comment: Option<String>,
    pub board: Option<String>,
    pub organization: Option<String>,
    pub role: Option<String>,
    pub year: Option<i32>,
    pub education_level: Option<String>,
    pub modality: Option<String>,
    pub difficulty: Option<String>,
    pub prompt_images: Vec<String>,
    pub comment_images: Vec<String>,
    /// Raw reviewed flag; see [`REVIEWED_TRUTHY`].
    pub reviewed: Option<String>,
    pub active: bool,
}

impl QuestionRecord {
    /// True when the raw reviewed flag matches any accepted truthy encoding.
    #[must_use]
    pub fn is_reviewed(&self) -> bool {
        self.reviewed
            .as_deref()
            .is_some_and(|raw| REVIEWED_TRUTHY.contains(&raw))
    }

    /// Baseline predicate every fetch and count applies: active records with
    /// a usable prompt.
    #[must_use]
    pub fn passes_baseline(&self) -> bool {
        self.active && !self.prompt.is_empty() && self.prompt != DELETED_PROMPT_SENTINEL
    }

    fn has_comment(&self) -> bool {
        self.comment.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Whether this record satisfies the query predicates.
    ///
    /// This is the reference evaluation used by the in-memory repository;
    /// the SQL backend must agree with it.
    #[must_use]
    pub fn matches(&self, query: &QuestionQuery) -> bool {
        fn facet_ok(selected: &[String], actual: Option<&str>) -> bool {
            selected.is_empty() || actual.is_some_and(|v| selected.iter().any(|s| s == v))
        }

        if !self.passes_baseline() {
            return false;
        }
        if !facet_ok(&query.subjects, Some(&self.subject)) {
            return false;
        }
        if !facet_ok(&query.topics, self.topic.as_deref()) {
            return false;
        }
        if !facet_ok(&query.boards, self.board.as_deref()) {
            return false;
        }
        if !facet_ok(&query.organizations, self.organization.as_deref()) {
            return false;
        }
        if !facet_ok(&query.roles, self.role.as_deref()) {
            return false;
        }
        if !facet_ok(&query.education_levels, self.education_level.as_deref()) {
            return false;
        }
        if !facet_ok(&query.modalities, self.modality.as_deref()) {
            return false;
        }
        if !facet_ok(&query.difficulty_labels, self.difficulty.as_deref()) {
            return false;
        }
        if !query.years.is_empty() && !self.year.is_some_and(|y| query.years.contains(&y)) {
            return false;
        }
        if query.reviewed_only && !self.is_reviewed() {
            return false;
        }
        if query.with_comment_only && !self.has_comment() {
            return false;
        }
        true
    }

    /// Convert the record into a validated domain question.
    ///
    /// Unparseable image references are dropped; they are optional
    /// embellishment, not part of the question's validity.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the alternatives payload is malformed or
    /// the correct label names no alternative.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        let alternatives = parse_alternatives(&self.alternatives)?;
        let parse_urls = |raw: Vec<String>| -> Vec<Url> {
            raw.iter().filter_map(|s| Url::parse(s).ok()).collect()
        };
        Question::new(
            self.id,
            self.subject,
            self.topic,
            self.prompt,
            alternatives,
            self.correct_label,
            self.comment,
            self.board,
            self.organization,
            self.role,
            self.year,
            parse_urls(self.prompt_images),
            parse_urls(self.comment_images),
        )
    }
}

/// Per-user rated question ids split by who produced the rating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DifficultyIdSets {
    pub user_rated: Vec<QuestionId>,
    pub community_rated: Vec<QuestionId>,
}

/// One recorded answer, appended fire-and-forget during practice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub chosen_label: String,
    pub is_correct: bool,
    pub time_spent_seconds: Option<u32>,
    pub answered_at: DateTime<Utc>,
}

//
// ─── TRAITS ────────────────────────────────────────────────────────────────────
//

/// Read access to the question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Fetch records matching the query, in stable id order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the bank is unreachable.
    async fn fetch(&self, query: &QuestionQuery) -> Result<Vec<QuestionRecord>, StorageError>;

    /// Count records matching the query without fetching them.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the bank is unreachable.
    async fn count(&self, query: &QuestionQuery) -> Result<u64, StorageError>;

    /// Fetch records by id; missing ids are silently omitted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the bank is unreachable.
    async fn fetch_by_ids(&self, ids: &[QuestionId])
        -> Result<Vec<QuestionRecord>, StorageError>;
}

/// Per-user and community difficulty ratings.
#[async_trait]
pub trait DifficultyRepository: Send + Sync {
    /// Ids of questions rated with any of the given labels, split into those
    /// rated by this user and those rated by others.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the store is unreachable.
    async fn ids_by_difficulty(
        &self,
        user: UserId,
        labels: &[DifficultyLabel],
    ) -> Result<DifficultyIdSets, StorageError>;

    /// Upsert this user's rating for a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the store is unreachable.
    async fn save_rating(
        &self,
        question: QuestionId,
        label: DifficultyLabel,
        user: UserId,
    ) -> Result<(), StorageError>;
}

/// Saved notebooks, scoped to their owner.
#[async_trait]
pub trait NotebookRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already exists.
    async fn insert_notebook(&self, notebook: &Notebook) -> Result<(), StorageError>;

    /// Fetch one notebook, enforcing owner scoping.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the store is unreachable.
    async fn get_notebook(
        &self,
        id: NotebookId,
        owner: UserId,
    ) -> Result<Option<Notebook>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` when the store is unreachable.
    async fn list_notebooks(&self, owner: UserId) -> Result<Vec<Notebook>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the notebook does not exist for
    /// its owner.
    async fn update_notebook(&self, notebook: &Notebook) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the notebook does not exist for
    /// the given owner.
    async fn delete_notebook(&self, id: NotebookId, owner: UserId) -> Result<(), StorageError>;

    /// Pinned question ids for a notebook, in saved order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the store is unreachable.
    async fn saved_question_ids(&self, id: NotebookId) -> Result<Vec<QuestionId>, StorageError>;
}

/// Append-only per-answer log.
#[async_trait]
pub trait AnswerLogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` when the store is unreachable.
    async fn append_answer(&self, record: &AnswerRecord) -> Result<(), StorageError>;
}

/// Append-only store of finished session summaries.
#[async_trait]
pub trait SessionSummaryRepository: Send + Sync {
    /// Persist a summary and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the store is unreachable.
    async fn append_summary(&self, summary: &SessionSummary) -> Result<i64, StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
struct RatingRow {
    question_id: QuestionId,
    user_id: UserId,
    label: DifficultyLabel,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Questions live in a `BTreeMap` so fetches come back in stable id order.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<BTreeMap<QuestionId, QuestionRecord>>>,
    ratings: Arc<Mutex<Vec<RatingRow>>>,
    notebooks: Arc<Mutex<HashMap<NotebookId, Notebook>>>,
    answers: Arc<Mutex<Vec<AnswerRecord>>>,
    summaries: Arc<Mutex<Vec<SessionSummary>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one question record.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned; only possible after a panic
    /// in another test thread.
    pub fn seed_question(&self, record: QuestionRecord) {
        self.questions
            .lock()
            .expect("questions lock")
            .insert(record.id, record);
    }

    /// Snapshot of the appended answer log, oldest first.
    #[must_use]
    pub fn answers(&self) -> Vec<AnswerRecord> {
        self.answers.lock().expect("answers lock").clone()
    }

    /// Snapshot of the appended session summaries, oldest first.
    #[must_use]
    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.summaries.lock().expect("summaries lock").clone()
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn fetch(&self, query: &QuestionQuery) -> Result<Vec<QuestionRecord>, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;
        let mut records: Vec<QuestionRecord> = guard
            .values()
            .filter(|r| r.matches(query))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            records.truncate(limit as usize);
        }
        Ok(records)
    }

    async fn count(&self, query: &QuestionQuery) -> Result<u64, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;
        Ok(guard.values().filter(|r| r.matches(query)).count() as u64)
    }

    async fn fetch_by_ids(
        &self,
        ids: &[QuestionId],
    ) -> Result<Vec<QuestionRecord>, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;
        Ok(ids
            .iter()
            .filter_map(|id| guard.get(id))
            .filter(|r| r.passes_baseline())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DifficultyRepository for InMemoryRepository {
    async fn ids_by_difficulty(
        &self,
        user: UserId,
        labels: &[DifficultyLabel],
    ) -> Result<DifficultyIdSets, StorageError> {
        let guard = self.ratings.lock().map_err(lock_err)?;
        let mut sets = DifficultyIdSets::default();
        for row in guard.iter().filter(|r| labels.contains(&r.label)) {
            if row.user_id == user {
                sets.user_rated.push(row.question_id);
            } else {
                sets.community_rated.push(row.question_id);
            }
        }
        Ok(sets)
    }

    async fn save_rating(
        &self,
        question: QuestionId,
        label: DifficultyLabel,
        user: UserId,
    ) -> Result<(), StorageError> {
        let mut guard = self.ratings.lock().map_err(lock_err)?;
        if let Some(row) = guard
            .iter_mut()
            .find(|r| r.question_id == question && r.user_id == user)
        {
            row.label = label;
        } else {
            guard.push(RatingRow {
                question_id: question,
                user_id: user,
                label,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NotebookRepository for InMemoryRepository {
    async fn insert_notebook(&self, notebook: &Notebook) -> Result<(), StorageError> {
        let mut guard = self.notebooks.lock().map_err(lock_err)?;
        if guard.contains_key(&notebook.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(notebook.id(), notebook.clone());
        Ok(())
    }

    async fn get_notebook(
        &self,
        id: NotebookId,
        owner: UserId,
    ) -> Result<Option<Notebook>, StorageError> {
        let guard = self.notebooks.lock().map_err(lock_err)?;
        Ok(guard.get(&id).filter(|n| n.owner() == owner).cloned())
    }

    async fn list_notebooks(&self, owner: UserId) -> Result<Vec<Notebook>, StorageError> {
        let guard = self.notebooks.lock().map_err(lock_err)?;
        let mut list: Vec<Notebook> = guard
            .values()
            .filter(|n| n.owner() == owner)
            .cloned()
            .collect();
        list.sort_by_key(Notebook::created_at);
        Ok(list)
    }

    async fn update_notebook(&self, notebook: &Notebook) -> Result<(), StorageError> {
        let mut guard = self.notebooks.lock().map_err(lock_err)?;
        match guard.get(&notebook.id()) {
            Some(existing) if existing.owner() == notebook.owner() => {
                guard.insert(notebook.id(), notebook.clone());
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn delete_notebook(&self, id: NotebookId, owner: UserId) -> Result<(), StorageError> {
        let mut guard = self.notebooks.lock().map_err(lock_err)?;
        match guard.get(&id) {
            Some(existing) if existing.owner() == owner => {
                guard.remove(&id);
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn saved_question_ids(&self, id: NotebookId) -> Result<Vec<QuestionId>, StorageError> {
        let guard = self.notebooks.lock().map_err(lock_err)?;
        Ok(guard
            .get(&id)
            .map(|n| n.saved_question_ids().to_vec())
            .unwrap_or_default())
    }
}

#[async_trait]
impl AnswerLogRepository for InMemoryRepository {
    async fn append_answer(&self, record: &AnswerRecord) -> Result<(), StorageError> {
        let mut guard = self.answers.lock().map_err(lock_err)?;
        guard.push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionSummaryRepository for InMemoryRepository {
    async fn append_summary(&self, summary: &SessionSummary) -> Result<i64, StorageError> {
        let mut guard = self.summaries.lock().map_err(lock_err)?;
        guard.push(summary.clone());
        Ok(guard.len() as i64)
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub difficulty: Arc<dyn DifficultyRepository>,
    pub notebooks: Arc<dyn NotebookRepository>,
    pub answers: Arc<dyn AnswerLogRepository>,
    pub summaries: Arc<dyn SessionSummaryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repo(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_repo(repo: InMemoryRepository) -> Self {
        Self {
            questions: Arc::new(repo.clone()),
            difficulty: Arc::new(repo.clone()),
            notebooks: Arc::new(repo.clone()),
            answers: Arc::new(repo.clone()),
            summaries: Arc::new(repo),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
