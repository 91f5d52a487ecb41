use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{FilterSet, NotebookId, QuestionId, StudyMode, ToggleSet, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotebookError {
    #[error("notebook title is empty")]
    EmptyTitle,
}

/// Practice settings stored alongside a notebook's filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookSettings {
    pub question_count: u32,
    pub study_mode: StudyMode,
    pub toggles: ToggleSet,
}

impl Default for NotebookSettings {
    fn default() -> Self {
        Self {
            question_count: 120,
            study_mode: StudyMode::Zen,
            toggles: ToggleSet::default(),
        }
    }
}

/// A learner-saved combination of filters, settings, and optionally pinned
/// questions.
///
/// Owned by exactly one account; every read goes through that owner scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notebook {
    id: NotebookId,
    owner: UserId,
    title: String,
    description: Option<String>,
    filters: FilterSet,
    settings: NotebookSettings,
    saved_question_ids: Vec<QuestionId>,
    question_pool_count: u64,
    created_at: DateTime<Utc>,
}

impl Notebook {
    /// Create a notebook from the active practice configuration.
    ///
    /// # Errors
    ///
    /// Returns `NotebookError::EmptyTitle` for a blank title.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: NotebookId,
        owner: UserId,
        title: impl Into<String>,
        description: Option<String>,
        filters: FilterSet,
        settings: NotebookSettings,
        question_pool_count: u64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, NotebookError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(NotebookError::EmptyTitle);
        }

        Ok(Self {
            id,
            owner,
            title,
            description,
            filters,
            settings,
            saved_question_ids: Vec::new(),
            question_pool_count,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> NotebookId {
        self.id
    }

    #[must_use]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    #[must_use]
    pub fn settings(&self) -> &NotebookSettings {
        &self.settings
    }

    #[must_use]
    pub fn saved_question_ids(&self) -> &[QuestionId] {
        &self.saved_question_ids
    }

    /// How many questions the filters resolved to when last counted.
    #[must_use]
    pub fn question_pool_count(&self) -> u64 {
        self.question_pool_count
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// # Errors
    ///
    /// Returns `NotebookError::EmptyTitle` for a blank title.
    pub fn rename(
        &mut self,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Result<(), NotebookError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(NotebookError::EmptyTitle);
        }
        self.title = title;
        self.description = description;
        Ok(())
    }

    pub fn update_filters(&mut self, filters: FilterSet) {
        self.filters = filters;
    }

    pub fn update_settings(&mut self, settings: NotebookSettings) {
        self.settings = settings;
    }

    /// Replace the pinned question list, dropping duplicates while keeping
    /// first-occurrence order.
    pub fn set_saved_questions(&mut self, ids: Vec<QuestionId>) {
        let mut seen = std::collections::HashSet::new();
        self.saved_question_ids = ids.into_iter().filter(|id| seen.insert(*id)).collect();
    }

    pub fn set_question_pool_count(&mut self, count: u64) {
        self.question_pool_count = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn build_notebook() -> Notebook {
        Notebook::new(
            NotebookId::random(),
            UserId::random(),
            "Constitucional — revisão",
            None,
            FilterSet::new(),
            NotebookSettings::default(),
            0,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn empty_title_is_rejected() {
        let err = Notebook::new(
            NotebookId::random(),
            UserId::random(),
            "   ",
            None,
            FilterSet::new(),
            NotebookSettings::default(),
            0,
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, NotebookError::EmptyTitle));
    }

    #[test]
    fn saved_questions_are_deduplicated() {
        let mut notebook = build_notebook();
        notebook.set_saved_questions(vec![
            QuestionId::new(3),
            QuestionId::new(1),
            QuestionId::new(3),
            QuestionId::new(2),
            QuestionId::new(1),
        ]);

        assert_eq!(
            notebook.saved_question_ids(),
            [QuestionId::new(3), QuestionId::new(1), QuestionId::new(2)]
        );
    }

    #[test]
    fn rename_validates_title() {
        let mut notebook = build_notebook();
        assert!(notebook.rename("", None).is_err());
        notebook.rename("Novo título", Some("desc".into())).unwrap();
        assert_eq!(notebook.title(), "Novo título");
        assert_eq!(notebook.description(), Some("desc"));
    }
}
