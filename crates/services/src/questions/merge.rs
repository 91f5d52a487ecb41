use std::collections::HashSet;

use log::debug;
use rand::rng;
use rand::seq::SliceRandom;

use prep_core::model::{FilterSet, Question, QuestionId, ToggleSet};

use crate::error::MergeError;
use crate::questions::QuestionSource;

/// Combines a notebook's pinned questions with a filter-driven supplement.
pub struct NotebookMerger<'a> {
    source: &'a QuestionSource,
}

impl<'a> NotebookMerger<'a> {
    #[must_use]
    pub fn new(source: &'a QuestionSource) -> Self {
        Self { source }
    }

    /// Merge pinned questions with filter matches up to `target_count`.
    ///
    /// Pinned questions are fetched first and survive deduplication
    /// unconditionally. The supplemental fetch over-fetches by the pinned
    /// count so that removing overlaps still leaves enough candidates. The
    /// combined list gets one final unweighted shuffle before truncation.
    ///
    /// # Errors
    ///
    /// Returns `MergeError::Empty` when nothing survives — an empty practice
    /// session is a reportable condition, never a silent one — and
    /// `MergeError::Source` when the bank is unreachable.
    pub async fn merge(
        &self,
        saved_ids: &[QuestionId],
        filters: &FilterSet,
        toggles: &ToggleSet,
        target_count: u32,
    ) -> Result<Vec<Question>, MergeError> {
        let mut combined = if saved_ids.is_empty() {
            Vec::new()
        } else {
            self.source.fetch_by_ids(saved_ids).await?
        };
        debug!("notebook merge: {} pinned questions resolved", combined.len());

        let remaining = (target_count as usize).saturating_sub(combined.len());
        if remaining > 0 && filters.has_any() {
            let fetch_limit = u32::try_from(remaining + combined.len()).unwrap_or(u32::MAX);
            let candidates = self
                .source
                .fetch(filters, toggles, Some(fetch_limit), true)
                .await?;

            let saved: HashSet<QuestionId> = combined.iter().map(Question::id).collect();
            combined.extend(
                candidates
                    .into_iter()
                    .filter(|q| !saved.contains(&q.id()))
                    .take(remaining),
            );
        }

        if combined.is_empty() {
            return Err(MergeError::Empty);
        }

        combined.shuffle(&mut rng());
        combined.truncate(target_count as usize);
        Ok(combined)
    }
}
