use chrono::{DateTime, Duration, Utc};

use prep_core::model::{FilterSet, ToggleSet};

use crate::error::SourceError;
use crate::questions::QuestionSource;

/// Default quiet period before a pending count is due.
const DEFAULT_DEBOUNCE_MS: i64 = 300;

#[derive(Debug, Clone)]
struct PendingCount {
    filters: FilterSet,
    toggles: ToggleSet,
    last_edit: DateTime<Utc>,
}

/// Debounced question-count estimation for the selection screen.
///
/// Every facet change triggers a live count query, so rapid edits are
/// coalesced: `note_edit` replaces the pending query, and `due` hands it out
/// only after the quiet period has passed. Clock-driven, so tests never
/// sleep.
#[derive(Debug, Clone)]
pub struct CountEstimator {
    debounce: Duration,
    pending: Option<PendingCount>,
}

impl Default for CountEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl CountEstimator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            debounce: Duration::milliseconds(DEFAULT_DEBOUNCE_MS),
            pending: None,
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Record a filter edit, replacing any pending estimation.
    pub fn note_edit(&mut self, filters: FilterSet, toggles: ToggleSet, now: DateTime<Utc>) {
        self.pending = Some(PendingCount {
            filters,
            toggles,
            last_edit: now,
        });
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending criteria if the quiet period has elapsed.
    pub fn due(&mut self, now: DateTime<Utc>) -> Option<(FilterSet, ToggleSet)> {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|p| now - p.last_edit >= self.debounce);
        if !ready {
            return None;
        }
        self.pending
            .take()
            .map(|p| (p.filters, p.toggles))
    }

    /// Run the pending count against the source if it is due.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` when the count query fails; the pending edit is
    /// consumed either way, matching the one-shot semantics of the screen.
    pub async fn poll(
        &mut self,
        source: &QuestionSource,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>, SourceError> {
        match self.due(now) {
            Some((filters, toggles)) => source.count(&filters, &toggles).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::model::Facet;
    use prep_core::time::fixed_now;

    #[test]
    fn rapid_edits_coalesce_into_one_query() {
        let mut estimator = CountEstimator::new();
        let now = fixed_now();

        let mut filters = FilterSet::new();
        filters.toggle_value(Facet::Subject, "Português");
        estimator.note_edit(filters.clone(), ToggleSet::new(), now);

        filters.toggle_value(Facet::Subject, "Matemática");
        estimator.note_edit(
            filters.clone(),
            ToggleSet::new(),
            now + Duration::milliseconds(100),
        );

        // Not yet quiet for 300ms after the second edit.
        assert!(estimator.due(now + Duration::milliseconds(250)).is_none());

        let (due_filters, _) = estimator
            .due(now + Duration::milliseconds(450))
            .expect("quiet period elapsed");
        assert_eq!(due_filters, filters);
        // Consumed: nothing further is due.
        assert!(estimator.due(now + Duration::seconds(10)).is_none());
    }

    #[test]
    fn nothing_is_due_without_edits() {
        let mut estimator = CountEstimator::new();
        assert!(!estimator.has_pending());
        assert!(estimator.due(fixed_now()).is_none());
    }
}
