use serde::{Deserialize, Serialize};

use crate::model::DifficultyLabel;

//
// ─── FACETS ────────────────────────────────────────────────────────────────────
//

/// One named filterable dimension of the question bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Subject,
    Topic,
    Board,
    Organization,
    Role,
    Year,
    EducationLevel,
    Modality,
    DifficultyLabel,
}

impl Facet {
    /// All facets, in the order they appear on the selection screen.
    pub const ALL: [Facet; 9] = [
        Facet::Subject,
        Facet::Topic,
        Facet::Board,
        Facet::Organization,
        Facet::Role,
        Facet::Year,
        Facet::EducationLevel,
        Facet::Modality,
        Facet::DifficultyLabel,
    ];
}

//
// ─── FILTER SET ────────────────────────────────────────────────────────────────
//

/// Selected values per facet.
///
/// Every facet holds a duplicate-free list in insertion order, so a persisted
/// filter set round-trips byte-for-byte. An empty facet imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    pub subjects: Vec<String>,
    pub topics: Vec<String>,
    pub boards: Vec<String>,
    pub organizations: Vec<String>,
    pub roles: Vec<String>,
    pub years: Vec<String>,
    pub education_levels: Vec<String>,
    pub modalities: Vec<String>,
    pub difficulty_labels: Vec<String>,
}

impl FilterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected values for one facet.
    #[must_use]
    pub fn values(&self, facet: Facet) -> &[String] {
        match facet {
            Facet::Subject => &self.subjects,
            Facet::Topic => &self.topics,
            Facet::Board => &self.boards,
            Facet::Organization => &self.organizations,
            Facet::Role => &self.roles,
            Facet::Year => &self.years,
            Facet::EducationLevel => &self.education_levels,
            Facet::Modality => &self.modalities,
            Facet::DifficultyLabel => &self.difficulty_labels,
        }
    }

    fn values_mut(&mut self, facet: Facet) -> &mut Vec<String> {
        match facet {
            Facet::Subject => &mut self.subjects,
            Facet::Topic => &mut self.topics,
            Facet::Board => &mut self.boards,
            Facet::Organization => &mut self.organizations,
            Facet::Role => &mut self.roles,
            Facet::Year => &mut self.years,
            Facet::EducationLevel => &mut self.education_levels,
            Facet::Modality => &mut self.modalities,
            Facet::DifficultyLabel => &mut self.difficulty_labels,
        }
    }

    /// Symmetric add/remove of one value in one facet.
    ///
    /// Adding a value already present removes it instead, so the operation is
    /// its own inverse.
    pub fn toggle_value(&mut self, facet: Facet, value: impl Into<String>) {
        let value = value.into();
        let values = self.values_mut(facet);
        if let Some(pos) = values.iter().position(|v| *v == value) {
            values.remove(pos);
        } else {
            values.push(value);
        }
    }

    /// Resets every facet to empty.
    pub fn clear(&mut self) {
        for facet in Facet::ALL {
            self.values_mut(facet).clear();
        }
    }

    /// Sum of all facet cardinalities.
    #[must_use]
    pub fn count_active(&self) -> usize {
        Facet::ALL.iter().map(|f| self.values(*f).len()).sum()
    }

    /// True when at least one facet has a selected value.
    #[must_use]
    pub fn has_any(&self) -> bool {
        self.count_active() > 0
    }
}

//
// ─── TOGGLES ───────────────────────────────────────────────────────────────────
//

/// Independent boolean refinements layered on top of the facet selection.
///
/// No toggle implies or excludes another; the history toggles in particular
/// may all be active at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleSet {
    /// Only questions the editorial team marked as reviewed.
    pub reviewed_only: bool,
    /// Only questions carrying a non-empty explanation.
    pub has_comment: bool,
    pub solved: bool,
    pub unsolved: bool,
    pub answered_correct: bool,
    pub answered_wrong: bool,
    /// User-rated difficulty preferences.
    pub easy: bool,
    pub medium: bool,
    pub hard: bool,
}

impl ToggleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active toggles.
    #[must_use]
    pub fn count_active(&self) -> usize {
        [
            self.reviewed_only,
            self.has_comment,
            self.solved,
            self.unsolved,
            self.answered_correct,
            self.answered_wrong,
            self.easy,
            self.medium,
            self.hard,
        ]
        .iter()
        .filter(|on| **on)
        .count()
    }

    /// Resets every toggle to false.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Difficulty labels derived from the easy/medium/hard toggles, in a
    /// fixed order.
    #[must_use]
    pub fn active_difficulty_labels(&self) -> Vec<DifficultyLabel> {
        let mut labels = Vec::new();
        if self.easy {
            labels.push(DifficultyLabel::Easy);
        }
        if self.medium {
            labels.push(DifficultyLabel::Medium);
        }
        if self.hard {
            labels.push(DifficultyLabel::Hard);
        }
        labels
    }
}

/// Combined count of selected facet values and active toggles.
///
/// Used for UI badges and telemetry only, never for selection logic.
#[must_use]
pub fn count_active(filters: &FilterSet, toggles: &ToggleSet) -> usize {
    filters.count_active() + toggles.count_active()
}

/// True when any facet value or toggle is active.
#[must_use]
pub fn has_any(filters: &FilterSet, toggles: &ToggleSet) -> bool {
    count_active(filters, toggles) > 0
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_value_is_its_own_inverse() {
        let mut filters = FilterSet::new();
        filters.toggle_value(Facet::Subject, "Direito Constitucional");
        filters.toggle_value(Facet::Board, "CESPE");
        let before = filters.clone();

        filters.toggle_value(Facet::Subject, "Direito Administrativo");
        filters.toggle_value(Facet::Subject, "Direito Administrativo");

        assert_eq!(filters, before);
    }

    #[test]
    fn toggle_value_never_duplicates() {
        let mut filters = FilterSet::new();
        filters.toggle_value(Facet::Year, "2023");
        filters.toggle_value(Facet::Year, "2024");
        filters.toggle_value(Facet::Year, "2023");
        filters.toggle_value(Facet::Year, "2023");

        assert_eq!(filters.values(Facet::Year), ["2024", "2023"]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut filters = FilterSet::new();
        filters.toggle_value(Facet::Subject, "Português");
        filters.toggle_value(Facet::Modality, "Certo/Errado");
        let mut toggles = ToggleSet::new();
        toggles.reviewed_only = true;
        toggles.hard = true;

        assert_eq!(count_active(&filters, &toggles), 4);
        assert!(has_any(&filters, &toggles));

        filters.clear();
        toggles.clear();

        assert_eq!(count_active(&filters, &toggles), 0);
        assert!(!has_any(&filters, &toggles));
    }

    #[test]
    fn active_difficulty_labels_follow_toggles() {
        let mut toggles = ToggleSet::new();
        assert!(toggles.active_difficulty_labels().is_empty());

        toggles.easy = true;
        toggles.hard = true;
        assert_eq!(
            toggles.active_difficulty_labels(),
            vec![DifficultyLabel::Easy, DifficultyLabel::Hard]
        );
    }

    #[test]
    fn filter_set_serde_preserves_order() {
        let mut filters = FilterSet::new();
        filters.toggle_value(Facet::Subject, "B");
        filters.toggle_value(Facet::Subject, "A");

        let json = serde_json::to_string(&filters).unwrap();
        let back: FilterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.values(Facet::Subject), ["B", "A"]);
    }
}
