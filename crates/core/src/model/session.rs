use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{FilterSet, ToggleSet, UserId};

//
// ─── MODES ─────────────────────────────────────────────────────────────────────
//

/// Timing discipline for a practice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyMode {
    /// Untimed, reduced reward.
    Zen,
    /// Timed simulation, accelerated reward.
    Hard,
}

impl StudyMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyMode::Zen => "zen",
            StudyMode::Hard => "hard",
        }
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStudyModeError(String);

impl fmt::Display for ParseStudyModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown study mode: {}", self.0)
    }
}

impl std::error::Error for ParseStudyModeError {}

impl FromStr for StudyMode {
    type Err = ParseStudyModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zen" => Ok(StudyMode::Zen),
            "hard" => Ok(StudyMode::Hard),
            other => Err(ParseStudyModeError(other.to_string())),
        }
    }
}

/// Where a session was started from.
///
/// Trail sessions follow a fixed curriculum topic, are exempt from allowance
/// consumption, and treat an empty question resolution as a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeContext {
    Free,
    Trail,
}

impl PracticeContext {
    #[must_use]
    pub fn is_trail(&self) -> bool {
        matches!(self, PracticeContext::Trail)
    }
}

//
// ─── SESSION SUMMARY ───────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionSummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("correct answers ({correct}) exceed total ({total})")]
    CountMismatch { total: u32, correct: u32 },
}

/// Aggregate record for a finished practice session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    user_id: UserId,
    mode: StudyMode,
    total_questions: u32,
    correct_answers: u32,
    wrong_answers: u32,
    time_spent_seconds: u64,
    filters: FilterSet,
    toggles: ToggleSet,
    xp_earned: u32,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Build a summary from a session tally.
    ///
    /// Wrong answers and time spent are derived, keeping the record
    /// internally consistent by construction.
    ///
    /// # Errors
    ///
    /// Returns `SessionSummaryError::InvalidTimeRange` if `completed_at` is
    /// before `started_at`, and `CountMismatch` if `correct > total`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_tally(
        user_id: UserId,
        mode: StudyMode,
        total_questions: u32,
        correct_answers: u32,
        filters: FilterSet,
        toggles: ToggleSet,
        xp_earned: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, SessionSummaryError> {
        if completed_at < started_at {
            return Err(SessionSummaryError::InvalidTimeRange);
        }
        if correct_answers > total_questions {
            return Err(SessionSummaryError::CountMismatch {
                total: total_questions,
                correct: correct_answers,
            });
        }

        let time_spent_seconds =
            u64::try_from((completed_at - started_at).num_seconds()).unwrap_or(0);

        Ok(Self {
            user_id,
            mode,
            total_questions,
            correct_answers,
            wrong_answers: total_questions - correct_answers,
            time_spent_seconds,
            filters,
            toggles,
            xp_earned,
            started_at,
            completed_at,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn mode(&self) -> StudyMode {
        self.mode
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn wrong_answers(&self) -> u32 {
        self.wrong_answers
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u64 {
        self.time_spent_seconds
    }

    #[must_use]
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    #[must_use]
    pub fn toggles(&self) -> &ToggleSet {
        &self.toggles
    }

    #[must_use]
    pub fn xp_earned(&self) -> u32 {
        self.xp_earned
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn summary_derives_wrong_answers_and_time() {
        let now = fixed_now();
        let summary = SessionSummary::from_tally(
            UserId::random(),
            StudyMode::Zen,
            10,
            7,
            FilterSet::new(),
            ToggleSet::new(),
            350,
            now,
            now + Duration::seconds(90),
        )
        .unwrap();

        assert_eq!(summary.wrong_answers(), 3);
        assert_eq!(summary.time_spent_seconds(), 90);
        assert_eq!(summary.xp_earned(), 350);
    }

    #[test]
    fn summary_rejects_backwards_time() {
        let now = fixed_now();
        let err = SessionSummary::from_tally(
            UserId::random(),
            StudyMode::Hard,
            5,
            5,
            FilterSet::new(),
            ToggleSet::new(),
            500,
            now,
            now - Duration::seconds(1),
        )
        .unwrap_err();

        assert!(matches!(err, SessionSummaryError::InvalidTimeRange));
    }

    #[test]
    fn summary_rejects_correct_above_total() {
        let now = fixed_now();
        let err = SessionSummary::from_tally(
            UserId::random(),
            StudyMode::Zen,
            3,
            4,
            FilterSet::new(),
            ToggleSet::new(),
            0,
            now,
            now,
        )
        .unwrap_err();

        assert!(matches!(err, SessionSummaryError::CountMismatch { .. }));
    }

    #[test]
    fn study_mode_roundtrip() {
        for mode in [StudyMode::Zen, StudyMode::Hard] {
            let parsed: StudyMode = mode.as_str().parse().unwrap();
            assert_eq!(parsed, mode);
        }
        assert!("sprint".parse::<StudyMode>().is_err());
    }
}
