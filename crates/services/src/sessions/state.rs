use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use prep_core::model::{
    FilterSet, PracticeContext, ProgramId, Question, QuestionId, SessionSummary,
    SessionSummaryError, StudyMode, ToggleSet, UserId,
};

use crate::error::SessionError;
use super::progress::SessionProgress;

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// The recorded answer for one question. Write-once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAnswer {
    pub chosen_label: String,
    pub is_correct: bool,
}

/// Outcome of an `answer` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Recorded { is_correct: bool },
    /// The current question already has an answer; the call was a no-op.
    AlreadyAnswered,
}

/// Outcome of an `advance` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Advanced { index: usize },
    /// The last question was passed; the session is now in results.
    Finished { completed_at: DateTime<Utc> },
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Identity and settings a session is started with.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user: UserId,
    pub program: Option<ProgramId>,
    pub mode: StudyMode,
    pub context: PracticeContext,
    pub unlimited: bool,
    pub filters: FilterSet,
    pub toggles: ToggleSet,
}

/// The live practice aggregate.
///
/// The question list freezes at start. The learner steps forward one
/// question at a time; backward navigation is review-only and never
/// re-enables answering. Selection mode is represented by the absence of a
/// session in the orchestrator.
pub struct PracticeSession {
    user: UserId,
    program: Option<ProgramId>,
    mode: StudyMode,
    context: PracticeContext,
    unlimited: bool,
    filters: FilterSet,
    toggles: ToggleSet,
    questions: Vec<Question>,
    current: usize,
    answers: HashMap<QuestionId, RecordedAnswer>,
    correct_count: u32,
    total_answered: u32,
    started_at: DateTime<Utc>,
    question_started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl PracticeSession {
    /// Freeze a question list into a running session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions are provided.
    pub(crate) fn new(
        config: SessionConfig,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }

        Ok(Self {
            user: config.user,
            program: config.program,
            mode: config.mode,
            context: config.context,
            unlimited: config.unlimited,
            filters: config.filters,
            toggles: config.toggles,
            questions,
            current: 0,
            answers: HashMap::new(),
            correct_count: 0,
            total_answered: 0,
            started_at,
            question_started_at: started_at,
            completed_at: None,
        })
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    #[must_use]
    pub fn mode(&self) -> StudyMode {
        self.mode
    }

    #[must_use]
    pub fn context(&self) -> PracticeContext {
        self.context
    }

    #[must_use]
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    #[must_use]
    pub fn toggles(&self) -> &ToggleSet {
        &self.toggles
    }

    /// True when this session consumes allowance: free-practice context,
    /// no unlimited access, and a program to charge against.
    #[must_use]
    pub fn is_metered(&self) -> bool {
        !self.unlimited && !self.context.is_trail() && self.program.is_some()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn question_started_at(&self) -> DateTime<Utc> {
        self.question_started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.current + 1 == self.questions.len()
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_answered(&self) -> u32 {
        self.total_answered
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionId, RecordedAnswer> {
        &self.answers
    }

    /// Seconds spent on the current question so far.
    #[must_use]
    pub fn time_on_current(&self, now: DateTime<Utc>) -> u32 {
        u32::try_from((now - self.question_started_at).num_seconds().max(0)).unwrap_or(u32::MAX)
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.total_questions(),
            answered: self.answers.len(),
            correct: self.correct_count as usize,
            remaining: self.total_questions().saturating_sub(self.answers.len()),
            is_complete: self.is_complete(),
        }
    }

    /// Record an answer for the current question.
    ///
    /// Write-once: a question that already has an answer keeps it, whatever
    /// label is offered afterwards.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session is already finished.
    pub(crate) fn answer(&mut self, label: &str) -> Result<AnswerOutcome, SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        let Some(question) = self.questions.get(self.current) else {
            return Err(SessionError::Completed);
        };

        if self.answers.contains_key(&question.id()) {
            return Ok(AnswerOutcome::AlreadyAnswered);
        }

        let is_correct = question.is_correct(label);
        self.answers.insert(
            question.id(),
            RecordedAnswer {
                chosen_label: label.to_string(),
                is_correct,
            },
        );
        self.total_answered += 1;
        if is_correct {
            self.correct_count += 1;
        }

        Ok(AnswerOutcome::Recorded { is_correct })
    }

    /// Move forward, or finish when already on the last question.
    ///
    /// An externally imposed per-question timeout calls this exactly like a
    /// learner tapping "next": an unanswered question simply stays out of
    /// the tally.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session is already finished.
    pub(crate) fn advance(&mut self, now: DateTime<Utc>) -> Result<Step, SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }

        if self.current + 1 < self.questions.len() {
            self.current += 1;
            self.question_started_at = now;
            Ok(Step::Advanced {
                index: self.current,
            })
        } else {
            self.completed_at = Some(now);
            Ok(Step::Finished { completed_at: now })
        }
    }

    /// Step back for review. Returns false at the first question or after
    /// completion.
    pub(crate) fn retreat(&mut self) -> bool {
        if self.current > 0 && !self.is_complete() {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn build_summary(
        &self,
        xp_earned: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<SessionSummary, SessionSummaryError> {
        SessionSummary::from_tally(
            self.user,
            self.mode,
            self.total_answered,
            self.correct_count,
            self.filters.clone(),
            self.toggles.clone(),
            xp_earned,
            self.started_at,
            completed_at,
        )
    }
}

impl fmt::Debug for PracticeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PracticeSession")
            .field("user", &self.user)
            .field("mode", &self.mode)
            .field("context", &self.context)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("total_answered", &self.total_answered)
            .field("correct_count", &self.correct_count)
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use prep_core::model::{Alternative, QuestionId};
    use prep_core::time::fixed_now;

    fn build_question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            "Português",
            None,
            format!("Enunciado {id}"),
            vec![
                Alternative {
                    label: "A".into(),
                    text: "certo".into(),
                },
                Alternative {
                    label: "B".into(),
                    text: "errado".into(),
                },
            ],
            "A",
            None,
            None,
            None,
            None,
            None,
            Vec::new(),
            Vec::new(),
        )
        .unwrap()
    }

    fn build_config() -> SessionConfig {
        SessionConfig {
            user: UserId::random(),
            program: Some(ProgramId::random()),
            mode: StudyMode::Zen,
            context: PracticeContext::Free,
            unlimited: false,
            filters: FilterSet::new(),
            toggles: ToggleSet::new(),
        }
    }

    fn build_session(count: u64) -> PracticeSession {
        let questions = (1..=count).map(build_question).collect();
        PracticeSession::new(build_config(), questions, fixed_now()).unwrap()
    }

    #[test]
    fn empty_session_returns_error() {
        let err = PracticeSession::new(build_config(), Vec::new(), fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::Empty));
    }

    #[test]
    fn answers_are_write_once() {
        let mut session = build_session(2);

        assert_eq!(
            session.answer("A").unwrap(),
            AnswerOutcome::Recorded { is_correct: true }
        );
        // Second label on the same question is ignored.
        assert_eq!(session.answer("B").unwrap(), AnswerOutcome::AlreadyAnswered);

        let recorded = &session.answers()[&QuestionId::new(1)];
        assert_eq!(recorded.chosen_label, "A");
        assert!(recorded.is_correct);
        assert_eq!(session.total_answered(), 1);
        assert_eq!(session.correct_count(), 1);
    }

    #[test]
    fn tally_matches_distinct_answers() {
        let mut session = build_session(3);
        session.answer("A").unwrap();
        session.advance(fixed_now()).unwrap();
        session.answer("B").unwrap();
        session.advance(fixed_now()).unwrap();
        session.answer("A").unwrap();

        assert_eq!(session.total_answered() as usize, session.answers().len());
        assert_eq!(session.correct_count(), 2);
        assert!(session.total_answered() as usize <= session.total_questions());
    }

    #[test]
    fn advance_past_last_question_finishes() {
        let mut session = build_session(2);
        let now = fixed_now();

        session.answer("A").unwrap();
        assert_eq!(
            session.advance(now).unwrap(),
            Step::Advanced { index: 1 }
        );
        session.answer("B").unwrap();

        let later = now + Duration::seconds(30);
        assert_eq!(
            session.advance(later).unwrap(),
            Step::Finished {
                completed_at: later
            }
        );
        assert!(session.is_complete());
        assert!(matches!(
            session.advance(later).unwrap_err(),
            SessionError::Completed
        ));
        assert!(matches!(
            session.answer("A").unwrap_err(),
            SessionError::Completed
        ));
    }

    #[test]
    fn timeout_leaves_question_unanswered() {
        let mut session = build_session(2);

        // No answer recorded; the external timer forces the transition.
        session.advance(fixed_now()).unwrap();
        assert_eq!(session.total_answered(), 0);

        session.advance(fixed_now()).unwrap();
        assert!(session.is_complete());
        assert_eq!(session.total_answered(), 0);
        assert_eq!(session.progress().remaining, 2);
    }

    #[test]
    fn retreat_reviews_without_reanswering() {
        let mut session = build_session(3);
        session.answer("B").unwrap();
        session.advance(fixed_now()).unwrap();

        assert!(session.retreat());
        assert_eq!(session.current_index(), 0);
        // Back on an answered question: the original answer stands.
        assert_eq!(session.answer("A").unwrap(), AnswerOutcome::AlreadyAnswered);
        assert_eq!(session.correct_count(), 0);

        assert!(!{
            let mut s = build_session(1);
            s.retreat()
        });
    }

    #[test]
    fn advance_resets_question_timer() {
        let mut session = build_session(2);
        let start = fixed_now();
        assert_eq!(session.question_started_at(), start);

        let later = start + Duration::seconds(45);
        session.advance(later).unwrap();
        assert_eq!(session.question_started_at(), later);
        assert_eq!(session.time_on_current(later + Duration::seconds(12)), 12);
    }

    #[test]
    fn progress_and_accuracy_track_counts() {
        let mut session = build_session(4);
        session.answer("A").unwrap();
        session.advance(fixed_now()).unwrap();
        session.answer("B").unwrap();

        let progress = session.progress();
        assert_eq!(progress.total, 4);
        assert_eq!(progress.answered, 2);
        assert_eq!(progress.correct, 1);
        assert_eq!(progress.remaining, 2);
        assert_eq!(progress.accuracy_percent(), 50);
        assert!(!progress.is_complete);
    }

    #[test]
    fn summary_reflects_tally() {
        let mut session = build_session(2);
        let now = fixed_now();
        session.answer("A").unwrap();
        session.advance(now).unwrap();
        session.answer("A").unwrap();
        let end = now + Duration::seconds(60);
        session.advance(end).unwrap();

        let summary = session.build_summary(100, end).unwrap();
        assert_eq!(summary.total_questions(), 2);
        assert_eq!(summary.correct_answers(), 2);
        assert_eq!(summary.wrong_answers(), 0);
        assert_eq!(summary.time_spent_seconds(), 60);
        assert_eq!(summary.xp_earned(), 100);
    }
}
