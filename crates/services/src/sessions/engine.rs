use std::sync::Arc;

use chrono::Duration;
use log::{info, warn};
use serde_json::json;

use prep_core::model::{
    FilterSet, Notebook, PracticeContext, ProgramId, Question, Reward, RewardCoefficients,
    StudyMode, ToggleSet, UserId,
};
use prep_core::{Cached, Clock};
use storage::repository::{
    AnswerLogRepository, AnswerRecord, DifficultyRepository, NotebookRepository,
    SessionSummaryRepository, Storage,
};

use crate::allowance::{ActionKind, AllowanceService, UnlimitedAccessSource};
use crate::error::{SessionError, SourceError, StartError};
use crate::gamification::CoefficientsSource;
use crate::questions::{reweight_by_difficulty, NotebookMerger, QuestionSource};
use super::fallback::fallback_set;
use super::state::{AnswerOutcome, PracticeSession, SessionConfig, Step};

/// Fetch cap for trail sessions, which resolve a whole topic at once.
const TRAIL_FETCH_LIMIT: u32 = 500;

/// TTL for the subscriber-status and coefficients caches.
const CACHE_TTL_MINUTES: i64 = 5;

//
// ─── REQUESTS & REPORTS ────────────────────────────────────────────────────────
//

/// Everything needed to start a session from the selection screen.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub user: UserId,
    pub program: Option<ProgramId>,
    pub filters: FilterSet,
    pub toggles: ToggleSet,
    pub question_count: u32,
    pub mode: StudyMode,
    pub context: PracticeContext,
}

/// Non-blocking notice attached to a successful start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartNotice {
    /// The filters matched nothing; the built-in set is in use.
    NoMatchesFallback,
    /// The bank was unreachable; the built-in set is in use.
    SourceFailureFallback,
}

/// Result of a successful `selecting → practicing` transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    pub total_questions: usize,
    pub notice: Option<StartNotice>,
}

/// Result of answering the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerReport {
    Recorded { is_correct: bool, reward: Reward },
    /// The question already had an answer; nothing changed.
    AlreadyAnswered,
}

/// Totals shown on the results screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResults {
    pub total_questions: usize,
    pub total_answered: u32,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub accuracy_percent: u32,
    pub time_spent_seconds: u64,
    pub xp_earned: u32,
}

/// Outcome of a forward step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced { index: usize },
    Finished(SessionResults),
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Orchestrates the practice lifecycle: question resolution, the allowance
/// gate, rewards, and session persistence.
///
/// One engine serves one client; operations take `&mut self`, which is what
/// serializes start → answer → advance in the cooperative single-session
/// model. Selection mode is simply the absence of a session.
pub struct PracticeEngine {
    clock: Clock,
    source: QuestionSource,
    difficulty: Arc<dyn DifficultyRepository>,
    notebooks: Arc<dyn NotebookRepository>,
    answer_log: Arc<dyn AnswerLogRepository>,
    summaries: Arc<dyn SessionSummaryRepository>,
    allowance: Arc<dyn AllowanceService>,
    access: Arc<dyn UnlimitedAccessSource>,
    coefficients_source: Option<Arc<dyn CoefficientsSource>>,
    coefficients: Option<Cached<RewardCoefficients>>,
    unlimited_cache: Option<(UserId, Cached<bool>)>,
    session: Option<PracticeSession>,
}

impl PracticeEngine {
    #[must_use]
    pub fn new(
        clock: Clock,
        storage: Storage,
        allowance: Arc<dyn AllowanceService>,
        access: Arc<dyn UnlimitedAccessSource>,
    ) -> Self {
        Self {
            clock,
            source: QuestionSource::new(storage.questions.clone()),
            difficulty: storage.difficulty,
            notebooks: storage.notebooks,
            answer_log: storage.answers,
            summaries: storage.summaries,
            allowance,
            access,
            coefficients_source: None,
            coefficients: None,
            unlimited_cache: None,
            session: None,
        }
    }

    /// Attach a gamification coefficients provider.
    #[must_use]
    pub fn with_coefficients_source(mut self, source: Arc<dyn CoefficientsSource>) -> Self {
        self.coefficients_source = Some(source);
        self
    }

    /// Override the question source (e.g. to tune its retry schedule).
    #[must_use]
    pub fn with_question_source(mut self, source: QuestionSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn question_source(&self) -> &QuestionSource {
        &self.source
    }

    #[must_use]
    pub fn session(&self) -> Option<&PracticeSession> {
        self.session.as_ref()
    }

    /// True while a session exists and has not reached results.
    #[must_use]
    pub fn is_practicing(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_complete())
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────
    //

    /// Start a session from the selection screen.
    ///
    /// # Errors
    ///
    /// Returns `StartError::InsufficientAllowance` when the gate reports the
    /// distinct `insufficient` kind (state stays in selection),
    /// `StartError::NoQuestions` for an empty trail resolution, and
    /// `StartError::Source` when a trail fetch fails. Free practice degrades
    /// to the built-in fallback set instead of failing.
    pub async fn start_practice(&mut self, request: StartRequest) -> Result<StartReport, StartError> {
        if self.is_practicing() {
            return Err(StartError::AlreadyPracticing);
        }

        let unlimited = if request.context.is_trail() {
            false
        } else {
            self.is_unlimited(request.user).await
        };

        self.consume_session_allowance(&request, unlimited).await?;

        let (questions, notice) = self.resolve_questions(&request).await?;
        self.refresh_coefficients().await;

        let now = self.clock.now();
        let session = PracticeSession::new(
            SessionConfig {
                user: request.user,
                program: request.program,
                mode: request.mode,
                context: request.context,
                unlimited,
                filters: request.filters,
                toggles: request.toggles,
            },
            questions,
            now,
        )
        .map_err(|_| StartError::NoQuestions)?;

        let total_questions = session.total_questions();
        self.session = Some(session);
        Ok(StartReport {
            total_questions,
            notice,
        })
    }

    /// Start a session from a saved notebook.
    ///
    /// Pinned questions are merged with filter matches (§ notebook merge);
    /// an empty merge is a hard `NoQuestions` error — there is no fallback
    /// set for a notebook the learner curated.
    ///
    /// # Errors
    ///
    /// Same start conditions as `start_practice`, plus `NoQuestions` when
    /// the merge comes back empty.
    pub async fn start_from_notebook(
        &mut self,
        notebook: &Notebook,
        program: Option<ProgramId>,
    ) -> Result<StartReport, StartError> {
        if self.is_practicing() {
            return Err(StartError::AlreadyPracticing);
        }

        let user = notebook.owner();
        let settings = notebook.settings().clone();
        let unlimited = self.is_unlimited(user).await;

        let request = StartRequest {
            user,
            program,
            filters: notebook.filters().clone(),
            toggles: settings.toggles,
            question_count: settings.question_count,
            mode: settings.study_mode,
            context: PracticeContext::Free,
        };
        self.consume_session_allowance(&request, unlimited).await?;

        let saved = self
            .notebooks
            .saved_question_ids(notebook.id())
            .await
            .map_err(SourceError::from)?;

        let merger = NotebookMerger::new(&self.source);
        let questions = merger
            .merge(
                &saved,
                &request.filters,
                &request.toggles,
                request.question_count,
            )
            .await?;

        self.refresh_coefficients().await;

        let now = self.clock.now();
        let session = PracticeSession::new(
            SessionConfig {
                user,
                program,
                mode: request.mode,
                context: PracticeContext::Free,
                unlimited,
                filters: request.filters,
                toggles: request.toggles,
            },
            questions,
            now,
        )
        .map_err(|_| StartError::NoQuestions)?;

        let total_questions = session.total_questions();
        self.session = Some(session);
        Ok(StartReport {
            total_questions,
            notice: None,
        })
    }

    /// Answer the current question.
    ///
    /// The answer, counters, and reward are committed before the per-answer
    /// allowance consume and the log write; neither of those can undo them.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotPracticing` without an active session and
    /// `SessionError::Completed` after results.
    pub async fn answer(&mut self, label: &str) -> Result<AnswerReport, SessionError> {
        let now = self.clock.now();
        let coefficients = self.coefficients.as_ref().map(|c| c.value().clone());

        let session = self.session.as_mut().ok_or(SessionError::NotPracticing)?;
        let question_id = session
            .current_question()
            .map(Question::id)
            .ok_or(SessionError::Completed)?;
        let time_spent = session.time_on_current(now);

        let AnswerOutcome::Recorded { is_correct } = session.answer(label)? else {
            return Ok(AnswerReport::AlreadyAnswered);
        };

        let mode = session.mode();
        let user = session.user();
        let program = session.program();
        let metered = session.is_metered();
        let reward = Reward::for_answer(is_correct, mode, coefficients.as_ref());

        // Best effort from here on: the tally above is already committed.
        if metered {
            if let Some(program) = program {
                let outcome = self
                    .allowance
                    .consume(
                        user,
                        program,
                        ActionKind::Question,
                        json!({ "question_id": question_id.value() }),
                    )
                    .await;
                if !outcome.success {
                    warn!(
                        "question allowance consume failed: {:?}",
                        outcome.error_kind
                    );
                }
            }
        }

        let record = AnswerRecord {
            user_id: user,
            question_id,
            chosen_label: label.to_string(),
            is_correct,
            time_spent_seconds: Some(time_spent),
            answered_at: now,
        };
        if let Err(err) = self.answer_log.append_answer(&record).await {
            warn!("answer log write failed: {err}");
        }

        Ok(AnswerReport::Recorded { is_correct, reward })
    }

    /// Move to the next question, or finish the session on the last one.
    ///
    /// A hard-mode timer firing calls this exactly like the learner would;
    /// an unanswered question stays unanswered in the tally. On the terminal
    /// call the summary write is attempted once; a persistence failure is
    /// logged and the results are shown regardless.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotPracticing` without an active session and
    /// `SessionError::Completed` after results.
    pub async fn advance(&mut self) -> Result<AdvanceOutcome, SessionError> {
        let now = self.clock.now();
        let coefficients = self
            .coefficients
            .as_ref()
            .map(|c| c.value().clone())
            .unwrap_or_default();

        let session = self.session.as_mut().ok_or(SessionError::NotPracticing)?;
        match session.advance(now)? {
            Step::Advanced { index } => Ok(AdvanceOutcome::Advanced { index }),
            Step::Finished { completed_at } => {
                let xp_earned = session.correct_count() * coefficients.xp_for(session.mode());
                let results = SessionResults {
                    total_questions: session.total_questions(),
                    total_answered: session.total_answered(),
                    correct_answers: session.correct_count(),
                    wrong_answers: session.total_answered() - session.correct_count(),
                    accuracy_percent: session.progress().accuracy_percent(),
                    time_spent_seconds: u64::try_from(
                        (completed_at - session.started_at()).num_seconds().max(0),
                    )
                    .unwrap_or(0),
                    xp_earned,
                };

                match session.build_summary(xp_earned, completed_at) {
                    Ok(summary) => {
                        if let Err(err) = self.summaries.append_summary(&summary).await {
                            warn!("session summary write failed: {err}");
                        }
                    }
                    Err(err) => warn!("session summary could not be built: {err}"),
                }

                Ok(AdvanceOutcome::Finished(results))
            }
        }
    }

    /// Step back for review navigation. Returns whether the index moved.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotPracticing` without an active session.
    pub fn retreat(&mut self) -> Result<bool, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NotPracticing)?;
        Ok(session.retreat())
    }

    /// Persist this learner's difficulty rating for the current question.
    ///
    /// A ratings-store failure is logged, never surfaced: rating is an
    /// aside, not part of the session contract.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotPracticing` without an active session.
    pub async fn rate_current_difficulty(
        &mut self,
        label: prep_core::model::DifficultyLabel,
    ) -> Result<(), SessionError> {
        let session = self.session.as_ref().ok_or(SessionError::NotPracticing)?;
        let Some(question) = session.current_question() else {
            return Ok(());
        };
        let user = session.user();
        let question_id = question.id();

        if let Err(err) = self.difficulty.save_rating(question_id, label, user).await {
            warn!("difficulty rating write failed: {err}");
        }
        Ok(())
    }

    /// Discard the session and return to selection.
    ///
    /// Abandoning mid-practice writes nothing; in-flight call results are
    /// ignored once the session is gone.
    pub fn reset_session(&mut self) {
        self.session = None;
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────
    //

    async fn consume_session_allowance(
        &self,
        request: &StartRequest,
        unlimited: bool,
    ) -> Result<(), StartError> {
        if request.context.is_trail() || unlimited {
            return Ok(());
        }
        let Some(program) = request.program else {
            return Ok(());
        };

        let outcome = self
            .allowance
            .consume(
                request.user,
                program,
                ActionKind::Session,
                json!({ "question_count": request.question_count }),
            )
            .await;

        if !outcome.success {
            if outcome.is_insufficient() {
                return Err(StartError::InsufficientAllowance);
            }
            // Any other failure kind does not block the start.
            warn!(
                "session allowance consume failed: {:?}",
                outcome.error_kind
            );
        }
        Ok(())
    }

    async fn resolve_questions(
        &self,
        request: &StartRequest,
    ) -> Result<(Vec<Question>, Option<StartNotice>), StartError> {
        let limit = if request.context.is_trail() {
            TRAIL_FETCH_LIMIT
        } else {
            request.question_count
        };

        match self
            .source
            .fetch(&request.filters, &request.toggles, Some(limit), true)
            .await
        {
            Ok(fetched) if !fetched.is_empty() => {
                let labels = request.toggles.active_difficulty_labels();
                let weighted = reweight_by_difficulty(
                    fetched,
                    &labels,
                    request.user,
                    self.difficulty.as_ref(),
                )
                .await;
                Ok((weighted, None))
            }
            Ok(_) => {
                if request.context.is_trail() {
                    Err(StartError::NoQuestions)
                } else {
                    info!("no questions matched the filters, using the built-in set");
                    Ok((
                        fallback_set(request.question_count),
                        Some(StartNotice::NoMatchesFallback),
                    ))
                }
            }
            Err(err) => {
                if request.context.is_trail() {
                    Err(err.into())
                } else {
                    warn!("question resolution failed, using the built-in set: {err}");
                    Ok((
                        fallback_set(request.question_count),
                        Some(StartNotice::SourceFailureFallback),
                    ))
                }
            }
        }
    }

    async fn is_unlimited(&mut self, user: UserId) -> bool {
        let now = self.clock.now();
        if let Some((cached_user, cached)) = &self.unlimited_cache {
            if *cached_user == user {
                if let Some(value) = cached.get(now) {
                    return *value;
                }
            }
        }

        let value = match self.access.is_unlimited(user).await {
            Ok(value) => value,
            Err(err) => {
                warn!("subscriber status check failed: {err}");
                false
            }
        };
        self.unlimited_cache = Some((
            user,
            Cached::with_ttl(value, now, Duration::minutes(CACHE_TTL_MINUTES)),
        ));
        value
    }

    /// Load coefficients once per session lifecycle, with a TTL so a long
    /// selection screen eventually refreshes them.
    async fn refresh_coefficients(&mut self) {
        let now = self.clock.now();
        if let Some(cached) = &self.coefficients {
            if cached.is_valid(now) {
                return;
            }
        }
        let Some(source) = &self.coefficients_source else {
            return;
        };
        match source.get_coefficients().await {
            Ok(coefficients) => {
                self.coefficients = Some(Cached::with_ttl(
                    coefficients,
                    now,
                    Duration::minutes(CACHE_TTL_MINUTES),
                ));
            }
            Err(err) => warn!("gamification coefficients unavailable: {err}"),
        }
    }
}
