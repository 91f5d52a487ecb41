use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use prep_core::model::{
    Facet, FilterSet, Notebook, NotebookId, NotebookSettings, PracticeContext, ProgramId,
    QuestionId, RewardCoefficients, StudyMode, ToggleSet, UserId,
};
use prep_core::time::fixed_now;
use prep_core::Clock;
use services::{
    ActionKind, AdvanceOutcome, AllowanceErrorKind, AllowanceService, AnswerReport, ConsumeOutcome,
    PracticeEngine, StartError, StartNotice, StartRequest, StaticAccess, StaticAllowance,
    StaticCoefficients,
};
use storage::repository::{
    InMemoryRepository, NotebookRepository, QuestionRecord, Storage,
};

fn build_record(id: u64, subject: &str) -> QuestionRecord {
    QuestionRecord {
        id: QuestionId::new(id),
        subject: subject.to_string(),
        topic: None,
        prompt: format!("Enunciado {id}"),
        alternatives: r#"[{"label":"A","text":"certo"},{"label":"B","text":"errado"}]"#.to_string(),
        correct_label: "A".to_string(),
        comment: None,
        board: None,
        organization: None,
        role: None,
        year: None,
        education_level: None,
        modality: None,
        difficulty: None,
        prompt_images: Vec::new(),
        comment_images: Vec::new(),
        reviewed: None,
        active: true,
    }
}

fn seeded_repo(count: u64) -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    for id in 1..=count {
        repo.seed_question(build_record(id, "Direito Constitucional"));
    }
    repo
}

fn build_engine(repo: &InMemoryRepository, allowance: Arc<dyn AllowanceService>) -> PracticeEngine {
    PracticeEngine::new(
        Clock::fixed(fixed_now()),
        Storage::from_repo(repo.clone()),
        allowance,
        Arc::new(StaticAccess { unlimited: false }),
    )
}

fn build_request(question_count: u32, mode: StudyMode) -> StartRequest {
    let mut filters = FilterSet::new();
    filters.toggle_value(Facet::Subject, "Direito Constitucional");
    StartRequest {
        user: UserId::random(),
        program: Some(ProgramId::random()),
        filters,
        toggles: ToggleSet::new(),
        question_count,
        mode,
        context: PracticeContext::Free,
    }
}

/// Allowance double that records calls and can fail per action kind.
struct RecordingAllowance {
    session_calls: AtomicU32,
    question_calls: AtomicU32,
    question_outcome: ConsumeOutcome,
}

impl RecordingAllowance {
    fn granting() -> Self {
        Self {
            session_calls: AtomicU32::new(0),
            question_calls: AtomicU32::new(0),
            question_outcome: ConsumeOutcome::granted(),
        }
    }

    fn failing_questions() -> Self {
        Self {
            question_outcome: ConsumeOutcome::denied(AllowanceErrorKind::Insufficient),
            ..Self::granting()
        }
    }
}

#[async_trait]
impl AllowanceService for RecordingAllowance {
    async fn consume(
        &self,
        _user: UserId,
        _program: ProgramId,
        kind: ActionKind,
        _metadata: serde_json::Value,
    ) -> ConsumeOutcome {
        match kind {
            ActionKind::Session => {
                self.session_calls.fetch_add(1, Ordering::SeqCst);
                ConsumeOutcome::granted()
            }
            ActionKind::Question => {
                self.question_calls.fetch_add(1, Ordering::SeqCst);
                self.question_outcome.clone()
            }
        }
    }
}

#[tokio::test]
async fn full_session_writes_one_summary() {
    let repo = seeded_repo(5);
    let allowance = Arc::new(RecordingAllowance::granting());
    let mut engine = build_engine(&repo, allowance.clone());

    let report = engine
        .start_practice(build_request(5, StudyMode::Zen))
        .await
        .unwrap();
    assert_eq!(report.total_questions, 5);
    assert!(report.notice.is_none());
    assert!(engine.is_practicing());
    assert_eq!(allowance.session_calls.load(Ordering::SeqCst), 1);

    let mut finished = None;
    for _ in 0..5 {
        let answered = engine.answer("A").await.unwrap();
        assert!(matches!(
            answered,
            AnswerReport::Recorded {
                is_correct: true,
                ..
            }
        ));
        match engine.advance().await.unwrap() {
            AdvanceOutcome::Advanced { .. } => {}
            AdvanceOutcome::Finished(results) => finished = Some(results),
        }
    }

    let results = finished.expect("session finished on the last advance");
    assert_eq!(results.total_answered, 5);
    assert_eq!(results.correct_answers, 5);
    assert_eq!(results.accuracy_percent, 100);
    // Zen fallback coefficients: 5 correct × 50 XP.
    assert_eq!(results.xp_earned, 250);

    let summaries = repo.summaries();
    assert_eq!(summaries.len(), 1, "summary written exactly once");
    assert_eq!(summaries[0].total_questions(), 5);
    assert_eq!(summaries[0].xp_earned(), 250);

    assert_eq!(allowance.question_calls.load(Ordering::SeqCst), 5);
    assert_eq!(repo.answers().len(), 5);
}

#[tokio::test]
async fn insufficient_allowance_keeps_selection_state() {
    let repo = seeded_repo(5);
    let mut engine = build_engine(
        &repo,
        Arc::new(StaticAllowance::denying(AllowanceErrorKind::Insufficient)),
    );

    let err = engine
        .start_practice(build_request(5, StudyMode::Zen))
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::InsufficientAllowance));
    assert!(engine.session().is_none(), "no question list was frozen");
}

#[tokio::test]
async fn non_insufficient_allowance_failure_does_not_block_start() {
    let repo = seeded_repo(3);
    let mut engine = build_engine(
        &repo,
        Arc::new(StaticAllowance::denying(AllowanceErrorKind::NotFound)),
    );

    let report = engine
        .start_practice(build_request(3, StudyMode::Zen))
        .await
        .unwrap();
    assert_eq!(report.total_questions, 3);
}

#[tokio::test]
async fn unlimited_caller_skips_the_gate() {
    let repo = seeded_repo(3);
    let mut engine = PracticeEngine::new(
        Clock::fixed(fixed_now()),
        Storage::from_repo(repo.clone()),
        Arc::new(StaticAllowance::denying(AllowanceErrorKind::Insufficient)),
        Arc::new(StaticAccess { unlimited: true }),
    );

    // The gate would deny, but unlimited access never consults it.
    engine
        .start_practice(build_request(3, StudyMode::Zen))
        .await
        .unwrap();
    engine.answer("A").await.unwrap();
}

#[tokio::test]
async fn hard_mode_uses_supplied_coefficients() {
    let repo = seeded_repo(2);
    let mut engine = build_engine(&repo, Arc::new(StaticAllowance::granting()))
        .with_coefficients_source(Arc::new(StaticCoefficients(RewardCoefficients {
            xp_per_correct_hard_mode: 100,
            coins_per_correct_hard_mode: 20,
            ..RewardCoefficients::default()
        })));

    engine
        .start_practice(build_request(2, StudyMode::Hard))
        .await
        .unwrap();

    let AnswerReport::Recorded { is_correct, reward } = engine.answer("A").await.unwrap() else {
        panic!("answer should be recorded");
    };
    assert!(is_correct);
    assert_eq!(reward.xp, 100);
    assert_eq!(reward.coins, 20);

    engine.advance().await.unwrap();
    let AnswerReport::Recorded { is_correct, reward } = engine.answer("B").await.unwrap() else {
        panic!("answer should be recorded");
    };
    assert!(!is_correct);
    assert_eq!(reward.xp, 0);
    assert_eq!(reward.coins, 0);
}

#[tokio::test]
async fn answers_are_write_once_at_the_engine_boundary() {
    let repo = seeded_repo(2);
    let mut engine = build_engine(&repo, Arc::new(StaticAllowance::granting()));
    engine
        .start_practice(build_request(2, StudyMode::Zen))
        .await
        .unwrap();

    engine.answer("B").await.unwrap();
    assert_eq!(
        engine.answer("A").await.unwrap(),
        AnswerReport::AlreadyAnswered
    );

    let session = engine.session().unwrap();
    assert_eq!(session.total_answered(), 1);
    assert_eq!(session.correct_count(), 0);
    // Only the first call reached the answer log.
    assert_eq!(repo.answers().len(), 1);
    assert_eq!(repo.answers()[0].chosen_label, "B");
}

#[tokio::test]
async fn per_answer_allowance_failure_is_swallowed() {
    let repo = seeded_repo(2);
    let allowance = Arc::new(RecordingAllowance::failing_questions());
    let mut engine = build_engine(&repo, allowance.clone());

    engine
        .start_practice(build_request(2, StudyMode::Zen))
        .await
        .unwrap();

    // The consume fails with `insufficient`, but mid-question the learner is
    // never interrupted: the answer and reward stand.
    let report = engine.answer("A").await.unwrap();
    assert!(matches!(
        report,
        AnswerReport::Recorded {
            is_correct: true,
            ..
        }
    ));
    assert_eq!(allowance.question_calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.session().unwrap().total_answered(), 1);
    assert_eq!(repo.answers().len(), 1);
}

#[tokio::test]
async fn timeout_advances_without_an_answer() {
    let repo = seeded_repo(2);
    let mut engine = build_engine(&repo, Arc::new(StaticAllowance::granting()));
    engine
        .start_practice(build_request(2, StudyMode::Hard))
        .await
        .unwrap();

    // External timer fires twice without any answer being recorded.
    engine.advance().await.unwrap();
    let AdvanceOutcome::Finished(results) = engine.advance().await.unwrap() else {
        panic!("second advance finishes the 2-question session");
    };
    assert_eq!(results.total_answered, 0);
    assert_eq!(results.xp_earned, 0);
    assert_eq!(repo.summaries().len(), 1);
}

#[tokio::test]
async fn free_practice_falls_back_when_nothing_matches() {
    let repo = seeded_repo(3);
    let mut engine = build_engine(&repo, Arc::new(StaticAllowance::granting()));

    let mut request = build_request(4, StudyMode::Zen);
    request.filters = FilterSet::new();
    request
        .filters
        .toggle_value(Facet::Subject, "Matéria Inexistente");

    let report = engine.start_practice(request).await.unwrap();
    assert_eq!(report.notice, Some(StartNotice::NoMatchesFallback));
    assert!(report.total_questions > 0);
    assert!(engine.is_practicing());
}

#[tokio::test]
async fn trail_with_no_matches_is_a_hard_stop() {
    let repo = seeded_repo(3);
    let mut engine = build_engine(&repo, Arc::new(StaticAllowance::granting()));

    let mut request = build_request(10, StudyMode::Zen);
    request.context = PracticeContext::Trail;
    request.filters = FilterSet::new();
    request
        .filters
        .toggle_value(Facet::Subject, "Matéria Inexistente");

    let err = engine.start_practice(request).await.unwrap_err();
    assert!(matches!(err, StartError::NoQuestions));
    assert!(engine.session().is_none());
}

#[tokio::test]
async fn notebook_start_merges_pinned_and_filtered() {
    let repo = seeded_repo(7);
    let owner = UserId::random();

    let mut filters = FilterSet::new();
    filters.toggle_value(Facet::Subject, "Direito Constitucional");
    let mut settings = NotebookSettings::default();
    settings.question_count = 4;

    let mut notebook = Notebook::new(
        NotebookId::random(),
        owner,
        "Meu caderno",
        None,
        filters,
        settings,
        7,
        fixed_now(),
    )
    .unwrap();
    notebook.set_saved_questions(vec![QuestionId::new(6), QuestionId::new(7)]);
    repo.insert_notebook(&notebook).await.unwrap();

    let mut engine = build_engine(&repo, Arc::new(StaticAllowance::granting()));
    let report = engine
        .start_from_notebook(&notebook, Some(ProgramId::random()))
        .await
        .unwrap();

    assert_eq!(report.total_questions, 4);
    let session = engine.session().unwrap();
    assert_eq!(session.mode(), StudyMode::Zen);
    assert_eq!(session.total_questions(), 4);
}

#[tokio::test]
async fn reset_returns_to_selection_and_allows_restart() {
    let repo = seeded_repo(3);
    let mut engine = build_engine(&repo, Arc::new(StaticAllowance::granting()));

    engine
        .start_practice(build_request(3, StudyMode::Zen))
        .await
        .unwrap();
    let err = engine
        .start_practice(build_request(3, StudyMode::Zen))
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::AlreadyPracticing));

    engine.answer("A").await.unwrap();
    engine.reset_session();
    assert!(engine.session().is_none());
    // Abandoning mid-practice wrote no summary.
    assert!(repo.summaries().is_empty());

    engine
        .start_practice(build_request(3, StudyMode::Zen))
        .await
        .unwrap();
    assert!(engine.is_practicing());
}
