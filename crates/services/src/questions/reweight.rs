use std::collections::HashSet;

use log::warn;

use prep_core::model::{DifficultyLabel, Question, QuestionId, UserId};
use storage::repository::DifficultyRepository;

/// Re-rank a fetched list using per-user and community difficulty ratings.
///
/// Difficulty filtering is a preference, not a hard requirement: whenever it
/// would leave the learner with nothing (no rated ids, no overlap, or the
/// ratings store failing), the unfiltered input comes back instead.
///
/// Questions this user rated come first; community-rated ones follow. The
/// sort is stable, so the (possibly pre-shuffled) fetch order is the
/// tie-break within each group.
pub async fn reweight_by_difficulty(
    questions: Vec<Question>,
    labels: &[DifficultyLabel],
    user: UserId,
    ratings: &dyn DifficultyRepository,
) -> Vec<Question> {
    if labels.is_empty() {
        return questions;
    }

    let sets = match ratings.ids_by_difficulty(user, labels).await {
        Ok(sets) => sets,
        Err(err) => {
            warn!("difficulty ratings unavailable, keeping unfiltered list: {err}");
            return questions;
        }
    };

    let rated: HashSet<QuestionId> = sets
        .user_rated
        .iter()
        .chain(sets.community_rated.iter())
        .copied()
        .collect();
    if rated.is_empty() {
        return questions;
    }

    let (mut filtered, rest): (Vec<Question>, Vec<Question>) = questions
        .into_iter()
        .partition(|q| rated.contains(&q.id()));
    if filtered.is_empty() {
        return rest;
    }

    let user_rated: HashSet<QuestionId> = sets.user_rated.into_iter().collect();
    filtered.sort_by_key(|q| usize::from(!user_rated.contains(&q.id())));
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::model::{Alternative, QuestionId};
    use storage::repository::InMemoryRepository;

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

    fn ids(questions: &[Question]) -> Vec<u64> {
        questions.iter().map(|q| q.id().value()).collect()
    }

    #[tokio::test]
    async fn no_active_labels_is_identity() {
        let repo = InMemoryRepository::new();
        let input: Vec<Question> = (1..=4).map(build_question).collect();

        let output =
            reweight_by_difficulty(input.clone(), &[], UserId::random(), &repo).await;
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn user_rated_precede_community_rated_stably() {
        let repo = InMemoryRepository::new();
        let me = UserId::random();
        let other = UserId::random();

        repo.save_rating(QuestionId::new(2), DifficultyLabel::Hard, other)
            .await
            .unwrap();
        repo.save_rating(QuestionId::new(3), DifficultyLabel::Hard, me)
            .await
            .unwrap();
        repo.save_rating(QuestionId::new(5), DifficultyLabel::Hard, other)
            .await
            .unwrap();

        let input: Vec<Question> = [1, 2, 3, 4, 5].map(build_question).into();
        let output = reweight_by_difficulty(input, &[DifficultyLabel::Hard], me, &repo).await;

        // 1 and 4 are unrated and drop out; 3 is mine and leads; 2 and 5
        // keep their fetch order.
        assert_eq!(ids(&output), [3, 2, 5]);
    }

    #[tokio::test]
    async fn empty_overlap_falls_back_to_input() {
        let repo = InMemoryRepository::new();
        let me = UserId::random();
        repo.save_rating(QuestionId::new(99), DifficultyLabel::Easy, me)
            .await
            .unwrap();

        let input: Vec<Question> = (1..=3).map(build_question).collect();
        let output =
            reweight_by_difficulty(input.clone(), &[DifficultyLabel::Easy], me, &repo).await;
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn no_ratings_at_all_falls_back_to_input() {
        let repo = InMemoryRepository::new();
        let input: Vec<Question> = (1..=3).map(build_question).collect();
        let output = reweight_by_difficulty(
            input.clone(),
            &[DifficultyLabel::Medium],
            UserId::random(),
            &repo,
        )
        .await;
        assert_eq!(output, input);
    }
}
