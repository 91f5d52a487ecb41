use sqlx::{QueryBuilder, Row, Sqlite};

use prep_core::model::{DifficultyLabel, QuestionId, UserId};

use super::mapping::{question_id_from_i64, question_id_to_i64, ser};
use super::SqliteRepository;
use crate::repository::{DifficultyIdSets, DifficultyRepository, StorageError};

#[async_trait::async_trait]
impl DifficultyRepository for SqliteRepository {
    async fn ids_by_difficulty(
        &self,
        user: UserId,
        labels: &[DifficultyLabel],
    ) -> Result<DifficultyIdSets, StorageError> {
        if labels.is_empty() {
            return Ok(DifficultyIdSets::default());
        }

        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT question_id, user_id FROM difficulty_ratings WHERE label IN (");
        {
            let mut separated = qb.separated(", ");
            for label in labels {
                separated.push_bind(label.as_str());
            }
        }
        qb.push(") ORDER BY question_id");

        let rows = qb
            .build()
            .fetch_all(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let user_text = user.to_string();
        let mut sets = DifficultyIdSets::default();
        for row in &rows {
            let question_id = question_id_from_i64(row.try_get("question_id").map_err(ser)?)?;
            let rated_by: String = row.try_get("user_id").map_err(ser)?;
            if rated_by == user_text {
                sets.user_rated.push(question_id);
            } else {
                sets.community_rated.push(question_id);
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
        sqlx::query(
            r"
                INSERT INTO difficulty_ratings (question_id, user_id, label)
                VALUES (?1, ?2, ?3)
                ON CONFLICT (question_id, user_id) DO UPDATE SET label = excluded.label
            ",
        )
        .bind(question_id_to_i64(question)?)
        .bind(user.to_string())
        .bind(label.as_str())
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
