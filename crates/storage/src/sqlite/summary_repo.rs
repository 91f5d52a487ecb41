use prep_core::model::SessionSummary;

use super::mapping::{question_id_to_i64, ser};
use super::SqliteRepository;
use crate::repository::{
    AnswerLogRepository, AnswerRecord, SessionSummaryRepository, StorageError,
};

#[async_trait::async_trait]
impl AnswerLogRepository for SqliteRepository {
    async fn append_answer(&self, record: &AnswerRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO answer_log (
                    user_id, question_id, chosen_label, is_correct,
                    time_spent_seconds, answered_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(record.user_id.to_string())
        .bind(question_id_to_i64(record.question_id)?)
        .bind(&record.chosen_label)
        .bind(i64::from(record.is_correct))
        .bind(record.time_spent_seconds.map(i64::from))
        .bind(record.answered_at)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionSummaryRepository for SqliteRepository {
    async fn append_summary(&self, summary: &SessionSummary) -> Result<i64, StorageError> {
        let filters = serde_json::to_string(summary.filters()).map_err(ser)?;
        let toggles = serde_json::to_string(summary.toggles()).map_err(ser)?;
        let time_spent = i64::try_from(summary.time_spent_seconds())
            .map_err(|_| StorageError::Serialization("time_spent overflow".into()))?;

        let res = sqlx::query(
            r"
                INSERT INTO practice_sessions (
                    user_id, study_mode, total_questions, correct_answers,
                    wrong_answers, time_spent_seconds, filters, toggles,
                    xp_earned, started_at, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(summary.user_id().to_string())
        .bind(summary.mode().as_str())
        .bind(i64::from(summary.total_questions()))
        .bind(i64::from(summary.correct_answers()))
        .bind(i64::from(summary.wrong_answers()))
        .bind(time_spent)
        .bind(filters)
        .bind(toggles)
        .bind(i64::from(summary.xp_earned()))
        .bind(summary.started_at())
        .bind(summary.completed_at())
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.last_insert_rowid())
    }
}
