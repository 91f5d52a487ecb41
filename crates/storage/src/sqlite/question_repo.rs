use log::debug;
use sqlx::{QueryBuilder, Row, Sqlite};

use prep_core::model::QuestionId;

use super::mapping::{map_question_row, question_id_to_i64, ser, string_list_to_json};
use super::SqliteRepository;
use crate::repository::{
    QuestionQuery, QuestionRecord, QuestionRepository, StorageError, DELETED_PROMPT_SENTINEL,
    REVIEWED_TRUTHY,
};

const QUESTION_COLUMNS: &str = "id, subject, topic, prompt, alternatives, correct_label, \
     comment, board, organization, role, year, education_level, modality, difficulty, \
     prompt_images, comment_images, reviewed, active";

fn push_in_list(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    qb.push(" AND ");
    qb.push(column);
    qb.push(" IN (");
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    qb.push(")");
}

/// Append the WHERE clause for a query: the baseline predicate, one
/// membership predicate per non-empty facet, and the toggle refinements.
fn push_predicates(qb: &mut QueryBuilder<'_, Sqlite>, query: &QuestionQuery) {
    qb.push(" WHERE active = 1 AND prompt IS NOT NULL AND prompt <> '' AND prompt <> ");
    qb.push_bind(DELETED_PROMPT_SENTINEL);

    push_in_list(qb, "subject", &query.subjects);
    push_in_list(qb, "topic", &query.topics);
    push_in_list(qb, "board", &query.boards);
    push_in_list(qb, "organization", &query.organizations);
    push_in_list(qb, "role", &query.roles);
    push_in_list(qb, "education_level", &query.education_levels);
    push_in_list(qb, "modality", &query.modalities);
    push_in_list(qb, "difficulty", &query.difficulty_labels);

    if !query.years.is_empty() {
        qb.push(" AND year IN (");
        let mut separated = qb.separated(", ");
        for year in &query.years {
            separated.push_bind(*year);
        }
        qb.push(")");
    }

    if query.reviewed_only {
        // The column mixes encodings; keep the explicit OR (see REVIEWED_TRUTHY).
        qb.push(" AND (");
        for (i, encoding) in REVIEWED_TRUTHY.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("reviewed = ");
            qb.push_bind(*encoding);
        }
        qb.push(")");
    }

    if query.with_comment_only {
        qb.push(" AND comment IS NOT NULL AND comment <> ''");
    }
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn fetch(&self, query: &QuestionQuery) -> Result<Vec<QuestionRecord>, StorageError> {
        let mut qb = QueryBuilder::new(format!("SELECT {QUESTION_COLUMNS} FROM questions"));
        push_predicates(&mut qb, query);
        qb.push(" ORDER BY id");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }

        let rows = qb
            .build()
            .fetch_all(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        debug!("question fetch returned {} rows", rows.len());

        rows.iter().map(map_question_row).collect()
    }

    async fn count(&self, query: &QuestionQuery) -> Result<u64, StorageError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) AS n FROM questions");
        push_predicates(&mut qb, query);

        let row = qb
            .build()
            .fetch_one(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let n: i64 = row.try_get("n").map_err(ser)?;
        u64::try_from(n).map_err(|_| StorageError::Serialization("negative count".into()))
    }

    async fn fetch_by_ids(
        &self,
        ids: &[QuestionId],
    ) -> Result<Vec<QuestionRecord>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::new(format!(
            "SELECT {QUESTION_COLUMNS} FROM questions \
             WHERE active = 1 AND prompt IS NOT NULL AND prompt <> '' AND prompt <> "
        ));
        qb.push_bind(DELETED_PROMPT_SENTINEL);
        qb.push(" AND id IN (");
        {
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(question_id_to_i64(*id)?);
            }
        }
        qb.push(") ORDER BY id");

        let rows = qb
            .build()
            .fetch_all(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_question_row).collect()
    }
}

impl SqliteRepository {
    /// Insert or replace one question record; used by seeding and tests.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    pub async fn upsert_question(&self, record: &QuestionRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT OR REPLACE INTO questions (
                    id, subject, topic, prompt, alternatives, correct_label,
                    comment, board, organization, role, year, education_level,
                    modality, difficulty, prompt_images, comment_images,
                    reviewed, active
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ",
        )
        .bind(question_id_to_i64(record.id)?)
        .bind(&record.subject)
        .bind(&record.topic)
        .bind(&record.prompt)
        .bind(&record.alternatives)
        .bind(&record.correct_label)
        .bind(&record.comment)
        .bind(&record.board)
        .bind(&record.organization)
        .bind(&record.role)
        .bind(record.year)
        .bind(&record.education_level)
        .bind(&record.modality)
        .bind(&record.difficulty)
        .bind(string_list_to_json(&record.prompt_images)?)
        .bind(string_list_to_json(&record.comment_images)?)
        .bind(&record.reviewed)
        .bind(i64::from(record.active))
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
