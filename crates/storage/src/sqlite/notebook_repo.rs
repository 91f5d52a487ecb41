use sqlx::Row;

use prep_core::model::{Notebook, NotebookId, NotebookSettings, QuestionId, UserId};

use super::mapping::{
    notebook_id_from_text, question_id_from_i64, question_id_to_i64, ser, user_id_from_text,
};
use super::SqliteRepository;
use crate::repository::{NotebookRepository, StorageError};

fn map_notebook_row(row: &sqlx::sqlite::SqliteRow) -> Result<Notebook, StorageError> {
    let id = notebook_id_from_text(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let owner = user_id_from_text(&row.try_get::<String, _>("owner").map_err(ser)?)?;
    let title: String = row.try_get("title").map_err(ser)?;
    let description: Option<String> = row.try_get("description").map_err(ser)?;
    let filters = serde_json::from_str(&row.try_get::<String, _>("filters").map_err(ser)?)
        .map_err(ser)?;
    let settings: NotebookSettings =
        serde_json::from_str(&row.try_get::<String, _>("settings").map_err(ser)?).map_err(ser)?;
    let question_pool_count: i64 = row.try_get("question_pool_count").map_err(ser)?;
    let created_at = row.try_get("created_at").map_err(ser)?;

    Notebook::new(
        id,
        owner,
        title,
        description,
        filters,
        settings,
        u64::try_from(question_pool_count).unwrap_or(0),
        created_at,
    )
    .map_err(ser)
}

impl SqliteRepository {
    async fn replace_saved_questions(
        &self,
        id: NotebookId,
        ids: &[QuestionId],
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM notebook_questions WHERE notebook_id = ?1")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for (position, question_id) in ids.iter().enumerate() {
            sqlx::query(
                r"
                    INSERT INTO notebook_questions (notebook_id, question_id, position)
                    VALUES (?1, ?2, ?3)
                ",
            )
            .bind(id.to_string())
            .bind(question_id_to_i64(*question_id)?)
            .bind(position as i64)
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }
        Ok(())
    }

    async fn load_saved_questions(&self, id: NotebookId) -> Result<Vec<QuestionId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT question_id FROM notebook_questions
                WHERE notebook_id = ?1
                ORDER BY position
            ",
        )
        .bind(id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter()
            .map(|row| question_id_from_i64(row.try_get("question_id").map_err(ser)?))
            .collect()
    }
}

#[async_trait::async_trait]
impl NotebookRepository for SqliteRepository {
    async fn insert_notebook(&self, notebook: &Notebook) -> Result<(), StorageError> {
        let filters = serde_json::to_string(notebook.filters()).map_err(ser)?;
        let settings = serde_json::to_string(notebook.settings()).map_err(ser)?;
        let pool_count = i64::try_from(notebook.question_pool_count())
            .map_err(|_| StorageError::Serialization("question_pool_count overflow".into()))?;

        let res = sqlx::query(
            r"
                INSERT OR IGNORE INTO notebooks (
                    id, owner, title, description, filters, settings,
                    question_pool_count, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(notebook.id().to_string())
        .bind(notebook.owner().to_string())
        .bind(notebook.title())
        .bind(notebook.description())
        .bind(filters)
        .bind(settings)
        .bind(pool_count)
        .bind(notebook.created_at())
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        self.replace_saved_questions(notebook.id(), notebook.saved_question_ids())
            .await
    }

    async fn get_notebook(
        &self,
        id: NotebookId,
        owner: UserId,
    ) -> Result<Option<Notebook>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, owner, title, description, filters, settings,
                       question_pool_count, created_at
                FROM notebooks
                WHERE id = ?1 AND owner = ?2
            ",
        )
        .bind(id.to_string())
        .bind(owner.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut notebook = map_notebook_row(&row)?;
        notebook.set_saved_questions(self.load_saved_questions(id).await?);
        Ok(Some(notebook))
    }

    async fn list_notebooks(&self, owner: UserId) -> Result<Vec<Notebook>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, owner, title, description, filters, settings,
                       question_pool_count, created_at
                FROM notebooks
                WHERE owner = ?1
                ORDER BY created_at, id
            ",
        )
        .bind(owner.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut notebooks = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut notebook = map_notebook_row(row)?;
            notebook.set_saved_questions(self.load_saved_questions(notebook.id()).await?);
            notebooks.push(notebook);
        }
        Ok(notebooks)
    }

    async fn update_notebook(&self, notebook: &Notebook) -> Result<(), StorageError> {
        let filters = serde_json::to_string(notebook.filters()).map_err(ser)?;
        let settings = serde_json::to_string(notebook.settings()).map_err(ser)?;
        let pool_count = i64::try_from(notebook.question_pool_count())
            .map_err(|_| StorageError::Serialization("question_pool_count overflow".into()))?;

        let res = sqlx::query(
            r"
                UPDATE notebooks
                SET title = ?3, description = ?4, filters = ?5, settings = ?6,
                    question_pool_count = ?7
                WHERE id = ?1 AND owner = ?2
            ",
        )
        .bind(notebook.id().to_string())
        .bind(notebook.owner().to_string())
        .bind(notebook.title())
        .bind(notebook.description())
        .bind(filters)
        .bind(settings)
        .bind(pool_count)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        self.replace_saved_questions(notebook.id(), notebook.saved_question_ids())
            .await
    }

    async fn delete_notebook(&self, id: NotebookId, owner: UserId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM notebooks WHERE id = ?1 AND owner = ?2")
            .bind(id.to_string())
            .bind(owner.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn saved_question_ids(&self, id: NotebookId) -> Result<Vec<QuestionId>, StorageError> {
        self.load_saved_questions(id).await
    }
}
