use sqlx::Row;
use uuid::Uuid;

use prep_core::model::{NotebookId, QuestionId, UserId};

use crate::repository::{QuestionRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization("question_id overflow".into()))
}

pub(crate) fn user_id_from_text(raw: &str) -> Result<UserId, StorageError> {
    Uuid::parse_str(raw)
        .map(UserId::new)
        .map_err(|_| StorageError::Serialization(format!("invalid user_id: {raw}")))
}

pub(crate) fn notebook_id_from_text(raw: &str) -> Result<NotebookId, StorageError> {
    Uuid::parse_str(raw)
        .map(NotebookId::new)
        .map_err(|_| StorageError::Serialization(format!("invalid notebook_id: {raw}")))
}

/// Decode an optional JSON array of strings; NULL means empty.
pub(crate) fn string_list_from_json(raw: Option<String>) -> Result<Vec<String>, StorageError> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) if raw.is_empty() => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(&raw).map_err(ser),
    }
}

pub(crate) fn string_list_to_json(list: &[String]) -> Result<Option<String>, StorageError> {
    if list.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(list).map(Some).map_err(ser)
}

pub(crate) fn map_question_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<QuestionRecord, StorageError> {
    Ok(QuestionRecord {
        id: question_id_from_i64(row.try_get("id").map_err(ser)?)?,
        subject: row.try_get("subject").map_err(ser)?,
        topic: row.try_get("topic").map_err(ser)?,
        prompt: row.try_get("prompt").map_err(ser)?,
        alternatives: row.try_get("alternatives").map_err(ser)?,
        correct_label: row.try_get("correct_label").map_err(ser)?,
        comment: row.try_get("comment").map_err(ser)?,
        board: row.try_get("board").map_err(ser)?,
        organization: row.try_get("organization").map_err(ser)?,
        role: row.try_get("role").map_err(ser)?,
        year: row.try_get("year").map_err(ser)?,
        education_level: row.try_get("education_level").map_err(ser)?,
        modality: row.try_get("modality").map_err(ser)?,
        difficulty: row.try_get("difficulty").map_err(ser)?,
        prompt_images: string_list_from_json(row.try_get("prompt_images").map_err(ser)?)?,
        comment_images: string_list_from_json(row.try_get("comment_images").map_err(ser)?)?,
        reviewed: row.try_get("reviewed").map_err(ser)?,
        active: row.try_get::<i64, _>("active").map_err(ser)? != 0,
    })
}
