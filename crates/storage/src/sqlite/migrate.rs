use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema (questions, difficulty ratings, notebooks with
/// pinned questions, the answer log, and practice session summaries).
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER PRIMARY KEY,
                    subject TEXT NOT NULL,
                    topic TEXT,
                    prompt TEXT NOT NULL,
                    alternatives TEXT NOT NULL,
                    correct_label TEXT NOT NULL,
                    comment TEXT,
                    board TEXT,
                    organization TEXT,
                    role TEXT,
                    year INTEGER,
                    education_level TEXT,
                    modality TEXT,
                    difficulty TEXT,
                    prompt_images TEXT,
                    comment_images TEXT,
                    reviewed TEXT,
                    active INTEGER NOT NULL DEFAULT 1
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_subject
                    ON questions(subject);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS difficulty_ratings (
                    question_id INTEGER NOT NULL,
                    user_id TEXT NOT NULL,
                    label TEXT NOT NULL CHECK (label IN ('easy', 'medium', 'hard')),
                    PRIMARY KEY (question_id, user_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS notebooks (
                    id TEXT PRIMARY KEY,
                    owner TEXT NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT,
                    filters TEXT NOT NULL,
                    settings TEXT NOT NULL,
                    question_pool_count INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS notebook_questions (
                    notebook_id TEXT NOT NULL,
                    question_id INTEGER NOT NULL,
                    position INTEGER NOT NULL,
                    PRIMARY KEY (notebook_id, question_id),
                    FOREIGN KEY (notebook_id) REFERENCES notebooks(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS answer_log (
                    id INTEGER PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    question_id INTEGER NOT NULL,
                    chosen_label TEXT NOT NULL,
                    is_correct INTEGER NOT NULL,
                    time_spent_seconds INTEGER,
                    answered_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS practice_sessions (
                    id INTEGER PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    study_mode TEXT NOT NULL CHECK (study_mode IN ('zen', 'hard')),
                    total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
                    correct_answers INTEGER NOT NULL CHECK (correct_answers >= 0),
                    wrong_answers INTEGER NOT NULL CHECK (wrong_answers >= 0),
                    time_spent_seconds INTEGER NOT NULL,
                    filters TEXT NOT NULL,
                    toggles TEXT NOT NULL,
                    xp_earned INTEGER NOT NULL,
                    started_at TEXT NOT NULL,
                    completed_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
            .bind(1_i64)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
    }

    Ok(())
}
