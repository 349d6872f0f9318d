use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies pending schema versions, recording each in `schema_migrations`.
///
/// Version 1 creates students with a unique slug plus their exam progress,
/// portfolio projects and international admits.
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

    if is_applied(pool, 1).await? {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS students (
                id INTEGER PRIMARY KEY,
                full_name TEXT NOT NULL,
                academic_year TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS exam_progress (
                student_id INTEGER NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('ielts', 'sat_english', 'sat_math')),
                start_score REAL NOT NULL,
                current_score REAL NOT NULL,
                target_score REAL NOT NULL,
                PRIMARY KEY (student_id, kind),
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS portfolio_projects (
                id INTEGER PRIMARY KEY,
                student_id INTEGER NOT NULL,
                position INTEGER NOT NULL CHECK (position >= 0),
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('PLANNED', 'IN_PROGRESS', 'COMPLETED')),
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS international_admits (
                id INTEGER PRIMARY KEY,
                student_id INTEGER NOT NULL,
                position INTEGER NOT NULL CHECK (position >= 0),
                program_name TEXT NOT NULL,
                country TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('PENDING', 'OFFERED', 'ENROLLED', 'REJECTED')),
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_students_created
                ON students (created_at, id);
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_projects_student_position
                ON portfolio_projects (student_id, position);
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_admits_student_position
                ON international_admits (student_id, position);
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(1_i64)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    log::info!("applied schema migration v1");

    Ok(())
}
