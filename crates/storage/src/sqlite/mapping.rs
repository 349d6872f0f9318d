use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracker_core::model::{
    AdmitStatus, ExamKind, ExamProgress, InternationalAdmit, PortfolioProject, ProjectStatus,
    StudentId,
};
use tracker_core::progress::ProgressTriple;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map driver errors, turning unique-constraint hits into `Conflict`.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn student_id_from_i64(v: i64) -> Result<StudentId, StorageError> {
    u64::try_from(v)
        .map(StudentId::new)
        .map_err(|_| StorageError::Serialization("student_id sign overflow".into()))
}

pub(crate) fn student_id_to_i64(id: StudentId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("student_id overflow".into()))
}

pub(crate) fn map_exam_row(row: &SqliteRow) -> Result<ExamProgress, StorageError> {
    let kind: String = row.try_get("kind").map_err(ser)?;
    let kind = ExamKind::parse(&kind)
        .ok_or_else(|| StorageError::Serialization(format!("invalid exam kind: {kind}")))?;
    let triple = ProgressTriple::new(
        row.try_get("start_score").map_err(ser)?,
        row.try_get("current_score").map_err(ser)?,
        row.try_get("target_score").map_err(ser)?,
    );
    Ok(ExamProgress::from_persisted(kind, triple))
}

pub(crate) fn map_project_row(row: &SqliteRow) -> Result<PortfolioProject, StorageError> {
    let status = ProjectStatus::parse(&row.try_get::<String, _>("status").map_err(ser)?)
        .map_err(ser)?;
    PortfolioProject::new(
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<String, _>("description").map_err(ser)?,
        status,
    )
    .map_err(ser)
}

pub(crate) fn map_admit_row(row: &SqliteRow) -> Result<InternationalAdmit, StorageError> {
    let status =
        AdmitStatus::parse(&row.try_get::<String, _>("status").map_err(ser)?).map_err(ser)?;
    InternationalAdmit::new(
        row.try_get::<String, _>("program_name").map_err(ser)?,
        row.try_get::<String, _>("country").map_err(ser)?,
        status,
    )
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_ids_are_rejected() {
        assert!(student_id_from_i64(-1).is_err());
        assert_eq!(student_id_from_i64(7).unwrap(), StudentId::new(7));
    }

    #[test]
    fn oversized_ids_do_not_fit_sqlite() {
        assert!(student_id_to_i64(StudentId::new(u64::MAX)).is_err());
        assert_eq!(student_id_to_i64(StudentId::new(3)).unwrap(), 3);
    }
}
