use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracker_core::model::{
    ExamProgress, InternationalAdmit, PortfolioProject, Student, StudentId,
};

use super::SqliteRepository;
use super::mapping::{
    db_err, map_admit_row, map_exam_row, map_project_row, ser, student_id_from_i64,
    student_id_to_i64,
};
use crate::repository::{NewStudentRecord, StorageError, StudentRepository};

const STUDENT_COLUMNS: &str = "id, full_name, academic_year, slug, created_at, updated_at";

/// Replace exams, projects and admits of one student.
async fn write_children(
    conn: &mut SqliteConnection,
    student_id: i64,
    exams: &[ExamProgress],
    projects: &[PortfolioProject],
    admits: &[InternationalAdmit],
) -> Result<(), StorageError> {
    for table in ["exam_progress", "portfolio_projects", "international_admits"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE student_id = ?1"))
            .bind(student_id)
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;
    }

    for exam in exams {
        let triple = exam.triple();
        sqlx::query(
            r"
            INSERT INTO exam_progress (student_id, kind, start_score, current_score, target_score)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(student_id)
        .bind(exam.kind().as_str())
        .bind(triple.start)
        .bind(triple.current)
        .bind(triple.target)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }

    for (position, project) in (0_i64..).zip(projects) {
        sqlx::query(
            r"
            INSERT INTO portfolio_projects (student_id, position, title, description, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(student_id)
        .bind(position)
        .bind(project.title())
        .bind(project.description())
        .bind(project.status().as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }

    for (position, admit) in (0_i64..).zip(admits) {
        sqlx::query(
            r"
            INSERT INTO international_admits (student_id, position, program_name, country, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(student_id)
        .bind(position)
        .bind(admit.program_name())
        .bind(admit.country())
        .bind(admit.status().as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }

    Ok(())
}

/// Columns of the `students` row itself, read before loading children.
struct StudentHead {
    raw_id: i64,
    full_name: String,
    academic_year: String,
    slug: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl StudentHead {
    fn from_row(row: &SqliteRow) -> Result<Self, StorageError> {
        Ok(Self {
            raw_id: row.try_get("id").map_err(ser)?,
            full_name: row.try_get("full_name").map_err(ser)?,
            academic_year: row.try_get("academic_year").map_err(ser)?,
            slug: row.try_get("slug").map_err(ser)?,
            created_at: row.try_get("created_at").map_err(ser)?,
            updated_at: row.try_get("updated_at").map_err(ser)?,
        })
    }
}

impl SqliteRepository {
    async fn hydrate(&self, head: StudentHead) -> Result<Student, StorageError> {
        let id = student_id_from_i64(head.raw_id)?;

        let exams = sqlx::query(
            r"
            SELECT kind, start_score, current_score, target_score
            FROM exam_progress WHERE student_id = ?1
            ",
        )
        .bind(head.raw_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(map_exam_row)
        .collect::<Result<Vec<_>, _>>()?;

        let projects = sqlx::query(
            r"
            SELECT title, description, status
            FROM portfolio_projects WHERE student_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(head.raw_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(map_project_row)
        .collect::<Result<Vec<_>, _>>()?;

        let admits = sqlx::query(
            r"
            SELECT program_name, country, status
            FROM international_admits WHERE student_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(head.raw_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(map_admit_row)
        .collect::<Result<Vec<_>, _>>()?;

        NewStudentRecord {
            full_name: head.full_name,
            academic_year: head.academic_year,
            slug: head.slug,
            exams,
            projects,
            admits,
            created_at: head.created_at,
            updated_at: head.updated_at,
        }
        .into_student(id)
    }

    async fn hydrate_optional(
        &self,
        row: Option<SqliteRow>,
    ) -> Result<Option<Student>, StorageError> {
        let head = row.as_ref().map(StudentHead::from_row).transpose()?;
        match head {
            Some(head) => self.hydrate(head).await.map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl StudentRepository for SqliteRepository {
    async fn insert_student(&self, student: NewStudentRecord) -> Result<StudentId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            r"
            INSERT INTO students (full_name, academic_year, slug, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(&student.full_name)
        .bind(&student.academic_year)
        .bind(&student.slug)
        .bind(student.created_at)
        .bind(student.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let raw_id = res.last_insert_rowid();
        write_children(
            &mut tx,
            raw_id,
            &student.exams,
            &student.projects,
            &student.admits,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;

        student_id_from_i64(raw_id)
    }

    async fn update_student(&self, student: &Student) -> Result<(), StorageError> {
        let raw_id = student_id_to_i64(student.id())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            r"
            UPDATE students
            SET full_name = ?2, academic_year = ?3, slug = ?4, updated_at = ?5
            WHERE id = ?1
            ",
        )
        .bind(raw_id)
        .bind(student.full_name())
        .bind(student.academic_year())
        .bind(student.slug())
        .bind(student.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let exams: Vec<ExamProgress> = student.exams().copied().collect();
        write_children(&mut tx, raw_id, &exams, student.projects(), student.admits()).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StorageError> {
        let row = sqlx::query(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"))
            .bind(student_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        self.hydrate_optional(row).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Student>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE slug = ?1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        self.hydrate_optional(row).await
    }

    async fn list_students(&self, limit: u32) -> Result<Vec<Student>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let heads = rows
            .iter()
            .map(StudentHead::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        drop(rows);

        let mut students = Vec::with_capacity(heads.len());
        for head in heads {
            students.push(self.hydrate(head).await?);
        }
        Ok(students)
    }

    async fn list_slugs(&self, exclude: Option<StudentId>) -> Result<Vec<String>, StorageError> {
        let exclude = exclude.map(student_id_to_i64).transpose()?;
        let rows = sqlx::query(
            r"
            SELECT slug FROM students
            WHERE ?1 IS NULL OR id <> ?1
            ",
        )
        .bind(exclude)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("slug").map_err(ser))
            .collect()
    }

    async fn delete_student(&self, id: StudentId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM students WHERE id = ?1")
            .bind(student_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
