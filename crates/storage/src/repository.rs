use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracker_core::model::{
    ExamProgress, InternationalAdmit, PortfolioProject, Student, StudentDraft, StudentId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint (the student slug) was violated.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Insert shape for a student whose id is assigned by the backend.
#[derive(Debug, Clone)]
pub struct NewStudentRecord {
    pub full_name: String,
    pub academic_year: String,
    pub slug: String,
    pub exams: Vec<ExamProgress>,
    pub projects: Vec<PortfolioProject>,
    pub admits: Vec<InternationalAdmit>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewStudentRecord {
    /// Copy everything but the id from a validated student.
    #[must_use]
    pub fn from_student(student: &Student) -> Self {
        Self {
            full_name: student.full_name().to_owned(),
            academic_year: student.academic_year().to_owned(),
            slug: student.slug().to_owned(),
            exams: student.exams().copied().collect(),
            projects: student.projects().to_vec(),
            admits: student.admits().to_vec(),
            created_at: student.created_at(),
            updated_at: student.updated_at(),
        }
    }

    /// Bind the record to an assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored fields no longer
    /// validate.
    pub fn into_student(self, id: StudentId) -> Result<Student, StorageError> {
        let mut draft = StudentDraft::new(self.full_name, self.academic_year);
        for exam in self.exams {
            draft = draft.with_exam(exam);
        }
        draft.projects = self.projects;
        draft.admits = self.admits;
        Student::from_persisted(id, draft, self.slug, self.created_at, self.updated_at)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// Repository contract for students and their progress records.
#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Insert a new student and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the slug is already used.
    async fn insert_student(&self, student: NewStudentRecord) -> Result<StudentId, StorageError>;

    /// Replace a stored student, including exams, projects and admits.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, `StorageError::Conflict` if
    /// the new slug belongs to another student.
    async fn update_student(&self, student: &Student) -> Result<(), StorageError>;

    /// Fetch a student by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StorageError>;

    /// Fetch a student by public slug.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Student>, StorageError>;

    /// List students, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_students(&self, limit: u32) -> Result<Vec<Student>, StorageError>;

    /// Every slug currently assigned, optionally skipping one student's.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_slugs(&self, exclude: Option<StudentId>) -> Result<Vec<String>, StorageError>;

    /// Delete a student and everything attached to it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn delete_student(&self, id: StudentId) -> Result<(), StorageError>;
}

#[derive(Default)]
struct InMemoryState {
    next_id: u64,
    students: HashMap<StudentId, Student>,
}

impl InMemoryState {
    fn slug_owner(&self, slug: &str) -> Option<StudentId> {
        self.students
            .values()
            .find(|s| s.slug() == slug)
            .map(Student::id)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl StudentRepository for InMemoryRepository {
    async fn insert_student(&self, student: NewStudentRecord) -> Result<StudentId, StorageError> {
        let mut guard = self.lock()?;
        if guard.slug_owner(&student.slug).is_some() {
            return Err(StorageError::Conflict);
        }
        guard.next_id += 1;
        let id = StudentId::new(guard.next_id);
        let student = student.into_student(id)?;
        guard.students.insert(id, student);
        Ok(id)
    }

    async fn update_student(&self, student: &Student) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.students.contains_key(&student.id()) {
            return Err(StorageError::NotFound);
        }
        if guard
            .slug_owner(student.slug())
            .is_some_and(|owner| owner != student.id())
        {
            return Err(StorageError::Conflict);
        }
        guard.students.insert(student.id(), student.clone());
        Ok(())
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StorageError> {
        Ok(self.lock()?.students.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Student>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.students.values().find(|s| s.slug() == slug).cloned())
    }

    async fn list_students(&self, limit: u32) -> Result<Vec<Student>, StorageError> {
        let guard = self.lock()?;
        let mut students: Vec<Student> = guard.students.values().cloned().collect();
        students.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        students.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(students)
    }

    async fn list_slugs(&self, exclude: Option<StudentId>) -> Result<Vec<String>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .students
            .values()
            .filter(|s| Some(s.id()) != exclude)
            .map(|s| s.slug().to_owned())
            .collect())
    }

    async fn delete_student(&self, id: StudentId) -> Result<(), StorageError> {
        self.lock()?
            .students
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub students: Arc<dyn StudentRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let students: Arc<dyn StudentRepository> = Arc::new(InMemoryRepository::new());
        Self { students }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::model::{ExamKind, ProjectStatus};
    use tracker_core::progress::ProgressTriple;
    use tracker_core::time::fixed_now;

    fn record(name: &str, slug: &str) -> NewStudentRecord {
        let draft = StudentDraft::new(name, "2024-2025")
            .with_exam(
                ExamProgress::new(ExamKind::Ielts, ProgressTriple::new(5.0, 6.5, 7.5)).unwrap(),
            )
            .with_project(PortfolioProject::new("Robot", "", ProjectStatus::Completed).unwrap());
        let student = Student::from_draft(StudentId::new(1), draft, slug, fixed_now()).unwrap();
        NewStudentRecord::from_student(&student)
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_round_trips() {
        let repo = InMemoryRepository::new();
        let first = repo.insert_student(record("John Doe", "john-doe")).await.unwrap();
        let second = repo.insert_student(record("Jane Doe", "jane-doe")).await.unwrap();
        assert_ne!(first, second);

        let fetched = repo.get_student(first).await.unwrap().unwrap();
        assert_eq!(fetched.slug(), "john-doe");
        assert!(fetched.exam(ExamKind::Ielts).is_some());
        assert_eq!(fetched.projects().len(), 1);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_slug() {
        let repo = InMemoryRepository::new();
        repo.insert_student(record("John Doe", "john-doe")).await.unwrap();
        let err = repo
            .insert_student(record("John Doe", "john-doe"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn list_slugs_honours_exclusion() {
        let repo = InMemoryRepository::new();
        let john = repo.insert_student(record("John", "john")).await.unwrap();
        repo.insert_student(record("Jane", "jane")).await.unwrap();

        let mut all = repo.list_slugs(None).await.unwrap();
        all.sort();
        assert_eq!(all, vec!["jane".to_string(), "john".to_string()]);
        assert_eq!(repo.list_slugs(Some(john)).await.unwrap(), vec!["jane".to_string()]);
    }

    #[tokio::test]
    async fn update_checks_existence_and_slug_owner() {
        let repo = InMemoryRepository::new();
        let john = repo.insert_student(record("John", "john")).await.unwrap();
        repo.insert_student(record("Jane", "jane")).await.unwrap();

        let stored = repo.get_student(john).await.unwrap().unwrap();
        let stolen = stored
            .apply_draft(stored.to_draft(), "jane", fixed_now())
            .unwrap();
        assert!(matches!(
            repo.update_student(&stolen).await.unwrap_err(),
            StorageError::Conflict
        ));

        let renamed = stored
            .apply_draft(stored.to_draft(), "johnny", fixed_now())
            .unwrap();
        repo.update_student(&renamed).await.unwrap();
        assert!(repo.find_by_slug("johnny").await.unwrap().is_some());
        assert!(repo.find_by_slug("john").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_missing_student_is_not_found() {
        let repo = InMemoryRepository::new();
        assert!(matches!(
            repo.delete_student(StudentId::new(9)).await.unwrap_err(),
            StorageError::NotFound
        ));
    }
}
