use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use storage::repository::{NewStudentRecord, StorageError, StudentRepository};
use tracker_core::model::{Student, StudentDraft, StudentError, StudentId, StudentProfile};
use tracker_core::slug::{compose, disambiguate_at, is_valid_slug};

use crate::Clock;
use crate::error::StudentServiceError;

/// Result of a slug availability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlugCheck {
    /// The slug that would be assigned right now.
    pub slug: String,
    /// True when the composed base slug is free as-is.
    pub is_available: bool,
}

/// Orchestrates student creation, updates and slug assignment.
///
/// Slugs returned by `check_slug` are provisional; the storage layer's unique
/// constraint is what finally guarantees uniqueness on write.
#[derive(Clone)]
pub struct StudentService {
    clock: Clock,
    students: Arc<dyn StudentRepository>,
}

impl StudentService {
    #[must_use]
    pub fn new(clock: Clock, students: Arc<dyn StudentRepository>) -> Self {
        Self { clock, students }
    }

    /// Preview the slug a student would get from name and year.
    ///
    /// `exclude` is the id of a student being edited; its own slug does not
    /// count as a collision.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError::Student` if name or year is blank.
    /// Returns `StudentServiceError::Storage` if slugs cannot be listed.
    pub async fn check_slug(
        &self,
        full_name: &str,
        academic_year: &str,
        exclude: Option<StudentId>,
    ) -> Result<SlugCheck, StudentServiceError> {
        let draft = StudentDraft::new(full_name, academic_year);
        let (full_name, academic_year) = draft.required_fields()?;

        let base = compose(full_name, academic_year);
        let used = self.used_slugs(exclude).await?;
        let slug = disambiguate_at(&base, &used, None, &self.clock);

        Ok(SlugCheck {
            is_available: slug == base,
            slug,
        })
    }

    /// Validate and persist a new student, assigning a unique slug.
    ///
    /// A manual slug in the draft is used verbatim (after trimming) and must
    /// be free; otherwise one is derived from name and academic year.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError::Student` for validation failures.
    /// Returns `StudentServiceError::SlugTaken` if the slug is already used.
    /// Returns `StudentServiceError::Storage` if persistence fails.
    pub async fn create_student(
        &self,
        draft: StudentDraft,
    ) -> Result<StudentId, StudentServiceError> {
        draft.required_fields()?;
        let slug = self.resolve_slug(&draft, None).await?;

        let student = Student::from_draft(StudentId::new(0), draft, slug, self.clock.now())?;
        let id = self
            .students
            .insert_student(NewStudentRecord::from_student(&student))
            .await
            .map_err(|e| slug_conflict(e, student.slug()))?;

        log::info!("created student {id} with slug `{}`", student.slug());
        Ok(id)
    }

    /// Replace a student's editable fields.
    ///
    /// Without a manual slug the slug is re-derived from the new name and
    /// year, ignoring the student's current slug during collision checks.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError::NotFound` if the student does not exist.
    /// Other variants as for [`StudentService::create_student`].
    pub async fn update_student(
        &self,
        id: StudentId,
        draft: StudentDraft,
    ) -> Result<Student, StudentServiceError> {
        let current = self
            .students
            .get_student(id)
            .await?
            .ok_or(StudentServiceError::NotFound)?;

        draft.required_fields()?;
        let slug = self.resolve_slug(&draft, Some(&current)).await?;
        let updated = current.apply_draft(draft, slug, self.clock.now())?;

        self.students
            .update_student(&updated)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => StudentServiceError::NotFound,
                other => slug_conflict(other, updated.slug()),
            })?;

        if updated.slug() != current.slug() {
            log::info!(
                "student {id} slug changed `{}` -> `{}`",
                current.slug(),
                updated.slug()
            );
        }
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `StudentServiceError::Storage` if repository access fails.
    pub async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StudentServiceError> {
        Ok(self.students.get_student(id).await?)
    }

    /// List students, newest first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError::Storage` if repository access fails.
    pub async fn list_students(&self, limit: u32) -> Result<Vec<Student>, StudentServiceError> {
        Ok(self.students.list_students(limit).await?)
    }

    /// # Errors
    ///
    /// Returns `StudentServiceError::NotFound` if the student does not exist.
    pub async fn delete_student(&self, id: StudentId) -> Result<(), StudentServiceError> {
        self.students.delete_student(id).await.map_err(|e| match e {
            StorageError::NotFound => StudentServiceError::NotFound,
            other => other.into(),
        })?;
        log::info!("deleted student {id}");
        Ok(())
    }

    /// Public profile lookup for the `/{slug}` page.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError::Storage` if repository access fails.
    pub async fn profile_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<StudentProfile>, StudentServiceError> {
        let student = self.students.find_by_slug(slug.trim()).await?;
        Ok(student.as_ref().map(StudentProfile::from_student))
    }

    async fn used_slugs(
        &self,
        exclude: Option<StudentId>,
    ) -> Result<HashSet<String>, StudentServiceError> {
        Ok(self
            .students
            .list_slugs(exclude)
            .await?
            .into_iter()
            .collect())
    }

    async fn resolve_slug(
        &self,
        draft: &StudentDraft,
        current: Option<&Student>,
    ) -> Result<String, StudentServiceError> {
        if let Some(manual) = draft.manual_slug() {
            if !is_valid_slug(manual) {
                return Err(StudentError::InvalidSlug(manual.to_string()).into());
            }
            if current.is_some_and(|s| s.slug() == manual) {
                return Ok(manual.to_string());
            }
            if self.students.find_by_slug(manual).await?.is_some() {
                log::warn!("rejected manual slug `{manual}`: already in use");
                return Err(StudentServiceError::SlugTaken(manual.to_string()));
            }
            return Ok(manual.to_string());
        }

        let (full_name, academic_year) = draft.required_fields()?;
        let base = compose(full_name, academic_year);
        let used = self.used_slugs(current.map(Student::id)).await?;
        Ok(disambiguate_at(
            &base,
            &used,
            current.map(Student::slug),
            &self.clock,
        ))
    }
}

fn slug_conflict(err: StorageError, slug: &str) -> StudentServiceError {
    match err {
        StorageError::Conflict => {
            log::warn!("slug `{slug}` was taken before the write completed");
            StudentServiceError::SlugTaken(slug.to_string())
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::InMemoryRepository;
    use tracker_core::model::{ExamKind, ExamProgress};
    use tracker_core::progress::ProgressTriple;
    use tracker_core::time::fixed_clock;

    fn service() -> StudentService {
        StudentService::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn create_derives_slug_from_name_and_year() {
        let service = service();
        let id = service
            .create_student(StudentDraft::new("John Doe", "2024-2025"))
            .await
            .unwrap();
        let student = service.get_student(id).await.unwrap().unwrap();
        assert_eq!(student.slug(), "john-doe-2024-2025");
    }

    #[tokio::test]
    async fn create_disambiguates_colliding_names() {
        let service = service();
        let mut slugs = Vec::new();
        for _ in 0..3 {
            let id = service
                .create_student(StudentDraft::new("John Doe", "2024-2025"))
                .await
                .unwrap();
            slugs.push(service.get_student(id).await.unwrap().unwrap().slug().to_string());
        }
        assert_eq!(
            slugs,
            vec![
                "john-doe-2024-2025",
                "john-doe-2024-2025-2",
                "john-doe-2024-2025-3"
            ]
        );
    }

    #[tokio::test]
    async fn create_rejects_blank_required_fields() {
        let err = service()
            .create_student(StudentDraft::new("  ", "2024"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StudentServiceError::Student(StudentError::EmptyFullName)
        ));
    }

    #[tokio::test]
    async fn manual_slug_must_be_valid_and_free() {
        let service = service();
        service
            .create_student(StudentDraft::new("John", "2024").with_slug(" custom "))
            .await
            .unwrap();

        let err = service
            .create_student(StudentDraft::new("Jane", "2024").with_slug("custom"))
            .await
            .unwrap_err();
        assert!(matches!(err, StudentServiceError::SlugTaken(ref s) if s == "custom"));

        let err = service
            .create_student(StudentDraft::new("Jane", "2024").with_slug("Not A Slug"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StudentServiceError::Student(StudentError::InvalidSlug(_))
        ));
    }

    #[tokio::test]
    async fn check_slug_reports_availability() {
        let service = service();
        let first = service.check_slug("John Doe", "2024-2025", None).await.unwrap();
        assert_eq!(
            first,
            SlugCheck {
                slug: "john-doe-2024-2025".into(),
                is_available: true
            }
        );

        let id = service
            .create_student(StudentDraft::new("John Doe", "2024-2025"))
            .await
            .unwrap();
        let taken = service.check_slug("John Doe", "2024-2025", None).await.unwrap();
        assert_eq!(taken.slug, "john-doe-2024-2025-2");
        assert!(!taken.is_available);

        let editing = service
            .check_slug("John Doe", "2024-2025", Some(id))
            .await
            .unwrap();
        assert!(editing.is_available);
    }

    #[tokio::test]
    async fn update_keeps_own_slug_and_rederives_on_rename() {
        let service = service();
        let id = service
            .create_student(StudentDraft::new("John Doe", "2024-2025"))
            .await
            .unwrap();

        let same = service
            .update_student(id, StudentDraft::new("John Doe", "2024-2025"))
            .await
            .unwrap();
        assert_eq!(same.slug(), "john-doe-2024-2025");

        let renamed = service
            .update_student(id, StudentDraft::new("John Smith", "2024-2025"))
            .await
            .unwrap();
        assert_eq!(renamed.slug(), "john-smith-2024-2025");
    }

    #[tokio::test]
    async fn update_accepts_current_manual_slug() {
        let service = service();
        let id = service
            .create_student(StudentDraft::new("John", "2024").with_slug("jd"))
            .await
            .unwrap();
        let updated = service
            .update_student(
                id,
                StudentDraft::new("John", "2024")
                    .with_slug("jd")
                    .with_exam(
                        ExamProgress::new(ExamKind::Ielts, ProgressTriple::new(5.0, 6.0, 7.0))
                            .unwrap(),
                    ),
            )
            .await
            .unwrap();
        assert_eq!(updated.slug(), "jd");
        assert!(updated.exam(ExamKind::Ielts).is_some());
    }

    #[tokio::test]
    async fn update_missing_student_is_not_found() {
        let err = service()
            .update_student(StudentId::new(99), StudentDraft::new("A", "B"))
            .await
            .unwrap_err();
        assert!(matches!(err, StudentServiceError::NotFound));
    }

    #[tokio::test]
    async fn profile_by_slug_returns_progress_view() {
        let service = service();
        service
            .create_student(StudentDraft::new("John Doe", "2024-2025").with_exam(
                ExamProgress::new(ExamKind::Ielts, ProgressTriple::new(5.0, 6.5, 7.5)).unwrap(),
            ))
            .await
            .unwrap();

        let profile = service
            .profile_by_slug("john-doe-2024-2025")
            .await
            .unwrap()
            .unwrap();
        let ielts = profile.ielts.unwrap();
        assert!((ielts.progress - 60.0).abs() < 1e-9);
        assert!((ielts.remaining - 40.0).abs() < 1e-9);

        assert!(service.profile_by_slug("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_then_delete_again_is_not_found() {
        let service = service();
        let id = service
            .create_student(StudentDraft::new("A", "2024"))
            .await
            .unwrap();
        service.delete_student(id).await.unwrap();
        assert!(matches!(
            service.delete_student(id).await.unwrap_err(),
            StudentServiceError::NotFound
        ));
    }
}
