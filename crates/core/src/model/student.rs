use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::exam::{ExamKind, ExamProgress, ScoreError};
use crate::model::ids::StudentId;
use crate::model::milestone::{InternationalAdmit, MilestoneError, PortfolioProject};
use crate::slug::is_valid_slug;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum StudentError {
    #[error("full name is required")]
    EmptyFullName,

    #[error("academic year is required")]
    EmptyAcademicYear,

    #[error("slug must be lowercase kebab-case: {0:?}")]
    InvalidSlug(String),

    #[error("{found} progress supplied where {expected} was expected")]
    ExamMismatch { expected: ExamKind, found: ExamKind },

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Milestone(#[from] MilestoneError),
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated student data as submitted by the admin form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentDraft {
    pub full_name: String,
    pub academic_year: String,
    /// Manually chosen slug; blank means "derive from name and year".
    pub slug: Option<String>,
    pub ielts: Option<ExamProgress>,
    pub sat_english: Option<ExamProgress>,
    pub sat_math: Option<ExamProgress>,
    pub projects: Vec<PortfolioProject>,
    pub admits: Vec<InternationalAdmit>,
}

impl StudentDraft {
    #[must_use]
    pub fn new(full_name: impl Into<String>, academic_year: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            academic_year: academic_year.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Put `progress` into the slot matching its exam.
    #[must_use]
    pub fn with_exam(mut self, progress: ExamProgress) -> Self {
        *self.exam_slot(progress.kind()) = Some(progress);
        self
    }

    #[must_use]
    pub fn with_project(mut self, project: PortfolioProject) -> Self {
        self.projects.push(project);
        self
    }

    #[must_use]
    pub fn with_admit(mut self, admit: InternationalAdmit) -> Self {
        self.admits.push(admit);
        self
    }

    fn exam_slot(&mut self, kind: ExamKind) -> &mut Option<ExamProgress> {
        match kind {
            ExamKind::Ielts => &mut self.ielts,
            ExamKind::SatEnglish => &mut self.sat_english,
            ExamKind::SatMath => &mut self.sat_math,
        }
    }

    /// Trimmed full name and academic year.
    ///
    /// # Errors
    ///
    /// Returns `StudentError::EmptyFullName` / `EmptyAcademicYear` when blank.
    pub fn required_fields(&self) -> Result<(&str, &str), StudentError> {
        let full_name = self.full_name.trim();
        if full_name.is_empty() {
            return Err(StudentError::EmptyFullName);
        }
        let academic_year = self.academic_year.trim();
        if academic_year.is_empty() {
            return Err(StudentError::EmptyAcademicYear);
        }
        Ok((full_name, academic_year))
    }

    /// The trimmed manual slug, if one was actually entered.
    #[must_use]
    pub fn manual_slug(&self) -> Option<&str> {
        self.slug.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn check_exam_slots(&self) -> Result<(), StudentError> {
        for (expected, slot) in [
            (ExamKind::Ielts, &self.ielts),
            (ExamKind::SatEnglish, &self.sat_english),
            (ExamKind::SatMath, &self.sat_math),
        ] {
            if let Some(found) = slot.map(|p| p.kind()).filter(|k| *k != expected) {
                return Err(StudentError::ExamMismatch { expected, found });
            }
        }
        Ok(())
    }
}

//
// ─── STUDENT ───────────────────────────────────────────────────────────────────
//

/// A tracked student with a unique public slug.
#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    id: StudentId,
    full_name: String,
    academic_year: String,
    slug: String,
    ielts: Option<ExamProgress>,
    sat_english: Option<ExamProgress>,
    sat_math: Option<ExamProgress>,
    projects: Vec<PortfolioProject>,
    admits: Vec<InternationalAdmit>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Student {
    /// Validate a draft and bind it to an id and a resolved slug.
    ///
    /// # Errors
    ///
    /// Returns `StudentError` if required fields are blank, the slug is not
    /// canonical, or an exam sits in the wrong slot.
    pub fn from_draft(
        id: StudentId,
        draft: StudentDraft,
        slug: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, StudentError> {
        let slug = slug.into();
        if !is_valid_slug(&slug) {
            return Err(StudentError::InvalidSlug(slug));
        }
        draft.check_exam_slots()?;
        let (full_name, academic_year) = draft.required_fields()?;
        let (full_name, academic_year) = (full_name.to_string(), academic_year.to_string());

        Ok(Self {
            id,
            full_name,
            academic_year,
            slug,
            ielts: draft.ielts,
            sat_english: draft.sat_english,
            sat_math: draft.sat_math,
            projects: draft.projects,
            admits: draft.admits,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace all editable fields, keeping id and creation time.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Student::from_draft`].
    pub fn apply_draft(
        &self,
        draft: StudentDraft,
        slug: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, StudentError> {
        let mut updated = Self::from_draft(self.id, draft, slug, now)?;
        updated.created_at = self.created_at;
        Ok(updated)
    }

    /// Rehydrate a stored student; timestamps are taken as-is.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Student::from_draft`].
    pub fn from_persisted(
        id: StudentId,
        draft: StudentDraft,
        slug: impl Into<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, StudentError> {
        let mut student = Self::from_draft(id, draft, slug, created_at)?;
        student.updated_at = updated_at;
        Ok(student)
    }

    #[must_use]
    pub fn id(&self) -> StudentId {
        self.id
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn academic_year(&self) -> &str {
        &self.academic_year
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    #[must_use]
    pub fn exam(&self, kind: ExamKind) -> Option<&ExamProgress> {
        match kind {
            ExamKind::Ielts => self.ielts.as_ref(),
            ExamKind::SatEnglish => self.sat_english.as_ref(),
            ExamKind::SatMath => self.sat_math.as_ref(),
        }
    }

    /// All recorded exams in display order.
    pub fn exams(&self) -> impl Iterator<Item = &ExamProgress> {
        ExamKind::ALL.into_iter().filter_map(|kind| self.exam(kind))
    }

    #[must_use]
    pub fn projects(&self) -> &[PortfolioProject] {
        &self.projects
    }

    #[must_use]
    pub fn admits(&self) -> &[InternationalAdmit] {
        &self.admits
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Editable fields as a draft carrying the current slug.
    #[must_use]
    pub fn to_draft(&self) -> StudentDraft {
        StudentDraft {
            full_name: self.full_name.clone(),
            academic_year: self.academic_year.clone(),
            slug: Some(self.slug.clone()),
            ielts: self.ielts,
            sat_english: self.sat_english,
            sat_math: self.sat_math,
            projects: self.projects.clone(),
            admits: self.admits.clone(),
        }
    }
}
