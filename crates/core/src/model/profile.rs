use serde::Serialize;

use crate::model::exam::{ExamKind, ExamProgressView};
use crate::model::milestone::{InternationalAdmit, PortfolioProject, milestone_progress};
use crate::model::student::Student;
use crate::progress::{ProgressTriple, progress_percentage, remaining_percentage};

/// Combined SAT score across both sections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatTotal {
    pub start: f64,
    pub current: f64,
    pub target: f64,
    pub progress: f64,
    pub remaining: f64,
}

/// Public, render-ready view of a student's page.
///
/// Built fresh per render; never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub full_name: String,
    pub academic_year: String,
    pub slug: String,
    pub ielts: Option<ExamProgressView>,
    pub sat_english: Option<ExamProgressView>,
    pub sat_math: Option<ExamProgressView>,
    pub sat_total: Option<SatTotal>,
    pub projects: Vec<PortfolioProject>,
    pub project_completion: f64,
    pub admits: Vec<InternationalAdmit>,
}

impl StudentProfile {
    #[must_use]
    pub fn from_student(student: &Student) -> Self {
        let view = |kind| student.exam(kind).map(|p| p.view());

        let sat_total = match (
            student.exam(ExamKind::SatEnglish),
            student.exam(ExamKind::SatMath),
        ) {
            (Some(english), Some(math)) => {
                let (e, m) = (english.triple(), math.triple());
                let total = ProgressTriple::new(
                    e.start + m.start,
                    e.current + m.current,
                    e.target + m.target,
                );
                Some(SatTotal {
                    start: total.start,
                    current: total.current,
                    target: total.target,
                    progress: progress_percentage(&total),
                    remaining: remaining_percentage(&total),
                })
            }
            _ => None,
        };

        Self {
            full_name: student.full_name().to_string(),
            academic_year: student.academic_year().to_string(),
            slug: student.slug().to_string(),
            ielts: view(ExamKind::Ielts),
            sat_english: view(ExamKind::SatEnglish),
            sat_math: view(ExamKind::SatMath),
            sat_total,
            projects: student.projects().to_vec(),
            project_completion: milestone_progress(student.projects()),
            admits: student.admits().to_vec(),
        }
    }
}
