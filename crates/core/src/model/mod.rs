pub mod exam;
mod ids;
pub mod milestone;
mod profile;
mod student;

pub use exam::{ExamKind, ExamProgress, ExamProgressView, ScoreError, ScoreScale};
pub use ids::{ParseIdError, StudentId};
pub use milestone::{
    AdmitStatus, InternationalAdmit, MilestoneError, PortfolioProject, ProjectStatus,
    milestone_progress,
};
pub use profile::{SatTotal, StudentProfile};
pub use student::{Student, StudentDraft, StudentError};
