use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MilestoneError {
    #[error("project title cannot be empty")]
    EmptyTitle,
    #[error("program name cannot be empty")]
    EmptyProgramName,
    #[error("country cannot be empty")]
    EmptyCountry,
    #[error("unknown status: {0}")]
    UnknownStatus(String),
}

//
// ─── STATUSES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
}

impl ProjectStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Planned => "PLANNED",
            ProjectStatus::InProgress => "IN_PROGRESS",
            ProjectStatus::Completed => "COMPLETED",
        }
    }

    /// Parse a stored or submitted status; empty input means the default.
    ///
    /// # Errors
    ///
    /// Returns `MilestoneError::UnknownStatus` for anything else.
    pub fn parse(s: &str) -> Result<Self, MilestoneError> {
        match s.trim() {
            "" | "PLANNED" => Ok(ProjectStatus::Planned),
            "IN_PROGRESS" => Ok(ProjectStatus::InProgress),
            "COMPLETED" => Ok(ProjectStatus::Completed),
            other => Err(MilestoneError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmitStatus {
    #[default]
    Pending,
    Offered,
    Enrolled,
    Rejected,
}

impl AdmitStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AdmitStatus::Pending => "PENDING",
            AdmitStatus::Offered => "OFFERED",
            AdmitStatus::Enrolled => "ENROLLED",
            AdmitStatus::Rejected => "REJECTED",
        }
    }

    /// # Errors
    ///
    /// Returns `MilestoneError::UnknownStatus` for unrecognised values.
    pub fn parse(s: &str) -> Result<Self, MilestoneError> {
        match s.trim() {
            "" | "PENDING" => Ok(AdmitStatus::Pending),
            "OFFERED" => Ok(AdmitStatus::Offered),
            "ENROLLED" => Ok(AdmitStatus::Enrolled),
            "REJECTED" => Ok(AdmitStatus::Rejected),
            other => Err(MilestoneError::UnknownStatus(other.to_string())),
        }
    }
}

//
// ─── MILESTONES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioProject {
    title: String,
    description: String,
    status: ProjectStatus,
}

impl PortfolioProject {
    /// # Errors
    ///
    /// Returns `MilestoneError::EmptyTitle` if the title is blank.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        status: ProjectStatus,
    ) -> Result<Self, MilestoneError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(MilestoneError::EmptyTitle);
        }
        Ok(Self {
            title,
            description: description.into().trim().to_string(),
            status,
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn status(&self) -> ProjectStatus {
        self.status
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternationalAdmit {
    program_name: String,
    country: String,
    status: AdmitStatus,
}

impl InternationalAdmit {
    /// # Errors
    ///
    /// Returns `MilestoneError` if program name or country is blank.
    pub fn new(
        program_name: impl Into<String>,
        country: impl Into<String>,
        status: AdmitStatus,
    ) -> Result<Self, MilestoneError> {
        let program_name = program_name.into().trim().to_string();
        let country = country.into().trim().to_string();
        if program_name.is_empty() {
            return Err(MilestoneError::EmptyProgramName);
        }
        if country.is_empty() {
            return Err(MilestoneError::EmptyCountry);
        }
        Ok(Self {
            program_name,
            country,
            status,
        })
    }

    #[must_use]
    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    #[must_use]
    pub fn country(&self) -> &str {
        &self.country
    }

    #[must_use]
    pub fn status(&self) -> AdmitStatus {
        self.status
    }
}

/// Percentage of projects marked completed; 0 for an empty portfolio.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn milestone_progress(projects: &[PortfolioProject]) -> f64 {
    if projects.is_empty() {
        return 0.0;
    }
    let completed = projects
        .iter()
        .filter(|p| p.status() == ProjectStatus::Completed)
        .count();
    completed as f64 / projects.len() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_parse_wire_names() {
        assert_eq!(ProjectStatus::parse("IN_PROGRESS").unwrap(), ProjectStatus::InProgress);
        assert_eq!(ProjectStatus::parse("").unwrap(), ProjectStatus::Planned);
        assert_eq!(AdmitStatus::parse("ENROLLED").unwrap(), AdmitStatus::Enrolled);
        assert_eq!(
            AdmitStatus::parse("maybe").unwrap_err(),
            MilestoneError::UnknownStatus("maybe".into())
        );
        assert_eq!(
            AdmitStatus::parse(AdmitStatus::Offered.as_str()).unwrap(),
            AdmitStatus::Offered
        );
    }

    #[test]
    fn project_requires_title() {
        assert_eq!(
            PortfolioProject::new("  ", "desc", ProjectStatus::Planned).unwrap_err(),
            MilestoneError::EmptyTitle
        );
    }

    #[test]
    fn admit_requires_program_and_country() {
        assert_eq!(
            InternationalAdmit::new("", "UK", AdmitStatus::Pending).unwrap_err(),
            MilestoneError::EmptyProgramName
        );
        assert_eq!(
            InternationalAdmit::new("MSc CS", " ", AdmitStatus::Pending).unwrap_err(),
            MilestoneError::EmptyCountry
        );
    }

    #[test]
    fn milestone_progress_counts_completed_projects() {
        assert_eq!(milestone_progress(&[]), 0.0);
        let projects = vec![
            PortfolioProject::new("Robot", "", ProjectStatus::Completed).unwrap(),
            PortfolioProject::new("Essay", "", ProjectStatus::InProgress).unwrap(),
            PortfolioProject::new("App", "", ProjectStatus::Planned).unwrap(),
            PortfolioProject::new("Blog", "", ProjectStatus::Completed).unwrap(),
        ];
        assert_eq!(milestone_progress(&projects), 50.0);
    }

    #[test]
    fn status_serializes_screaming_case() {
        let json = serde_json::to_string(&ProjectStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }
}
