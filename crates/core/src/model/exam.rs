use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::progress::{NormalizeOptions, ProgressResult, ProgressTriple, normalize_score};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("{exam} {field} score must be a finite number")]
    NotFinite { exam: ExamKind, field: &'static str },

    #[error("{exam} {field} score {value} is outside {min}..={max}")]
    OutOfScale {
        exam: ExamKind,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{exam} {field} score {value} is not a multiple of {step} above {min}")]
    OffStep {
        exam: ExamKind,
        field: &'static str,
        value: f64,
        min: f64,
        step: f64,
    },
}

//
// ─── EXAMS ─────────────────────────────────────────────────────────────────────
//

/// Standardized tests tracked on a student profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamKind {
    Ielts,
    SatEnglish,
    SatMath,
}

impl ExamKind {
    pub const ALL: [ExamKind; 3] = [ExamKind::Ielts, ExamKind::SatEnglish, ExamKind::SatMath];

    #[must_use]
    pub fn scale(self) -> ScoreScale {
        match self {
            ExamKind::Ielts => ScoreScale::new(0.0, 9.0, 0.5),
            ExamKind::SatEnglish | ExamKind::SatMath => ScoreScale::new(200.0, 800.0, 10.0),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExamKind::Ielts => "ielts",
            ExamKind::SatEnglish => "sat_english",
            ExamKind::SatMath => "sat_math",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ielts" => Some(ExamKind::Ielts),
            "sat_english" => Some(ExamKind::SatEnglish),
            "sat_math" => Some(ExamKind::SatMath),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ExamKind::Ielts => "IELTS",
            ExamKind::SatEnglish => "SAT English",
            ExamKind::SatMath => "SAT Math",
        }
    }
}

impl std::fmt::Display for ExamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive score bounds of an exam and the increment scores move in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreScale {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ScoreScale {
    /// Tolerance for float noise when checking steps, in units of one step.
    const STEP_EPSILON: f64 = 1e-6;

    #[must_use]
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    #[must_use]
    pub fn contains(&self, score: f64) -> bool {
        score.is_finite() && score >= self.min && score <= self.max
    }

    /// True when `score` sits a whole number of steps above `min`.
    #[must_use]
    pub fn is_on_step(&self, score: f64) -> bool {
        if !score.is_finite() {
            return false;
        }
        let steps = (score - self.min) / self.step;
        (steps - steps.round()).abs() < Self::STEP_EPSILON
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// A validated score progression for one exam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExamProgress {
    kind: ExamKind,
    triple: ProgressTriple,
}

impl ExamProgress {
    /// Validate all three scores against the exam's scale.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError` if a score is not finite, falls outside the scale,
    /// or is not on one of the scale's steps.
    pub fn new(kind: ExamKind, triple: ProgressTriple) -> Result<Self, ScoreError> {
        let scale = kind.scale();
        for (field, value) in [
            ("start", triple.start),
            ("current", triple.current),
            ("target", triple.target),
        ] {
            if !value.is_finite() {
                return Err(ScoreError::NotFinite { exam: kind, field });
            }
            if !scale.contains(value) {
                return Err(ScoreError::OutOfScale {
                    exam: kind,
                    field,
                    value,
                    min: scale.min,
                    max: scale.max,
                });
            }
            if !scale.is_on_step(value) {
                return Err(ScoreError::OffStep {
                    exam: kind,
                    field,
                    value,
                    min: scale.min,
                    step: scale.step,
                });
            }
        }
        Ok(Self { kind, triple })
    }

    /// Build from optional form fields; missing scores default to 0.
    ///
    /// Returns `Ok(None)` when no score was supplied at all.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError` when the resulting triple fails validation.
    pub fn from_partial(
        kind: ExamKind,
        start: Option<f64>,
        current: Option<f64>,
        target: Option<f64>,
    ) -> Result<Option<Self>, ScoreError> {
        if start.is_none() && current.is_none() && target.is_none() {
            return Ok(None);
        }
        let triple = ProgressTriple::new(
            start.unwrap_or(0.0),
            current.unwrap_or(0.0),
            target.unwrap_or(0.0),
        );
        Self::new(kind, triple).map(Some)
    }

    /// Rehydrate without scale checks; stored rows are trusted.
    #[must_use]
    pub fn from_persisted(kind: ExamKind, triple: ProgressTriple) -> Self {
        Self { kind, triple }
    }

    #[must_use]
    pub fn kind(&self) -> ExamKind {
        self.kind
    }

    #[must_use]
    pub fn triple(&self) -> ProgressTriple {
        self.triple
    }

    #[must_use]
    pub fn result(&self) -> ProgressResult {
        self.triple.result()
    }

    #[must_use]
    pub fn view(&self) -> ExamProgressView {
        let scale = self.kind.scale();
        let result = self.result();
        ExamProgressView {
            kind: self.kind,
            label: self.kind.label(),
            start: self.triple.start,
            current: self.triple.current,
            target: self.triple.target,
            max_score: scale.max,
            progress: result.progress(),
            remaining: result.remaining(),
            normalized_current: normalize_score(
                self.triple.current,
                scale.min,
                scale.max,
                NormalizeOptions::default(),
            ),
        }
    }
}

/// Render-ready numbers for one exam card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamProgressView {
    pub kind: ExamKind,
    pub label: &'static str,
    pub start: f64,
    pub current: f64,
    pub target: f64,
    pub max_score: f64,
    pub progress: f64,
    pub remaining: f64,
    pub normalized_current: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_match_exam_ranges() {
        assert_eq!(ExamKind::Ielts.scale(), ScoreScale::new(0.0, 9.0, 0.5));
        assert_eq!(ExamKind::SatMath.scale(), ScoreScale::new(200.0, 800.0, 10.0));
    }

    #[test]
    fn new_rejects_scores_between_steps() {
        let err = ExamProgress::new(ExamKind::Ielts, ProgressTriple::new(5.0, 6.3, 7.5))
            .unwrap_err();
        assert!(matches!(
            err,
            ScoreError::OffStep {
                field: "current",
                step,
                ..
            } if step == 0.5
        ));

        let err = ExamProgress::new(ExamKind::SatMath, ProgressTriple::new(500.0, 555.0, 700.0))
            .unwrap_err();
        assert!(matches!(err, ScoreError::OffStep { exam: ExamKind::SatMath, .. }));
    }

    #[test]
    fn step_check_tolerates_float_noise() {
        let ielts = ExamKind::Ielts.scale();
        assert!(ielts.is_on_step(0.1 + 0.2 + 6.2));
        assert!(ielts.is_on_step(9.0));
        assert!(!ielts.is_on_step(8.75));
        assert!(!ielts.is_on_step(f64::NAN));
        assert!(ExamKind::SatEnglish.scale().is_on_step(800.0));
    }

    #[test]
    fn exam_kind_round_trips_through_str() {
        for kind in ExamKind::ALL {
            assert_eq!(ExamKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ExamKind::parse("toefl"), None);
    }

    #[test]
    fn new_rejects_out_of_scale_scores() {
        let err = ExamProgress::new(ExamKind::Ielts, ProgressTriple::new(5.0, 9.5, 7.5))
            .unwrap_err();
        assert!(matches!(
            err,
            ScoreError::OutOfScale {
                field: "current",
                ..
            }
        ));
    }

    #[test]
    fn new_rejects_nan() {
        let err = ExamProgress::new(ExamKind::SatMath, ProgressTriple::new(f64::NAN, 600.0, 700.0))
            .unwrap_err();
        assert_eq!(
            err,
            ScoreError::NotFinite {
                exam: ExamKind::SatMath,
                field: "start"
            }
        );
    }

    #[test]
    fn from_partial_skips_empty_and_defaults_missing() {
        assert_eq!(
            ExamProgress::from_partial(ExamKind::Ielts, None, None, None).unwrap(),
            None
        );
        let progress = ExamProgress::from_partial(ExamKind::Ielts, Some(5.0), None, Some(7.0))
            .unwrap()
            .unwrap();
        assert_eq!(progress.triple(), ProgressTriple::new(5.0, 0.0, 7.0));
        assert_eq!(progress.result().progress(), 0.0);
    }

    #[test]
    fn from_partial_sat_defaults_fall_below_scale() {
        // 0 is not a valid SAT section score, so a partial SAT form is rejected.
        assert!(ExamProgress::from_partial(ExamKind::SatEnglish, Some(500.0), None, None).is_err());
    }

    #[test]
    fn view_carries_progress_and_normalized_score() {
        let progress =
            ExamProgress::new(ExamKind::SatEnglish, ProgressTriple::new(500.0, 650.0, 750.0))
                .unwrap();
        let view = progress.view();
        assert!((view.progress - 60.0).abs() < 1e-9);
        assert_eq!(view.progress + view.remaining, 100.0);
        assert_eq!(view.max_score, 800.0);
        assert!((view.normalized_current - 75.0).abs() < 1e-9);
        assert_eq!(view.label, "SAT English");
    }
}
