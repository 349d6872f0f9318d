//! Score progress and normalization for display.
//!
//! These helpers feed progress bars directly, so they never fail: NaN,
//! infinities and degenerate ranges all map to a defined number (usually 0).

use serde::{Deserialize, Serialize};

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

/// A start → current → target score progression.
///
/// No ordering is assumed between the three values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressTriple {
    pub start: f64,
    pub current: f64,
    pub target: f64,
}

impl ProgressTriple {
    #[must_use]
    pub fn new(start: f64, current: f64, target: f64) -> Self {
        Self {
            start,
            current,
            target,
        }
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        progress_percentage(self)
    }

    #[must_use]
    pub fn remaining(&self) -> f64 {
        remaining_percentage(self)
    }

    #[must_use]
    pub fn result(&self) -> ProgressResult {
        ProgressResult::from_triple(self)
    }
}

/// Display-ready progress pair. `progress + remaining == 100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressResult {
    progress: f64,
    remaining: f64,
}

impl ProgressResult {
    /// The only constructor; `remaining` is always derived from `progress`.
    #[must_use]
    pub fn from_triple(triple: &ProgressTriple) -> Self {
        Self {
            progress: progress_percentage(triple),
            remaining: remaining_percentage(triple),
        }
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    #[must_use]
    pub fn remaining(&self) -> f64 {
        self.remaining
    }
}

/// Options for [`normalize_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NormalizeOptions {
    /// Clamp the score into `[min, max]` before normalizing.
    pub clamp: bool,
    /// Scale to `[0, 100]` instead of `[0, 1]`.
    pub as_percentage: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            clamp: true,
            as_percentage: true,
        }
    }
}

//
// ─── OPERATIONS ────────────────────────────────────────────────────────────────
//

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Percentage of the way from `start` to `target`, in `[0, 100]`.
///
/// When the range is empty or inverted the answer is binary: 100 once
/// `current` reaches `target`, otherwise 0.
///
/// ```
/// # use tracker_core::progress::{progress_percentage, ProgressTriple};
/// let ielts = ProgressTriple::new(5.0, 6.5, 7.5);
/// assert!((progress_percentage(&ielts) - 60.0).abs() < 1e-9);
/// ```
#[must_use]
pub fn progress_percentage(triple: &ProgressTriple) -> f64 {
    let ProgressTriple {
        start,
        current,
        target,
    } = *triple;

    if !(start.is_finite() && current.is_finite() && target.is_finite()) {
        return 0.0;
    }

    let range = target - start;
    if range <= 0.0 {
        return if current >= target { 100.0 } else { 0.0 };
    }

    let raw = (current - start) / range * 100.0;
    clamp(raw, 0.0, 100.0)
}

/// `100 - progress_percentage(triple)`, clamped to `[0, 100]`.
#[must_use]
pub fn remaining_percentage(triple: &ProgressTriple) -> f64 {
    clamp(100.0 - progress_percentage(triple), 0.0, 100.0)
}

/// Map `score` from `[min, max]` onto `[0, 100]` (or `[0, 1]`).
///
/// Argument order of `min`/`max` does not matter. A zero-width range or any
/// non-finite input yields 0.
///
/// ```
/// # use tracker_core::progress::{normalize_score, NormalizeOptions};
/// let sat = normalize_score(1400.0, 400.0, 1600.0, NormalizeOptions::default());
/// assert!((sat - 83.333).abs() < 1e-2);
/// ```
#[must_use]
pub fn normalize_score(score: f64, min: f64, max: f64, options: NormalizeOptions) -> f64 {
    if !(score.is_finite() && min.is_finite() && max.is_finite()) {
        return 0.0;
    }
    if min == max {
        return 0.0;
    }

    let low = min.min(max);
    let high = min.max(max);
    let score = if options.clamp {
        clamp(score, low, high)
    } else {
        score
    };

    let normalized = (score - low) / (high - low);
    if !normalized.is_finite() || normalized < 0.0 {
        return 0.0;
    }

    if options.as_percentage {
        clamp(normalized * 100.0, 0.0, 100.0)
    } else {
        clamp(normalized, 0.0, 1.0)
    }
}
