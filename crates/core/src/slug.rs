//! Slug derivation and de-duplication for student records.
//!
//! Everything here is a total function: inputs never produce errors, only
//! (possibly empty) strings. The set of slugs already in use is owned by the
//! caller and passed in on every call.

use std::collections::HashSet;

use crate::time::Clock;

/// Slug returned by [`compose`] when neither the name nor the year yields
/// any usable characters.
pub const FALLBACK_SLUG: &str = "student";

/// Highest numeric suffix tried by [`disambiguate`] before falling back to a
/// timestamp suffix.
pub const MAX_SLUG_PROBES: u32 = 1000;

/// Map free text to a URL-safe slug.
///
/// Lowercases, trims, drops anything that is not a word character (ASCII
/// letter, digit or `_`), whitespace or hyphen, then turns each run of
/// whitespace/hyphens into a single hyphen. Leading and trailing hyphens are
/// removed.
///
/// The result is either empty or matches `^[a-z0-9_]+(-[a-z0-9_]+)*$`.
///
/// ```
/// # use tracker_core::slug::normalize;
/// assert_eq!(normalize("  John  O'Neil "), "john-oneil");
/// assert_eq!(normalize("2024 - 2025"), "2024-2025");
/// assert_eq!(normalize("!!!"), "");
/// assert_eq!(normalize("snake_case"), "snake_case");
/// ```
#[must_use]
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_separator = false;

    for ch in lowered.trim().chars() {
        if is_word_char(ch) {
            if pending_separator && !out.is_empty() {
                out.push('-');
            }
            pending_separator = false;
            out.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_separator = true;
        }
        // Everything else is stripped without introducing a separator.
    }

    out
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Build the canonical slug for a student from name and academic year.
///
/// Never returns an empty string: when both parts normalize to nothing the
/// result is [`FALLBACK_SLUG`].
///
/// ```
/// # use tracker_core::slug::compose;
/// assert_eq!(compose("John Doe", "2024-2025"), "john-doe-2024-2025");
/// assert_eq!(compose("", ""), "student");
/// ```
#[must_use]
pub fn compose(full_name: &str, academic_year: &str) -> String {
    let name = normalize(full_name);
    let year = normalize(academic_year);

    match (name.is_empty(), year.is_empty()) {
        (false, false) => format!("{name}-{year}"),
        (true, false) => year,
        (false, true) => name,
        (true, true) => FALLBACK_SLUG.to_string(),
    }
}

/// Return `base` or the first free `base-N` (N >= 2) against `used`.
///
/// `exclude` is removed from `used` before checking, so an entity being
/// updated does not collide with its own current slug. See
/// [`disambiguate_at`] for the fallback behavior.
#[must_use]
pub fn disambiguate<S>(base: &str, used: &HashSet<S>, exclude: Option<&str>) -> String
where
    S: std::borrow::Borrow<str> + Eq + std::hash::Hash,
{
    disambiguate_at(base, used, exclude, &Clock::default_clock())
}

/// Like [`disambiguate`], reading time from `clock` for the fallback.
///
/// When every suffix up to [`MAX_SLUG_PROBES`] is taken, probing stops and
/// `"{base}-{unix_millis}"` is returned. That suffix is only probabilistically
/// unique: two calls within the same millisecond against the same saturated
/// set produce the same slug.
#[must_use]
pub fn disambiguate_at<S>(
    base: &str,
    used: &HashSet<S>,
    exclude: Option<&str>,
    clock: &Clock,
) -> String
where
    S: std::borrow::Borrow<str> + Eq + std::hash::Hash,
{
    let taken = |candidate: &str| exclude != Some(candidate) && used.contains(candidate);

    if !taken(base) {
        return base.to_string();
    }

    let mut counter: u32 = 2;
    loop {
        let candidate = format!("{base}-{counter}");
        if !taken(&candidate) {
            log::debug!("slug `{base}` taken, resolved to `{candidate}`");
            return candidate;
        }
        counter += 1;
        if counter > MAX_SLUG_PROBES {
            break;
        }
    }

    let fallback = format!("{base}-{}", clock.now_millis());
    log::warn!(
        "slug `{base}` exhausted {MAX_SLUG_PROBES} suffixes, using timestamp slug `{fallback}`"
    );
    fallback
}

/// True when `value` is a non-empty slug in canonical form.
#[must_use]
pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && !value.contains("--")
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
