//! Natural ordering of image names: `page2` before `page10`.
//!
//! A name is split into alternating text and digit runs, always starting
//! with a (possibly empty) text run, so runs of the same kind line up when
//! two keys are compared position by position. Digit runs compare as
//! integers of any length; text runs compare case-insensitively. Keys that
//! tie fall back to the raw string, which keeps the order strict and total.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

/// One run of a split name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Run {
    /// Lower-cased text between digit runs.
    Text(String),
    /// Digits with leading zeros stripped (`"0"` stays `"0"`).
    Number(String),
}

impl Ord for Run {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Run::Text(a), Run::Text(b)) => a.cmp(b),
            // Same digit count after stripping zeros ⇒ lexical order is numeric order.
            (Run::Number(a), Run::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Run::Text(_), Run::Number(_)) => Ordering::Less,
            (Run::Number(_), Run::Text(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Run {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort key for natural ordering.
///
/// ```rust
/// use album2pdf::NaturalKey;
///
/// let mut names = vec!["10.jpg", "2.jpg", "1.jpg"];
/// names.sort_by_cached_key(|n| NaturalKey::new(n));
/// assert_eq!(names, ["1.jpg", "2.jpg", "10.jpg"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey {
    runs: Vec<Run>,
    raw: String,
}

impl NaturalKey {
    pub fn new(name: &str) -> Self {
        let mut runs = Vec::new();
        let mut last = 0;
        for m in DIGIT_RUN.find_iter(name) {
            runs.push(Run::Text(name[last..m.start()].to_lowercase()));
            let trimmed = m.as_str().trim_start_matches('0');
            let digits = if trimmed.is_empty() { "0" } else { trimmed };
            runs.push(Run::Number(digits.to_string()));
            last = m.end();
        }
        runs.push(Run::Text(name[last..].to_lowercase()));

        Self {
            runs,
            raw: name.to_string(),
        }
    }
}

impl Ord for NaturalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Vec ordering is lexicographic over runs, so a shorter prefix sorts first.
        self.runs
            .cmp(&other.runs)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for NaturalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two names in natural order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    NaturalKey::new(a).cmp(&NaturalKey::new(b))
}

/// Sort names in place in natural order.
pub fn sort_natural<T: AsRef<str>>(names: &mut [T]) {
    names.sort_by_cached_key(|n| NaturalKey::new(n.as_ref()));
}
