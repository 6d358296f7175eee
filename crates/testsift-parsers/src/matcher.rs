// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Time-bounded pattern evaluation and capture access

use std::borrow::Cow;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::{Captures, Regex};

use crate::error::ParserError;

/// Default wall-clock budget for a single pattern evaluation
pub const DEFAULT_MATCH_BUDGET: Duration = Duration::from_millis(100);

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\x1b\[[0-9;?]*[A-Za-z]"));

/// Compile one of the built-in grammar patterns
pub(crate) fn pattern(source: &str) -> Regex {
    Regex::new(source).unwrap_or_else(|e| panic!("built-in pattern {source:?} is invalid: {e}"))
}

/// Strip colour codes and a trailing carriage return before matching
#[must_use]
pub fn sanitize(line: &str) -> Cow<'_, str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.contains('\x1b') {
        ANSI_ESCAPE.replace_all(line, "")
    } else {
        Cow::Borrowed(line)
    }
}

/// Outcome of evaluating one pattern against one line
pub(crate) enum Evaluation<'h> {
    Matched(Captures<'h>),
    Unmatched,
    OverBudget(Duration),
}

/// Evaluates patterns under a per-evaluation time budget
///
/// The regex engine runs in linear time and cannot be interrupted, so the
/// budget is enforced on completion: an evaluation that used up its budget
/// is reported as over budget and its result is ignored.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PatternMatcher {
    budget: Duration,
}

impl PatternMatcher {
    pub(crate) fn new(budget: Duration) -> Self {
        Self { budget }
    }

    pub(crate) fn evaluate<'h>(&self, regex: &Regex, line: &'h str) -> Evaluation<'h> {
        let started = Instant::now();
        let captures = regex.captures(line);
        let elapsed = started.elapsed();
        if elapsed >= self.budget {
            return Evaluation::OverBudget(elapsed);
        }
        match captures {
            Some(captures) => Evaluation::Matched(captures),
            None => Evaluation::Unmatched,
        }
    }
}

/// A successful rule match handed to a grammar action
pub struct Hit<'h> {
    rule: &'static str,
    line: u64,
    captures: Captures<'h>,
}

impl<'h> Hit<'h> {
    pub(crate) fn new(rule: &'static str, line: u64, captures: Captures<'h>) -> Self {
        Self {
            rule,
            line,
            captures,
        }
    }

    /// Name of the rule that matched
    #[must_use]
    pub fn rule(&self) -> &'static str {
        self.rule
    }

    /// The whole matched text
    #[must_use]
    pub fn matched(&self) -> &'h str {
        self.captures.get(0).map_or("", |m| m.as_str())
    }

    /// Text of an optional capture group
    #[must_use]
    pub fn get(&self, group: usize) -> Option<&'h str> {
        self.captures.get(group).map(|m| m.as_str())
    }

    /// Text of a capture group the pattern always sets
    ///
    /// # Errors
    ///
    /// Returns `ParserError::MissingCapture` if the group did not participate.
    pub fn text(&self, group: usize) -> Result<&'h str, ParserError> {
        self.get(group).ok_or(ParserError::MissingCapture {
            rule: self.rule,
            group,
            line: self.line,
        })
    }

    /// Parse a capture group the pattern always sets
    ///
    /// # Errors
    ///
    /// Returns `ParserError::MissingCapture` if the group is absent, or
    /// `ParserError::InvalidNumber` if it does not parse.
    pub fn number<T: FromStr>(&self, group: usize) -> Result<T, ParserError> {
        let text = self.text(group)?;
        self.parse(text)
    }

    /// Parse an optional capture group
    ///
    /// # Errors
    ///
    /// Returns `ParserError::InvalidNumber` if the group is present but does
    /// not parse.
    pub fn opt_number<T: FromStr>(&self, group: usize) -> Result<Option<T>, ParserError> {
        self.get(group).map(|text| self.parse(text)).transpose()
    }

    fn parse<T: FromStr>(&self, text: &str) -> Result<T, ParserError> {
        text.trim().parse().map_err(|_| ParserError::InvalidNumber {
            line: self.line,
            value: text.to_string(),
        })
    }
}

/// Collect `(kind, count)` pairs from a summary fragment
///
/// `regex` must define the named groups `kind` and `count`; repeated kinds
/// are summed.
///
/// # Errors
///
/// Returns `ParserError::InvalidNumber` if a count does not fit `usize`.
pub(crate) fn tally<'h>(
    regex: &Regex,
    text: &'h str,
    line: u64,
) -> Result<Vec<(&'h str, usize)>, ParserError> {
    let mut counts: Vec<(&'h str, usize)> = Vec::new();
    for caps in regex.captures_iter(text) {
        let (Some(kind), Some(count)) = (caps.name("kind"), caps.name("count")) else {
            continue;
        };
        let value: usize = count
            .as_str()
            .parse()
            .map_err(|_| ParserError::InvalidNumber {
                line,
                value: count.as_str().to_string(),
            })?;
        match counts.iter_mut().find(|(k, _)| *k == kind.as_str()) {
            Some((_, total)) => {
                *total = total
                    .checked_add(value)
                    .ok_or_else(|| ParserError::InvalidNumber {
                        line,
                        value: count.as_str().to_string(),
                    })?;
            }
            None => counts.push((kind.as_str(), value)),
        }
    }
    Ok(counts)
}

/// Add counts captured on `line`
///
/// # Errors
///
/// Returns `ParserError::InvalidNumber` if the sum does not fit `usize`.
pub(crate) fn sum_counts(parts: &[usize], line: u64) -> Result<usize, ParserError> {
    parts
        .iter()
        .try_fold(0usize, |acc, n| acc.checked_add(*n))
        .ok_or_else(|| ParserError::InvalidNumber {
            line,
            value: parts
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(" + "),
        })
}

/// Look up a kind collected by [`tally`], 0 when absent
pub(crate) fn tallied(counts: &[(&str, usize)], kind: &str) -> usize {
    counts
        .iter()
        .find(|(k, _)| *k == kind)
        .map_or(0, |(_, n)| *n)
}

/// Convert `<value><unit>` to a duration, unit being `ms`, `s`, `m` or `h`
#[must_use]
pub fn duration_from_unit(value: f64, unit: &str) -> Option<Duration> {
    let nanos_per_unit = match unit {
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 6e10,
        "h" => 3.6e12,
        _ => return None,
    };
    let nanos = (value * nanos_per_unit).round();
    (nanos.is_finite() && nanos >= 0.0 && nanos < u64::MAX as f64)
        .then(|| Duration::from_nanos(nanos as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_sanitize_strips_colours_and_carriage_return() {
        assert_eq!(sanitize("\x1b[32m✓\x1b[39m adds\r"), "✓ adds");
        assert_eq!(sanitize("plain"), "plain");
        assert!(matches!(sanitize("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_duration_units() {
        assert_eq!(duration_from_unit(2.0, "ms"), Some(Duration::from_millis(2)));
        assert_eq!(duration_from_unit(1.5, "s"), Some(Duration::from_millis(1500)));
        assert_eq!(duration_from_unit(2.0, "m"), Some(Duration::from_secs(120)));
        assert_eq!(duration_from_unit(1.0, "h"), Some(Duration::from_secs(3600)));
        assert_eq!(duration_from_unit(0.3, "s"), Some(Duration::from_millis(300)));
        assert_eq!(duration_from_unit(0.002, "s"), Some(Duration::from_millis(2)));
        assert_eq!(duration_from_unit(1.0, "d"), None);
        assert_eq!(duration_from_unit(-1.0, "s"), None);
    }

    #[test]
    fn test_hit_accessors() {
        let regex = pattern(r"^(\d+) passing(?: \((\w+)\))?$");
        let captures = regex.captures("12 passing").expect("matches");
        let hit = Hit::new("passing", 7, captures);

        assert_eq!(hit.number::<usize>(1).expect("number"), 12);
        assert_eq!(hit.get(2), None);
        assert!(hit.opt_number::<usize>(2).expect("absent").is_none());
        assert!(matches!(
            hit.text(2),
            Err(ParserError::MissingCapture { group: 2, line: 7, .. })
        ));
    }

    #[test]
    fn test_hit_rejects_overflowing_numbers() {
        let regex = pattern(r"^(\d+)$");
        let captures = regex.captures("99999999999999999999999").expect("matches");
        let hit = Hit::new("digits", 1, captures);
        assert!(matches!(
            hit.number::<u32>(1),
            Err(ParserError::InvalidNumber { line: 1, .. })
        ));
    }

    #[test]
    fn test_zero_budget_reports_over_budget() {
        let regex = pattern(r"^(a+)+$");
        let matcher = PatternMatcher::new(Duration::ZERO);
        let line = "a".repeat(10_000);
        // Any evaluation takes longer than zero.
        assert!(matches!(
            matcher.evaluate(&regex, &line),
            Evaluation::OverBudget(_)
        ));
    }

    #[test]
    fn test_default_budget_matches() {
        let regex = pattern(r"^ok$");
        let matcher = PatternMatcher::new(DEFAULT_MATCH_BUDGET);
        assert!(matches!(matcher.evaluate(&regex, "ok"), Evaluation::Matched(_)));
        assert!(matches!(matcher.evaluate(&regex, "no"), Evaluation::Unmatched));
    }

    #[test]
    fn test_tally_sums_repeated_kinds() {
        let regex = pattern(r"(?P<count>\d+) (?P<kind>failed|passed|total)");
        let counts = tally(&regex, "1 failed, 3 passed, 2 failed, 6 total", 1).expect("tally");
        assert_eq!(tallied(&counts, "failed"), 3);
        assert_eq!(tallied(&counts, "passed"), 3);
        assert_eq!(tallied(&counts, "skipped"), 0);
    }

    #[test]
    fn test_tally_rejects_overflowing_sums() {
        let regex = pattern(r"(?P<count>\d+) (?P<kind>failed)");
        let err = tally(&regex, "18446744073709551615 failed, 1 failed", 7).expect_err("overflow");
        assert!(matches!(err, ParserError::InvalidNumber { line: 7, .. }));
    }

    #[test]
    fn test_sum_counts() {
        assert_eq!(sum_counts(&[1, 2, 3], 1).expect("sum"), 6);
        assert_eq!(sum_counts(&[], 1).expect("sum"), 0);
        let err = sum_counts(&[usize::MAX, 1], 4).expect_err("overflow");
        assert!(matches!(err, ParserError::InvalidNumber { line: 4, .. }));
    }
}
