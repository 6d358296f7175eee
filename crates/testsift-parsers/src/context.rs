// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Per-run bookkeeping shared by every grammar

use crate::result::TestRun;
use crate::stack_trace::StackTraceCapture;

/// Mutable state of the run in progress
///
/// `extra` holds the grammar's own phase flags. Everything is reset to
/// defaults after each reconciliation, except the current line number.
#[derive(Debug)]
pub struct RunContext<X> {
    /// The run being filled in
    pub run: TestRun,
    /// Number of the line being processed
    pub line_number: u64,
    /// Countdown until the expected match is given up on
    pub line_window: LineWindow,
    /// Last numbered failure seen in the current section
    pub last_failed_ordinal: usize,
    /// Last numbered pending item seen in the current section
    pub last_pending_ordinal: usize,
    /// Whether a summary line was parsed for this run
    pub summary_seen: bool,
    /// Stack trace being captured
    pub stack_trace: StackTraceCapture,
    /// Grammar-specific fields
    pub extra: X,
}

impl<X: Default> RunContext<X> {
    /// Create a context around a fresh run
    #[must_use]
    pub fn new(run: TestRun) -> Self {
        Self {
            run,
            line_number: 0,
            line_window: LineWindow::default(),
            last_failed_ordinal: 0,
            last_pending_ordinal: 0,
            summary_seen: false,
            stack_trace: StackTraceCapture::default(),
            extra: X::default(),
        }
    }

    pub(crate) fn reset(&mut self, run: TestRun) {
        let line_number = self.line_number;
        *self = Self::new(run);
        self.line_number = line_number;
    }
}

/// Countdown of unmatched lines within which a match is expected
///
/// A non-positive count means unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineWindow {
    remaining: i64,
    hint: &'static str,
}

impl Default for LineWindow {
    fn default() -> Self {
        Self {
            remaining: -1,
            hint: "",
        }
    }
}

/// Result of charging one unmatched line to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTick {
    /// No expectation is pending
    Unconstrained,
    /// The expectation is still open
    Counting,
    /// The last allowed line went by without the expected match
    Expired,
}

impl LineWindow {
    /// Expect a match within `lines` unmatched lines
    pub fn expect_within(&mut self, lines: i64, hint: &'static str) {
        self.remaining = lines;
        self.hint = hint;
    }

    /// Drop any pending expectation
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Check if an expectation is pending
    #[must_use]
    pub fn is_constrained(&self) -> bool {
        self.remaining > 0
    }

    /// Lines left in the window
    #[must_use]
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// What the window is waiting for
    #[must_use]
    pub fn hint(&self) -> &'static str {
        self.hint
    }

    /// Charge one unmatched line
    pub fn tick(&mut self) -> WindowTick {
        match self.remaining {
            r if r <= 0 => WindowTick::Unconstrained,
            1 => {
                self.clear();
                WindowTick::Expired
            }
            _ => {
                self.remaining -= 1;
                WindowTick::Counting
            }
        }
    }
}

/// How a numbered item relates to the previous one in its section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordinal {
    /// Exactly one more than the previous
    Next,
    /// Back to 1 after at least one item
    Restart,
    /// Anything else
    Gap,
}

/// Classify `current` against the `last` ordinal seen
#[must_use]
pub fn check_ordinal(last: usize, current: usize) -> Ordinal {
    if last.checked_add(1) == Some(current) {
        Ordinal::Next
    } else if current == 1 {
        Ordinal::Restart
    } else {
        Ordinal::Gap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ParserUri, TestResult};
    use similar_asserts::assert_eq;

    #[test]
    fn test_window_counts_down_to_expiry() {
        let mut window = LineWindow::default();
        assert_eq!(window.tick(), WindowTick::Unconstrained);

        window.expect_within(3, "summary");
        assert!(window.is_constrained());
        assert_eq!(window.tick(), WindowTick::Counting);
        assert_eq!(window.tick(), WindowTick::Counting);
        assert_eq!(window.remaining(), 1);
        assert_eq!(window.tick(), WindowTick::Expired);
        assert!(!window.is_constrained());
        assert_eq!(window.tick(), WindowTick::Unconstrained);
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(check_ordinal(0, 1), Ordinal::Next);
        assert_eq!(check_ordinal(3, 4), Ordinal::Next);
        assert_eq!(check_ordinal(3, 1), Ordinal::Restart);
        assert_eq!(check_ordinal(3, 5), Ordinal::Gap);
        assert_eq!(check_ordinal(0, 2), Ordinal::Gap);
        assert_eq!(check_ordinal(usize::MAX, 2), Ordinal::Gap);
        assert_eq!(check_ordinal(usize::MAX, 1), Ordinal::Restart);
    }

    #[test]
    fn test_reset_keeps_line_number_only() {
        let uri = ParserUri::new("Test", "1.0").expect("valid uri");
        let mut cx: RunContext<bool> = RunContext::new(TestRun::new(uri.clone(), String::new(), 1));
        cx.line_number = 42;
        cx.summary_seen = true;
        cx.extra = true;
        cx.last_failed_ordinal = 3;
        cx.run.passed_tests.push(TestResult::passed("a"));

        cx.reset(TestRun::new(uri, String::new(), 2));
        assert_eq!(cx.line_number, 42);
        assert!(!cx.summary_seen);
        assert!(!cx.extra);
        assert_eq!(cx.last_failed_ordinal, 0);
        assert_eq!(cx.run.test_run_id, 2);
        assert!(!cx.run.has_items());
    }
}
