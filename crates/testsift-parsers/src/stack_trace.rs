// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Bounded stack-trace accumulation
//!
//! A capture points at one entry of the run's failed tests. Lines are
//! newline-appended to that entry until a grammar ends the capture or the
//! line budget runs out, in which case the partial trace is dropped.

use crate::error::ParserError;
use crate::result::TestRun;

/// Maximum number of lines captured after a stack trace marker
pub const STACK_TRACE_LINE_BUDGET: usize = 50;

/// What happened to a line offered to the capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// No trace is being captured
    Inactive,
    /// The line was appended
    Appended,
    /// The budget ran out; the partial trace was dropped and capture ended
    Discarded,
}

/// Cursor into the failed tests of the in-progress run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTraceCapture {
    target: Option<usize>,
    captured: usize,
}

impl StackTraceCapture {
    /// Start capturing into `run.failed_tests[index]`
    ///
    /// `marker` becomes the first line of the trace when given; otherwise the
    /// trace starts empty. Any earlier trace on that entry is replaced.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::DanglingStackTrace` if `index` is out of range.
    pub fn begin(
        &mut self,
        run: &mut TestRun,
        index: usize,
        marker: Option<&str>,
    ) -> Result<(), ParserError> {
        let len = run.failed_tests.len();
        let test = run
            .failed_tests
            .get_mut(index)
            .ok_or(ParserError::DanglingStackTrace { index, len })?;
        test.stack_trace = marker.map(str::to_string);
        self.target = Some(index);
        self.captured = 0;
        Ok(())
    }

    /// Stop capturing, keeping what was collected
    pub fn end(&mut self) {
        self.target = None;
        self.captured = 0;
    }

    /// Check if a trace is being captured
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    /// Offer an unmatched line to the active capture
    ///
    /// # Errors
    ///
    /// Returns `ParserError::DanglingStackTrace` if the target no longer
    /// exists in `run`.
    pub fn append(&mut self, run: &mut TestRun, line: &str) -> Result<Capture, ParserError> {
        let Some(index) = self.target else {
            return Ok(Capture::Inactive);
        };
        let len = run.failed_tests.len();
        let test = run
            .failed_tests
            .get_mut(index)
            .ok_or(ParserError::DanglingStackTrace { index, len })?;

        self.captured += 1;
        if self.captured > STACK_TRACE_LINE_BUDGET {
            test.stack_trace = None;
            self.end();
            return Ok(Capture::Discarded);
        }

        match test.stack_trace.as_mut() {
            Some(trace) => {
                trace.push('\n');
                trace.push_str(line);
            }
            None => test.stack_trace = Some(line.to_string()),
        }
        Ok(Capture::Appended)
    }
}

/// Trim trailing whitespace from every failed test's trace
///
/// Traces that trim to nothing are removed.
pub(crate) fn trim_stack_traces(run: &mut TestRun) {
    for test in &mut run.failed_tests {
        if let Some(trace) = test.stack_trace.take() {
            let trimmed = trace.trim_end();
            if !trimmed.is_empty() {
                test.stack_trace = Some(trimmed.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ParserUri, TestResult};
    use similar_asserts::assert_eq;

    fn run_with_failures(names: &[&str]) -> TestRun {
        let uri = ParserUri::new("Test", "1.0").expect("valid uri");
        let mut run = TestRun::new(uri, String::new(), 1);
        run.failed_tests = names.iter().map(|n| TestResult::failed(*n)).collect();
        run
    }

    #[test]
    fn test_lines_are_newline_joined() {
        let mut run = run_with_failures(&["fails"]);
        let mut capture = StackTraceCapture::default();
        capture.begin(&mut run, 0, Some("1) fails")).expect("begin");

        assert_eq!(capture.append(&mut run, "  Error").expect("append"), Capture::Appended);
        assert_eq!(capture.append(&mut run, "  at x").expect("append"), Capture::Appended);
        assert_eq!(
            run.failed_tests[0].stack_trace.as_deref(),
            Some("1) fails\n  Error\n  at x")
        );
    }

    #[test]
    fn test_inactive_capture_ignores_lines() {
        let mut run = run_with_failures(&["fails"]);
        let mut capture = StackTraceCapture::default();
        assert_eq!(capture.append(&mut run, "noise").expect("append"), Capture::Inactive);
        assert!(run.failed_tests[0].stack_trace.is_none());
    }

    #[test]
    fn test_budget_overrun_discards_trace() {
        let mut run = run_with_failures(&["fails"]);
        let mut capture = StackTraceCapture::default();
        capture.begin(&mut run, 0, None).expect("begin");

        for i in 0..STACK_TRACE_LINE_BUDGET {
            let status = capture.append(&mut run, &format!("line {i}")).expect("append");
            assert_eq!(status, Capture::Appended);
        }
        assert_eq!(capture.append(&mut run, "one too many").expect("append"), Capture::Discarded);
        assert!(run.failed_tests[0].stack_trace.is_none());
        assert!(!capture.is_active());
    }

    #[test]
    fn test_dangling_target_is_an_error() {
        let mut run = run_with_failures(&[]);
        let mut capture = StackTraceCapture::default();
        assert!(matches!(
            capture.begin(&mut run, 0, None),
            Err(ParserError::DanglingStackTrace { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_trim_removes_trailing_whitespace_once() {
        let mut run = run_with_failures(&["a", "b"]);
        run.failed_tests[0].stack_trace = Some("  Error\n  at x\n\n   ".to_string());
        run.failed_tests[1].stack_trace = Some("\n  \n".to_string());
        trim_stack_traces(&mut run);

        assert_eq!(run.failed_tests[0].stack_trace.as_deref(), Some("  Error\n  at x"));
        assert!(run.failed_tests[1].stack_trace.is_none());
    }
}
