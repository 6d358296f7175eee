// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Mocha console output grammar
//!
//! Mocha prints results without a start marker:
//!
//! ```text
//!   ✓ adds
//!   1) subtracts
//!   - divides
//!
//!   1 passing (2ms)
//!   1 pending
//!   1 failing
//!
//!   1) subtracts
//!      AssertionError: expected 1 to equal 2
//! ```
//!
//! Failed cases are numbered from 1. Their stack traces come after the
//! `<n> failing` line, each introduced by a repeat of the numbered line.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::context::{Ordinal, check_ordinal};
use crate::engine::{Engine, Grammar, Rule, Step};
use crate::error::ParserError;
use crate::matcher::{Hit, duration_from_unit, pattern, sum_counts};
use crate::result::{TestResult, TestRunSummary};
use crate::stack_trace::{Capture, STACK_TRACE_LINE_BUDGET};
use crate::telemetry::names;

/// Engine for Mocha output
pub type MochaParser = Engine<Mocha>;

/// Mocha grammar
#[derive(Debug)]
pub struct Mocha;

/// States of the Mocha machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MochaState {
    /// Reading test case lines
    AwaitingResults,
    /// Passing summary seen; pending and failing counts may follow
    AwaitingSummary,
    /// Failing summary seen; reading the numbered stack traces
    AwaitingStackTraces,
}

/// Actions bound to Mocha rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MochaAction {
    /// `✓ <name>`
    PassedTest,
    /// `<n>) <name>`
    FailedTest,
    /// `- <name>`
    PendingTest,
    /// `<n> passing (<time>)`
    PassingSummary,
    /// `<n> pending`
    PendingSummary,
    /// `<n> failing`
    FailingSummary,
    /// `<n>) ...` after the failing summary
    StackTraceMarker,
}

/// Mocha-specific context fields
#[derive(Debug, Default)]
pub struct MochaExtra {
    /// Number of stack traces announced by the failing summary
    pub expected_stack_traces: usize,
    /// Ordinal of the last stack trace marker
    pub last_stack_trace_ordinal: usize,
}

static PASSED_TEST: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"^\s*(?:✓|✔|√)\s+(.+?)(?:\s+\((\d+(?:\.\d+)?)(ms|s|m|h)\))?\s*$")
});
static FAILED_TEST: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*(\d+)\)\s+(.+?)\s*$"));
static PENDING_TEST: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*-\s+(.+?)\s*$"));
static PASSING_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"^\s*(\d+) passing \((\d+(?:\.\d+)?)(ms|s|m|h)\)\s*$")
});
static PENDING_SUMMARY: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*(\d+) pending\s*$"));
static FAILING_SUMMARY: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*(\d+) failing\s*$"));

macro_rules! rule {
    ($name:literal, $pattern:ident, $action:ident) => {
        Rule {
            name: $name,
            pattern: &$pattern,
            action: MochaAction::$action,
        }
    };
}

static RESULTS_RULES: [Rule<MochaAction>; 4] = [
    rule!("passing summary", PASSING_SUMMARY, PassingSummary),
    rule!("passed test", PASSED_TEST, PassedTest),
    rule!("failed test", FAILED_TEST, FailedTest),
    rule!("pending test", PENDING_TEST, PendingTest),
];
static SUMMARY_RULES: [Rule<MochaAction>; 6] = [
    rule!("pending summary", PENDING_SUMMARY, PendingSummary),
    rule!("failing summary", FAILING_SUMMARY, FailingSummary),
    rule!("passing summary", PASSING_SUMMARY, PassingSummary),
    rule!("passed test", PASSED_TEST, PassedTest),
    rule!("failed test", FAILED_TEST, FailedTest),
    rule!("pending test", PENDING_TEST, PendingTest),
];
static STACK_TRACE_RULES: [Rule<MochaAction>; 3] = [
    rule!("stack trace marker", FAILED_TEST, StackTraceMarker),
    rule!("passing summary", PASSING_SUMMARY, PassingSummary),
    rule!("passed test", PASSED_TEST, PassedTest),
];

impl Grammar for Mocha {
    type State = MochaState;
    type Action = MochaAction;
    type Extra = MochaExtra;

    const NAME: &'static str = "Mocha";
    const VERSION: &'static str = "1.0";

    fn initial_state() -> MochaState {
        MochaState::AwaitingResults
    }

    fn rules(state: MochaState) -> &'static [Rule<MochaAction>] {
        match state {
            MochaState::AwaitingResults => &RESULTS_RULES,
            MochaState::AwaitingSummary => &SUMMARY_RULES,
            MochaState::AwaitingStackTraces => &STACK_TRACE_RULES,
        }
    }

    fn apply(
        action: MochaAction,
        state: MochaState,
        hit: &Hit<'_>,
        step: &mut Step<'_, Self>,
    ) -> Result<MochaState, ParserError> {
        // Test lines and a second passing summary outside the results phase
        // belong to the next run.
        if state != MochaState::AwaitingResults
            && matches!(
                action,
                MochaAction::PassedTest
                    | MochaAction::PendingTest
                    | MochaAction::FailedTest
                    | MochaAction::PassingSummary
            )
        {
            debug!(
                line = step.line_number(),
                rule = hit.rule(),
                "Next run started before the previous one closed"
            );
            step.reconcile();
        }

        match action {
            MochaAction::PassedTest => {
                let duration = match (hit.opt_number::<f64>(2)?, hit.get(3)) {
                    (Some(value), Some(unit)) => duration_from_unit(value, unit),
                    _ => None,
                };
                let test = TestResult::passed(hit.text(1)?).with_execution_time(duration);
                step.run().passed_tests.push(test);
                Ok(MochaState::AwaitingResults)
            }
            MochaAction::PendingTest => {
                step.run().skipped_tests.push(TestResult::skipped(hit.text(1)?));
                Ok(MochaState::AwaitingResults)
            }
            MochaAction::FailedTest => failed_test(hit, step),
            MochaAction::PassingSummary => {
                let passed = hit.number(1)?;
                let duration = duration_from_unit(hit.number(2)?, hit.text(3)?);
                let line = step.line_number();
                let cx = step.cx();
                cx.summary_seen = true;
                let summary = &mut cx.run.summary;
                summary.total_passed = passed;
                summary.total_execution_time = duration.unwrap_or_default();
                recount(summary, line)?;
                step.expect_within(1, "failing or pending summary");
                Ok(MochaState::AwaitingSummary)
            }
            MochaAction::PendingSummary => {
                let skipped = hit.number(1)?;
                let line = step.line_number();
                let summary = &mut step.run().summary;
                summary.total_skipped = skipped;
                recount(summary, line)?;
                step.expect_within(1, "failing summary");
                Ok(MochaState::AwaitingSummary)
            }
            MochaAction::FailingSummary => {
                let failed: usize = hit.number(1)?;
                let line = step.line_number();
                let summary = &mut step.run().summary;
                summary.total_failed = failed;
                recount(summary, line)?;
                if failed == 0 {
                    return Ok(step.reconcile());
                }
                let extra = step.extra();
                extra.expected_stack_traces = failed;
                extra.last_stack_trace_ordinal = 0;
                step.expect_within(STACK_TRACE_LINE_BUDGET as i64, "stack trace marker");
                Ok(MochaState::AwaitingStackTraces)
            }
            MochaAction::StackTraceMarker => stack_trace_marker(hit, step),
        }
    }

    fn on_unmatched(
        state: MochaState,
        line: &str,
        step: &mut Step<'_, Self>,
    ) -> Result<MochaState, ParserError> {
        if state != MochaState::AwaitingStackTraces {
            return Ok(step.expire_line_window().unwrap_or(state));
        }

        match step.append_stack_trace(line)? {
            Capture::Appended => Ok(state),
            Capture::Discarded => {
                let extra = step.extra();
                if extra.last_stack_trace_ordinal >= extra.expected_stack_traces {
                    // The last trace ran out of budget; nothing else belongs to this run.
                    Ok(step.reconcile())
                } else {
                    Ok(state)
                }
            }
            Capture::Inactive => Ok(step.expire_line_window().unwrap_or(state)),
        }
    }
}

fn failed_test(hit: &Hit<'_>, step: &mut Step<'_, Mocha>) -> Result<MochaState, ParserError> {
    let ordinal: usize = hit.number(1)?;
    let last = step.cx().last_failed_ordinal;

    match check_ordinal(last, ordinal) {
        Ordinal::Next => {}
        Ordinal::Restart => {
            debug!(
                line = step.line_number(),
                last, "Failed test numbering restarted, treating as a new run"
            );
            step.reconcile();
        }
        Ordinal::Gap => step.unexpected_ordinal("failed", last.saturating_add(1), ordinal),
    }

    let cx = step.cx();
    cx.last_failed_ordinal = ordinal;
    cx.run.failed_tests.push(TestResult::failed(hit.text(2)?));
    Ok(MochaState::AwaitingResults)
}

fn stack_trace_marker(
    hit: &Hit<'_>,
    step: &mut Step<'_, Mocha>,
) -> Result<MochaState, ParserError> {
    let ordinal: usize = hit.number(1)?;
    let last = step.extra().last_stack_trace_ordinal;
    step.end_stack_trace();

    match check_ordinal(last, ordinal) {
        Ordinal::Next => {}
        Ordinal::Restart => {
            // A fresh `1)` after the traces is a failed case of the next run.
            step.reconcile();
            return failed_test(hit, step);
        }
        Ordinal::Gap => step.unexpected_ordinal("stack trace", last.saturating_add(1), ordinal),
    }
    step.extra().last_stack_trace_ordinal = ordinal;

    let failed = step.run().failed_tests.len();
    if ordinal == 0 || ordinal > failed {
        tracing::warn!(
            line = step.line_number(),
            ordinal,
            failed,
            "Stack trace does not correspond to a failed test"
        );
        step.count(names::ORPHAN_STACK_TRACE);
        return Ok(MochaState::AwaitingStackTraces);
    }

    step.begin_stack_trace(ordinal - 1, Some(hit.matched()))?;
    Ok(MochaState::AwaitingStackTraces)
}

fn recount(summary: &mut TestRunSummary, line: u64) -> Result<(), ParserError> {
    summary.total_tests = sum_counts(
        &[summary.total_passed, summary.total_failed, summary.total_skipped],
        line,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::CollectingPublisher;
    use crate::result::TestRun;
    use crate::telemetry::MemoryTelemetry;
    use similar_asserts::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn parse(lines: &[&str]) -> (Vec<TestRun>, Arc<MemoryTelemetry>) {
        let publisher = Arc::new(CollectingPublisher::new());
        let telemetry = Arc::new(MemoryTelemetry::new());
        let mut parser = MochaParser::new(publisher.clone(), telemetry.clone()).expect("parser");
        for (i, line) in lines.iter().enumerate() {
            parser.consume(line, i as u64 + 1).expect("consume");
        }
        parser.finish().expect("finish");
        (publisher.take(), telemetry)
    }

    #[test]
    fn test_passing_and_failing_run() {
        let (runs, _) = parse(&[
            "  ✓ adds",
            "  1) subtracts",
            "  1 passing (2ms)",
            "  1 failing",
            "  1) subtracts",
            "      AssertionError",
        ]);

        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.passed_tests, vec![TestResult::passed("adds")]);
        assert_eq!(run.failed_tests.len(), 1);
        assert_eq!(run.failed_tests[0].name, "subtracts");
        assert_eq!(
            run.failed_tests[0].stack_trace.as_deref(),
            Some("  1) subtracts\n      AssertionError")
        );
        assert_eq!(run.summary.total_passed, 1);
        assert_eq!(run.summary.total_failed, 1);
        assert_eq!(run.summary.total_tests, 2);
        assert_eq!(run.summary.total_execution_time, Duration::from_millis(2));
    }

    #[test]
    fn test_all_passing_run_publishes_on_next_unmatched_line() {
        let publisher = Arc::new(CollectingPublisher::new());
        let mut parser =
            MochaParser::new(publisher.clone(), Arc::new(MemoryTelemetry::new())).expect("parser");
        let lines = [
            "  Calculator",
            "    ✓ adds (12ms)",
            "    ✓ multiplies",
            "",
            "  2 passing (1s)",
            "",
        ];
        for (i, line) in lines.iter().enumerate() {
            parser.consume(line, i as u64 + 1).expect("consume");
        }

        let runs = publisher.take();
        assert_eq!(runs.len(), 1);
        assert_eq!(
            runs[0].passed_tests[0].execution_time,
            Some(Duration::from_millis(12))
        );
        assert_eq!(runs[0].summary.total_execution_time, Duration::from_secs(1));
        assert_eq!(parser.state(), MochaState::AwaitingResults);
    }

    #[test]
    fn test_pending_tests_are_skipped() {
        let (runs, _) = parse(&["  ✓ adds", "  - divides", "  1 passing (3ms)", "  1 pending", ""]);

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].skipped_tests, vec![TestResult::skipped("divides")]);
        assert_eq!(runs[0].summary.total_skipped, 1);
        assert_eq!(runs[0].summary.total_tests, 2);
    }

    #[test]
    fn test_traces_are_matched_by_ordinal() {
        let (runs, _) = parse(&[
            "  1) first",
            "  2) second",
            "  0 passing (4ms)",
            "  2 failing",
            "",
            "  1) first:",
            "     Error: one",
            "",
            "  2) second:",
            "     Error: two",
        ]);

        let failed = &runs[0].failed_tests;
        assert_eq!(failed[0].stack_trace.as_deref(), Some("  1) first:\n     Error: one"));
        assert_eq!(failed[1].stack_trace.as_deref(), Some("  2) second:\n     Error: two"));
    }

    #[test]
    fn test_numbering_gap_is_tagged_but_kept() {
        let (runs, telemetry) = parse(&["  1) a", "  3) b", "  0 passing (1ms)", "  2 failing"]);

        assert_eq!(runs[0].failed_tests.len(), 2);
        assert_eq!(telemetry.count("Mocha", names::UNEXPECTED_ORDINAL), 1.0);
    }

    #[test]
    fn test_huge_ordinal_is_a_gap() {
        let (runs, telemetry) = parse(&["  18446744073709551615) a", "  2) b"]);

        assert!(runs.is_empty());
        assert_eq!(telemetry.count("Mocha", names::UNEXPECTED_ORDINAL), 2.0);
    }

    #[test]
    fn test_overflowing_summary_poisons_parser() {
        let publisher = Arc::new(CollectingPublisher::new());
        let telemetry = Arc::new(MemoryTelemetry::new());
        let mut parser = MochaParser::new(publisher.clone(), telemetry.clone()).expect("parser");
        parser.consume("  18446744073709551615 passing (1ms)", 1).expect("consume");

        let err = parser.consume("  1 pending", 2).expect_err("sum does not fit");
        assert!(matches!(err, ParserError::InvalidNumber { line: 2, .. }));
        assert!(matches!(
            parser.consume("  1 failing", 3),
            Err(ParserError::Poisoned { .. })
        ));
        assert!(publisher.is_empty());
        assert_eq!(telemetry.count("Mocha", names::INTERNAL_ERROR), 1.0);
    }

    #[test]
    fn test_numbering_restart_starts_a_new_run() {
        let (runs, telemetry) = parse(&["  1) a", "  2) b", "  1) c"]);

        // Neither run printed a summary.
        assert!(runs.is_empty());
        assert_eq!(telemetry.count("Mocha", names::NO_SUMMARY), 2.0);
    }

    #[test]
    fn test_consecutive_runs_do_not_leak() {
        let (runs, _) = parse(&[
            "  ✓ a",
            "  1) b",
            "  1 passing (1ms)",
            "  1 failing",
            "  1) b",
            "     Error",
            "  ✓ c",
            "  ✓ d",
            "  2 passing (2ms)",
            "",
        ]);

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].failed_tests[0].stack_trace.as_deref(), Some("  1) b\n     Error"));
        assert_eq!(runs[0].test_run_id, 1);
        assert_eq!(runs[1].test_run_id, 2);
        assert_eq!(runs[1].passed_tests.len(), 2);
        assert!(runs[1].failed_tests.is_empty());
    }

    #[test]
    fn test_overlong_last_trace_is_discarded_and_run_published() {
        let publisher = Arc::new(CollectingPublisher::new());
        let telemetry = Arc::new(MemoryTelemetry::new());
        let mut parser = MochaParser::new(publisher.clone(), telemetry.clone()).expect("parser");

        let mut lines = vec![
            "  1) a".to_string(),
            "  0 passing (1ms)".to_string(),
            "  1 failing".to_string(),
            "  1) a".to_string(),
        ];
        lines.extend((0..=STACK_TRACE_LINE_BUDGET).map(|i| format!("     at frame {i}")));
        for (i, line) in lines.iter().enumerate() {
            parser.consume(line, i as u64 + 1).expect("consume");
        }

        let runs = publisher.take();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].failed_tests[0].stack_trace.is_none());
        assert_eq!(telemetry.count("Mocha", names::STACK_TRACE_DISCARDED), 1.0);
    }

    #[test]
    fn test_orphan_trace_marker_is_tagged() {
        let (runs, telemetry) = parse(&["  0 passing (1ms)", "  1 failing", "  1) ghost", "   Error"]);

        assert_eq!(runs.len(), 1);
        assert!(runs[0].failed_tests.is_empty());
        assert_eq!(telemetry.count("Mocha", names::ORPHAN_STACK_TRACE), 1.0);
    }
}
