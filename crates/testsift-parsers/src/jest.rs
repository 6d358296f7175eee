// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Jest console output grammar
//!
//! Handles both reporter styles. Verbose output lists each test under its
//! file header:
//!
//! ```text
//! FAIL src/calc.test.js
//!   Calculator
//!     ✓ adds (3 ms)
//!     ✕ subtracts (2 ms)
//!
//!   ● Calculator › subtracts
//!
//!     expect(received).toBe(expected)
//!
//! Test Suites: 1 failed, 1 total
//! Tests:       1 failed, 1 passed, 2 total
//! Snapshots:   0 total
//! Time:        1.234 s
//! ```
//!
//! Non-verbose output prints a dot-status line instead, so failures are only
//! known from their `●` blocks. `● Console` blocks carry captured console
//! output and are not failures.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::engine::{Engine, Grammar, Rule, Step};
use crate::error::ParserError;
use crate::matcher::{Hit, duration_from_unit, pattern, sum_counts, tally, tallied};
use crate::result::TestResult;
use crate::stack_trace::Capture;
use crate::telemetry::names;

/// Engine for Jest output
pub type JestParser = Engine<Jest>;

/// Jest grammar
#[derive(Debug)]
pub struct Jest;

/// States of the Jest machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JestState {
    /// Waiting for a file header or dot-status line
    AwaitingRunStart,
    /// Reading per-test status lines
    AwaitingResults,
    /// Capturing the body of a `●` block
    AwaitingStackTraces,
    /// Reading the closing summary block
    AwaitingSummary,
}

/// Actions bound to Jest rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JestAction {
    /// `PASS <file>` or `FAIL <file>`
    RunStart,
    /// Dot-status line of the non-verbose reporter
    DotStatus,
    /// `✓ <name>`
    PassedTest,
    /// `✕ <name>`
    FailedTest,
    /// `○ skipped <name>`
    SkippedTest,
    /// `✎ todo <name>`
    TodoTest,
    /// `● <name>`
    StackTraceStart,
    /// `Summary of all failing tests`
    FailingSummary,
    /// `Test Suites: ...`
    SuitesSummary,
    /// `Tests: ...`
    TestsSummary,
    /// `Time: ...`
    TimeSummary,
}

/// Jest-specific context fields
#[derive(Debug, Default)]
pub struct JestExtra {
    /// Per-test status lines were seen
    pub verbose: bool,
    /// A dot-status line was seen
    pub non_verbose: bool,
    /// `Summary of all failing tests` was seen; later `●` blocks repeat
    /// failures already recorded
    pub failing_summary_seen: bool,
}

static RUN_START: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*(PASS|FAIL)\s+(\S.*?)\s*$"));
static DOT_STATUS: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*[.F*]+\s*$"));
static PASSED_TEST: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"^\s*(?:✓|√)\s+(.+?)(?:\s+\((\d+(?:\.\d+)?)\s?(ms|s|m|h)\))?\s*$")
});
static FAILED_TEST: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"^\s*(?:✕|×)\s+(.+?)(?:\s+\((\d+(?:\.\d+)?)\s?(ms|s|m|h)\))?\s*$")
});
static SKIPPED_TEST: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^\s*○\s+(?:skipped\s+)?(.+?)\s*$"));
static TODO_TEST: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*✎\s+todo\s+(.+?)\s*$"));
static STACK_TRACE_START: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*●\s+(.+?)\s*$"));
static FAILING_SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^\s*Summary of all failing tests\s*$"));
static SUITES_SUMMARY: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*Test Suites:\s+(.*)$"));
static TESTS_SUMMARY: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*Tests:\s+(.*)$"));
static TIME_SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^\s*Time:\s+(\d+(?:\.\d+)?)\s?(ms|s|m|h)\b"));
static TESTS_COUNT: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?P<count>\d+) (?P<kind>failed|passed|skipped|todo|total)"));

const CONSOLE_BLOCK: &str = "Console";

macro_rules! rule {
    ($name:literal, $pattern:ident, $action:ident) => {
        Rule {
            name: $name,
            pattern: &$pattern,
            action: JestAction::$action,
        }
    };
}

static RUN_START_RULES: [Rule<JestAction>; 2] = [
    rule!("run start", RUN_START, RunStart),
    rule!("dot status", DOT_STATUS, DotStatus),
];
static RESULTS_RULES: [Rule<JestAction>; 10] = [
    rule!("run start", RUN_START, RunStart),
    rule!("passed test", PASSED_TEST, PassedTest),
    rule!("failed test", FAILED_TEST, FailedTest),
    rule!("skipped test", SKIPPED_TEST, SkippedTest),
    rule!("todo test", TODO_TEST, TodoTest),
    rule!("stack trace start", STACK_TRACE_START, StackTraceStart),
    rule!("failing summary", FAILING_SUMMARY, FailingSummary),
    rule!("suites summary", SUITES_SUMMARY, SuitesSummary),
    rule!("tests summary", TESTS_SUMMARY, TestsSummary),
    rule!("dot status", DOT_STATUS, DotStatus),
];
static STACK_TRACE_RULES: [Rule<JestAction>; 5] = [
    rule!("stack trace start", STACK_TRACE_START, StackTraceStart),
    rule!("run start", RUN_START, RunStart),
    rule!("failing summary", FAILING_SUMMARY, FailingSummary),
    rule!("suites summary", SUITES_SUMMARY, SuitesSummary),
    rule!("tests summary", TESTS_SUMMARY, TestsSummary),
];
static SUMMARY_RULES: [Rule<JestAction>; 5] = [
    rule!("tests summary", TESTS_SUMMARY, TestsSummary),
    rule!("time summary", TIME_SUMMARY, TimeSummary),
    rule!("suites summary", SUITES_SUMMARY, SuitesSummary),
    rule!("run start", RUN_START, RunStart),
    rule!("dot status", DOT_STATUS, DotStatus),
];

impl Grammar for Jest {
    type State = JestState;
    type Action = JestAction;
    type Extra = JestExtra;

    const NAME: &'static str = "Jest";
    const VERSION: &'static str = "1.0";

    fn initial_state() -> JestState {
        JestState::AwaitingRunStart
    }

    fn rules(state: JestState) -> &'static [Rule<JestAction>] {
        match state {
            JestState::AwaitingRunStart => &RUN_START_RULES,
            JestState::AwaitingResults => &RESULTS_RULES,
            JestState::AwaitingStackTraces => &STACK_TRACE_RULES,
            JestState::AwaitingSummary => &SUMMARY_RULES,
        }
    }

    fn apply(
        action: JestAction,
        state: JestState,
        hit: &Hit<'_>,
        step: &mut Step<'_, Self>,
    ) -> Result<JestState, ParserError> {
        step.end_stack_trace();

        match action {
            JestAction::RunStart | JestAction::DotStatus => {
                if state == JestState::AwaitingSummary {
                    debug!(
                        line = step.line_number(),
                        "Next run started before the summary completed"
                    );
                    step.reconcile();
                }
                if action == JestAction::DotStatus {
                    step.extra().non_verbose = true;
                } else {
                    debug!(line = step.line_number(), file = hit.get(2), "Test file");
                }
                Ok(JestState::AwaitingResults)
            }
            JestAction::PassedTest => {
                let test = TestResult::passed(hit.text(1)?).with_execution_time(test_time(hit)?);
                step.extra().verbose = true;
                step.run().passed_tests.push(test);
                Ok(JestState::AwaitingResults)
            }
            JestAction::FailedTest => {
                let test = TestResult::failed(hit.text(1)?).with_execution_time(test_time(hit)?);
                step.extra().verbose = true;
                step.run().failed_tests.push(test);
                Ok(JestState::AwaitingResults)
            }
            JestAction::SkippedTest | JestAction::TodoTest => {
                step.extra().verbose = true;
                step.run().skipped_tests.push(TestResult::skipped(hit.text(1)?));
                Ok(JestState::AwaitingResults)
            }
            JestAction::StackTraceStart => stack_trace_start(hit, step),
            JestAction::FailingSummary => {
                step.extra().failing_summary_seen = true;
                Ok(JestState::AwaitingStackTraces)
            }
            JestAction::SuitesSummary => {
                step.expect_within(3, "Tests:");
                Ok(JestState::AwaitingSummary)
            }
            JestAction::TestsSummary => tests_summary(hit, step),
            JestAction::TimeSummary => {
                let duration = duration_from_unit(hit.number(1)?, hit.text(2)?);
                step.run().summary.total_execution_time = duration.unwrap_or_default();
                Ok(step.reconcile())
            }
        }
    }

    fn on_unmatched(
        state: JestState,
        line: &str,
        step: &mut Step<'_, Self>,
    ) -> Result<JestState, ParserError> {
        if state == JestState::AwaitingStackTraces {
            match step.append_stack_trace(line)? {
                Capture::Appended | Capture::Discarded => return Ok(state),
                Capture::Inactive => {}
            }
        }
        Ok(step.expire_line_window().unwrap_or(state))
    }
}

fn test_time(hit: &Hit<'_>) -> Result<Option<std::time::Duration>, ParserError> {
    Ok(match (hit.opt_number::<f64>(2)?, hit.get(3)) {
        (Some(value), Some(unit)) => duration_from_unit(value, unit),
        _ => None,
    })
}

fn stack_trace_start(hit: &Hit<'_>, step: &mut Step<'_, Jest>) -> Result<JestState, ParserError> {
    let name = hit.text(1)?;

    if name == CONSOLE_BLOCK {
        debug!(line = step.line_number(), "Skipping console output block");
        return Ok(JestState::AwaitingStackTraces);
    }
    if step.extra().failing_summary_seen {
        // Repeat of a failure already recorded for its file.
        return Ok(JestState::AwaitingStackTraces);
    }

    // Verbose failures are listed by title; the block names the full path.
    let existing = step.run().failed_tests.iter().position(|t| {
        t.stack_trace.is_none()
            && (t.name == name
                || name
                    .strip_suffix(t.name.as_str())
                    .is_some_and(|path| path.ends_with(" › ")))
    });

    let index = match existing {
        Some(index) => index,
        None => {
            let failed = &mut step.run().failed_tests;
            failed.push(TestResult::failed(name));
            failed.len() - 1
        }
    };
    step.begin_stack_trace(index, None)?;
    Ok(JestState::AwaitingStackTraces)
}

fn tests_summary(hit: &Hit<'_>, step: &mut Step<'_, Jest>) -> Result<JestState, ParserError> {
    let line = step.line_number();
    let counts = tally(&TESTS_COUNT, hit.text(1)?, line)?;
    let failed = tallied(&counts, "failed");
    let passed = tallied(&counts, "passed");
    let skipped = sum_counts(&[tallied(&counts, "skipped"), tallied(&counts, "todo")], line)?;
    let printed_total = tallied(&counts, "total");
    let counted = sum_counts(&[passed, failed, skipped], line)?;

    let cx = step.cx();
    cx.summary_seen = true;
    let summary = &mut cx.run.summary;
    summary.total_failed = failed;
    summary.total_passed = passed;
    summary.total_skipped = skipped;
    summary.total_tests = counted;

    if printed_total != summary.total_tests {
        warn!(
            line = step.line_number(),
            printed_total,
            counted,
            "Printed test total differs from the sum of its parts"
        );
        step.count(&format!("{}Total", names::SUMMARY_MISMATCH));
    }

    let verbose = step.extra().verbose;
    step.tag(names::VERBOSE_MODE, verbose);
    step.expect_within(3, "Time:");
    Ok(JestState::AwaitingSummary)
}
