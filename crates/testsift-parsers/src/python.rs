// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Python unittest console output grammar
//!
//! Verbose unittest output prints one line per test, followed by a detail
//! section for every failure and a two-line summary:
//!
//! ```text
//! test_add (test_calc.CalcTest) ... ok
//! test_sub (test_calc.CalcTest) ... FAIL
//!
//! ======================================================================
//! FAIL: test_sub (test_calc.CalcTest)
//! ----------------------------------------------------------------------
//! Traceback (most recent call last):
//! AssertionError: 1 != 2
//!
//! ----------------------------------------------------------------------
//! Ran 2 tests in 0.002s
//!
//! FAILED (failures=1)
//! ```
//!
//! A test that writes to the console splits its line: the name and `...`
//! come first, the outcome arrives on a later line of its own.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::engine::{Engine, Grammar, Rule, Step};
use crate::error::ParserError;
use crate::matcher::{Hit, duration_from_unit, pattern, sum_counts, tally, tallied};
use crate::result::{TestResult, TestRun};
use crate::stack_trace::Capture;
use crate::telemetry::names;

/// Engine for Python unittest output
pub type PythonParser = Engine<Python>;

/// Python unittest grammar
#[derive(Debug)]
pub struct Python;

/// States of the Python machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PythonState {
    /// Reading per-test result lines
    AwaitingResults,
    /// Inside the failure detail sections
    AwaitingFailedDetail,
    /// `Ran ...` seen; waiting for `OK` or `FAILED (...)`
    AwaitingSummary,
}

/// Actions bound to Python rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PythonAction {
    /// `<name> ... <outcome>`
    TestResult,
    /// `<name> ... ` with the outcome still to come
    PartialResult,
    /// A bare outcome completing a partial result
    Outcome,
    /// `FAIL: <name>` or `ERROR: <name>`
    FailedDetail,
    /// A line of dashes
    DashBorder,
    /// A line of equals signs
    EqualsBorder,
    /// `Ran <n> tests in <secs>s`
    Ran,
    /// `OK` with optional counts
    Ok,
    /// `FAILED (...)`
    Failed,
}

/// Python-specific context fields
#[derive(Debug, Default)]
pub struct PythonExtra {
    /// Name of a test whose outcome has not been printed yet
    pub partial: Option<String>,
    /// Failed test whose detail section is open
    pub detail: Option<usize>,
    /// Total printed by the `Ran` line
    pub ran_total: usize,
}

const OUTCOMES: &str = r"ok|FAIL|ERROR|skipped(?:\s.*)?|expected failure|unexpected success";

static TEST_RESULT: LazyLock<Regex> =
    LazyLock::new(|| pattern(&format!(r"^(.+?) \.\.\. ({OUTCOMES})\s*$")));
static PARTIAL_RESULT: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(.+?) \.\.\.(?:\s.*)?$"));
static OUTCOME: LazyLock<Regex> = LazyLock::new(|| pattern(&format!(r"^\s*({OUTCOMES})\s*$")));
static FAILED_DETAIL: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(FAIL|ERROR): (.+?)\s*$"));
static DASH_BORDER: LazyLock<Regex> = LazyLock::new(|| pattern(r"^-{10,}\s*$"));
static EQUALS_BORDER: LazyLock<Regex> = LazyLock::new(|| pattern(r"^={10,}\s*$"));
static RAN: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^Ran (\d+) tests? in (\d+(?:\.\d+)?)s\s*$"));
static OK: LazyLock<Regex> = LazyLock::new(|| pattern(r"^OK(?:\s+\((.*)\))?\s*$"));
static FAILED: LazyLock<Regex> = LazyLock::new(|| pattern(r"^FAILED\s+\((.*)\)\s*$"));
static SUMMARY_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?P<kind>failures|errors|skipped|expected failures|unexpected successes)=(?P<count>\d+)",
    )
});

macro_rules! rule {
    ($name:literal, $pattern:ident, $action:ident) => {
        Rule {
            name: $name,
            pattern: &$pattern,
            action: PythonAction::$action,
        }
    };
}

static RESULTS_RULES: [Rule<PythonAction>; 7] = [
    rule!("test result", TEST_RESULT, TestResult),
    rule!("partial result", PARTIAL_RESULT, PartialResult),
    rule!("outcome", OUTCOME, Outcome),
    rule!("failed detail", FAILED_DETAIL, FailedDetail),
    rule!("equals border", EQUALS_BORDER, EqualsBorder),
    rule!("dash border", DASH_BORDER, DashBorder),
    rule!("ran", RAN, Ran),
];
static FAILED_DETAIL_RULES: [Rule<PythonAction>; 4] = [
    rule!("failed detail", FAILED_DETAIL, FailedDetail),
    rule!("dash border", DASH_BORDER, DashBorder),
    rule!("equals border", EQUALS_BORDER, EqualsBorder),
    rule!("ran", RAN, Ran),
];
static SUMMARY_RULES: [Rule<PythonAction>; 3] = [
    rule!("ok", OK, Ok),
    rule!("failed", FAILED, Failed),
    rule!("test result", TEST_RESULT, TestResult),
];

impl Grammar for Python {
    type State = PythonState;
    type Action = PythonAction;
    type Extra = PythonExtra;

    const NAME: &'static str = "Python";
    const VERSION: &'static str = "1.0";

    fn initial_state() -> PythonState {
        PythonState::AwaitingResults
    }

    fn rules(state: PythonState) -> &'static [Rule<PythonAction>] {
        match state {
            PythonState::AwaitingResults => &RESULTS_RULES,
            PythonState::AwaitingFailedDetail => &FAILED_DETAIL_RULES,
            PythonState::AwaitingSummary => &SUMMARY_RULES,
        }
    }

    fn apply(
        action: PythonAction,
        state: PythonState,
        hit: &Hit<'_>,
        step: &mut Step<'_, Self>,
    ) -> Result<PythonState, ParserError> {
        match action {
            PythonAction::TestResult => {
                if state == PythonState::AwaitingSummary {
                    debug!(
                        line = step.line_number(),
                        "Next run started before the summary completed"
                    );
                    step.reconcile();
                }
                drop_partial(step);
                record(step.run(), hit.text(1)?, hit.text(2)?);
                Ok(PythonState::AwaitingResults)
            }
            PythonAction::PartialResult => {
                drop_partial(step);
                step.extra().partial = Some(hit.text(1)?.to_string());
                Ok(state)
            }
            PythonAction::Outcome => {
                let partial = step.extra().partial.take();
                match partial {
                    Some(name) => record(step.run(), &name, hit.text(1)?),
                    None => debug!(line = step.line_number(), "Outcome without a pending test"),
                }
                Ok(state)
            }
            PythonAction::FailedDetail => {
                drop_partial(step);
                step.end_stack_trace();
                let name = hit.text(2)?;
                let failed = &mut step.run().failed_tests;
                let index = match failed
                    .iter()
                    .position(|t| t.name == name && t.stack_trace.is_none())
                {
                    Some(index) => index,
                    None => {
                        failed.push(TestResult::failed(name));
                        failed.len() - 1
                    }
                };
                step.extra().detail = Some(index);
                Ok(PythonState::AwaitingFailedDetail)
            }
            PythonAction::DashBorder => {
                if step.cx().stack_trace.is_active() {
                    step.end_stack_trace();
                } else if let Some(index) = step.extra().detail.take() {
                    step.begin_stack_trace(index, None)?;
                }
                Ok(state)
            }
            PythonAction::EqualsBorder => {
                step.end_stack_trace();
                step.extra().detail = None;
                Ok(PythonState::AwaitingFailedDetail)
            }
            PythonAction::Ran => {
                drop_partial(step);
                step.end_stack_trace();
                let total: usize = hit.number(1)?;
                let duration = duration_from_unit(hit.number(2)?, "s");
                step.extra().ran_total = total;

                let line = step.line_number();
                let cx = step.cx();
                cx.summary_seen = true;
                let run = &mut cx.run;
                run.summary.total_execution_time = duration.unwrap_or_default();
                // Provisional until the OK/FAILED line confirms the counts.
                let failed = run.failed_tests.len();
                let skipped = run.skipped_tests.len();
                derive_counts(run, total, failed, skipped, line)?;

                step.expect_within(2, "OK or FAILED");
                Ok(PythonState::AwaitingSummary)
            }
            PythonAction::Ok | PythonAction::Failed => {
                let counts = match hit.get(1) {
                    Some(text) => tally(&SUMMARY_COUNT, text, step.line_number())?,
                    None => Vec::new(),
                };
                let line = step.line_number();
                let failed = sum_counts(
                    &[
                        tallied(&counts, "failures"),
                        tallied(&counts, "errors"),
                        tallied(&counts, "unexpected successes"),
                    ],
                    line,
                )?;
                let skipped = tallied(&counts, "skipped");

                let total = step.extra().ran_total;
                derive_counts(step.run(), total, failed, skipped, line)?;
                Ok(step.reconcile())
            }
        }
    }

    fn on_unmatched(
        state: PythonState,
        line: &str,
        step: &mut Step<'_, Self>,
    ) -> Result<PythonState, ParserError> {
        if state == PythonState::AwaitingFailedDetail {
            match step.append_stack_trace(line)? {
                Capture::Appended | Capture::Discarded => return Ok(state),
                Capture::Inactive => {}
            }
        }
        Ok(step.expire_line_window().unwrap_or(state))
    }
}

fn record(run: &mut TestRun, name: &str, outcome: &str) {
    match outcome {
        "ok" | "expected failure" => run.passed_tests.push(TestResult::passed(name)),
        "FAIL" | "ERROR" | "unexpected success" => run.failed_tests.push(TestResult::failed(name)),
        _ => run.skipped_tests.push(TestResult::skipped(name)),
    }
}

fn drop_partial(step: &mut Step<'_, Python>) {
    if let Some(name) = step.extra().partial.take() {
        warn!(
            line = step.line_number(),
            test = %name,
            "Test result never received its outcome"
        );
        step.count(names::UNRESOLVED_PARTIAL);
    }
}

/// Passed is never printed; it is what remains of the total.
fn derive_counts(
    run: &mut TestRun,
    total: usize,
    failed: usize,
    skipped: usize,
    line: u64,
) -> Result<(), ParserError> {
    let not_passed = sum_counts(&[failed, skipped], line)?;
    let summary = &mut run.summary;
    summary.total_failed = failed;
    summary.total_skipped = skipped;
    summary.total_passed = total.saturating_sub(not_passed);
    summary.total_tests = sum_counts(&[summary.total_passed, failed, skipped], line)?;
    Ok(())
}
