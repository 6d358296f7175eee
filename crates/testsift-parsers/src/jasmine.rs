// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Jasmine console output grammar
//!
//! ```text
//! Started
//! ..F*
//!
//! Failures:
//! 1) Calculator subtracts
//!   Message:
//!     Expected 1 to equal 2.
//!
//! Pending:
//!
//! 1) Calculator divides
//!   Temporarily disabled with xit
//!
//! 4 specs, 1 failure, 1 pending spec
//! Finished in 0.012 seconds
//! ```
//!
//! Numbered items are classified by the section header above them and must
//! count up from 1 within their section.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::context::{Ordinal, check_ordinal};
use crate::engine::{Engine, Grammar, Rule, Step};
use crate::error::ParserError;
use crate::matcher::{Hit, duration_from_unit, pattern, sum_counts};
use crate::result::TestResult;
use crate::stack_trace::Capture;

/// Engine for Jasmine output
pub type JasmineParser = Engine<Jasmine>;

/// Jasmine grammar
#[derive(Debug)]
pub struct Jasmine;

/// States of the Jasmine machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JasmineState {
    /// Waiting for `Started`
    AwaitingRunStart,
    /// Reading the failure and pending sections
    AwaitingResults,
    /// Summary seen; waiting for `Finished in`
    AwaitingSummary,
}

/// Actions bound to Jasmine rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JasmineAction {
    /// `Started`
    Started,
    /// `Failures:`
    FailuresHeader,
    /// `Pending:`
    PendingHeader,
    /// `<n> specs, <f> failures, <p> pending specs`
    Summary,
    /// `Suite error: <name>`
    SuiteError,
    /// `<n>) <name>`
    Numbered,
    /// `Finished in <secs> seconds`
    Finished,
}

/// Section whose header was seen last
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Section {
    /// Before any header
    #[default]
    None,
    /// Under `Failures:`
    Failures,
    /// Under `Pending:`
    Pending,
}

/// Jasmine-specific context fields
#[derive(Debug, Default)]
pub struct JasmineExtra {
    /// Active section
    pub section: Section,
    /// Failures that belong to a suite rather than a spec
    pub suite_errors: usize,
}

static STARTED: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*Started\s*$"));
static FAILURES_HEADER: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*Failures:\s*$"));
static PENDING_HEADER: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*Pending:\s*$"));
static SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"^\s*(\d+) specs?, (\d+) failures?(?:, (\d+) pending specs?)?\s*$")
});
static SUITE_ERROR: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^\s*(?:(\d+)\)\s+)?Suite error:\s+(.+?)\s*$"));
static NUMBERED: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*(\d+)\)\s+(.+?)\s*$"));
static FINISHED: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^\s*Finished in (\d+(?:\.\d+)?) seconds?\s*$"));

macro_rules! rule {
    ($name:literal, $pattern:ident, $action:ident) => {
        Rule {
            name: $name,
            pattern: &$pattern,
            action: JasmineAction::$action,
        }
    };
}

static RUN_START_RULES: [Rule<JasmineAction>; 1] = [rule!("started", STARTED, Started)];
static RESULTS_RULES: [Rule<JasmineAction>; 6] = [
    rule!("started", STARTED, Started),
    rule!("failures header", FAILURES_HEADER, FailuresHeader),
    rule!("pending header", PENDING_HEADER, PendingHeader),
    rule!("summary", SUMMARY, Summary),
    rule!("suite error", SUITE_ERROR, SuiteError),
    rule!("numbered item", NUMBERED, Numbered),
];
static SUMMARY_RULES: [Rule<JasmineAction>; 2] = [
    rule!("finished", FINISHED, Finished),
    rule!("started", STARTED, Started),
];

impl Grammar for Jasmine {
    type State = JasmineState;
    type Action = JasmineAction;
    type Extra = JasmineExtra;

    const NAME: &'static str = "Jasmine";
    const VERSION: &'static str = "1.0";

    fn initial_state() -> JasmineState {
        JasmineState::AwaitingRunStart
    }

    fn rules(state: JasmineState) -> &'static [Rule<JasmineAction>] {
        match state {
            JasmineState::AwaitingRunStart => &RUN_START_RULES,
            JasmineState::AwaitingResults => &RESULTS_RULES,
            JasmineState::AwaitingSummary => &SUMMARY_RULES,
        }
    }

    fn apply(
        action: JasmineAction,
        state: JasmineState,
        hit: &Hit<'_>,
        step: &mut Step<'_, Self>,
    ) -> Result<JasmineState, ParserError> {
        step.end_stack_trace();

        match action {
            JasmineAction::Started => {
                if state != JasmineState::AwaitingRunStart {
                    debug!(
                        line = step.line_number(),
                        "Next run started before the previous one closed"
                    );
                    step.reconcile();
                }
                Ok(JasmineState::AwaitingResults)
            }
            JasmineAction::FailuresHeader => {
                step.extra().section = Section::Failures;
                step.cx().last_failed_ordinal = 0;
                Ok(state)
            }
            JasmineAction::PendingHeader => {
                step.extra().section = Section::Pending;
                step.cx().last_pending_ordinal = 0;
                Ok(state)
            }
            JasmineAction::Summary => summary(hit, step),
            JasmineAction::SuiteError => {
                if let Some(ordinal) = hit.opt_number::<usize>(1)? {
                    follow_ordinal(step, Section::Failures, ordinal);
                }
                let failed = &mut step.run().failed_tests;
                failed.push(TestResult::failed(hit.text(2)?));
                let index = failed.len() - 1;
                step.extra().suite_errors += 1;
                step.begin_stack_trace(index, None)?;
                Ok(JasmineState::AwaitingResults)
            }
            JasmineAction::Numbered => numbered(hit, step),
            JasmineAction::Finished => {
                let duration = duration_from_unit(hit.number(1)?, "s");
                step.run().summary.total_execution_time = duration.unwrap_or_default();
                Ok(step.reconcile())
            }
        }
    }

    fn on_unmatched(
        state: JasmineState,
        line: &str,
        step: &mut Step<'_, Self>,
    ) -> Result<JasmineState, ParserError> {
        if state == JasmineState::AwaitingResults {
            match step.append_stack_trace(line)? {
                Capture::Appended | Capture::Discarded => return Ok(state),
                Capture::Inactive => {}
            }
        }
        Ok(step.expire_line_window().unwrap_or(state))
    }
}

fn numbered(hit: &Hit<'_>, step: &mut Step<'_, Jasmine>) -> Result<JasmineState, ParserError> {
    let ordinal: usize = hit.number(1)?;
    let name = hit.text(2)?;
    let section = step.extra().section;

    match section {
        Section::None => {
            debug!(line = step.line_number(), "Numbered line outside any section");
        }
        Section::Failures => {
            follow_ordinal(step, section, ordinal);
            let failed = &mut step.run().failed_tests;
            failed.push(TestResult::failed(name));
            let index = failed.len() - 1;
            step.begin_stack_trace(index, None)?;
        }
        Section::Pending => {
            follow_ordinal(step, section, ordinal);
            step.run().skipped_tests.push(TestResult::skipped(name));
        }
    }
    Ok(JasmineState::AwaitingResults)
}

/// Check a section ordinal; a restart at 1 closes the run in progress
fn follow_ordinal(step: &mut Step<'_, Jasmine>, section: Section, ordinal: usize) {
    let last = match section {
        Section::Pending => step.cx().last_pending_ordinal,
        Section::Failures | Section::None => step.cx().last_failed_ordinal,
    };

    match check_ordinal(last, ordinal) {
        Ordinal::Next => {}
        Ordinal::Restart => {
            debug!(
                line = step.line_number(),
                last, "Numbering restarted, treating as a new run"
            );
            step.reconcile();
            step.extra().section = section;
        }
        Ordinal::Gap => step.unexpected_ordinal(
            if section == Section::Pending { "pending" } else { "failed" },
            last.saturating_add(1),
            ordinal,
        ),
    }

    let cx = step.cx();
    match section {
        Section::Pending => cx.last_pending_ordinal = ordinal,
        Section::Failures | Section::None => cx.last_failed_ordinal = ordinal,
    }
}

/// Suite errors are printed as failures but not as specs, so the published
/// total can exceed the printed spec count by the number of suite errors.
fn summary(hit: &Hit<'_>, step: &mut Step<'_, Jasmine>) -> Result<JasmineState, ParserError> {
    let specs: usize = hit.number(1)?;
    let failures: usize = hit.number(2)?;
    let pending: usize = hit.opt_number(3)?.unwrap_or(0);
    let suite_errors = step.extra().suite_errors;

    let line = step.line_number();

    // Printed failures include suite errors, which are not specs.
    let failed_specs = failures.saturating_sub(suite_errors);
    let passed = specs.saturating_sub(sum_counts(&[failed_specs, pending], line)?);
    let total = sum_counts(&[passed, failures, pending], line)?;

    let cx = step.cx();
    cx.summary_seen = true;
    let summary = &mut cx.run.summary;
    summary.total_failed = failures;
    summary.total_skipped = pending;
    summary.total_passed = passed;
    summary.total_tests = total;

    step.expect_within(1, "Finished in");
    Ok(JasmineState::AwaitingSummary)
}
