// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Generic line-driven state machine
//!
//! An [`Engine`] is parameterized by a [`Grammar`]: a closed set of states,
//! each with an ordered table of `(pattern, action)` rules. Every consumed
//! line is matched against the active state's table; the first rule that
//! matches runs its action, which returns the next state. Lines that match
//! nothing go to the grammar's no-match hook.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use testsift_parsers::{CollectingPublisher, MochaParser, NoopTelemetry};
//!
//! let publisher = Arc::new(CollectingPublisher::new());
//! let mut parser = MochaParser::new(publisher.clone(), Arc::new(NoopTelemetry)).unwrap();
//! for (i, line) in ["  ✓ adds", "  1 passing (2ms)"].iter().enumerate() {
//!     parser.consume(line, i as u64 + 1).unwrap();
//! }
//! parser.finish().unwrap();
//! assert_eq!(publisher.len(), 1);
//! ```

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use crate::context::{RunContext, WindowTick};
use crate::error::ParserError;
use crate::matcher::{DEFAULT_MATCH_BUDGET, Evaluation, Hit, PatternMatcher, sanitize};
use crate::publish::Publisher;
use crate::reconcile::RunSink;
use crate::result::{ParserUri, TestRun};
use crate::stack_trace::Capture;
use crate::telemetry::{TelemetryCollector, names};

/// One entry of a state's rule table
pub struct Rule<A: 'static> {
    /// Name used in diagnostics
    pub name: &'static str,
    /// Pattern tried against each line
    pub pattern: &'static LazyLock<Regex>,
    /// Action run on a match
    pub action: A,
}

impl<A: fmt::Debug> fmt::Debug for Rule<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("action", &self.action)
            .finish()
    }
}

/// A test runner's console grammar, supplied to [`Engine`] as data
pub trait Grammar: Sized + 'static {
    /// Closed set of states; the machine cycles back to the initial one
    type State: Copy + Eq + fmt::Debug + Send + 'static;
    /// Named actions bound to rules
    type Action: Copy + fmt::Debug + Send + Sync + 'static;
    /// Grammar-specific context fields
    type Extra: Default + fmt::Debug + Send;

    /// Parser name, first half of the parser uri
    const NAME: &'static str;
    /// Parser version, second half of the parser uri
    const VERSION: &'static str;

    /// State at construction and after every reset
    fn initial_state() -> Self::State;

    /// Ordered rules for a state
    fn rules(state: Self::State) -> &'static [Rule<Self::Action>];

    /// Run the action of a matched rule and return the next state
    ///
    /// # Errors
    ///
    /// Any error is an internal fault and poisons the engine.
    fn apply(
        action: Self::Action,
        state: Self::State,
        hit: &Hit<'_>,
        step: &mut Step<'_, Self>,
    ) -> Result<Self::State, ParserError>;

    /// Handle a line no rule matched
    ///
    /// The default charges the line to the line window.
    ///
    /// # Errors
    ///
    /// Any error is an internal fault and poisons the engine.
    fn on_unmatched(
        state: Self::State,
        _line: &str,
        step: &mut Step<'_, Self>,
    ) -> Result<Self::State, ParserError> {
        Ok(step.expire_line_window().unwrap_or(state))
    }
}

/// Options for constructing an engine
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Prefix stamped on every published run
    pub run_name_prefix: String,
    /// Wall-clock budget of a single pattern evaluation
    pub match_budget: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            run_name_prefix: String::new(),
            match_budget: DEFAULT_MATCH_BUDGET,
        }
    }
}

impl EngineOptions {
    /// Set the run name prefix
    #[must_use]
    pub fn run_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.run_name_prefix = prefix.into();
        self
    }

    /// Set the pattern evaluation budget
    #[must_use]
    pub fn match_budget(mut self, budget: Duration) -> Self {
        self.match_budget = budget;
        self
    }
}

/// Capability handle given to grammar actions
///
/// Exposes the run context plus the engine operations an action may need:
/// reconciliation, the line window, stack-trace capture and telemetry.
pub struct Step<'a, G: Grammar> {
    cx: &'a mut RunContext<G::Extra>,
    sink: &'a mut RunSink,
}

impl<'a, G: Grammar> Step<'a, G> {
    fn new(cx: &'a mut RunContext<G::Extra>, sink: &'a mut RunSink) -> Self {
        Self { cx, sink }
    }

    /// The run context
    pub fn cx(&mut self) -> &mut RunContext<G::Extra> {
        &mut *self.cx
    }

    /// The run in progress
    pub fn run(&mut self) -> &mut TestRun {
        &mut self.cx.run
    }

    /// Grammar-specific context fields
    pub fn extra(&mut self) -> &mut G::Extra {
        &mut self.cx.extra
    }

    /// Number of the line being processed
    #[must_use]
    pub fn line_number(&self) -> u64 {
        self.cx.line_number
    }

    /// Record a metric under this parser's area
    pub fn tag(&self, name: &str, value: impl Into<Value>) {
        self.sink.tag(name, value);
    }

    /// Bump a counter under this parser's area
    pub fn count(&self, name: &str) {
        self.sink.count(name);
    }

    /// Finish the run in progress and return the initial state
    ///
    /// The run is published if it passes the minimum-content gate; the
    /// context is reset either way.
    pub fn reconcile(&mut self) -> G::State {
        self.sink.reconcile(&mut *self.cx);
        G::initial_state()
    }

    /// Expect a match within `lines` unmatched lines
    pub fn expect_within(&mut self, lines: i64, hint: &'static str) {
        self.cx.line_window.expect_within(lines, hint);
    }

    /// Charge an unmatched line to the line window
    ///
    /// Returns the initial state when the window expired and the run was
    /// reconciled.
    pub fn expire_line_window(&mut self) -> Option<G::State> {
        let hint = self.cx.line_window.hint();
        match self.cx.line_window.tick() {
            WindowTick::Expired => {
                debug!(
                    parser = G::NAME,
                    line = self.cx.line_number,
                    expected = hint,
                    "Expected match did not arrive, resetting"
                );
                self.count(names::LINE_WINDOW_EXPIRED);
                Some(self.reconcile())
            }
            WindowTick::Counting | WindowTick::Unconstrained => None,
        }
    }

    /// Start capturing a stack trace for `run.failed_tests[index]`
    ///
    /// # Errors
    ///
    /// Returns `ParserError::DanglingStackTrace` if `index` is out of range.
    pub fn begin_stack_trace(
        &mut self,
        index: usize,
        marker: Option<&str>,
    ) -> Result<(), ParserError> {
        let cx = &mut *self.cx;
        cx.stack_trace.begin(&mut cx.run, index, marker)
    }

    /// Stop the active stack-trace capture
    pub fn end_stack_trace(&mut self) {
        self.cx.stack_trace.end();
    }

    /// Offer an unmatched line to the active stack-trace capture
    ///
    /// # Errors
    ///
    /// Returns `ParserError::DanglingStackTrace` if the capture target
    /// vanished.
    pub fn append_stack_trace(&mut self, line: &str) -> Result<Capture, ParserError> {
        let cx = &mut *self.cx;
        let status = cx.stack_trace.append(&mut cx.run, line)?;
        if status == Capture::Discarded {
            warn!(
                parser = G::NAME,
                line = cx.line_number,
                "Stack trace exceeded its line budget and was dropped"
            );
            self.count(names::STACK_TRACE_DISCARDED);
        }
        Ok(status)
    }

    /// Log and tag a numbered item that broke the sequence
    pub fn unexpected_ordinal(&self, kind: &'static str, expected: usize, actual: usize) {
        warn!(
            parser = G::NAME,
            line = self.cx.line_number,
            kind,
            expected,
            actual,
            "Unexpected test case number"
        );
        self.count(names::UNEXPECTED_ORDINAL);
    }
}

/// Line-driven parser for one test runner's console output
///
/// Feed lines in order with strictly increasing line numbers. Completed
/// runs go to the publisher. An engine that returned an error is poisoned
/// and must be replaced.
pub struct Engine<G: Grammar> {
    state: G::State,
    context: RunContext<G::Extra>,
    sink: RunSink,
    matcher: PatternMatcher,
    last_line: Option<u64>,
    poisoned: bool,
}

impl<G: Grammar> Engine<G> {
    /// Create an engine with default options
    ///
    /// # Errors
    ///
    /// Returns `ParserError::InvalidParserUri` if the grammar's name or
    /// version is malformed.
    pub fn new(
        publisher: Arc<dyn Publisher>,
        telemetry: Arc<dyn TelemetryCollector>,
    ) -> Result<Self, ParserError> {
        Self::with_options(publisher, telemetry, EngineOptions::default())
    }

    /// Create an engine with explicit options
    ///
    /// # Errors
    ///
    /// Returns `ParserError::InvalidParserUri` if the grammar's name or
    /// version is malformed.
    pub fn with_options(
        publisher: Arc<dyn Publisher>,
        telemetry: Arc<dyn TelemetryCollector>,
        options: EngineOptions,
    ) -> Result<Self, ParserError> {
        let parser_uri = ParserUri::new(G::NAME, G::VERSION)?;
        let sink = RunSink::new(parser_uri, options.run_name_prefix, publisher, telemetry);
        let context = RunContext::new(sink.fresh_run());
        Ok(Self {
            state: G::initial_state(),
            context,
            sink,
            matcher: PatternMatcher::new(options.match_budget),
            last_line: None,
            poisoned: false,
        })
    }

    /// Active state
    #[must_use]
    pub fn state(&self) -> G::State {
        self.state
    }

    /// Context of the run in progress
    #[must_use]
    pub fn context(&self) -> &RunContext<G::Extra> {
        &self.context
    }

    /// Uri stamped on every run from this engine
    #[must_use]
    pub fn parser_uri(&self) -> &ParserUri {
        self.sink.parser_uri()
    }

    /// Check if an earlier fault disabled this engine
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Process one line of console output
    ///
    /// Out-of-order line numbers are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns the internal fault that poisoned the engine, or
    /// `ParserError::Poisoned` on any call after that.
    pub fn consume(&mut self, line: &str, line_number: u64) -> Result<(), ParserError> {
        self.ensure_usable()?;

        if let Some(last) = self.last_line
            && line_number <= last
        {
            warn!(
                parser = G::NAME,
                line_number, last, "Ignoring line that arrived out of order"
            );
            self.sink.count(names::INVALID_LINE);
            return Ok(());
        }
        self.last_line = Some(line_number);
        self.context.line_number = line_number;

        let line = sanitize(line);
        match self.advance(&line) {
            Ok(next) => {
                if next != self.state {
                    trace!(parser = G::NAME, line_number, from = ?self.state, to = ?next, "Transition");
                }
                self.state = next;
                Ok(())
            }
            Err(e) => Err(self.poison(e)),
        }
    }

    /// Process one raw line; bytes that are not UTF-8 are logged and ignored
    ///
    /// # Errors
    ///
    /// Same as [`Engine::consume`].
    pub fn consume_bytes(&mut self, line: &[u8], line_number: u64) -> Result<(), ParserError> {
        match std::str::from_utf8(line) {
            Ok(text) => self.consume(text, line_number),
            Err(e) => {
                self.ensure_usable()?;
                warn!(parser = G::NAME, line_number, error = %e, "Ignoring line that is not UTF-8");
                self.sink.count(names::INVALID_LINE);
                Ok(())
            }
        }
    }

    /// Signal end of input, publishing the run in progress if it qualifies
    ///
    /// # Errors
    ///
    /// Returns `ParserError::Poisoned` if the engine failed earlier.
    pub fn finish(&mut self) -> Result<(), ParserError> {
        self.ensure_usable()?;
        debug!(parser = G::NAME, state = ?self.state, "End of input");
        self.sink.reconcile(&mut self.context);
        self.state = G::initial_state();
        Ok(())
    }

    fn advance(&mut self, line: &str) -> Result<G::State, ParserError> {
        let state = self.state;
        let line_number = self.context.line_number;

        for rule in G::rules(state) {
            let captures = match self.matcher.evaluate(rule.pattern, line) {
                Evaluation::Matched(captures) => captures,
                Evaluation::Unmatched => continue,
                Evaluation::OverBudget(elapsed) => {
                    warn!(
                        parser = G::NAME,
                        line_number,
                        rule = rule.name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Pattern evaluation exceeded its budget, treating as no match"
                    );
                    self.sink.count(names::REGEX_TIMEOUT);
                    continue;
                }
            };

            self.context.line_window.clear();
            let hit = Hit::new(rule.name, line_number, captures);
            let mut step = Step::new(&mut self.context, &mut self.sink);
            return G::apply(rule.action, state, &hit, &mut step);
        }

        let mut step = Step::new(&mut self.context, &mut self.sink);
        G::on_unmatched(state, line, &mut step)
    }

    fn ensure_usable(&self) -> Result<(), ParserError> {
        if self.poisoned {
            return Err(ParserError::Poisoned {
                parser: self.sink.parser_uri().to_string(),
            });
        }
        Ok(())
    }

    fn poison(&mut self, error: ParserError) -> ParserError {
        error!(
            parser = G::NAME,
            line = self.context.line_number,
            state = ?self.state,
            error = %error,
            "Parser failed and must be recreated"
        );
        self.sink.count(names::INTERNAL_ERROR);
        self.poisoned = true;
        error
    }
}

impl<G: Grammar> fmt::Debug for Engine<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("parser", &self.sink.parser_uri().as_str())
            .field("state", &self.state)
            .field("last_line", &self.last_line)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}
