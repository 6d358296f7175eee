// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Reconciliation & publish
//!
//! Runs whenever a grammar decides the current run is over. Counts are
//! cross-checked against the printed summary, the run is published if it
//! carries enough content, and the context always starts over with a fresh
//! run.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::publish::Publisher;
use crate::result::{ParserUri, TestRun};
use crate::stack_trace::trim_stack_traces;
use crate::telemetry::{TelemetryCollector, names};

/// Why a run was dropped instead of published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing beyond the initial marker was seen
    NoContent,
    /// Tests were recorded but no summary line was parsed
    NoSummary,
    /// The summary reported zero tests
    ZeroTotal,
}

impl SkipReason {
    fn metric(self) -> &'static str {
        match self {
            Self::NoContent => names::NO_CONTENT,
            Self::NoSummary => names::NO_SUMMARY,
            Self::ZeroTotal => names::ZERO_TOTAL,
        }
    }
}

/// Decide whether a run is worth publishing
#[must_use]
pub fn minimum_content(run: &TestRun, summary_seen: bool) -> Option<SkipReason> {
    if !summary_seen && !run.has_items() {
        Some(SkipReason::NoContent)
    } else if !summary_seen {
        Some(SkipReason::NoSummary)
    } else if run.summary.total_tests == 0 {
        Some(SkipReason::ZeroTotal)
    } else {
        None
    }
}

/// Destination of completed runs, owned by one engine
pub(crate) struct RunSink {
    parser_uri: ParserUri,
    run_name_prefix: String,
    published: u32,
    publisher: Arc<dyn Publisher>,
    telemetry: Arc<dyn TelemetryCollector>,
}

impl RunSink {
    pub(crate) fn new(
        parser_uri: ParserUri,
        run_name_prefix: String,
        publisher: Arc<dyn Publisher>,
        telemetry: Arc<dyn TelemetryCollector>,
    ) -> Self {
        Self {
            parser_uri,
            run_name_prefix,
            published: 0,
            publisher,
            telemetry,
        }
    }

    pub(crate) fn parser_uri(&self) -> &ParserUri {
        &self.parser_uri
    }

    /// The run that follows the last published one
    pub(crate) fn fresh_run(&self) -> TestRun {
        TestRun::new(
            self.parser_uri.clone(),
            self.run_name_prefix.clone(),
            self.published + 1,
        )
    }

    pub(crate) fn tag(&self, name: &str, value: impl Into<Value>) {
        self.telemetry
            .add_metric(self.parser_uri.name(), name, value.into(), false);
    }

    pub(crate) fn count(&self, name: &str) {
        self.telemetry
            .add_metric(self.parser_uri.name(), name, Value::from(1), true);
    }

    /// Cross-check, publish if worthwhile, and start a fresh run
    pub(crate) fn reconcile<X: Default>(&mut self, cx: &mut RunContext<X>) {
        let line = cx.line_number;
        let summary_seen = cx.summary_seen;
        let mut run = std::mem::replace(&mut cx.run, self.fresh_run());

        self.cross_check(&run, line);

        match minimum_content(&run, summary_seen) {
            Some(reason) => {
                debug!(
                    parser = %self.parser_uri,
                    line,
                    ?reason,
                    "Dropping run without publishing"
                );
                self.count(reason.metric());
            }
            None => {
                trim_stack_traces(&mut run);
                self.published = run.test_run_id;
                info!(
                    parser = %self.parser_uri,
                    line,
                    run_id = run.test_run_id,
                    total = run.summary.total_tests,
                    passed = run.summary.total_passed,
                    failed = run.summary.total_failed,
                    skipped = run.summary.total_skipped,
                    "Publishing test run"
                );
                self.publisher.publish(run);
                self.count(names::PUBLISHED_RUNS);
            }
        }

        cx.reset(self.fresh_run());
    }

    fn cross_check(&self, run: &TestRun, line: u64) {
        let buckets = [
            ("Passed", run.passed_tests.len(), run.summary.total_passed),
            ("Failed", run.failed_tests.len(), run.summary.total_failed),
            ("Skipped", run.skipped_tests.len(), run.summary.total_skipped),
        ];

        for (bucket, recorded, total) in buckets {
            if recorded > 0 && total == 0 {
                warn!(
                    parser = %self.parser_uri,
                    line,
                    bucket,
                    recorded,
                    "Tests recorded but the summary reports none"
                );
                self.count(&format!("{}{bucket}", names::ITEMS_WITHOUT_SUMMARY));
            } else if recorded > 0 && recorded != total {
                warn!(
                    parser = %self.parser_uri,
                    line,
                    bucket,
                    recorded,
                    total,
                    "Summary does not match recorded tests"
                );
                self.count(&format!("{}{bucket}", names::SUMMARY_MISMATCH));
            }
        }
    }
}
