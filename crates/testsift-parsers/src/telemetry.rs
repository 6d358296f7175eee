// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Telemetry sink for parser diagnostics
//!
//! Engines tag drift, budget overruns and faults with
//! `add_metric(area, name, value, aggregate)`. The area is the parser name.
//! Calls are fire-and-forget; a collector must never block the engine.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value;

/// Metric names emitted by the engines
pub mod names {
    /// A pattern evaluation exceeded its time budget
    pub const REGEX_TIMEOUT: &str = "RegexTimeout";
    /// A line could not be decoded or arrived out of order
    pub const INVALID_LINE: &str = "InvalidLine";
    /// An internal fault poisoned the engine
    pub const INTERNAL_ERROR: &str = "InternalError";
    /// A numbered item did not follow the previous ordinal
    pub const UNEXPECTED_ORDINAL: &str = "UnexpectedOrdinal";
    /// Items recorded for a bucket whose summary total is zero
    pub const ITEMS_WITHOUT_SUMMARY: &str = "ItemsWithoutSummary";
    /// Summary total and recorded items disagree for a bucket
    pub const SUMMARY_MISMATCH: &str = "SummaryMismatch";
    /// Reset with nothing beyond the initial marker
    pub const NO_CONTENT: &str = "NoContent";
    /// Reset with items but no summary line
    pub const NO_SUMMARY: &str = "NoSummary";
    /// Reset because the summary total was zero
    pub const ZERO_TOTAL: &str = "ZeroTotal";
    /// A stack trace outgrew its line budget and was dropped
    pub const STACK_TRACE_DISCARDED: &str = "StackTraceDiscarded";
    /// The line window ran out before the expected match
    pub const LINE_WINDOW_EXPIRED: &str = "LineWindowExpired";
    /// A run was handed to the publisher
    pub const PUBLISHED_RUNS: &str = "PublishedRuns";
    /// Jest output carried per-test status lines
    pub const VERBOSE_MODE: &str = "VerboseMode";
    /// A Python test name never received its outcome
    pub const UNRESOLVED_PARTIAL: &str = "UnresolvedPartialResult";
    /// A stack trace marker had no matching failed test
    pub const ORPHAN_STACK_TRACE: &str = "OrphanStackTrace";
}

/// Receives diagnostic metrics from the engines
pub trait TelemetryCollector: Send + Sync {
    /// Record a metric
    ///
    /// When `aggregate` is set, numeric values accumulate under the same
    /// `(area, name)` key; otherwise the latest value wins.
    fn add_metric(&self, area: &str, name: &str, value: Value, aggregate: bool);
}

/// Discards every metric
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetryCollector for NoopTelemetry {
    fn add_metric(&self, _area: &str, _name: &str, _value: Value, _aggregate: bool) {}
}

/// Keeps metrics in memory, keyed by `area/name`
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    metrics: Mutex<BTreeMap<String, Value>>,
}

impl MemoryTelemetry {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a metric recorded under `area/name`
    #[must_use]
    pub fn get(&self, area: &str, name: &str) -> Option<Value> {
        self.lock().get(&key(area, name)).cloned()
    }

    /// Numeric value of a metric, 0 when absent
    #[must_use]
    pub fn count(&self, area: &str, name: &str) -> f64 {
        self.get(area, name)
            .and_then(|v| v.as_f64())
            .unwrap_or_default()
    }

    /// Copy of everything recorded so far
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.metrics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TelemetryCollector for MemoryTelemetry {
    fn add_metric(&self, area: &str, name: &str, value: Value, aggregate: bool) {
        let mut metrics = self.lock();
        let slot = metrics.entry(key(area, name)).or_insert(Value::Null);
        match (aggregate, slot.as_f64(), value.as_f64()) {
            (true, Some(current), Some(added)) => *slot = Value::from(current + added),
            _ => *slot = value,
        }
    }
}

fn key(area: &str, name: &str) -> String {
    format!("{area}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use similar_asserts::assert_eq;

    #[test]
    fn test_aggregate_metrics_accumulate() {
        let telemetry = MemoryTelemetry::new();
        telemetry.add_metric("Mocha", names::PUBLISHED_RUNS, json!(1), true);
        telemetry.add_metric("Mocha", names::PUBLISHED_RUNS, json!(1), true);
        assert_eq!(telemetry.count("Mocha", names::PUBLISHED_RUNS), 2.0);
    }

    #[test]
    fn test_plain_metrics_overwrite() {
        let telemetry = MemoryTelemetry::new();
        telemetry.add_metric("Jest", names::VERBOSE_MODE, json!(true), false);
        telemetry.add_metric("Jest", names::VERBOSE_MODE, json!(false), false);
        assert_eq!(
            telemetry.get("Jest", names::VERBOSE_MODE),
            Some(json!(false))
        );
    }

    #[test]
    fn test_areas_are_kept_apart() {
        let telemetry = MemoryTelemetry::new();
        telemetry.add_metric("Jest", names::NO_SUMMARY, json!(1), true);
        assert_eq!(telemetry.count("Mocha", names::NO_SUMMARY), 0.0);
        assert_eq!(telemetry.snapshot().len(), 1);
    }
}
