// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Test result types

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ParserError;

/// Possible test outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    /// Test passed
    Passed,
    /// Test failed
    Failed,
    /// Test was skipped or pending
    NotExecuted,
    /// Outcome could not be determined
    Unknown,
}

/// A single test recovered from console output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test name as printed by the runner
    pub name: String,
    /// Test outcome
    pub outcome: TestOutcome,
    /// Captured failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Duration printed next to the test, if any
    #[serde(with = "option_millis", skip_serializing_if = "Option::is_none", default)]
    pub execution_time: Option<Duration>,
}

impl TestResult {
    /// Create a passed test
    #[must_use]
    pub fn passed(name: impl Into<String>) -> Self {
        Self::new(name, TestOutcome::Passed)
    }

    /// Create a failed test
    #[must_use]
    pub fn failed(name: impl Into<String>) -> Self {
        Self::new(name, TestOutcome::Failed)
    }

    /// Create a skipped test
    #[must_use]
    pub fn skipped(name: impl Into<String>) -> Self {
        Self::new(name, TestOutcome::NotExecuted)
    }

    fn new(name: impl Into<String>, outcome: TestOutcome) -> Self {
        Self {
            name: name.into(),
            outcome,
            stack_trace: None,
            execution_time: None,
        }
    }

    /// Attach the printed duration
    #[must_use]
    pub fn with_execution_time(mut self, duration: Option<Duration>) -> Self {
        self.execution_time = duration;
        self
    }
}

/// Totals printed by the runner, filled in progressively
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunSummary {
    /// Total tests
    pub total_tests: usize,
    /// Tests passed
    pub total_passed: usize,
    /// Tests failed
    pub total_failed: usize,
    /// Tests skipped
    pub total_skipped: usize,
    /// Wall-clock time of the whole run
    #[serde(with = "millis")]
    pub total_execution_time: Duration,
}

/// Identifies the parser that produced a run, as `Name/Version`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParserUri(String);

impl ParserUri {
    /// Build a uri from its two components
    ///
    /// # Errors
    ///
    /// Returns `ParserError::InvalidParserUri` if either component is empty
    /// or contains a `/`.
    pub fn new(name: &str, version: &str) -> Result<Self, ParserError> {
        Self::parse(&format!("{name}/{version}"))
    }

    /// Validate an existing `Name/Version` string
    ///
    /// # Errors
    ///
    /// Returns `ParserError::InvalidParserUri` unless the string has exactly
    /// one separator between two non-empty components.
    pub fn parse(uri: &str) -> Result<Self, ParserError> {
        match uri.split_once('/') {
            Some((name, version))
                if !name.is_empty() && !version.is_empty() && !version.contains('/') =>
            {
                Ok(Self(uri.to_string()))
            }
            _ => Err(ParserError::InvalidParserUri {
                uri: uri.to_string(),
            }),
        }
    }

    /// Parser name component
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(name, _)| name)
    }

    /// Parser version component
    #[must_use]
    pub fn version(&self) -> &str {
        self.0.split_once('/').map_or("", |(_, version)| version)
    }

    /// The full uri
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParserUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ParserUri {
    type Error = ParserError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ParserUri> for String {
    fn from(uri: ParserUri) -> Self {
        uri.0
    }
}

/// One complete test run recovered from the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    /// Parser that produced this run
    pub parser_uri: ParserUri,
    /// Prefix for naming the run downstream
    pub run_name_prefix: String,
    /// Per-engine sequence number, starting at 1
    pub test_run_id: u32,
    /// Passed tests in the order they were printed
    pub passed_tests: Vec<TestResult>,
    /// Failed tests in the order they were printed
    pub failed_tests: Vec<TestResult>,
    /// Skipped tests in the order they were printed
    pub skipped_tests: Vec<TestResult>,
    /// Totals printed by the runner
    pub summary: TestRunSummary,
}

impl TestRun {
    /// Create an empty run
    #[must_use]
    pub fn new(parser_uri: ParserUri, run_name_prefix: String, test_run_id: u32) -> Self {
        Self {
            parser_uri,
            run_name_prefix,
            test_run_id,
            passed_tests: Vec::new(),
            failed_tests: Vec::new(),
            skipped_tests: Vec::new(),
            summary: TestRunSummary::default(),
        }
    }

    /// Whether any individual test was recorded
    #[must_use]
    pub fn has_items(&self) -> bool {
        !(self.passed_tests.is_empty()
            && self.failed_tests.is_empty()
            && self.skipped_tests.is_empty())
    }

    /// Check if no test failed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.summary.total_failed == 0 && self.failed_tests.is_empty()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_parser_uri_accepts_single_separator() {
        let uri = ParserUri::new("Mocha", "1.0").expect("valid uri");
        assert_eq!(uri.as_str(), "Mocha/1.0");
        assert_eq!(uri.name(), "Mocha");
        assert_eq!(uri.version(), "1.0");
    }

    #[test]
    fn test_parser_uri_rejects_extra_or_missing_separators() {
        assert!(ParserUri::parse("Mocha").is_err());
        assert!(ParserUri::parse("Mocha/1.0/beta").is_err());
        assert!(ParserUri::parse("/1.0").is_err());
        assert!(ParserUri::parse("Mocha/").is_err());
        assert!(ParserUri::new("Mo/cha", "1.0").is_err());
    }

    #[test]
    fn test_parser_uri_deserialization_is_validated() {
        let ok: Result<ParserUri, _> = serde_json::from_str("\"Jest/1.0\"");
        assert!(ok.is_ok());
        let bad: Result<ParserUri, _> = serde_json::from_str("\"Jest\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_durations_serialize_as_milliseconds() {
        let result = TestResult::passed("adds").with_execution_time(Some(Duration::from_millis(12)));
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["execution_time"], 12);
        assert_eq!(json["outcome"], "passed");
        assert!(json.get("stack_trace").is_none());

        let summary = TestRunSummary {
            total_execution_time: Duration::from_secs(2),
            ..Default::default()
        };
        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["total_execution_time"], 2000);
    }

    #[test]
    fn test_run_helpers() {
        let uri = ParserUri::new("Jest", "1.0").expect("valid uri");
        let mut run = TestRun::new(uri, "prefix".to_string(), 1);
        assert!(!run.has_items());
        assert!(run.all_passed());

        run.failed_tests.push(TestResult::failed("breaks"));
        assert!(run.has_items());
        assert!(!run.all_passed());
    }
}
