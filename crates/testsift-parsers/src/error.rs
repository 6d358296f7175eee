// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for testsift-parsers
//!
//! Only internal faults surface as errors. Drift in the console output
//! (count mismatches, numbering gaps, missing summaries) is logged and
//! tagged, never returned.

use thiserror::Error;

/// Faults that leave an engine instance untrustworthy
#[derive(Debug, Error)]
pub enum ParserError {
    /// A captured number did not fit the target integer type
    #[error("Invalid number {value:?} at line {line}")]
    InvalidNumber {
        /// Line the number was captured from
        line: u64,
        /// The captured text
        value: String,
    },

    /// A rule's action asked for a capture group its pattern does not define
    #[error("Pattern {rule} has no capture group {group} (line {line})")]
    MissingCapture {
        /// Name of the rule whose action failed
        rule: &'static str,
        /// Index of the missing group
        group: usize,
        /// Line being processed
        line: u64,
    },

    /// The stack-trace cursor points past the failed-test list
    #[error("Stack trace target {index} out of range ({len} failed tests)")]
    DanglingStackTrace {
        /// Recorded index into the failed tests
        index: usize,
        /// Number of failed tests in the run
        len: usize,
    },

    /// A parser uri that is not of the form `Name/Version`
    #[error("Invalid parser uri: {uri}")]
    InvalidParserUri {
        /// The rejected uri
        uri: String,
    },

    /// A framework name that no grammar is registered for
    #[error("Unknown test framework: {name} (expected jasmine, jest, mocha or python)")]
    UnknownFramework {
        /// The rejected name
        name: String,
    },

    /// The engine failed earlier and must be recreated
    #[error("Parser {parser} failed earlier and must be recreated")]
    Poisoned {
        /// Parser uri of the failed engine
        parser: String,
    },
}
