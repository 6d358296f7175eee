// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! testsift-parsers: test-run recovery from console output
//!
//! This library crate turns the console output of Jasmine, Jest, Mocha and
//! Python unittest into structured [`TestRun`] values when no machine-readable
//! report is available. Lines are consumed one at a time as a build runs;
//! each completed run is handed to a [`Publisher`].
//!
//! # Example
//!
//! ```no_run
//! use testsift_parsers::{Framework, parse_log};
//!
//! // Parse a complete log
//! let log = "test_x (mod) ... ok\nRan 1 tests in 0.002s\nOK\n";
//! let runs = parse_log(Framework::Python, log).unwrap();
//! assert_eq!(runs[0].summary.total_passed, 1);
//! ```
//!
//! Streaming use goes through an engine directly:
//!
//! ```no_run
//! use std::sync::Arc;
//! use testsift_parsers::{CollectingPublisher, JestParser, MemoryTelemetry};
//!
//! let publisher = Arc::new(CollectingPublisher::new());
//! let mut parser = JestParser::new(publisher.clone(), Arc::new(MemoryTelemetry::new())).unwrap();
//! parser.consume("PASS src/a.test.js", 1).unwrap();
//! parser.finish().unwrap();
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod framework;
pub mod jasmine;
pub mod jest;
pub mod matcher;
pub mod mocha;
pub mod publish;
pub mod python;
pub mod reconcile;
pub mod result;
pub mod stack_trace;
pub mod telemetry;

pub use context::RunContext;
pub use engine::{Engine, EngineOptions, Grammar, Rule, Step};
pub use error::ParserError;
pub use framework::{Framework, LineParser, ParserSet, parse_log};
pub use jasmine::JasmineParser;
pub use jest::JestParser;
pub use mocha::MochaParser;
pub use publish::{CollectingPublisher, Publisher};
pub use python::PythonParser;
pub use reconcile::{SkipReason, minimum_content};
pub use result::{ParserUri, TestOutcome, TestResult, TestRun, TestRunSummary};
pub use stack_trace::STACK_TRACE_LINE_BUDGET;
pub use telemetry::{MemoryTelemetry, NoopTelemetry, TelemetryCollector};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::engine::{Engine, EngineOptions};
    pub use crate::error::ParserError;
    pub use crate::framework::{Framework, LineParser, ParserSet, parse_log};
    pub use crate::publish::{CollectingPublisher, Publisher};
    pub use crate::result::{TestOutcome, TestResult, TestRun, TestRunSummary};
    pub use crate::telemetry::{NoopTelemetry, TelemetryCollector};
}
