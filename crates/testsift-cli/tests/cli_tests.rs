// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! CLI tests for flag parsing and the stdin-to-JSON pipeline
//!
//! These tests parse command lines the way the binary does and run fixture
//! logs from the parsers crate through the pump and JSON-lines publisher.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use similar_asserts::assert_eq;
use testsift_cli::{Config, JsonLinesPublisher, PublishedRun, pump};
use testsift_parsers::{Framework, NoopTelemetry, ParserSet};
use tracing::Level;

fn fixture(name: &str) -> String {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let path = Path::new(&manifest_dir)
        .join("../testsift-parsers/tests/fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {name}: {e}"))
}

/// Run `input` through the same pipeline as the binary
fn run(config: &Config, input: &str) -> Vec<PublishedRun> {
    let publisher = Arc::new(JsonLinesPublisher::new(Vec::new(), config.pretty));
    let mut set = ParserSet::new(
        &config.frameworks(),
        publisher.clone(),
        Arc::new(NoopTelemetry),
        config.engine_options(),
    )
    .expect("parser set");
    pump(Cursor::new(input.to_string()), &mut set).expect("pump");
    drop(set);

    let publisher = Arc::try_unwrap(publisher).expect("sole owner");
    let out = String::from_utf8(publisher.into_inner()).expect("utf8");
    serde_json::Deserializer::from_str(&out)
        .into_iter::<PublishedRun>()
        .collect::<Result<_, _>>()
        .expect("json")
}

// ============================================================================
// Flag parsing tests
// ============================================================================

#[test]
fn test_file_argument() {
    let config = Config::try_parse_from(["testsift", "build.log"]).expect("parse should succeed");
    assert_eq!(config.file, Some(PathBuf::from("build.log")));
}

#[test]
fn test_framework_short_and_long_equivalent() {
    let short = Config::try_parse_from(["testsift", "-f", "jest"]).expect("short parse");
    let long = Config::try_parse_from(["testsift", "--framework", "jest"]).expect("long parse");
    assert_eq!(short.framework, long.framework);
    assert_eq!(short.framework, vec![Framework::Jest]);
}

#[test]
fn test_framework_repeated_and_delimited() {
    let repeated = Config::try_parse_from(["testsift", "-f", "mocha", "-f", "unittest"])
        .expect("parse should succeed");
    let delimited =
        Config::try_parse_from(["testsift", "-f", "mocha,python"]).expect("parse should succeed");
    assert_eq!(repeated.framework, vec![Framework::Mocha, Framework::Python]);
    assert_eq!(repeated.framework, delimited.framework);
}

#[test]
fn test_unknown_framework_is_rejected() {
    let result = Config::try_parse_from(["testsift", "-f", "nunit"]);
    assert!(result.is_err(), "Unknown frameworks must fail to parse");
}

#[test]
fn test_match_budget_must_be_a_number() {
    assert!(Config::try_parse_from(["testsift", "--match-budget-ms", "fast"]).is_err());
    let config = Config::try_parse_from(["testsift", "--match-budget-ms", "20"]).expect("parse");
    assert_eq!(config.match_budget_ms, Some(20));
}

#[test]
fn test_verbose_and_quiet_flags() {
    let verbose = Config::try_parse_from(["testsift", "-v"]).expect("parse");
    let quiet = Config::try_parse_from(["testsift", "--quiet"]).expect("parse");
    let both = Config::try_parse_from(["testsift", "-v", "-q"]).expect("parse");

    assert_eq!(verbose.log_level(), Level::DEBUG);
    assert_eq!(quiet.log_level(), Level::WARN);
    // Verbose takes precedence
    assert_eq!(both.log_level(), Level::DEBUG);
}

#[test]
fn test_verbose_flag_value_syntax_not_supported() {
    let result = Config::try_parse_from(["testsift", "--verbose=true"]);
    assert!(result.is_err(), "Boolean flags don't support =value syntax");
}

// ============================================================================
// Pipeline tests
// ============================================================================

#[test]
fn test_mocha_log_to_json_lines() {
    let config = Config::try_parse_from(["testsift", "--run-name-prefix", "ci"]).expect("parse");
    let runs = run(&config, &fixture("mocha.log"));

    assert_eq!(runs.len(), 1);
    let published = &runs[0].run;
    assert_eq!(published.parser_uri.as_str(), "Mocha/1.0");
    assert_eq!(published.run_name_prefix, "ci");
    assert_eq!(published.summary.total_passed, 2);
    assert_eq!(published.summary.total_failed, 1);
}

#[test]
fn test_framework_filter_limits_parsers() {
    let config = Config::try_parse_from(["testsift", "-f", "jest"]).expect("parse");
    let runs = run(&config, &fixture("python.log"));
    assert!(runs.is_empty());
}

#[test]
fn test_mixed_log_publishes_each_framework() {
    let config = Config::default();
    let log = format!("{}\n{}", fixture("python.log"), fixture("jest-verbose.log"));
    let runs = run(&config, &log);

    let uris: Vec<&str> = runs.iter().map(|r| r.run.parser_uri.as_str()).collect();
    assert_eq!(uris, vec!["Python/1.0", "Jest/1.0"]);
    assert!(runs[0].published_at <= runs[1].published_at);
}

#[test]
fn test_pretty_output_parses_back() {
    let config = Config::try_parse_from(["testsift", "--pretty", "-f", "jasmine"]).expect("parse");
    let log = fixture("jasmine.log").repeat(2);
    let runs = run(&config, &log);

    let ids: Vec<u32> = runs.iter().map(|r| r.run.test_run_id).collect();
    assert_eq!(ids, vec![1, 2]);
}
