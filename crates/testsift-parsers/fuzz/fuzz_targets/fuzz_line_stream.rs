// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for the line-driven engines
//!
//! Feeds arbitrary line streams, with arbitrary line numbering, to one
//! engine per framework at once.

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use testsift_parsers::{CollectingPublisher, EngineOptions, Framework, MemoryTelemetry, ParserSet};

#[derive(Debug, Arbitrary)]
struct Input {
    lines: Vec<(Vec<u8>, u8)>,
    finish: bool,
}

fuzz_target!(|input: Input| {
    let publisher = Arc::new(CollectingPublisher::new());
    let Ok(mut set) = ParserSet::new(
        &Framework::ALL,
        publisher.clone(),
        Arc::new(MemoryTelemetry::new()),
        EngineOptions::default(),
    ) else {
        return;
    };

    // Mostly increasing numbers, with the occasional repeat
    let mut line_number = 0u64;
    for (bytes, step) in &input.lines {
        line_number += u64::from(*step % 3);
        let _ = set.consume_bytes(bytes, line_number);
    }
    if input.finish {
        let _ = set.finish();
    }

    // Every published run must carry consistent totals
    for run in publisher.take() {
        let summary = &run.summary;
        assert_eq!(
            summary.total_tests,
            summary.total_passed + summary.total_failed + summary.total_skipped
        );
        assert!(run.test_run_id >= 1);
    }
});
