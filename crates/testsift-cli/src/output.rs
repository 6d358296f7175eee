// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! JSON output of published runs

use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use testsift_parsers::{Publisher, TestRun};
use tracing::{error, info};

/// A run as written to the output stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedRun {
    /// When the run was handed to the writer
    pub published_at: DateTime<Utc>,
    /// The recovered run
    #[serde(flatten)]
    pub run: TestRun,
}

/// Publisher writing one JSON document per run
#[derive(Debug)]
pub struct JsonLinesPublisher<W> {
    writer: Mutex<W>,
    pretty: bool,
    written: AtomicUsize,
    failed: AtomicUsize,
}

impl<W: Write + Send> JsonLinesPublisher<W> {
    /// Write runs to `writer`, pretty-printed if `pretty` is set
    pub fn new(writer: W, pretty: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            pretty,
            written: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Number of runs written
    #[must_use]
    pub fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    /// Number of runs that could not be written
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self, record: &PublishedRun) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer lock poisoned"))?;
        if self.pretty {
            serde_json::to_writer_pretty(&mut *writer, record)?;
        } else {
            serde_json::to_writer(&mut *writer, record)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Publisher for JsonLinesPublisher<W> {
    fn publish(&self, run: TestRun) {
        let record = PublishedRun {
            published_at: Utc::now(),
            run,
        };
        match self.write(&record) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
                info!(
                    parser = %record.run.parser_uri,
                    test_run_id = record.run.test_run_id,
                    total = record.run.summary.total_tests,
                    failed = record.run.summary.total_failed,
                    all_passed = record.run.all_passed(),
                    "Wrote test run"
                );
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    parser = %record.run.parser_uri,
                    test_run_id = record.run.test_run_id,
                    error = %e,
                    "Failed to write test run"
                );
            }
        }
    }
}
