// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! testsift: recover test runs from test runner console output
//!
//! Reads a log file or standard input line by line and writes every
//! recovered run to stdout as JSON. Logs go to stderr.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use testsift_cli::{Config, JsonLinesPublisher, pump};
use testsift_parsers::{NoopTelemetry, ParserSet};
use tracing::info;

fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level().into()),
        )
        .with_writer(io::stderr)
        .init();

    config.validate().context("Invalid configuration")?;

    let publisher = Arc::new(JsonLinesPublisher::new(io::stdout(), config.pretty));
    let mut set = ParserSet::new(
        &config.frameworks(),
        publisher.clone(),
        Arc::new(NoopTelemetry),
        config.engine_options(),
    )
    .context("Failed to create parsers")?;

    let reader: Box<dyn BufRead> = match &config.file {
        Some(path) => {
            info!(path = %path.display(), "Reading log file");
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => {
            info!("Reading standard input");
            Box::new(io::stdin().lock())
        }
    };

    let stats = pump(reader, &mut set)?;
    info!(lines = stats.lines, runs = publisher.written(), "Done");

    if publisher.failed() > 0 {
        anyhow::bail!("{} runs could not be written", publisher.failed());
    }
    Ok(())
}
