// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Line pump from a reader into a parser set
//!
//! Lines are read as raw bytes so a stray non-UTF-8 line is reported by the
//! engines instead of aborting the read.

use std::io::BufRead;

use testsift_parsers::{ParserError, ParserSet};
use thiserror::Error;
use tracing::{debug, info};

/// Pump errors
#[derive(Debug, Error)]
pub enum PumpError {
    /// Reading the input failed
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// A parser could not be recreated after a fault
    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),
}

/// Counters from one pump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Lines read
    pub lines: u64,
    /// Engines recreated after a fault
    pub replaced: usize,
}

/// Feed every line of `reader` to `set`, numbering from 1, then finish
///
/// # Errors
///
/// Returns an error if reading fails or a failed engine cannot be recreated.
pub fn pump<R: BufRead>(mut reader: R, set: &mut ParserSet) -> Result<PumpStats, PumpError> {
    let mut buf = Vec::new();
    let mut line_number = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_number += 1;
        set.consume_bytes(trim_line_ending(&buf), line_number)?;
    }

    debug!(lines = line_number, "End of input");
    set.finish()?;

    let stats = PumpStats {
        lines: line_number,
        replaced: set.replaced(),
    };
    info!(lines = stats.lines, replaced = stats.replaced, "Input consumed");
    Ok(stats)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
