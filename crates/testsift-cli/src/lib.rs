// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! testsift-cli library
//!
//! This module exports the building blocks of the `testsift` binary for use in
//! integration tests: configuration, the JSON-lines publisher and the line
//! pump.

pub mod config;
pub mod output;
pub mod pump;

pub use config::{Config, ConfigError};
pub use output::{JsonLinesPublisher, PublishedRun};
pub use pump::{PumpError, PumpStats, pump};
