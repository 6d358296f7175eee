// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Framework selection and multi-engine dispatch
//!
//! A host that does not know which runner produced a log feeds every line to
//! a [`ParserSet`] holding one engine per candidate framework. Engines that
//! fail are logged and replaced so one bad line never ends the stream.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::engine::{Engine, EngineOptions, Grammar};
use crate::error::ParserError;
use crate::jasmine::Jasmine;
use crate::jest::Jest;
use crate::mocha::Mocha;
use crate::publish::{CollectingPublisher, Publisher};
use crate::python::Python;
use crate::result::{ParserUri, TestRun};
use crate::telemetry::{NoopTelemetry, TelemetryCollector};

/// Test runners with a registered grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Jasmine's default console reporter
    Jasmine,
    /// Jest, verbose or not
    Jest,
    /// Mocha's spec reporter
    Mocha,
    /// Python unittest
    Python,
}

impl Framework {
    /// Every registered framework
    pub const ALL: [Framework; 4] = [Self::Jasmine, Self::Jest, Self::Mocha, Self::Python];

    /// Lowercase name used on the command line
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Jasmine => "jasmine",
            Self::Jest => "jest",
            Self::Mocha => "mocha",
            Self::Python => "python",
        }
    }

    /// Create an engine for this framework
    ///
    /// # Errors
    ///
    /// Returns `ParserError::InvalidParserUri` if the grammar's uri is
    /// malformed.
    pub fn parser(
        self,
        publisher: Arc<dyn Publisher>,
        telemetry: Arc<dyn TelemetryCollector>,
        options: EngineOptions,
    ) -> Result<Box<dyn LineParser>, ParserError> {
        fn boxed<G: Grammar>(
            publisher: Arc<dyn Publisher>,
            telemetry: Arc<dyn TelemetryCollector>,
            options: EngineOptions,
        ) -> Result<Box<dyn LineParser>, ParserError> {
            Ok(Box::new(Engine::<G>::with_options(publisher, telemetry, options)?))
        }

        match self {
            Self::Jasmine => boxed::<Jasmine>(publisher, telemetry, options),
            Self::Jest => boxed::<Jest>(publisher, telemetry, options),
            Self::Mocha => boxed::<Mocha>(publisher, telemetry, options),
            Self::Python => boxed::<Python>(publisher, telemetry, options),
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Framework {
    type Err = ParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jasmine" => Ok(Self::Jasmine),
            "jest" => Ok(Self::Jest),
            "mocha" => Ok(Self::Mocha),
            "python" | "unittest" => Ok(Self::Python),
            _ => Err(ParserError::UnknownFramework {
                name: s.to_string(),
            }),
        }
    }
}

/// Object-safe view of an [`Engine`] of any grammar
pub trait LineParser: Send {
    /// Uri stamped on every run from this parser
    fn parser_uri(&self) -> &ParserUri;

    /// Process one line of console output
    ///
    /// # Errors
    ///
    /// Returns the fault that poisoned the parser.
    fn consume(&mut self, line: &str, line_number: u64) -> Result<(), ParserError>;

    /// Process one raw line
    ///
    /// # Errors
    ///
    /// Returns the fault that poisoned the parser.
    fn consume_bytes(&mut self, line: &[u8], line_number: u64) -> Result<(), ParserError>;

    /// Signal end of input
    ///
    /// # Errors
    ///
    /// Returns `ParserError::Poisoned` if the parser failed earlier.
    fn finish(&mut self) -> Result<(), ParserError>;

    /// Check if an earlier fault disabled this parser
    fn is_poisoned(&self) -> bool;
}

impl<G: Grammar> LineParser for Engine<G> {
    fn parser_uri(&self) -> &ParserUri {
        Engine::parser_uri(self)
    }

    fn consume(&mut self, line: &str, line_number: u64) -> Result<(), ParserError> {
        Engine::consume(self, line, line_number)
    }

    fn consume_bytes(&mut self, line: &[u8], line_number: u64) -> Result<(), ParserError> {
        Engine::consume_bytes(self, line, line_number)
    }

    fn finish(&mut self) -> Result<(), ParserError> {
        Engine::finish(self)
    }

    fn is_poisoned(&self) -> bool {
        Engine::is_poisoned(self)
    }
}

struct Slot {
    framework: Framework,
    parser: Box<dyn LineParser>,
}

/// One engine per selected framework, all fed the same lines
pub struct ParserSet {
    slots: Vec<Slot>,
    publisher: Arc<dyn Publisher>,
    telemetry: Arc<dyn TelemetryCollector>,
    options: EngineOptions,
    replaced: usize,
}

impl ParserSet {
    /// Create engines for `frameworks`, ignoring duplicates
    ///
    /// # Errors
    ///
    /// Returns an error if an engine cannot be constructed.
    pub fn new(
        frameworks: &[Framework],
        publisher: Arc<dyn Publisher>,
        telemetry: Arc<dyn TelemetryCollector>,
        options: EngineOptions,
    ) -> Result<Self, ParserError> {
        let mut selected = frameworks.to_vec();
        selected.sort_unstable();
        selected.dedup();

        let slots = selected
            .into_iter()
            .map(|framework| {
                let parser = framework.parser(publisher.clone(), telemetry.clone(), options.clone())?;
                Ok(Slot { framework, parser })
            })
            .collect::<Result<Vec<_>, ParserError>>()?;

        info!(
            frameworks = ?slots.iter().map(|s| s.framework.name()).collect::<Vec<_>>(),
            "Parsers ready"
        );

        Ok(Self {
            slots,
            publisher,
            telemetry,
            options,
            replaced: 0,
        })
    }

    /// Frameworks being parsed, in a stable order
    #[must_use]
    pub fn frameworks(&self) -> Vec<Framework> {
        self.slots.iter().map(|s| s.framework).collect()
    }

    /// Number of engines replaced after a fault
    #[must_use]
    pub fn replaced(&self) -> usize {
        self.replaced
    }

    /// Feed one line to every engine
    ///
    /// # Errors
    ///
    /// Returns an error only if a failed engine cannot be recreated.
    pub fn consume(&mut self, line: &str, line_number: u64) -> Result<(), ParserError> {
        for i in 0..self.slots.len() {
            if let Err(e) = self.slots[i].parser.consume(line, line_number) {
                self.replace(i, &e)?;
            }
        }
        Ok(())
    }

    /// Feed one raw line to every engine
    ///
    /// # Errors
    ///
    /// Returns an error only if a failed engine cannot be recreated.
    pub fn consume_bytes(&mut self, line: &[u8], line_number: u64) -> Result<(), ParserError> {
        for i in 0..self.slots.len() {
            if let Err(e) = self.slots[i].parser.consume_bytes(line, line_number) {
                self.replace(i, &e)?;
            }
        }
        Ok(())
    }

    /// Signal end of input to every engine
    ///
    /// # Errors
    ///
    /// Returns an error only if a failed engine cannot be recreated.
    pub fn finish(&mut self) -> Result<(), ParserError> {
        for i in 0..self.slots.len() {
            if let Err(e) = self.slots[i].parser.finish() {
                self.replace(i, &e)?;
            }
        }
        Ok(())
    }

    fn replace(&mut self, index: usize, cause: &ParserError) -> Result<(), ParserError> {
        let framework = self.slots[index].framework;
        error!(%framework, error = %cause, "Replacing failed parser");
        self.slots[index].parser = framework.parser(
            self.publisher.clone(),
            self.telemetry.clone(),
            self.options.clone(),
        )?;
        self.replaced += 1;
        Ok(())
    }
}

impl fmt::Debug for ParserSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserSet")
            .field("frameworks", &self.frameworks())
            .field("options", &self.options)
            .field("replaced", &self.replaced)
            .finish_non_exhaustive()
    }
}

/// Parse a complete log with one framework's grammar
///
/// Lines are numbered from 1 and the run in progress at the end of `text`
/// is published if it qualifies.
///
/// # Errors
///
/// Returns the internal fault that stopped the engine.
pub fn parse_log(framework: Framework, text: &str) -> Result<Vec<TestRun>, ParserError> {
    let publisher = Arc::new(CollectingPublisher::new());
    let mut parser = framework.parser(
        publisher.clone(),
        Arc::new(NoopTelemetry),
        EngineOptions::default(),
    )?;
    for (line_number, line) in (1..).zip(text.lines()) {
        parser.consume(line, line_number)?;
    }
    parser.finish()?;
    Ok(publisher.take())
}
