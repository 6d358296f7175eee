// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Configuration for the testsift command
//!
//! This module provides the command-line surface: the input source, the
//! frameworks to parse for, engine options and logging flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use testsift_parsers::{EngineOptions, Framework};

/// Recover structured test runs from test runner console output
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "testsift")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Console log to read
    ///
    /// Reads standard input when omitted, so build output can be piped in
    /// while the build is still running.
    pub file: Option<PathBuf>,

    /// Framework whose output to look for
    ///
    /// May be given more than once or as a comma separated list. Defaults to
    /// every supported framework.
    #[arg(short, long, env = "TESTSIFT_FRAMEWORK", value_delimiter = ',')]
    pub framework: Vec<Framework>,

    /// Prefix stamped on every published run
    #[arg(long, env = "TESTSIFT_RUN_NAME_PREFIX", default_value = "")]
    pub run_name_prefix: String,

    /// Wall-clock budget for a single pattern evaluation, in milliseconds
    #[arg(long)]
    pub match_budget_ms: Option<u64>,

    /// Pretty-print each run instead of writing one JSON object per line
    #[arg(long, default_value = "false")]
    pub pretty: bool,

    /// Enable verbose logging (debug level)
    ///
    /// Logs are written to stderr so stdout stays machine readable.
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Config {
    /// Frameworks to parse for, falling back to all of them
    #[must_use]
    pub fn frameworks(&self) -> Vec<Framework> {
        if self.framework.is_empty() {
            Framework::ALL.to_vec()
        } else {
            self.framework.clone()
        }
    }

    /// Engine options derived from the flags
    #[must_use]
    pub fn engine_options(&self) -> EngineOptions {
        let options = EngineOptions::default().run_name_prefix(self.run_name_prefix.clone());
        match self.match_budget_ms {
            Some(ms) => options.match_budget(Duration::from_millis(ms)),
            None => options,
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file is specified but doesn't exist or is a directory
    /// - The match budget is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref file) = self.file {
            if !file.exists() {
                return Err(ConfigError::InputNotFound(file.clone()));
            }
            if file.is_dir() {
                return Err(ConfigError::InputIsDirectory(file.clone()));
            }
        }

        if self.match_budget_ms == Some(0) {
            return Err(ConfigError::ZeroMatchBudget);
        }

        Ok(())
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Input file not found
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Input path is a directory
    #[error("Input path is a directory: {0}")]
    InputIsDirectory(PathBuf),

    /// Pattern budget of zero would reject every line
    #[error("--match-budget-ms must be greater than zero")]
    ZeroMatchBudget,
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.file.is_none());
        assert!(config.framework.is_empty());
        assert!(config.run_name_prefix.is_empty());
        assert!(config.match_budget_ms.is_none());
        assert!(!config.pretty);
        assert!(!config.verbose);
        assert!(!config.quiet);
    }

    #[test]
    fn test_frameworks_default_to_all() {
        let config = Config::default();
        assert_eq!(config.frameworks(), Framework::ALL.to_vec());
    }

    #[test]
    fn test_frameworks_custom() {
        let config = Config {
            framework: vec![Framework::Jest],
            ..Default::default()
        };
        assert_eq!(config.frameworks(), vec![Framework::Jest]);
    }

    #[test]
    fn test_engine_options() {
        let config = Config {
            run_name_prefix: "nightly".to_string(),
            match_budget_ms: Some(250),
            ..Default::default()
        };
        let options = config.engine_options();
        assert_eq!(options.run_name_prefix, "nightly");
        assert_eq!(options.match_budget, Duration::from_millis(250));
    }

    #[test]
    fn test_engine_options_keep_default_budget() {
        let options = Config::default().engine_options();
        assert_eq!(options.match_budget, EngineOptions::default().match_budget);
    }

    #[test]
    fn test_log_level_default() {
        let config = Config::default();
        assert_eq!(config.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_log_level_verbose() {
        let config = Config {
            verbose: true,
            ..Default::default()
        };
        assert_eq!(config.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_log_level_quiet() {
        let config = Config {
            quiet: true,
            ..Default::default()
        };
        assert_eq!(config.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_validate_nonexistent_file() {
        let config = Config {
            file: Some(PathBuf::from("/nonexistent/path/12345.log")),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InputNotFound(_))));
    }

    #[test]
    fn test_validate_directory() {
        let config = Config {
            file: Some(std::env::temp_dir()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InputIsDirectory(_))));
    }

    #[test]
    fn test_validate_zero_budget() {
        let config = Config {
            match_budget_ms: Some(0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroMatchBudget)));
    }

    #[test]
    fn test_validate_stdin() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }
}
