//! Configuration file loading for gavel
//!
//! Handles loading and parsing configuration and problem files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, ENV_PREFIX, ProblemFile};

impl Config {
    /// Load configuration from a file, with `GAVEL__*` environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.judge.max_parallel == 0 {
            return Err(ConfigError::Invalid(
                "judge.max_parallel must be at least 1".to_owned(),
            ));
        }

        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.extension.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty extension"
                )));
            }
            if lang.run.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty run command"
                )));
            }
            if let Some(ref compile) = lang.compile
                && compile.command.is_empty()
            {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty compile command"
                )));
            }
        }

        Ok(())
    }
}

impl ProblemFile {
    /// Load a problem definition from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let problem = ConfigBuilder::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;

        let problem: ProblemFile = problem.try_deserialize()?;
        problem.validate()?;
        Ok(problem)
    }

    /// Parse a problem definition from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let problem = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let problem: ProblemFile = problem.try_deserialize()?;
        problem.validate()?;
        Ok(problem)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.trim().is_empty() {
            return Err(ConfigError::Invalid("problem has empty identity".to_owned()));
        }
        if self.max_runtime == Some(0) {
            return Err(ConfigError::Invalid(format!(
                "problem '{}' has a zero max_runtime",
                self.identity
            )));
        }
        Ok(())
    }
}
