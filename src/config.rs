//! Typed configuration resolved from CLI arguments and environment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{Cli, ValidateArgs};
use crate::corpus::CORPUS_JSON;
use crate::error::ConfigError;
use crate::models::Algorithm;
use crate::report::RESULTS_JSON;
use crate::validation::{Engine, EngineCommand, Engines, Throttle, Validator};

/// Locations shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Config {
    pub test_cases_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            test_cases_dir: cli.test_cases_dir.clone(),
            output_dir: cli.output_dir.clone(),
        }
    }

    pub fn corpus_json(&self) -> PathBuf {
        self.output_dir.join(CORPUS_JSON)
    }

    pub fn results_json(&self) -> PathBuf {
        self.output_dir.join(RESULTS_JSON)
    }
}

/// Settings of one validation run.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub engines: Engines,
    pub vpm_second_param: u8,
    pub throttle: Duration,
    pub workers: usize,
}

impl ValidatorConfig {
    pub fn from_args(args: &ValidateArgs) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(args.timeout_secs);
        let engine = |command_line: &str, algorithm: Algorithm| -> Result<Engine, ConfigError> {
            let command = EngineCommand::parse(command_line)
                .ok_or(ConfigError::EmptyEngineCommand { algorithm })?;
            Ok(Engine {
                command,
                working_dir: args.engine_dir.clone(),
                timeout,
            })
        };

        Ok(Self {
            engines: Engines {
                buhlmann: engine(&args.buhlmann_engine, Algorithm::Buhlmann)?,
                vpm: engine(&args.vpm_engine, Algorithm::VpmB)?,
            },
            vpm_second_param: args.vpm_second_param,
            throttle: Duration::from_millis(args.throttle_ms),
            workers: usize::from(args.workers),
        })
    }

    pub fn into_validator(self) -> Validator {
        Validator {
            engines: self.engines,
            vpm_second_param: self.vpm_second_param,
            throttle: Arc::new(Throttle::new(self.throttle)),
            workers: self.workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_validator_config_from_args() {
        let cli = Cli::try_parse_from([
            "decoplan-corpus",
            "--output-dir",
            "out",
            "validate",
            "--vpm-engine",
            "java -cp build VPMAlignmentCLI",
            "--timeout-secs",
            "5",
            "--throttle-ms",
            "0",
        ])
        .unwrap();
        let crate::cli::Command::Validate(args) = &cli.command else {
            panic!("expected validate");
        };

        let config = ValidatorConfig::from_args(args).unwrap();
        assert_eq!(config.engines.vpm.command.args, vec!["-cp", "build", "VPMAlignmentCLI"]);
        assert_eq!(config.engines.vpm.timeout, Duration::from_secs(5));
        assert_eq!(config.throttle, Duration::ZERO);
        assert_eq!(Config::from_cli(&cli).corpus_json(), PathBuf::from("out/corpus.json"));
    }

    #[test]
    fn test_blank_engine_command_rejected() {
        let cli =
            Cli::try_parse_from(["decoplan-corpus", "validate", "--buhlmann-engine", " "]).unwrap();
        let crate::cli::Command::Validate(args) = &cli.command else {
            panic!("expected validate");
        };
        assert!(matches!(
            ValidatorConfig::from_args(args),
            Err(ConfigError::EmptyEngineCommand {
                algorithm: Algorithm::Buhlmann
            })
        ));
    }
}
