//! External calculation engine invocation.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use crate::error::EngineError;
use crate::models::{bottom_spec, deco_spec, Algorithm, DiveTestCase};

/// Placeholder for an absent gas, passed to the engine when there is no deco gas.
pub const NO_GAS: &str = "none";

/// Program plus leading arguments, e.g. `java VPMAlignmentCLI`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl EngineCommand {
    /// Split a whitespace-separated command line.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// Positional parameters for one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    pub depth_m: u32,
    pub bottom_time_min: u32,
    pub bottom_gas: String,
    pub deco_gas: String,
    pub conservatism: u8,
    pub second_param: u8,
}

impl EngineInvocation {
    /// `None` when the case has no bottom gas to breathe.
    pub fn for_case(case: &DiveTestCase, vpm_second_param: u8) -> Option<Self> {
        let (conservatism, second_param) = case.conservatism().engine_params(vpm_second_param);
        Some(Self {
            depth_m: case.depth_m(),
            bottom_time_min: case.bottom_time_min(),
            bottom_gas: bottom_spec(&case.gases)?,
            deco_gas: deco_spec(&case.gases).unwrap_or_else(|| NO_GAS.to_string()),
            conservatism,
            second_param,
        })
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            self.depth_m.to_string(),
            self.bottom_time_min.to_string(),
            self.bottom_gas.clone(),
            self.deco_gas.clone(),
            self.conservatism.to_string(),
            self.second_param.to_string(),
        ]
    }
}

/// One configured engine.
#[derive(Debug, Clone)]
pub struct Engine {
    pub command: EngineCommand,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl Engine {
    /// Run the engine and return its stdout.
    ///
    /// The child is killed if the timeout elapses first.
    pub async fn run(&self, invocation: &EngineInvocation) -> Result<String, EngineError> {
        let mut command = tokio::process::Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|source| EngineError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(EngineError::Wait)?,
            Err(_) => return Err(EngineError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).into_owned()
            } else {
                stderr.into_owned()
            };
            return Err(EngineError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                diagnostic,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Engines keyed by algorithm.
#[derive(Debug, Clone)]
pub struct Engines {
    pub buhlmann: Engine,
    pub vpm: Engine,
}

impl Engines {
    pub fn for_algorithm(&self, algorithm: Algorithm) -> &Engine {
        match algorithm {
            Algorithm::Buhlmann => &self.buhlmann,
            Algorithm::VpmB => &self.vpm,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str, timeout: Duration) -> Engine {
        Engine {
            command: EngineCommand {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string(), "engine".to_string()],
            },
            working_dir: None,
            timeout,
        }
    }

    fn invocation() -> EngineInvocation {
        EngineInvocation {
            depth_m: 51,
            bottom_time_min: 25,
            bottom_gas: "21/35".to_string(),
            deco_gas: "50@21".to_string(),
            conservatism: 2,
            second_param: 85,
        }
    }

    #[test]
    fn test_parse_command() {
        let cmd = EngineCommand::parse("  java  VPMAlignmentCLI ").unwrap();
        assert_eq!(cmd.program, "java");
        assert_eq!(cmd.args, vec!["VPMAlignmentCLI"]);
        assert!(EngineCommand::parse("   ").is_none());
    }

    #[test]
    fn test_invocation_for_case() {
        use crate::models::{CaseKey, Conservatism, GasMixture, GasRole, LastStop};

        let mut case = DiveTestCase {
            key: CaseKey {
                depth_m: 51,
                bottom_time_min: 25,
                conservatism: Conservatism::Vpm { level: 2 },
                last_stop: LastStop::Six,
                gas_label: "21-35".to_string(),
            },
            gases: vec![GasMixture::new(GasRole::Bottom, "21/35", 21.0, 35.0, None).unwrap()],
            expected_runtime: 178.0,
            expected_deco_time: 147.0,
            schedule: Vec::new(),
            provenance: Vec::new(),
        };

        let invocation = EngineInvocation::for_case(&case, 85).unwrap();
        assert_eq!(invocation.args(), vec!["51", "25", "21/35", NO_GAS, "2", "85"]);

        case.gases.clear();
        assert!(EngineInvocation::for_case(&case, 85).is_none());
    }

    #[tokio::test]
    async fn test_positional_arguments() {
        let engine = shell(r#"echo "$1 $2 $3 $4 $5 $6""#, Duration::from_secs(10));
        let out = engine.run(&invocation()).await.unwrap();
        assert_eq!(out.trim(), "51 25 21/35 50@21 2 85");
    }

    #[tokio::test]
    async fn test_non_zero_exit_keeps_diagnostic() {
        let engine = shell("echo 'Exception in thread main' >&2; exit 3", Duration::from_secs(10));
        let err = engine.run(&invocation()).await.unwrap_err();
        assert!(matches!(err, EngineError::NonZeroExit { code: 3, .. }));
        assert_eq!(err.detail(), "Exception in thread main\n");
    }

    #[tokio::test]
    async fn test_timeout() {
        let engine = shell("sleep 5", Duration::from_millis(200));
        let err = engine.run(&invocation()).await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let engine = Engine {
            command: EngineCommand::parse("definitely-not-an-engine-binary").unwrap(),
            working_dir: None,
            timeout: Duration::from_secs(1),
        };
        let err = engine.run(&invocation()).await.unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }
}
