//! Validation runner.
//!
//! Replays every corpus case through the external engine and classifies the
//! engine's runtime against the expected one. A failing case never stops
//! the batch; it becomes an `Error` or `ParseError` result.

mod classify;
mod engine;
mod throttle;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::models::{DiveTestCase, Stop};
use crate::parser::{self, Field};

pub use classify::{compare, Comparison, ValidationStatus, CLOSE_TOLERANCE_MIN, EXACT_TOLERANCE_MIN};
pub use engine::{Engine, EngineCommand, EngineInvocation, Engines, NO_GAS};
pub use throttle::Throttle;

/// Outcome of running one case through the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub case: DiveTestCase,
    pub status: ValidationStatus,
    pub actual_runtime: Option<f64>,
    pub actual_deco_time: Option<f64>,
    pub difference: Option<f64>,
    pub accuracy_pct: Option<f64>,
    pub error_detail: Option<String>,
    #[serde(default)]
    pub actual_schedule: Vec<Stop>,
}

impl ValidationResult {
    pub fn error(case: DiveTestCase, detail: impl Into<String>) -> Self {
        Self {
            case,
            status: ValidationStatus::Error,
            actual_runtime: None,
            actual_deco_time: None,
            difference: None,
            accuracy_pct: None,
            error_detail: Some(detail.into()),
            actual_schedule: Vec::new(),
        }
    }

    fn parse_error(case: DiveTestCase, output: &str) -> Self {
        Self {
            status: ValidationStatus::ParseError,
            ..Self::error(case, format!("no runtime in engine output:\n{output}"))
        }
    }
}

/// Runs cases through the configured engines.
#[derive(Debug)]
pub struct Validator {
    pub engines: Engines,
    pub vpm_second_param: u8,
    pub throttle: Arc<Throttle>,
    /// Maximum concurrent engine processes
    pub workers: usize,
}

impl Validator {
    /// Validate one case.
    pub async fn validate(&self, case: &DiveTestCase) -> ValidationResult {
        let Some(invocation) = EngineInvocation::for_case(case, self.vpm_second_param) else {
            tracing::error!(case = %case.key, "no bottom gas configured");
            return ValidationResult::error(case.clone(), "no bottom gas configured");
        };
        let engine = self.engines.for_algorithm(case.algorithm());

        self.throttle.wait().await;
        tracing::debug!(case = %case.key, args = ?invocation.args(), "running engine");

        let output = match engine.run(&invocation).await {
            Ok(output) => output,
            Err(err) => {
                tracing::error!(case = %case.key, error = %err, "engine run failed");
                return ValidationResult::error(case.clone(), err.detail());
            }
        };

        let report = parser::parse(&output);
        let Some(actual_runtime) = report.number(Field::Runtime) else {
            tracing::error!(case = %case.key, "engine output has no runtime");
            return ValidationResult::parse_error(case.clone(), &output);
        };

        let Comparison {
            difference,
            accuracy_pct,
            status,
        } = compare(case.expected_runtime, actual_runtime);
        tracing::info!(
            case = %case.key,
            expected = case.expected_runtime,
            actual = actual_runtime,
            %status,
            "validated"
        );

        ValidationResult {
            case: case.clone(),
            status,
            actual_runtime: Some(actual_runtime),
            actual_deco_time: report.number(Field::DecoTime),
            difference: Some(difference),
            accuracy_pct: Some(accuracy_pct),
            error_detail: None,
            actual_schedule: report.stops().to_vec(),
        }
    }

    /// Validate every case, at most `workers` at a time. Results come back
    /// in input order.
    pub async fn run_all(self: Arc<Self>, cases: Vec<DiveTestCase>) -> Vec<ValidationResult> {
        let permits = Arc::new(Semaphore::new(self.workers.max(1)));
        let mut set = JoinSet::new();

        for (index, case) in cases.iter().cloned().enumerate() {
            let validator = Arc::clone(&self);
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (index, validator.validate(&case).await)
            });
        }

        let mut slots: Vec<Option<ValidationResult>> = vec![None; cases.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(err) => tracing::error!(error = %err, "validation task failed"),
            }
        }

        slots
            .into_iter()
            .zip(cases)
            .map(|(slot, case)| {
                slot.unwrap_or_else(|| ValidationResult::error(case, "validation task aborted"))
            })
            .collect()
    }
}
