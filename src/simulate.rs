/*!
 * Scripted breaker simulation
 *
 * A scenario is a list of steps separated by commas or whitespace:
 *
 * - `s` / `ok`: a call that succeeds
 * - `f` / `fail`: a call that fails
 * - `wait:<ms>`: let time pass
 * - `check`: query `can_execute` without calling anything
 * - `reset`: force the breaker closed
 *
 * Calls go through `CircuitBreaker::execute`, so a call attempted while the
 * breaker is open shows up as rejected and is not counted.
 */

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tripwire_core_breaker::{CircuitBreaker, CircuitState, ExecuteError};

use crate::error::TripwireError;

/// One step of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Success,
    Failure,
    Wait(Duration),
    Check,
    Reset,
}

impl FromStr for Step {
    type Err = TripwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        match token.as_str() {
            "s" | "ok" | "success" => Ok(Step::Success),
            "f" | "fail" | "failure" => Ok(Step::Failure),
            "check" => Ok(Step::Check),
            "reset" => Ok(Step::Reset),
            _ => {
                let ms = token
                    .strip_prefix("wait:")
                    .ok_or_else(|| TripwireError::Scenario(format!("unknown step '{}'", s)))?;
                let ms: u64 = ms.parse().map_err(|_| {
                    TripwireError::Scenario(format!("invalid wait duration in '{}'", s))
                })?;
                Ok(Step::Wait(Duration::from_millis(ms)))
            }
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Success => write!(f, "s"),
            Step::Failure => write!(f, "f"),
            Step::Wait(d) => write!(f, "wait:{}", d.as_millis()),
            Step::Check => write!(f, "check"),
            Step::Reset => write!(f, "reset"),
        }
    }
}

/// Parsed step script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    steps: Vec<Step>,
}

impl Scenario {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl FromStr for Scenario {
    type Err = TripwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let steps = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Step>, _>>()?;

        if steps.is_empty() {
            return Err(TripwireError::Scenario("no steps given".to_string()));
        }
        Ok(Self { steps })
    }
}

/// Error returned by a simulated failing call
#[derive(Debug, Error)]
#[error("simulated failure")]
pub struct SimulatedFailure;

/// What a step did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed,
    Rejected,
    Waited,
    Admissible,
    NotAdmissible,
    Reset,
}

/// Result of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub step: String,
    pub outcome: StepOutcome,
    pub phase: CircuitState,
    pub consecutive_failures: u32,
}

/// Totals over a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub rejected: usize,
}

impl ScenarioSummary {
    pub fn from_reports(reports: &[StepReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.outcome {
                StepOutcome::Succeeded => summary.succeeded += 1,
                StepOutcome::Failed => summary.failed += 1,
                StepOutcome::Rejected => summary.rejected += 1,
                _ => {}
            }
        }
        summary
    }
}

/// Run every step of `scenario` against `breaker`
pub async fn run_scenario(breaker: &CircuitBreaker, scenario: &Scenario) -> Vec<StepReport> {
    let mut reports = Vec::with_capacity(scenario.steps.len());

    for (index, step) in scenario.steps.iter().enumerate() {
        let outcome = match *step {
            Step::Success => call_outcome(breaker.execute(|| async { Ok(()) }).await),
            Step::Failure => call_outcome(breaker.execute(|| async { Err(SimulatedFailure) }).await),
            Step::Wait(duration) => {
                tokio::time::sleep(duration).await;
                StepOutcome::Waited
            }
            Step::Check => {
                if breaker.can_execute() {
                    StepOutcome::Admissible
                } else {
                    StepOutcome::NotAdmissible
                }
            }
            Step::Reset => {
                breaker.force_reset();
                StepOutcome::Reset
            }
        };

        let stats = breaker.stats();
        tracing::trace!(
            breaker = breaker.name(),
            step = %step,
            ?outcome,
            phase = %stats.phase,
            "simulation step"
        );

        reports.push(StepReport {
            index,
            step: step.to_string(),
            outcome,
            phase: stats.phase,
            consecutive_failures: stats.consecutive_failures,
        });
    }

    reports
}

fn call_outcome(result: Result<(), ExecuteError<SimulatedFailure>>) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::Succeeded,
        Err(ExecuteError::Open(_)) => StepOutcome::Rejected,
        Err(ExecuteError::Inner(_)) => StepOutcome::Failed,
    }
}
