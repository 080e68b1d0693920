//! Optimization run driver and run lifecycle tracking.

use bo_types::{validation_error, BoptError, BoptParams, BoptResult, HostObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::evaluator::{EvaluationState, Evaluator, HostEvaluator, HostFunction};
use crate::marshal::load_parameters;

/// Unique optimization run identifier.
pub type RunId = Uuid;

/// Box constraints of the search domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> BoptResult<Self> {
        if lower.is_empty() {
            return Err(validation_error!("bounds must have at least one dimension"));
        }
        if lower.len() != upper.len() {
            return Err(validation_error!(
                "lower bound has {} dimensions, upper bound has {}",
                lower.len(),
                upper.len()
            ));
        }
        if let Some(i) = (0..lower.len())
            .find(|&i| lower[i].is_nan() || upper[i].is_nan() || lower[i] > upper[i])
        {
            return Err(validation_error!(
                "lower bound {} above upper bound {} in dimension {}",
                lower[i],
                upper[i],
                i
            ));
        }
        Ok(Self { lower, upper })
    }

    /// The unit hypercube in `dimension` dimensions.
    pub fn unit(dimension: usize) -> BoptResult<Self> {
        Self::new(vec![0.0; dimension], vec![1.0; dimension])
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dimension()
            && point
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(x, (lo, hi))| lo <= x && x <= hi)
    }
}

/// Best point found by an optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
}

/// The native optimizer, seen from the bridge.
pub trait Optimizer {
    fn name(&self) -> &str;

    /// Minimize through `evaluator` inside `bounds`.
    fn minimize(
        &mut self,
        params: &BoptParams,
        bounds: &Bounds,
        evaluator: &mut dyn Evaluator,
    ) -> BoptResult<Minimum>;
}

/// Lifecycle state for an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Status record of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub id: RunId,
    pub optimizer: String,
    pub state: RunState,
    pub evaluations: usize,
    pub best: Option<Minimum>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl OptimizationRun {
    pub fn new(optimizer: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            optimizer: optimizer.into(),
            state: RunState::Pending,
            evaluations: 0,
            best: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = RunState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, best: Minimum, evaluations: usize) {
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
        self.best = Some(best);
        self.evaluations = evaluations;
    }

    pub fn mark_failed(&mut self, error: String, evaluations: usize) {
        self.state = RunState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
        self.evaluations = evaluations;
    }
}

/// Everything a finished run hands back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub run: OptimizationRun,
    pub params: BoptParams,
    pub minimum: Minimum,
}

/// Why a run produced no outcome.
#[derive(Error, Debug)]
pub enum RunError {
    /// Rejected before the optimizer started; no run was recorded.
    #[error(transparent)]
    Setup(#[from] BoptError),

    /// The optimizer started and failed; `run` is the failed record.
    #[error("Optimization run {} failed after {} evaluations: {source}", run.id, run.evaluations)]
    Failed {
        run: Box<OptimizationRun>,
        source: BoptError,
    },
}

impl RunError {
    /// The failed run record, if the optimizer got to start.
    pub fn run(&self) -> Option<&OptimizationRun> {
        match self {
            Self::Setup(_) => None,
            Self::Failed { run, .. } => Some(run),
        }
    }

    /// The underlying bridge or optimizer error.
    pub fn error(&self) -> &BoptError {
        match self {
            Self::Setup(source) | Self::Failed { source, .. } => source,
        }
    }
}

impl From<RunError> for BoptError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Setup(source) | RunError::Failed { source, .. } => source,
        }
    }
}

/// Run `optimizer` with already marshaled parameters and a prepared state.
///
/// The state lives exactly as long as this call.
pub fn run_with_state<F, O>(
    params: BoptParams,
    mut state: EvaluationState<F>,
    bounds: &Bounds,
    optimizer: &mut O,
) -> Result<OptimizationOutcome, RunError>
where
    F: HostFunction,
    O: Optimizer + ?Sized,
{
    if bounds.dimension() != state.dimension() {
        return Err(validation_error!(
            "bounds have {} dimensions, objective expects {}",
            bounds.dimension(),
            state.dimension()
        )
        .into());
    }

    let mut run = OptimizationRun::new(optimizer.name());
    info!(
        "Starting optimization run {} with {} in {} dimensions",
        run.id,
        run.optimizer,
        bounds.dimension()
    );
    run.mark_running();

    let result = {
        let mut evaluator = HostEvaluator::new(&mut state);
        optimizer.minimize(&params, bounds, &mut evaluator)
    };

    match result {
        Ok(minimum) => {
            run.mark_completed(minimum.clone(), state.evaluations());
            info!(
                "Optimization run {} finished after {} evaluations: f = {}",
                run.id, run.evaluations, minimum.value
            );
            Ok(OptimizationOutcome {
                run,
                params,
                minimum,
            })
        }
        Err(err) => {
            run.mark_failed(err.to_string(), state.evaluations());
            error!(
                "Optimization run {} failed after {} evaluations: {}",
                run.id, run.evaluations, err
            );
            Err(RunError::Failed {
                run: Box::new(run),
                source: err,
            })
        }
    }
}

/// Full bridge flow: marshal `config`, then optimize `function` inside `bounds`.
///
/// Verbose per-evaluation output follows `verbose_level > 0`.
pub fn run_optimization<H, F, O>(
    config: &H,
    function: F,
    bounds: &Bounds,
    optimizer: &mut O,
) -> Result<OptimizationOutcome, RunError>
where
    H: HostObject + ?Sized,
    F: HostFunction,
    O: Optimizer + ?Sized,
{
    let params = load_parameters(config, BoptParams::default())?;
    let state = EvaluationState::new(function, bounds.dimension()).verbose(params.verbose_level > 0);
    run_with_state(params, state, bounds, optimizer)
}
