//! # bo-bridge
//!
//! Adapter layer between a dynamically typed host runtime and the BayesOpt
//! optimizer.
//!
//! Provides the table-driven parameter marshaler (host configuration object
//! to [`BoptParams`]), the evaluation bridge that turns optimizer objective
//! calls into host function calls, and a run driver tying both to an
//! [`Optimizer`].

mod evaluator;
mod marshal;
mod run;

pub use bo_types::*;
pub use evaluator::{
    evaluate_point, EvaluationState, Evaluator, HostEvaluator, HostFunction, MAX_ARGUMENTS,
};
pub use marshal::{field_names, load_parameters, load_parameters_with_report, MarshalReport};
pub use run::{
    run_optimization, run_with_state, Bounds, Minimum, OptimizationOutcome, OptimizationRun,
    Optimizer, RunError, RunId, RunState,
};
