//! Evaluation bridge: optimizer objective calls -> host function calls.
//!
//! The optimizer only sees the [`Evaluator`] contract. [`HostEvaluator`]
//! implements it by packing the candidate point into the run-scoped
//! [`EvaluationState`], calling the host function, and validating what comes
//! back. Host results are owned by the call and dropped before it returns.

use bo_types::{BoptError, BoptResult, EvaluationError, HostValue, NumericArray};
use tracing::{debug, info};

/// At most the point plus one extra argument are passed to the host function.
pub const MAX_ARGUMENTS: usize = 2;

/// Objective contract the optimizer depends on.
pub trait Evaluator {
    /// Number of coordinates each point must have.
    fn dimension(&self) -> usize;

    /// Evaluate the objective at `point`; fill `gradient` when one is requested.
    fn evaluate(&mut self, point: &[f64], gradient: Option<&mut [f64]>) -> BoptResult<f64>;

    /// Successful evaluations so far.
    fn evaluations(&self) -> usize;
}

/// A function living in the host runtime.
pub trait HostFunction {
    /// Result object owned by the host; released when dropped.
    type Output: AsRef<HostValue>;

    fn name(&self) -> &str;

    /// Call with positional `args`, asking for `n_outputs` results.
    fn call(&mut self, args: &[HostValue], n_outputs: usize) -> BoptResult<Vec<Self::Output>>;
}

/// Per-run evaluation state: host function, reusable argument buffers,
/// evaluation counter.
#[derive(Debug)]
pub struct EvaluationState<F> {
    function: F,
    args: Vec<HostValue>,
    point_slot: usize,
    dimension: usize,
    evaluations: usize,
    verbose: bool,
}

impl<F: HostFunction> EvaluationState<F> {
    /// State for a `dimension`-dimensional problem; the point is the only argument.
    pub fn new(function: F, dimension: usize) -> Self {
        Self {
            function,
            args: vec![HostValue::Numeric(NumericArray::column(vec![0.0; dimension]))],
            point_slot: 0,
            dimension,
            evaluations: 0,
            verbose: false,
        }
    }

    /// Pass `extra` alongside the point, with the point at `point_slot`.
    pub fn with_extra_argument(mut self, extra: HostValue, point_slot: usize) -> BoptResult<Self> {
        if point_slot >= MAX_ARGUMENTS {
            return Err(EvaluationError::InvalidSlot {
                slot: point_slot,
                arguments: MAX_ARGUMENTS,
            }
            .into());
        }
        let point = self.args.swap_remove(self.point_slot);
        self.args = if point_slot == 0 {
            vec![point, extra]
        } else {
            vec![extra, point]
        };
        self.point_slot = point_slot;
        Ok(self)
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    pub fn into_function(self) -> F {
        self.function
    }

    /// The buffer the point is copied into on every call.
    fn point_buffer(&mut self) -> BoptResult<&mut [f64]> {
        match self.args.get_mut(self.point_slot) {
            Some(HostValue::Numeric(array)) => Ok(array.real_mut()),
            _ => Err(BoptError::Internal(format!(
                "argument slot {} does not hold the point buffer",
                self.point_slot
            ))),
        }
    }
}

/// Run one evaluation of the host function against `state`.
///
/// Any failure is fatal for the run and nothing is retried.
pub fn evaluate_point<F: HostFunction>(
    state: &mut EvaluationState<F>,
    point: &[f64],
    gradient: Option<&mut [f64]>,
) -> BoptResult<f64> {
    if point.len() != state.dimension {
        return Err(EvaluationError::DimensionMismatch {
            expected: state.dimension,
            actual: point.len(),
        }
        .into());
    }
    if let Some(buffer) = gradient.as_deref() {
        if buffer.len() != point.len() {
            return Err(EvaluationError::DimensionMismatch {
                expected: point.len(),
                actual: buffer.len(),
            }
            .into());
        }
    }

    state.point_buffer()?.copy_from_slice(point);

    let requested = if gradient.is_some() { 2 } else { 1 };
    let outputs = state
        .function
        .call(&state.args, requested)
        .map_err(|err| EvaluationError::CallFailed {
            function: state.function.name().to_string(),
            message: err.to_string(),
        })?;
    if outputs.len() < requested {
        return Err(EvaluationError::MissingOutput {
            function: state.function.name().to_string(),
            requested,
            returned: outputs.len(),
        }
        .into());
    }
    let mut outputs = outputs.into_iter();

    let Some(first) = outputs.next() else {
        return Err(BoptError::Internal("host returned no outputs".to_string()));
    };
    let value = match first.as_ref().as_numeric().and_then(NumericArray::as_real_scalar) {
        Some(value) => value,
        None => {
            return Err(EvaluationError::NotRealScalar {
                function: state.function.name().to_string(),
                found: first.as_ref().describe(),
            }
            .into())
        }
    };
    drop(first);

    if let Some(buffer) = gradient {
        let Some(second) = outputs.next() else {
            return Err(BoptError::Internal("host returned no gradient".to_string()));
        };
        match second.as_ref().as_numeric() {
            Some(array)
                if !array.is_complex() && array.is_vector() && array.len() == buffer.len() =>
            {
                buffer.copy_from_slice(array.real());
            }
            _ => {
                return Err(EvaluationError::GradientWrongSize {
                    function: state.function.name().to_string(),
                    expected: buffer.len(),
                    found: second.as_ref().describe(),
                }
                .into())
            }
        }
        drop(second);
    }
    drop(outputs);

    state.evaluations += 1;
    if state.verbose {
        info!("Optimize eval #{}: {}", state.evaluations, value);
    } else {
        debug!("Optimize eval #{}: {}", state.evaluations, value);
    }
    Ok(value)
}

/// [`Evaluator`] adapter over a borrowed run-scoped [`EvaluationState`].
pub struct HostEvaluator<'a, F> {
    state: &'a mut EvaluationState<F>,
}

impl<'a, F: HostFunction> HostEvaluator<'a, F> {
    pub fn new(state: &'a mut EvaluationState<F>) -> Self {
        Self { state }
    }
}

impl<F: HostFunction> Evaluator for HostEvaluator<'_, F> {
    fn dimension(&self) -> usize {
        self.state.dimension()
    }

    fn evaluate(&mut self, point: &[f64], gradient: Option<&mut [f64]>) -> BoptResult<f64> {
        evaluate_point(self.state, point, gradient)
    }

    fn evaluations(&self) -> usize {
        self.state.evaluations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Host result that counts how many are alive.
    struct Tracked {
        value: HostValue,
        live: Rc<Cell<usize>>,
    }

    impl AsRef<HostValue> for Tracked {
        fn as_ref(&self) -> &HostValue {
            &self.value
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    /// Host function backed by a Rust closure returning raw host values.
    struct Scripted<C> {
        body: C,
        calls: usize,
        live: Rc<Cell<usize>>,
        last_args: Vec<HostValue>,
    }

    impl<C> Scripted<C>
    where
        C: FnMut(&[f64], usize) -> BoptResult<Vec<HostValue>>,
    {
        fn new(body: C) -> Self {
            Self {
                body,
                calls: 0,
                live: Rc::new(Cell::new(0)),
                last_args: Vec::new(),
            }
        }
    }

    impl<C> HostFunction for Scripted<C>
    where
        C: FnMut(&[f64], usize) -> BoptResult<Vec<HostValue>>,
    {
        type Output = Tracked;

        fn name(&self) -> &str {
            "scripted"
        }

        fn call(&mut self, args: &[HostValue], n_outputs: usize) -> BoptResult<Vec<Tracked>> {
            self.calls += 1;
            self.last_args = args.to_vec();
            let point = args
                .iter()
                .find_map(|arg| match arg {
                    HostValue::Numeric(array) if array.dims().1 == 1 => Some(array.real()),
                    _ => None,
                })
                .unwrap_or(&[]);
            let values = (self.body)(point, n_outputs)?;
            self.live.set(self.live.get() + values.len());
            Ok(values
                .into_iter()
                .map(|value| Tracked {
                    value,
                    live: Rc::clone(&self.live),
                })
                .collect())
        }
    }

    fn constant(c: f64) -> Scripted<impl FnMut(&[f64], usize) -> BoptResult<Vec<HostValue>>> {
        Scripted::new(move |_point: &[f64], _n: usize| Ok(vec![HostValue::from(c)]))
    }

    fn sphere_with_gradient(
        gradient_len: usize,
    ) -> Scripted<impl FnMut(&[f64], usize) -> BoptResult<Vec<HostValue>>> {
        Scripted::new(move |point: &[f64], n: usize| {
            let value: f64 = point.iter().map(|x| x * x).sum();
            let mut outputs = vec![HostValue::from(value)];
            if n == 2 {
                let grad: Vec<f64> = point.iter().map(|x| 2.0 * x).take(gradient_len).collect();
                outputs.push(HostValue::from(NumericArray::column(grad)));
            }
            Ok(outputs)
        })
    }

    #[test]
    fn constant_function_counts_every_call() {
        let mut state = EvaluationState::new(constant(4.25), 2);
        let mut evaluator = HostEvaluator::new(&mut state);
        for expected in 1..=25 {
            let value = evaluator.evaluate(&[0.1 * expected as f64, 0.0], None).unwrap();
            assert_eq!(value, 4.25);
            assert_eq!(evaluator.evaluations(), expected);
        }
        assert_eq!(state.function().calls, 25);
    }

    #[test]
    fn host_results_are_released_each_call() {
        let mut state = EvaluationState::new(sphere_with_gradient(3), 3);
        let live = Rc::clone(&state.function().live);
        let mut grad = [0.0; 3];
        for i in 0..100 {
            let x = i as f64;
            evaluate_point(&mut state, &[x, 1.0, -1.0], Some(&mut grad)).unwrap();
            assert_eq!(live.get(), 0);
        }
        assert_eq!(state.evaluations(), 100);
    }

    #[test]
    fn gradient_is_copied_exactly() {
        let mut state = EvaluationState::new(sphere_with_gradient(3), 3);
        let mut grad = [f64::NAN; 3];
        let value = evaluate_point(&mut state, &[1.0, -2.0, 0.5], Some(&mut grad)).unwrap();
        assert_eq!(value, 5.25);
        assert_eq!(grad, [2.0, -4.0, 1.0]);
    }

    #[test]
    fn gradient_of_wrong_length_fails() {
        let mut state = EvaluationState::new(sphere_with_gradient(2), 3);
        let mut grad = [0.0; 3];
        let err = evaluate_point(&mut state, &[1.0, 2.0, 3.0], Some(&mut grad)).unwrap_err();
        assert!(matches!(
            err,
            BoptError::Evaluation(EvaluationError::GradientWrongSize { expected: 3, .. })
        ));
        assert!(err.to_string().contains("wrong size"));
        assert_eq!(state.evaluations(), 0);
        assert_eq!(state.function().live.get(), 0);
    }

    #[test]
    fn gradient_only_requested_when_buffer_given() {
        let mut state = EvaluationState::new(
            Scripted::new(|_point: &[f64], n: usize| {
                assert_eq!(n, 1);
                Ok(vec![HostValue::from(1.0)])
            }),
            1,
        );
        assert_eq!(evaluate_point(&mut state, &[0.0], None).unwrap(), 1.0);
    }

    #[test]
    fn non_scalar_result_fails() {
        let mut state = EvaluationState::new(
            Scripted::new(|_point: &[f64], _n: usize| Ok(vec![HostValue::from(vec![1.0, 2.0])])),
            1,
        );
        let err = evaluate_point(&mut state, &[0.0], None).unwrap_err();
        assert!(err.to_string().contains("must return real scalar"));

        let mut state = EvaluationState::new(
            Scripted::new(|_point: &[f64], _n: usize| {
                Ok(vec![HostValue::from(
                    NumericArray::complex(vec![1.0], vec![2.0]).unwrap(),
                )])
            }),
            1,
        );
        assert!(matches!(
            evaluate_point(&mut state, &[0.0], None),
            Err(BoptError::Evaluation(EvaluationError::NotRealScalar { .. }))
        ));
    }

    #[test]
    fn host_failure_is_not_retried() {
        let mut state = EvaluationState::new(
            Scripted::new(|_point: &[f64], _n: usize| {
                Err(BoptError::Internal("undefined variable".to_string()))
            }),
            2,
        );
        let err = evaluate_point(&mut state, &[0.0, 0.0], None).unwrap_err();
        assert!(matches!(
            err,
            BoptError::Evaluation(EvaluationError::CallFailed { ref message, .. })
                if message.contains("undefined variable")
        ));
        assert_eq!(state.function().calls, 1);
        assert_eq!(state.evaluations(), 0);
    }

    #[test]
    fn missing_gradient_output_fails() {
        let mut state = EvaluationState::new(constant(1.0), 2);
        let mut grad = [0.0; 2];
        assert!(matches!(
            evaluate_point(&mut state, &[0.0, 0.0], Some(&mut grad)),
            Err(BoptError::Evaluation(EvaluationError::MissingOutput {
                requested: 2,
                returned: 1,
                ..
            }))
        ));
    }

    #[test]
    fn dimension_is_enforced() {
        let mut state = EvaluationState::new(constant(1.0), 2);
        assert!(matches!(
            evaluate_point(&mut state, &[0.0], None),
            Err(BoptError::Evaluation(EvaluationError::DimensionMismatch {
                expected: 2,
                actual: 1
            }))
        ));
        let mut short = [0.0; 1];
        assert!(evaluate_point(&mut state, &[0.0, 0.0], Some(&mut short)).is_err());
        assert_eq!(state.function().calls, 0);
    }

    #[test]
    fn extra_argument_keeps_its_slot() {
        let mut state = EvaluationState::new(constant(0.0), 2)
            .with_extra_argument(HostValue::from("data"), 1)
            .unwrap();
        evaluate_point(&mut state, &[3.0, 4.0], None).unwrap();
        let args = &state.function().last_args;
        assert_eq!(args.len(), 2);
        assert_eq!(args[0], HostValue::from("data"));
        assert_eq!(
            args[1],
            HostValue::from(NumericArray::column(vec![3.0, 4.0]))
        );

        assert!(EvaluationState::new(constant(0.0), 2)
            .with_extra_argument(HostValue::from(1.0), 2)
            .is_err());
    }

    #[test]
    fn verbose_flag_does_not_change_results() {
        let mut state = EvaluationState::new(constant(2.0), 1).verbose(true);
        assert_eq!(evaluate_point(&mut state, &[0.0], None).unwrap(), 2.0);
        assert_eq!(state.evaluations(), 1);
    }
}
