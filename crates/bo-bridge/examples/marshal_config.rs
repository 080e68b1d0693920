//! Marshal a JSON configuration and drive a toy optimizer through the bridge.

use bo_bridge::{
    load_parameters_with_report, run_with_state, BoptParams, BoptResult, Bounds,
    EvaluationState, Evaluator, HostFunction, HostValue, Minimum, Optimizer,
};
use serde_json::json;

/// Rosenbrock function with its gradient, standing in for a host callback.
struct Rosenbrock;

impl HostFunction for Rosenbrock {
    type Output = HostValue;

    fn name(&self) -> &str {
        "rosenbrock"
    }

    fn call(&mut self, args: &[HostValue], n_outputs: usize) -> BoptResult<Vec<HostValue>> {
        let x = args[0].as_numeric().map(|a| a.real().to_vec()).unwrap_or_default();
        let (a, b) = (x[0], x[1]);
        let value = (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2);
        let mut outputs = vec![HostValue::from(value)];
        if n_outputs == 2 {
            let da = -2.0 * (1.0 - a) - 400.0 * a * (b - a * a);
            let db = 200.0 * (b - a * a);
            outputs.push(HostValue::from(vec![da, db]));
        }
        Ok(outputs)
    }
}

/// Plain gradient descent with a fixed step.
struct Descent {
    step: f64,
}

impl Optimizer for Descent {
    fn name(&self) -> &str {
        "descent"
    }

    fn minimize(
        &mut self,
        params: &BoptParams,
        bounds: &Bounds,
        evaluator: &mut dyn Evaluator,
    ) -> BoptResult<Minimum> {
        let mut point = bounds.lower().to_vec();
        let mut grad = vec![0.0; point.len()];
        let mut value = evaluator.evaluate(&point, Some(&mut grad))?;
        for _ in 0..params.n_iterations {
            for ((x, g), (lo, hi)) in point
                .iter_mut()
                .zip(&grad)
                .zip(bounds.lower().iter().zip(bounds.upper()))
            {
                *x = (*x - self.step * g).clamp(*lo, *hi);
            }
            value = evaluator.evaluate(&point, Some(&mut grad))?;
        }
        Ok(Minimum { point, value })
    }
}

fn main() -> BoptResult<()> {
    let config = json!({
        "n_iterations": 200,
        "verbose_level": 0,
        "alpha": 0.1,
        "theta": [1.0, 2.0],
        "s_theta": [0.1, 0.1],
        "crit_name": "cLCB",
        "l_type": "L_ML"
    });
    let config = config.as_object().cloned().unwrap_or_default();

    let (params, report) = load_parameters_with_report(&config, BoptParams::default())?;
    println!("applied: {:?}", report.applied);
    println!("missing: {:?}", report.missing);

    let bounds = Bounds::new(vec![-1.5, -0.5], vec![1.5, 2.0])?;
    let state = EvaluationState::new(Rosenbrock, bounds.dimension());
    let outcome = run_with_state(params, state, &bounds, &mut Descent { step: 1e-3 })?;

    println!(
        "best f = {:.6} at {:?} after {} evaluations",
        outcome.minimum.value, outcome.minimum.point, outcome.run.evaluations
    );
    Ok(())
}
