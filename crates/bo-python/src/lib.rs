use bo_bridge::{evaluate_point, load_parameters_with_report, BoptParams, EvaluationState};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyFloat, PyList, PyTuple};
use tracing_subscriber::EnvFilter;

mod host;

use host::{to_py_err, PyConfig, PyObjective};

/// BayesOpt host bridge Python module
#[pymodule]
fn boptbridge(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_class::<PyParameters>()?;
    m.add_class::<PyEvaluationSession>()?;
    m.add_function(wrap_pyfunction!(load_parameters, m)?)?;
    m.add_function(wrap_pyfunction!(default_parameters, m)?)?;
    m.add_function(wrap_pyfunction!(field_names, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    Ok(())
}

/// Marshal a configuration `dict` (or attribute object) over the defaults.
///
/// Missing fields keep their defaults; malformed ones raise `ValueError`.
/// The missing-field notices are log records, visible after `init_logging()`.
#[pyfunction]
fn load_parameters(config: &Bound<'_, PyAny>) -> PyResult<PyParameters> {
    let (inner, report) = load_parameters_with_report(
        &PyConfig::new(config.clone()),
        BoptParams::default(),
    )
    .map_err(to_py_err)?;
    Ok(PyParameters {
        inner,
        missing: report.missing.iter().map(|name| name.to_string()).collect(),
    })
}

#[pyfunction]
fn default_parameters() -> PyParameters {
    PyParameters {
        inner: BoptParams::default(),
        missing: bo_bridge::field_names()
            .into_iter()
            .map(String::from)
            .collect(),
    }
}

/// Host field names understood by `load_parameters`.
#[pyfunction]
fn field_names() -> Vec<&'static str> {
    bo_bridge::field_names()
}

/// Route Rust-side log output to stderr, filtered by `level` (e.g. "info").
///
/// Raises `RuntimeError` when a subscriber is already installed, including
/// the one a verbose `EvaluationSession` installs on first use.
#[pyfunction]
#[pyo3(signature = (level="info"))]
fn init_logging(level: &str) -> PyResult<()> {
    install_subscriber(level).map_err(|err| PyRuntimeError::new_err(err.to_string()))
}

fn install_subscriber(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .try_init()
}

/// Python wrapper for the marshaled parameter record
#[pyclass(name = "Parameters", frozen)]
struct PyParameters {
    inner: BoptParams,
    missing: Vec<String>,
}

#[pymethods]
impl PyParameters {
    #[getter]
    fn n_iterations(&self) -> usize {
        self.inner.n_iterations
    }

    #[getter]
    fn n_inner_iterations(&self) -> usize {
        self.inner.n_inner_iterations
    }

    #[getter]
    fn n_init_samples(&self) -> usize {
        self.inner.n_init_samples
    }

    #[getter]
    fn verbose_level(&self) -> usize {
        self.inner.verbose_level
    }

    #[getter]
    fn alpha(&self) -> f64 {
        self.inner.alpha
    }

    #[getter]
    fn beta(&self) -> f64 {
        self.inner.beta
    }

    #[getter]
    fn noise(&self) -> f64 {
        self.inner.noise
    }

    #[getter]
    fn theta(&self) -> Vec<f64> {
        self.inner.kernel.theta.values().to_vec()
    }

    #[getter]
    fn s_theta(&self) -> Vec<f64> {
        self.inner.kernel.theta.uncertainties().to_vec()
    }

    #[getter]
    fn mu(&self) -> Vec<f64> {
        self.inner.mean.mu.values().to_vec()
    }

    #[getter]
    fn s_mu(&self) -> Vec<f64> {
        self.inner.mean.mu.uncertainties().to_vec()
    }

    #[getter]
    fn kernel_name(&self) -> String {
        self.inner.kernel.name.to_string()
    }

    #[getter]
    fn mean_name(&self) -> String {
        self.inner.mean.name.to_string()
    }

    #[getter]
    fn crit_name(&self) -> String {
        self.inner.crit_name.to_string()
    }

    #[getter]
    fn log_filename(&self) -> String {
        self.inner.log_filename.to_string()
    }

    #[getter]
    fn surr_name(&self) -> &'static str {
        self.inner.surr_name.as_str()
    }

    #[getter]
    fn l_type(&self) -> &'static str {
        self.inner.l_type.as_str()
    }

    /// Fields that were not present in the configuration.
    #[getter]
    fn missing_fields(&self) -> Vec<String> {
        self.missing.clone()
    }

    fn to_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner).map_err(|err| PyValueError::new_err(err.to_string()))
    }

    fn __repr__(&self) -> String {
        format!(
            "Parameters(n_iterations={}, kernel='{}', crit='{}', surrogate='{}', learning='{}')",
            self.inner.n_iterations,
            self.inner.kernel.name,
            self.inner.crit_name,
            self.inner.surr_name,
            self.inner.l_type
        )
    }
}

/// One optimization run's evaluation bridge around a Python objective.
///
/// `func(x)` receives the point as a list of floats (plus `extra`, when
/// given, as the very same object) and returns the objective value, or
/// `(value, gradient)`. With `verbose=True` each evaluation is logged to
/// stderr; a default `info` subscriber is installed unless one already is.
#[pyclass(name = "EvaluationSession")]
struct PyEvaluationSession {
    state: EvaluationState<PyObjective>,
}

#[pymethods]
impl PyEvaluationSession {
    #[new]
    #[pyo3(signature = (func, n_dim, verbose=false, extra=None, point_slot=0))]
    fn new(
        func: &Bound<'_, PyAny>,
        n_dim: usize,
        verbose: bool,
        extra: Option<&Bound<'_, PyAny>>,
        point_slot: usize,
    ) -> PyResult<Self> {
        let mut objective = PyObjective::new(func)?;
        let mut placeholder = None;
        if let Some(extra) = extra {
            objective = objective.with_extra(extra, point_slot);
            placeholder = Some(PyObjective::extra_placeholder(extra));
        }

        let mut state = EvaluationState::new(objective, n_dim).verbose(verbose);
        if let Some(placeholder) = placeholder {
            state = state
                .with_extra_argument(placeholder, point_slot)
                .map_err(to_py_err)?;
        }
        if verbose {
            // An already installed subscriber wins.
            let _ = install_subscriber("info");
        }
        Ok(Self { state })
    }

    /// Evaluate at `point`; returns `value` or `(value, gradient)`.
    #[pyo3(signature = (point, want_gradient=false))]
    fn evaluate(
        &mut self,
        py: Python<'_>,
        point: Vec<f64>,
        want_gradient: bool,
    ) -> PyResult<Py<PyAny>> {
        if !want_gradient {
            let value = evaluate_point(&mut self.state, &point, None).map_err(to_py_err)?;
            return Ok(PyFloat::new(py, value).into_any().unbind());
        }

        let mut gradient = vec![0.0; point.len()];
        let value =
            evaluate_point(&mut self.state, &point, Some(&mut gradient)).map_err(to_py_err)?;
        let pair = PyTuple::new(
            py,
            [
                PyFloat::new(py, value).into_any(),
                PyList::new(py, &gradient)?.into_any(),
            ],
        )?;
        Ok(pair.into_any().unbind())
    }

    #[getter]
    fn evaluations(&self) -> usize {
        self.state.evaluations()
    }

    #[getter]
    fn dimension(&self) -> usize {
        self.state.dimension()
    }

    fn __repr__(&self) -> String {
        format!(
            "EvaluationSession(function='{}', n_dim={}, evaluations={})",
            bo_bridge::HostFunction::name(self.state.function()),
            self.state.dimension(),
            self.state.evaluations()
        )
    }
}
