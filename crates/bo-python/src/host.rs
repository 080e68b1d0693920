//! Python as the host runtime: objects in, host values out, and back.

use bo_types::{
    BoptError, BoptResult, EvaluationError, HostObject, HostStruct, HostValue, NumericArray,
};
use bo_bridge::HostFunction;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyComplex, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};

/// Wrap a Python exception raised inside the host.
pub(crate) fn host_error(err: PyErr) -> BoptError {
    BoptError::Internal(err.to_string())
}

/// Validation failures become `ValueError`, everything else `RuntimeError`.
pub(crate) fn to_py_err(err: BoptError) -> PyErr {
    match err {
        BoptError::Param(_)
        | BoptError::Validation(_)
        | BoptError::Config(_)
        | BoptError::Evaluation(EvaluationError::InvalidSlot { .. }) => {
            PyValueError::new_err(err.to_string())
        }
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Convert a Python object into the host value model.
///
/// Numbers become 1x1 arrays, lists and tuples become vectors or matrices,
/// anything exposing `tolist()` (numpy arrays and scalars) goes through it.
pub(crate) fn host_value(obj: &Bound<'_, PyAny>) -> PyResult<HostValue> {
    if obj.is_none() {
        return Ok(HostValue::Numeric(NumericArray::empty()));
    }
    if let Ok(flag) = obj.downcast::<PyBool>() {
        return Ok(HostValue::Logical(vec![flag.is_true()]));
    }
    if let Ok(c) = obj.downcast::<PyComplex>() {
        let array = NumericArray::complex(vec![c.real()], vec![c.imag()])
            .ok_or_else(|| PyValueError::new_err("malformed complex value"))?;
        return Ok(HostValue::Numeric(array));
    }
    if obj.is_instance_of::<PyFloat>() || obj.is_instance_of::<PyInt>() {
        return Ok(HostValue::from(obj.extract::<f64>()?));
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(HostValue::Text(obj.extract::<String>()?));
    }
    if obj.is_instance_of::<PyList>() || obj.is_instance_of::<PyTuple>() {
        let items = obj
            .try_iter()?
            .map(|item| item.and_then(|item| host_value(&item)))
            .collect::<PyResult<Vec<_>>>()?;
        return Ok(HostValue::from_elements(items));
    }
    if let Ok(dict) = obj.downcast::<PyDict>() {
        let mut fields = HostStruct::new();
        for (key, value) in dict.iter() {
            fields.insert(key.str()?.to_string(), host_value(&value)?);
        }
        return Ok(HostValue::Struct(fields));
    }
    if obj.hasattr("tolist")? {
        return host_value(&obj.call_method0("tolist")?);
    }
    Ok(HostValue::Other(obj.get_type().name()?.to_string()))
}

/// Convert a host value back into a Python object.
pub(crate) fn to_python<'py>(py: Python<'py>, value: &HostValue) -> PyResult<Bound<'py, PyAny>> {
    Ok(match value {
        HostValue::Numeric(array) => match (array.imag(), array.len()) {
            (None, 1) => PyFloat::new(py, array.real()[0]).into_any(),
            (None, _) => PyList::new(py, array.real())?.into_any(),
            (Some(imag), _) => {
                let items = array
                    .real()
                    .iter()
                    .zip(imag)
                    .map(|(re, im)| PyComplex::from_doubles(py, *re, *im));
                PyList::new(py, items)?.into_any()
            }
        },
        HostValue::Text(text) => PyString::new(py, text).into_any(),
        HostValue::Logical(flags) => match flags.as_slice() {
            [flag] => PyBool::new(py, *flag).to_owned().into_any(),
            _ => PyList::new(py, flags)?.into_any(),
        },
        HostValue::Struct(fields) => {
            let dict = PyDict::new(py);
            for (name, item) in fields.iter() {
                dict.set_item(name, to_python(py, item)?)?;
            }
            dict.into_any()
        }
        HostValue::Other(_) => py.None().into_bound(py),
    })
}

/// Configuration object: a `dict`, or any object with matching attributes.
pub(crate) struct PyConfig<'py> {
    obj: Bound<'py, PyAny>,
}

impl<'py> PyConfig<'py> {
    pub(crate) fn new(obj: Bound<'py, PyAny>) -> Self {
        Self { obj }
    }

    fn lookup(&self, name: &str) -> PyResult<Option<Bound<'py, PyAny>>> {
        if let Ok(dict) = self.obj.downcast::<PyDict>() {
            return dict.get_item(name);
        }
        if self.obj.hasattr(name)? {
            return self.obj.getattr(name).map(Some);
        }
        Ok(None)
    }
}

impl HostObject for PyConfig<'_> {
    fn field(&self, name: &str) -> BoptResult<Option<HostValue>> {
        let value = self.lookup(name).map_err(host_error)?;
        value
            .map(|value| host_value(&value))
            .transpose()
            .map_err(host_error)
    }
}

/// Convert the point argument: always a flat `list` of floats, even in one
/// dimension.
pub(crate) fn point_to_python<'py>(
    py: Python<'py>,
    value: &HostValue,
) -> PyResult<Bound<'py, PyAny>> {
    match value.as_numeric() {
        Some(array) if !array.is_complex() => Ok(PyList::new(py, array.real())?.into_any()),
        _ => to_python(py, value),
    }
}

/// A Python callable used as the objective.
///
/// It returns either the objective value or a `(value, gradient)` tuple; a
/// tuple counts as several outputs. An extra argument is kept as the caller's
/// own object and passed through untouched.
pub(crate) struct PyObjective {
    callable: Py<PyAny>,
    name: String,
    extra: Option<Py<PyAny>>,
    point_slot: usize,
}

impl PyObjective {
    pub(crate) fn new(callable: &Bound<'_, PyAny>) -> PyResult<Self> {
        if !callable.is_callable() {
            return Err(PyValueError::new_err("objective must be callable"));
        }
        let name = callable
            .getattr("__name__")
            .and_then(|name| name.extract::<String>())
            .unwrap_or_else(|_| "<callable>".to_string());
        Ok(Self {
            callable: callable.clone().unbind(),
            name,
            extra: None,
            point_slot: 0,
        })
    }

    /// Pass `extra` as the argument beside the point, which sits at `point_slot`.
    pub(crate) fn with_extra(mut self, extra: &Bound<'_, PyAny>, point_slot: usize) -> Self {
        self.extra = Some(extra.clone().unbind());
        self.point_slot = point_slot;
        self
    }

    /// Placeholder the bridge carries in the extra argument slot.
    pub(crate) fn extra_placeholder(extra: &Bound<'_, PyAny>) -> HostValue {
        let type_name = extra
            .get_type()
            .name()
            .map(|name| name.to_string())
            .unwrap_or_else(|_| "object".to_string());
        HostValue::Other(type_name)
    }
}

impl HostFunction for PyObjective {
    type Output = HostValue;

    fn name(&self) -> &str {
        &self.name
    }

    fn call(&mut self, args: &[HostValue], n_outputs: usize) -> BoptResult<Vec<HostValue>> {
        Python::with_gil(|py| {
            let py_args = args
                .iter()
                .enumerate()
                .map(|(slot, arg)| match &self.extra {
                    _ if slot == self.point_slot => point_to_python(py, arg),
                    Some(extra) => Ok(extra.clone_ref(py).into_bound(py)),
                    None => to_python(py, arg),
                })
                .collect::<PyResult<Vec<_>>>()?;
            let result = self.callable.bind(py).call1(PyTuple::new(py, py_args)?)?;

            match result.downcast::<PyTuple>() {
                Ok(outputs) => outputs
                    .iter()
                    .take(n_outputs)
                    .map(|item| host_value(&item))
                    .collect::<PyResult<Vec<_>>>(),
                Err(_) => Ok(vec![host_value(&result)?]),
            }
        })
        .map_err(host_error)
    }
}
