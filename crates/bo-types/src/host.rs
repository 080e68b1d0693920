//! Host value model.
//!
//! A host runtime hands us dynamically typed values: numeric arrays (real or
//! complex, always two-dimensional), strings, logicals and structs. The bridge
//! only ever inspects values through this model, so every concrete host
//! (JSON documents, Python objects, test doubles) converts into it at the
//! boundary.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::BoptResult;

/// Two-dimensional numeric array with an optional imaginary part.
///
/// Data is stored column-major, the way array runtimes lay it out.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    rows: usize,
    cols: usize,
    real: Vec<f64>,
    imag: Option<Vec<f64>>,
}

impl NumericArray {
    pub fn scalar(value: f64) -> Self {
        Self {
            rows: 1,
            cols: 1,
            real: vec![value],
            imag: None,
        }
    }

    pub fn row(values: Vec<f64>) -> Self {
        Self {
            rows: 1,
            cols: values.len(),
            real: values,
            imag: None,
        }
    }

    pub fn column(values: Vec<f64>) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            real: values,
            imag: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            rows: 0,
            cols: 0,
            real: Vec::new(),
            imag: None,
        }
    }

    /// Build a real matrix; returns `None` when `data` does not hold `rows * cols` values.
    pub fn matrix(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        (rows.checked_mul(cols)? == data.len()).then_some(Self {
            rows,
            cols,
            real: data,
            imag: None,
        })
    }

    /// Build a complex row vector from matching real and imaginary parts.
    pub fn complex(real: Vec<f64>, imag: Vec<f64>) -> Option<Self> {
        (real.len() == imag.len()).then_some(Self {
            rows: 1,
            cols: real.len(),
            real,
            imag: Some(imag),
        })
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complex(&self) -> bool {
        self.imag.is_some()
    }

    /// One row or one column.
    pub fn is_vector(&self) -> bool {
        self.rows == 1 || self.cols == 1
    }

    pub fn real(&self) -> &[f64] {
        &self.real
    }

    /// Mutable view of the real part. Shape is fixed, so writes never reallocate.
    pub fn real_mut(&mut self) -> &mut [f64] {
        &mut self.real
    }

    pub fn imag(&self) -> Option<&[f64]> {
        self.imag.as_deref()
    }

    /// The single real value, if this is a real 1x1 array.
    pub fn as_real_scalar(&self) -> Option<f64> {
        match (self.is_complex(), self.len()) {
            (false, 1) => Some(self.real[0]),
            _ => None,
        }
    }
}

/// Named fields of a host struct.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostStruct {
    fields: BTreeMap<String, HostValue>,
}

impl HostStruct {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<HostValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A dynamically typed host value.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Numeric(NumericArray),
    Text(String),
    /// Logical arrays are not numeric.
    Logical(Vec<bool>),
    Struct(HostStruct),
    /// Anything the bridge has no model for, described by its host type name.
    Other(String),
}

impl HostValue {
    pub fn as_numeric(&self) -> Option<&NumericArray> {
        match self {
            Self::Numeric(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Assemble the elements of a host sequence into one array value.
    ///
    /// Scalars form a row vector (complex if any element is complex); equal
    /// length real rows form a matrix. Anything else is `Other("array")`.
    pub fn from_elements(items: Vec<HostValue>) -> HostValue {
        if items.is_empty() {
            return HostValue::Numeric(NumericArray::empty());
        }

        let scalars = items
            .iter()
            .map(|item| match item.as_numeric() {
                Some(array) if array.len() == 1 => {
                    Some((array.real[0], array.imag().map_or(0.0, |im| im[0])))
                }
                _ => None,
            })
            .collect::<Option<Vec<_>>>();
        if let Some(parts) = scalars {
            let any_complex = items
                .iter()
                .any(|item| item.as_numeric().is_some_and(NumericArray::is_complex));
            let (re, im): (Vec<f64>, Vec<f64>) = parts.into_iter().unzip();
            if !any_complex {
                return HostValue::Numeric(NumericArray::row(re));
            }
            if let Some(array) = NumericArray::complex(re, im) {
                return HostValue::Numeric(array);
            }
        }

        let rows = items
            .iter()
            .map(|item| match item.as_numeric() {
                Some(array) if array.dims().0 == 1 && !array.is_complex() => Some(array.real()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>();
        if let Some(rows) = rows {
            let cols = rows[0].len();
            if cols > 0 && rows.iter().all(|row| row.len() == cols) {
                let mut data = Vec::with_capacity(rows.len() * cols);
                for col in 0..cols {
                    data.extend(rows.iter().map(|row| row[col]));
                }
                if let Some(array) = NumericArray::matrix(rows.len(), cols, data) {
                    return HostValue::Numeric(array);
                }
            }
        }

        HostValue::Other("array".to_string())
    }

    /// Short description used in validation messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Numeric(array) => {
                let (rows, cols) = array.dims();
                let kind = if array.is_complex() { "complex" } else { "real" };
                if array.len() == 1 {
                    format!("{kind} scalar")
                } else {
                    format!("{kind} {rows}x{cols} array")
                }
            }
            Self::Text(_) => "string".to_string(),
            Self::Logical(_) => "logical".to_string(),
            Self::Struct(_) => "struct".to_string(),
            Self::Other(type_name) => type_name.clone(),
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl AsRef<HostValue> for HostValue {
    fn as_ref(&self) -> &HostValue {
        self
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Numeric(NumericArray::scalar(value))
    }
}

impl From<Vec<f64>> for HostValue {
    fn from(values: Vec<f64>) -> Self {
        Self::Numeric(NumericArray::row(values))
    }
}

impl From<NumericArray> for HostValue {
    fn from(array: NumericArray) -> Self {
        Self::Numeric(array)
    }
}

impl From<&str> for HostValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for HostValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<bool> for HostValue {
    fn from(flag: bool) -> Self {
        Self::Logical(vec![flag])
    }
}

impl From<HostStruct> for HostValue {
    fn from(value: HostStruct) -> Self {
        Self::Struct(value)
    }
}

/// A host structured object whose fields can be looked up by name.
///
/// `Ok(None)` means the field is not present; conversion problems specific
/// to a host are reported as errors.
pub trait HostObject {
    fn field(&self, name: &str) -> BoptResult<Option<HostValue>>;
}

impl HostObject for HostStruct {
    fn field(&self, name: &str) -> BoptResult<Option<HostValue>> {
        Ok(self.get(name).cloned())
    }
}

impl HostObject for Map<String, Value> {
    fn field(&self, name: &str) -> BoptResult<Option<HostValue>> {
        Ok(self.get(name).map(HostValue::from))
    }
}

// ---------------------------------------------------------------------------
// JSON host
// ---------------------------------------------------------------------------

/// `{"re": x, "im": y}` encodes a complex number.
fn json_complex(map: &Map<String, Value>) -> Option<(f64, f64)> {
    if map.len() != 2 {
        return None;
    }
    Some((map.get("re")?.as_f64()?, map.get("im")?.as_f64()?))
}

fn json_array(items: &[Value]) -> HostValue {
    HostValue::from_elements(items.iter().map(HostValue::from).collect())
}

impl From<&Value> for HostValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => HostValue::Numeric(NumericArray::empty()),
            Value::Bool(flag) => HostValue::Logical(vec![*flag]),
            Value::Number(number) => match number.as_f64() {
                Some(v) => HostValue::Numeric(NumericArray::scalar(v)),
                None => HostValue::Other("number".to_string()),
            },
            Value::String(text) => HostValue::Text(text.clone()),
            Value::Array(items) => json_array(items),
            Value::Object(map) => match json_complex(map) {
                Some((re, im)) => HostValue::Numeric(NumericArray {
                    rows: 1,
                    cols: 1,
                    real: vec![re],
                    imag: Some(vec![im]),
                }),
                None => {
                    let mut fields = HostStruct::new();
                    for (name, item) in map {
                        fields.insert(name.clone(), HostValue::from(item));
                    }
                    HostValue::Struct(fields)
                }
            },
        }
    }
}
