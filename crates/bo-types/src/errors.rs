use thiserror::Error;

/// Main error type for the BayesOpt host bridge
#[derive(Error, Debug)]
pub enum BoptError {
    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while marshaling a host configuration object into `BoptParams`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("param field '{field}' must be a real scalar, got {found}")]
    NotRealScalar { field: String, found: String },

    #[error("param field '{field}' must be a non-negative integer count, got {value}")]
    NotCount { field: String, value: f64 },

    #[error("param field '{field}' must be a real vector, got {found}")]
    NotRealVector { field: String, found: String },

    #[error("param field '{field}' holds {len} values, capacity is {capacity}")]
    CapacityExceeded {
        field: String,
        len: usize,
        capacity: usize,
    },

    #[error("Error processing {group} parameters: {values} values but {uncertainties} uncertainties")]
    LengthMismatch {
        group: String,
        values: usize,
        uncertainties: usize,
    },

    #[error("param field '{field}' must be a string, got {found}")]
    NotText { field: String, found: String },

    #[error("param field '{field}' is {len} bytes long, capacity is {capacity}")]
    TextTooLong {
        field: String,
        len: usize,
        capacity: usize,
    },

    #[error("unknown {kind} name '{value}' (expected one of: {expected})")]
    UnknownName {
        kind: String,
        value: String,
        expected: String,
    },
}

/// Errors raised by the evaluation bridge while calling back into the host
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("error calling user function '{function}': {message}")]
    CallFailed { function: String, message: String },

    #[error("user function '{function}' returned {returned} outputs, {requested} requested")]
    MissingOutput {
        function: String,
        requested: usize,
        returned: usize,
    },

    #[error("user function '{function}' must return real scalar, got {found}")]
    NotRealScalar { function: String, found: String },

    #[error("gradient vector from user function '{function}' is the wrong size: expected {expected}, got {found}")]
    GradientWrongSize {
        function: String,
        expected: usize,
        found: String,
    },

    #[error("point has dimension {actual}, evaluator expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("argument slot {slot} is out of range for {arguments} arguments")]
    InvalidSlot { slot: usize, arguments: usize },
}

/// Result type alias for bridge operations
pub type BoptResult<T> = Result<T, BoptError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::BoptError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::BoptError::Config(format!($($arg)*))
    };
}
