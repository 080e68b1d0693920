//! Optimizer parameter record and the bounded containers it is built from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ParamError;

/// Capacity of each kernel / mean prior vector.
pub const MAX_PRIOR_PARAMS: usize = 128;

/// Capacity in bytes of every name and path in the record.
pub const MAX_NAME_LEN: usize = 99;

pub const DEFAULT_ITERATIONS: usize = 300;
pub const DEFAULT_INNER_EVALUATIONS: usize = 500;
pub const DEFAULT_INIT_SAMPLES: usize = 30;
pub const DEFAULT_VERBOSE: usize = 1;
pub const DEFAULT_NOISE: f64 = 1e-4;
pub const PRIOR_ALPHA: f64 = 1.0;
pub const PRIOR_BETA: f64 = 1.0;
pub const KERNEL_THETA: f64 = 1.0;
pub const KERNEL_SIGMA: f64 = 10.0;
pub const MEAN_MU: f64 = 1.0;
pub const MEAN_SIGMA: f64 = 1000.0;

/// A string that never exceeds `CAP` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoundedString<const CAP: usize>(String);

impl<const CAP: usize> BoundedString<CAP> {
    /// `field` only names the value in the error.
    pub fn new(field: &str, text: impl Into<String>) -> Result<Self, ParamError> {
        let text = text.into();
        if text.len() > CAP {
            return Err(ParamError::TextTooLong {
                field: field.to_string(),
                len: text.len(),
                capacity: CAP,
            });
        }
        Ok(Self(text))
    }

    /// Built-in defaults, all far below any capacity in use.
    fn fixed(text: &'static str) -> Self {
        debug_assert!(text.len() <= CAP);
        Self(text.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub const fn capacity() -> usize {
        CAP
    }
}

impl<const CAP: usize> TryFrom<String> for BoundedString<CAP> {
    type Error = ParamError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::new("string", text)
    }
}

impl<const CAP: usize> From<BoundedString<CAP>> for String {
    fn from(value: BoundedString<CAP>) -> Self {
        value.0
    }
}

impl<const CAP: usize> fmt::Display for BoundedString<CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type Name = BoundedString<MAX_NAME_LEN>;

/// Check a host-supplied vector against the prior capacity.
pub fn bounded_prior(field: &str, values: &[f64]) -> Result<Vec<f64>, ParamError> {
    if values.len() > MAX_PRIOR_PARAMS {
        return Err(ParamError::CapacityExceeded {
            field: field.to_string(),
            len: values.len(),
            capacity: MAX_PRIOR_PARAMS,
        });
    }
    Ok(values.to_vec())
}

/// Prior values and their uncertainties; both always hold the same count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PriorParts", into = "PriorParts")]
pub struct PriorVector {
    values: Vec<f64>,
    uncertainties: Vec<f64>,
}

/// Unchecked serialized form of a [`PriorVector`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorParts {
    pub values: Vec<f64>,
    pub uncertainties: Vec<f64>,
}

impl PriorVector {
    /// Pair independently loaded value and uncertainty vectors for `group`.
    pub fn from_parts(
        group: &str,
        values: Vec<f64>,
        uncertainties: Vec<f64>,
    ) -> Result<Self, ParamError> {
        let values = bounded_prior(group, &values)?;
        let uncertainties = bounded_prior(group, &uncertainties)?;
        if values.len() != uncertainties.len() {
            return Err(ParamError::LengthMismatch {
                group: group.to_string(),
                values: values.len(),
                uncertainties: uncertainties.len(),
            });
        }
        Ok(Self {
            values,
            uncertainties,
        })
    }

    pub fn single(value: f64, uncertainty: f64) -> Self {
        Self {
            values: vec![value],
            uncertainties: vec![uncertainty],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn uncertainties(&self) -> &[f64] {
        &self.uncertainties
    }
}

impl TryFrom<PriorParts> for PriorVector {
    type Error = ParamError;

    fn try_from(parts: PriorParts) -> Result<Self, Self::Error> {
        Self::from_parts("prior", parts.values, parts.uncertainties)
    }
}

impl From<PriorVector> for PriorParts {
    fn from(prior: PriorVector) -> Self {
        Self {
            values: prior.values,
            uncertainties: prior.uncertainties,
        }
    }
}

/// Kernel name plus hyperparameter prior (`theta`, `s_theta`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelParameters {
    pub name: Name,
    pub theta: PriorVector,
}

impl Default for KernelParameters {
    fn default() -> Self {
        Self {
            name: Name::fixed("kMaternISO3"),
            theta: PriorVector::single(KERNEL_THETA, KERNEL_SIGMA),
        }
    }
}

impl KernelParameters {
    pub fn n_theta(&self) -> usize {
        self.theta.len()
    }
}

/// Mean function name plus parameter prior (`mu`, `s_mu`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanParameters {
    pub name: Name,
    pub mu: PriorVector,
}

impl Default for MeanParameters {
    fn default() -> Self {
        Self {
            name: Name::fixed("mOne"),
            mu: PriorVector::single(MEAN_MU, MEAN_SIGMA),
        }
    }
}

impl MeanParameters {
    pub fn n_mu(&self) -> usize {
        self.mu.len()
    }
}

// ---------------------------------------------------------------------------
// Named enums
// ---------------------------------------------------------------------------

/// Surrogate model used by the optimizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurrogateKind {
    #[default]
    #[serde(rename = "sGaussianProcess")]
    GaussianProcess,
    #[serde(rename = "sGaussianProcessML")]
    GaussianProcessMl,
    #[serde(rename = "sGaussianProcessNormal")]
    GaussianProcessNormal,
    #[serde(rename = "sStudentTProcessJef")]
    StudentTProcessJeffreys,
    #[serde(rename = "sStudentTProcessNIG")]
    StudentTProcessNig,
}

impl SurrogateKind {
    pub const ALL: [SurrogateKind; 5] = [
        Self::GaussianProcess,
        Self::GaussianProcessMl,
        Self::GaussianProcessNormal,
        Self::StudentTProcessJeffreys,
        Self::StudentTProcessNig,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GaussianProcess => "sGaussianProcess",
            Self::GaussianProcessMl => "sGaussianProcessML",
            Self::GaussianProcessNormal => "sGaussianProcessNormal",
            Self::StudentTProcessJeffreys => "sStudentTProcessJef",
            Self::StudentTProcessNig => "sStudentTProcessNIG",
        }
    }
}

/// How kernel hyperparameters are learned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LearningKind {
    #[serde(rename = "L_ML")]
    MaximumLikelihood,
    #[default]
    #[serde(rename = "L_MAP")]
    MaximumAPosteriori,
    #[serde(rename = "L_LOO")]
    LeaveOneOut,
    #[serde(rename = "L_EMPIRICAL")]
    Empirical,
}

impl LearningKind {
    pub const ALL: [LearningKind; 4] = [
        Self::MaximumLikelihood,
        Self::MaximumAPosteriori,
        Self::LeaveOneOut,
        Self::Empirical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaximumLikelihood => "L_ML",
            Self::MaximumAPosteriori => "L_MAP",
            Self::LeaveOneOut => "L_LOO",
            Self::Empirical => "L_EMPIRICAL",
        }
    }
}

fn parse_named<T: Copy>(
    kind: &str,
    all: &[T],
    name_of: fn(&T) -> &'static str,
    text: &str,
) -> Result<T, ParamError> {
    all.iter()
        .copied()
        .find(|variant| name_of(variant) == text)
        .ok_or_else(|| ParamError::UnknownName {
            kind: kind.to_string(),
            value: text.to_string(),
            expected: all.iter().map(name_of).collect::<Vec<_>>().join(", "),
        })
}

impl FromStr for SurrogateKind {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named("surrogate", &Self::ALL, Self::as_str, s)
    }
}

impl FromStr for LearningKind {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named("learning type", &Self::ALL, Self::as_str, s)
    }
}

impl fmt::Display for SurrogateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LearningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parameter record
// ---------------------------------------------------------------------------

/// Full parameter set handed to the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoptParams {
    /// Number of optimizer iterations (function evaluations after the initial design).
    pub n_iterations: usize,
    /// Maximum evaluations of the inner acquisition optimizer.
    pub n_inner_iterations: usize,
    /// Size of the initial design.
    pub n_init_samples: usize,
    pub verbose_level: usize,

    /// Inverse-gamma prior shape.
    pub alpha: f64,
    /// Inverse-gamma prior scale.
    pub beta: f64,
    /// Observation noise.
    pub noise: f64,

    pub kernel: KernelParameters,
    pub mean: MeanParameters,

    pub log_filename: Name,
    /// Acquisition criterion name.
    pub crit_name: Name,
    pub surr_name: SurrogateKind,
    pub l_type: LearningKind,
}

impl Default for BoptParams {
    fn default() -> Self {
        Self {
            n_iterations: DEFAULT_ITERATIONS,
            n_inner_iterations: DEFAULT_INNER_EVALUATIONS,
            n_init_samples: DEFAULT_INIT_SAMPLES,
            verbose_level: DEFAULT_VERBOSE,
            alpha: PRIOR_ALPHA,
            beta: PRIOR_BETA,
            noise: DEFAULT_NOISE,
            kernel: KernelParameters::default(),
            mean: MeanParameters::default(),
            log_filename: Name::fixed("bayesopt.log"),
            crit_name: Name::fixed("cEI"),
            surr_name: SurrogateKind::default(),
            l_type: LearningKind::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_are_consistent() {
        let params = BoptParams::default();
        assert_eq!(params.n_iterations, 300);
        assert_eq!(params.kernel.n_theta(), 1);
        assert_eq!(params.kernel.theta.uncertainties(), &[KERNEL_SIGMA]);
        assert_eq!(params.mean.n_mu(), 1);
        assert_eq!(params.crit_name.as_str(), "cEI");
        assert_eq!(params.surr_name, SurrogateKind::GaussianProcess);
        assert_eq!(params.l_type, LearningKind::MaximumAPosteriori);
    }

    #[test]
    fn bounded_string_rejects_overflow() {
        let fits = "k".repeat(MAX_NAME_LEN);
        assert!(Name::new("kernel_name", fits).is_ok());

        let err = Name::new("kernel_name", "k".repeat(MAX_NAME_LEN + 1)).unwrap_err();
        assert_eq!(
            err,
            ParamError::TextTooLong {
                field: "kernel_name".to_string(),
                len: MAX_NAME_LEN + 1,
                capacity: MAX_NAME_LEN,
            }
        );
    }

    #[test]
    fn prior_vector_requires_matching_lengths() {
        let prior = PriorVector::from_parts("kernel", vec![1.0, 2.0], vec![0.1, 0.1]).unwrap();
        assert_eq!(prior.len(), 2);

        let err = PriorVector::from_parts("mean", vec![1.0], vec![0.1, 0.2]).unwrap_err();
        assert!(matches!(err, ParamError::LengthMismatch { ref group, .. } if group == "mean"));
    }

    #[test]
    fn prior_vector_capacity() {
        let too_many = vec![0.0; MAX_PRIOR_PARAMS + 1];
        let err = PriorVector::from_parts("kernel", too_many.clone(), too_many).unwrap_err();
        assert!(matches!(err, ParamError::CapacityExceeded { len, .. } if len == MAX_PRIOR_PARAMS + 1));
    }

    #[test]
    fn unknown_names_list_the_alternatives() {
        let err = "sGaussian".parse::<SurrogateKind>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("sGaussian"));
        assert!(message.contains("sStudentTProcessNIG"));

        assert!("l_map".parse::<LearningKind>().is_err());
    }

    #[test]
    fn serde_uses_canonical_names() {
        let params = BoptParams::default();
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["surr_name"], "sGaussianProcess");
        assert_eq!(json["l_type"], "L_MAP");
        assert_eq!(json["kernel"]["theta"]["values"], serde_json::json!([1.0]));

        let back: BoptParams = serde_json::from_value(json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn serde_rejects_mismatched_prior() {
        let mut json = serde_json::to_value(BoptParams::default()).unwrap();
        json["mean"]["mu"]["uncertainties"] = serde_json::json!([1.0, 2.0]);
        assert!(serde_json::from_value::<BoptParams>(json).is_err());
    }

    proptest! {
        #[test]
        fn surrogate_names_round_trip(idx in 0usize..SurrogateKind::ALL.len()) {
            let kind = SurrogateKind::ALL[idx];
            prop_assert_eq!(kind.to_string().parse::<SurrogateKind>().unwrap(), kind);
        }

        #[test]
        fn learning_names_round_trip(idx in 0usize..LearningKind::ALL.len()) {
            let kind = LearningKind::ALL[idx];
            prop_assert_eq!(kind.as_str().parse::<LearningKind>().unwrap(), kind);
        }
    }
}
