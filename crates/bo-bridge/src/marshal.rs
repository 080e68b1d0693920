//! Parameter marshaling: host configuration object -> `BoptParams`.
//!
//! Every supported host field is described once in [`FIELD_TABLE`]; the
//! loader walks that table, overwrites a slot only when its field is present,
//! and stops at the first validation failure so no partially filled record
//! ever escapes.

use bo_types::{
    bounded_prior, BoptParams, BoptResult, HostObject, HostValue, Name, ParamError, PriorVector,
};
use num_traits::ToPrimitive;
use tracing::{debug, info};

type Slot<T> = fn(&mut BoptParams) -> &mut T;

/// What a host field holds and where it lands in the record.
enum FieldTarget {
    /// Non-negative integral scalar.
    Count(Slot<usize>),
    /// Real scalar.
    Real(Slot<f64>),
    /// Bounded string.
    Text(Slot<Name>),
    /// Value vector paired with an uncertainty vector from a second host field.
    Prior {
        group: &'static str,
        uncertainty_field: &'static str,
        slot: Slot<PriorVector>,
    },
    /// String resolved to an enum through its canonical name.
    Named {
        current: fn(&BoptParams) -> &'static str,
        apply: fn(&mut BoptParams, &str) -> Result<(), ParamError>,
    },
}

struct FieldSpec {
    name: &'static str,
    target: FieldTarget,
}

static FIELD_TABLE: &[FieldSpec] = &[
    FieldSpec {
        name: "n_iterations",
        target: FieldTarget::Count(|p| &mut p.n_iterations),
    },
    FieldSpec {
        name: "n_inner_iterations",
        target: FieldTarget::Count(|p| &mut p.n_inner_iterations),
    },
    FieldSpec {
        name: "n_init_iterations",
        target: FieldTarget::Count(|p| &mut p.n_init_samples),
    },
    FieldSpec {
        name: "verbose_level",
        target: FieldTarget::Count(|p| &mut p.verbose_level),
    },
    FieldSpec {
        name: "alpha",
        target: FieldTarget::Real(|p| &mut p.alpha),
    },
    FieldSpec {
        name: "beta",
        target: FieldTarget::Real(|p| &mut p.beta),
    },
    FieldSpec {
        name: "noise",
        target: FieldTarget::Real(|p| &mut p.noise),
    },
    FieldSpec {
        name: "theta",
        target: FieldTarget::Prior {
            group: "kernel",
            uncertainty_field: "s_theta",
            slot: |p| &mut p.kernel.theta,
        },
    },
    FieldSpec {
        name: "mu",
        target: FieldTarget::Prior {
            group: "mean",
            uncertainty_field: "s_mu",
            slot: |p| &mut p.mean.mu,
        },
    },
    FieldSpec {
        name: "log_filename",
        target: FieldTarget::Text(|p| &mut p.log_filename),
    },
    FieldSpec {
        name: "kernel_name",
        target: FieldTarget::Text(|p| &mut p.kernel.name),
    },
    FieldSpec {
        name: "mean_name",
        target: FieldTarget::Text(|p| &mut p.mean.name),
    },
    FieldSpec {
        name: "crit_name",
        target: FieldTarget::Text(|p| &mut p.crit_name),
    },
    FieldSpec {
        name: "surr_name",
        target: FieldTarget::Named {
            current: |p| p.surr_name.as_str(),
            apply: |p, name| {
                p.surr_name = name.parse()?;
                Ok(())
            },
        },
    },
    FieldSpec {
        name: "l_type",
        target: FieldTarget::Named {
            current: |p| p.l_type.as_str(),
            apply: |p, name| {
                p.l_type = name.parse()?;
                Ok(())
            },
        },
    },
];

/// Every host field name the marshaler understands, in table order.
pub fn field_names() -> Vec<&'static str> {
    let mut names = Vec::with_capacity(FIELD_TABLE.len() + 2);
    for spec in FIELD_TABLE {
        names.push(spec.name);
        if let FieldTarget::Prior {
            uncertainty_field, ..
        } = spec.target
        {
            names.push(uncertainty_field);
        }
    }
    names
}

/// Which host fields were applied and which kept their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarshalReport {
    pub applied: Vec<&'static str>,
    pub missing: Vec<&'static str>,
}

impl MarshalReport {
    pub fn was_applied(&self, field: &str) -> bool {
        self.applied.iter().any(|name| *name == field)
    }

    pub fn was_missing(&self, field: &str) -> bool {
        self.missing.iter().any(|name| *name == field)
    }
}

/// Marshal `host` over `defaults`.
pub fn load_parameters<H>(host: &H, defaults: BoptParams) -> BoptResult<BoptParams>
where
    H: HostObject + ?Sized,
{
    load_parameters_with_report(host, defaults).map(|(params, _)| params)
}

/// Marshal `host` over `defaults`, also reporting applied and missing fields.
pub fn load_parameters_with_report<H>(
    host: &H,
    defaults: BoptParams,
) -> BoptResult<(BoptParams, MarshalReport)>
where
    H: HostObject + ?Sized,
{
    let mut params = defaults;
    let mut report = MarshalReport::default();

    for spec in FIELD_TABLE {
        apply_field(host, spec, &mut params, &mut report)?;
    }

    debug!(
        "Loaded parameters: {} fields applied, {} defaults kept",
        report.applied.len(),
        report.missing.len()
    );
    Ok((params, report))
}

fn apply_field<H>(
    host: &H,
    spec: &FieldSpec,
    params: &mut BoptParams,
    report: &mut MarshalReport,
) -> BoptResult<()>
where
    H: HostObject + ?Sized,
{
    match &spec.target {
        FieldTarget::Count(slot) => {
            if let Some(value) = fetch(host, spec.name, report)? {
                *slot(params) = read_count(spec.name, &value)?;
            }
        }
        FieldTarget::Real(slot) => {
            if let Some(value) = fetch(host, spec.name, report)? {
                *slot(params) = read_real_scalar(spec.name, &value)?;
            }
        }
        FieldTarget::Text(slot) => {
            if let Some(value) = fetch(host, spec.name, report)? {
                *slot(params) = Name::new(spec.name, read_text(spec.name, &value)?)?;
            }
        }
        FieldTarget::Prior {
            group,
            uncertainty_field,
            slot,
        } => {
            let current = slot(params);
            let values = match fetch(host, spec.name, report)? {
                Some(value) => read_real_vector(spec.name, &value)?,
                None => current.values().to_vec(),
            };
            let uncertainties = match fetch(host, *uncertainty_field, report)? {
                Some(value) => read_real_vector(uncertainty_field, &value)?,
                None => current.uncertainties().to_vec(),
            };
            *current = PriorVector::from_parts(group, values, uncertainties)?;
        }
        FieldTarget::Named { current, apply } => {
            let mut name = current(params).to_string();
            if let Some(value) = fetch(host, spec.name, report)? {
                name = read_text(spec.name, &value)?.to_string();
            }
            apply(params, &name)?;
        }
    }
    Ok(())
}

fn fetch<H>(
    host: &H,
    name: &'static str,
    report: &mut MarshalReport,
) -> BoptResult<Option<HostValue>>
where
    H: HostObject + ?Sized,
{
    let value = host.field(name)?;
    if value.is_some() {
        report.applied.push(name);
    } else {
        info!("Field {} not found. Default not modified.", name);
        report.missing.push(name);
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Per-shape readers
// ---------------------------------------------------------------------------

fn read_real_scalar(field: &str, value: &HostValue) -> Result<f64, ParamError> {
    value
        .as_numeric()
        .and_then(|array| array.as_real_scalar())
        .ok_or_else(|| ParamError::NotRealScalar {
            field: field.to_string(),
            found: value.describe(),
        })
}

fn read_count(field: &str, value: &HostValue) -> Result<usize, ParamError> {
    let raw = read_real_scalar(field, value)?;
    if raw.fract() != 0.0 {
        return Err(ParamError::NotCount {
            field: field.to_string(),
            value: raw,
        });
    }
    raw.to_usize().ok_or_else(|| ParamError::NotCount {
        field: field.to_string(),
        value: raw,
    })
}

fn read_real_vector(field: &str, value: &HostValue) -> Result<Vec<f64>, ParamError> {
    match value.as_numeric() {
        Some(array) if !array.is_complex() => bounded_prior(field, array.real()),
        _ => Err(ParamError::NotRealVector {
            field: field.to_string(),
            found: value.describe(),
        }),
    }
}

fn read_text<'a>(field: &str, value: &'a HostValue) -> Result<&'a str, ParamError> {
    value.as_text().ok_or_else(|| ParamError::NotText {
        field: field.to_string(),
        found: value.describe(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bo_types::{
        BoptError, HostStruct, LearningKind, NumericArray, SurrogateKind, MAX_PRIOR_PARAMS,
    };

    fn load(config: &HostStruct) -> BoptResult<BoptParams> {
        load_parameters(config, BoptParams::default())
    }

    fn param_err(result: BoptResult<BoptParams>) -> ParamError {
        match result {
            Err(BoptError::Param(err)) => err,
            other => panic!("expected parameter error, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_keeps_every_default() {
        let (params, report) =
            load_parameters_with_report(&HostStruct::new(), BoptParams::default()).unwrap();
        assert_eq!(params, BoptParams::default());
        assert!(report.applied.is_empty());
        assert_eq!(report.missing, field_names());
    }

    #[test]
    fn scalar_fields_take_exact_values() {
        let config = HostStruct::new()
            .with("alpha", 0.1)
            .with("beta", 2.5)
            .with("noise", 1e-6)
            .with("n_init_iterations", 12.0);
        let params = load(&config).unwrap();
        assert_eq!(params.alpha, 0.1);
        assert_eq!(params.beta, 2.5);
        assert_eq!(params.noise, 1e-6);
        assert_eq!(params.n_init_samples, 12);
    }

    #[test]
    fn scalar_fields_reject_arrays_and_complex() {
        let config = HostStruct::new().with("alpha", vec![1.0, 2.0]);
        let err = param_err(load(&config));
        assert!(matches!(err, ParamError::NotRealScalar { ref field, .. } if field == "alpha"));

        let complex = NumericArray::complex(vec![1.0], vec![1.0]).unwrap();
        let config = HostStruct::new().with("noise", complex);
        assert!(matches!(
            param_err(load(&config)),
            ParamError::NotRealScalar { .. }
        ));

        let config = HostStruct::new().with("beta", "large");
        assert!(matches!(
            param_err(load(&config)),
            ParamError::NotRealScalar { .. }
        ));
    }

    #[test]
    fn counts_must_be_non_negative_integers() {
        for bad in [-1.0, 2.5, f64::NAN, f64::INFINITY] {
            let config = HostStruct::new().with("n_iterations", bad);
            assert!(
                matches!(param_err(load(&config)), ParamError::NotCount { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn logical_is_not_numeric() {
        let config = HostStruct::new().with("verbose_level", true);
        assert!(matches!(
            param_err(load(&config)),
            ParamError::NotRealScalar { .. }
        ));
    }

    #[test]
    fn paired_priors_load_together() {
        let config = HostStruct::new()
            .with("mu", vec![0.0, 1.0, 2.0])
            .with("s_mu", vec![5.0, 5.0, 5.0]);
        let params = load(&config).unwrap();
        assert_eq!(params.mean.n_mu(), 3);
        assert_eq!(params.mean.mu.values(), &[0.0, 1.0, 2.0]);
        assert_eq!(params.mean.mu.uncertainties(), &[5.0, 5.0, 5.0]);
        assert_eq!(params.kernel, BoptParams::default().kernel);
    }

    #[test]
    fn prior_length_mismatch_names_the_group() {
        let config = HostStruct::new()
            .with("theta", vec![1.0, 2.0])
            .with("s_theta", vec![0.1]);
        let err = param_err(load(&config));
        assert_eq!(
            err,
            ParamError::LengthMismatch {
                group: "kernel".to_string(),
                values: 2,
                uncertainties: 1,
            }
        );
        assert!(err.to_string().contains("kernel parameters"));
    }

    #[test]
    fn prior_compared_against_default_counterpart() {
        // Default s_theta holds one value.
        let config = HostStruct::new().with("theta", vec![1.0, 2.0]);
        let err = param_err(load(&config));
        assert!(matches!(err, ParamError::LengthMismatch { ref group, .. } if group == "kernel"));

        let config = HostStruct::new().with("theta", vec![4.0]);
        let params = load(&config).unwrap();
        assert_eq!(params.kernel.theta.values(), &[4.0]);
        assert_eq!(params.kernel.theta.uncertainties(), &[10.0]);
    }

    #[test]
    fn prior_rejects_complex_and_oversized() {
        let complex = NumericArray::complex(vec![1.0, 2.0], vec![0.0, 1.0]).unwrap();
        let config = HostStruct::new().with("theta", complex);
        assert!(matches!(
            param_err(load(&config)),
            ParamError::NotRealVector { .. }
        ));

        let config = HostStruct::new().with("s_mu", vec![1.0; MAX_PRIOR_PARAMS + 1]);
        assert!(matches!(
            param_err(load(&config)),
            ParamError::CapacityExceeded { ref field, .. } if field == "s_mu"
        ));
    }

    #[test]
    fn string_overrides_propagate() {
        let config = HostStruct::new()
            .with("log_filename", "run.log")
            .with("kernel_name", "kSEARD")
            .with("mean_name", "mLinear")
            .with("crit_name", "cLCB");
        let params = load(&config).unwrap();
        assert_eq!(params.log_filename.as_str(), "run.log");
        assert_eq!(params.kernel.name.as_str(), "kSEARD");
        assert_eq!(params.mean.name.as_str(), "mLinear");
        assert_eq!(params.crit_name.as_str(), "cLCB");
    }

    #[test]
    fn string_fields_reject_non_text_and_overflow() {
        let config = HostStruct::new().with("crit_name", 3.0);
        assert!(matches!(param_err(load(&config)), ParamError::NotText { .. }));

        let config = HostStruct::new().with("kernel_name", "k".repeat(200));
        assert!(matches!(
            param_err(load(&config)),
            ParamError::TextTooLong { len: 200, .. }
        ));
    }

    #[test]
    fn enum_fields_round_trip_and_override() {
        let params = load(&HostStruct::new()).unwrap();
        assert_eq!(params.surr_name, SurrogateKind::default());
        assert_eq!(params.l_type, LearningKind::default());

        let config = HostStruct::new()
            .with("surr_name", "sStudentTProcessJef")
            .with("l_type", "L_ML");
        let params = load(&config).unwrap();
        assert_eq!(params.surr_name, SurrogateKind::StudentTProcessJeffreys);
        assert_eq!(params.l_type, LearningKind::MaximumLikelihood);

        let config = HostStruct::new().with("l_type", "L_BOGUS");
        assert!(matches!(
            param_err(load(&config)),
            ParamError::UnknownName { ref value, .. } if value == "L_BOGUS"
        ));
    }

    #[test]
    fn failure_is_all_or_nothing() {
        // alpha is valid but the later l_type is not; nothing is returned.
        let config = HostStruct::new().with("alpha", 0.3).with("l_type", 1.0);
        assert!(load(&config).is_err());
    }

    #[test]
    fn report_tracks_applied_fields() {
        let config = HostStruct::new().with("alpha", 0.3).with("s_mu", vec![2.0]);
        let (_, report) = load_parameters_with_report(&config, BoptParams::default()).unwrap();
        assert!(report.was_applied("alpha"));
        assert!(report.was_applied("s_mu"));
        assert!(report.was_missing("mu"));
        assert_eq!(report.applied.len() + report.missing.len(), field_names().len());
    }
}
