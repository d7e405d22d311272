//! JSON request boundary shared by the CLI and the bindings.
//!
//! Raw payloads are screened for integer-typed fields before serde sees them,
//! because a JSON `true` or `2.5` must be reported against the field it was
//! supplied for, not coerced or rejected with a generic parse error. Whole
//! numbers written with a fraction (`2.0`) are accepted as integers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;

use crate::error::{EquityEngineError, ErrorResponse, FieldError};
use crate::time_value::{compute_irr, compute_npv, compute_xirr, IrrInput, NpvInput, XirrInput};
use crate::validation::Validate;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A request type that can be parsed from an untyped JSON payload.
pub trait Request: DeserializeOwned + Validate {
    /// Dotted paths of integer-typed fields; `[]` marks an array segment.
    const INTEGER_FIELDS: &'static [&'static str] = &[];
}

/// Screen, deserialize and validate a payload.
pub fn parse_request<T: Request>(payload: &Value) -> EngineResult<T> {
    let mut payload = payload.clone();
    let mut errors = Vec::new();
    for path in T::INTEGER_FIELDS {
        let segments: Vec<&str> = path.split('.').collect();
        check_integers(&mut payload, &segments, String::new(), &mut errors);
    }
    if !errors.is_empty() {
        return Err(EquityEngineError::Validation(errors));
    }

    let request: T = serde_json::from_value(payload)?;
    request.validate()?;
    Ok(request)
}

fn join(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn check_integers(
    value: &mut Value,
    segments: &[&str],
    at: String,
    errors: &mut Vec<FieldError>,
) {
    let Some((head, rest)) = segments.split_first() else {
        if let Some(message) = normalize_integer(value) {
            errors.push(FieldError::new(at, message));
        }
        return;
    };

    let (name, is_array) = match head.strip_suffix("[]") {
        Some(name) => (name, true),
        None => (*head, false),
    };
    // Missing or mistyped containers are left for serde to report.
    let Some(child) = value.as_object_mut().and_then(|o| o.get_mut(name)) else {
        return;
    };
    let path = join(&at, name);

    if is_array {
        if let Some(items) = child.as_array_mut() {
            for (i, item) in items.iter_mut().enumerate() {
                check_integers(item, rest, format!("{path}[{i}]"), errors);
            }
        }
    } else {
        check_integers(child, rest, path, errors);
    }
}

/// Report why `value` is not an unsigned integer, rewriting whole-valued
/// floats such as `2.0` in place so serde accepts them.
fn normalize_integer(value: &mut Value) -> Option<&'static str> {
    let whole = match value {
        Value::Null => return None,
        Value::Bool(_) => return Some("must be an integer, not a boolean"),
        Value::Number(n) if n.is_u64() => return None,
        Value::Number(n) if n.is_i64() => return Some("must not be negative"),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 => f,
            _ => return Some("must be a whole number"),
        },
        _ => return Some("must be an integer"),
    };
    if whole < 0.0 {
        return Some("must not be negative");
    }
    if whole >= u64::MAX as f64 {
        return Some("is too large");
    }
    *value = Value::from(whole as u64);
    None
}

impl Request for NpvInput {}
impl Request for IrrInput {}
impl Request for XirrInput {}

#[cfg(feature = "dilution")]
impl Request for crate::dilution::DilutionInput {
    const INTEGER_FIELDS: &'static [&'static str] = &[
        "funding_rounds[].year",
        "funding_rounds[].convertibles[].elapsed_months",
    ];
}

#[cfg(feature = "dilution")]
impl Request for crate::dilution::PreviewDilutionInput {
    const INTEGER_FIELDS: &'static [&'static str] = &["stakeholders[].shares"];
}

#[cfg(feature = "waterfall")]
impl Request for crate::waterfall::WaterfallInput {
    const INTEGER_FIELDS: &'static [&'static str] = &[
        "cap_table.total_shares",
        "cap_table.stakeholders[].shares",
        "preference_tiers[].seniority",
    ];
}

#[cfg(feature = "valuation")]
mod valuation_requests {
    use super::Request;
    use crate::valuation::{
        BenchmarkInput, CompareValuationsInput, DcfInput, FirstChicagoInput, RevenueMultipleInput,
        VcMethodInput,
    };

    impl Request for RevenueMultipleInput {}
    impl Request for DcfInput {}
    impl Request for BenchmarkInput {}

    impl Request for VcMethodInput {
        const INTEGER_FIELDS: &'static [&'static str] = &["exit_year"];
    }

    impl Request for FirstChicagoInput {
        const INTEGER_FIELDS: &'static [&'static str] = &["scenarios[].years_to_exit"];
    }

    impl Request for CompareValuationsInput {
        const INTEGER_FIELDS: &'static [&'static str] = &[
            "vc_method.exit_year",
            "first_chicago.scenarios[].years_to_exit",
        ];
    }
}

#[cfg(feature = "offer")]
impl Request for crate::offer::OfferScenario {
    const INTEGER_FIELDS: &'static [&'static str] = &[
        "exit_year",
        "vesting.total_years",
        "vesting.cliff_years",
        "funding_rounds[].year",
        "funding_rounds[].convertibles[].elapsed_months",
    ];
}

#[cfg(feature = "monte_carlo")]
impl Request for crate::monte_carlo::MonteCarloInput {
    const INTEGER_FIELDS: &'static [&'static str] = &[
        "trial_count",
        "seed",
        "config.max_trials",
        "config.timeout_ms",
        "config.histogram_buckets",
        "base.exit_year",
        "base.vesting.total_years",
        "base.vesting.cliff_years",
        "base.funding_rounds[].year",
        "base.funding_rounds[].convertibles[].elapsed_months",
    ];
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    ComputeWaterfall,
    ProjectDilution,
    PreviewDilution,
    ComputeNpv,
    ComputeIrr,
    ComputeXirr,
    ValuateRevenueMultiple,
    ValuateDcf,
    ValuateVcMethod,
    ValuateFirstChicago,
    CompareValuations,
    ValidateBenchmark,
    EvaluateOffer,
    RunMonteCarlo,
}

impl Operation {
    pub const ALL: [Operation; 14] = [
        Operation::ComputeWaterfall,
        Operation::ProjectDilution,
        Operation::PreviewDilution,
        Operation::ComputeNpv,
        Operation::ComputeIrr,
        Operation::ComputeXirr,
        Operation::ValuateRevenueMultiple,
        Operation::ValuateDcf,
        Operation::ValuateVcMethod,
        Operation::ValuateFirstChicago,
        Operation::CompareValuations,
        Operation::ValidateBenchmark,
        Operation::EvaluateOffer,
        Operation::RunMonteCarlo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::ComputeWaterfall => "compute-waterfall",
            Operation::ProjectDilution => "project-dilution",
            Operation::PreviewDilution => "preview-dilution",
            Operation::ComputeNpv => "compute-npv",
            Operation::ComputeIrr => "compute-irr",
            Operation::ComputeXirr => "compute-xirr",
            Operation::ValuateRevenueMultiple => "valuate-revenue-multiple",
            Operation::ValuateDcf => "valuate-dcf",
            Operation::ValuateVcMethod => "valuate-vc-method",
            Operation::ValuateFirstChicago => "valuate-first-chicago",
            Operation::CompareValuations => "compare-valuations",
            Operation::ValidateBenchmark => "validate-benchmark",
            Operation::EvaluateOffer => "evaluate-offer",
            Operation::RunMonteCarlo => "run-monte-carlo",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = EquityEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| EquityEngineError::InvalidInput {
                field: "operation".into(),
                reason: format!("unknown operation '{s}'"),
            })
    }
}

fn respond<T: Serialize>(output: T) -> EngineResult<Value> {
    Ok(serde_json::to_value(output)?)
}

fn run(op: Operation, payload: &Value) -> EngineResult<Value> {
    log::debug!("dispatching {op}");
    match op {
        Operation::ComputeNpv => respond(compute_npv(&parse_request(payload)?)?),
        Operation::ComputeIrr => respond(compute_irr(&parse_request(payload)?)?),
        Operation::ComputeXirr => respond(compute_xirr(&parse_request(payload)?)?),

        #[cfg(feature = "waterfall")]
        Operation::ComputeWaterfall => {
            respond(crate::waterfall::compute_waterfall(&parse_request(payload)?)?)
        }

        #[cfg(feature = "dilution")]
        Operation::ProjectDilution => {
            respond(crate::dilution::project_dilution(&parse_request(payload)?)?)
        }
        #[cfg(feature = "dilution")]
        Operation::PreviewDilution => {
            respond(crate::dilution::preview_dilution(&parse_request(payload)?)?)
        }

        #[cfg(feature = "valuation")]
        Operation::ValuateRevenueMultiple => {
            respond(crate::valuation::valuate_revenue_multiple(&parse_request(payload)?)?)
        }
        #[cfg(feature = "valuation")]
        Operation::ValuateDcf => respond(crate::valuation::valuate_dcf(&parse_request(payload)?)?),
        #[cfg(feature = "valuation")]
        Operation::ValuateVcMethod => {
            respond(crate::valuation::valuate_vc_method(&parse_request(payload)?)?)
        }
        #[cfg(feature = "valuation")]
        Operation::ValuateFirstChicago => {
            respond(crate::valuation::valuate_first_chicago(&parse_request(payload)?)?)
        }
        #[cfg(feature = "valuation")]
        Operation::CompareValuations => {
            respond(crate::valuation::compare_valuations(&parse_request(payload)?)?)
        }
        #[cfg(feature = "valuation")]
        Operation::ValidateBenchmark => {
            respond(crate::valuation::validate_benchmark(&parse_request(payload)?)?)
        }

        #[cfg(feature = "offer")]
        Operation::EvaluateOffer => respond(crate::offer::evaluate_offer(&parse_request(payload)?)?),

        #[cfg(feature = "monte_carlo")]
        Operation::RunMonteCarlo => {
            respond(crate::monte_carlo::run_monte_carlo(&parse_request(payload)?)?)
        }

        #[allow(unreachable_patterns)]
        other => Err(EquityEngineError::InvalidInput {
            field: "operation".into(),
            reason: format!("'{other}' is not enabled in this build"),
        }),
    }
}

/// Run `f`, turning errors and panics into the caller-facing error shape.
pub fn guarded<F>(f: F) -> Result<Value, ErrorResponse>
where
    F: FnOnce() -> EngineResult<Value>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            log::debug!("request rejected: {e}");
            Err(e.to_response())
        }
        Err(panic) => {
            let cause = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(EquityEngineError::Internal(cause).to_response())
        }
    }
}

/// Execute an operation against a JSON payload.
pub fn dispatch(op: Operation, payload: &Value) -> Result<Value, ErrorResponse> {
    guarded(|| run(op, payload))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>().unwrap(), op);
            assert_eq!(serde_json::to_value(op).unwrap(), json!(op.name()));
        }
        assert!("compute-everything".parse::<Operation>().is_err());
    }

    #[test]
    fn test_npv_dispatch() {
        let out = dispatch(
            Operation::ComputeNpv,
            &json!({ "cash_flows": ["-100", "60", "60"], "periodic_rate": "0" }),
        )
        .unwrap();
        let npv: rust_decimal::Decimal = serde_json::from_value(out["result"]["npv"].clone()).unwrap();
        assert!((npv - rust_decimal_macros::dec!(20)).abs() < rust_decimal_macros::dec!(0.0000001));
        assert_eq!(out["metadata"]["precision"], json!("rust_decimal_128bit"));
    }

    #[test]
    fn test_malformed_payload_is_validation_error() {
        let err = dispatch(Operation::ComputeIrr, &json!({ "cash_flows": "nope" })).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_panics_become_internal_errors() {
        let err = guarded(|| panic!("secret detail")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(!err.message.contains("secret"));
    }

    #[cfg(feature = "valuation")]
    #[test]
    fn test_boolean_year_is_rejected() {
        let err = dispatch(
            Operation::ValuateVcMethod,
            &json!({
                "projected_exit_value": "100000000",
                "exit_year": true,
                "mode": "multiple",
                "target_multiple": "10"
            }),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.details[0].field, "exit_year");
        assert!(err.details[0].message.contains("boolean"));
    }

    #[cfg(feature = "valuation")]
    #[test]
    fn test_whole_float_year_is_accepted() {
        let request = |year: Value| {
            json!({
                "projected_exit_value": "100000000",
                "exit_year": year,
                "mode": "multiple",
                "target_multiple": "10"
            })
        };
        let written_as_float = dispatch(Operation::ValuateVcMethod, &request(json!(5.0))).unwrap();
        let written_as_int = dispatch(Operation::ValuateVcMethod, &request(json!(5))).unwrap();
        assert_eq!(written_as_float["result"], written_as_int["result"]);

        let err = dispatch(Operation::ValuateVcMethod, &request(json!(-2.0))).unwrap_err();
        assert_eq!(err.details[0].message, "must not be negative");
    }

    #[test]
    fn test_fractional_years_in_arrays_are_located() {
        let err = dispatch(
            Operation::ValuateFirstChicago,
            &json!({
                "discount_rate": "0.3",
                "scenarios": [
                    { "name": "up", "probability": "0.5", "exit_value": "1000", "years_to_exit": 3 },
                    { "name": "down", "probability": "0.5", "exit_value": "10", "years_to_exit": 2.5 }
                ]
            }),
        )
        .unwrap_err();
        assert_eq!(err.details[0].field, "scenarios[1].years_to_exit");
    }

    #[cfg(feature = "valuation")]
    #[test]
    fn test_probability_sum_rejected_at_boundary() {
        let err = dispatch(
            Operation::ValuateFirstChicago,
            &json!({
                "discount_rate": "0.3",
                "scenarios": [
                    { "name": "up", "probability": "0.5", "exit_value": "1000", "years_to_exit": 3 },
                    { "name": "down", "probability": "0.3", "exit_value": "10", "years_to_exit": 2 }
                ]
            }),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.details[0].field, "scenarios");
    }
}
