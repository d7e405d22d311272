use napi::Result as NapiResult;
use napi_derive::napi;
use serde_json::Value;

use equity_engine_core::boundary::{self, Operation};
use equity_engine_core::error::ErrorResponse;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Engine rejections travel as the JSON-encoded `ErrorResponse` so callers
/// can `JSON.parse(err.message)` and read `code` and `details`.
fn reject(resp: ErrorResponse) -> napi::Error {
    match serde_json::to_string(&resp) {
        Ok(body) => napi::Error::from_reason(body),
        Err(e) => to_napi_error(e),
    }
}

fn call(op: Operation, input_json: &str) -> NapiResult<String> {
    let payload: Value = match serde_json::from_str(input_json) {
        Ok(v) => v,
        Err(e) => {
            return Err(reject(
                equity_engine_core::EquityEngineError::from(e).to_response(),
            ))
        }
    };
    let output = boundary::dispatch(op, &payload).map_err(reject)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Generic entry points
// ---------------------------------------------------------------------------

/// Run any operation by its kebab-case name, e.g. `compute-waterfall`.
#[napi]
pub fn dispatch(operation: String, input_json: String) -> NapiResult<String> {
    let op: Operation = operation.parse().map_err(|e: equity_engine_core::EquityEngineError| {
        reject(e.to_response())
    })?;
    call(op, &input_json)
}

#[napi]
pub fn list_operations() -> Vec<String> {
    Operation::ALL.iter().map(|op| op.name().to_string()).collect()
}

// ---------------------------------------------------------------------------
// Waterfall and dilution
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_waterfall(input_json: String) -> NapiResult<String> {
    call(Operation::ComputeWaterfall, &input_json)
}

#[napi]
pub fn project_dilution(input_json: String) -> NapiResult<String> {
    call(Operation::ProjectDilution, &input_json)
}

#[napi]
pub fn preview_dilution(input_json: String) -> NapiResult<String> {
    call(Operation::PreviewDilution, &input_json)
}

// ---------------------------------------------------------------------------
// Time value
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_npv(input_json: String) -> NapiResult<String> {
    call(Operation::ComputeNpv, &input_json)
}

#[napi]
pub fn compute_irr(input_json: String) -> NapiResult<String> {
    call(Operation::ComputeIrr, &input_json)
}

#[napi]
pub fn compute_xirr(input_json: String) -> NapiResult<String> {
    call(Operation::ComputeXirr, &input_json)
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

#[napi]
pub fn valuate_revenue_multiple(input_json: String) -> NapiResult<String> {
    call(Operation::ValuateRevenueMultiple, &input_json)
}

#[napi]
pub fn valuate_dcf(input_json: String) -> NapiResult<String> {
    call(Operation::ValuateDcf, &input_json)
}

#[napi]
pub fn valuate_vc_method(input_json: String) -> NapiResult<String> {
    call(Operation::ValuateVcMethod, &input_json)
}

#[napi]
pub fn valuate_first_chicago(input_json: String) -> NapiResult<String> {
    call(Operation::ValuateFirstChicago, &input_json)
}

#[napi]
pub fn compare_valuations(input_json: String) -> NapiResult<String> {
    call(Operation::CompareValuations, &input_json)
}

#[napi]
pub fn validate_benchmark(input_json: String) -> NapiResult<String> {
    call(Operation::ValidateBenchmark, &input_json)
}

// ---------------------------------------------------------------------------
// Offer risk
// ---------------------------------------------------------------------------

#[napi]
pub fn evaluate_offer(input_json: String) -> NapiResult<String> {
    call(Operation::EvaluateOffer, &input_json)
}

#[napi]
pub fn run_monte_carlo(input_json: String) -> NapiResult<String> {
    call(Operation::RunMonteCarlo, &input_json)
}
