use serde::{Deserialize, Serialize};

pub mod benchmarks;
pub mod compare;
pub mod dcf;
pub mod first_chicago;
pub mod revenue_multiple;
pub mod vc_method;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationMethod {
    RevenueMultiple,
    Dcf,
    VcMethod,
    FirstChicago,
}

/// How much weight an estimate deserves given its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

pub use benchmarks::{
    validate_benchmark, BenchmarkCheck, BenchmarkInput, BenchmarkMetric, BenchmarkRange, Industry,
    Severity,
};
pub use compare::{
    compare_valuations, CompareValuationsInput, CompareValuationsOutput, ValuationEstimate,
};
pub use dcf::{valuate_dcf, DcfInput, DcfOutput, TerminalValue};
pub use first_chicago::{
    valuate_first_chicago, FirstChicagoInput, FirstChicagoOutput, ScenarioValue, ValuationScenario,
};
pub use revenue_multiple::{valuate_revenue_multiple, RevenueMultipleInput, RevenueMultipleOutput};
pub use vc_method::{valuate_vc_method, ReturnTarget, VcMethodInput, VcMethodOutput};
