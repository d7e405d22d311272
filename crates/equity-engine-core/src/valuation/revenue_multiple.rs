use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput, Money, Multiple};
use crate::validation::Validate;
use crate::EngineResult;

use super::benchmarks::{self, BenchmarkCheck, BenchmarkMetric, Industry, Severity};
use super::{Confidence, ValuationMethod};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueMultipleInput {
    pub annual_revenue: Money,
    pub revenue_multiple: Multiple,
    /// Enables a benchmark check on the multiple
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<Industry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueMultipleOutput {
    pub method: ValuationMethod,
    pub valuation: Money,
    pub annual_revenue: Money,
    pub revenue_multiple: Multiple,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<BenchmarkCheck>,
}

pub(crate) fn estimate(input: &RevenueMultipleInput, warnings: &mut Vec<String>) -> RevenueMultipleOutput {
    let benchmark = input
        .industry
        .map(|industry| benchmarks::check(industry, BenchmarkMetric::RevenueMultiple, input.revenue_multiple));

    if let Some(check) = &benchmark {
        if check.severity != Severity::Ok {
            warnings.push(check.message.clone());
        }
    }

    RevenueMultipleOutput {
        method: ValuationMethod::RevenueMultiple,
        valuation: input.annual_revenue * input.revenue_multiple,
        annual_revenue: input.annual_revenue,
        revenue_multiple: input.revenue_multiple,
        confidence: benchmark
            .as_ref()
            .map_or(Confidence::Medium, |c| c.severity.confidence()),
        benchmark,
    }
}

/// Valuation = annual revenue × revenue multiple.
pub fn valuate_revenue_multiple(
    input: &RevenueMultipleInput,
) -> EngineResult<ComputationOutput<RevenueMultipleOutput>> {
    let start = Instant::now();
    input.validate()?;

    let mut warnings = Vec::new();
    let output = estimate(input, &mut warnings);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Revenue Multiple Valuation",
        &serde_json::json!({
            "annual_revenue": input.annual_revenue.to_string(),
            "revenue_multiple": input.revenue_multiple.to_string(),
            "industry": input.industry,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_revenue_times_multiple() {
        let input = RevenueMultipleInput {
            annual_revenue: dec!(2_000_000),
            revenue_multiple: dec!(8),
            industry: None,
        };
        let out = valuate_revenue_multiple(&input).unwrap();
        assert_eq!(out.result.valuation, dec!(16_000_000));
        assert_eq!(out.result.confidence, Confidence::Medium);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_off_benchmark_multiple_lowers_confidence() {
        let input = RevenueMultipleInput {
            annual_revenue: dec!(1_000_000),
            revenue_multiple: dec!(50),
            industry: Some(Industry::Saas),
        };
        let out = valuate_revenue_multiple(&input).unwrap();
        assert_eq!(out.result.confidence, Confidence::Low);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_rejects_zero_multiple() {
        let input = RevenueMultipleInput {
            annual_revenue: dec!(1_000_000),
            revenue_multiple: dec!(0),
            industry: None,
        };
        assert!(valuate_revenue_multiple(&input).is_err());
    }
}
