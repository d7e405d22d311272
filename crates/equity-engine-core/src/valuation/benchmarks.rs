use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput};
use crate::validation::Validate;
use crate::EngineResult;

use super::Confidence;

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    Saas,
    Fintech,
    Marketplace,
    Ecommerce,
    Biotech,
    Hardware,
    Consumer,
    Ai,
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Industry::Saas => "SaaS",
            Industry::Fintech => "fintech",
            Industry::Marketplace => "marketplace",
            Industry::Ecommerce => "e-commerce",
            Industry::Biotech => "biotech",
            Industry::Hardware => "hardware",
            Industry::Consumer => "consumer",
            Industry::Ai => "AI",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkMetric {
    RevenueMultiple,
    DiscountRate,
    TargetReturnMultiple,
}

impl fmt::Display for BenchmarkMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BenchmarkMetric::RevenueMultiple => "revenue multiple",
            BenchmarkMetric::DiscountRate => "discount rate",
            BenchmarkMetric::TargetReturnMultiple => "target return multiple",
        };
        f.write_str(label)
    }
}

/// Typical band for a metric within an industry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkRange {
    pub low: Decimal,
    pub median: Decimal,
    pub high: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

impl Severity {
    /// How far a benchmarked input can be trusted.
    pub fn confidence(self) -> Confidence {
        match self {
            Severity::Ok => Confidence::High,
            Severity::Warning => Confidence::Medium,
            Severity::Error => Confidence::Low,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkInput {
    pub industry: Industry,
    pub metric: BenchmarkMetric,
    pub value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkCheck {
    pub industry: Industry,
    pub metric: BenchmarkMetric,
    pub value: Decimal,
    pub severity: Severity,
    pub benchmark_median: Decimal,
    pub benchmark_low: Decimal,
    pub benchmark_high: Decimal,
    pub message: String,
}

// ─── Table ───────────────────────────────────────────────────────────────────

/// Reference bands for early-stage private companies.
pub fn benchmark(industry: Industry, metric: BenchmarkMetric) -> BenchmarkRange {
    use BenchmarkMetric::*;
    use Industry::*;

    let (low, median, high) = match (metric, industry) {
        (RevenueMultiple, Saas) => (dec!(4), dec!(8), dec!(15)),
        (RevenueMultiple, Fintech) => (dec!(3), dec!(6), dec!(12)),
        (RevenueMultiple, Marketplace) => (dec!(2), dec!(4), dec!(8)),
        (RevenueMultiple, Ecommerce) => (dec!(1), dec!(2.5), dec!(5)),
        (RevenueMultiple, Biotech) => (dec!(5), dec!(10), dec!(25)),
        (RevenueMultiple, Hardware) => (dec!(1), dec!(2.5), dec!(5)),
        (RevenueMultiple, Consumer) => (dec!(1), dec!(3), dec!(6)),
        (RevenueMultiple, Ai) => (dec!(8), dec!(15), dec!(30)),

        (DiscountRate, Saas) => (dec!(0.25), dec!(0.35), dec!(0.50)),
        (DiscountRate, Fintech) => (dec!(0.25), dec!(0.35), dec!(0.50)),
        (DiscountRate, Marketplace) => (dec!(0.25), dec!(0.40), dec!(0.55)),
        (DiscountRate, Ecommerce) => (dec!(0.20), dec!(0.30), dec!(0.45)),
        (DiscountRate, Biotech) => (dec!(0.30), dec!(0.45), dec!(0.60)),
        (DiscountRate, Hardware) => (dec!(0.25), dec!(0.35), dec!(0.50)),
        (DiscountRate, Consumer) => (dec!(0.20), dec!(0.30), dec!(0.45)),
        (DiscountRate, Ai) => (dec!(0.30), dec!(0.40), dec!(0.60)),

        (TargetReturnMultiple, Saas) => (dec!(5), dec!(10), dec!(20)),
        (TargetReturnMultiple, Fintech) => (dec!(5), dec!(10), dec!(20)),
        (TargetReturnMultiple, Marketplace) => (dec!(5), dec!(10), dec!(20)),
        (TargetReturnMultiple, Ecommerce) => (dec!(3), dec!(5), dec!(10)),
        (TargetReturnMultiple, Biotech) => (dec!(10), dec!(15), dec!(30)),
        (TargetReturnMultiple, Hardware) => (dec!(5), dec!(10), dec!(20)),
        (TargetReturnMultiple, Consumer) => (dec!(3), dec!(8), dec!(15)),
        (TargetReturnMultiple, Ai) => (dec!(10), dec!(20), dec!(40)),
    };
    BenchmarkRange { low, median, high }
}

/// Inside the band is fine; up to half the low or double the high is unusual;
/// anything further out is almost certainly an input mistake.
pub fn classify(range: &BenchmarkRange, value: Decimal) -> Severity {
    if value >= range.low && value <= range.high {
        Severity::Ok
    } else if value >= range.low / dec!(2) && value <= range.high * dec!(2) {
        Severity::Warning
    } else {
        Severity::Error
    }
}

pub fn check(industry: Industry, metric: BenchmarkMetric, value: Decimal) -> BenchmarkCheck {
    let range = benchmark(industry, metric);
    let severity = classify(&range, value);
    let message = match severity {
        Severity::Ok => format!(
            "{value} is within the typical {industry} {metric} range of {} to {}",
            range.low, range.high
        ),
        Severity::Warning => format!(
            "{value} is outside the typical {industry} {metric} range of {} to {} (median {})",
            range.low, range.high, range.median
        ),
        Severity::Error => format!(
            "{value} is far outside the typical {industry} {metric} range of {} to {} (median {})",
            range.low, range.high, range.median
        ),
    };
    BenchmarkCheck {
        industry,
        metric,
        value,
        severity,
        benchmark_median: range.median,
        benchmark_low: range.low,
        benchmark_high: range.high,
        message,
    }
}

pub fn validate_benchmark(input: &BenchmarkInput) -> EngineResult<ComputationOutput<BenchmarkCheck>> {
    let start = Instant::now();
    input.validate()?;

    let result = check(input.industry, input.metric, input.value);
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Industry Benchmark Comparison",
        &serde_json::json!({
            "ok_band": "[low, high]",
            "warning_band": "[low / 2, high * 2]",
        }),
        Vec::new(),
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_bands() {
        let range = benchmark(Industry::Saas, BenchmarkMetric::RevenueMultiple);
        assert_eq!(classify(&range, dec!(8)), Severity::Ok);
        assert_eq!(classify(&range, dec!(25)), Severity::Warning);
        assert_eq!(classify(&range, dec!(2.5)), Severity::Warning);
        assert_eq!(classify(&range, dec!(40)), Severity::Error);
        assert_eq!(classify(&range, dec!(1)), Severity::Error);
    }

    #[test]
    fn test_check_returns_median() {
        let result = check(Industry::Ai, BenchmarkMetric::RevenueMultiple, dec!(70));
        assert_eq!(result.severity, Severity::Error);
        assert_eq!(result.benchmark_median, dec!(15));
        assert!(result.message.contains("AI"));
    }

    #[test]
    fn test_every_band_is_ordered() {
        let industries = [
            Industry::Saas,
            Industry::Fintech,
            Industry::Marketplace,
            Industry::Ecommerce,
            Industry::Biotech,
            Industry::Hardware,
            Industry::Consumer,
            Industry::Ai,
        ];
        let metrics = [
            BenchmarkMetric::RevenueMultiple,
            BenchmarkMetric::DiscountRate,
            BenchmarkMetric::TargetReturnMultiple,
        ];
        for industry in industries {
            for metric in metrics {
                let r = benchmark(industry, metric);
                assert!(r.low < r.median && r.median < r.high, "{industry} {metric}");
            }
        }
    }
}
