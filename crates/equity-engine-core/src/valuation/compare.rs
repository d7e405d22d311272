use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput, Money, Multiple};
use crate::validation::Validate;
use crate::EngineResult;

use super::dcf::{self, DcfInput, TerminalValue};
use super::first_chicago::{self, FirstChicagoInput};
use super::revenue_multiple::{self, RevenueMultipleInput};
use super::vc_method::{self, ReturnTarget, VcMethodInput};
use super::{Confidence, ValuationMethod};

/// Max / min ratio above which the estimates are called out as divergent.
const DIVERGENCE_RATIO: Multiple = dec!(2);

/// Any subset of the four methods, each with its own parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompareValuationsInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_multiple: Option<RevenueMultipleInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dcf: Option<DcfInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vc_method: Option<VcMethodInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_chicago: Option<FirstChicagoInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationEstimate {
    pub method: ValuationMethod,
    pub valuation: Money,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareValuationsOutput {
    pub results: Vec<ValuationEstimate>,
    pub min_valuation: Money,
    pub max_valuation: Money,
    pub average_valuation: Money,
    /// max / min, when the minimum is positive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spread_ratio: Option<Multiple>,
    pub insights: Vec<String>,
}

/// Run every supplied method and explain where and why they diverge.
pub fn compare_valuations(
    input: &CompareValuationsInput,
) -> EngineResult<ComputationOutput<CompareValuationsOutput>> {
    let start = Instant::now();
    input.validate()?;

    let mut warnings: Vec<String> = Vec::new();
    let mut results: Vec<ValuationEstimate> = Vec::new();
    let mut insights: Vec<String> = Vec::new();

    if let Some(rm) = &input.revenue_multiple {
        let out = revenue_multiple::estimate(rm, &mut warnings);
        insights.push(format!(
            "Revenue multiple applies {}x to {} of annual revenue",
            rm.revenue_multiple, rm.annual_revenue
        ));
        results.push(ValuationEstimate {
            method: out.method,
            valuation: out.valuation,
            confidence: out.confidence,
        });
    }

    if let Some(d) = &input.dcf {
        let out = dcf::estimate(d, &mut warnings)?;
        let terminal = match &d.terminal_value {
            None => "no terminal value".to_string(),
            Some(TerminalValue::Explicit { value }) => format!("an explicit terminal value of {value}"),
            Some(TerminalValue::GordonGrowth { growth_rate }) => {
                format!("{}% perpetual growth", growth_rate * dec!(100))
            }
        };
        insights.push(format!(
            "DCF assumes a {}% discount rate over {} periods with {terminal}",
            d.discount_rate * dec!(100),
            d.projected_cash_flows.len()
        ));
        if let Some(share) = out.terminal_value_share {
            if share > dcf::TERMINAL_SHARE_LIMIT {
                insights.push(format!(
                    "{}% of the DCF value comes from the terminal value, so it is highly sensitive to that assumption",
                    (share * dec!(100)).round_dp(1)
                ));
            }
        }
        results.push(ValuationEstimate {
            method: out.method,
            valuation: out.valuation,
            confidence: out.confidence,
        });
    }

    if let Some(vc) = &input.vc_method {
        let out = vc_method::estimate(vc, &mut warnings)?;
        let target = match &vc.return_target {
            ReturnTarget::Multiple { target_multiple } => format!("a {target_multiple}x target return"),
            ReturnTarget::Irr { target_irr } => format!("a {}% target IRR", target_irr * dec!(100)),
        };
        insights.push(format!(
            "VC method assumes {target} over {} years with {}% dilution before exit",
            vc.exit_year,
            vc.expected_dilution * dec!(100)
        ));
        results.push(ValuationEstimate {
            method: out.method,
            valuation: out.valuation,
            confidence: out.confidence,
        });
    }

    if let Some(fc) = &input.first_chicago {
        let out = first_chicago::estimate(fc)?;
        insights.push(format!(
            "First Chicago weighs {} scenarios to {} nominal, {} after discounting at {}%",
            fc.scenarios.len(),
            out.weighted_value.round_dp(2),
            out.present_value.round_dp(2),
            fc.discount_rate * dec!(100)
        ));
        results.push(ValuationEstimate {
            method: out.method,
            valuation: out.valuation,
            confidence: out.confidence,
        });
    }

    let lowest = results.iter().min_by(|a, b| a.valuation.cmp(&b.valuation));
    let highest = results.iter().max_by(|a, b| a.valuation.cmp(&b.valuation));
    let (min_valuation, max_valuation) = match (lowest, highest) {
        (Some(lo), Some(hi)) => (lo.valuation, hi.valuation),
        _ => (Decimal::ZERO, Decimal::ZERO),
    };
    let average_valuation = if results.is_empty() {
        Decimal::ZERO
    } else {
        results.iter().map(|r| r.valuation).sum::<Decimal>() / Decimal::from(results.len())
    };

    let spread_ratio = (min_valuation > Decimal::ZERO).then(|| max_valuation / min_valuation);
    if let (Some(ratio), Some(lo), Some(hi)) = (spread_ratio, lowest, highest) {
        if results.len() > 1 && ratio > DIVERGENCE_RATIO {
            insights.push(format!(
                "Estimates diverge by {}x: {:?} is highest and {:?} is lowest; reconcile their assumptions before relying on the average",
                ratio.round_dp(2),
                hi.method,
                lo.method
            ));
        }
    }
    if let Some(low_conf) = results.iter().find(|r| r.confidence == Confidence::Low) {
        insights.push(format!(
            "{:?} has low confidence; weight it accordingly",
            low_conf.method
        ));
    }

    let output = CompareValuationsOutput {
        results,
        min_valuation,
        max_valuation,
        average_valuation,
        spread_ratio,
        insights,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Multi-Method Valuation Comparison",
        &serde_json::json!({
            "methods": output.results.iter().map(|r| r.method).collect::<Vec<_>>(),
            "average": "simple mean of all method valuations",
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::first_chicago::ValuationScenario;

    #[test]
    fn test_compare_two_methods() {
        let input = CompareValuationsInput {
            revenue_multiple: Some(RevenueMultipleInput {
                annual_revenue: dec!(1_000_000),
                revenue_multiple: dec!(10),
                industry: None,
            }),
            vc_method: Some(VcMethodInput {
                projected_exit_value: dec!(100_000_000),
                exit_year: 5,
                return_target: ReturnTarget::Multiple {
                    target_multiple: dec!(20),
                },
                expected_dilution: dec!(0),
                exit_probability: Decimal::ONE,
                investment_amount: None,
            }),
            ..Default::default()
        };
        let out = compare_valuations(&input).unwrap().result;
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.min_valuation, dec!(5_000_000));
        assert_eq!(out.max_valuation, dec!(10_000_000));
        assert_eq!(out.average_valuation, dec!(7_500_000));
        assert_eq!(out.spread_ratio, Some(dec!(2)));
        assert!(out.insights.iter().any(|i| i.contains("20x target return")));
    }

    #[test]
    fn test_divergence_insight() {
        let input = CompareValuationsInput {
            revenue_multiple: Some(RevenueMultipleInput {
                annual_revenue: dec!(1_000_000),
                revenue_multiple: dec!(30),
                industry: None,
            }),
            first_chicago: Some(FirstChicagoInput {
                scenarios: vec![ValuationScenario {
                    name: "only".into(),
                    probability: Decimal::ONE,
                    exit_value: dec!(5_000_000),
                    years_to_exit: 0,
                }],
                discount_rate: dec!(0.3),
            }),
            ..Default::default()
        };
        let out = compare_valuations(&input).unwrap().result;
        assert!(out.insights.iter().any(|i| i.contains("diverge")));
    }

    #[test]
    fn test_requires_a_method() {
        assert!(compare_valuations(&CompareValuationsInput::default()).is_err());
    }
}
