use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EquityEngineError;
use crate::time_value::npv;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::validation::Validate;
use crate::EngineResult;

use super::{Confidence, ValuationMethod};

/// Terminal value share above which a DCF is considered assumption-driven.
pub const TERMINAL_SHARE_LIMIT: Rate = dec!(0.75);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How the value beyond the explicit forecast is determined.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum TerminalValue {
    /// A terminal amount received at the final forecast period
    Explicit { value: Money },
    /// Gordon growth: TV = CF_n × (1 + g) / (r − g)
    GordonGrowth { growth_rate: Rate },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfInput {
    /// One cash flow per period, the first received one period from today
    pub projected_cash_flows: Vec<Money>,
    /// Discount rate per period
    pub discount_rate: Rate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_value: Option<TerminalValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfOutput {
    pub method: ValuationMethod,
    pub valuation: Money,
    pub pv_of_cash_flows: Money,
    /// Undiscounted terminal value at the final period
    pub terminal_value: Money,
    pub pv_of_terminal_value: Money,
    /// PV of terminal value / valuation, when the valuation is positive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_value_share: Option<Rate>,
    pub discounted_cash_flows: Vec<Money>,
    pub confidence: Confidence,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

pub(crate) fn estimate(input: &DcfInput, warnings: &mut Vec<String>) -> EngineResult<DcfOutput> {
    let r = input.discount_rate;
    let flows = &input.projected_cash_flows;

    let terminal_value = match &input.terminal_value {
        None => Decimal::ZERO,
        Some(TerminalValue::Explicit { value }) => *value,
        Some(TerminalValue::GordonGrowth { growth_rate }) => {
            let g = *growth_rate;
            if g >= r {
                return Err(EquityEngineError::FinancialImpossibility(format!(
                    "Terminal growth rate {g} must be below the discount rate {r}"
                )));
            }
            let last = flows.last().copied().unwrap_or(Decimal::ZERO);
            last * (Decimal::ONE + g) / (r - g)
        }
    };

    // Shift by one period so the first projected flow is discounted once.
    let mut shifted = Vec::with_capacity(flows.len() + 1);
    shifted.push(Decimal::ZERO);
    shifted.extend_from_slice(flows);

    let pv_of_cash_flows = npv(r, &shifted, Decimal::ZERO)?;
    let pv_of_terminal_value = npv(r, &vec![Decimal::ZERO; shifted.len()], terminal_value)?;
    let valuation = pv_of_cash_flows + pv_of_terminal_value;

    let mut discounted_cash_flows = Vec::with_capacity(flows.len());
    let one_plus_r = Decimal::ONE + r;
    let mut factor = Decimal::ONE;
    for cf in flows {
        factor = factor.checked_mul(one_plus_r).ok_or_else(|| {
            EquityEngineError::FinancialImpossibility("Discount factor overflow".into())
        })?;
        discounted_cash_flows.push(*cf / factor);
    }

    let terminal_value_share = (valuation > Decimal::ZERO).then(|| pv_of_terminal_value / valuation);
    let terminal_heavy = terminal_value_share.is_some_and(|s| s > TERMINAL_SHARE_LIMIT);
    if terminal_heavy {
        warnings.push(format!(
            "Terminal value accounts for more than {}% of the DCF valuation",
            TERMINAL_SHARE_LIMIT * dec!(100)
        ));
    }
    if valuation <= Decimal::ZERO {
        warnings.push("DCF valuation is not positive; projected cash flows do not support value".into());
    }

    Ok(DcfOutput {
        method: ValuationMethod::Dcf,
        valuation,
        pv_of_cash_flows,
        terminal_value,
        pv_of_terminal_value,
        terminal_value_share,
        discounted_cash_flows,
        confidence: if terminal_heavy {
            Confidence::Low
        } else {
            Confidence::Medium
        },
    })
}

/// Discount projected cash flows (end of period) plus an optional terminal value.
pub fn valuate_dcf(input: &DcfInput) -> EngineResult<ComputationOutput<DcfOutput>> {
    let start = Instant::now();
    input.validate()?;

    let mut warnings = Vec::new();
    let output = estimate(input, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Discounted Cash Flow Valuation",
        &serde_json::json!({
            "discount_rate": input.discount_rate.to_string(),
            "periods": input.projected_cash_flows.len(),
            "timing": "end of period",
            "terminal_value": input.terminal_value,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dcf_without_terminal() {
        let input = DcfInput {
            projected_cash_flows: vec![dec!(110), dec!(121)],
            discount_rate: dec!(0.10),
            terminal_value: None,
        };
        let out = valuate_dcf(&input).unwrap().result;
        assert!((out.valuation - dec!(200)).abs() < dec!(0.0000001));
        assert_eq!(out.terminal_value, Decimal::ZERO);
        assert!((out.discounted_cash_flows[0] - dec!(100)).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_gordon_growth_terminal() {
        let input = DcfInput {
            projected_cash_flows: vec![dec!(100)],
            discount_rate: dec!(0.10),
            terminal_value: Some(TerminalValue::GordonGrowth {
                growth_rate: dec!(0.05),
            }),
        };
        let mut warnings = Vec::new();
        let out = estimate(&input, &mut warnings).unwrap();
        // TV = 100 * 1.05 / 0.05 = 2100
        assert_eq!(out.terminal_value, dec!(2100));
        assert!((out.pv_of_terminal_value - dec!(1909.0909)).abs() < dec!(0.001));
        assert_eq!(out.confidence, Confidence::Low);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_growth_above_rate_rejected() {
        let input = DcfInput {
            projected_cash_flows: vec![dec!(100)],
            discount_rate: dec!(0.10),
            terminal_value: Some(TerminalValue::GordonGrowth {
                growth_rate: dec!(0.10),
            }),
        };
        assert!(valuate_dcf(&input).is_err());
    }
}
