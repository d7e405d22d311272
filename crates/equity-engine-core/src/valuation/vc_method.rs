use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EquityEngineError;
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::validation::Validate;
use crate::EngineResult;

use super::{Confidence, ValuationMethod};

// ─── Types ───────────────────────────────────────────────────────────────────

/// The investor's required return, as a cash multiple or an annual IRR.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReturnTarget {
    Multiple { target_multiple: Multiple },
    Irr { target_irr: Rate },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcMethodInput {
    pub projected_exit_value: Money,
    /// Years until exit, 1–20
    pub exit_year: u32,
    #[serde(flatten)]
    pub return_target: ReturnTarget,
    /// Dilution from future rounds before exit (decimal)
    #[serde(default)]
    pub expected_dilution: Rate,
    #[serde(default = "default_exit_probability")]
    pub exit_probability: Rate,
    /// When present, reports the ownership this cheque must buy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_amount: Option<Money>,
}

fn default_exit_probability() -> Rate {
    Decimal::ONE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcMethodOutput {
    pub method: ValuationMethod,
    /// Probability-weighted post-money valuation today
    pub valuation: Money,
    /// Post-money valuation assuming the exit happens
    pub post_money_valuation: Money,
    pub required_multiple: Multiple,
    /// Annual IRR equivalent of the required multiple
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implied_irr: Option<Rate>,
    pub retention_ratio: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_ownership: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implied_pre_money: Option<Money>,
    pub confidence: Confidence,
}

// ─── Calculation ─────────────────────────────────────────────────────────────

pub(crate) fn estimate(input: &VcMethodInput, warnings: &mut Vec<String>) -> EngineResult<VcMethodOutput> {
    let years = input.exit_year;

    let (required_multiple, implied_irr) = match &input.return_target {
        ReturnTarget::Multiple { target_multiple } => {
            let irr = target_multiple
                .checked_powd(Decimal::ONE / Decimal::from(years))
                .map(|m| m - Decimal::ONE);
            (*target_multiple, irr)
        }
        ReturnTarget::Irr { target_irr } => {
            let multiple = (Decimal::ONE + target_irr)
                .checked_powi(years as i64)
                .ok_or_else(|| {
                    EquityEngineError::FinancialImpossibility(format!(
                        "Target IRR {target_irr} compounded over {years} years overflows"
                    ))
                })?;
            (multiple, Some(*target_irr))
        }
    };
    if required_multiple <= Decimal::ZERO {
        return Err(EquityEngineError::DivisionByZero {
            context: "VC method required return multiple".into(),
        });
    }

    let retention_ratio = Decimal::ONE - input.expected_dilution;
    let post_money_valuation = input.projected_exit_value * retention_ratio / required_multiple;
    let valuation = post_money_valuation * input.exit_probability;

    let (required_ownership, implied_pre_money) = match input.investment_amount {
        Some(investment) if valuation > Decimal::ZERO => {
            let ownership = investment / valuation;
            if ownership > Decimal::ONE {
                warnings.push(format!(
                    "Investment of {investment} would require more than 100% ownership at a {valuation} valuation"
                ));
            }
            let pre_money = valuation - investment;
            if pre_money < Decimal::ZERO {
                warnings.push("Implied pre-money valuation is negative".into());
            }
            (Some(ownership), Some(pre_money))
        }
        _ => (None, None),
    };

    if required_multiple < dec!(3) {
        warnings.push(format!(
            "A {required_multiple}x required return is low for venture capital"
        ));
    }

    Ok(VcMethodOutput {
        method: ValuationMethod::VcMethod,
        valuation,
        post_money_valuation,
        required_multiple,
        implied_irr,
        retention_ratio,
        required_ownership,
        implied_pre_money,
        confidence: if input.exit_probability < dec!(0.5) {
            Confidence::Low
        } else {
            Confidence::Medium
        },
    })
}

/// Back-solve today's post-money from the exit value, the investor's
/// required return and the dilution expected before exit.
pub fn valuate_vc_method(input: &VcMethodInput) -> EngineResult<ComputationOutput<VcMethodOutput>> {
    let start = Instant::now();
    input.validate()?;

    let mut warnings = Vec::new();
    let output = estimate(input, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Venture Capital Method",
        &serde_json::json!({
            "return_target": input.return_target,
            "exit_year": input.exit_year,
            "expected_dilution": input.expected_dilution.to_string(),
            "exit_probability": input.exit_probability.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}
