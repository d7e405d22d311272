use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::time_value::npv;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::validation::Validate;
use crate::EngineResult;

use super::{Confidence, ValuationMethod};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationScenario {
    pub name: String,
    pub probability: Rate,
    pub exit_value: Money,
    /// 0–20
    pub years_to_exit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirstChicagoInput {
    pub scenarios: Vec<ValuationScenario>,
    /// Annual rate used to bring each exit back to today
    pub discount_rate: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioValue {
    pub name: String,
    pub probability: Rate,
    pub exit_value: Money,
    pub years_to_exit: u32,
    pub present_value: Money,
    /// probability × exit value
    pub weighted_value: Money,
    /// probability × present value
    pub weighted_present_value: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirstChicagoOutput {
    pub method: ValuationMethod,
    /// Equal to `present_value`
    pub valuation: Money,
    /// Σ probability × exit value, undiscounted
    pub weighted_value: Money,
    /// Σ probability × discounted exit value
    pub present_value: Money,
    pub scenarios: Vec<ScenarioValue>,
    pub confidence: Confidence,
}

pub(crate) fn estimate(input: &FirstChicagoInput) -> EngineResult<FirstChicagoOutput> {
    let mut scenarios = Vec::with_capacity(input.scenarios.len());
    let mut weighted_value = Decimal::ZERO;
    let mut present_value = Decimal::ZERO;

    for s in &input.scenarios {
        let periods = vec![Decimal::ZERO; s.years_to_exit as usize + 1];
        let pv = npv(input.discount_rate, &periods, s.exit_value)?;
        let weighted = s.probability * s.exit_value;
        let weighted_pv = s.probability * pv;
        weighted_value += weighted;
        present_value += weighted_pv;
        scenarios.push(ScenarioValue {
            name: s.name.clone(),
            probability: s.probability,
            exit_value: s.exit_value,
            years_to_exit: s.years_to_exit,
            present_value: pv,
            weighted_value: weighted,
            weighted_present_value: weighted_pv,
        });
    }

    Ok(FirstChicagoOutput {
        method: ValuationMethod::FirstChicago,
        valuation: present_value,
        weighted_value,
        present_value,
        confidence: if input.scenarios.len() >= 3 {
            Confidence::High
        } else {
            Confidence::Medium
        },
        scenarios,
    })
}

/// Probability-weighted scenario ("First Chicago") valuation.
pub fn valuate_first_chicago(
    input: &FirstChicagoInput,
) -> EngineResult<ComputationOutput<FirstChicagoOutput>> {
    let start = Instant::now();
    input.validate()?;

    let output = estimate(input)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "First Chicago Method (probability-weighted scenarios)",
        &serde_json::json!({
            "discount_rate": input.discount_rate.to_string(),
            "scenarios": input.scenarios.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        }),
        Vec::new(),
        elapsed,
        output,
    ))
}
