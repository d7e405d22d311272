use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::cap_table::{CapTable, Stakeholder};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::validation::Validate;
use crate::EngineResult;

const HUNDRED: Decimal = dec!(100);

/// Input for a single-round "what happens to everyone" preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewDilutionInput {
    pub stakeholders: Vec<Stakeholder>,
    /// Reserved option pool, 0–100.
    #[serde(default)]
    pub option_pool_pct: Decimal,
    pub premoney_valuation: Money,
    pub amount_raised: Money,
    #[serde(default = "default_investor_name")]
    pub investor_name: String,
}

fn default_investor_name() -> String {
    "New Investor".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewLineKind {
    Stakeholder,
    OptionPool,
    NewInvestor,
}

/// One row of the preview: ownership before and after, both 0–100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DilutionLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stakeholder_id: Option<String>,
    pub name: String,
    pub kind: PreviewLineKind,
    pub ownership_before_pct: Decimal,
    pub ownership_after_pct: Decimal,
    /// Percentage points lost (negative for the new investor).
    pub dilution_points: Decimal,
    /// Stake value at the post-money valuation.
    pub value_at_post_money: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewDilutionOutput {
    pub dilution_results: Vec<DilutionLine>,
    pub post_money_valuation: Money,
    pub dilution_factor: Rate,
    pub new_investor_pct: Decimal,
}

pub fn preview_dilution(
    input: &PreviewDilutionInput,
) -> EngineResult<ComputationOutput<PreviewDilutionOutput>> {
    let start = Instant::now();
    input.validate()?;

    let post_money = input.premoney_valuation + input.amount_raised;
    let factor = input.premoney_valuation / post_money;
    let investor_pct = input.amount_raised / post_money * HUNDRED;

    let line = |id: Option<String>, name: String, kind, before: Decimal| {
        let after = before * factor;
        DilutionLine {
            stakeholder_id: id,
            name,
            kind,
            ownership_before_pct: before,
            ownership_after_pct: after,
            dilution_points: before - after,
            value_at_post_money: after / HUNDRED * post_money,
        }
    };

    let mut dilution_results: Vec<DilutionLine> = input
        .stakeholders
        .iter()
        .map(|s| {
            line(
                Some(s.id.clone()),
                s.name.clone(),
                PreviewLineKind::Stakeholder,
                s.ownership_pct,
            )
        })
        .collect();

    let table = CapTable {
        stakeholders: input.stakeholders.clone(),
        total_shares: 0,
        option_pool_pct: input.option_pool_pct,
    };
    let pool_before = table.pool_fraction() * HUNDRED;
    if pool_before > Decimal::ZERO {
        dilution_results.push(line(
            None,
            "Option pool".into(),
            PreviewLineKind::OptionPool,
            pool_before,
        ));
    }

    dilution_results.push(DilutionLine {
        stakeholder_id: None,
        name: input.investor_name.clone(),
        kind: PreviewLineKind::NewInvestor,
        ownership_before_pct: Decimal::ZERO,
        ownership_after_pct: investor_pct,
        dilution_points: -investor_pct,
        value_at_post_money: input.amount_raised,
    });

    let mut warnings = Vec::new();
    if table.unallocated_pct() > Decimal::ZERO && !input.stakeholders.is_empty() {
        warnings.push(format!(
            "{}% of pre-round equity is unallocated and shown with the option pool",
            table.unallocated_pct()
        ));
    }

    let output = PreviewDilutionOutput {
        dilution_results,
        post_money_valuation: post_money,
        dilution_factor: factor,
        new_investor_pct: investor_pct,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Single-Round Dilution Preview",
        &serde_json::json!({
            "premoney_valuation": input.premoney_valuation.to_string(),
            "amount_raised": input.amount_raised.to_string(),
            "investor_name": input.investor_name,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cap_table::{ShareClass, StakeholderType};

    fn founder(id: &str, pct: Decimal) -> Stakeholder {
        Stakeholder {
            id: id.into(),
            name: id.into(),
            ownership_pct: pct,
            shares: 0,
            stakeholder_type: StakeholderType::Founder,
            share_class: ShareClass::Common,
            cost_basis: None,
        }
    }

    #[test]
    fn test_preview_ten_plus_two() {
        let input = PreviewDilutionInput {
            stakeholders: vec![founder("alice", dec!(60)), founder("bob", dec!(30))],
            option_pool_pct: dec!(10),
            premoney_valuation: dec!(10_000_000),
            amount_raised: dec!(2_000_000),
            investor_name: "Seed Fund".into(),
        };
        let out = preview_dilution(&input).unwrap().result;
        assert_eq!(out.post_money_valuation, dec!(12_000_000));
        assert!((out.dilution_factor - dec!(0.8333)).abs() < dec!(0.0001));
        assert!((out.new_investor_pct - dec!(16.67)).abs() < dec!(0.01));

        assert_eq!(out.dilution_results.len(), 4);
        let alice = &out.dilution_results[0];
        assert_eq!(alice.ownership_after_pct, dec!(50));
        assert_eq!(alice.value_at_post_money, dec!(6_000_000));

        let total_after: Decimal = out
            .dilution_results
            .iter()
            .map(|l| l.ownership_after_pct)
            .sum();
        assert!((total_after - dec!(100)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_preview_without_stakeholders() {
        let input = PreviewDilutionInput {
            stakeholders: Vec::new(),
            option_pool_pct: Decimal::ZERO,
            premoney_valuation: dec!(4_000_000),
            amount_raised: dec!(1_000_000),
            investor_name: default_investor_name(),
        };
        let out = preview_dilution(&input).unwrap();
        // With no holders the whole pre-round company shows as pool
        assert_eq!(out.result.dilution_results.len(), 2);
        assert!(out.warnings.is_empty());
    }
}
