use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::cap_table::{CapTable, ShareClass, Stakeholder, StakeholderType};
use crate::dilution::project_series;
use crate::error::EquityEngineError;
use crate::time_value::{annualize, irr, npv, periodic_rate};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::validation::Validate;
use crate::waterfall::{PreferenceTier, PreparedWaterfall};
use crate::EngineResult;

use super::scenario::{EquityGrant, OfferScenario};

const MONTHS_PER_YEAR: u32 = 12;
const SYNTHETIC_TOTAL_SHARES: u64 = 10_000_000;
const HUNDRED: Decimal = dec!(100);
const EMPLOYEE_ID: &str = "employee";
const OTHER_COMMON_ID: &str = "other_common";

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearBreakdown {
    pub year: u32,
    pub current_salary: Money,
    pub startup_salary: Money,
    pub salary_gap: Money,
    /// Invested value of every gap so far, at the end of this year
    pub cumulative_opportunity_cost: Money,
    pub vested_fraction: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferOutcome {
    pub total_salary_gap: Money,
    /// Future value at exit of the salary gap invested monthly
    pub opportunity_cost: Money,
    pub vested_fraction: Rate,
    pub vested_ownership: Rate,
    /// Vested stake after every funding round
    pub diluted_ownership: Rate,
    /// Waterfall payout before any exercise cost
    pub gross_equity_value: Money,
    pub exercise_cost: Money,
    pub equity_payout: Money,
    /// equity_payout − opportunity_cost
    pub net_outcome: Money,
    /// NPV of the monthly gaps and the payout at the monthly equivalent of the investment return
    pub npv: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_irr: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annualized_irr: Option<Rate>,
    pub yearly_breakdown: Vec<YearBreakdown>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn grow(base: Money, rate: Rate, years: u32) -> EngineResult<Money> {
    (Decimal::ONE + rate)
        .checked_powi(years as i64)
        .and_then(|g| g.checked_mul(base))
        .ok_or_else(|| {
            EquityEngineError::FinancialImpossibility(format!(
                "Salary growth of {rate} over {years} years overflows"
            ))
        })
}

/// Build the exit-day cap table: the employee's diluted stake as common, each
/// priced round's investor as 1× non-participating preferred (later rounds
/// senior), and everyone else as common.
fn synthetic_cap_table(
    employee_ownership: Rate,
    scenario: &OfferScenario,
) -> EngineResult<(CapTable, Vec<PreferenceTier>)> {
    let projection = project_series(employee_ownership, &scenario.funding_rounds)?;
    let investors = projection.investor_stakes();

    let shares_for = |fraction: Rate| -> u64 {
        (fraction * Decimal::from(SYNTHETIC_TOTAL_SHARES))
            .round()
            .to_u64()
            .unwrap_or(0)
    };

    let mut stakeholders = vec![Stakeholder {
        id: EMPLOYEE_ID.into(),
        name: "Employee".into(),
        ownership_pct: projection.final_ownership * HUNDRED,
        shares: shares_for(projection.final_ownership),
        stakeholder_type: StakeholderType::Employee,
        share_class: ShareClass::Common,
        cost_basis: None,
    }];

    let mut tiers = Vec::with_capacity(investors.len());
    let rounds = investors.len() as u32;
    for (k, stake) in investors.iter().enumerate() {
        let id = format!("investor_{}", k + 1);
        stakeholders.push(Stakeholder {
            id: id.clone(),
            name: format!("{} investor", stake.round),
            ownership_pct: stake.final_ownership * HUNDRED,
            shares: shares_for(stake.final_ownership),
            stakeholder_type: StakeholderType::Investor,
            share_class: ShareClass::Preferred,
            cost_basis: Some(stake.amount_raised),
        });
        tiers.push(PreferenceTier {
            id: format!("{id}_pref"),
            name: format!("{} preference", stake.round),
            seniority: rounds - k as u32,
            investment_amount: stake.amount_raised,
            liquidation_multiplier: Decimal::ONE,
            participating: false,
            stakeholder_ids: vec![id],
        });
    }

    let allocated: Rate = stakeholders.iter().map(|s| s.ownership_fraction()).sum();
    let others = (Decimal::ONE - allocated).max(Decimal::ZERO);
    stakeholders.push(Stakeholder {
        id: OTHER_COMMON_ID.into(),
        name: "Founders and other common".into(),
        ownership_pct: others * HUNDRED,
        shares: shares_for(others),
        stakeholder_type: StakeholderType::Founder,
        share_class: ShareClass::Common,
        cost_basis: None,
    });

    Ok((
        CapTable {
            stakeholders,
            total_shares: SYNTHETIC_TOTAL_SHARES,
            option_pool_pct: Decimal::ZERO,
        },
        tiers,
    ))
}

/// Evaluate one scenario end to end. Assumes the scenario is already validated;
/// Monte Carlo trials call this directly on perturbed copies.
pub fn evaluate(scenario: &OfferScenario) -> EngineResult<OfferOutcome> {
    let years = scenario.exit_year;
    let months = years * MONTHS_PER_YEAR;
    let monthly_rate = periodic_rate(scenario.investment_return_rate, MONTHS_PER_YEAR)?;
    let one_plus_r = Decimal::ONE + monthly_rate;

    // Salary gap and its invested value.
    let mut gap_flows: Vec<Money> = Vec::with_capacity(months as usize);
    let mut yearly_breakdown = Vec::with_capacity(years as usize);
    let mut balance = Decimal::ZERO;
    let mut total_salary_gap = Decimal::ZERO;
    for year in 0..years {
        let current = grow(scenario.current_salary, scenario.current_salary_growth_rate, year)?;
        let startup = grow(scenario.startup_salary, scenario.startup_salary_growth_rate, year)?;
        let gap = current - startup;
        let monthly_gap = gap / Decimal::from(MONTHS_PER_YEAR);
        for _ in 0..MONTHS_PER_YEAR {
            balance = balance
                .checked_mul(one_plus_r)
                .and_then(|b| b.checked_add(monthly_gap))
                .ok_or_else(|| {
                    EquityEngineError::FinancialImpossibility(
                        "Opportunity cost compounding overflows".into(),
                    )
                })?;
            gap_flows.push(-monthly_gap);
        }
        total_salary_gap += gap;
        yearly_breakdown.push(YearBreakdown {
            year: year + 1,
            current_salary: current,
            startup_salary: startup,
            salary_gap: gap,
            cumulative_opportunity_cost: balance,
            vested_fraction: scenario.vesting.vested_fraction(year + 1),
        });
    }
    let opportunity_cost = balance;

    // Equity: vest, dilute, run through the exit waterfall.
    let vested_fraction = scenario.vesting.vested_fraction(years);
    let vested_ownership = scenario.equity.ownership() * vested_fraction;
    let (cap_table, tiers) = synthetic_cap_table(vested_ownership, scenario)?;
    let diluted_ownership = cap_table.stakeholders[0].ownership_fraction();

    let gross_equity_value = if diluted_ownership.is_zero() {
        Decimal::ZERO
    } else {
        let prepared = PreparedWaterfall::new(&cap_table, &tiers);
        prepared.payout_at(0, scenario.exit_valuation)
    };

    let exercise_cost = match &scenario.equity {
        EquityGrant::Rsu { .. } => Decimal::ZERO,
        EquityGrant::StockOptions { exercise_cost, .. } => *exercise_cost * vested_fraction,
    };
    let equity_payout = (gross_equity_value - exercise_cost).max(Decimal::ZERO);
    let net_outcome = equity_payout - opportunity_cost;

    let npv_value = npv(monthly_rate, &gap_flows, equity_payout)?;
    let monthly_irr = irr(&gap_flows, equity_payout);
    let annualized_irr = monthly_irr.and_then(|r| annualize(r, MONTHS_PER_YEAR));

    Ok(OfferOutcome {
        total_salary_gap,
        opportunity_cost,
        vested_fraction,
        vested_ownership,
        diluted_ownership,
        gross_equity_value,
        exercise_cost,
        equity_payout,
        net_outcome,
        npv: npv_value,
        monthly_irr,
        annualized_irr,
        yearly_breakdown,
    })
}

/// Opportunity cost of the salary gap against the equity payout at exit.
pub fn evaluate_offer(scenario: &OfferScenario) -> EngineResult<ComputationOutput<OfferOutcome>> {
    let start = Instant::now();
    scenario.validate()?;

    let outcome = evaluate(scenario)?;

    let mut warnings = Vec::new();
    if outcome.vested_fraction.is_zero() {
        warnings.push(format!(
            "Exit in year {} falls before the {}-year cliff; nothing has vested",
            scenario.exit_year, scenario.vesting.cliff_years
        ));
    }
    if outcome.total_salary_gap < Decimal::ZERO {
        warnings.push("Startup salary exceeds the current salary; opportunity cost is negative".into());
    }
    if outcome.gross_equity_value > Decimal::ZERO && outcome.equity_payout.is_zero() {
        warnings.push("Exercise cost exceeds the value of the vested options".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Offer Evaluation (opportunity cost vs. equity payout)",
        &serde_json::json!({
            "exit_year": scenario.exit_year,
            "investment_return_rate": scenario.investment_return_rate.to_string(),
            "compounding": "monthly, end of month",
            "vesting": scenario.vesting,
            "funding_rounds": scenario.funding_rounds.len(),
            "payout": "Employee common stake run through a 1x non-participating preference stack, later rounds senior",
        }),
        warnings,
        elapsed,
        outcome,
    ))
}
