use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EquityEngineError;
use crate::types::{with_metadata, CashFlow, ComputationOutput, Money, Rate};
use crate::validation::Validate;
use crate::EngineResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const BRACKET_WIDTH: Decimal = dec!(0.000000000000000001);
const MAX_IRR_ITERATIONS: u32 = 200;
const DAYS_PER_YEAR: Decimal = dec!(365.25);

/// Candidate rates scanned for a sign change, spanning -99% to +1000% per period.
const RATE_PROBES: [Decimal; 25] = [
    dec!(-0.99),
    dec!(-0.95),
    dec!(-0.9),
    dec!(-0.8),
    dec!(-0.6),
    dec!(-0.4),
    dec!(-0.2),
    dec!(-0.1),
    dec!(-0.05),
    dec!(0),
    dec!(0.01),
    dec!(0.02),
    dec!(0.05),
    dec!(0.1),
    dec!(0.2),
    dec!(0.35),
    dec!(0.5),
    dec!(0.75),
    dec!(1),
    dec!(1.5),
    dec!(2),
    dec!(3),
    dec!(5),
    dec!(7.5),
    dec!(10),
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Compounding period of a cash-flow series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Periodicity {
    #[default]
    Annual,
    Monthly,
}

impl Periodicity {
    pub fn periods_per_year(self) -> u32 {
        match self {
            Periodicity::Annual => 1,
            Periodicity::Monthly => 12,
        }
    }
}

/// Ordered periodic cash flows plus a payout received at the final period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowSeries {
    pub flows: Vec<Money>,
    #[serde(default)]
    pub terminal_value: Money,
    #[serde(default)]
    pub period: Periodicity,
}

impl CashFlowSeries {
    pub fn npv(&self, periodic_rate: Rate) -> EngineResult<Money> {
        npv(periodic_rate, &self.flows, self.terminal_value)
    }

    pub fn irr(&self) -> Option<Rate> {
        irr(&self.flows, self.terminal_value)
    }
}

/// Input for [`compute_npv`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpvInput {
    pub cash_flows: Vec<Money>,
    /// Rate per period, in the same unit as the cash flows.
    pub periodic_rate: Rate,
    #[serde(default)]
    pub terminal_value: Money,
    #[serde(default)]
    pub period: Periodicity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpvOutput {
    pub npv: Money,
    pub periods: usize,
    /// Sum of all flows and the terminal value before discounting.
    pub undiscounted_total: Money,
}

/// Input for [`compute_irr`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrInput {
    pub cash_flows: Vec<Money>,
    #[serde(default)]
    pub terminal_value: Money,
    #[serde(default)]
    pub period: Periodicity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrOutput {
    /// Rate per period; `None` when no real IRR exists in [-99%, +1000%].
    pub irr: Option<Rate>,
    /// `irr` compounded to an annual rate.
    pub annualized_irr: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Input for [`compute_xirr`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XirrInput {
    pub cash_flows: Vec<CashFlow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XirrOutput {
    pub xirr: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Net Present Value of periodic cash flows plus a terminal value.
///
/// Flow `i` is discounted by `(1 + rate)^-i`; the terminal value is discounted
/// at the final period. `rate` must already match the cash-flow period.
pub fn npv(rate: Rate, cash_flows: &[Money], terminal_value: Money) -> EngineResult<Money> {
    if rate <= dec!(-1) {
        return Err(EquityEngineError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    discounted_sum(rate, cash_flows, terminal_value).ok_or_else(|| {
        EquityEngineError::DivisionByZero {
            context: format!("NPV discount factor at rate {rate}"),
        }
    })
}

/// Checked NPV evaluation; `None` on overflow or a non-positive `1 + rate`.
fn discounted_sum(rate: Rate, cash_flows: &[Money], terminal_value: Money) -> Option<Money> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }
    let v = Decimal::ONE.checked_div(one_plus_r)?;

    let mut factor = Decimal::ONE;
    let mut total = Decimal::ZERO;
    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            factor = factor.checked_mul(v)?;
        }
        total = total.checked_add(cf.checked_mul(factor)?)?;
    }
    total.checked_add(terminal_value.checked_mul(factor)?)
}

/// Internal Rate of Return of periodic cash flows plus a terminal value.
///
/// Scans [-99%, +1000%] for a sign change and bisects the first bracket found.
/// Returns `None` when the flows never change sign, no bracket exists, or the
/// search exhausts its step budget.
pub fn irr(cash_flows: &[Money], terminal_value: Money) -> Option<Rate> {
    let has_positive =
        cash_flows.iter().any(|cf| *cf > Decimal::ZERO) || terminal_value > Decimal::ZERO;
    let has_negative =
        cash_flows.iter().any(|cf| *cf < Decimal::ZERO) || terminal_value < Decimal::ZERO;
    if !has_positive || !has_negative {
        log::debug!("irr: cash flows never change sign");
        return None;
    }

    solve_rate(|r| discounted_sum(r, cash_flows, terminal_value))
}

/// Find a root of `f` over the probe grid, then refine it by bisection.
fn solve_rate<F>(f: F) -> Option<Rate>
where
    F: Fn(Rate) -> Option<Decimal>,
{
    let mut previous: Option<(Rate, Decimal)> = None;
    let mut bracket = None;

    for &rate in RATE_PROBES.iter() {
        let Some(value) = f(rate) else {
            continue;
        };
        if value.is_zero() {
            return Some(rate);
        }
        if let Some((prev_rate, prev_value)) = previous {
            if prev_value.is_sign_negative() != value.is_sign_negative() {
                bracket = Some((prev_rate, prev_value, rate));
                break;
            }
        }
        previous = Some((rate, value));
    }

    let (mut lo, mut f_lo, mut hi) = bracket?;
    log::debug!("irr: bracketed root in [{lo}, {hi}]");

    for _ in 0..MAX_IRR_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        let f_mid = f(mid)?;
        if f_mid.abs() < CONVERGENCE_THRESHOLD || (hi - lo) < BRACKET_WIDTH {
            return Some(mid);
        }
        if f_mid.is_sign_negative() == f_lo.is_sign_negative() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    log::debug!("irr: bisection did not converge within {MAX_IRR_ITERATIONS} steps");
    None
}

/// Convert an annual rate to its compounding-equivalent rate per sub-period.
pub fn periodic_rate(annual_rate: Rate, periods_per_year: u32) -> EngineResult<Rate> {
    if annual_rate <= dec!(-1) {
        return Err(EquityEngineError::InvalidInput {
            field: "annual_rate".into(),
            reason: "Annual rate must be greater than -100%".into(),
        });
    }
    if periods_per_year <= 1 || annual_rate.is_zero() {
        return Ok(annual_rate);
    }
    let exponent = Decimal::ONE / Decimal::from(periods_per_year);
    (Decimal::ONE + annual_rate)
        .checked_powd(exponent)
        .map(|growth| growth - Decimal::ONE)
        .ok_or_else(|| EquityEngineError::FinancialImpossibility(format!(
            "Cannot derive a periodic rate from annual rate {annual_rate}"
        )))
}

/// Compound a periodic rate up to an annual rate.
pub fn annualize(periodic: Rate, periods_per_year: u32) -> Option<Rate> {
    if periods_per_year <= 1 {
        return Some(periodic);
    }
    (Decimal::ONE + periodic)
        .checked_powi(periods_per_year as i64)
        .map(|growth| growth - Decimal::ONE)
}

fn year_fraction(base: &CashFlow, flow: &CashFlow) -> Decimal {
    Decimal::from((flow.date - base.date).num_days()) / DAYS_PER_YEAR
}

fn dated_sum(rate: Rate, flows: &[CashFlow]) -> Option<Money> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }
    let base = flows.first()?;
    let mut total = Decimal::ZERO;
    for flow in flows {
        let factor = one_plus_r.checked_powd(year_fraction(base, flow))?;
        if factor.is_zero() {
            return None;
        }
        total = total.checked_add(flow.amount.checked_div(factor)?)?;
    }
    Some(total)
}

/// NPV of irregularly dated flows, discounted from the first date (actual/365.25).
pub fn xnpv(rate: Rate, flows: &[CashFlow]) -> EngineResult<Money> {
    if rate <= dec!(-1) {
        return Err(EquityEngineError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    if flows.is_empty() {
        return Ok(Decimal::ZERO);
    }
    dated_sum(rate, flows).ok_or_else(|| EquityEngineError::DivisionByZero {
        context: format!("XNPV discount factor at rate {rate}"),
    })
}

/// IRR of irregularly dated flows. `None` when no real rate exists.
pub fn xirr(flows: &[CashFlow]) -> Option<Rate> {
    let has_positive = flows.iter().any(|f| f.amount > Decimal::ZERO);
    let has_negative = flows.iter().any(|f| f.amount < Decimal::ZERO);
    if !has_positive || !has_negative {
        return None;
    }
    solve_rate(|r| dated_sum(r, flows))
}

// ---------------------------------------------------------------------------
// Request wrappers
// ---------------------------------------------------------------------------

pub fn compute_npv(input: &NpvInput) -> EngineResult<ComputationOutput<NpvOutput>> {
    let start = Instant::now();
    input.validate()?;

    let value = npv(input.periodic_rate, &input.cash_flows, input.terminal_value)?;
    let undiscounted_total =
        input.cash_flows.iter().copied().sum::<Decimal>() + input.terminal_value;

    let output = NpvOutput {
        npv: value,
        periods: input.cash_flows.len(),
        undiscounted_total,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Net Present Value",
        &serde_json::json!({
            "periodic_rate": input.periodic_rate.to_string(),
            "period": input.period,
            "terminal_value_period": input.cash_flows.len().saturating_sub(1),
        }),
        Vec::new(),
        elapsed,
        output,
    ))
}

pub fn compute_irr(input: &IrrInput) -> EngineResult<ComputationOutput<IrrOutput>> {
    let start = Instant::now();
    input.validate()?;

    let rate = irr(&input.cash_flows, input.terminal_value);
    let annualized_irr = rate.and_then(|r| annualize(r, input.period.periods_per_year()));
    let note = rate.is_none().then(|| {
        "No internal rate of return exists in the -99% to +1000% range for these cash flows"
            .to_string()
    });

    let output = IrrOutput {
        irr: rate,
        annualized_irr,
        note,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Internal Rate of Return (bracketed bisection)",
        &serde_json::json!({
            "periods": input.cash_flows.len(),
            "period": input.period,
            "search_range": ["-0.99", "10"],
        }),
        Vec::new(),
        elapsed,
        output,
    ))
}

pub fn compute_xirr(input: &XirrInput) -> EngineResult<ComputationOutput<XirrOutput>> {
    let start = Instant::now();
    input.validate()?;

    let rate = xirr(&input.cash_flows);
    let output = XirrOutput {
        xirr: rate,
        note: rate
            .is_none()
            .then(|| "No real XIRR exists for these dated cash flows".to_string()),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Extended IRR (actual/365.25)",
        &serde_json::json!({ "flows": input.cash_flows.len() }),
        Vec::new(),
        elapsed,
        output,
    ))
}
