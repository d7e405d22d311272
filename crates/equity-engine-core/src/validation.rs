//! Request validation.
//!
//! Every request type implements [`Validate`]. Operations call `validate()`
//! before computing anything, so the computation modules can assume their
//! inputs are in range. Failures are collected field by field into a single
//! `VALIDATION_ERROR` rather than stopping at the first one.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;

use crate::cap_table::{CapTable, Stakeholder};
use crate::error::{EquityEngineError, FieldError};
use crate::time_value::{IrrInput, NpvInput, XirrInput};
use crate::EngineResult;

/// Upper bound on year counts (exit years, scenario horizons, vesting terms).
pub const MAX_YEARS: u32 = 20;

/// Tolerance on scenario probabilities summing to one.
pub const PROBABILITY_TOLERANCE: Decimal = dec!(0.000001);

/// Ceiling on currency amounts in waterfall requests; claims and pro-rata
/// splits stay well inside `Decimal` range below it.
pub const MAX_AMOUNT: Decimal = dec!(1_000_000_000_000_000);

/// Ceiling on a tier's liquidation preference multiple.
pub const MAX_LIQUIDATION_MULTIPLIER: Decimal = dec!(100);

/// Rounding allowed when cap-table percentages are entered to two decimals.
const PCT_ROUNDING_SLACK: Decimal = dec!(0.01);

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Collects field errors under a dotted path prefix.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
    prefix: String,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn path(&self, field: &str) -> String {
        if self.prefix.is_empty() {
            field.to_string()
        } else if field.starts_with('[') {
            format!("{}{field}", self.prefix)
        } else {
            format!("{}.{field}", self.prefix)
        }
    }

    /// Validate `item` with every field path prefixed by `prefix`.
    pub fn nested<T: Validate + ?Sized>(&mut self, prefix: &str, item: &T) {
        let outer = std::mem::take(&mut self.prefix);
        self.prefix = if outer.is_empty() {
            prefix.to_string()
        } else if prefix.starts_with('[') {
            format!("{outer}{prefix}")
        } else {
            format!("{outer}.{prefix}")
        };
        item.validate_into(self);
        self.prefix = outer;
    }

    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            let path = self.path(field);
            self.errors.push(FieldError::new(path, message));
        }
    }

    pub fn positive(&mut self, field: &str, value: Decimal) {
        self.check(value > Decimal::ZERO, field, "must be greater than zero");
    }

    pub fn non_negative(&mut self, field: &str, value: Decimal) {
        self.check(value >= Decimal::ZERO, field, "must not be negative");
    }

    /// Inclusive [0, 1].
    pub fn fraction(&mut self, field: &str, value: Decimal) {
        self.in_range(field, value, Decimal::ZERO, Decimal::ONE);
    }

    pub fn in_range(&mut self, field: &str, value: Decimal, min: Decimal, max: Decimal) {
        self.check(
            value >= min && value <= max,
            field,
            format!("must be between {min} and {max}"),
        );
    }

    pub fn int_in_range(&mut self, field: &str, value: u32, min: u32, max: u32) {
        self.check(
            (min..=max).contains(&value),
            field,
            format!("must be an integer between {min} and {max}"),
        );
    }

    /// Rates below −100% have no economic meaning and −100% divides by zero.
    pub fn rate_above_minus_one(&mut self, field: &str, value: Decimal) {
        self.check(value > -Decimal::ONE, field, "must be greater than -1 (-100%)");
    }

    /// Non-negative and no larger than [`MAX_AMOUNT`].
    pub fn amount(&mut self, field: &str, value: Decimal) {
        self.non_negative(field, value);
        self.check(
            value <= MAX_AMOUNT,
            field,
            format!("must not exceed {MAX_AMOUNT}"),
        );
    }

    pub fn not_empty<T>(&mut self, field: &str, items: &[T]) {
        self.check(!items.is_empty(), field, "must contain at least one entry");
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn finish(self) -> EngineResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(EquityEngineError::Validation(self.errors))
        }
    }
}

/// A request that can check its own field ranges.
pub trait Validate {
    fn validate_into(&self, v: &mut Validator);

    fn validate(&self) -> EngineResult<()> {
        let mut v = Validator::new();
        self.validate_into(&mut v);
        v.finish()
    }
}

// ---------------------------------------------------------------------------
// Cap table
// ---------------------------------------------------------------------------

impl Validate for Stakeholder {
    fn validate_into(&self, v: &mut Validator) {
        v.check(!self.id.trim().is_empty(), "id", "must not be blank");
        v.in_range("ownership_pct", self.ownership_pct, Decimal::ZERO, dec!(100));
        if let Some(basis) = self.cost_basis {
            v.non_negative("cost_basis", basis);
        }
    }
}

fn validate_stakeholders(v: &mut Validator, stakeholders: &[Stakeholder], option_pool_pct: Decimal) {
    let mut seen = HashSet::new();
    for (i, s) in stakeholders.iter().enumerate() {
        v.nested(&format!("stakeholders[{i}]"), s);
        v.check(
            seen.insert(s.id.as_str()),
            &format!("stakeholders[{i}].id"),
            format!("duplicate stakeholder id '{}'", s.id),
        );
    }
    v.in_range("option_pool_pct", option_pool_pct, Decimal::ZERO, dec!(100));
    let allocated: Decimal = stakeholders.iter().map(|s| s.ownership_pct).sum();
    v.check(
        allocated + option_pool_pct.max(Decimal::ZERO) <= dec!(100) + PCT_ROUNDING_SLACK,
        "stakeholders",
        format!("ownership ({allocated}%) plus option pool ({option_pool_pct}%) exceeds 100%"),
    );
}

impl Validate for CapTable {
    fn validate_into(&self, v: &mut Validator) {
        validate_stakeholders(v, &self.stakeholders, self.option_pool_pct);
        if !self.stakeholders.is_empty() {
            v.check(self.total_shares > 0, "total_shares", "must be greater than zero");
        }
    }
}

// ---------------------------------------------------------------------------
// Time value
// ---------------------------------------------------------------------------

impl Validate for NpvInput {
    fn validate_into(&self, v: &mut Validator) {
        v.not_empty("cash_flows", &self.cash_flows);
        v.rate_above_minus_one("periodic_rate", self.periodic_rate);
    }
}

impl Validate for IrrInput {
    fn validate_into(&self, v: &mut Validator) {
        v.not_empty("cash_flows", &self.cash_flows);
    }
}

impl Validate for XirrInput {
    fn validate_into(&self, v: &mut Validator) {
        v.check(
            self.cash_flows.len() >= 2,
            "cash_flows",
            "must contain at least two dated cash flows",
        );
    }
}

// ---------------------------------------------------------------------------
// Dilution
// ---------------------------------------------------------------------------

#[cfg(feature = "dilution")]
mod dilution_rules {
    use super::*;
    use crate::dilution::{
        ConvertibleInstrument, DilutionInput, FundingRound, InstrumentKind, PreviewDilutionInput,
        RoundTerms,
    };

    impl Validate for ConvertibleInstrument {
        fn validate_into(&self, v: &mut Validator) {
            v.positive("principal", self.principal);
            if let Some(rate) = self.interest_rate {
                v.non_negative("interest_rate", rate);
                v.check(
                    self.kind == InstrumentKind::ConvertibleNote,
                    "interest_rate",
                    "only convertible notes accrue interest",
                );
            }
            if let Some(discount) = self.discount_rate {
                v.check(
                    discount >= Decimal::ZERO && discount < Decimal::ONE,
                    "discount_rate",
                    "must be in [0, 1)",
                );
            }
            if let Some(cap) = self.valuation_cap {
                v.positive("valuation_cap", cap);
            }
        }
    }

    impl Validate for FundingRound {
        fn validate_into(&self, v: &mut Validator) {
            match &self.terms {
                RoundTerms::Direct {
                    dilution_percentage,
                } => {
                    v.check(
                        *dilution_percentage >= Decimal::ZERO && *dilution_percentage < Decimal::ONE,
                        "dilution_percentage",
                        "must be in [0, 1)",
                    );
                }
                RoundTerms::Valuation {
                    premoney_valuation,
                    amount_raised,
                    convertibles,
                } => {
                    v.positive("premoney_valuation", *premoney_valuation);
                    v.non_negative("amount_raised", *amount_raised);
                    for (i, c) in convertibles.iter().enumerate() {
                        v.nested(&format!("convertibles[{i}]"), c);
                    }
                }
            }
        }
    }

    pub(super) fn validate_rounds(v: &mut Validator, rounds: &[FundingRound]) {
        for (i, round) in rounds.iter().enumerate() {
            v.nested(&format!("funding_rounds[{i}]"), round);
        }
    }

    impl Validate for DilutionInput {
        fn validate_into(&self, v: &mut Validator) {
            v.fraction("initial_ownership", self.initial_ownership);
            validate_rounds(v, &self.funding_rounds);
        }
    }

    impl Validate for PreviewDilutionInput {
        fn validate_into(&self, v: &mut Validator) {
            validate_stakeholders(v, &self.stakeholders, self.option_pool_pct);
            v.positive("premoney_valuation", self.premoney_valuation);
            v.non_negative("amount_raised", self.amount_raised);
            v.check(
                !self.investor_name.trim().is_empty(),
                "investor_name",
                "must not be blank",
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Waterfall
// ---------------------------------------------------------------------------

#[cfg(feature = "waterfall")]
impl Validate for crate::waterfall::WaterfallInput {
    fn validate_into(&self, v: &mut Validator) {
        v.nested("cap_table", &self.cap_table);

        let known: HashSet<&str> = self
            .cap_table
            .stakeholders
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        let mut tier_ids = HashSet::new();
        for (i, tier) in self.preference_tiers.iter().enumerate() {
            let at = |field: &str| format!("preference_tiers[{i}].{field}");
            v.check(
                tier_ids.insert(tier.id.as_str()),
                &at("id"),
                format!("duplicate tier id '{}'", tier.id),
            );
            v.check(tier.seniority >= 1, &at("seniority"), "must be 1 or greater");
            v.positive(&at("investment_amount"), tier.investment_amount);
            v.amount(&at("investment_amount"), tier.investment_amount);
            v.in_range(
                &at("liquidation_multiplier"),
                tier.liquidation_multiplier,
                Decimal::ONE,
                MAX_LIQUIDATION_MULTIPLIER,
            );
            // A tier nobody holds would be paid out to no one.
            v.not_empty(&at("stakeholder_ids"), &tier.stakeholder_ids);
            // An empty cap table is a valid empty-state request, tiers and all.
            if !known.is_empty() {
                for (j, id) in tier.stakeholder_ids.iter().enumerate() {
                    v.check(
                        known.contains(id.as_str()),
                        &at(&format!("stakeholder_ids[{j}]")),
                        format!("unknown stakeholder id '{id}'"),
                    );
                }
            }
        }

        for (i, exit) in self.exit_valuations.iter().enumerate() {
            v.amount(&format!("exit_valuations[{i}]"), *exit);
        }
    }
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

#[cfg(feature = "valuation")]
mod valuation_rules {
    use super::*;
    use crate::valuation::{
        BenchmarkInput, CompareValuationsInput, DcfInput, FirstChicagoInput, ReturnTarget,
        RevenueMultipleInput, TerminalValue, VcMethodInput,
    };

    impl Validate for RevenueMultipleInput {
        fn validate_into(&self, v: &mut Validator) {
            v.positive("annual_revenue", self.annual_revenue);
            v.positive("revenue_multiple", self.revenue_multiple);
        }
    }

    impl Validate for DcfInput {
        fn validate_into(&self, v: &mut Validator) {
            v.not_empty("projected_cash_flows", &self.projected_cash_flows);
            v.rate_above_minus_one("discount_rate", self.discount_rate);
            match &self.terminal_value {
                Some(TerminalValue::Explicit { value }) => {
                    v.non_negative("terminal_value.value", *value);
                }
                Some(TerminalValue::GordonGrowth { growth_rate }) => {
                    v.rate_above_minus_one("terminal_value.growth_rate", *growth_rate);
                    v.check(
                        *growth_rate < self.discount_rate,
                        "terminal_value.growth_rate",
                        "must be below the discount rate",
                    );
                }
                None => {}
            }
        }
    }

    impl Validate for VcMethodInput {
        fn validate_into(&self, v: &mut Validator) {
            v.positive("projected_exit_value", self.projected_exit_value);
            v.int_in_range("exit_year", self.exit_year, 1, MAX_YEARS);
            match self.return_target {
                ReturnTarget::Multiple { target_multiple } => {
                    v.positive("target_multiple", target_multiple);
                }
                ReturnTarget::Irr { target_irr } => {
                    v.rate_above_minus_one("target_irr", target_irr);
                }
            }
            v.check(
                self.expected_dilution >= Decimal::ZERO && self.expected_dilution < Decimal::ONE,
                "expected_dilution",
                "must be in [0, 1)",
            );
            v.check(
                self.exit_probability > Decimal::ZERO && self.exit_probability <= Decimal::ONE,
                "exit_probability",
                "must be in (0, 1]",
            );
            if let Some(amount) = self.investment_amount {
                v.positive("investment_amount", amount);
            }
        }
    }

    impl Validate for FirstChicagoInput {
        fn validate_into(&self, v: &mut Validator) {
            v.not_empty("scenarios", &self.scenarios);
            v.rate_above_minus_one("discount_rate", self.discount_rate);
            for (i, s) in self.scenarios.iter().enumerate() {
                let at = |field: &str| format!("scenarios[{i}].{field}");
                v.fraction(&at("probability"), s.probability);
                v.positive(&at("exit_value"), s.exit_value);
                v.int_in_range(&at("years_to_exit"), s.years_to_exit, 0, MAX_YEARS);
            }
            if !self.scenarios.is_empty() {
                let total: Decimal = self.scenarios.iter().map(|s| s.probability).sum();
                v.check(
                    (total - Decimal::ONE).abs() <= PROBABILITY_TOLERANCE,
                    "scenarios",
                    format!("probabilities must sum to 1.0, got {total}"),
                );
            }
        }
    }

    impl Validate for CompareValuationsInput {
        fn validate_into(&self, v: &mut Validator) {
            v.check(
                self.revenue_multiple.is_some()
                    || self.dcf.is_some()
                    || self.vc_method.is_some()
                    || self.first_chicago.is_some(),
                "methods",
                "at least one valuation method must be supplied",
            );
            if let Some(i) = &self.revenue_multiple {
                v.nested("revenue_multiple", i);
            }
            if let Some(i) = &self.dcf {
                v.nested("dcf", i);
            }
            if let Some(i) = &self.vc_method {
                v.nested("vc_method", i);
            }
            if let Some(i) = &self.first_chicago {
                v.nested("first_chicago", i);
            }
        }
    }

    impl Validate for BenchmarkInput {
        fn validate_into(&self, v: &mut Validator) {
            v.non_negative("value", self.value);
        }
    }
}

// ---------------------------------------------------------------------------
// Offer evaluation
// ---------------------------------------------------------------------------

#[cfg(feature = "offer")]
impl Validate for crate::offer::OfferScenario {
    fn validate_into(&self, v: &mut Validator) {
        use crate::offer::EquityGrant;

        v.non_negative("current_salary", self.current_salary);
        v.non_negative("startup_salary", self.startup_salary);
        v.rate_above_minus_one("current_salary_growth_rate", self.current_salary_growth_rate);
        v.rate_above_minus_one("startup_salary_growth_rate", self.startup_salary_growth_rate);
        v.rate_above_minus_one("investment_return_rate", self.investment_return_rate);
        v.int_in_range("exit_year", self.exit_year, 1, MAX_YEARS);
        v.non_negative("exit_valuation", self.exit_valuation);

        v.fraction("equity.ownership", self.equity.ownership());
        if let EquityGrant::StockOptions { exercise_cost, .. } = &self.equity {
            v.non_negative("equity.exercise_cost", *exercise_cost);
        }

        v.int_in_range("vesting.total_years", self.vesting.total_years, 1, MAX_YEARS);
        v.check(
            self.vesting.cliff_years <= self.vesting.total_years,
            "vesting.cliff_years",
            "must not exceed vesting.total_years",
        );

        dilution_rules::validate_rounds(v, &self.funding_rounds);
    }
}

// ---------------------------------------------------------------------------
// Monte Carlo
// ---------------------------------------------------------------------------

#[cfg(feature = "monte_carlo")]
impl Validate for crate::monte_carlo::MonteCarloInput {
    fn validate_into(&self, v: &mut Validator) {
        use crate::monte_carlo::TRIAL_CEILING;

        v.nested("base", &self.base);

        let cfg = &self.config;
        v.check(
            (1..=TRIAL_CEILING).contains(&cfg.max_trials),
            "config.max_trials",
            format!("must be an integer between 1 and {TRIAL_CEILING}"),
        );
        let cap = cfg.max_trials.clamp(1, TRIAL_CEILING);
        v.int_in_range("trial_count", self.trial_count, 1, cap);
        v.check(
            (1..=1_000).contains(&cfg.histogram_buckets),
            "config.histogram_buckets",
            "must be an integer between 1 and 1000",
        );
        if let Some(ms) = cfg.timeout_ms {
            v.check(ms > 0, "config.timeout_ms", "must be greater than zero");
        }

        let mut seen = HashSet::new();
        for (i, p) in self.perturbations.iter().enumerate() {
            let at = |field: &str| format!("perturbations[{i}].{field}");
            v.check(
                p.volatility.is_finite() && p.volatility >= 0.0,
                &at("volatility"),
                "must be a finite, non-negative number",
            );
            v.check(
                seen.insert(p.parameter),
                &at("parameter"),
                "each parameter may be perturbed only once",
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cap_table::{ShareClass, StakeholderType};

    fn holder(id: &str, pct: Decimal) -> Stakeholder {
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

    fn fields(err: EquityEngineError) -> Vec<String> {
        err.details().into_iter().map(|f| f.field).collect()
    }

    #[test]
    fn test_collects_every_failure() {
        let table = CapTable {
            stakeholders: vec![holder("a", dec!(70)), holder("a", dec!(40))],
            total_shares: 0,
            option_pool_pct: dec!(-1),
        };
        let got = fields(table.validate().unwrap_err());
        assert_eq!(
            got,
            vec![
                "stakeholders[1].id",
                "option_pool_pct",
                "stakeholders",
                "total_shares"
            ]
        );
    }

    #[test]
    fn test_empty_cap_table_is_valid() {
        let table = CapTable {
            stakeholders: vec![],
            total_shares: 0,
            option_pool_pct: Decimal::ZERO,
        };
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_nested_paths() {
        struct Inner;
        impl Validate for Inner {
            fn validate_into(&self, v: &mut Validator) {
                v.positive("amount", Decimal::ZERO);
            }
        }
        struct Outer;
        impl Validate for Outer {
            fn validate_into(&self, v: &mut Validator) {
                v.nested("rounds[3]", &Inner);
            }
        }
        let mut v = Validator::new();
        v.nested("base", &Outer);
        let err = v.finish().unwrap_err();
        assert_eq!(fields(err), vec!["base.rounds[3].amount"]);
    }

    #[test]
    fn test_npv_rate_bound() {
        let input = NpvInput {
            cash_flows: vec![dec!(100)],
            periodic_rate: dec!(-1),
            terminal_value: Decimal::ZERO,
            period: Default::default(),
        };
        assert_eq!(fields(input.validate().unwrap_err()), vec!["periodic_rate"]);
    }
}
