#![cfg(feature = "offer")]

use equity_engine_core::dilution::{FundingRound, RoundTerms};
use equity_engine_core::offer::{evaluate_offer, EquityGrant, OfferScenario, VestingSchedule};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn scenario() -> OfferScenario {
    OfferScenario {
        current_salary: dec!(120_000),
        current_salary_growth_rate: Decimal::ZERO,
        startup_salary: dec!(120_000),
        startup_salary_growth_rate: Decimal::ZERO,
        investment_return_rate: Decimal::ZERO,
        exit_year: 4,
        equity: EquityGrant::Rsu {
            ownership: dec!(0.01),
        },
        vesting: VestingSchedule::default(),
        exit_valuation: dec!(100_000_000),
        funding_rounds: Vec::new(),
    }
}

fn near(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < dec!(0.000001)
}

#[test]
fn test_equal_salaries_pay_out_full_stake() {
    let out = evaluate_offer(&scenario()).unwrap().result;
    assert_eq!(out.opportunity_cost, Decimal::ZERO);
    assert_eq!(out.vested_fraction, Decimal::ONE);
    assert!(near(out.equity_payout, dec!(1_000_000)));
    assert!(near(out.net_outcome, dec!(1_000_000)));
    assert!(near(out.npv, dec!(1_000_000)));
    // No outflows, so no sign change and no IRR.
    assert_eq!(out.monthly_irr, None);
    assert_eq!(out.yearly_breakdown.len(), 4);
}

#[test]
fn test_opportunity_cost_without_investment_return() {
    let mut s = scenario();
    s.current_salary = dec!(150_000);
    s.startup_salary = dec!(100_000);
    s.exit_year = 2;
    let out = evaluate_offer(&s).unwrap().result;
    assert_eq!(out.total_salary_gap, dec!(100_000));
    assert!(near(out.opportunity_cost, dec!(100_000)));
    assert!(near(
        out.yearly_breakdown[0].cumulative_opportunity_cost,
        dec!(50_000)
    ));
    assert_eq!(out.vested_fraction, dec!(0.5));
}

#[test]
fn test_investment_return_grows_opportunity_cost() {
    let mut s = scenario();
    s.current_salary = dec!(150_000);
    s.startup_salary = dec!(100_000);
    s.investment_return_rate = dec!(0.08);
    let out = evaluate_offer(&s).unwrap().result;
    assert!(out.opportunity_cost > dec!(200_000));
    assert!(out.npv < out.net_outcome + out.opportunity_cost);
    assert!(out.monthly_irr.is_some());
    assert!(out.annualized_irr.unwrap() > out.monthly_irr.unwrap());
}

#[test]
fn test_exit_before_cliff_vests_nothing() {
    let mut s = scenario();
    s.exit_year = 1;
    s.vesting.cliff_years = 2;
    let out = evaluate_offer(&s).unwrap();
    assert_eq!(out.result.vested_fraction, Decimal::ZERO);
    assert_eq!(out.result.equity_payout, Decimal::ZERO);
    assert!(out.warnings.iter().any(|w| w.contains("cliff")));
}

#[test]
fn test_funding_round_dilutes_and_takes_preference() {
    let mut s = scenario();
    s.exit_valuation = dec!(20_000_000);
    s.funding_rounds = vec![FundingRound {
        name: "Series A".into(),
        year: 2,
        terms: RoundTerms::Valuation {
            premoney_valuation: dec!(40_000_000),
            amount_raised: dec!(10_000_000),
            convertibles: Vec::new(),
        },
    }];
    let out = evaluate_offer(&s).unwrap().result;
    assert!(near(out.diluted_ownership, dec!(0.008)));
    // 10M preference first, then the employee's 0.8% of the 80% common base
    assert!((out.gross_equity_value - dec!(100_000)).abs() < dec!(0.01));
}

#[test]
fn test_options_floor_at_zero_after_exercise_cost() {
    let mut s = scenario();
    s.exit_valuation = dec!(1_000_000);
    s.equity = EquityGrant::StockOptions {
        ownership: dec!(0.01),
        exercise_cost: dec!(50_000),
    };
    let out = evaluate_offer(&s).unwrap();
    assert!(near(out.result.gross_equity_value, dec!(10_000)));
    assert_eq!(out.result.exercise_cost, dec!(50_000));
    assert_eq!(out.result.equity_payout, Decimal::ZERO);
    assert!(out.warnings.iter().any(|w| w.contains("Exercise cost")));
}

#[test]
fn test_cliff_longer_than_schedule_rejected() {
    let mut s = scenario();
    s.vesting = VestingSchedule {
        total_years: 2,
        cliff_years: 3,
    };
    let err = evaluate_offer(&s).unwrap_err();
    assert_eq!(err.details()[0].field, "vesting.cliff_years");
}

#[test]
fn test_ownership_above_one_rejected() {
    let mut s = scenario();
    s.equity = EquityGrant::Rsu {
        ownership: dec!(1.5),
    };
    let err = evaluate_offer(&s).unwrap_err();
    assert_eq!(err.details()[0].field, "equity.ownership");
}
