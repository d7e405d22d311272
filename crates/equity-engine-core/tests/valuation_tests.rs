use equity_engine_core::error::ErrorCode;
use equity_engine_core::valuation::{
    compare_valuations, validate_benchmark, valuate_dcf, valuate_first_chicago,
    valuate_revenue_multiple, valuate_vc_method, BenchmarkInput, BenchmarkMetric,
    CompareValuationsInput, Confidence, DcfInput, FirstChicagoInput, Industry, ReturnTarget,
    RevenueMultipleInput, Severity, TerminalValue, ValuationMethod, ValuationScenario,
    VcMethodInput,
};
use pretty_assertions::assert_eq;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

fn scenario(name: &str, probability: Decimal, exit_value: Decimal, years: u32) -> ValuationScenario {
    ValuationScenario {
        name: name.into(),
        probability,
        exit_value,
        years_to_exit: years,
    }
}

fn vc_input() -> VcMethodInput {
    VcMethodInput {
        projected_exit_value: dec!(100_000_000),
        exit_year: 5,
        return_target: ReturnTarget::Multiple {
            target_multiple: dec!(10),
        },
        expected_dilution: dec!(0.30),
        exit_probability: Decimal::ONE,
        investment_amount: Some(dec!(2_000_000)),
    }
}

// ===========================================================================
// Revenue multiple
// ===========================================================================

#[test]
fn test_revenue_multiple_with_benchmark() {
    let input = RevenueMultipleInput {
        annual_revenue: dec!(2_000_000),
        revenue_multiple: dec!(8),
        industry: Some(Industry::Saas),
    };
    let out = valuate_revenue_multiple(&input).unwrap().result;
    assert_eq!(out.valuation, dec!(16_000_000));
    assert_eq!(out.method, ValuationMethod::RevenueMultiple);
    assert_eq!(out.benchmark.unwrap().severity, Severity::Ok);
}

#[test]
fn test_revenue_multiple_rejects_negative_revenue() {
    let input = RevenueMultipleInput {
        annual_revenue: dec!(-1),
        revenue_multiple: dec!(8),
        industry: None,
    };
    let err = valuate_revenue_multiple(&input).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);
    assert_eq!(err.details()[0].field, "annual_revenue");
}

// ===========================================================================
// DCF
// ===========================================================================

#[test]
fn test_dcf_end_of_period_discounting() {
    let input = DcfInput {
        projected_cash_flows: vec![dec!(110), dec!(121)],
        discount_rate: dec!(0.10),
        terminal_value: None,
    };
    let out = valuate_dcf(&input).unwrap().result;
    assert!((out.valuation - dec!(200)).abs() < dec!(0.000001));
    assert!((out.discounted_cash_flows[0] - dec!(100)).abs() < dec!(0.000001));
}

#[test]
fn test_dcf_terminal_heavy_is_low_confidence() {
    let input = DcfInput {
        projected_cash_flows: vec![dec!(100), dec!(100), dec!(100)],
        discount_rate: dec!(0.12),
        terminal_value: Some(TerminalValue::GordonGrowth {
            growth_rate: dec!(0.03),
        }),
    };
    let out = valuate_dcf(&input).unwrap();
    let share = out.result.terminal_value_share.unwrap();
    assert!(share > dec!(0.75));
    assert_eq!(out.result.confidence, Confidence::Low);
    assert!(!out.warnings.is_empty());
}

#[test]
fn test_dcf_rejects_rate_at_minus_100() {
    let input = DcfInput {
        projected_cash_flows: vec![dec!(100)],
        discount_rate: dec!(-1),
        terminal_value: None,
    };
    let err = valuate_dcf(&input).unwrap_err();
    assert_eq!(err.details()[0].field, "discount_rate");
}

// ===========================================================================
// VC method
// ===========================================================================

#[test]
fn test_vc_method_multiple_mode() {
    let out = valuate_vc_method(&vc_input()).unwrap().result;
    // 100M × 0.7 / 10
    assert_eq!(out.valuation, dec!(7_000_000));
    assert_eq!(out.required_ownership.unwrap().round_dp(6), dec!(0.285714));
    assert_eq!(out.implied_pre_money, Some(dec!(5_000_000)));
}

#[test]
fn test_vc_method_probability_weighting() {
    let mut input = vc_input();
    input.exit_probability = dec!(0.4);
    let out = valuate_vc_method(&input).unwrap().result;
    assert_eq!(out.valuation, dec!(2_800_000));
    assert_eq!(out.post_money_valuation, dec!(7_000_000));
    assert_eq!(out.confidence, Confidence::Low);
}

#[test]
fn test_vc_method_exit_year_bounds() {
    let mut input = vc_input();
    input.exit_year = 21;
    let err = valuate_vc_method(&input).unwrap_err();
    assert_eq!(err.details()[0].field, "exit_year");

    input.exit_year = 0;
    assert!(valuate_vc_method(&input).is_err());
}

// ===========================================================================
// First Chicago
// ===========================================================================

#[test]
fn test_first_chicago_weighted_and_present_values() {
    let input = FirstChicagoInput {
        scenarios: vec![
            scenario("success", dec!(0.25), dec!(200_000_000), 5),
            scenario("sideways", dec!(0.50), dec!(40_000_000), 5),
            scenario("failure", dec!(0.25), dec!(2_000_000), 3),
        ],
        discount_rate: dec!(0.30),
    };
    let out = valuate_first_chicago(&input).unwrap().result;
    assert_eq!(out.weighted_value, dec!(70_500_000));
    assert!(out.present_value < out.weighted_value);
    assert_eq!(out.valuation, out.present_value);
    assert_eq!(out.confidence, Confidence::High);

    let failure = &out.scenarios[2];
    let expected_pv = dec!(2_000_000) / dec!(1.3).powi(3);
    assert!((failure.present_value - expected_pv).abs() < dec!(0.0001));
}

#[test]
fn test_first_chicago_rejects_probabilities_summing_to_point_eight() {
    let input = FirstChicagoInput {
        scenarios: vec![
            scenario("up", dec!(0.5), dec!(50_000_000), 4),
            scenario("down", dec!(0.3), dec!(5_000_000), 4),
        ],
        discount_rate: dec!(0.30),
    };
    let err = valuate_first_chicago(&input).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);
}

#[test]
fn test_first_chicago_rejects_zero_exit_value() {
    let input = FirstChicagoInput {
        scenarios: vec![scenario("only", Decimal::ONE, Decimal::ZERO, 2)],
        discount_rate: dec!(0.30),
    };
    let err = valuate_first_chicago(&input).unwrap_err();
    assert_eq!(err.details()[0].field, "scenarios[0].exit_value");
}

// ===========================================================================
// Comparison and benchmarks
// ===========================================================================

#[test]
fn test_compare_runs_only_supplied_methods() {
    let input = CompareValuationsInput {
        revenue_multiple: Some(RevenueMultipleInput {
            annual_revenue: dec!(1_000_000),
            revenue_multiple: dec!(6),
            industry: None,
        }),
        vc_method: Some(vc_input()),
        ..Default::default()
    };
    let out = compare_valuations(&input).unwrap().result;
    assert_eq!(out.results.len(), 2);
    assert_eq!(out.min_valuation, dec!(6_000_000));
    assert_eq!(out.max_valuation, dec!(7_000_000));
    assert_eq!(out.average_valuation, dec!(6_500_000));
    assert!(!out.insights.is_empty());
}

#[test]
fn test_compare_reports_nested_field_paths() {
    let mut vc = vc_input();
    vc.expected_dilution = Decimal::ONE;
    let input = CompareValuationsInput {
        vc_method: Some(vc),
        ..Default::default()
    };
    let err = compare_valuations(&input).unwrap_err();
    assert_eq!(err.details()[0].field, "vc_method.expected_dilution");
}

#[test]
fn test_benchmark_severity_bands() {
    let check = |value: Decimal| {
        validate_benchmark(&BenchmarkInput {
            industry: Industry::Fintech,
            metric: BenchmarkMetric::RevenueMultiple,
            value,
        })
        .unwrap()
        .result
    };
    assert_eq!(check(dec!(6)).severity, Severity::Ok);
    assert_eq!(check(dec!(20)).severity, Severity::Warning);
    assert_eq!(check(dec!(40)).severity, Severity::Error);
    assert_eq!(check(dec!(6)).benchmark_median, dec!(6));
}
