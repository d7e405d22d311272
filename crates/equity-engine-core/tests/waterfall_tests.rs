use equity_engine_core::cap_table::{CapTable, ShareClass, Stakeholder, StakeholderType};
use equity_engine_core::error::ErrorCode;
use equity_engine_core::waterfall::{
    compute_waterfall, BreakevenResolution, PreferenceTier, WaterfallInput, WaterfallPhase,
};
use pretty_assertions::assert_eq;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Fixtures
// ===========================================================================

fn holder(id: &str, pct: Decimal, class: ShareClass) -> Stakeholder {
    let stakeholder_type = match class {
        ShareClass::Preferred => StakeholderType::Investor,
        ShareClass::Common => StakeholderType::Founder,
    };
    Stakeholder {
        id: id.into(),
        name: id.to_uppercase(),
        ownership_pct: pct,
        // 10M shares in total
        shares: (pct * dec!(100_000)).to_u64().unwrap(),
        stakeholder_type,
        share_class: class,
        cost_basis: None,
    }
}

fn tier(
    id: &str,
    seniority: u32,
    amount: Decimal,
    multiplier: Decimal,
    participating: bool,
    ids: &[&str],
) -> PreferenceTier {
    PreferenceTier {
        id: id.into(),
        name: format!("{id} liquidation preference"),
        seniority,
        investment_amount: amount,
        liquidation_multiplier: multiplier,
        participating,
        stakeholder_ids: ids.iter().map(|s| s.to_string()).collect(),
    }
}

fn cap(holders: Vec<Stakeholder>, pool: Decimal) -> CapTable {
    CapTable {
        stakeholders: holders,
        total_shares: 10_000_000,
        option_pool_pct: pool,
    }
}

fn founder_and_series_a() -> WaterfallInput {
    WaterfallInput {
        cap_table: cap(
            vec![
                holder("investor", dec!(50), ShareClass::Preferred),
                holder("founder", dec!(50), ShareClass::Common),
            ],
            Decimal::ZERO,
        ),
        preference_tiers: vec![tier(
            "series_a",
            1,
            dec!(10_000_000),
            dec!(1),
            false,
            &["investor"],
        )],
        exit_valuations: vec![dec!(5_000_000), dec!(20_000_000), dec!(60_000_000)],
    }
}

// ===========================================================================
// Distribution
// ===========================================================================

#[test]
fn test_reference_twenty_million_exit() {
    let out = compute_waterfall(&founder_and_series_a()).unwrap();
    let dist = &out.result.distributions_by_valuation[1];

    assert_eq!(dist.exit_valuation, dec!(20_000_000));
    assert_eq!(dist.payout_of("investor"), Some(dec!(10_000_000)));
    assert_eq!(dist.payout_of("founder"), Some(dec!(10_000_000)));
    assert_eq!(dist.total_distributed, dec!(20_000_000));
    assert_eq!(dist.undistributed, Decimal::ZERO);

    let first = &dist.steps[0];
    assert_eq!(first.phase, WaterfallPhase::PreferencePayout);
    assert_eq!(first.amount, dec!(10_000_000));
    assert_eq!(first.remaining_proceeds, dec!(10_000_000));
    let last = dist.steps.last().unwrap();
    assert_eq!(last.phase, WaterfallPhase::ProRataDistribution);
    assert_eq!(last.remaining_proceeds, Decimal::ZERO);
}

#[test]
fn test_low_exit_wipes_out_common() {
    let out = compute_waterfall(&founder_and_series_a()).unwrap();
    let dist = &out.result.distributions_by_valuation[0];
    assert_eq!(dist.payout_of("investor"), Some(dec!(5_000_000)));
    assert_eq!(dist.payout_of("founder"), Some(Decimal::ZERO));
    assert_eq!(dist.total_distributed, dec!(5_000_000));
}

#[test]
fn test_high_exit_converts_to_common() {
    let out = compute_waterfall(&founder_and_series_a()).unwrap();
    let dist = &out.result.distributions_by_valuation[2];
    assert!(dist.tier_outcomes[0].converted);
    assert_eq!(dist.payout_of("investor"), Some(dec!(30_000_000)));
    assert_eq!(dist.payout_of("founder"), Some(dec!(30_000_000)));
    assert!(dist
        .steps
        .iter()
        .any(|s| s.phase == WaterfallPhase::Conversion));
}

#[test]
fn test_senior_tier_paid_before_junior() {
    let input = WaterfallInput {
        cap_table: cap(
            vec![
                holder("series_b", dec!(20), ShareClass::Preferred),
                holder("series_a", dec!(20), ShareClass::Preferred),
                holder("founder", dec!(60), ShareClass::Common),
            ],
            Decimal::ZERO,
        ),
        preference_tiers: vec![
            tier("a", 2, dec!(4_000_000), dec!(1), false, &["series_a"]),
            tier("b", 1, dec!(6_000_000), dec!(1), false, &["series_b"]),
        ],
        exit_valuations: vec![dec!(8_000_000)],
    };
    let out = compute_waterfall(&input).unwrap();
    let dist = &out.result.distributions_by_valuation[0];
    assert_eq!(dist.payout_of("series_b"), Some(dec!(6_000_000)));
    assert_eq!(dist.payout_of("series_a"), Some(dec!(2_000_000)));
    assert_eq!(dist.payout_of("founder"), Some(Decimal::ZERO));
}

#[test]
fn test_multiplier_scales_claim() {
    let input = WaterfallInput {
        cap_table: cap(
            vec![
                holder("investor", dec!(25), ShareClass::Preferred),
                holder("founder", dec!(75), ShareClass::Common),
            ],
            Decimal::ZERO,
        ),
        preference_tiers: vec![tier(
            "seed",
            1,
            dec!(2_000_000),
            dec!(2),
            true,
            &["investor"],
        )],
        exit_valuations: vec![dec!(10_000_000)],
    };
    let out = compute_waterfall(&input).unwrap();
    let dist = &out.result.distributions_by_valuation[0];
    // 4M preference, then 25% of the remaining 6M
    assert_eq!(dist.payout_of("investor"), Some(dec!(5_500_000)));
    assert_eq!(dist.payout_of("founder"), Some(dec!(4_500_000)));
}

#[test]
fn test_option_pool_participates_as_exercised() {
    let input = WaterfallInput {
        cap_table: cap(
            vec![
                holder("investor", dec!(50), ShareClass::Preferred),
                holder("founder", dec!(40), ShareClass::Common),
            ],
            dec!(10),
        ),
        preference_tiers: vec![tier(
            "series_a",
            1,
            dec!(10_000_000),
            dec!(1),
            false,
            &["investor"],
        )],
        exit_valuations: vec![dec!(100_000_000)],
    };
    let out = compute_waterfall(&input).unwrap();
    let dist = &out.result.distributions_by_valuation[0];
    assert_eq!(dist.option_pool_payout, dec!(10_000_000));
    assert_eq!(dist.payout_of("founder"), Some(dec!(40_000_000)));
    assert_eq!(dist.payout_of("investor"), Some(dec!(50_000_000)));
    assert!(out.assumptions["option_pool"]
        .as_str()
        .unwrap()
        .contains("as if fully exercised"));
}

// ===========================================================================
// Edge cases and validation
// ===========================================================================

#[test]
fn test_empty_cap_table_returns_empty_state() {
    let input = WaterfallInput {
        cap_table: cap(Vec::new(), Decimal::ZERO),
        preference_tiers: Vec::new(),
        exit_valuations: vec![dec!(1_000_000)],
    };
    let out = compute_waterfall(&input).unwrap();
    assert!(out.result.distributions_by_valuation.is_empty());
    assert!(out.result.breakeven_points.is_empty());
}

#[test]
fn test_preferences_above_every_exit_do_not_fail() {
    let mut input = founder_and_series_a();
    input.preference_tiers[0].investment_amount = dec!(1_000_000_000);
    let out = compute_waterfall(&input).unwrap();
    for dist in &out.result.distributions_by_valuation {
        assert_eq!(dist.payout_of("founder"), Some(Decimal::ZERO));
        assert_eq!(dist.payout_of("investor"), Some(dist.exit_valuation));
    }
}

#[test]
fn test_unknown_tier_holder_is_validation_error() {
    let mut input = founder_and_series_a();
    input.preference_tiers[0].stakeholder_ids = vec!["ghost".into()];
    let err = compute_waterfall(&input).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);
    assert_eq!(
        err.details()[0].field,
        "preference_tiers[0].stakeholder_ids[0]"
    );
}

#[test]
fn test_tier_without_holders_is_rejected() {
    let input = WaterfallInput {
        cap_table: cap(
            vec![holder("founder", dec!(100), ShareClass::Common)],
            Decimal::ZERO,
        ),
        preference_tiers: vec![tier("orphan", 1, dec!(5_000_000), dec!(1), false, &[])],
        exit_valuations: vec![dec!(10_000_000)],
    };
    let err = compute_waterfall(&input).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);
    assert_eq!(err.details()[0].field, "preference_tiers[0].stakeholder_ids");
}

#[test]
fn test_oversized_claim_is_rejected_not_overflowed() {
    let mut input = founder_and_series_a();
    input.preference_tiers[0].investment_amount = dec!(10_000_000_000_000_000_000_000);
    input.preference_tiers[0].liquidation_multiplier = dec!(100_000_000_000);
    input.exit_valuations = vec![dec!(1_000_000)];
    let err = compute_waterfall(&input).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);
    let fields: Vec<String> = err.details().into_iter().map(|f| f.field).collect();
    assert_eq!(
        fields,
        vec![
            "preference_tiers[0].investment_amount",
            "preference_tiers[0].liquidation_multiplier",
        ]
    );
}

#[test]
fn test_exit_above_amount_ceiling_is_rejected() {
    let mut input = founder_and_series_a();
    input.exit_valuations = vec![dec!(1_000), dec!(2_000_000_000_000_000)];
    let err = compute_waterfall(&input).unwrap_err();
    assert_eq!(err.details()[0].field, "exit_valuations[1]");
}

#[test]
fn test_ownership_above_100_is_rejected() {
    let mut input = founder_and_series_a();
    input.cap_table.stakeholders[1].ownership_pct = dec!(60);
    assert!(compute_waterfall(&input).is_err());
}

#[test]
fn test_multiplier_below_one_is_rejected() {
    let mut input = founder_and_series_a();
    input.preference_tiers[0].liquidation_multiplier = dec!(0.5);
    let err = compute_waterfall(&input).unwrap_err();
    assert_eq!(
        err.details()[0].field,
        "preference_tiers[0].liquidation_multiplier"
    );
}

#[test]
fn test_share_drift_is_flagged_not_renormalized() {
    let mut input = founder_and_series_a();
    input.cap_table.stakeholders[1].shares = 1_000;
    let out = compute_waterfall(&input).unwrap();
    assert!(out.warnings.iter().any(|w| w.contains("'founder'")));
    let dist = &out.result.distributions_by_valuation[1];
    assert_eq!(dist.payout_of("founder"), Some(dec!(10_000_000)));
}

// ===========================================================================
// Breakeven
// ===========================================================================

#[test]
fn test_breakeven_points() {
    let out = compute_waterfall(&founder_and_series_a()).unwrap();
    let points = &out.result.breakeven_points;

    let investor = points.iter().find(|p| p.stakeholder_id == "investor").unwrap();
    assert_eq!(investor.resolution, BreakevenResolution::AtOrBelowMinimum);

    let founder = points.iter().find(|p| p.stakeholder_id == "founder").unwrap();
    assert_eq!(founder.resolution, BreakevenResolution::WithinRange);
    let exit = founder.exit_valuation.unwrap();
    assert!(
        (exit - dec!(10_000_000)).abs() <= dec!(1),
        "founder breakeven should sit just above the 10M preference, got {exit}"
    );
}

#[test]
fn test_breakeven_against_cost_basis_not_reached() {
    let mut input = founder_and_series_a();
    input.cap_table.stakeholders[1].cost_basis = Some(dec!(500_000_000));
    let out = compute_waterfall(&input).unwrap();
    let founder = out
        .result
        .breakeven_points
        .iter()
        .find(|p| p.stakeholder_id == "founder")
        .unwrap();
    assert_eq!(founder.resolution, BreakevenResolution::NotReached);
    assert_eq!(founder.exit_valuation, None);
    assert!(founder.note.is_some());
}
