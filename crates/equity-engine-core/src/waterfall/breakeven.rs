use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::Money;

use super::engine::PreparedWaterfall;

/// Bisection stops once the bracket is this narrow, in currency units.
const SEARCH_PRECISION: Decimal = dec!(1);
const MAX_BISECTION_STEPS: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakevenResolution {
    /// Found between two supplied valuations.
    WithinRange,
    /// Already reached at the lowest supplied valuation.
    AtOrBelowMinimum,
    /// Not reached at the highest supplied valuation.
    NotReached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakevenPoint {
    pub stakeholder_id: String,
    pub name: String,
    /// Payout that must be exceeded: the cost basis, or zero
    pub threshold: Money,
    pub exit_valuation: Option<Money>,
    pub resolution: BreakevenResolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// For each stakeholder, the lowest exit at which the payout exceeds its
/// threshold, searched across the supplied valuations and refined by
/// bisection between the first bracketing pair.
pub fn find_breakevens(prepared: &PreparedWaterfall, exit_valuations: &[Money]) -> Vec<BreakevenPoint> {
    let mut valuations: Vec<Money> = exit_valuations.to_vec();
    valuations.sort();
    valuations.dedup();

    let (Some(&lowest), Some(&highest)) = (valuations.first(), valuations.last()) else {
        return Vec::new();
    };

    prepared
        .cap_table()
        .stakeholders
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let threshold = s.cost_basis.unwrap_or(Decimal::ZERO);
            let reached = |exit: Money| prepared.payout_at(i, exit) > threshold;

            let first_hit = valuations.iter().position(|&v| reached(v));
            let (exit_valuation, resolution, note) = match first_hit {
                None => (
                    None,
                    BreakevenResolution::NotReached,
                    Some(format!(
                        "Payout does not exceed {threshold} at any supplied exit up to {highest}"
                    )),
                ),
                Some(0) => (
                    Some(lowest),
                    BreakevenResolution::AtOrBelowMinimum,
                    Some(format!(
                        "Payout already exceeds {threshold} at the lowest supplied exit of {lowest}"
                    )),
                ),
                Some(k) => {
                    let found = bisect(valuations[k - 1], valuations[k], &reached);
                    (Some(found), BreakevenResolution::WithinRange, None)
                }
            };

            BreakevenPoint {
                stakeholder_id: s.id.clone(),
                name: s.name.clone(),
                threshold,
                exit_valuation,
                resolution,
                note,
            }
        })
        .collect()
}

/// Narrow `(lo, hi]` where `reached(lo)` is false and `reached(hi)` is true.
fn bisect(mut lo: Money, mut hi: Money, reached: &impl Fn(Money) -> bool) -> Money {
    let mut steps = 0;
    while hi - lo > SEARCH_PRECISION && steps < MAX_BISECTION_STEPS {
        let mid = (lo + hi) / dec!(2);
        if reached(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
        steps += 1;
    }
    hi
}
