use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

const HUNDRED: Decimal = dec!(100);
/// Share-count drift tolerated before a reconciliation warning, as a fraction of total shares.
const SHARE_TOLERANCE: Decimal = dec!(0.0001);
const PCT_EPSILON: Decimal = dec!(0.000001);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeholderType {
    Founder,
    Employee,
    Investor,
    Advisor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareClass {
    Common,
    Preferred,
}

/// A holder on the cap table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stakeholder {
    pub id: String,
    pub name: String,
    /// Fully-diluted ownership, 0–100.
    pub ownership_pct: Decimal,
    pub shares: u64,
    #[serde(rename = "type")]
    pub stakeholder_type: StakeholderType,
    pub share_class: ShareClass,
    /// Amount the holder paid in; used as the breakeven threshold when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_basis: Option<Money>,
}

impl Stakeholder {
    /// Ownership as a 0–1 fraction.
    pub fn ownership_fraction(&self) -> Rate {
        self.ownership_pct / HUNDRED
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapTable {
    pub stakeholders: Vec<Stakeholder>,
    pub total_shares: u64,
    /// Reserved, unallocated option pool, 0–100.
    #[serde(default)]
    pub option_pool_pct: Decimal,
}

impl CapTable {
    pub fn is_empty(&self) -> bool {
        self.stakeholders.is_empty()
    }

    /// Sum of stakeholder ownership, 0–100.
    pub fn allocated_pct(&self) -> Decimal {
        self.stakeholders.iter().map(|s| s.ownership_pct).sum()
    }

    /// Equity neither held by a stakeholder nor reserved for the pool, 0–100.
    pub fn unallocated_pct(&self) -> Decimal {
        (HUNDRED - self.allocated_pct() - self.option_pool_pct).max(Decimal::ZERO)
    }

    /// Reserved pool plus any unallocated remainder, as a 0–1 fraction.
    ///
    /// Exit scenarios assume the whole pool is exercised, so this slice
    /// participates in pro-rata distributions like common stock.
    pub fn pool_fraction(&self) -> Rate {
        (self.option_pool_pct + self.unallocated_pct()) / HUNDRED
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.stakeholders.iter().position(|s| s.id == id)
    }

    /// Flag share/percentage drift without renormalizing anything.
    pub fn reconcile(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.stakeholders.is_empty() {
            return warnings;
        }

        let total = Decimal::from(self.total_shares);
        let tolerance = (total * SHARE_TOLERANCE).max(Decimal::ONE);
        for s in &self.stakeholders {
            let expected = s.ownership_fraction() * total;
            let drift = (Decimal::from(s.shares) - expected).abs();
            if drift > tolerance {
                warnings.push(format!(
                    "Stakeholder '{}' holds {} shares but {}% of {} shares implies {}; \
                     ownership percentages are used for payouts",
                    s.id,
                    s.shares,
                    s.ownership_pct,
                    self.total_shares,
                    expected.round_dp(0)
                ));
            }
        }

        let gap = self.unallocated_pct();
        if gap > PCT_EPSILON {
            warnings.push(format!(
                "Stakeholders ({}%) and option pool ({}%) leave {}% unallocated; \
                 it is treated as part of the option pool",
                self.allocated_pct(),
                self.option_pool_pct,
                gap
            ));
        }

        warnings
    }
}
