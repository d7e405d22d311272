use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dilution::FundingRound;
use crate::types::{Money, Rate};

/// Equity component of an offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
pub enum EquityGrant {
    Rsu {
        /// Fully-vested grant as a fraction of the company
        ownership: Rate,
    },
    StockOptions {
        ownership: Rate,
        /// Strike price × shares for the whole grant
        exercise_cost: Money,
    },
}

impl EquityGrant {
    pub fn ownership(&self) -> Rate {
        match self {
            EquityGrant::Rsu { ownership } | EquityGrant::StockOptions { ownership, .. } => {
                *ownership
            }
        }
    }

    pub fn set_ownership(&mut self, value: Rate) {
        match self {
            EquityGrant::Rsu { ownership } | EquityGrant::StockOptions { ownership, .. } => {
                *ownership = value
            }
        }
    }

    pub fn exercise_cost(&self) -> Money {
        match self {
            EquityGrant::Rsu { .. } => Decimal::ZERO,
            EquityGrant::StockOptions { exercise_cost, .. } => *exercise_cost,
        }
    }
}

/// Cliff plus linear vesting, in whole years.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VestingSchedule {
    #[serde(default = "default_total_years")]
    pub total_years: u32,
    #[serde(default = "default_cliff_years")]
    pub cliff_years: u32,
}

fn default_total_years() -> u32 {
    4
}

fn default_cliff_years() -> u32 {
    1
}

impl Default for VestingSchedule {
    fn default() -> Self {
        Self {
            total_years: default_total_years(),
            cliff_years: default_cliff_years(),
        }
    }
}

impl VestingSchedule {
    /// Fraction of the grant vested after `years` of service.
    pub fn vested_fraction(&self, years: u32) -> Rate {
        if years < self.cliff_years {
            return Decimal::ZERO;
        }
        if self.total_years == 0 || years >= self.total_years {
            return Decimal::ONE;
        }
        Decimal::from(years) / Decimal::from(self.total_years)
    }
}

/// Staying at the current job versus joining the startup, through to an exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferScenario {
    pub current_salary: Money,
    #[serde(default)]
    pub current_salary_growth_rate: Rate,
    pub startup_salary: Money,
    #[serde(default)]
    pub startup_salary_growth_rate: Rate,
    /// Annual return the salary gap would have earned if invested
    #[serde(default)]
    pub investment_return_rate: Rate,
    /// Years from joining to exit, 1–20
    pub exit_year: u32,
    pub equity: EquityGrant,
    #[serde(default)]
    pub vesting: VestingSchedule,
    pub exit_valuation: Money,
    /// Rounds raised between joining and exit, in order
    #[serde(default)]
    pub funding_rounds: Vec<FundingRound>,
}
