use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::cap_table::{CapTable, ShareClass};
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::validation::Validate;
use crate::EngineResult;

use super::breakeven::{find_breakevens, BreakevenPoint};

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// A layer of liquidation preference held by one or more stakeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceTier {
    pub id: String,
    pub name: String,
    /// 1 = paid first; equal values are paid pari passu
    pub seniority: u32,
    pub investment_amount: Money,
    /// Preference multiple on the investment (typically 1.0 - 3.0)
    pub liquidation_multiplier: Multiple,
    /// Whether the tier also shares in the remainder after its preference
    pub participating: bool,
    /// Stakeholders holding this tier's preferred shares
    pub stakeholder_ids: Vec<String>,
}

impl PreferenceTier {
    /// Preference claim: investment × multiplier.
    pub fn claim(&self) -> Money {
        self.investment_amount * self.liquidation_multiplier
    }
}

/// Input for a liquidation waterfall across one or more exit valuations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallInput {
    pub cap_table: CapTable,
    #[serde(default)]
    pub preference_tiers: Vec<PreferenceTier>,
    pub exit_valuations: Vec<Money>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterfallPhase {
    PreferencePayout,
    Conversion,
    ProRataDistribution,
}

/// Order in which phases appear in the audit trail.
pub const PHASES: [WaterfallPhase; 3] = [
    WaterfallPhase::PreferencePayout,
    WaterfallPhase::Conversion,
    WaterfallPhase::ProRataDistribution,
];

/// One audit-trail record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallStep {
    pub phase: WaterfallPhase,
    pub description: String,
    /// Amount distributed (or, for conversion decisions, the preference at stake)
    pub amount: Money,
    /// Proceeds left undistributed immediately after this step
    pub remaining_proceeds: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierOutcome {
    pub tier_id: String,
    pub name: String,
    pub seniority: u32,
    pub claim: Money,
    pub preference_paid: Money,
    pub participating: bool,
    /// Non-participating tier that took its as-converted common share instead
    pub converted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeholderPayout {
    pub stakeholder_id: String,
    pub name: String,
    pub preference_payout: Money,
    pub participation_payout: Money,
    pub total_payout: Money,
    /// Share of the exit valuation (decimal)
    pub share_of_exit: Rate,
}

/// Full distribution of a single exit valuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitDistribution {
    pub exit_valuation: Money,
    pub steps: Vec<WaterfallStep>,
    pub tier_outcomes: Vec<TierOutcome>,
    pub stakeholder_payouts: Vec<StakeholderPayout>,
    /// Paid to the reserved and unallocated option pool, assumed fully exercised
    pub option_pool_payout: Money,
    pub total_distributed: Money,
    /// Left over only when nobody is eligible for the remainder
    pub undistributed: Money,
}

impl ExitDistribution {
    pub fn payout_of(&self, stakeholder_id: &str) -> Option<Money> {
        self.stakeholder_payouts
            .iter()
            .find(|p| p.stakeholder_id == stakeholder_id)
            .map(|p| p.total_payout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallOutput {
    pub distributions_by_valuation: Vec<ExitDistribution>,
    pub breakeven_points: Vec<BreakevenPoint>,
}

// ---------------------------------------------------------------------------
// Prepared waterfall
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Tier {
    source: PreferenceTier,
    claim: Money,
    members: Vec<usize>,
    /// Members' ownership fractions, used to split the tier's payments
    weights: Vec<Decimal>,
    /// Sum of `weights`: the tier's as-converted ownership
    total_weight: Decimal,
}

/// A cap table and preference stack resolved once, ready to distribute any
/// number of exit valuations.
#[derive(Debug, Clone)]
pub struct PreparedWaterfall {
    cap_table: CapTable,
    ownership: Vec<Rate>,
    pool: Rate,
    /// Tiers in ascending seniority, stable with respect to input order
    tiers: Vec<Tier>,
    /// Half-open index ranges into `tiers`, one per seniority value
    groups: Vec<(usize, usize)>,
    /// For each stakeholder, the tiers it holds
    holdings: Vec<Vec<usize>>,
}

/// Result of one pass through the preference and pro-rata phases with a
/// fixed set of conversion decisions.
#[derive(Debug, Clone)]
struct Settlement {
    tier_paid: Vec<Money>,
    preference: Vec<Money>,
    participation: Vec<Money>,
    pool: Money,
    group_paid: Vec<Money>,
    after_preferences: Money,
    undistributed: Money,
}

impl Settlement {
    fn holder_total(&self, members: &[usize]) -> Money {
        members
            .iter()
            .map(|&i| self.preference[i] + self.participation[i])
            .sum()
    }
}

struct ConversionDecision {
    tier: usize,
    converted: bool,
    preference_at_stake: Money,
    as_converted: Money,
}

impl PreparedWaterfall {
    /// Resolve tier membership and seniority groups. Unknown stakeholder ids
    /// are ignored here; validation rejects them before this point.
    pub fn new(cap_table: &CapTable, preference_tiers: &[PreferenceTier]) -> Self {
        let ownership: Vec<Rate> = cap_table
            .stakeholders
            .iter()
            .map(|s| s.ownership_fraction())
            .collect();

        let mut sorted: Vec<&PreferenceTier> = preference_tiers.iter().collect();
        sorted.sort_by_key(|t| t.seniority);

        let tiers: Vec<Tier> = sorted
            .into_iter()
            .map(|t| {
                let members: Vec<usize> = t
                    .stakeholder_ids
                    .iter()
                    .filter_map(|id| cap_table.index_of(id))
                    .collect();
                let weights: Vec<Decimal> = members.iter().map(|&i| ownership[i]).collect();
                let total_weight = weights.iter().copied().sum();
                Tier {
                    claim: t.claim(),
                    source: t.clone(),
                    members,
                    weights,
                    total_weight,
                }
            })
            .collect();

        let mut groups = Vec::new();
        let mut begin = 0;
        for end in 1..=tiers.len() {
            if end == tiers.len() || tiers[end].source.seniority != tiers[begin].source.seniority {
                groups.push((begin, end));
                begin = end;
            }
        }

        let mut holdings = vec![Vec::new(); ownership.len()];
        for (t, tier) in tiers.iter().enumerate() {
            for &i in &tier.members {
                if !holdings[i].contains(&t) {
                    holdings[i].push(t);
                }
            }
        }

        Self {
            cap_table: cap_table.clone(),
            ownership,
            pool: cap_table.pool_fraction(),
            tiers,
            groups,
            holdings,
        }
    }

    pub fn cap_table(&self) -> &CapTable {
        &self.cap_table
    }

    /// Preferred stakeholders that hold no tier and therefore rank as common.
    pub fn untiered_preferred(&self) -> Vec<&str> {
        self.cap_table
            .stakeholders
            .iter()
            .zip(&self.holdings)
            .filter(|(s, held)| s.share_class == ShareClass::Preferred && held.is_empty())
            .map(|(s, _)| s.id.as_str())
            .collect()
    }

    /// Distribute one exit valuation: preference payout, conversion
    /// decisions, then the pro-rata remainder.
    pub fn distribute(&self, exit_valuation: Money) -> ExitDistribution {
        let mut converted = vec![false; self.tiers.len()];
        let mut current = self.settle(exit_valuation, &converted);
        let decisions = self.decide_conversions(exit_valuation, &mut converted, &mut current);
        self.render(exit_valuation, &converted, &current, &decisions)
    }

    /// Total payout of one stakeholder at `exit_valuation`.
    pub fn payout_at(&self, stakeholder: usize, exit_valuation: Money) -> Money {
        let mut converted = vec![false; self.tiers.len()];
        let mut current = self.settle(exit_valuation, &converted);
        self.decide_conversions(exit_valuation, &mut converted, &mut current);
        current.preference[stakeholder] + current.participation[stakeholder]
    }

    // ── Conversion ──────────────────────────────────────────────────────

    /// Offer conversion to non-participating tiers, cheapest preference per
    /// unit of ownership first. A tier converts only when its holders end up
    /// strictly better off; the first refusal ends the pass since every
    /// later candidate gives up more per unit.
    fn decide_conversions(
        &self,
        exit_valuation: Money,
        converted: &mut [bool],
        current: &mut Settlement,
    ) -> Vec<ConversionDecision> {
        let mut decisions = Vec::new();
        let mut pending: Vec<usize> = (0..self.tiers.len())
            .filter(|&t| !self.tiers[t].source.participating)
            .collect();

        while !pending.is_empty() {
            let (pos, &t) = match pending.iter().enumerate().min_by(|a, b| {
                self.preference_per_unit(current, *a.1)
                    .cmp(&self.preference_per_unit(current, *b.1))
            }) {
                Some(found) => found,
                None => break,
            };
            pending.remove(pos);

            let tier = &self.tiers[t];
            let as_preferred = current.holder_total(&tier.members);
            let mut trial = converted.to_vec();
            trial[t] = true;
            let alternative = self.settle(exit_valuation, &trial);
            let as_converted = alternative.holder_total(&tier.members);

            let converts = !tier.members.is_empty() && as_converted > as_preferred;
            log::debug!(
                "waterfall: exit {exit_valuation} tier '{}' preferred={as_preferred} converted={as_converted} -> {}",
                tier.source.id,
                if converts { "convert" } else { "keep preference" }
            );
            decisions.push(ConversionDecision {
                tier: t,
                converted: converts,
                preference_at_stake: current.tier_paid[t],
                as_converted,
            });

            if !converts {
                for &rest in &pending {
                    decisions.push(ConversionDecision {
                        tier: rest,
                        converted: false,
                        preference_at_stake: current.tier_paid[rest],
                        as_converted: Decimal::ZERO,
                    });
                }
                break;
            }
            converted[t] = true;
            *current = alternative;
        }
        decisions
    }

    fn preference_per_unit(&self, settlement: &Settlement, t: usize) -> Decimal {
        let weight = self.tiers[t].total_weight;
        if weight.is_zero() {
            Decimal::MAX
        } else {
            settlement.tier_paid[t] / weight
        }
    }

    // ── Settlement ──────────────────────────────────────────────────────

    fn settle(&self, exit_valuation: Money, converted: &[bool]) -> Settlement {
        let n = self.ownership.len();
        let mut tier_paid = vec![Decimal::ZERO; self.tiers.len()];
        let mut preference = vec![Decimal::ZERO; n];
        let mut group_paid = Vec::with_capacity(self.groups.len());
        let mut remaining = exit_valuation;

        // Preference payout, one seniority group at a time.
        for &(begin, end) in &self.groups {
            let active: Vec<usize> = (begin..end).filter(|&t| !converted[t]).collect();
            let total_claim: Money = active.iter().map(|&t| self.tiers[t].claim).sum();

            let paid_total = if remaining >= total_claim {
                for &t in &active {
                    tier_paid[t] = self.tiers[t].claim;
                }
                total_claim
            } else {
                // Pari passu shortfall: split by claim.
                let claims: Vec<Decimal> = active.iter().map(|&t| self.tiers[t].claim).collect();
                for (&t, share) in active.iter().zip(split_pro_rata(remaining, &claims)) {
                    tier_paid[t] = share;
                }
                remaining
            };
            remaining -= paid_total;
            group_paid.push(paid_total);

            for &t in &active {
                let tier = &self.tiers[t];
                let shares = if tier.total_weight.is_zero() {
                    split_evenly(tier_paid[t], tier.members.len())
                } else {
                    split_pro_rata(tier_paid[t], &tier.weights)
                };
                for (&i, share) in tier.members.iter().zip(shares) {
                    preference[i] += share;
                }
            }
        }
        let after_preferences = remaining;

        // Pro-rata remainder: common, participating and converted holders, plus the pool.
        let eligible: Vec<usize> = (0..n)
            .filter(|&i| {
                let held = &self.holdings[i];
                held.is_empty()
                    || held
                        .iter()
                        .any(|&t| self.tiers[t].source.participating || converted[t])
            })
            .collect();
        let mut weights: Vec<Decimal> = eligible.iter().map(|&i| self.ownership[i]).collect();
        weights.push(self.pool);

        let mut participation = vec![Decimal::ZERO; n];
        let mut pool = Decimal::ZERO;
        let total_weight: Decimal = weights.iter().copied().sum();
        let undistributed = if total_weight.is_zero() || remaining.is_zero() {
            remaining
        } else {
            let mut shares = split_pro_rata(remaining, &weights);
            pool = shares.pop().unwrap_or_default();
            for (&i, share) in eligible.iter().zip(shares) {
                participation[i] = share;
            }
            Decimal::ZERO
        };

        Settlement {
            tier_paid,
            preference,
            participation,
            pool,
            group_paid,
            after_preferences,
            undistributed,
        }
    }

    // ── Rendering ───────────────────────────────────────────────────────

    fn render(
        &self,
        exit_valuation: Money,
        converted: &[bool],
        settlement: &Settlement,
        decisions: &[ConversionDecision],
    ) -> ExitDistribution {
        let mut steps = Vec::new();
        for phase in PHASES {
            match phase {
                WaterfallPhase::PreferencePayout => {
                    let mut remaining = exit_valuation;
                    for (g, &(begin, end)) in self.groups.iter().enumerate() {
                        let names = (begin..end)
                            .map(|t| {
                                if converted[t] {
                                    format!("{} (converted)", self.tiers[t].source.name)
                                } else {
                                    self.tiers[t].source.name.clone()
                                }
                            })
                            .collect::<Vec<_>>()
                            .join(", ");
                        let paid = settlement.group_paid[g];
                        remaining -= paid;
                        steps.push(WaterfallStep {
                            phase,
                            description: format!(
                                "{names} liquidation preference (seniority {})",
                                self.tiers[begin].source.seniority
                            ),
                            amount: paid,
                            remaining_proceeds: remaining,
                        });
                    }
                }
                WaterfallPhase::Conversion => {
                    for d in decisions {
                        let name = &self.tiers[d.tier].source.name;
                        let description = if d.converted {
                            format!(
                                "{name} converts to common: {} as converted beats {} preference",
                                d.as_converted, d.preference_at_stake
                            )
                        } else {
                            format!("{name} keeps its {} preference", d.preference_at_stake)
                        };
                        steps.push(WaterfallStep {
                            phase,
                            description,
                            amount: d.preference_at_stake,
                            remaining_proceeds: settlement.after_preferences,
                        });
                    }
                }
                WaterfallPhase::ProRataDistribution => {
                    steps.push(WaterfallStep {
                        phase,
                        description: "Pro-rata distribution of remaining proceeds".into(),
                        amount: settlement.after_preferences - settlement.undistributed,
                        remaining_proceeds: settlement.undistributed,
                    });
                }
            }
        }

        let tier_outcomes = self
            .tiers
            .iter()
            .enumerate()
            .map(|(t, tier)| TierOutcome {
                tier_id: tier.source.id.clone(),
                name: tier.source.name.clone(),
                seniority: tier.source.seniority,
                claim: tier.claim,
                preference_paid: settlement.tier_paid[t],
                participating: tier.source.participating,
                converted: converted[t],
            })
            .collect();

        let stakeholder_payouts: Vec<StakeholderPayout> = self
            .cap_table
            .stakeholders
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let total = settlement.preference[i] + settlement.participation[i];
                StakeholderPayout {
                    stakeholder_id: s.id.clone(),
                    name: s.name.clone(),
                    preference_payout: settlement.preference[i],
                    participation_payout: settlement.participation[i],
                    total_payout: total,
                    share_of_exit: if exit_valuation.is_zero() {
                        Decimal::ZERO
                    } else {
                        total / exit_valuation
                    },
                }
            })
            .collect();

        let total_distributed =
            stakeholder_payouts.iter().map(|p| p.total_payout).sum::<Decimal>() + settlement.pool;

        ExitDistribution {
            exit_valuation,
            steps,
            tier_outcomes,
            stakeholder_payouts,
            option_pool_payout: settlement.pool,
            total_distributed,
            undistributed: settlement.undistributed,
        }
    }
}

/// Split `amount` in proportion to `weights`; the last positive weight takes
/// the rounding residual so the parts sum to `amount` exactly.
fn split_pro_rata(amount: Money, weights: &[Decimal]) -> Vec<Money> {
    let total: Decimal = weights.iter().copied().sum();
    if total.is_zero() {
        return vec![Decimal::ZERO; weights.len()];
    }
    let mut parts: Vec<Money> = weights.iter().map(|w| amount * *w / total).collect();
    if let Some(last) = weights.iter().rposition(|w| !w.is_zero()) {
        let others: Money = parts
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != last)
            .map(|(_, p)| *p)
            .sum();
        parts[last] = amount - others;
    }
    parts
}

fn split_evenly(amount: Money, count: usize) -> Vec<Money> {
    split_pro_rata(amount, &vec![Decimal::ONE; count])
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Distribute each exit valuation through the preference stack and locate
/// every stakeholder's breakeven exit.
pub fn compute_waterfall(
    input: &WaterfallInput,
) -> EngineResult<ComputationOutput<WaterfallOutput>> {
    let start = Instant::now();
    input.validate()?;

    if input.cap_table.is_empty() {
        let elapsed = start.elapsed().as_micros() as u64;
        return Ok(with_metadata(
            "Liquidation Preference Waterfall",
            &serde_json::json!({ "stakeholders": 0 }),
            Vec::new(),
            elapsed,
            WaterfallOutput {
                distributions_by_valuation: Vec::new(),
                breakeven_points: Vec::new(),
            },
        ));
    }

    let mut warnings = input.cap_table.reconcile();
    let prepared = PreparedWaterfall::new(&input.cap_table, &input.preference_tiers);
    for id in prepared.untiered_preferred() {
        warnings.push(format!(
            "Preferred stakeholder '{id}' holds no preference tier and is treated as common"
        ));
    }

    let distributions_by_valuation: Vec<ExitDistribution> = input
        .exit_valuations
        .iter()
        .map(|&exit| prepared.distribute(exit))
        .collect();
    let breakeven_points = find_breakevens(&prepared, &input.exit_valuations);

    let output = WaterfallOutput {
        distributions_by_valuation,
        breakeven_points,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Liquidation Preference Waterfall",
        &serde_json::json!({
            "stakeholders": input.cap_table.stakeholders.len(),
            "preference_tiers": input.preference_tiers.len(),
            "exit_valuations": input.exit_valuations.len(),
            "option_pool": "Reserved and unallocated option pool participates pro-rata as if fully exercised",
            "non_participating": "Holders take the greater of preference or as-converted common",
            "pari_passu": "Tiers with equal seniority share shortfalls pro-rata by claim",
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
