use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::validation::Validate;
use crate::EngineResult;

use super::convertible::{conversion_terms, ConversionMethod, ConvertibleInstrument};

// ─── Types ───────────────────────────────────────────────────────────────────

/// How a round dilutes existing holders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "dilution_type", rename_all = "snake_case")]
pub enum RoundTerms {
    /// Every existing holder is diluted by a fixed fraction.
    Direct { dilution_percentage: Rate },
    /// A priced round; dilution follows from the valuation and the raise.
    Valuation {
        premoney_valuation: Money,
        amount_raised: Money,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        convertibles: Vec<ConvertibleInstrument>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRound {
    pub name: String,
    /// Year or sequence index; rounds are applied in the order given.
    pub year: u32,
    #[serde(flatten)]
    pub terms: RoundTerms,
}

/// Ownership a convertible instrument receives when its round closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertibleStake {
    pub name: String,
    pub conversion_amount: Money,
    pub conversion_valuation: Money,
    pub method_used: ConversionMethod,
    pub ownership_pct: Rate,
}

/// Effect of a single round on existing holders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Multiplier applied to every existing holder's ownership.
    pub dilution_factor: Rate,
    pub ownership_after: Rate,
    /// Fraction of the company granted to the round's new investor.
    pub new_investor_pct: Rate,
    pub post_money_valuation: Option<Money>,
    pub convertible_stakes: Vec<ConvertibleStake>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DilutionEvent {
    pub round: String,
    pub year: u32,
    pub dilution_factor: Rate,
    pub amount_raised: Money,
    pub new_investor_pct: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_money_valuation: Option<Money>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub convertible_stakes: Vec<ConvertibleStake>,
    pub cumulative_ownership: Rate,
    /// `1 - equity_remaining` after this round.
    pub cumulative_dilution_pct: Rate,
}

/// Input for a multi-round projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DilutionInput {
    /// Starting ownership as a 0–1 fraction.
    pub initial_ownership: Rate,
    pub funding_rounds: Vec<FundingRound>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DilutionProjection {
    pub dilution_events: Vec<DilutionEvent>,
    /// Fraction of the starting stake still held after every round, in [0, 1].
    pub equity_remaining_pct: Rate,
    pub final_ownership: Rate,
}

/// A priced-round investor's stake carried through every later round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestorStake {
    pub round: String,
    pub amount_raised: Money,
    pub final_ownership: Rate,
}

impl DilutionProjection {
    /// Ownership each priced round's investor holds once all later rounds are applied.
    pub fn investor_stakes(&self) -> Vec<InvestorStake> {
        let events = &self.dilution_events;
        events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.new_investor_pct > Decimal::ZERO)
            .map(|(i, e)| {
                let later: Decimal = events[i + 1..].iter().map(|l| l.dilution_factor).product();
                InvestorStake {
                    round: e.round.clone(),
                    amount_raised: e.amount_raised,
                    final_ownership: e.new_investor_pct * later,
                }
            })
            .collect()
    }
}

// ─── Core ────────────────────────────────────────────────────────────────────

/// Apply one round to a holder's prior ownership.
///
/// Priced rounds grant the investor `raised / post` and any converting
/// instruments `amount × pre / conversion_valuation / post`, where `post`
/// is the post-money including conversions at the round price.
pub fn apply_round(prior_ownership: Rate, round: &FundingRound) -> EngineResult<RoundOutcome> {
    match &round.terms {
        RoundTerms::Direct {
            dilution_percentage,
        } => {
            let factor = Decimal::ONE - dilution_percentage;
            Ok(RoundOutcome {
                dilution_factor: factor,
                ownership_after: prior_ownership * factor,
                new_investor_pct: Decimal::ZERO,
                post_money_valuation: None,
                convertible_stakes: Vec::new(),
            })
        }
        RoundTerms::Valuation {
            premoney_valuation,
            amount_raised,
            convertibles,
        } => {
            let pre = *premoney_valuation;
            let mut converted = Vec::with_capacity(convertibles.len());
            let mut conversion_value = Decimal::ZERO;
            for instrument in convertibles {
                let terms = conversion_terms(instrument, pre)?;
                // Value of the conversion shares priced at the round.
                let at_round = terms.conversion_amount * pre / terms.conversion_valuation;
                conversion_value += at_round;
                converted.push((instrument.name.clone(), terms, at_round));
            }

            let effective_post = pre + amount_raised + conversion_value;
            let factor = pre / effective_post;
            let convertible_stakes = converted
                .into_iter()
                .map(|(name, terms, at_round)| ConvertibleStake {
                    name,
                    conversion_amount: terms.conversion_amount,
                    conversion_valuation: terms.conversion_valuation,
                    method_used: terms.method_used,
                    ownership_pct: at_round / effective_post,
                })
                .collect();

            Ok(RoundOutcome {
                dilution_factor: factor,
                ownership_after: prior_ownership * factor,
                new_investor_pct: amount_raised / effective_post,
                post_money_valuation: Some(pre + amount_raised),
                convertible_stakes,
            })
        }
    }
}

/// Apply rounds sequentially in the order given, compounding on the
/// post-round state each time.
pub fn project_series(
    initial_ownership: Rate,
    rounds: &[FundingRound],
) -> EngineResult<DilutionProjection> {
    let mut ownership = initial_ownership;
    let mut equity_remaining = Decimal::ONE;
    let mut dilution_events = Vec::with_capacity(rounds.len());

    for round in rounds {
        let outcome = apply_round(ownership, round)?;
        ownership = outcome.ownership_after;
        equity_remaining *= outcome.dilution_factor;

        let amount_raised = match &round.terms {
            RoundTerms::Valuation { amount_raised, .. } => *amount_raised,
            RoundTerms::Direct { .. } => Decimal::ZERO,
        };

        dilution_events.push(DilutionEvent {
            round: round.name.clone(),
            year: round.year,
            dilution_factor: outcome.dilution_factor,
            amount_raised,
            new_investor_pct: outcome.new_investor_pct,
            post_money_valuation: outcome.post_money_valuation,
            convertible_stakes: outcome.convertible_stakes,
            cumulative_ownership: ownership,
            cumulative_dilution_pct: Decimal::ONE - equity_remaining,
        });
    }

    Ok(DilutionProjection {
        dilution_events,
        equity_remaining_pct: equity_remaining,
        final_ownership: ownership,
    })
}

/// Project ownership erosion across an ordered sequence of funding rounds.
pub fn project_dilution(
    input: &DilutionInput,
) -> EngineResult<ComputationOutput<DilutionProjection>> {
    let start = Instant::now();
    input.validate()?;
    let mut warnings: Vec<String> = Vec::new();

    if input
        .funding_rounds
        .windows(2)
        .any(|pair| pair[1].year < pair[0].year)
    {
        warnings.push(
            "Funding rounds are not in ascending year order; they are applied in the order given"
                .into(),
        );
    }

    let projection = project_series(input.initial_ownership, &input.funding_rounds)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Sequential Dilution Projection",
        &serde_json::json!({
            "initial_ownership": input.initial_ownership.to_string(),
            "num_rounds": input.funding_rounds.len(),
            "round_names": input.funding_rounds.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        }),
        warnings,
        elapsed,
        projection,
    ))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
