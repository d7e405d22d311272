use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EquityEngineError;
use crate::types::{Money, Rate};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Simple Agreement for Future Equity; no interest.
    Safe,
    /// Debt that converts with simple accrued interest.
    ConvertibleNote,
}

/// A SAFE or convertible note that converts at a priced round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertibleInstrument {
    pub name: String,
    pub kind: InstrumentKind,
    pub principal: Money,
    /// Annual simple interest (notes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<Rate>,
    /// Months elapsed between issuance and conversion (notes only).
    #[serde(default)]
    pub elapsed_months: u32,
    /// Discount to the round price (e.g. 0.20 = 20%).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<Rate>,
    /// Maximum pre-money valuation at which the instrument converts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation_cap: Option<Money>,
}

/// Which term set the conversion price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionMethod {
    ValuationCap,
    Discount,
    RoundPrice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionTerms {
    pub accrued_interest: Money,
    /// Principal plus accrued interest.
    pub conversion_amount: Money,
    /// Pre-money valuation the holder effectively converts at.
    pub conversion_valuation: Money,
    pub method_used: ConversionMethod,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Resolve the terms an instrument converts on at a round priced at `premoney_valuation`.
///
/// The holder gets the lowest of the cap, the discounted round valuation and
/// the round valuation itself.
pub fn conversion_terms(
    instrument: &ConvertibleInstrument,
    premoney_valuation: Money,
) -> EngineResult<ConversionTerms> {
    let accrued_interest = match (instrument.kind, instrument.interest_rate) {
        (InstrumentKind::ConvertibleNote, Some(rate)) => {
            instrument.principal * rate * Decimal::from(instrument.elapsed_months) / dec!(12)
        }
        _ => Decimal::ZERO,
    };
    let conversion_amount = instrument.principal + accrued_interest;

    let mut conversion_valuation = premoney_valuation;
    let mut method_used = ConversionMethod::RoundPrice;

    if let Some(discount) = instrument.discount_rate {
        let discounted = premoney_valuation * (Decimal::ONE - discount);
        if discounted < conversion_valuation {
            conversion_valuation = discounted;
            method_used = ConversionMethod::Discount;
        }
    }
    if let Some(cap) = instrument.valuation_cap {
        if cap < conversion_valuation {
            conversion_valuation = cap;
            method_used = ConversionMethod::ValuationCap;
        }
    }

    if conversion_valuation <= Decimal::ZERO {
        return Err(EquityEngineError::DivisionByZero {
            context: format!("conversion valuation of '{}'", instrument.name),
        });
    }

    Ok(ConversionTerms {
        accrued_interest,
        conversion_amount,
        conversion_valuation,
        method_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn safe(cap: Option<Decimal>, discount: Option<Decimal>) -> ConvertibleInstrument {
        ConvertibleInstrument {
            name: "Seed SAFE".into(),
            kind: InstrumentKind::Safe,
            principal: dec!(500_000),
            interest_rate: None,
            elapsed_months: 0,
            discount_rate: discount,
            valuation_cap: cap,
        }
    }

    #[test]
    fn test_cap_beats_discount() {
        let terms = conversion_terms(&safe(Some(dec!(5_000_000)), Some(dec!(0.20))), dec!(10_000_000))
            .unwrap();
        assert_eq!(terms.conversion_valuation, dec!(5_000_000));
        assert_eq!(terms.method_used, ConversionMethod::ValuationCap);
    }

    #[test]
    fn test_discount_beats_high_cap() {
        let terms =
            conversion_terms(&safe(Some(dec!(20_000_000)), Some(dec!(0.20))), dec!(10_000_000))
                .unwrap();
        assert_eq!(terms.conversion_valuation, dec!(8_000_000));
        assert_eq!(terms.method_used, ConversionMethod::Discount);
    }

    #[test]
    fn test_no_terms_converts_at_round() {
        let terms = conversion_terms(&safe(None, None), dec!(10_000_000)).unwrap();
        assert_eq!(terms.conversion_valuation, dec!(10_000_000));
        assert_eq!(terms.method_used, ConversionMethod::RoundPrice);
        assert_eq!(terms.accrued_interest, Decimal::ZERO);
    }

    #[test]
    fn test_note_accrues_simple_interest() {
        let note = ConvertibleInstrument {
            name: "Bridge note".into(),
            kind: InstrumentKind::ConvertibleNote,
            principal: dec!(1_000_000),
            interest_rate: Some(dec!(0.06)),
            elapsed_months: 18,
            discount_rate: Some(dec!(0.15)),
            valuation_cap: None,
        };
        let terms = conversion_terms(&note, dec!(10_000_000)).unwrap();
        // 1M * 6% * 18/12 = 90k
        assert_eq!(terms.accrued_interest, dec!(90_000));
        assert_eq!(terms.conversion_amount, dec!(1_090_000));
        assert_eq!(terms.conversion_valuation, dec!(8_500_000));
    }
}
