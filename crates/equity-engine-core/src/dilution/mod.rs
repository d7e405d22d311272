pub mod convertible;
pub mod preview;
pub mod projector;

pub use convertible::{conversion_terms, ConversionMethod, ConvertibleInstrument, InstrumentKind};
pub use preview::{preview_dilution, PreviewDilutionInput, PreviewDilutionOutput};
pub use projector::{
    apply_round, project_dilution, project_series, DilutionEvent, DilutionInput,
    DilutionProjection, FundingRound, RoundTerms,
};
