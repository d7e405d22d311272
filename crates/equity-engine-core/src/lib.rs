pub mod boundary;
pub mod cap_table;
pub mod error;
pub mod time_value;
pub mod types;
pub mod validation;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "dilution")]
pub mod dilution;

#[cfg(feature = "waterfall")]
pub mod waterfall;

#[cfg(feature = "offer")]
pub mod offer;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

pub use error::EquityEngineError;
pub use types::*;

/// Standard result type for all equity-engine operations
pub type EngineResult<T> = Result<T, EquityEngineError>;
