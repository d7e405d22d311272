pub mod pipeline;
pub mod scenario;

pub use pipeline::{evaluate, evaluate_offer, OfferOutcome, YearBreakdown};
pub use scenario::{EquityGrant, OfferScenario, VestingSchedule};
