pub mod breakeven;
pub mod engine;

pub use breakeven::{BreakevenPoint, BreakevenResolution};
pub use engine::{
    compute_waterfall, ExitDistribution, PreferenceTier, PreparedWaterfall, StakeholderPayout,
    WaterfallInput, WaterfallOutput, WaterfallPhase, WaterfallStep,
};
