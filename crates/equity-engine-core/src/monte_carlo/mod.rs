pub mod progress;
pub mod simulation;

pub use progress::{Cancellable, CancellationToken, NoProgress, ProgressSink, ProgressUpdate};
pub use simulation::{
    run_monte_carlo, run_monte_carlo_with, DistributionSummary, HistogramBin, McPercentiles,
    MonteCarloInput, MonteCarloOutput, NoiseKind, OfferParameter, Perturbation, SimulationConfig,
    SimulationDraw, TRIAL_CEILING,
};
