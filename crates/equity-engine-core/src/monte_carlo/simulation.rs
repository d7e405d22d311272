use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Normal, Uniform};
use std::time::{Duration, Instant};

use crate::error::EquityEngineError;
use crate::offer::{evaluate, OfferScenario};
use crate::types::{with_precision, ComputationOutput, FLOAT_PRECISION};
use crate::validation::Validate;
use crate::EngineResult;

use super::progress::{Cancellable, CancellationToken, NoProgress, ProgressSink, ProgressTracker};

/// Absolute cap on trials per request, whatever the configuration says.
pub const TRIAL_CEILING: u32 = 1_000_000;

const SPLITMIX_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Scenario inputs that can be perturbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferParameter {
    CurrentSalary,
    CurrentSalaryGrowthRate,
    StartupSalary,
    StartupSalaryGrowthRate,
    InvestmentReturnRate,
    ExitValuation,
    EquityOwnership,
}

impl OfferParameter {
    /// Whether a negative value is economically impossible and clamps to zero.
    fn non_negative(self) -> bool {
        matches!(
            self,
            OfferParameter::CurrentSalary
                | OfferParameter::StartupSalary
                | OfferParameter::ExitValuation
                | OfferParameter::EquityOwnership
        )
    }

    fn get(self, s: &OfferScenario) -> Decimal {
        match self {
            OfferParameter::CurrentSalary => s.current_salary,
            OfferParameter::CurrentSalaryGrowthRate => s.current_salary_growth_rate,
            OfferParameter::StartupSalary => s.startup_salary,
            OfferParameter::StartupSalaryGrowthRate => s.startup_salary_growth_rate,
            OfferParameter::InvestmentReturnRate => s.investment_return_rate,
            OfferParameter::ExitValuation => s.exit_valuation,
            OfferParameter::EquityOwnership => s.equity.ownership(),
        }
    }

    fn set(self, s: &mut OfferScenario, value: Decimal) {
        match self {
            OfferParameter::CurrentSalary => s.current_salary = value,
            OfferParameter::CurrentSalaryGrowthRate => s.current_salary_growth_rate = value,
            OfferParameter::StartupSalary => s.startup_salary = value,
            OfferParameter::StartupSalaryGrowthRate => s.startup_salary_growth_rate = value,
            OfferParameter::InvestmentReturnRate => s.investment_return_rate = value,
            OfferParameter::ExitValuation => s.exit_valuation = value,
            OfferParameter::EquityOwnership => s.equity.set_ownership(value.min(Decimal::ONE)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    /// Multiplier drawn from U(1 − v, 1 + v)
    #[default]
    Uniform,
    /// Multiplier drawn from N(1, v)
    Normal,
}

/// Relative noise applied to one parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Perturbation {
    pub parameter: OfferParameter,
    /// Relative volatility (0.2 = ±20% uniform, or σ = 20% normal)
    pub volatility: f64,
    #[serde(default)]
    pub noise: NoiseKind,
}

/// Latency and memory bounds for a simulation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default = "default_max_trials")]
    pub max_trials: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: usize,
}

fn default_parallel() -> bool {
    true
}

fn default_max_trials() -> u32 {
    100_000
}

fn default_histogram_buckets() -> usize {
    20
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            max_trials: default_max_trials(),
            timeout_ms: None,
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

/// Input for a Monte Carlo run over the offer pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloInput {
    pub base: OfferScenario,
    #[serde(default = "default_trial_count")]
    pub trial_count: u32,
    #[serde(default)]
    pub perturbations: Vec<Perturbation>,
    /// Batch seed; per-trial seeds are derived from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub config: SimulationConfig,
}

fn default_trial_count() -> u32 {
    1_000
}

/// Percentile summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McPercentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

/// A single histogram bin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
    pub frequency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: McPercentiles,
}

/// One trial's outcome triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationDraw {
    pub net_outcome: f64,
    pub npv: f64,
    pub equity_payout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloOutput {
    pub trials_requested: u32,
    pub trials_succeeded: u32,
    pub trials_failed: u32,
    pub seed: u64,
    /// Net outcome distribution
    pub percentiles: McPercentiles,
    pub mean: f64,
    pub std_dev: f64,
    /// 5th percentile of net outcome
    pub var_5: f64,
    /// Fraction of successful trials with a positive net outcome
    pub success_probability: f64,
    pub histogram: Vec<HistogramBin>,
    /// The unperturbed scenario
    pub base_case: SimulationDraw,
    pub npv_summary: DistributionSummary,
    pub equity_payout_summary: DistributionSummary,
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Sampler {
    Uniform(Uniform),
    Normal(Normal),
}

impl Sampler {
    /// `None` when the volatility is zero and the parameter stays fixed.
    fn new(p: &Perturbation) -> EngineResult<Option<Self>> {
        if p.volatility == 0.0 {
            return Ok(None);
        }
        let invalid = |reason: String| EquityEngineError::InvalidInput {
            field: "perturbations.volatility".into(),
            reason,
        };
        let sampler = match p.noise {
            NoiseKind::Uniform => Sampler::Uniform(
                Uniform::new(1.0 - p.volatility, 1.0 + p.volatility)
                    .map_err(|e| invalid(format!("Invalid uniform noise: {e}")))?,
            ),
            NoiseKind::Normal => Sampler::Normal(
                Normal::new(1.0, p.volatility)
                    .map_err(|e| invalid(format!("Invalid normal noise: {e}")))?,
            ),
        };
        Ok(Some(sampler))
    }

    fn multiplier(&self, rng: &mut StdRng) -> f64 {
        match self {
            Sampler::Uniform(d) => rng.sample(d),
            Sampler::Normal(d) => rng.sample(d),
        }
    }
}

/// SplitMix64 step: decorrelates consecutive per-trial seeds.
fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(SPLITMIX_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn trial_seed(batch_seed: u64, trial: u32) -> u64 {
    splitmix64(batch_seed.wrapping_add((trial as u64).wrapping_mul(SPLITMIX_GAMMA)))
}

/// Build one perturbed scenario. Each parameter draws from its own stream
/// position; non-negative parameters are clamped rather than sign-flipped.
fn perturb(
    base: &OfferScenario,
    samplers: &[(OfferParameter, Sampler)],
    rng: &mut StdRng,
) -> EngineResult<(OfferScenario, u32)> {
    let mut scenario = base.clone();
    let mut clamped = 0;
    for (parameter, sampler) in samplers {
        let multiplier = sampler.multiplier(rng);
        let original = parameter.get(base).to_f64().ok_or_else(|| {
            EquityEngineError::FinancialImpossibility(format!("{parameter:?} is not representable as f64"))
        })?;
        let mut value = original * multiplier;
        if parameter.non_negative() && value < 0.0 {
            value = 0.0;
            clamped += 1;
        }
        let value = Decimal::from_f64(value).ok_or_else(|| {
            EquityEngineError::FinancialImpossibility(format!("Perturbed {parameter:?} is out of range"))
        })?;
        parameter.set(&mut scenario, value);
    }
    Ok((scenario, clamped))
}

fn draw_from(scenario: &OfferScenario) -> EngineResult<SimulationDraw> {
    let outcome = evaluate(scenario)?;
    let to_f64 = |d: Decimal| d.to_f64().unwrap_or(f64::NAN);
    let draw = SimulationDraw {
        net_outcome: to_f64(outcome.net_outcome),
        npv: to_f64(outcome.npv),
        equity_payout: to_f64(outcome.equity_payout),
    };
    if !(draw.net_outcome.is_finite() && draw.npv.is_finite() && draw.equity_payout.is_finite()) {
        return Err(EquityEngineError::FinancialImpossibility(
            "Trial outcome is not a finite number".into(),
        ));
    }
    Ok(draw)
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Compute the percentile value from a **sorted** slice using linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Build a histogram with `num_bins` equal-width bins over a sorted, non-empty slice.
fn build_histogram(sorted: &[f64], num_bins: usize) -> Vec<HistogramBin> {
    let min_val = sorted[0];
    let max_val = sorted[sorted.len() - 1];

    // All values identical: one bin holds everything
    if (max_val - min_val).abs() <= f64::EPSILON * min_val.abs().max(1.0) {
        return vec![HistogramBin {
            lower: min_val,
            upper: max_val,
            count: sorted.len() as u32,
            frequency: 1.0,
        }];
    }

    let bin_width = (max_val - min_val) / num_bins as f64;
    let n = sorted.len() as f64;

    let mut bins: Vec<HistogramBin> = (0..num_bins)
        .map(|i| {
            let lower = min_val + i as f64 * bin_width;
            let upper = if i == num_bins - 1 {
                max_val
            } else {
                min_val + (i + 1) as f64 * bin_width
            };
            HistogramBin {
                lower,
                upper,
                count: 0,
                frequency: 0.0,
            }
        })
        .collect();

    for &val in sorted {
        let idx = (((val - min_val) / bin_width).floor() as usize).min(num_bins - 1);
        bins[idx].count += 1;
    }

    for bin in &mut bins {
        bin.frequency = bin.count as f64 / n;
    }

    bins
}

fn sort_f64(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

/// Population statistics of a sorted, non-empty slice.
fn summarize(sorted: &[f64]) -> DistributionSummary {
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    DistributionSummary {
        mean,
        std_dev: variance.sqrt(),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        percentiles: McPercentiles {
            p5: percentile_sorted(sorted, 5.0),
            p10: percentile_sorted(sorted, 10.0),
            p25: percentile_sorted(sorted, 25.0),
            p50: percentile_sorted(sorted, 50.0),
            p75: percentile_sorted(sorted, 75.0),
            p90: percentile_sorted(sorted, 90.0),
            p95: percentile_sorted(sorted, 95.0),
        },
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

enum Trial {
    Done(SimulationDraw, u32),
    Failed,
    Aborted,
}

/// Run a Monte Carlo simulation with no progress reporting or cancellation.
pub fn run_monte_carlo(input: &MonteCarloInput) -> EngineResult<ComputationOutput<MonteCarloOutput>> {
    run_monte_carlo_with(input, &NoProgress, &CancellationToken::new())
}

/// Re-evaluate the offer pipeline over `trial_count` independently perturbed
/// scenarios and aggregate the outcome distribution.
///
/// Every trial owns an RNG seeded from the batch seed and its index, so
/// results are identical whether trials run sequentially or in parallel.
/// Trials that fail are excluded and counted. Cancellation, or an elapsed
/// timeout, discards all partial results.
pub fn run_monte_carlo_with(
    input: &MonteCarloInput,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> EngineResult<ComputationOutput<MonteCarloOutput>> {
    let start = Instant::now();
    input.validate()?;
    let mut warnings: Vec<String> = Vec::new();

    let samplers: Vec<(OfferParameter, Sampler)> = input
        .perturbations
        .iter()
        .map(|p| Sampler::new(p).map(|s| s.map(|s| (p.parameter, s))))
        .collect::<EngineResult<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();

    let base_case = draw_from(&input.base)?;
    let seed = input.seed.unwrap_or_else(rand::random);
    let deadline = input
        .config
        .timeout_ms
        .map(|ms| start + Duration::from_millis(ms));
    let tracker = ProgressTracker::new(progress, input.trial_count as u64);

    log::info!(
        "monte carlo: starting {} trials (seed {seed}, parallel={})",
        input.trial_count,
        input.config.parallel
    );

    let run_trial = |trial: u32| -> Trial {
        if cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
            return Trial::Aborted;
        }
        let mut rng = StdRng::seed_from_u64(trial_seed(seed, trial));
        let result = perturb(&input.base, &samplers, &mut rng)
            .and_then(|(scenario, clamped)| draw_from(&scenario).map(|d| (d, clamped)));
        tracker.trial_finished();
        match result {
            Ok((draw, clamped)) => Trial::Done(draw, clamped),
            Err(e) => {
                log::debug!("monte carlo: trial {trial} excluded: {e}");
                Trial::Failed
            }
        }
    };

    let trials: Vec<Trial> = if input.config.parallel {
        (0..input.trial_count).into_par_iter().map(run_trial).collect()
    } else {
        (0..input.trial_count).map(run_trial).collect()
    };

    if cancel.is_cancelled() || trials.iter().any(|t| matches!(t, Trial::Aborted)) {
        log::info!("monte carlo: batch cancelled after {:?}", start.elapsed());
        return Err(EquityEngineError::Cancelled);
    }

    let mut net = Vec::with_capacity(trials.len());
    let mut npv = Vec::with_capacity(trials.len());
    let mut payout = Vec::with_capacity(trials.len());
    let mut failed = 0u32;
    let mut clamped_total = 0u64;
    for trial in &trials {
        match trial {
            Trial::Done(draw, clamped) => {
                net.push(draw.net_outcome);
                npv.push(draw.npv);
                payout.push(draw.equity_payout);
                clamped_total += *clamped as u64;
            }
            Trial::Failed | Trial::Aborted => failed += 1,
        }
    }

    if net.is_empty() {
        return Err(EquityEngineError::InsufficientData(format!(
            "All {} trials failed; no distribution could be built",
            input.trial_count
        )));
    }
    if failed > 0 {
        log::warn!("monte carlo: {failed} of {} trials excluded", input.trial_count);
        warnings.push(format!(
            "{failed} of {} trials failed and were excluded from the distribution",
            input.trial_count
        ));
    }
    if clamped_total > 0 {
        warnings.push(format!(
            "{clamped_total} sampled values were negative and clamped to zero"
        ));
    }

    sort_f64(&mut net);
    sort_f64(&mut npv);
    sort_f64(&mut payout);

    let net_summary = summarize(&net);
    let succeeded = net.len() as u32;
    let positive = net.iter().filter(|v| **v > 0.0).count();

    let output = MonteCarloOutput {
        trials_requested: input.trial_count,
        trials_succeeded: succeeded,
        trials_failed: failed,
        seed,
        var_5: net_summary.percentiles.p5,
        mean: net_summary.mean,
        std_dev: net_summary.std_dev,
        percentiles: net_summary.percentiles,
        success_probability: positive as f64 / net.len() as f64,
        histogram: build_histogram(&net, input.config.histogram_buckets),
        base_case,
        npv_summary: summarize(&npv),
        equity_payout_summary: summarize(&payout),
    };

    log::info!(
        "monte carlo: {succeeded} trials aggregated in {:?}",
        start.elapsed()
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_precision(
        "Monte Carlo Simulation of the offer outcome",
        &serde_json::json!({
            "trial_count": input.trial_count,
            "seed": seed,
            "parallel": input.config.parallel,
            "perturbations": input.perturbations,
            "per_trial_seeding": "SplitMix64(batch seed, trial index)",
            "clamping": "salaries, exit valuation and ownership are floored at zero",
        }),
        warnings,
        elapsed,
        FLOAT_PRECISION,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offer::{EquityGrant, VestingSchedule};
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    fn base() -> OfferScenario {
        OfferScenario {
            current_salary: dec!(180_000),
            current_salary_growth_rate: dec!(0.03),
            startup_salary: dec!(140_000),
            startup_salary_growth_rate: dec!(0.05),
            investment_return_rate: dec!(0.07),
            exit_year: 5,
            equity: EquityGrant::Rsu {
                ownership: dec!(0.005),
            },
            vesting: VestingSchedule::default(),
            exit_valuation: dec!(200_000_000),
            funding_rounds: Vec::new(),
        }
    }

    fn input(volatility: f64, trials: u32) -> MonteCarloInput {
        MonteCarloInput {
            base: base(),
            trial_count: trials,
            perturbations: vec![
                Perturbation {
                    parameter: OfferParameter::ExitValuation,
                    volatility,
                    noise: NoiseKind::Normal,
                },
                Perturbation {
                    parameter: OfferParameter::StartupSalary,
                    volatility,
                    noise: NoiseKind::Uniform,
                },
            ],
            seed: Some(42),
            config: SimulationConfig::default(),
        }
    }

    #[test]
    fn test_zero_volatility_collapses_to_base_case() {
        let out = run_monte_carlo(&input(0.0, 1_000)).unwrap().result;
        assert_eq!(out.trials_succeeded, 1_000);
        assert_relative_eq!(out.mean, out.base_case.net_outcome, max_relative = 1e-9);
        assert_relative_eq!(out.percentiles.p5, out.percentiles.p95);
        assert!(out.std_dev.abs() < 1e-6);
        assert_eq!(out.histogram.len(), 1);
        let expected = if out.base_case.net_outcome > 0.0 { 1.0 } else { 0.0 };
        assert_eq!(out.success_probability, expected);
    }

    #[test]
    fn test_seeded_runs_match_across_execution_modes() {
        let parallel = run_monte_carlo(&input(0.3, 500)).unwrap().result;
        let mut sequential_input = input(0.3, 500);
        sequential_input.config.parallel = false;
        let sequential = run_monte_carlo(&sequential_input).unwrap().result;
        assert_eq!(parallel.mean, sequential.mean);
        assert_eq!(parallel.percentiles.p50, sequential.percentiles.p50);
    }

    #[test]
    fn test_spread_and_ordering() {
        let out = run_monte_carlo(&input(0.4, 2_000)).unwrap().result;
        assert!(out.std_dev > 0.0);
        let p = &out.percentiles;
        assert!(p.p5 <= p.p10 && p.p10 <= p.p25 && p.p25 <= p.p50);
        assert!(p.p50 <= p.p75 && p.p75 <= p.p90 && p.p90 <= p.p95);
        assert_eq!(out.var_5, p.p5);
        assert_eq!(out.histogram.len(), 20);
        let total: u32 = out.histogram.iter().map(|b| b.count).sum();
        assert_eq!(total, out.trials_succeeded);
    }

    #[test]
    fn test_negative_draws_are_clamped() {
        let mut i = input(0.0, 300);
        i.perturbations = vec![Perturbation {
            parameter: OfferParameter::ExitValuation,
            volatility: 3.0,
            noise: NoiseKind::Normal,
        }];
        let out = run_monte_carlo(&i).unwrap();
        assert!(out.result.equity_payout_summary.min >= 0.0);
        assert!(out.warnings.iter().any(|w| w.contains("clamped")));
    }

    #[test]
    fn test_cancelled_batch_returns_no_results() {
        let token = CancellationToken::new();
        token.cancel();
        let err = run_monte_carlo_with(&input(0.2, 100), &NoProgress, &token).unwrap_err();
        assert!(matches!(err, EquityEngineError::Cancelled));
    }

    #[test]
    fn test_splitmix_seeds_differ() {
        assert_ne!(trial_seed(42, 0), trial_seed(42, 1));
        assert_eq!(trial_seed(42, 7), trial_seed(42, 7));
    }

    #[test]
    fn test_metadata_precision_field() {
        let out = run_monte_carlo(&input(0.1, 100)).unwrap();
        assert_eq!(out.metadata.precision, "ieee754_f64");
    }
}
