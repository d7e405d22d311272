use std::io::Write;

use clap::Args;
use serde_json::Value;

use equity_engine_core::boundary::{self, Operation};
use equity_engine_core::monte_carlo::{
    run_monte_carlo_with, CancellationToken, MonteCarloInput, ProgressUpdate,
};

use crate::commands::load_payload;
use crate::CliError;

/// Arguments for Monte Carlo offer simulation
#[derive(Args)]
pub struct MonteCarloArgs {
    /// Path to JSON input file (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Override the number of trials in the request
    #[arg(long)]
    pub trials: Option<u32>,

    /// Override the batch seed in the request
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run trials on a single thread
    #[arg(long)]
    pub sequential: bool,

    /// Stream progress to stderr
    #[arg(long)]
    pub progress: bool,
}

pub fn run_monte_carlo(args: MonteCarloArgs) -> Result<Value, CliError> {
    let op = Operation::RunMonteCarlo;
    let mut payload = load_payload(args.input.as_deref(), op)?;

    if let Value::Object(map) = &mut payload {
        if let Some(trials) = args.trials {
            map.insert("trial_count".into(), trials.into());
        }
        if let Some(seed) = args.seed {
            map.insert("seed".into(), seed.into());
        }
        if args.sequential {
            let config = map
                .entry("config")
                .or_insert_with(|| Value::Object(Default::default()));
            if let Value::Object(config) = config {
                config.insert("parallel".into(), Value::Bool(false));
            }
        }
    }

    if !args.progress {
        return Ok(boundary::dispatch(op, &payload)?);
    }

    let sink = |u: ProgressUpdate| {
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\rsimulating: {:>3}% ({}/{})", u.percent, u.completed, u.total);
        if u.completed == u.total {
            let _ = writeln!(err);
        }
    };
    let token = CancellationToken::new();
    let value = boundary::guarded(|| {
        let input: MonteCarloInput = boundary::parse_request(&payload)?;
        let output = run_monte_carlo_with(&input, &sink, &token)?;
        Ok(serde_json::to_value(output)?)
    })?;
    Ok(value)
}
