use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use equity_engine_core::boundary::{self, Operation};

use crate::commands::load_payload;
use crate::CliError;

/// Arguments for revenue-multiple valuation
#[derive(Args)]
pub struct RevenueMultipleArgs {
    /// Annual revenue
    #[arg(long)]
    pub revenue: Option<Decimal>,

    /// Revenue multiple (e.g. 8 for 8x)
    #[arg(long)]
    pub multiple: Option<Decimal>,

    /// Industry to benchmark the multiple against (saas, fintech, ai, ...)
    #[arg(long)]
    pub industry: Option<String>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for an industry benchmark check
#[derive(Args)]
pub struct BenchmarkArgs {
    /// Industry (saas, fintech, marketplace, ecommerce, biotech, hardware, consumer, ai)
    #[arg(long)]
    pub industry: Option<String>,

    /// Metric to check (revenue_multiple, discount_rate, target_return_multiple)
    #[arg(long)]
    pub metric: Option<String>,

    /// Observed value
    #[arg(long, allow_hyphen_values = true)]
    pub value: Option<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_revenue_multiple(args: RevenueMultipleArgs) -> Result<Value, CliError> {
    let op = Operation::ValuateRevenueMultiple;
    let payload = match (args.input.as_deref(), args.revenue) {
        (None, Some(revenue)) => json!({
            "annual_revenue": revenue,
            "revenue_multiple": args
                .multiple
                .ok_or("--multiple is required (or provide --input)")?,
            "industry": args.industry,
        }),
        (path, _) => load_payload(path, op)?,
    };
    Ok(boundary::dispatch(op, &payload)?)
}

pub fn run_benchmark(args: BenchmarkArgs) -> Result<Value, CliError> {
    let op = Operation::ValidateBenchmark;
    let payload = match (args.input.as_deref(), args.industry) {
        (None, Some(industry)) => json!({
            "industry": industry,
            "metric": args.metric.unwrap_or_else(|| "revenue_multiple".to_string()),
            "value": args.value.ok_or("--value is required (or provide --input)")?,
        }),
        (path, _) => load_payload(path, op)?,
    };
    Ok(boundary::dispatch(op, &payload)?)
}
