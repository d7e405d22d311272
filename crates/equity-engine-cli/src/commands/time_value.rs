use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use equity_engine_core::boundary::{self, Operation};

use crate::commands::load_payload;
use crate::CliError;

/// Arguments for NPV
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct NpvArgs {
    /// Rate per period (e.g. 0.01 for 1% a month)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Comma-separated cash flows, first flow at period 0
    #[arg(long, value_delimiter = ',')]
    pub cash_flows: Vec<Decimal>,

    /// Payout received at the final period
    #[arg(long)]
    pub terminal_value: Option<Decimal>,

    /// Cash-flow period: annual or monthly
    #[arg(long, default_value = "annual")]
    pub period: String,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for IRR
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct IrrArgs {
    /// Comma-separated cash flows, first flow at period 0
    #[arg(long, value_delimiter = ',')]
    pub cash_flows: Vec<Decimal>,

    /// Payout received at the final period
    #[arg(long)]
    pub terminal_value: Option<Decimal>,

    /// Cash-flow period: annual or monthly
    #[arg(long, default_value = "annual")]
    pub period: String,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_npv(args: NpvArgs) -> Result<Value, CliError> {
    let payload = if args.input.is_some() || args.cash_flows.is_empty() {
        load_payload(args.input.as_deref(), Operation::ComputeNpv)?
    } else {
        let rate = args
            .rate
            .ok_or("--rate is required (or provide --input)")?;
        json!({
            "cash_flows": args.cash_flows,
            "periodic_rate": rate,
            "terminal_value": args.terminal_value.unwrap_or(Decimal::ZERO),
            "period": args.period,
        })
    };
    Ok(boundary::dispatch(Operation::ComputeNpv, &payload)?)
}

pub fn run_irr(args: IrrArgs) -> Result<Value, CliError> {
    let payload = if args.input.is_some() || args.cash_flows.is_empty() {
        load_payload(args.input.as_deref(), Operation::ComputeIrr)?
    } else {
        json!({
            "cash_flows": args.cash_flows,
            "terminal_value": args.terminal_value.unwrap_or(Decimal::ZERO),
            "period": args.period,
        })
    };
    Ok(boundary::dispatch(Operation::ComputeIrr, &payload)?)
}
