pub mod monte_carlo;
pub mod time_value;
pub mod valuation;

use clap::Args;
use serde_json::Value;

use equity_engine_core::boundary::{self, Operation};

use crate::input;
use crate::CliError;

/// Arguments shared by every JSON-driven command
#[derive(Args)]
pub struct RequestArgs {
    /// Path to JSON input file (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,
}

/// Load a request payload from `--input` or piped stdin.
pub fn load_payload(path: Option<&str>, op: Operation) -> Result<Value, CliError> {
    if let Some(path) = path {
        return Ok(input::file::read_json_value(path)?);
    }
    match input::stdin::read_stdin(op)? {
        Some(value) => Ok(value),
        None => Err(format!("--input <file.json> or JSON on stdin required for {op}").into()),
    }
}

/// Run an operation whose only input is a JSON request.
pub fn run_request(op: Operation, args: RequestArgs) -> Result<Value, CliError> {
    let payload = load_payload(args.input.as_deref(), op)?;
    log::info!("{op}: dispatching request");
    Ok(boundary::dispatch(op, &payload)?)
}
