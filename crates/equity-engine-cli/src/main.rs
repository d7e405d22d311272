mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fmt;
use std::process;

use equity_engine_core::boundary::Operation;
use equity_engine_core::error::ErrorResponse;

use commands::monte_carlo::MonteCarloArgs;
use commands::time_value::{IrrArgs, NpvArgs};
use commands::valuation::{BenchmarkArgs, RevenueMultipleArgs};
use commands::RequestArgs;

/// Equity valuation and distribution engine
#[derive(Parser)]
#[command(
    name = "eqe",
    version,
    about = "Equity valuation and distribution engine",
    long_about = "Liquidation waterfalls, dilution projections, startup valuation methods \
                  and Monte Carlo offer risk, computed with decimal precision. Every command \
                  takes a JSON request via --input or stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log engine progress at info level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Distribute exit proceeds through the preference stack
    #[command(alias = "waterfall")]
    ComputeWaterfall(RequestArgs),
    /// Project ownership through a sequence of funding rounds
    #[command(alias = "dilution")]
    ProjectDilution(RequestArgs),
    /// Preview one priced round against a cap table
    PreviewDilution(RequestArgs),
    /// Net present value of periodic cash flows
    #[command(alias = "npv")]
    ComputeNpv(NpvArgs),
    /// Internal rate of return of periodic cash flows
    #[command(alias = "irr")]
    ComputeIrr(IrrArgs),
    /// IRR of irregularly dated cash flows
    #[command(alias = "xirr")]
    ComputeXirr(RequestArgs),
    /// Revenue x multiple valuation
    ValuateRevenueMultiple(RevenueMultipleArgs),
    /// Discounted cash flow valuation
    ValuateDcf(RequestArgs),
    /// Venture capital method valuation
    ValuateVcMethod(RequestArgs),
    /// Probability-weighted scenario valuation
    ValuateFirstChicago(RequestArgs),
    /// Run several valuation methods side by side
    CompareValuations(RequestArgs),
    /// Check a metric against industry benchmark ranges
    ValidateBenchmark(BenchmarkArgs),
    /// Compare a startup offer against staying in the current job
    #[command(alias = "offer")]
    EvaluateOffer(RequestArgs),
    /// Monte Carlo simulation of an offer outcome
    #[command(alias = "monte-carlo")]
    RunMonteCarlo(MonteCarloArgs),
    /// List the operations this build supports
    Operations,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

/// Why a command failed: bad local input, or an engine rejection.
pub enum CliError {
    Input(Box<dyn std::error::Error>),
    Engine(ErrorResponse),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Input(e) => write!(f, "{e}"),
            CliError::Engine(resp) => write!(f, "{}", resp.message),
        }
    }
}

impl From<ErrorResponse> for CliError {
    fn from(resp: ErrorResponse) -> Self {
        CliError::Engine(resp)
    }
}

impl From<Box<dyn std::error::Error>> for CliError {
    fn from(e: Box<dyn std::error::Error>) -> Self {
        CliError::Input(e)
    }
}

impl From<&str> for CliError {
    fn from(msg: &str) -> Self {
        CliError::Input(msg.into())
    }
}

impl From<String> for CliError {
    fn from(msg: String) -> Self {
        CliError::Input(msg.into())
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, CliError> = match cli.command {
        Commands::ComputeWaterfall(args) => commands::run_request(Operation::ComputeWaterfall, args),
        Commands::ProjectDilution(args) => commands::run_request(Operation::ProjectDilution, args),
        Commands::PreviewDilution(args) => commands::run_request(Operation::PreviewDilution, args),
        Commands::ComputeNpv(args) => commands::time_value::run_npv(args),
        Commands::ComputeIrr(args) => commands::time_value::run_irr(args),
        Commands::ComputeXirr(args) => commands::run_request(Operation::ComputeXirr, args),
        Commands::ValuateRevenueMultiple(args) => commands::valuation::run_revenue_multiple(args),
        Commands::ValuateDcf(args) => commands::run_request(Operation::ValuateDcf, args),
        Commands::ValuateVcMethod(args) => commands::run_request(Operation::ValuateVcMethod, args),
        Commands::ValuateFirstChicago(args) => {
            commands::run_request(Operation::ValuateFirstChicago, args)
        }
        Commands::CompareValuations(args) => {
            commands::run_request(Operation::CompareValuations, args)
        }
        Commands::ValidateBenchmark(args) => commands::valuation::run_benchmark(args),
        Commands::EvaluateOffer(args) => commands::run_request(Operation::EvaluateOffer, args),
        Commands::RunMonteCarlo(args) => commands::monte_carlo::run_monte_carlo(args),
        Commands::Operations => {
            for op in Operation::ALL {
                println!("{op}");
            }
            return;
        }
        Commands::Version => {
            println!("eqe {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(CliError::Engine(resp)) => {
            if matches!(cli.output, OutputFormat::Json) {
                output::json::print_error(&resp);
            } else {
                eprintln!("{}: {}", "error".red().bold(), resp.message);
                for detail in &resp.details {
                    eprintln!("  {} {}", detail.field.yellow(), detail.message);
                }
            }
            process::exit(2);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
