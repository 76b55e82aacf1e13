//! Regression gates and retrieval-efficiency benchmarks for a
//! code-search CLI.
#![forbid(unsafe_code)]

mod commands;
mod fixture;
mod gitfix;
mod report;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sbench_core::{LogConfig, init_logging};

use commands::Verdict;

#[derive(Parser)]
#[command(
    name = "sbench",
    about = "Regression gates and retrieval-efficiency benchmarks for a code-search CLI",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Latency regression gate: baseline binary vs candidate binary
    Gate(commands::gate::GateArgs),
    /// Warm-start cache regression gate with per-trial git clones
    ReuseGate(commands::reuse_gate::ReuseGateArgs),
    /// Completion-tiered retrieval-efficiency benchmark
    Efficiency(commands::efficiency::EfficiencyArgs),
}

// Exit codes: 0 = pass, 1 = measured and the verdict failed,
// 2 = could not measure (configuration or execution error).
const EXIT_GATE_FAILED: u8 = 1;
const EXIT_EXECUTION_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info");
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    init_logging(&log_config);

    let outcome = match &cli.command {
        Commands::Gate(args) => commands::gate::run(args),
        Commands::ReuseGate(args) => commands::reuse_gate::run(args),
        Commands::Efficiency(args) => commands::efficiency::run(args),
    };

    match outcome {
        Ok(Verdict::Pass) => ExitCode::SUCCESS,
        Ok(Verdict::GateFailed) => ExitCode::from(EXIT_GATE_FAILED),
        Err(err) => {
            eprintln!("sbench: {err:#}");
            ExitCode::from(EXIT_EXECUTION_ERROR)
        }
    }
}
