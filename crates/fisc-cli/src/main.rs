//! # fisc CLI entry point
//!
//! Parses command-line arguments, loads settings and dispatches to the
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fisc_cli::config::{run_config, ConfigArgs};
use fisc_cli::preview::{run_preview, PreviewArgs};
use fisc_cli::qr::{run_qr, QrArgs};
use fisc_cli::settings::Settings;
use fisc_cli::submit::{run_submit, run_sweep, SubmitArgs, SweepArgs};

/// Fiscal invoice submission toolchain.
///
/// Previews authority payloads, submits documents to KRA eTIMS and
/// GRA E-VAT, renders receipt QR codes, retries failed submissions and
/// checks taxpayer configurations.
#[derive(Parser, Debug)]
#[command(name = "fisc", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Map taxes and build the authority payload of a draft without sending it.
    Preview(PreviewArgs),

    /// Register and submit draft documents.
    Submit(SubmitArgs),

    /// Render the QR payload and printable views of a receipt.
    Qr(QrArgs),

    /// Recover interrupted submissions and retry due rejections.
    Sweep(SweepArgs),

    /// Fiscal configuration checks.
    Config(ConfigArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = Settings::load(cli.config.as_deref()).and_then(|settings| match &cli.command {
        Commands::Preview(args) => run_preview(args, &settings),
        Commands::Submit(args) => run_submit(args, &settings),
        Commands::Qr(args) => run_qr(args),
        Commands::Sweep(args) => run_sweep(args, &settings),
        Commands::Config(args) => run_config(args, &settings),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
