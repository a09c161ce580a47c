//! # Config Subcommand
//!
//! `fisc config check` validates every configuration the settings describe.
//! With `--test` it also probes the authority with each configuration's
//! credentials.

use anyhow::Result;
use clap::{Args, Subcommand};

use fisc_core::{ConfigStatus, FiscalConfig};
use fisc_engine::{ConfigRegistry, SubmissionEngine};
use fisc_tax::mapper_for;

use crate::settings::Settings;
use crate::{runtime, EXIT_PARTIAL_FAILURE};

/// Arguments for `fisc config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate configurations.
    Check {
        /// Probe the authority with each configuration.
        #[arg(long)]
        test: bool,
    },
}

/// Result of checking one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckLine {
    pub label: String,
    pub error: Option<String>,
}

impl CheckLine {
    fn ok(&self) -> bool {
        self.error.is_none()
    }
}

fn label(config: &FiscalConfig) -> String {
    format!(
        "{} {}/{} ({})",
        config.authority, config.taxpayer, config.branch, config.environment
    )
}

/// Check the configurations offline. Returns one line per configuration
/// and the ones that passed.
pub fn check_configs(configs: Vec<FiscalConfig>) -> (Vec<CheckLine>, Vec<FiscalConfig>) {
    let registry = ConfigRegistry::new();
    let mut lines = Vec::with_capacity(configs.len());
    let mut passed = Vec::new();
    for config in configs {
        let label = label(&config);
        let outcome = mapper_for(&config)
            .map_err(|e| e.to_string())
            .and_then(|_| registry.register(config).map_err(|e| e.to_string()));
        match outcome {
            Ok(config) => {
                lines.push(CheckLine { label, error: None });
                passed.push(config);
            }
            Err(error) => lines.push(CheckLine {
                label,
                error: Some(error),
            }),
        }
    }
    (lines, passed)
}

/// Probe the authority with each configuration.
pub async fn test_configs<T: fisc_client::Transport>(
    engine: &SubmissionEngine<T>,
    configs: Vec<FiscalConfig>,
) -> Result<Vec<CheckLine>> {
    let mut lines = Vec::with_capacity(configs.len());
    for config in configs {
        let label = label(&config);
        let registered = engine.register_config(config).await?;
        let tested = engine.test_connection(registered.id).await?;
        let error = match tested.status {
            ConfigStatus::Error => Some(
                tested
                    .last_error
                    .unwrap_or_else(|| "connection test failed".to_string()),
            ),
            _ => None,
        };
        lines.push(CheckLine { label, error });
    }
    Ok(lines)
}

/// Execute `fisc config`.
pub fn run_config(args: &ConfigArgs, settings: &Settings) -> Result<u8> {
    match &args.command {
        ConfigCommand::Check { test } => {
            let configs = settings.fiscal_configs(|var| std::env::var(var).ok())?;
            if configs.is_empty() {
                anyhow::bail!("no fiscal configurations: pass --config or set FISC_AUTHORITY");
            }
            let (mut lines, passed) = check_configs(configs);
            if *test {
                let engine = SubmissionEngine::new(settings.build_transport()?);
                let tested = runtime()?.block_on(test_configs(&engine, passed))?;
                lines.retain(|line| !line.ok());
                lines.extend(tested);
            }

            for line in &lines {
                match &line.error {
                    None => println!("OK    {}", line.label),
                    Some(error) => println!("FAIL  {}: {error}", line.label),
                }
            }
            Ok(if lines.iter().all(CheckLine::ok) { 0 } else { EXIT_PARTIAL_FAILURE })
        }
    }
}
