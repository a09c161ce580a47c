//! # Server Bootstrap
//!
//! Builds the engine from the environment at startup:
//!
//! 1. **Transport**: `FISC_TRANSPORT=simulated` selects the offline sandbox
//!    (controller id from `FISC_DEVICE_SERIAL`); anything else is HTTP with
//!    `FISC_TIMEOUT_SECS` (default 30).
//! 2. **Retry budget**: `FISC_MAX_ATTEMPTS`, `FISC_RETRY_BASE_SECS`.
//! 3. **Persistence**: the pool from `DATABASE_URL`, if any, and a reload
//!    of every stored configuration, document, attempt and receipt.
//! 4. **Configuration**: when `FISC_AUTHORITY` is set, the configuration
//!    described by the `FISC_*` variables is registered, unless a stored
//!    one is already active for the same taxpayer and environment.

use std::time::Duration;

use sqlx::PgPool;

use fisc_client::{AnyTransport, ClientError, HttpTransport, SimulatedTransport};
use fisc_core::{ConfigError, FiscalConfig};
use fisc_engine::{EngineError, RetryPolicy, SubmissionEngine};

use crate::state::{AppConfig, AppState};

const DEFAULT_SIMULATED_CONTROLLER: &str = "SIMULATED-CU";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors during bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// An environment variable holds an unusable value.
    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: String, reason: String },

    /// The `FISC_*` configuration is incomplete or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Loading or registering failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn positive_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: u64,
) -> Result<u64, BootstrapError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| BootstrapError::InvalidVar {
                var: var.to_string(),
                reason: format!("expected a positive integer, got \"{raw}\""),
            }),
    }
}

/// Select the transport.
pub fn transport_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AnyTransport, BootstrapError> {
    match lookup("FISC_TRANSPORT").as_deref().map(str::trim) {
        Some("simulated") => {
            let controller = lookup("FISC_DEVICE_SERIAL")
                .unwrap_or_else(|| DEFAULT_SIMULATED_CONTROLLER.to_string());
            tracing::warn!(controller = %controller, "using simulated transport, nothing reaches an authority");
            Ok(SimulatedTransport::new(controller).into())
        }
        None | Some("http") => {
            let secs = positive_u64(&lookup, "FISC_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
            Ok(HttpTransport::new(Duration::from_secs(secs))?.into())
        }
        Some(other) => Err(BootstrapError::InvalidVar {
            var: "FISC_TRANSPORT".into(),
            reason: format!("expected \"http\" or \"simulated\", got \"{other}\""),
        }),
    }
}

/// Build the retry budget.
pub fn retry_policy_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<RetryPolicy, BootstrapError> {
    let defaults = RetryPolicy::default();
    let max_attempts = positive_u64(&lookup, "FISC_MAX_ATTEMPTS", u64::from(defaults.max_attempts))?;
    let base = positive_u64(&lookup, "FISC_RETRY_BASE_SECS", defaults.base_delay.as_secs())?;
    Ok(RetryPolicy {
        max_attempts: u32::try_from(max_attempts).map_err(|_| BootstrapError::InvalidVar {
            var: "FISC_MAX_ATTEMPTS".into(),
            reason: format!("{max_attempts} is too large"),
        })?,
        base_delay: Duration::from_secs(base),
        max_delay: defaults.max_delay.max(Duration::from_secs(base)),
    })
}

/// Register the environment's configuration unless an equivalent one is
/// already active. Returns whether a configuration was registered.
pub async fn register_env_config(
    engine: &SubmissionEngine<AnyTransport>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<bool, BootstrapError> {
    if lookup("FISC_AUTHORITY").is_none() {
        tracing::warn!("FISC_AUTHORITY not set; configurations must be registered through the API");
        return Ok(false);
    }
    let config = FiscalConfig::from_lookup(lookup)?;
    let existing = engine.registry().list().into_iter().find(|c| {
        c.active && c.taxpayer == config.taxpayer && c.environment == config.environment
    });
    if let Some(existing) = existing {
        tracing::info!(
            config_id = %existing.id,
            taxpayer = %existing.taxpayer,
            environment = %existing.environment,
            "active configuration already stored, environment configuration not registered"
        );
        return Ok(false);
    }
    engine.register_config(config).await?;
    Ok(true)
}

/// Build the application state.
pub async fn bootstrap(config: AppConfig, pool: Option<PgPool>) -> Result<AppState, BootstrapError> {
    let lookup = |var: &str| std::env::var(var).ok();
    let transport = transport_from_lookup(lookup)?;
    let mut engine = SubmissionEngine::new(transport).with_retry_policy(retry_policy_from_lookup(lookup)?);
    if let Some(pool) = pool {
        engine = engine.with_pool(pool);
    }
    engine.load().await?;
    register_env_config(&engine, lookup).await?;
    Ok(AppState::with_config(engine, config))
}
