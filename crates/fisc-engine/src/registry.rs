//! # Config/Device Registry
//!
//! Per-taxpayer authority configurations. Invariant: at most one active
//! configuration per (taxpayer, environment). Configurations are never
//! deleted, only deactivated.
//!
//! [`ConfigRegistry::resolve`] picks the active configuration for a
//! taxpayer, preferring production over sandbox when both are active.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use fisc_core::{ConfigStatus, Environment, FiscalConfig, TaxpayerId, Timestamp};

use crate::store::Store;

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No active configuration for the taxpayer.
    #[error("no active fiscal configuration for taxpayer {taxpayer}")]
    NotConfigured {
        /// The taxpayer.
        taxpayer: String,
    },

    /// Unknown configuration id.
    #[error("fiscal configuration {id} not found")]
    UnknownConfig {
        /// The id.
        id: Uuid,
    },

    /// Another configuration is already active for the pair.
    #[error("taxpayer {taxpayer} already has an active {environment} configuration ({existing})")]
    AlreadyActive {
        /// The taxpayer.
        taxpayer: String,
        /// The environment.
        environment: Environment,
        /// The active configuration.
        existing: Uuid,
    },

    /// The configuration cannot be used.
    #[error("invalid fiscal configuration: {0}")]
    Invalid(String),
}

/// Registry of fiscal configurations.
#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
    configs: Store<FiscalConfig>,
    // Serialises activation checks.
    activation: Arc<Mutex<()>>,
}

impl ConfigRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a configuration. An active configuration must not clash
    /// with one already active for the same taxpayer and environment.
    pub fn register(&self, config: FiscalConfig) -> Result<FiscalConfig, RegistryError> {
        config
            .resolved_base_url()
            .map_err(|e| RegistryError::Invalid(e.to_string()))?;
        if config.credential.is_empty() {
            return Err(RegistryError::Invalid("credential is empty".into()));
        }
        let _gate = self.activation.lock();
        if config.active {
            self.ensure_no_other_active(&config)?;
        }
        tracing::info!(
            config_id = %config.id,
            authority = %config.authority,
            taxpayer = %config.taxpayer,
            environment = %config.environment,
            active = config.active,
            "fiscal configuration registered"
        );
        self.configs.insert(config.id, config.clone());
        Ok(config)
    }

    /// Restore persisted configurations without re-validation.
    pub fn restore(&self, configs: Vec<FiscalConfig>) {
        for config in configs {
            self.configs.insert(config.id, config);
        }
    }

    fn ensure_no_other_active(&self, config: &FiscalConfig) -> Result<(), RegistryError> {
        let clash = self.configs.filter(|c| {
            c.active
                && c.id != config.id
                && c.taxpayer == config.taxpayer
                && c.environment == config.environment
        });
        match clash.first() {
            Some(existing) => Err(RegistryError::AlreadyActive {
                taxpayer: config.taxpayer.to_string(),
                environment: config.environment,
                existing: existing.id,
            }),
            None => Ok(()),
        }
    }

    /// Activate a configuration.
    pub fn activate(&self, id: Uuid) -> Result<FiscalConfig, RegistryError> {
        let _gate = self.activation.lock();
        let config = self.get(id)?;
        self.ensure_no_other_active(&config)?;
        let updated = self.mutate(id, |c| {
            c.active = true;
            if c.status == ConfigStatus::Draft {
                c.status = ConfigStatus::Pending;
            }
        })?;
        tracing::info!(config_id = %id, taxpayer = %updated.taxpayer, "fiscal configuration activated");
        Ok(updated)
    }

    /// Deactivate a configuration.
    pub fn deactivate(&self, id: Uuid) -> Result<FiscalConfig, RegistryError> {
        let updated = self.mutate(id, |c| c.active = false)?;
        tracing::info!(config_id = %id, taxpayer = %updated.taxpayer, "fiscal configuration deactivated");
        Ok(updated)
    }

    /// Record a connection-test outcome: `Active` on success, `Error` with
    /// the message on failure.
    pub fn record_connection_test(
        &self,
        id: Uuid,
        outcome: Result<(), String>,
    ) -> Result<FiscalConfig, RegistryError> {
        self.mutate(id, |c| {
            c.last_tested_at = Some(Timestamp::now());
            match &outcome {
                Ok(()) => {
                    c.status = ConfigStatus::Active;
                    c.last_error = None;
                }
                Err(message) => {
                    c.status = ConfigStatus::Error;
                    c.last_error = Some(message.clone());
                }
            }
        })
    }

    /// The authority refused the configuration's credentials during a
    /// submission. Marks it `Error` until a connection test passes.
    pub fn record_credential_refusal(
        &self,
        id: Uuid,
        message: &str,
    ) -> Result<FiscalConfig, RegistryError> {
        self.mutate(id, |c| {
            c.status = ConfigStatus::Error;
            c.last_error = Some(message.to_string());
        })
    }

    fn mutate(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut FiscalConfig),
    ) -> Result<FiscalConfig, RegistryError> {
        self.configs
            .try_update(&id, |c| {
                f(c);
                c.updated_at = Timestamp::now();
                Ok(c.clone())
            })
            .unwrap_or(Err(RegistryError::UnknownConfig { id }))
    }

    /// The active configuration for a taxpayer, production first.
    pub fn resolve(&self, taxpayer: &TaxpayerId) -> Result<FiscalConfig, RegistryError> {
        let mut active = self
            .configs
            .filter(|c| c.active && &c.taxpayer == taxpayer);
        active.sort_by_key(|c| match c.environment {
            Environment::Production => 0,
            Environment::Sandbox => 1,
        });
        active
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::NotConfigured {
                taxpayer: taxpayer.to_string(),
            })
    }

    /// A configuration by id.
    pub fn get(&self, id: Uuid) -> Result<FiscalConfig, RegistryError> {
        self.configs
            .get(&id)
            .ok_or(RegistryError::UnknownConfig { id })
    }

    /// Every configuration.
    pub fn list(&self) -> Vec<FiscalConfig> {
        self.configs.list()
    }
}
