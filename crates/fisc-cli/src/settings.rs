//! # CLI Settings
//!
//! YAML settings file passed with `--config`:
//!
//! ```yaml
//! transport: simulated        # http (default) | simulated
//! controller_id: KRACU0100000001
//! timeout_secs: 30
//! max_attempts: 5
//! configs:
//!   - authority: kra_etims
//!     environment: sandbox
//!     taxpayer: P051234567X
//!     branch: "00"
//!     credential_env: FISC_API_KEY
//!     device_serial: KRACU0100000001
//! ```
//!
//! Credentials come from the variable named by `credential_env`, or inline
//! from `credential`. When the file lists no configurations, or no file is
//! given, the configuration described by the `FISC_*` variables is used.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use fisc_client::{AnyTransport, HttpTransport, SimulatedTransport};
use fisc_core::{Authority, BranchId, Credential, Environment, FiscalConfig, TaxpayerId};
use fisc_engine::RetryPolicy;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which transport submissions go through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Real authority endpoints.
    #[default]
    Http,
    /// Offline sandbox; nothing leaves the machine.
    Simulated,
}

/// One configuration entry.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigEntry {
    pub authority: Authority,
    #[serde(default)]
    pub environment: Option<Environment>,
    pub taxpayer: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub credential_env: Option<String>,
    #[serde(default)]
    pub device_serial: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub default_tax_code: Option<String>,
    #[serde(default)]
    pub covid_levy: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl std::fmt::Debug for ConfigEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigEntry")
            .field("authority", &self.authority)
            .field("environment", &self.environment)
            .field("taxpayer", &self.taxpayer)
            .field("branch", &self.branch)
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .field("credential_env", &self.credential_env)
            .finish_non_exhaustive()
    }
}

impl ConfigEntry {
    /// Resolve into a [`FiscalConfig`], reading the credential through `lookup`.
    pub fn to_config(&self, lookup: &impl Fn(&str) -> Option<String>) -> Result<FiscalConfig> {
        let secret = match (&self.credential, &self.credential_env) {
            (Some(_), Some(_)) => bail!(
                "taxpayer {}: set either credential or credential_env, not both",
                self.taxpayer
            ),
            (Some(inline), None) => inline.clone(),
            (None, Some(var)) => lookup(var)
                .with_context(|| format!("taxpayer {}: {var} is not set", self.taxpayer))?,
            (None, None) => bail!("taxpayer {}: no credential configured", self.taxpayer),
        };
        let branch = self
            .branch
            .clone()
            .unwrap_or_else(|| self.authority.default_branch().to_string());
        let mut config = FiscalConfig::new(
            self.authority,
            self.environment.unwrap_or(Environment::Sandbox),
            TaxpayerId::new(&self.taxpayer)?,
            BranchId::new(branch)?,
            Credential::new(secret),
        );
        config.device_serial = self.device_serial.clone();
        config.base_url = self.base_url.clone();
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        config.default_tax_code = self.default_tax_code.clone();
        config.covid_levy = self.covid_levy;
        config.active = self.active;
        config.resolved_base_url()?;
        Ok(config)
    }
}

/// Settings file contents.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub transport: TransportKind,
    /// Controller id reported by the simulated transport.
    #[serde(default)]
    pub controller_id: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub configs: Vec<ConfigEntry>,
}

impl Settings {
    /// Parse settings from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("invalid settings file")
    }

    /// Read settings from `path`, or defaults from the environment when
    /// `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read settings file {}", path.display()))?;
                Self::from_yaml(&text)
                    .with_context(|| format!("in settings file {}", path.display()))
            }
            None => Ok(Self::from_lookup(|var| std::env::var(var).ok())),
        }
    }

    /// Settings from `FISC_TRANSPORT`, `FISC_DEVICE_SERIAL` and
    /// `FISC_MAX_ATTEMPTS`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let transport = match lookup("FISC_TRANSPORT").as_deref().map(str::trim) {
            Some("simulated") => TransportKind::Simulated,
            _ => TransportKind::Http,
        };
        Self {
            transport,
            controller_id: lookup("FISC_DEVICE_SERIAL"),
            timeout_secs: None,
            max_attempts: lookup("FISC_MAX_ATTEMPTS").and_then(|v| v.trim().parse().ok()),
            configs: Vec::new(),
        }
    }

    /// Every configuration the file or environment describes.
    pub fn fiscal_configs(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Vec<FiscalConfig>> {
        if self.configs.is_empty() {
            if lookup("FISC_AUTHORITY").is_none() {
                return Ok(Vec::new());
            }
            return Ok(vec![FiscalConfig::from_lookup(lookup)?]);
        }
        self.configs.iter().map(|entry| entry.to_config(&lookup)).collect()
    }

    /// The transport to submit through.
    pub fn build_transport(&self) -> Result<AnyTransport> {
        Ok(match self.transport {
            TransportKind::Simulated => {
                let controller = self
                    .controller_id
                    .clone()
                    .unwrap_or_else(|| "SIMULATED-CU".to_string());
                SimulatedTransport::new(controller).into()
            }
            TransportKind::Http => {
                let secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
                if secs == 0 {
                    bail!("timeout_secs must be positive");
                }
                HttpTransport::new(Duration::from_secs(secs))?.into()
            }
        })
    }

    /// Retry budget for the sweep.
    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        if let Some(max) = self.max_attempts.filter(|m| *m > 0) {
            policy.max_attempts = max;
        }
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
transport: simulated
controller_id: KRACU0100000001
max_attempts: 3
configs:
  - authority: kra_etims
    taxpayer: p051234567x
    credential_env: KE_KEY
    device_serial: KRACU0100000001
  - authority: gra_evat
    environment: production
    taxpayer: C0000000000
    credential: inline-secret
    active: false
"#;

    fn env(var: &str) -> Option<String> {
        (var == "KE_KEY").then(|| "cmc-key".to_string())
    }

    #[test]
    fn parses_settings_and_configs() {
        let settings = Settings::from_yaml(YAML).unwrap();
        assert_eq!(settings.transport, TransportKind::Simulated);
        assert_eq!(settings.retry_policy().max_attempts, 3);

        let configs = settings.fiscal_configs(env).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].taxpayer.as_str(), "P051234567X");
        assert_eq!(configs[0].branch.as_str(), "00");
        assert_eq!(configs[0].credential.expose(), "cmc-key");
        assert!(configs[0].active);
        assert_eq!(configs[1].environment, Environment::Production);
        assert_eq!(configs[1].branch.as_str(), "001");
        assert!(!configs[1].active);
    }

    #[test]
    fn missing_credential_variable_is_an_error() {
        let settings = Settings::from_yaml(YAML).unwrap();
        let err = settings.fiscal_configs(|_| None).unwrap_err();
        assert!(err.to_string().contains("KE_KEY"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Settings::from_yaml("transprot: http\n").is_err());
    }

    #[test]
    fn environment_fallback() {
        let settings = Settings::from_lookup(|var| match var {
            "FISC_TRANSPORT" => Some("simulated".into()),
            "FISC_AUTHORITY" => Some("kra_etims".into()),
            "FISC_TIN" => Some("P051234567X".into()),
            "FISC_API_KEY" => Some("cmc-key".into()),
            _ => None,
        });
        assert_eq!(settings.transport, TransportKind::Simulated);
        let configs = settings
            .fiscal_configs(|var| match var {
                "FISC_AUTHORITY" => Some("kra_etims".into()),
                "FISC_TIN" => Some("P051234567X".into()),
                "FISC_API_KEY" => Some("cmc-key".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(configs.len(), 1);
        assert!(Settings::default().fiscal_configs(|_| None).unwrap().is_empty());
    }

    #[test]
    fn debug_redacts_inline_credentials() {
        let settings = Settings::from_yaml(YAML).unwrap();
        assert!(!format!("{settings:?}").contains("inline-secret"));
    }
}
