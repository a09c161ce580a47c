//! # Authority Configuration
//!
//! One [`FiscalConfig`] per taxpayer per environment: which authority to
//! talk to, where, with which credentials and device. Credentials are held
//! in [`Credential`], which wipes its memory on drop and never prints its
//! value through `Debug`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::authority::{Authority, Environment};
use crate::error::ValidationError;
use crate::identity::{BranchId, SequenceScope, TaxpayerId};
use crate::temporal::Timestamp;

/// Default authority request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("{0} environment variable is required")]
    MissingVar(String),

    /// An environment variable is set but unusable.
    #[error("invalid value for {var}: {reason}")]
    InvalidVar {
        /// Variable name.
        var: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A base URL failed to parse.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),

    /// An identifier inside the configuration is malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Secret credential material (eTIMS communication key, E-VAT security key).
#[derive(Clone)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    /// Wrap a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// The secret value. Callers must not log it.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credential {}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Credential::new)
    }
}

/// Registration status of a configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStatus {
    /// Created, never tested.
    #[default]
    Draft,
    /// Submitted to the authority for device initialisation.
    Pending,
    /// Last connection test succeeded.
    Active,
    /// Last connection test failed.
    Error,
}

impl ConfigStatus {
    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for ConfigStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "error" => Ok(Self::Error),
            other => Err(ValidationError::InvalidDocument {
                reference: "config".into(),
                reason: format!("unknown config status \"{other}\""),
            }),
        }
    }
}

/// A taxpayer's registration with one authority in one environment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalConfig {
    /// Registry identifier.
    pub id: Uuid,
    /// Authority submitted to.
    pub authority: Authority,
    /// Sandbox or production.
    pub environment: Environment,
    /// Registered taxpayer.
    pub taxpayer: TaxpayerId,
    /// Registered branch.
    pub branch: BranchId,
    /// Control-unit / device serial number, if the authority issues one.
    #[serde(default)]
    pub device_serial: Option<String>,
    /// API key, communication key or security key.
    pub credential: Credential,
    /// Override of the authority's default base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Authority tax code used when an internal rate cannot be classified.
    #[serde(default)]
    pub default_tax_code: Option<String>,
    /// Apply the Ghana COVID-19 health recovery levy to standard-rated lines.
    #[serde(default)]
    pub covid_levy: bool,
    /// Registration status.
    #[serde(default)]
    pub status: ConfigStatus,
    /// Whether this configuration is the one used for submissions.
    #[serde(default)]
    pub active: bool,
    /// When the last connection test ran.
    #[serde(default)]
    pub last_tested_at: Option<Timestamp>,
    /// Error message from the last failed connection test.
    #[serde(default)]
    pub last_error: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl std::fmt::Debug for FiscalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiscalConfig")
            .field("id", &self.id)
            .field("authority", &self.authority)
            .field("environment", &self.environment)
            .field("taxpayer", &self.taxpayer)
            .field("branch", &self.branch)
            .field("device_serial", &self.device_serial)
            .field("credential", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("default_tax_code", &self.default_tax_code)
            .field("covid_levy", &self.covid_levy)
            .field("status", &self.status)
            .field("active", &self.active)
            .finish()
    }
}

impl FiscalConfig {
    /// Create an inactive draft configuration with authority defaults.
    pub fn new(
        authority: Authority,
        environment: Environment,
        taxpayer: TaxpayerId,
        branch: BranchId,
        credential: Credential,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            authority,
            environment,
            taxpayer,
            branch,
            device_serial: None,
            credential,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_tax_code: None,
            covid_levy: false,
            status: ConfigStatus::Draft,
            active: false,
            last_tested_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Load a single-tenant configuration from environment variables.
    ///
    /// Variables:
    /// - `FISC_AUTHORITY` (required: `kra_etims` or `gra_evat`)
    /// - `FISC_TIN` (required)
    /// - `FISC_API_KEY` (required)
    /// - `FISC_BRANCH_ID` (default: authority default, `00` or `001`)
    /// - `FISC_ENVIRONMENT` (default: `sandbox`)
    /// - `FISC_BASE_URL` (default: authority default for the environment)
    /// - `FISC_TIMEOUT_SECS` (default: 30)
    /// - `FISC_DEVICE_SERIAL`, `FISC_DEFAULT_TAX_CODE`, `FISC_COVID_LEVY` (optional)
    ///
    /// The result is active, since there is no registry to activate it in.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// [`from_env`](Self::from_env) against an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &str| -> Result<String, ConfigError> {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(var.to_string()))
        };

        let authority: Authority = required("FISC_AUTHORITY")?.parse()?;
        let taxpayer = TaxpayerId::new(required("FISC_TIN")?)?;
        let credential = Credential::new(required("FISC_API_KEY")?);
        let branch = BranchId::new(
            lookup("FISC_BRANCH_ID").unwrap_or_else(|| authority.default_branch().to_string()),
        )?;
        let environment: Environment = match lookup("FISC_ENVIRONMENT") {
            Some(v) => v.parse()?,
            None => Environment::Sandbox,
        };
        let timeout_secs = match lookup("FISC_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidVar {
                    var: "FISC_TIMEOUT_SECS".into(),
                    reason: format!("expected a positive integer, got \"{v}\""),
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let covid_levy = match lookup("FISC_COVID_LEVY") {
            Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            None => false,
        };

        let mut config = Self::new(authority, environment, taxpayer, branch, credential);
        config.base_url = lookup("FISC_BASE_URL");
        config.timeout_secs = timeout_secs;
        config.device_serial = lookup("FISC_DEVICE_SERIAL");
        config.default_tax_code = lookup("FISC_DEFAULT_TAX_CODE");
        config.covid_levy = covid_levy;
        config.status = ConfigStatus::Active;
        config.active = true;
        config.resolved_base_url()?;
        Ok(config)
    }

    /// A sandbox configuration pointing at a local mock server (for testing).
    pub fn local_mock(
        authority: Authority,
        base_url: &str,
        taxpayer: &str,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new(
            authority,
            Environment::Sandbox,
            TaxpayerId::new(taxpayer)?,
            BranchId::new(authority.default_branch())?,
            Credential::new("test-key"),
        );
        config.base_url = Some(base_url.to_string());
        config.timeout_secs = 5;
        config.status = ConfigStatus::Active;
        config.active = true;
        config.resolved_base_url()?;
        Ok(config)
    }

    /// The base URL to submit to: the override if set, otherwise the
    /// authority default for this environment.
    pub fn resolved_base_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.authority.default_base_url(self.environment));
        Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(raw.to_string(), e.to_string()))
    }

    /// The base URL as a string without a trailing slash, ready for path
    /// concatenation.
    pub fn base_url_str(&self) -> Result<String, ConfigError> {
        Ok(self
            .resolved_base_url()?
            .as_str()
            .trim_end_matches('/')
            .to_string())
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Sequence scope documents under this configuration are numbered in.
    pub fn scope(&self) -> SequenceScope {
        SequenceScope::new(self.taxpayer.clone(), self.branch.clone())
    }
}
