//! # Fiscal Configuration API
//!
//! - **GET `/v1/configs`**: list configurations
//! - **POST `/v1/configs`**: register a configuration
//! - **GET `/v1/configs/:id`**: one configuration
//! - **POST `/v1/configs/:id/activate`**: make it the active one for its taxpayer and environment
//! - **POST `/v1/configs/:id/deactivate`**
//! - **POST `/v1/configs/:id/test`**: probe the authority and record the outcome
//!
//! Credentials are accepted on registration and never returned.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fisc_core::{
    Authority, BranchId, ConfigStatus, Credential, Environment, FiscalConfig, TaxpayerId,
    Timestamp,
};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Body of `POST /v1/configs`.
#[derive(Deserialize)]
pub struct RegisterConfigRequest {
    pub authority: Authority,
    #[serde(default)]
    pub environment: Option<Environment>,
    pub taxpayer: String,
    /// Defaults to the authority's head-office branch.
    pub branch: Option<String>,
    /// eTIMS communication key or E-VAT security key.
    pub credential: String,
    pub device_serial: Option<String>,
    /// Overrides the authority's URL for the environment.
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub default_tax_code: Option<String>,
    #[serde(default)]
    pub covid_levy: bool,
    #[serde(default)]
    pub active: bool,
}

impl std::fmt::Debug for RegisterConfigRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterConfigRequest")
            .field("authority", &self.authority)
            .field("environment", &self.environment)
            .field("taxpayer", &self.taxpayer)
            .field("branch", &self.branch)
            .field("credential", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Validate for RegisterConfigRequest {
    fn validate(&self) -> Result<(), String> {
        if self.credential.trim().is_empty() {
            return Err("credential must not be empty".to_string());
        }
        if self.timeout_secs == Some(0) {
            return Err("timeout_secs must be positive".to_string());
        }
        Ok(())
    }
}

impl RegisterConfigRequest {
    fn into_config(self) -> Result<FiscalConfig, AppError> {
        let branch = self
            .branch
            .unwrap_or_else(|| self.authority.default_branch().to_string());
        let mut config = FiscalConfig::new(
            self.authority,
            self.environment.unwrap_or(Environment::Sandbox),
            TaxpayerId::new(self.taxpayer)?,
            BranchId::new(branch)?,
            Credential::new(self.credential),
        );
        config.device_serial = self.device_serial;
        config.base_url = self.base_url;
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        config.default_tax_code = self.default_tax_code;
        config.covid_levy = self.covid_levy;
        config.active = self.active;
        Ok(config)
    }
}

/// A configuration without its credential.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub id: Uuid,
    pub authority: Authority,
    pub environment: Environment,
    pub taxpayer: String,
    pub branch: String,
    pub device_serial: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub default_tax_code: Option<String>,
    pub covid_levy: bool,
    pub status: ConfigStatus,
    pub active: bool,
    pub last_tested_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<FiscalConfig> for ConfigResponse {
    fn from(c: FiscalConfig) -> Self {
        Self {
            base_url: c.base_url_str().ok(),
            id: c.id,
            authority: c.authority,
            environment: c.environment,
            taxpayer: c.taxpayer.to_string(),
            branch: c.branch.to_string(),
            device_serial: c.device_serial,
            timeout_secs: c.timeout_secs,
            default_tax_code: c.default_tax_code,
            covid_levy: c.covid_levy,
            status: c.status,
            active: c.active,
            last_tested_at: c.last_tested_at,
            last_error: c.last_error,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the configuration router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/configs", get(list_configs).post(register_config))
        .route("/v1/configs/:id", get(get_config))
        .route("/v1/configs/:id/activate", post(activate_config))
        .route("/v1/configs/:id/deactivate", post(deactivate_config))
        .route("/v1/configs/:id/test", post(test_config))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /v1/configs
async fn list_configs(State(state): State<AppState>) -> Json<Vec<ConfigResponse>> {
    let mut configs = state.engine.registry().list();
    configs.sort_by_key(|c| c.created_at);
    Json(configs.into_iter().map(ConfigResponse::from).collect())
}

/// POST /v1/configs: 409 `CONFLICT` when `active` clashes with an
/// already-active configuration.
async fn register_config(
    State(state): State<AppState>,
    body: Result<Json<RegisterConfigRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ConfigResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let config = state.engine.register_config(req.into_config()?).await?;
    Ok((StatusCode::CREATED, Json(config.into())))
}

/// GET /v1/configs/:id
async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConfigResponse>, AppError> {
    let config = state
        .engine
        .registry()
        .get(id)
        .map_err(fisc_engine::EngineError::from)?;
    Ok(Json(config.into()))
}

/// POST /v1/configs/:id/activate
async fn activate_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConfigResponse>, AppError> {
    Ok(Json(state.engine.activate_config(id).await?.into()))
}

/// POST /v1/configs/:id/deactivate
async fn deactivate_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConfigResponse>, AppError> {
    Ok(Json(state.engine.deactivate_config(id).await?.into()))
}

/// POST /v1/configs/:id/test: a failed probe is recorded on the
/// configuration (`status: error`, `last_error`) and still answers 200.
async fn test_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConfigResponse>, AppError> {
    Ok(Json(state.engine.test_connection(id).await?.into()))
}
