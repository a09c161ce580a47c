//! # Tax Authorities
//!
//! The closed set of fiscal authorities the engine can submit to, and the
//! deployment environment of a taxpayer's registration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A supported tax authority integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    /// Kenya Revenue Authority, electronic Tax Invoice Management System (OSCU).
    KraEtims,
    /// Ghana Revenue Authority, E-VAT virtual sales data controller.
    GraEvat,
}

impl Authority {
    /// All supported authorities.
    pub const ALL: [Authority; 2] = [Authority::KraEtims, Authority::GraEvat];

    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KraEtims => "kra_etims",
            Self::GraEvat => "gra_evat",
        }
    }

    /// ISO 3166-1 alpha-2 country code.
    pub fn country(&self) -> &'static str {
        match self {
            Self::KraEtims => "KE",
            Self::GraEvat => "GH",
        }
    }

    /// Default base URL for the given environment.
    pub fn default_base_url(&self, environment: Environment) -> &'static str {
        match (self, environment) {
            (Self::KraEtims, Environment::Sandbox) => "https://etims-api-sbx.kra.go.ke",
            (Self::KraEtims, Environment::Production) => "https://etims-api.kra.go.ke/etims-api",
            (Self::GraEvat, Environment::Sandbox) => "https://vsdcstaging.vat-gh.com",
            (Self::GraEvat, Environment::Production) => "https://vsdc.vat-gh.com",
        }
    }

    /// Branch identifier used when a registration does not name one.
    pub fn default_branch(&self) -> &'static str {
        match self {
            Self::KraEtims => "00",
            Self::GraEvat => "001",
        }
    }

    /// Default currency of the authority's jurisdiction.
    pub fn default_currency(&self) -> &'static str {
        match self {
            Self::KraEtims => "KES",
            Self::GraEvat => "GHS",
        }
    }
}

impl std::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Authority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kra_etims" | "etims" | "ke" => Ok(Self::KraEtims),
            "gra_evat" | "evat" | "gh" => Ok(Self::GraEvat),
            _ => Err(ValidationError::UnknownAuthority(s.to_string())),
        }
    }
}

/// Deployment environment of an authority registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Authority test system. Receipts carry no legal weight.
    Sandbox,
    /// Live system.
    Production,
}

impl Environment {
    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "test" | "staging" => Ok(Self::Sandbox),
            "production" | "prod" | "live" => Ok(Self::Production),
            _ => Err(ValidationError::UnknownEnvironment(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!("KRA_ETIMS".parse::<Authority>().unwrap(), Authority::KraEtims);
        assert_eq!("evat".parse::<Authority>().unwrap(), Authority::GraEvat);
        assert!("efris".parse::<Authority>().is_err());
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn default_urls() {
        assert_eq!(
            Authority::KraEtims.default_base_url(Environment::Production),
            "https://etims-api.kra.go.ke/etims-api"
        );
        assert_eq!(
            Authority::GraEvat.default_base_url(Environment::Sandbox),
            "https://vsdcstaging.vat-gh.com"
        );
    }

    #[test]
    fn serde_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&Authority::GraEvat).unwrap(),
            "\"gra_evat\""
        );
        let env: Environment = serde_json::from_str("\"sandbox\"").unwrap();
        assert_eq!(env, Environment::Sandbox);
    }

    #[test]
    fn defaults_per_authority() {
        assert_eq!(Authority::KraEtims.default_branch(), "00");
        assert_eq!(Authority::GraEvat.default_branch(), "001");
        assert_eq!(Authority::GraEvat.default_currency(), "GHS");
        assert_eq!(Authority::KraEtims.country(), "KE");
    }
}
