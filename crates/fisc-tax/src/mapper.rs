//! # Tax Mappers
//!
//! A [`TaxMapper`] classifies the internal tax of a line into exactly one
//! authority tax code. Classification is total: an internal tax the mapper
//! cannot place falls back to the configured default code and is reported
//! as a [`MappingDiagnostic`] instead of blocking the sale.

use serde::{Deserialize, Serialize};

use fisc_core::{Authority, FiscalConfig, InternalTax, RateBps};

use crate::codes::{AuthorityTaxCode, EtimsTaxType, EvatTaxCode, LevyCode};
use crate::error::TaxError;

/// Result of classifying one internal tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxMapping {
    /// Assigned authority code.
    pub code: AuthorityTaxCode,
    /// Whether the code is the fallback default rather than a rule match.
    pub fallback: bool,
}

impl TaxMapping {
    fn matched(code: AuthorityTaxCode) -> Self {
        Self {
            code,
            fallback: false,
        }
    }

    fn fallback(code: AuthorityTaxCode) -> Self {
        Self {
            code,
            fallback: true,
        }
    }
}

/// A line whose internal tax could not be classified by rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDiagnostic {
    /// 1-based line number.
    pub line: usize,
    /// Internal tax name.
    pub tax_name: String,
    /// Internal tax rate.
    pub rate: RateBps,
    /// Code assigned by fallback.
    pub assigned: AuthorityTaxCode,
    /// Operator-facing explanation.
    pub message: String,
}

/// Classifies internal taxes into an authority's tax scheme.
pub trait TaxMapper: Send + Sync {
    /// The authority whose scheme this mapper produces.
    fn authority(&self) -> Authority;

    /// Classify an internal tax. `None` means the line carries no tax.
    fn map(&self, tax: Option<&InternalTax>) -> TaxMapping;

    /// Levies co-applied with the given code.
    fn applicable_levies(&self, code: AuthorityTaxCode) -> Vec<LevyCode>;

    /// The code assigned to unclassifiable taxes.
    fn default_code(&self) -> AuthorityTaxCode;
}

fn name_contains(tax: &InternalTax, needle: &str) -> bool {
    tax.name.to_ascii_lowercase().contains(needle)
}

// ─── Kenya eTIMS ─────────────────────────────────────────────────────

/// Kenya eTIMS classification.
///
/// No tax → D, names containing "exempt" → A, 16% → B, 8% → E, 0% → C,
/// anything else → the default (B unless configured otherwise).
#[derive(Debug, Clone)]
pub struct EtimsTaxMapper {
    default: EtimsTaxType,
}

impl Default for EtimsTaxMapper {
    fn default() -> Self {
        Self {
            default: EtimsTaxType::B,
        }
    }
}

impl EtimsTaxMapper {
    /// Mapper with an explicit fallback code.
    pub fn with_default(default: EtimsTaxType) -> Self {
        Self { default }
    }
}

impl TaxMapper for EtimsTaxMapper {
    fn authority(&self) -> Authority {
        Authority::KraEtims
    }

    fn map(&self, tax: Option<&InternalTax>) -> TaxMapping {
        let Some(tax) = tax else {
            return TaxMapping::matched(AuthorityTaxCode::Etims(EtimsTaxType::D));
        };
        if name_contains(tax, "exempt") {
            return TaxMapping::matched(AuthorityTaxCode::Etims(EtimsTaxType::A));
        }
        match tax.rate.value() {
            1_600 => TaxMapping::matched(AuthorityTaxCode::Etims(EtimsTaxType::B)),
            800 => TaxMapping::matched(AuthorityTaxCode::Etims(EtimsTaxType::E)),
            0 => TaxMapping::matched(AuthorityTaxCode::Etims(EtimsTaxType::C)),
            _ => TaxMapping::fallback(self.default_code()),
        }
    }

    fn applicable_levies(&self, _code: AuthorityTaxCode) -> Vec<LevyCode> {
        Vec::new()
    }

    fn default_code(&self) -> AuthorityTaxCode {
        AuthorityTaxCode::Etims(self.default)
    }
}

// ─── Ghana E-VAT ─────────────────────────────────────────────────────

/// Ghana E-VAT classification.
///
/// No tax → D, "export" → C, "exempt" or 0% → A, 14.5–15.5% → B,
/// 2.5–3.5% → E, anything else → the default (B unless configured
/// otherwise). B carries NHIL and GETFund, plus the COVID-19 levy when
/// enabled.
#[derive(Debug, Clone)]
pub struct EvatTaxMapper {
    default: EvatTaxCode,
    covid_levy: bool,
}

impl Default for EvatTaxMapper {
    fn default() -> Self {
        Self {
            default: EvatTaxCode::B,
            covid_levy: false,
        }
    }
}

impl EvatTaxMapper {
    /// Mapper with an explicit fallback code and COVID-19 levy switch.
    pub fn new(default: EvatTaxCode, covid_levy: bool) -> Self {
        Self {
            default,
            covid_levy,
        }
    }
}

impl TaxMapper for EvatTaxMapper {
    fn authority(&self) -> Authority {
        Authority::GraEvat
    }

    fn map(&self, tax: Option<&InternalTax>) -> TaxMapping {
        let Some(tax) = tax else {
            return TaxMapping::matched(AuthorityTaxCode::Evat(EvatTaxCode::D));
        };
        if name_contains(tax, "export") {
            return TaxMapping::matched(AuthorityTaxCode::Evat(EvatTaxCode::C));
        }
        let bps = tax.rate.value();
        if name_contains(tax, "exempt") || bps == 0 {
            return TaxMapping::matched(AuthorityTaxCode::Evat(EvatTaxCode::A));
        }
        match bps {
            1_450..=1_550 => TaxMapping::matched(AuthorityTaxCode::Evat(EvatTaxCode::B)),
            250..=350 => TaxMapping::matched(AuthorityTaxCode::Evat(EvatTaxCode::E)),
            _ => TaxMapping::fallback(self.default_code()),
        }
    }

    fn applicable_levies(&self, code: AuthorityTaxCode) -> Vec<LevyCode> {
        match code {
            AuthorityTaxCode::Evat(EvatTaxCode::B) => {
                let mut levies = vec![LevyCode::Nhil, LevyCode::GetFund];
                if self.covid_levy {
                    levies.push(LevyCode::Covid19);
                }
                levies
            }
            _ => Vec::new(),
        }
    }

    fn default_code(&self) -> AuthorityTaxCode {
        AuthorityTaxCode::Evat(self.default)
    }
}

/// Build the mapper for a configuration, honouring its default-code
/// override and levy switches.
///
/// # Errors
///
/// [`TaxError::InvalidDefaultCode`] if the override is not a code of the
/// configured authority.
pub fn mapper_for(config: &FiscalConfig) -> Result<Box<dyn TaxMapper>, TaxError> {
    let default = match config.default_tax_code.as_deref() {
        Some(code) => Some(
            AuthorityTaxCode::parse_for(config.authority, code).ok_or_else(|| {
                TaxError::InvalidDefaultCode {
                    authority: config.authority.to_string(),
                    code: code.to_string(),
                }
            })?,
        ),
        None => None,
    };
    Ok(match config.authority {
        Authority::KraEtims => {
            let default = match default {
                Some(AuthorityTaxCode::Etims(t)) => t,
                _ => EtimsTaxType::B,
            };
            Box::new(EtimsTaxMapper::with_default(default))
        }
        Authority::GraEvat => {
            let default = match default {
                Some(AuthorityTaxCode::Evat(c)) => c,
                _ => EvatTaxCode::B,
            };
            Box::new(EvatTaxMapper::new(default, config.covid_levy))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tax(name: &str, bps: u32) -> InternalTax {
        InternalTax::new(name, RateBps::from_bps(bps))
    }

    #[test]
    fn etims_rules() {
        let m = EtimsTaxMapper::default();
        let code = |t: Option<&InternalTax>| m.map(t).code;
        assert_eq!(code(None), AuthorityTaxCode::Etims(EtimsTaxType::D));
        assert_eq!(
            code(Some(&tax("VAT Exempt", 0))),
            AuthorityTaxCode::Etims(EtimsTaxType::A)
        );
        assert_eq!(
            code(Some(&tax("VAT 16%", 1_600))),
            AuthorityTaxCode::Etims(EtimsTaxType::B)
        );
        assert_eq!(
            code(Some(&tax("VAT 8%", 800))),
            AuthorityTaxCode::Etims(EtimsTaxType::E)
        );
        assert_eq!(
            code(Some(&tax("Zero rated", 0))),
            AuthorityTaxCode::Etims(EtimsTaxType::C)
        );
    }

    #[test]
    fn etims_unknown_rate_falls_back() {
        let m = EtimsTaxMapper::default();
        let mapping = m.map(Some(&tax("VAT 14%", 1_400)));
        assert!(mapping.fallback);
        assert_eq!(mapping.code, AuthorityTaxCode::Etims(EtimsTaxType::B));

        let m = EtimsTaxMapper::with_default(EtimsTaxType::D);
        assert_eq!(
            m.map(Some(&tax("VAT 14%", 1_400))).code,
            AuthorityTaxCode::Etims(EtimsTaxType::D)
        );
    }

    #[test]
    fn evat_rules() {
        let m = EvatTaxMapper::default();
        let code = |t: Option<&InternalTax>| m.map(t).code;
        assert_eq!(code(None), AuthorityTaxCode::Evat(EvatTaxCode::D));
        assert_eq!(
            code(Some(&tax("Export 0%", 0))),
            AuthorityTaxCode::Evat(EvatTaxCode::C)
        );
        assert_eq!(
            code(Some(&tax("Exempt supplies", 1_500))),
            AuthorityTaxCode::Evat(EvatTaxCode::A)
        );
        assert_eq!(code(Some(&tax("Zero", 0))), AuthorityTaxCode::Evat(EvatTaxCode::A));
        assert_eq!(
            code(Some(&tax("VAT 15%", 1_500))),
            AuthorityTaxCode::Evat(EvatTaxCode::B)
        );
        assert_eq!(
            code(Some(&tax("VAT", 1_550))),
            AuthorityTaxCode::Evat(EvatTaxCode::B)
        );
        assert_eq!(
            code(Some(&tax("VFRS 3%", 300))),
            AuthorityTaxCode::Evat(EvatTaxCode::E)
        );
        let odd = m.map(Some(&tax("Mystery 12.5%", 1_250)));
        assert!(odd.fallback);
        assert_eq!(odd.code, AuthorityTaxCode::Evat(EvatTaxCode::B));
    }

    #[test]
    fn evat_levies_on_standard_only() {
        let m = EvatTaxMapper::default();
        assert_eq!(
            m.applicable_levies(AuthorityTaxCode::Evat(EvatTaxCode::B)),
            vec![LevyCode::Nhil, LevyCode::GetFund]
        );
        assert!(m
            .applicable_levies(AuthorityTaxCode::Evat(EvatTaxCode::E))
            .is_empty());
        let covid = EvatTaxMapper::new(EvatTaxCode::B, true);
        assert_eq!(
            covid.applicable_levies(AuthorityTaxCode::Evat(EvatTaxCode::B)),
            vec![LevyCode::Nhil, LevyCode::GetFund, LevyCode::Covid19]
        );
    }

    #[test]
    fn mapper_for_config() {
        let mut cfg =
            FiscalConfig::local_mock(Authority::GraEvat, "http://127.0.0.1:1", "C0001").unwrap();
        cfg.default_tax_code = Some("TAX_D".into());
        cfg.covid_levy = true;
        let m = mapper_for(&cfg).unwrap();
        assert_eq!(m.authority(), Authority::GraEvat);
        assert_eq!(m.default_code(), AuthorityTaxCode::Evat(EvatTaxCode::D));
        assert_eq!(
            m.applicable_levies(AuthorityTaxCode::Evat(EvatTaxCode::B)).len(),
            3
        );

        cfg.default_tax_code = Some("Z".into());
        assert!(matches!(
            mapper_for(&cfg),
            Err(TaxError::InvalidDefaultCode { .. })
        ));
    }

    #[test]
    fn mapping_is_deterministic() {
        let m = EtimsTaxMapper::default();
        let t = tax("VAT 16%", 1_600);
        assert_eq!(m.map(Some(&t)), m.map(Some(&t)));
    }
}
