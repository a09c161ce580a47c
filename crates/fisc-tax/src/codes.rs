//! # Authority Tax and Levy Codes
//!
//! Each authority publishes a closed set of tax categories, lettered A to E
//! in both supported schemes but with different meanings and rates. They
//! are modelled as separate enums wrapped in [`AuthorityTaxCode`] so a
//! Kenyan code can never be reported to Ghana.

use serde::{Deserialize, Serialize};

use fisc_core::{Authority, RateBps};

/// Number of tax categories per authority (A..E).
pub const CATEGORY_COUNT: usize = 5;

/// Kenya eTIMS tax type (`taxTyCd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EtimsTaxType {
    /// Exempt.
    A,
    /// Standard rate, 16%.
    B,
    /// Zero rated, 0%.
    C,
    /// Non-VAT.
    D,
    /// Reduced rate, 8%.
    E,
}

impl EtimsTaxType {
    /// All tax types in letter order.
    pub const ALL: [EtimsTaxType; CATEGORY_COUNT] = [Self::A, Self::B, Self::C, Self::D, Self::E];

    /// Statutory rate.
    pub fn rate(&self) -> RateBps {
        match self {
            Self::B => RateBps::from_bps(1_600),
            Self::E => RateBps::from_bps(800),
            Self::A | Self::C | Self::D => RateBps::ZERO,
        }
    }

    /// Human-readable description.
    pub fn label(&self) -> &'static str {
        match self {
            Self::A => "Exempt",
            Self::B => "Standard 16%",
            Self::C => "Zero rated",
            Self::D => "Non-VAT",
            Self::E => "Reduced 8%",
        }
    }

    /// Parse a letter code (`"B"`).
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            "E" => Some(Self::E),
            _ => None,
        }
    }
}

/// Ghana E-VAT tax code (`TAX_CODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvatTaxCode {
    /// Exempt.
    A,
    /// Standard rate, 15%, with NHIL and GETFund levies.
    B,
    /// Export / zero rated.
    C,
    /// Non-taxable.
    D,
    /// VAT flat rate scheme, 3%.
    E,
}

impl EvatTaxCode {
    /// All tax codes in letter order.
    pub const ALL: [EvatTaxCode; CATEGORY_COUNT] = [Self::A, Self::B, Self::C, Self::D, Self::E];

    /// Statutory rate.
    pub fn rate(&self) -> RateBps {
        match self {
            Self::B => RateBps::from_bps(1_500),
            Self::E => RateBps::from_bps(300),
            Self::A | Self::C | Self::D => RateBps::ZERO,
        }
    }

    /// Human-readable description.
    pub fn label(&self) -> &'static str {
        match self {
            Self::A => "Exempt",
            Self::B => "Standard 15%",
            Self::C => "Export / zero rated",
            Self::D => "Non-taxable",
            Self::E => "Flat rate 3%",
        }
    }

    /// Parse a letter (`"B"`) or wire code (`"TAX_B"`).
    pub fn parse(code: &str) -> Option<Self> {
        let upper = code.trim().to_ascii_uppercase();
        match upper.strip_prefix("TAX_").unwrap_or(&upper) {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            "E" => Some(Self::E),
            _ => None,
        }
    }
}

/// A tax category in the scheme of one authority.
///
/// Produced once per line by a [`TaxMapper`](crate::TaxMapper) and carried
/// unchanged through payload building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "code", rename_all = "snake_case")]
pub enum AuthorityTaxCode {
    /// Kenya eTIMS.
    Etims(EtimsTaxType),
    /// Ghana E-VAT.
    Evat(EvatTaxCode),
}

impl AuthorityTaxCode {
    /// The authority whose scheme this code belongs to.
    pub fn authority(&self) -> Authority {
        match self {
            Self::Etims(_) => Authority::KraEtims,
            Self::Evat(_) => Authority::GraEvat,
        }
    }

    /// Statutory rate.
    pub fn rate(&self) -> RateBps {
        match self {
            Self::Etims(t) => t.rate(),
            Self::Evat(c) => c.rate(),
        }
    }

    /// Category letter, `"A"` to `"E"`.
    pub fn letter(&self) -> &'static str {
        const LETTERS: [&str; CATEGORY_COUNT] = ["A", "B", "C", "D", "E"];
        LETTERS[self.slot()]
    }

    /// Position of the category in A..E order, for per-category totals.
    pub fn slot(&self) -> usize {
        match self {
            Self::Etims(t) => *t as usize,
            Self::Evat(c) => *c as usize,
        }
    }

    /// The code as the authority expects it on the wire
    /// (eTIMS `"B"`, E-VAT `"TAX_B"`).
    pub fn wire_code(&self) -> String {
        match self {
            Self::Etims(_) => self.letter().to_string(),
            Self::Evat(_) => format!("TAX_{}", self.letter()),
        }
    }

    /// Parse a configured default code for the given authority.
    pub fn parse_for(authority: Authority, code: &str) -> Option<Self> {
        match authority {
            Authority::KraEtims => EtimsTaxType::parse(code).map(Self::Etims),
            Authority::GraEvat => EvatTaxCode::parse(code).map(Self::Evat),
        }
    }
}

impl std::fmt::Display for AuthorityTaxCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.authority(), self.letter())
    }
}

/// A levy reported separately from VAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevyCode {
    /// National Health Insurance Levy, 2.5% (E-VAT `LEVY_A`).
    Nhil,
    /// Ghana Education Trust Fund levy, 2.5% (E-VAT `LEVY_B`).
    GetFund,
    /// COVID-19 Health Recovery Levy, 1% (E-VAT `LEVY_D`).
    Covid19,
}

impl LevyCode {
    /// Statutory rate.
    pub fn rate(&self) -> RateBps {
        match self {
            Self::Nhil | Self::GetFund => RateBps::from_bps(250),
            Self::Covid19 => RateBps::from_bps(100),
        }
    }

    /// E-VAT wire field prefix.
    pub fn wire_field(&self) -> &'static str {
        match self {
            Self::Nhil => "LEVY_A",
            Self::GetFund => "LEVY_B",
            Self::Covid19 => "LEVY_D",
        }
    }
}
