//! # Money, Rates and Quantities
//!
//! Amounts are `i64` values in the currency's minor unit (cents for KES and
//! GHS). Rates are [`RateBps`] basis points (1600 = 16%). Quantities are
//! [`Quantity`] thousandths so that `1.5 kg` is exact.
//!
//! All rounding is round-half-up (away from zero for negative values) and is
//! performed on `i128` intermediates so no product of a realistic amount and
//! rate can overflow.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Basis-point denominator: 10_000 bps = 100%.
pub const BPS_DENOMINATOR: i64 = 10_000;

/// Quantity denominator: quantities are stored in thousandths.
pub const QUANTITY_SCALE: i64 = 1_000;

// ─── Rounding ────────────────────────────────────────────────────────

/// Divide with round-half-up semantics (half away from zero).
///
/// Returns `None` if the denominator is zero or the result does not fit
/// in an `i64`.
pub fn round_half_up_div(numerator: i128, denominator: i128) -> Option<i64> {
    if denominator == 0 {
        return None;
    }
    let (num, den) = if denominator < 0 {
        (-numerator, -denominator)
    } else {
        (numerator, denominator)
    };
    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        -((-num + half) / den)
    };
    i64::try_from(rounded).ok()
}

/// Apply a rate to a base amount in minor units, rounding half up.
///
/// Saturates at `i64::MAX`/`i64::MIN`; realistic invoice amounts are many
/// orders of magnitude below that.
pub fn apply_rate(base: i64, rate: RateBps) -> i64 {
    round_half_up_div(
        i128::from(base) * i128::from(rate.value()),
        i128::from(BPS_DENOMINATOR),
    )
    .unwrap_or(if base < 0 { i64::MIN } else { i64::MAX })
}

/// Extract the taxable base from a tax-inclusive amount:
/// `round(gross * 10000 / (10000 + combined_rate))`.
pub fn extract_base(gross: i64, combined_rate: RateBps) -> i64 {
    let den = i128::from(BPS_DENOMINATOR) + i128::from(combined_rate.value());
    round_half_up_div(i128::from(gross) * i128::from(BPS_DENOMINATOR), den).unwrap_or(gross)
}

/// Extended amount of `quantity` units at `unit_price` minor units, rounded
/// half up to the minor unit.
pub fn extend(quantity: Quantity, unit_price: i64) -> i64 {
    round_half_up_div(
        i128::from(quantity.thousandths()) * i128::from(unit_price),
        i128::from(QUANTITY_SCALE),
    )
    .unwrap_or(i64::MAX)
}

// ─── Decimal text ↔ minor units ──────────────────────────────────────

/// Parse a decimal string into minor units for a currency with `exponent`
/// decimal places. Extra fractional digits are rejected rather than
/// silently truncated.
///
/// ```
/// use fisc_core::money::parse_minor;
/// assert_eq!(parse_minor("1000.00", 2), Some(100_000));
/// assert_eq!(parse_minor("-2.5", 2), Some(-250));
/// assert_eq!(parse_minor("12", 0), Some(12));
/// assert_eq!(parse_minor("1.234", 2), None);
/// ```
pub fn parse_minor(s: &str, exponent: u32) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
        || frac_part.len() > exponent as usize
    {
        return None;
    }
    let scale = 10i64.checked_pow(exponent)?;
    let int_value: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let mut frac_value: i64 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().ok()?
    };
    for _ in frac_part.len()..exponent as usize {
        frac_value = frac_value.checked_mul(10)?;
    }
    let magnitude = int_value.checked_mul(scale)?.checked_add(frac_value)?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Format minor units as a fixed-point decimal string with `exponent`
/// decimal places (`100050`, 2 → `"1000.50"`).
pub fn format_minor(minor: i64, exponent: u32) -> String {
    if exponent == 0 {
        return minor.to_string();
    }
    let scale = 10u64.pow(exponent);
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!(
        "{sign}{}.{:0width$}",
        abs / scale,
        abs % scale,
        width = exponent as usize
    )
}

/// Convert minor units to a major-unit `f64` for authority wire formats that
/// require JSON numbers. The result is the nearest double to the exact
/// decimal, so `serde_json` prints it with no spurious digits.
pub fn to_major(minor: i64, exponent: u32) -> f64 {
    // Go through the decimal text so that e.g. 15025 cents becomes exactly
    // the double nearest to 150.25.
    format_minor(minor, exponent).parse().unwrap_or(0.0)
}

// ─── RateBps ─────────────────────────────────────────────────────────

/// A percentage rate in basis points (`1600` = 16%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RateBps(u32);

impl RateBps {
    /// Zero percent.
    pub const ZERO: RateBps = RateBps(0);

    /// Create a rate, validating it lies in 0..=100%.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRate`] above 10 000 bps.
    pub fn new(bps: u32) -> Result<Self, ValidationError> {
        if i64::from(bps) > BPS_DENOMINATOR {
            return Err(ValidationError::InvalidRate(bps));
        }
        Ok(Self(bps))
    }

    /// Construct a compile-time constant rate. Callers must pass a value
    /// in range; used for statutory rate tables.
    pub const fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    /// Parse a percentage string (`"16"`, `"2.5"`, `"15.00"`).
    pub fn from_percent_str(s: &str) -> Result<Self, ValidationError> {
        let bps = parse_minor(s, 2)
            .filter(|v| *v >= 0)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ValidationError::InvalidAmount(s.to_string()))?;
        Self::new(bps)
    }

    /// The raw basis-point value.
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The rate as a percentage number (`1600` → `16.0`).
    pub fn as_percent(&self) -> f64 {
        to_major(i64::from(self.0), 2)
    }

    /// Sum of two rates (saturating at 100%).
    pub fn plus(self, other: RateBps) -> RateBps {
        RateBps(self.0.saturating_add(other.0).min(BPS_DENOMINATOR as u32))
    }
}

impl std::fmt::Display for RateBps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", format_minor(i64::from(self.0), 2))
    }
}

impl TryFrom<u32> for RateBps {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RateBps> for u32 {
    fn from(rate: RateBps) -> Self {
        rate.0
    }
}

// ─── Quantity ────────────────────────────────────────────────────────

/// A positive line quantity in thousandths.
///
/// Serializes as a decimal string (`"1.500"`); deserializes from either a
/// decimal string or a JSON integer. Floats are rejected so that no
/// binary-fraction error enters the arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quantity(i64);

impl Quantity {
    /// Create from thousandths.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidQuantity`] if not positive.
    pub fn from_thousandths(thousandths: i64) -> Result<Self, ValidationError> {
        if thousandths <= 0 {
            return Err(ValidationError::InvalidQuantity(thousandths.to_string()));
        }
        Ok(Self(thousandths))
    }

    /// Whole units.
    pub fn units(units: i64) -> Result<Self, ValidationError> {
        units
            .checked_mul(QUANTITY_SCALE)
            .ok_or_else(|| ValidationError::InvalidQuantity(units.to_string()))
            .and_then(Self::from_thousandths)
    }

    /// Parse a decimal string with at most three decimals.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        parse_minor(s, 3)
            .ok_or_else(|| ValidationError::InvalidQuantity(s.to_string()))
            .and_then(Self::from_thousandths)
    }

    /// The raw thousandths value.
    pub fn thousandths(&self) -> i64 {
        self.0
    }

    /// The quantity as an `f64` for wire formats.
    pub fn as_f64(&self) -> f64 {
        to_major(self.0, 3)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_minor(self.0, 3))
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Int(units) => Quantity::units(units).map_err(serde::de::Error::custom),
            Raw::Text(s) => Quantity::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

// ─── Currency ────────────────────────────────────────────────────────

/// ISO 4217 currency code with its minor-unit exponent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Create a currency from a three-letter code.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCurrency`] unless the trimmed,
    /// uppercased value is exactly three ASCII letters.
    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = code.into();
        let s = raw.trim().to_ascii_uppercase();
        if s.len() != 3 || !s.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency(raw));
        }
        Ok(Self(s))
    }

    /// The currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Number of decimal places in the minor unit.
    pub fn exponent(&self) -> u32 {
        match self.0.as_str() {
            "UGX" | "RWF" | "BIF" | "JPY" | "KRW" | "XAF" | "XOF" | "CLP" | "VND" => 0,
            "BHD" | "KWD" | "OMR" | "JOD" | "TND" | "LYD" | "IQD" => 3,
            _ => 2,
        }
    }

    /// Format minor units in this currency.
    pub fn format(&self, minor: i64) -> String {
        format_minor(minor, self.exponent())
    }

    /// Minor units as a major-unit `f64` for wire formats.
    pub fn to_major(&self, minor: i64) -> f64 {
        to_major(minor, self.exponent())
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}
