//! Unit Conversion Utilities
//!
//! Exact conversions between integer minor units and decimal amount strings.
//! Amounts are carried as arbitrary-precision decimals, never as binary
//! floating point, and a conversion that cannot be represented exactly at the
//! requested precision fails instead of rounding.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;
use thiserror::Error;

/// Decimal places of a UTXO coin's smallest unit (satoshi / litoshi)
pub const COIN_DECIMALS: u32 = 8;

/// Decimal places used by the destination ledger's amounts
pub const TARGET_DECIMALS: u32 = 7;

/// Minor units per whole coin
pub const MINOR_UNITS_PER_COIN: u64 = 100_000_000;

/// Amount conversion errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("negative amount: {0}")]
    NegativeAmount(String),

    #[error("precision loss: {amount} is not representable with {decimal_places} decimal places")]
    PrecisionLoss { amount: String, decimal_places: u32 },

    #[error("amount out of range: {0}")]
    Overflow(String),
}

/// Converts amounts between a source chain's minor units and the target
/// ledger's fixed-precision decimal strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueConverter {
    source_decimals: u32,
    target_decimals: u32,
}

impl ValueConverter {
    pub fn new(source_decimals: u32, target_decimals: u32) -> Self {
        Self {
            source_decimals,
            target_decimals,
        }
    }

    pub fn source_decimals(&self) -> u32 {
        self.source_decimals
    }

    pub fn target_decimals(&self) -> u32 {
        self.target_decimals
    }

    /// Render source minor units as a target-precision decimal string
    ///
    /// e.g. 100000000 litoshi at (8 → 7) -> "1.0000000"
    pub fn to_target(&self, minor_units: u64) -> Result<String, ConversionError> {
        let source = minor_units_to_decimal(minor_units, self.source_decimals);
        convert_precision(&source, self.source_decimals, self.target_decimals)
    }

    /// Parse a source-chain decimal amount (as reported by the daemon) into minor units
    pub fn to_minor_units(&self, amount: &str) -> Result<u64, ConversionError> {
        decimal_to_minor_units(amount, self.source_decimals)
    }
}

impl Default for ValueConverter {
    fn default() -> Self {
        Self::new(COIN_DECIMALS, TARGET_DECIMALS)
    }
}

/// Render an integer minor-unit amount with exactly `decimal_places` digits
/// after the point, zero-padded, never in scientific notation.
pub fn minor_units_to_decimal(minor_units: u64, decimal_places: u32) -> String {
    render_fixed(&BigInt::from(minor_units), decimal_places)
}

/// Convert a decimal amount string into integer minor units at `decimal_places`
pub fn decimal_to_minor_units(amount: &str, decimal_places: u32) -> Result<u64, ConversionError> {
    let value = parse_amount(amount)?;
    let units = scale_exact(&value, decimal_places, amount)?;

    units
        .to_u64()
        .ok_or_else(|| ConversionError::Overflow(amount.to_string()))
}

/// Re-express a decimal amount given at `source_places` precision with exactly
/// `target_places` decimals.
///
/// Fails if the amount carries more precision than the source allows, or if
/// the target precision cannot represent it exactly.
pub fn convert_precision(
    amount: &str,
    source_places: u32,
    target_places: u32,
) -> Result<String, ConversionError> {
    let value = parse_amount(amount)?;
    scale_exact(&value, source_places, amount)?;
    let units = scale_exact(&value, target_places, amount)?;

    Ok(render_fixed(&units, target_places))
}

fn parse_amount(amount: &str) -> Result<BigDecimal, ConversionError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(ConversionError::InvalidAmount(amount.to_string()));
    }

    let value = BigDecimal::from_str(trimmed)
        .map_err(|_| ConversionError::InvalidAmount(amount.to_string()))?;

    if value.sign() == Sign::Minus {
        return Err(ConversionError::NegativeAmount(amount.to_string()));
    }

    Ok(value)
}

fn ten_pow(places: u32) -> BigDecimal {
    BigDecimal::new(BigInt::from(1), -(places as i64))
}

/// Multiply by 10^places; the result must be an exact integer
fn scale_exact(
    value: &BigDecimal,
    places: u32,
    original: &str,
) -> Result<BigInt, ConversionError> {
    let scaled = value.clone() * ten_pow(places);

    if !scaled.is_integer() {
        return Err(ConversionError::PrecisionLoss {
            amount: original.trim().to_string(),
            decimal_places: places,
        });
    }

    let (units, _) = scaled.with_scale(0).into_bigint_and_exponent();
    Ok(units)
}

fn render_fixed(units: &BigInt, places: u32) -> String {
    let places = places as usize;
    let mut digits = units.magnitude().to_string();

    if digits.len() <= places {
        let padding = "0".repeat(places + 1 - digits.len());
        digits.insert_str(0, &padding);
    }

    let split = digits.len() - places;
    let mut rendered = String::with_capacity(digits.len() + 2);
    if units.sign() == Sign::Minus {
        rendered.push('-');
    }
    rendered.push_str(&digits[..split]);
    if places > 0 {
        rendered.push('.');
        rendered.push_str(&digits[split..]);
    }

    rendered
}
