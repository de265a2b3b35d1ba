//! Minor-unit <-> major-unit decimal conversion.
//!
//! Amounts are stored as integer minor units (kobo). The gateway speaks
//! major units as decimal strings or numbers (`"1500.00"`, `1500`).

use onenumber_core::types::MinorUnits;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::gateway::GatewayError;

/// Number of minor units per major unit for every supported currency.
const MINOR_PER_MAJOR: i64 = 100;

/// Render minor units as a major-unit string with two decimals.
pub fn to_major_string(amount: MinorUnits) -> String {
    Decimal::new(amount, 2).to_string()
}

/// Parse a major-unit amount from the gateway into minor units.
///
/// Accepts JSON strings and numbers. Fractions smaller than one minor unit
/// are rejected rather than rounded.
pub fn parse_major(value: &serde_json::Value) -> Result<MinorUnits, GatewayError> {
    let decimal = match value {
        serde_json::Value::String(s) => s
            .trim()
            .replace(',', "")
            .parse::<Decimal>()
            .map_err(|e| GatewayError::InvalidResponse(format!("amount '{s}': {e}")))?,
        serde_json::Value::Number(n) => n
            .to_string()
            .parse::<Decimal>()
            .map_err(|e| GatewayError::InvalidResponse(format!("amount {n}: {e}")))?,
        other => {
            return Err(GatewayError::InvalidResponse(format!(
                "amount has unexpected type: {other}"
            )))
        }
    };

    let minor = decimal * Decimal::from(MINOR_PER_MAJOR);
    if minor.fract() != Decimal::ZERO {
        return Err(GatewayError::InvalidResponse(format!(
            "amount {decimal} has sub-minor-unit precision"
        )));
    }
    minor
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidResponse(format!("amount {decimal} out of range")))
}
