//! Typed views over raw API payloads.
//!
//! The API reports fields inconsistently: numbers arrive as JSON numbers
//! or as numeric strings, optional objects are simply absent, and a rig
//! may carry a device entry with half its fields missing. Parsers here
//! therefore read `serde_json::Value` with explicit per-field defaults:
//! a malformed single entity yields a zeroed entity instead of an error,
//! so one bad device never costs the caller an entire snapshot.

pub mod account;
pub mod payout;
pub mod rig;

pub use account::{AccountBalances, CURRENCY_BTC, ExchangeRateTable, build_rate_table};
pub use payout::{PAYOUT_USER, Payout};
pub use rig::{
    INACTIVE_TEMPERATURE, MiningAlgorithm, MiningRig, MiningRigDevice, RigStatus,
    parse_device_name,
};

use serde_json::Value;

/// Read a string field, defaulting to `""`.
pub(crate) fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Read a numeric field as `f64`, accepting either a JSON number or a
/// numeric string, defaulting to `0.0`.
pub(crate) fn num_field(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        _ => 0.0,
    }
}

/// Read an integer field, accepting either a JSON number or a numeric
/// string, defaulting to `0`.
pub(crate) fn int_field(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .unwrap_or_else(|| n.as_f64().unwrap_or_default() as i64),
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        _ => 0,
    }
}
