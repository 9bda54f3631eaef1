//! Payout records.

use serde::Serialize;
use serde_json::Value;

use super::{int_field, num_field, str_field};

/// Account-type tag of payouts that credit the operator. Other tags mark
/// pool-internal transfers.
pub const PAYOUT_USER: &str = "USER";

/// A recorded disbursement of earned currency.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Payout {
    pub id: String,
    /// Creation time, epoch milliseconds.
    pub created: i64,
    pub amount: f64,
    pub fee: f64,
    pub currency: String,
    pub account_type: String,
}

impl Payout {
    pub fn parse(data: &Value) -> Self {
        Self {
            id: str_field(data, "id"),
            created: int_field(data, "created"),
            amount: num_field(data, "amount"),
            fee: num_field(data, "feeAmount"),
            currency: nested_enum_name(data, "currency"),
            account_type: nested_enum_name(data, "accountType"),
        }
    }

    /// Whether this payout credited the operator's own account.
    pub fn is_user(&self) -> bool {
        self.account_type == PAYOUT_USER
    }
}

/// Read `{key: {"enumName": ...}}`, defaulting to `"Unknown"`.
fn nested_enum_name(data: &Value, key: &str) -> String {
    data.get(key)
        .map(|nested| str_field(nested, "enumName"))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}
