//! Account balances and exchange-rate lookups.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::{num_field, str_field};

/// Base currency all balances are reported in.
pub const CURRENCY_BTC: &str = "BTC";

/// Exchange rates keyed `"{from}-{to}"`, e.g. `"BTC-USD"`.
pub type ExchangeRateTable = HashMap<String, f64>;

/// Build the rate lookup table from the raw exchange-rate list, keeping
/// only pairs whose source currency is BTC.
pub fn build_rate_table(rates: &Value) -> ExchangeRateTable {
    let mut table = ExchangeRateTable::new();
    let Some(entries) = rates.as_array() else {
        return table;
    };
    for rate in entries {
        let from = str_field(rate, "fromCurrency");
        if from != CURRENCY_BTC {
            continue;
        }
        let to = str_field(rate, "toCurrency");
        table.insert(format!("{from}-{to}"), num_field(rate, "exchangeRate"));
    }
    table
}

/// Total, available, and pending balances of the organization's
/// account, in BTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AccountBalances {
    pub total: f64,
    pub available: f64,
    pub pending: f64,
}

impl AccountBalances {
    /// Parse from the accounts payload. Balances live under the `total`
    /// object; the API reports them as numeric strings.
    pub fn parse(data: &Value) -> Self {
        let total = data.get("total").cloned().unwrap_or(Value::Null);
        Self {
            total: num_field(&total, "totalBalance"),
            available: num_field(&total, "available"),
            pending: num_field(&total, "pending"),
        }
    }

    /// Balances converted at `rate` and rounded to two decimals, for
    /// display in a non-BTC currency.
    pub fn converted(&self, rate: f64) -> Self {
        Self {
            total: round2(self.total * rate),
            available: round2(self.available * rate),
            pending: round2(self.pending * rate),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_balances() {
        let balances = AccountBalances::parse(&json!({
            "total": {
                "currency": "BTC",
                "totalBalance": "0.00150000",
                "available": "0.00100000",
                "pending": "0.00050000",
            }
        }));
        assert_eq!(balances.total, 0.0015);
        assert_eq!(balances.available, 0.001);
        assert_eq!(balances.pending, 0.0005);
    }

    #[test]
    fn missing_total_defaults_to_zero() {
        assert_eq!(AccountBalances::parse(&json!({})), AccountBalances::default());
    }

    #[test]
    fn rate_table_keeps_only_btc_sources() {
        let table = build_rate_table(&json!([
            {"fromCurrency": "BTC", "toCurrency": "USD", "exchangeRate": "97000.5"},
            {"fromCurrency": "BTC", "toCurrency": "EUR", "exchangeRate": 90000.25},
            {"fromCurrency": "ETH", "toCurrency": "USD", "exchangeRate": "3500.0"},
        ]));

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("BTC-USD"), Some(&97000.5));
        assert_eq!(table.get("BTC-EUR"), Some(&90000.25));
        assert!(table.get("ETH-USD").is_none());
    }

    #[test]
    fn rate_table_from_non_array_is_empty() {
        assert!(build_rate_table(&json!({"list": []})).is_empty());
    }

    #[test]
    fn conversion_rounds_to_cents() {
        let balances = AccountBalances {
            total: 0.0015,
            available: 0.001,
            pending: 0.0005,
        };
        let usd = balances.converted(97000.0);
        assert_eq!(usd.total, 145.5);
        assert_eq!(usd.available, 97.0);
        assert_eq!(usd.pending, 48.5);
    }
}
