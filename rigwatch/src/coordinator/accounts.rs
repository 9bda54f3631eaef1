//! Account-balance coordinator.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::Serialize;

use crate::client::{MiningApi, RatesApi};
use crate::config::DisplayCurrency;
use crate::model::{AccountBalances, CURRENCY_BTC, ExchangeRateTable, build_rate_table};

use super::{Coordinator, SnapshotCell};

/// Balances plus the BTC exchange-rate table fetched in the same cycle.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AccountsSnapshot {
    pub balances: AccountBalances,
    pub rates: ExchangeRateTable,
}

impl AccountsSnapshot {
    /// Exchange rate for displaying BTC amounts in `currency`.
    pub fn rate_to(&self, currency: &str) -> Option<f64> {
        self.rates.get(&format!("{CURRENCY_BTC}-{currency}")).copied()
    }

    /// Balances in the host's display currency. `None` when the rate
    /// list carried no entry for the pair.
    pub fn display_balances(&self, currency: DisplayCurrency) -> Option<AccountBalances> {
        if currency == DisplayCurrency::Btc {
            return Some(self.balances);
        }
        self.rate_to(&currency.to_string())
            .map(|rate| self.balances.converted(rate))
    }
}

/// Polls account balances hourly, together with the public exchange-rate
/// list so balance and rate always come from the same cycle. A failure
/// in either fetch fails the whole refresh; there is no partial
/// snapshot.
pub struct AccountsCoordinator {
    api: Arc<dyn MiningApi>,
    rates: Arc<dyn RatesApi>,
    cell: SnapshotCell<AccountsSnapshot>,
}

impl AccountsCoordinator {
    pub fn new(api: Arc<dyn MiningApi>, rates: Arc<dyn RatesApi>) -> Self {
        Self {
            api,
            rates,
            cell: SnapshotCell::default(),
        }
    }

    /// Fetch balances and exchange rates, replacing the snapshot.
    /// Coalesces with an in-flight refresh; absorbs failures into the
    /// success flag.
    pub async fn refresh(&self) {
        self.cell
            .run_refresh("accounts", async {
                let accounts = self.api.accounts().await?;
                let rate_list = self.rates.exchange_rates().await?;
                Ok(AccountsSnapshot {
                    balances: AccountBalances::parse(&accounts),
                    rates: build_rate_table(&rate_list),
                })
            })
            .await;
    }

    pub fn current_snapshot(&self) -> Option<Arc<AccountsSnapshot>> {
        self.cell.current()
    }

    pub fn last_update_success(&self) -> bool {
        self.cell.last_success()
    }

    pub fn last_updated(&self) -> Option<SystemTime> {
        self.cell.last_updated()
    }
}

#[async_trait]
impl Coordinator for AccountsCoordinator {
    fn name(&self) -> &'static str {
        "accounts"
    }

    async fn refresh(&self) {
        AccountsCoordinator::refresh(self).await;
    }

    fn last_update_success(&self) -> bool {
        AccountsCoordinator::last_update_success(self)
    }
}
