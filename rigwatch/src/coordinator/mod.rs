//! Polled, cached resource state.
//!
//! Each coordinator owns one snapshot slot for a resource class and
//! refreshes it on a fixed schedule or on demand. Within a coordinator,
//! refreshes are strictly sequential: concurrent `refresh()` calls
//! coalesce into the in-flight cycle instead of fetching twice. A failed
//! refresh keeps the previous data and drops the success flag, so
//! consumers see stale-but-labeled state rather than a gap. Errors never
//! escape into the caller's polling loop.
//!
//! # State machine
//!
//! ```text
//!                 refresh()            fetch ok
//!  Uninitialized ──────────► Refreshing ─────────► Ready
//!                               ▲   │                │
//!                  tick /       │   │ fetch error    │
//!                  on demand    │   ▼                │
//!                               └── Failed ◄─────────┘
//!                                   (previous snapshot retained)
//! ```

pub mod accounts;
pub mod payouts;
pub mod rigs;

pub use accounts::{AccountsCoordinator, AccountsSnapshot};
pub use payouts::{PAYOUT_PAGE_SIZE, PayoutsCoordinator, PayoutsSnapshot};
pub use rigs::{RigsCoordinator, RigsSnapshot};

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::ApiError;
use crate::tracing::prelude::*;

/// Refresh interval for rig telemetry (the hot path).
pub const RIGS_INTERVAL: Duration = Duration::from_secs(60);

/// Refresh interval for account balances and exchange rates.
pub const ACCOUNTS_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Refresh interval for payout history.
pub const PAYOUTS_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Scheduled-refresh surface shared by the coordinators, for the poll
/// loop and host wiring.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Resource-class label used in logs.
    fn name(&self) -> &'static str;

    /// Fetch and replace the snapshot. Failures are absorbed into the
    /// success flag; this never returns an error.
    async fn refresh(&self);

    /// Whether the most recent refresh succeeded.
    fn last_update_success(&self) -> bool;
}

/// Drive a coordinator on a fixed period until cancelled.
///
/// The first tick fires immediately. If a refresh overruns the period,
/// missed ticks are delayed rather than bursted.
pub async fn poll(
    coordinator: Arc<dyn Coordinator>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => coordinator.refresh().await,
            _ = shutdown.cancelled() => {
                debug!(coordinator = coordinator.name(), "poller stopped");
                break;
            }
        }
    }
}

/// Cached state of one resource class.
struct Slot<T> {
    data: Option<Arc<T>>,
    last_success: bool,
    last_updated: Option<SystemTime>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_success: false,
            last_updated: None,
        }
    }
}

/// Snapshot slot plus the refresh gate, shared by the coordinators.
///
/// The gate serializes cycles; `completed` counts finished cycles. A
/// caller that waited on the gate and observes the counter advanced
/// knows another cycle just finished on its behalf and skips its own
/// fetch.
pub(crate) struct SnapshotCell<T> {
    slot: RwLock<Slot<T>>,
    gate: Mutex<()>,
    completed: AtomicU64,
}

impl<T> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self {
            slot: RwLock::new(Slot::default()),
            gate: Mutex::new(()),
            completed: AtomicU64::new(0),
        }
    }
}

impl<T> SnapshotCell<T> {
    /// Run one refresh cycle, coalescing with any cycle already in
    /// flight.
    pub(crate) async fn run_refresh<F>(&self, name: &'static str, fetch: F)
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let seen = self.completed.load(Ordering::Acquire);
        let _guard = self.gate.lock().await;
        if self.completed.load(Ordering::Acquire) != seen {
            // A cycle completed while we waited; its result is current.
            debug!(coordinator = name, "refresh coalesced");
            return;
        }

        match fetch.await {
            Ok(data) => {
                let mut slot = self.slot.write();
                slot.data = Some(Arc::new(data));
                slot.last_success = true;
                slot.last_updated = Some(SystemTime::now());
                debug!(coordinator = name, "refresh ok");
            }
            Err(err) => {
                let mut slot = self.slot.write();
                slot.last_success = false;
                slot.last_updated = Some(SystemTime::now());
                warn!(coordinator = name, error = %err, "refresh failed");
            }
        }

        self.completed.fetch_add(1, Ordering::Release);
    }

    /// The last good snapshot, if any ever existed. Stays available
    /// while a refresh is in flight and after a failed refresh.
    pub(crate) fn current(&self) -> Option<Arc<T>> {
        self.slot.read().data.clone()
    }

    pub(crate) fn last_success(&self) -> bool {
        self.slot.read().last_success
    }

    /// Wall-clock time of the last refresh attempt (success or failure).
    pub(crate) fn last_updated(&self) -> Option<SystemTime> {
        self.slot.read().last_updated
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Configurable in-memory API doubles for coordinator tests.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::client::{ApiError, MiningApi, RatesApi};
    use crate::control::DeviceAction;

    /// Mock private + public API with per-test knobs.
    pub(crate) struct MockApi {
        /// Total private fetches issued (accounts + rigs + payouts).
        pub calls: AtomicUsize,
        /// Fail private fetches with an HTTP 500.
        pub fail: AtomicBool,
        /// Fail the exchange-rate fetch with an HTTP 500.
        pub rates_fail: AtomicBool,
        /// Artificial latency per private fetch, for in-flight tests.
        pub delay: Duration,
        pub rigs: Mutex<Value>,
        pub accounts: Mutex<Value>,
        pub payouts: Mutex<Value>,
        pub rates: Mutex<Value>,
    }

    impl Default for MockApi {
        fn default() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                rates_fail: AtomicBool::new(false),
                delay: Duration::ZERO,
                rigs: Mutex::new(json!({"miningRigs": []})),
                accounts: Mutex::new(json!({"total": {
                    "totalBalance": "0.003",
                    "available": "0.002",
                    "pending": "0.001",
                }})),
                payouts: Mutex::new(json!({"list": []})),
                rates: Mutex::new(json!([
                    {"fromCurrency": "BTC", "toCurrency": "USD", "exchangeRate": "100000.0"},
                    {"fromCurrency": "ETH", "toCurrency": "USD", "exchangeRate": "4000.0"},
                ])),
            }
        }
    }

    impl MockApi {
        async fn fetch(&self, payload: &Mutex<Value>) -> Result<Value, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(server_error());
            }
            Ok(payload.lock().unwrap().clone())
        }
    }

    pub(crate) fn server_error() -> ApiError {
        ApiError::Status {
            status: 500,
            reason: "Internal Server Error".to_string(),
            body: String::new(),
        }
    }

    #[async_trait]
    impl MiningApi for MockApi {
        async fn accounts(&self) -> Result<Value, ApiError> {
            self.fetch(&self.accounts).await
        }

        async fn mining_rigs(&self) -> Result<Value, ApiError> {
            self.fetch(&self.rigs).await
        }

        async fn mining_rig(&self, _rig_id: &str) -> Result<Value, ApiError> {
            self.fetch(&self.rigs).await
        }

        async fn rig_payouts(&self, _size: u32) -> Result<Value, ApiError> {
            self.fetch(&self.payouts).await
        }

        async fn set_device_state(
            &self,
            _rig_id: &str,
            _device_id: &str,
            _action: DeviceAction,
        ) -> Result<Value, ApiError> {
            Ok(json!({"success": true}))
        }
    }

    #[async_trait]
    impl RatesApi for MockApi {
        async fn exchange_rates(&self) -> Result<Value, ApiError> {
            if self.rates_fail.load(Ordering::SeqCst) {
                return Err(server_error());
            }
            Ok(self.rates.lock().unwrap().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::MockApi;
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn poll_refreshes_on_schedule_until_cancelled() {
        let api = Arc::new(MockApi::default());
        let coordinator = Arc::new(RigsCoordinator::new(api.clone()));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(poll(
            coordinator.clone(),
            Duration::from_secs(60),
            shutdown.clone(),
        ));

        // First tick fires immediately.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);

        shutdown.cancel();
        handle.await.expect("poller task panicked");

        // No further fetches after cancellation.
        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_absorbs_refresh_failures() {
        let api = Arc::new(MockApi::default());
        api.fail.store(true, Ordering::SeqCst);
        let coordinator = Arc::new(RigsCoordinator::new(api.clone()));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(poll(
            coordinator.clone(),
            Duration::from_secs(60),
            shutdown.clone(),
        ));

        // Let the first (failing) tick run, then stop.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.last_update_success());

        shutdown.cancel();
        handle.await.expect("poller task panicked");
    }
}
