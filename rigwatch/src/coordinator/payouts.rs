//! Payout-history coordinator.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::client::MiningApi;
use crate::model::Payout;

use super::{Coordinator, SnapshotCell};

/// Page size covering roughly one week of history at the pool's
/// four-hour payout cadence: 6 per day for 7 days.
pub const PAYOUT_PAGE_SIZE: u32 = 42;

/// Recent payouts, sorted ascending by creation time.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PayoutsSnapshot {
    payouts: Vec<Payout>,
}

impl PayoutsSnapshot {
    fn parse(data: &Value) -> Self {
        let mut payouts: Vec<Payout> = data
            .get("list")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(Payout::parse).collect())
            .unwrap_or_default();
        payouts.sort_by_key(|payout| payout.created);
        Self { payouts }
    }

    pub fn payouts(&self) -> &[Payout] {
        &self.payouts
    }

    /// The most recent payout that credited the operator's account,
    /// skipping pool-internal transfers.
    pub fn latest_user_payout(&self) -> Option<&Payout> {
        self.payouts.iter().rev().find(|payout| payout.is_user())
    }
}

/// Polls a bounded page of payout history hourly.
pub struct PayoutsCoordinator {
    api: Arc<dyn MiningApi>,
    cell: SnapshotCell<PayoutsSnapshot>,
}

impl PayoutsCoordinator {
    pub fn new(api: Arc<dyn MiningApi>) -> Self {
        Self {
            api,
            cell: SnapshotCell::default(),
        }
    }

    /// Fetch the payout page and replace the snapshot. Coalesces with an
    /// in-flight refresh; absorbs failures into the success flag.
    pub async fn refresh(&self) {
        self.cell
            .run_refresh("payouts", async {
                let data = self.api.rig_payouts(PAYOUT_PAGE_SIZE).await?;
                Ok(PayoutsSnapshot::parse(&data))
            })
            .await;
    }

    pub fn current_snapshot(&self) -> Option<Arc<PayoutsSnapshot>> {
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
impl Coordinator for PayoutsCoordinator {
    fn name(&self) -> &'static str {
        "payouts"
    }

    async fn refresh(&self) {
        PayoutsCoordinator::refresh(self).await;
    }

    fn last_update_success(&self) -> bool {
        PayoutsCoordinator::last_update_success(self)
    }
}
