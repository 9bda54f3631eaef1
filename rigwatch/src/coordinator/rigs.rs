//! Mining-rig telemetry coordinator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::client::MiningApi;
use crate::model::MiningRig;

use super::{Coordinator, SnapshotCell};

/// All rigs from the last successful fetch, keyed by rig id.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RigsSnapshot {
    rigs: HashMap<String, MiningRig>,
}

impl RigsSnapshot {
    /// Parse the rig-list payload, re-keying the rigs by id. The prior
    /// snapshot is replaced wholesale; rigs that disappeared are gone.
    fn parse(data: &Value) -> Self {
        let mut rigs = HashMap::new();
        if let Some(entries) = data.get("miningRigs").and_then(Value::as_array) {
            for entry in entries {
                let rig = MiningRig::parse(entry);
                rigs.insert(rig.id.clone(), rig);
            }
        }
        Self { rigs }
    }

    pub fn rig(&self, id: &str) -> Option<&MiningRig> {
        self.rigs.get(id)
    }

    pub fn rigs(&self) -> impl Iterator<Item = &MiningRig> {
        self.rigs.values()
    }

    pub fn len(&self) -> usize {
        self.rigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rigs.is_empty()
    }
}

/// Polls the rig list once a minute. Mining telemetry changes quickly,
/// so this is the hot path.
pub struct RigsCoordinator {
    api: Arc<dyn MiningApi>,
    cell: SnapshotCell<RigsSnapshot>,
}

impl RigsCoordinator {
    pub fn new(api: Arc<dyn MiningApi>) -> Self {
        Self {
            api,
            cell: SnapshotCell::default(),
        }
    }

    /// Fetch the rig list and replace the snapshot. Coalesces with an
    /// in-flight refresh; absorbs failures into the success flag.
    pub async fn refresh(&self) {
        self.cell
            .run_refresh("rigs", async {
                let data = self.api.mining_rigs().await?;
                Ok(RigsSnapshot::parse(&data))
            })
            .await;
    }

    pub fn current_snapshot(&self) -> Option<Arc<RigsSnapshot>> {
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
impl Coordinator for RigsCoordinator {
    fn name(&self) -> &'static str {
        "rigs"
    }

    async fn refresh(&self) {
        RigsCoordinator::refresh(self).await;
    }

    fn last_update_success(&self) -> bool {
        RigsCoordinator::last_update_success(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use serde_json::json;

    use super::super::testing::MockApi;
    use super::*;
    use crate::model::RigStatus;

    fn rig_list(names: &[(&str, &str)]) -> serde_json::Value {
        let rigs: Vec<_> = names
            .iter()
            .map(|(id, name)| {
                json!({
                    "rigId": id,
                    "name": name,
                    "minerStatus": "MINING",
                    "devices": [],
                })
            })
            .collect();
        json!({"miningRigs": rigs})
    }

    #[tokio::test]
    async fn refresh_builds_a_keyed_snapshot() {
        let api = Arc::new(MockApi::default());
        *api.rigs.lock().unwrap() = rig_list(&[("rig-1", "garage"), ("rig-2", "attic")]);

        let coordinator = RigsCoordinator::new(api);
        assert!(coordinator.current_snapshot().is_none());
        assert!(!coordinator.last_update_success());

        coordinator.refresh().await;

        assert!(coordinator.last_update_success());
        let snapshot = coordinator.current_snapshot().expect("snapshot");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.rig("rig-2").expect("rig-2").name, "attic");
        assert_eq!(snapshot.rig("rig-1").expect("rig-1").status, RigStatus::Mining);
    }

    #[tokio::test]
    async fn snapshot_reads_are_idempotent() {
        let api = Arc::new(MockApi::default());
        let coordinator = RigsCoordinator::new(api);
        coordinator.refresh().await;

        let first = coordinator.current_snapshot().expect("snapshot");
        let second = coordinator.current_snapshot().expect("snapshot");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn failed_refresh_retains_the_previous_snapshot() {
        let api = Arc::new(MockApi::default());
        *api.rigs.lock().unwrap() = rig_list(&[("rig-1", "garage")]);

        let coordinator = RigsCoordinator::new(api.clone());
        coordinator.refresh().await;
        let good = coordinator.current_snapshot().expect("snapshot");

        api.fail.store(true, Ordering::SeqCst);
        coordinator.refresh().await;

        assert!(!coordinator.last_update_success());
        let stale = coordinator.current_snapshot().expect("stale snapshot");
        assert!(Arc::ptr_eq(&good, &stale));

        // Recovery replaces the snapshot and restores the flag.
        api.fail.store(false, Ordering::SeqCst);
        *api.rigs.lock().unwrap() = rig_list(&[("rig-1", "garage"), ("rig-2", "attic")]);
        coordinator.refresh().await;
        assert!(coordinator.last_update_success());
        assert_eq!(coordinator.current_snapshot().expect("snapshot").len(), 2);
    }

    #[tokio::test]
    async fn failure_before_any_success_leaves_no_snapshot() {
        let api = Arc::new(MockApi::default());
        api.fail.store(true, Ordering::SeqCst);

        let coordinator = RigsCoordinator::new(api);
        coordinator.refresh().await;

        assert!(!coordinator.last_update_success());
        assert!(coordinator.current_snapshot().is_none());
        assert!(coordinator.last_updated().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_coalesce_into_one_fetch() {
        let api = Arc::new(MockApi {
            delay: Duration::from_millis(50),
            ..MockApi::default()
        });
        let coordinator = RigsCoordinator::new(api.clone());

        // The second call arrives while the first fetch is suspended on
        // the (mock) network; it must wait and adopt that result.
        tokio::join!(coordinator.refresh(), coordinator.refresh());

        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.last_update_success());
    }

    #[tokio::test]
    async fn sequential_refreshes_fetch_each_time() {
        let api = Arc::new(MockApi::default());
        let coordinator = RigsCoordinator::new(api.clone());

        coordinator.refresh().await;
        coordinator.refresh().await;

        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }
}
