//! Polling daemon for rigwatch.
//!
//! Builds the API clients and coordinators from environment
//! configuration, primes the caches, then refreshes each enabled
//! resource class on its own schedule until SIGINT or SIGTERM.

use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::signal::unix::{self, SignalKind};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use rigwatch::client::{PrivateClient, PublicClient};
use rigwatch::config::Config;
use rigwatch::coordinator::{
    self, AccountsCoordinator, PayoutsCoordinator, RigsCoordinator,
};
use rigwatch::model::RigStatus;
use rigwatch::tracing::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    rigwatch::tracing::init();

    let config = Config::from_env()?;
    let private: Arc<PrivateClient> = Arc::new(PrivateClient::new(config.credentials()));
    let public: Arc<PublicClient> = Arc::new(PublicClient::new());

    let accounts = Arc::new(AccountsCoordinator::new(private.clone(), public));
    let rigs = Arc::new(RigsCoordinator::new(private.clone()));
    let payouts = Arc::new(PayoutsCoordinator::new(private));

    let poll_rigs = config.rigs_enabled || config.devices_enabled;

    // Prime the caches before starting the pollers; dead credentials
    // surface here instead of in the background loops.
    if config.balances_enabled {
        accounts.refresh().await;
        if !accounts.last_update_success() {
            bail!("unable to fetch initial account state");
        }
    }
    if poll_rigs {
        rigs.refresh().await;
        if !rigs.last_update_success() {
            bail!("unable to fetch initial rig state");
        }
    }

    info!(
        organization = %config.organization_id,
        currency = %config.currency,
        rigs = rigs.current_snapshot().map(|s| s.len()).unwrap_or(0),
        "rigwatchd started"
    );

    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    if config.balances_enabled {
        tracker.spawn(coordinator::poll(
            accounts.clone(),
            coordinator::ACCOUNTS_INTERVAL,
            shutdown.clone(),
        ));
    }
    if poll_rigs {
        tracker.spawn(coordinator::poll(
            rigs.clone(),
            coordinator::RIGS_INTERVAL,
            shutdown.clone(),
        ));
        tracker.spawn(status_loop(
            accounts.clone(),
            rigs.clone(),
            shutdown.clone(),
        ));
    }
    if config.payouts_enabled {
        tracker.spawn(coordinator::poll(
            payouts.clone(),
            coordinator::PAYOUTS_INTERVAL,
            shutdown.clone(),
        ));
    }
    tracker.close();

    let mut sigint = unix::signal(SignalKind::interrupt())?;
    let mut sigterm = unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received, shutting down"),
        _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
    }

    shutdown.cancel();
    tracker.wait().await;
    Ok(())
}

/// Log a one-line fleet summary once per rigs cycle.
async fn status_loop(
    accounts: Arc<AccountsCoordinator>,
    rigs: Arc<RigsCoordinator>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(coordinator::RIGS_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(snapshot) = rigs.current_snapshot() else {
                    continue;
                };
                let mining = snapshot
                    .rigs()
                    .filter(|rig| rig.status == RigStatus::Mining)
                    .count();
                let unpaid: f64 = snapshot.rigs().map(|rig| rig.unpaid_amount).sum();
                let available = accounts
                    .current_snapshot()
                    .map(|account| account.balances.available);
                info!(
                    rigs = snapshot.len(),
                    mining,
                    unpaid,
                    available = ?available,
                    stale = !rigs.last_update_success(),
                    "status"
                );
            }
            _ = shutdown.cancelled() => break,
        }
    }
}
