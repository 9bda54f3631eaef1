//! Authenticated NiceHash API client and polling coordinators.
//!
//! rigwatch periodically fetches account balances, mining-rig telemetry,
//! and payout history from the NiceHash API and holds each resource class
//! as a cached snapshot a host application can query at any time:
//!
//! - [`client`] signs and issues the HTTP requests,
//! - [`model`] lifts the raw JSON payloads into typed entities,
//! - [`coordinator`] schedules refreshes and owns the snapshots,
//! - [`control`] starts and stops individual mining devices.
//!
//! The host constructs a [`config::Config`], builds the clients and
//! coordinators once, and passes them by handle to whatever consumes
//! them. Consumers read snapshots; they never trigger network traffic
//! except through an explicit refresh or a device command.

pub mod client;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod model;
pub mod tracing;
