//! Mining rigs, their devices, and per-device algorithm speeds.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};

use super::{int_field, num_field, str_field};

/// Wrap of a 16-bit sensor word. Raw temperatures can arrive as signed
/// or overflowed integers and are reduced modulo this value.
pub const MAX_TWO_BYTES: i64 = 65536;

/// Masked temperature reported by devices that are not running
/// (`-1` before masking).
pub const INACTIVE_TEMPERATURE: u16 = (MAX_TWO_BYTES - 1) as u16;

static NAME_SUFFIXES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\s?\(r\))|(\s?\(tm\))|(\s?cpu)|(\s?graphics)|(\s?@.*ghz)")
        .expect("device name pattern is valid")
});

/// Strip vendor marketing suffixes from a reported device name:
/// `"(R)"`, `"(TM)"`, `" CPU"`, `" Graphics"`, and clock annotations
/// like `"@3.6GHz"`, case-insensitively.
pub fn parse_device_name(raw: &str) -> String {
    NAME_SUFFIXES.replace_all(raw, "").into_owned()
}

/// Rig status as reported by the pool.
#[derive(Clone, Copy, Debug, Default, Display, EnumString, PartialEq, Eq, Serialize)]
#[strum(ascii_case_insensitive)]
pub enum RigStatus {
    Mining,
    Stopped,
    Error,
    Offline,
    Benchmarking,
    Disabled,
    Pending,
    #[default]
    Unknown,
}

/// A hashing algorithm with its reported throughput.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MiningAlgorithm {
    pub name: String,
    pub speed: f64,
    /// Display unit with a `/s` suffix (e.g. `"MH/s"`).
    pub unit: String,
}

impl MiningAlgorithm {
    pub fn parse(data: &Value) -> Self {
        Self {
            name: str_field(data, "title"),
            speed: num_field(data, "speed"),
            unit: format!("{}/s", str_field(data, "displaySuffix")),
        }
    }
}

/// A single compute device within a rig.
#[derive(Clone, Debug, Serialize)]
pub struct MiningRigDevice {
    pub id: String,
    /// Name with vendor marketing suffixes stripped.
    pub name: String,
    /// Status description as reported (e.g. `"Mining"`, `"Inactive"`).
    pub status: String,
    /// Temperature in °C, masked to `[0, 65535]`.
    pub temperature: u16,
    /// Load percentage.
    pub load: f64,
    /// Fan speed.
    pub rpm: f64,
    /// Algorithm speeds in API order; the first entry is the active one.
    pub speeds: Vec<MiningAlgorithm>,
}

impl MiningRigDevice {
    /// Parse one device entry. Missing fields default, so a malformed
    /// entry still yields a device and its siblings survive.
    pub fn parse(data: &Value) -> Self {
        let status = data
            .get("status")
            .map(|status| str_field(status, "description"))
            .unwrap_or_default();
        let temperature = int_field(data, "temperature").rem_euclid(MAX_TWO_BYTES) as u16;
        let speeds = data
            .get("speeds")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(MiningAlgorithm::parse).collect())
            .unwrap_or_default();

        Self {
            id: str_field(data, "id"),
            name: parse_device_name(&str_field(data, "name")),
            status,
            temperature,
            load: num_field(data, "load"),
            rpm: num_field(data, "revolutionsPerMinute"),
            speeds,
        }
    }

    /// The currently active algorithm. The API lists it first.
    pub fn active_algorithm(&self) -> Option<&MiningAlgorithm> {
        self.speeds.first()
    }
}

/// A named group of devices reporting to the pool as a unit.
///
/// Devices keep their API order and are addressable by id in O(1). The
/// device set may shrink or grow between polls; each parse rebuilds the
/// collection wholesale rather than merging.
#[derive(Clone, Debug, Serialize)]
pub struct MiningRig {
    pub id: String,
    pub name: String,
    pub status: RigStatus,
    /// Epoch milliseconds of the last status change.
    pub status_time: i64,
    pub profitability: f64,
    pub unpaid_amount: f64,
    devices: Vec<MiningRigDevice>,
    #[serde(skip)]
    device_index: HashMap<String, usize>,
}

impl MiningRig {
    pub fn parse(data: &Value) -> Self {
        let devices: Vec<MiningRigDevice> = data
            .get("devices")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(MiningRigDevice::parse).collect())
            .unwrap_or_default();
        let device_index = devices
            .iter()
            .enumerate()
            .map(|(index, device)| (device.id.clone(), index))
            .collect();

        Self {
            id: str_field(data, "rigId"),
            name: str_field(data, "name"),
            status: str_field(data, "minerStatus").parse().unwrap_or_default(),
            status_time: int_field(data, "statusTime"),
            profitability: num_field(data, "profitability"),
            unpaid_amount: num_field(data, "unpaidAmount"),
            devices,
            device_index,
        }
    }

    /// Devices in API order.
    pub fn devices(&self) -> &[MiningRigDevice] {
        &self.devices
    }

    /// Look up a device by id.
    pub fn device(&self, id: &str) -> Option<&MiningRigDevice> {
        self.device_index.get(id).map(|&index| &self.devices[index])
    }

    pub fn num_devices(&self) -> usize {
        self.devices.len()
    }

    /// Aggregate per-algorithm throughput across devices.
    ///
    /// Each device contributes only its active (first listed) algorithm;
    /// speeds for the same algorithm name accumulate. First-seen order
    /// is preserved.
    pub fn algorithms(&self) -> Vec<MiningAlgorithm> {
        let mut algorithms: Vec<MiningAlgorithm> = Vec::new();
        for device in &self.devices {
            let Some(active) = device.active_algorithm() else {
                continue;
            };
            match algorithms.iter_mut().find(|a| a.name == active.name) {
                Some(existing) => existing.speed += active.speed,
                None => algorithms.push(active.clone()),
            }
        }
        algorithms
    }

    /// Temperatures of devices currently reporting a real reading.
    /// Idle devices report the masked sentinel and are skipped.
    pub fn active_temperatures(&self) -> Vec<u16> {
        self.devices
            .iter()
            .map(|device| device.temperature)
            .filter(|&t| t != INACTIVE_TEMPERATURE)
            .collect()
    }

    pub fn highest_temperature(&self) -> Option<u16> {
        self.active_temperatures().into_iter().max()
    }

    pub fn lowest_temperature(&self) -> Option<u16> {
        self.active_temperatures().into_iter().min()
    }
}
