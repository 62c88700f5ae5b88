//! Normalized device telemetry.
//!
//! A [`TelemetryRecord`] is created once per device per scan cycle and handed
//! to every sink. Unknown values stay `None` and are left out of the JSON form,
//! so a consumer can tell "zero hashrate" apart from "hashrate not reported".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryStatus {
    /// Every core command answered.
    Ok,
    /// Some core commands answered; missing fields are unset.
    Partial,
    /// The device was found by the probe but no core command answered.
    Unreachable,
}

impl TelemetryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryStatus::Ok => "ok",
            TelemetryStatus::Partial => "partial",
            TelemetryStatus::Unreachable => "unreachable",
        }
    }
}

impl fmt::Display for TelemetryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hash board ("chain") as reported by `stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardReading {
    /// 1-based chain number from the firmware keys.
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashrate_ghs: Option<f64>,
    /// Board temperature (`temp2_N`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chip_temperature_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chip_temperature_out: Option<f64>,
    /// Active chip count (`chain_acnN`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chips: Option<u32>,
}

impl BoardReading {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            hashrate_ghs: None,
            temperature: None,
            chip_temperature_in: None,
            chip_temperature_out: None,
            chips: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub address: Ipv4Addr,
    pub port: u16,
    pub collected_at: DateTime<Utc>,
    pub status: TelemetryStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// From the host's ARP table, when lookup is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Worker part of the pool user (`account.worker` -> `worker`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,

    // Hash rates, GH/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashrate_ghs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashrate_5s_ghs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashrate_ideal_ghs: Option<f64>,

    /// Sensor readings in device order, Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperatures: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_max: Option<f64>,
    /// Fan speeds in device order, RPM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fans: Option<Vec<u32>>,
    /// Fan count the firmware declares, including stopped fans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan_num: Option<u32>,

    // Hash boards, in chain order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boards: Option<Vec<BoardReading>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_hw: Option<Vec<u64>>,
    /// Per-chain average as the firmware formats it (`"5463.34 MH/s"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_avg_hashrate: Option<Vec<String>>,
    /// Chip frequency, MHz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miner_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_errors: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<u64>,

    /// One entry per command that failed during collection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl TelemetryRecord {
    /// An empty record stamped with the current time.
    pub fn new(addr: SocketAddrV4, status: TelemetryStatus) -> Self {
        Self {
            address: *addr.ip(),
            port: addr.port(),
            collected_at: Utc::now(),
            status,
            model: None,
            mac_address: None,
            worker: None,
            hashrate_ghs: None,
            hashrate_5s_ghs: None,
            hashrate_ideal_ghs: None,
            temperatures: None,
            temperature_max: None,
            fans: None,
            fan_num: None,
            boards: None,
            chain_hw: None,
            chain_avg_hashrate: None,
            frequency: None,
            miner_count: None,
            pool_url: None,
            pool_user: None,
            accepted: None,
            rejected: None,
            hardware_errors: None,
            elapsed_seconds: None,
            errors: Vec::new(),
        }
    }

    /// Address, timestamp, status and the reasons. Nothing else.
    pub fn unreachable(addr: SocketAddrV4, errors: Vec<String>) -> Self {
        Self {
            errors,
            ..Self::new(addr, TelemetryStatus::Unreachable)
        }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port)
    }

    /// Sum of the per-board hash rates, when any board reported one.
    pub fn boards_hashrate_ghs(&self) -> Option<f64> {
        let rates: Vec<f64> = self
            .boards
            .as_ref()?
            .iter()
            .filter_map(|b| b.hashrate_ghs)
            .collect();
        (!rates.is_empty()).then(|| rates.iter().sum())
    }

    pub fn is_online(&self) -> bool {
        self.status != TelemetryStatus::Unreachable
    }
}
