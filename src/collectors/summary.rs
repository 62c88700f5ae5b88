//! Summary Normalizer
//!
//! Reads the first `SUMMARY` entry of a `summary` response.
//!
//! # Fields Produced
//! - `hashrate_ghs` - from `GHS av`, `MHS av`, `THS av` or `KHS av`, converted to GH/s
//! - `hashrate_5s_ghs` - the same for the `5s` window
//! - `accepted`, `rejected`, `hardware_errors` - copied verbatim, never diffed
//! - `elapsed_seconds` - `Elapsed`
//! - `temperatures`, `fans` - only on firmwares that put them in the summary
//!   (`Temperature`, `Fan Speed In`, `Fan Speed Out`)

use crate::miner::types::fields;
use crate::miner::CommandResponse;
use crate::telemetry::TelemetryRecord;
use crate::units::HashrateUnit;
use serde_json::{Map, Value};

pub const AVERAGE_HASHRATE_KEYS: &[(&str, HashrateUnit)] = &[
    ("GHS av", HashrateUnit::GHs),
    ("MHS av", HashrateUnit::MHs),
    ("THS av", HashrateUnit::THs),
    ("KHS av", HashrateUnit::KHs),
];

pub const FIVE_SECOND_HASHRATE_KEYS: &[(&str, HashrateUnit)] = &[
    ("GHS 5s", HashrateUnit::GHs),
    ("MHS 5s", HashrateUnit::MHs),
    ("THS 5s", HashrateUnit::THs),
    ("KHS 5s", HashrateUnit::KHs),
];

/// First hash rate found under `keys`, in GH/s.
pub fn hashrate_ghs(entry: &Map<String, Value>, keys: &[(&str, HashrateUnit)]) -> Option<f64> {
    keys.iter()
        .find_map(|(key, unit)| fields::number(entry, key).map(|v| unit.to_ghs(v)))
}

pub fn apply(record: &mut TelemetryRecord, response: &CommandResponse) {
    let Some(entry) = response.entries("SUMMARY").into_iter().next() else {
        return;
    };

    record.hashrate_ghs = hashrate_ghs(entry, AVERAGE_HASHRATE_KEYS);
    record.hashrate_5s_ghs = hashrate_ghs(entry, FIVE_SECOND_HASHRATE_KEYS);
    record.accepted = fields::unsigned(entry, "Accepted");
    record.rejected = fields::unsigned(entry, "Rejected");
    record.hardware_errors = fields::unsigned(entry, "Hardware Errors");
    record.elapsed_seconds = fields::unsigned(entry, "Elapsed");

    if let Some(temp) = fields::number(entry, "Temperature") {
        record.temperatures = Some(vec![temp]);
        record.temperature_max = Some(temp);
    }

    let fans: Vec<u32> = ["Fan Speed In", "Fan Speed Out"]
        .iter()
        .filter_map(|key| fields::unsigned(entry, key))
        .map(|rpm| u32::try_from(rpm).unwrap_or(u32::MAX))
        .collect();
    if !fans.is_empty() {
        record.fans = Some(fans);
    }
}
