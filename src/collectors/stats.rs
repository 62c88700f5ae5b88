//! Stats Normalizer
//!
//! Reads the Antminer-style `stats` response: the first `STATS` entry
//! describes the firmware (`Type` holds the model), a later entry carries the
//! sensor readings as numbered keys.
//!
//! # Fields Produced
//! - `model` - `Type`
//! - `temperatures` - `temp2_1..n` (board temperatures), or `temp1..n` when the
//!   firmware has no `temp2_*` keys; unpopulated (zero) sensors are skipped
//! - `temperature_max` - `temp_max`, else the hottest sensor
//! - `fans` - `fan1..fan_num` in order (a stopped fan stays as 0)
//! - `fan_num`, `frequency`, `miner_count`
//! - `boards` - one [`BoardReading`] per chain with `chain_rateN`,
//!   `temp2_N`, `temp_in_chip_N`, `temp_out_chip_N` and `chain_acnN`
//! - `chain_hw` / `chain_avg_hashrate` - `chain_hwN` and
//!   `chain_avg_hashrateN` (or `CHAIN AVG HASHRATEN`) in chain order
//! - `hashrate_ideal_ghs` - `total_rateideal`
//! - `hashrate_ghs` / `hashrate_5s_ghs` / `elapsed_seconds` - only when the
//!   summary did not provide them
//!
//! Once the model is known, every hash rate on the record goes through
//! [`normalize_ghs`].

use crate::miner::types::fields;
use crate::miner::CommandResponse;
use crate::telemetry::{BoardReading, TelemetryRecord};
use crate::units::normalize_ghs;
use serde_json::{Map, Value};

const MAX_SENSORS: usize = 16;
const MAX_FANS: usize = 8;
const MAX_CHAINS: u32 = 16;

pub fn apply(record: &mut TelemetryRecord, response: &CommandResponse) {
    let entries = response.entries("STATS");

    if let Some(model) = entries.iter().find_map(|e| fields::text(e, "Type")) {
        record.model = Some(model);
    }

    if let Some(detail) = entries.iter().find(|e| is_sensor_entry(e)) {
        apply_detail(record, detail);
    }

    normalize_hashrates(record);
}

fn apply_detail(record: &mut TelemetryRecord, detail: &Map<String, Value>) {
    let temps = temperatures(detail);
    if !temps.is_empty() {
        record.temperature_max = fields::number(detail, "temp_max")
            .filter(|t| *t > 0.0)
            .or_else(|| temps.iter().copied().reduce(f64::max));
        record.temperatures = Some(temps);
    }

    let speeds = fans(detail);
    if !speeds.is_empty() {
        record.fans = Some(speeds);
    }
    record.fan_num = small(detail, "fan_num");
    record.frequency = small(detail, "frequency");
    record.miner_count = small(detail, "miner_count");

    let chains = boards(detail);
    if !chains.is_empty() {
        record.boards = Some(chains);
    }

    let hw: Vec<u64> = (1..=MAX_CHAINS)
        .filter_map(|i| fields::unsigned(detail, &format!("chain_hw{}", i)))
        .collect();
    if !hw.is_empty() {
        record.chain_hw = Some(hw);
    }

    let averages: Vec<String> = (1..=MAX_CHAINS)
        .filter_map(|i| {
            let snake = format!("chain_avg_hashrate{}", i);
            let spaced = format!("CHAIN AVG HASHRATE{}", i);
            fields::first_text(detail, &[snake.as_str(), spaced.as_str()])
        })
        .collect();
    if !averages.is_empty() {
        record.chain_avg_hashrate = Some(averages);
    }

    record.hashrate_ideal_ghs = fields::number(detail, "total_rateideal");
    if record.hashrate_ghs.is_none() {
        record.hashrate_ghs = fields::first_number(detail, &["GHS av", "rate_30m"]);
    }
    if record.hashrate_5s_ghs.is_none() {
        record.hashrate_5s_ghs = fields::number(detail, "GHS 5s");
    }
    if record.elapsed_seconds.is_none() {
        record.elapsed_seconds = fields::unsigned(detail, "Elapsed");
    }
}

fn is_sensor_entry(entry: &Map<String, Value>) -> bool {
    entry.contains_key("fan_num")
        || entry.contains_key("temp_num")
        || entry.contains_key("temp_max")
        || entry.contains_key("fan1")
        || entry.contains_key("temp1")
        || entry.contains_key("temp2_1")
        || entry.contains_key("chain_rate1")
}

fn normalize_hashrates(record: &mut TelemetryRecord) {
    let model = record.model.clone();
    let model = model.as_deref();
    for rate in [
        &mut record.hashrate_ghs,
        &mut record.hashrate_5s_ghs,
        &mut record.hashrate_ideal_ghs,
    ] {
        *rate = rate.map(|ghs| normalize_ghs(ghs, model));
    }
    for board in record.boards.iter_mut().flatten() {
        board.hashrate_ghs = board.hashrate_ghs.map(|ghs| normalize_ghs(ghs, model));
    }
}

fn small(entry: &Map<String, Value>, key: &str) -> Option<u32> {
    fields::unsigned(entry, key).map(|v| u32::try_from(v).unwrap_or(u32::MAX))
}

/// Board temperatures in sensor order.
pub fn temperatures(entry: &Map<String, Value>) -> Vec<f64> {
    let read = |prefix: &str| -> Vec<f64> {
        (1..=MAX_SENSORS)
            .filter_map(|i| fields::number(entry, &format!("{}{}", prefix, i)))
            .filter(|t| *t > 0.0)
            .collect()
    };

    let board = read("temp2_");
    if board.is_empty() {
        read("temp")
    } else {
        board
    }
}

/// Fan speeds in fan order.
pub fn fans(entry: &Map<String, Value>) -> Vec<u32> {
    let declared = fields::unsigned(entry, "fan_num")
        .map(|n| (n as usize).min(MAX_FANS));

    (1..=declared.unwrap_or(MAX_FANS))
        .filter_map(|i| fields::unsigned(entry, &format!("fan{}", i)))
        .map(|rpm| u32::try_from(rpm).unwrap_or(u32::MAX))
        .collect()
}

/// Hash boards in chain order.
///
/// Empty slots (no rate, no temperature, no chips) are skipped, so an S9
/// reporting chains 6..8 yields three boards numbered 6, 7 and 8.
pub fn boards(entry: &Map<String, Value>) -> Vec<BoardReading> {
    (1..=MAX_CHAINS)
        .map(|i| BoardReading {
            hashrate_ghs: fields::number(entry, &format!("chain_rate{}", i)),
            temperature: celsius(entry, &format!("temp2_{}", i)),
            chip_temperature_in: celsius(entry, &format!("temp_in_chip_{}", i)),
            chip_temperature_out: celsius(entry, &format!("temp_out_chip_{}", i)),
            chips: small(entry, &format!("chain_acn{}", i)).filter(|n| *n > 0),
            ..BoardReading::new(i)
        })
        .filter(|b| {
            b.hashrate_ghs.is_some()
                || b.temperature.is_some()
                || b.chip_temperature_in.is_some()
                || b.chip_temperature_out.is_some()
                || b.chips.is_some()
        })
        .collect()
}

/// A populated temperature. Dash-joined per-sensor strings (`"56-58-57-60"`)
/// read as their hottest sensor.
fn celsius(entry: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match entry.get(key)? {
        Value::String(s) if s.contains('-') => s
            .split('-')
            .filter_map(|part| part.trim().parse::<f64>().ok())
            .reduce(f64::max),
        _ => fields::number(entry, key),
    };
    value.filter(|t| t.is_finite() && *t > 0.0)
}
