//! Pool Normalizer
//!
//! Picks the pool the device is actually mining on from a `pools` response.
//!
//! Selection: the first entry flagged `Stratum Active`, otherwise the first
//! entry. Firmwares that report several pools without any active flag get the
//! first one; that is a policy choice, not something the protocol guarantees.

use crate::miner::types::fields;
use crate::miner::CommandResponse;
use crate::telemetry::TelemetryRecord;
use serde_json::{Map, Value};

/// One entry of the `POOLS` collection, with firmware-specific key names folded.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    pub index: Option<u64>,
    pub url: Option<String>,
    pub user: Option<String>,
    pub status: Option<String>,
    pub priority: Option<u64>,
    pub stratum_active: Option<bool>,
    pub accepted: Option<u64>,
    pub rejected: Option<u64>,
}

impl PoolEntry {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            index: fields::unsigned(map, "POOL"),
            url: fields::first_text(map, &["URL", "Stratum URL", "StratumURL", "Stratum"]),
            user: fields::first_text(map, &["User", "Worker", "UserName", "Username"]),
            status: fields::first_text(map, &["Status", "Stratum Status"]),
            priority: fields::first_unsigned(map, &["Priority", "PRIORITY"]),
            stratum_active: fields::flag(map, "Stratum Active")
                .or_else(|| fields::flag(map, "StratumActive")),
            accepted: fields::unsigned(map, "Accepted"),
            rejected: fields::unsigned(map, "Rejected"),
        }
    }
}

/// All pool entries, in device order.
pub fn parse(response: &CommandResponse) -> Vec<PoolEntry> {
    response
        .entries("POOLS")
        .into_iter()
        .map(PoolEntry::from_map)
        .collect()
}

pub fn select_active(pools: &[PoolEntry]) -> Option<&PoolEntry> {
    pools
        .iter()
        .find(|p| p.stratum_active == Some(true))
        .or_else(|| pools.first())
}

/// `account.worker` -> `worker`; a user without a dot is its own worker name.
pub fn worker_name(user: &str) -> String {
    match user.split_once('.') {
        Some((_, worker)) if !worker.is_empty() => worker.to_string(),
        _ => user.to_string(),
    }
}

pub fn apply(record: &mut TelemetryRecord, response: &CommandResponse) {
    let pools = parse(response);
    let Some(pool) = select_active(&pools) else {
        return;
    };

    record.pool_url = pool.url.clone();
    record.pool_user = pool.user.clone();
    record.worker = pool.user.as_deref().map(worker_name);
}
