//! Telemetry Collectors
//!
//! Turns a live device into one [`TelemetryRecord`] per scan cycle.
//!
//! # Architecture
//!
//! Each submodule normalizes one API command into the record:
//! - [`summary`] - hash rates, share counters, uptime (`summary`)
//! - [`pools`] - pool URL and user of the active pool (`pools`)
//! - [`stats`] - model, temperature sensors and fans (`stats`, optional)
//!
//! `summary` and `pools` are the core command set and decide the record's
//! status. `stats` only enriches a record that already has data; its failure
//! is noted in `errors` but never changes the status.
//!
//! # Error Handling
//!
//! Command failures are non-fatal. They are logged, recorded in the record's
//! `errors` list, and the affected fields stay unset.

use crate::arp::lookup_mac;
use crate::miner::DeviceRpcClient;
use crate::probe::DeviceHandle;
use crate::telemetry::{TelemetryRecord, TelemetryStatus};
use crate::workers::run_bounded;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, info, warn};

pub mod pools;
pub mod stats;
pub mod summary;

/// Status of a single command collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    /// The command answered and its data was applied
    Success,
    /// The command failed (already logged and recorded)
    Failed,
}

/// Helper to reduce boilerplate in collectors
///
/// Wraps a device query with consistent error handling:
/// - On success: processes the response, returns `CollectionStatus::Success`
/// - On error: logs a warning, appends `"<name>: <error>"` to `errors`,
///   returns `CollectionStatus::Failed`
///
/// # Examples
///
/// ```no_run
/// # use asic_scanner::collectors::*;
/// # use asic_scanner::miner::DeviceRpcClient;
/// # use asic_scanner::telemetry::{TelemetryRecord, TelemetryStatus};
/// # async fn example(client: &DeviceRpcClient, addr: std::net::SocketAddrV4) {
/// let mut record = TelemetryRecord::new(addr, TelemetryStatus::Ok);
/// let mut errors = Vec::new();
/// collect_with_handler("pools", &mut errors, client.pools(addr), |response| {
///     pools::apply(&mut record, &response);
/// })
/// .await;
/// # }
/// ```
pub async fn collect_with_handler<T, F, P, E>(
    name: &str,
    errors: &mut Vec<String>,
    query_future: F,
    process: P,
) -> CollectionStatus
where
    F: Future<Output = Result<T, E>>,
    E: Display,
    P: FnOnce(T),
{
    match query_future.await {
        Ok(data) => {
            process(data);
            debug!("Collected {}", name);
            CollectionStatus::Success
        }
        Err(e) => {
            warn!("Failed to query {}: {}", name, e);
            errors.push(format!("{}: {}", name, e));
            CollectionStatus::Failed
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub concurrency: usize,
    /// Also issue `stats` for temperatures, fans and model.
    pub collect_stats: bool,
    /// Fill `mac_address` from the host's ARP cache.
    pub resolve_mac: bool,
}

pub struct Collector {
    client: DeviceRpcClient,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(client: DeviceRpcClient, config: CollectorConfig) -> Self {
        Self { client, config }
    }

    /// Issues the command set against one device and normalizes the replies.
    ///
    /// Never fails: a device that stopped answering yields an `unreachable`
    /// record carrying only address, timestamp, status and the errors.
    pub async fn collect(&self, handle: &DeviceHandle) -> TelemetryRecord {
        let addr = handle.addr;
        let mut record = TelemetryRecord::new(addr, TelemetryStatus::Ok);
        let mut errors = Vec::new();

        let summary = collect_with_handler(
            &format!("{} summary", addr),
            &mut errors,
            self.client.summary(addr),
            |response| summary::apply(&mut record, &response),
        )
        .await;

        let pools = collect_with_handler(
            &format!("{} pools", addr),
            &mut errors,
            self.client.pools(addr),
            |response| pools::apply(&mut record, &response),
        )
        .await;

        record.status = match (summary, pools) {
            (CollectionStatus::Success, CollectionStatus::Success) => TelemetryStatus::Ok,
            (CollectionStatus::Failed, CollectionStatus::Failed) => {
                warn!("{} answered the probe but no command since", addr);
                let mut record = TelemetryRecord::unreachable(addr, errors);
                record.mac_address = self.mac_address(handle).await;
                return record;
            }
            _ => TelemetryStatus::Partial,
        };

        if self.config.collect_stats {
            collect_with_handler(
                &format!("{} stats", addr),
                &mut errors,
                self.client.stats(addr),
                |response| stats::apply(&mut record, &response),
            )
            .await;
        }

        record.errors = errors;
        record.mac_address = self.mac_address(handle).await;
        record
    }

    async fn mac_address(&self, handle: &DeviceHandle) -> Option<String> {
        if !self.config.resolve_mac {
            return None;
        }
        lookup_mac(*handle.addr.ip()).await
    }

    /// Collects every handle through the bounded pool. Output is sorted by address.
    pub async fn collect_all(&self, handles: &[DeviceHandle]) -> Vec<TelemetryRecord> {
        let mut records = run_bounded(
            handles.iter().copied(),
            self.config.concurrency,
            |handle| async move { self.collect(&handle).await },
        )
        .await;
        records.sort_by_key(|r| r.socket_addr());

        info!(
            "Collected {} record(s): {} ok, {} partial, {} unreachable",
            records.len(),
            count(&records, TelemetryStatus::Ok),
            count(&records, TelemetryStatus::Partial),
            count(&records, TelemetryStatus::Unreachable),
        );
        records
    }
}

fn count(records: &[TelemetryRecord], status: TelemetryStatus) -> usize {
    records.iter().filter(|r| r.status == status).count()
}
