//! Device Discovery
//!
//! Classifies candidate addresses as live miners by sending each one a
//! `summary` command with a short timeout.
//!
//! Only connect-level failures (refused, timed out, unreachable) exclude an
//! address. Anything that accepted the connection counts as a device, even if
//! its reply was garbage, so the collector can still report it as `partial`.

use crate::error::RpcError;
use crate::miner::DeviceRpcClient;
use crate::workers::run_bounded;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;
use tracing::{debug, info};

/// An address to probe this cycle.
pub type Candidate = SocketAddrV4;

/// Builds the candidate list for `hosts` on the RPC `port`.
pub fn candidates(hosts: impl IntoIterator<Item = Ipv4Addr>, port: u16) -> Vec<Candidate> {
    hosts
        .into_iter()
        .map(|ip| SocketAddrV4::new(ip, port))
        .collect()
}

/// A candidate that answered this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle {
    pub addr: SocketAddrV4,
    /// False when the probe reply could not be used (malformed, rejected, cut off).
    pub responded_cleanly: bool,
}

impl DeviceHandle {
    pub fn ip(&self) -> Ipv4Addr {
        *self.addr.ip()
    }
}

#[derive(Debug)]
pub enum ProbeOutcome {
    Reachable(DeviceHandle),
    Unreachable(RpcError),
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub concurrency: usize,
}

/// Result of probing a whole candidate list.
#[derive(Debug, Default)]
pub struct ProbeReport {
    /// Sorted by address.
    pub reachable: Vec<DeviceHandle>,
    /// Sorted by address.
    pub unreachable: Vec<(Candidate, RpcError)>,
}

impl ProbeReport {
    pub fn total(&self) -> usize {
        self.reachable.len() + self.unreachable.len()
    }
}

pub struct Prober {
    client: DeviceRpcClient,
    concurrency: usize,
}

impl Prober {
    pub fn new(client: &DeviceRpcClient, config: ProbeConfig) -> Self {
        Self {
            client: client.with_timeout(config.timeout),
            concurrency: config.concurrency,
        }
    }

    pub async fn probe(&self, candidate: Candidate) -> ProbeOutcome {
        match self.client.summary(candidate).await {
            Ok(_) => ProbeOutcome::Reachable(DeviceHandle {
                addr: candidate,
                responded_cleanly: true,
            }),
            Err(e) if e.is_connect_failure() => ProbeOutcome::Unreachable(e),
            Err(e) => {
                debug!("{} answered the probe but the reply was unusable: {}", candidate, e);
                ProbeOutcome::Reachable(DeviceHandle {
                    addr: candidate,
                    responded_cleanly: false,
                })
            }
        }
    }

    /// Probes every candidate through the bounded pool.
    pub async fn probe_all(&self, candidates: Vec<Candidate>) -> ProbeReport {
        let total = candidates.len();
        let outcomes = run_bounded(candidates, self.concurrency, |candidate| async move {
            (candidate, self.probe(candidate).await)
        })
        .await;

        let mut report = ProbeReport::default();
        for (candidate, outcome) in outcomes {
            match outcome {
                ProbeOutcome::Reachable(handle) => report.reachable.push(handle),
                ProbeOutcome::Unreachable(e) => report.unreachable.push((candidate, e)),
            }
        }
        report.reachable.sort_by_key(|h| h.addr);
        report.unreachable.sort_by_key(|(c, _)| *c);

        info!(
            "Probed {} addresses: {} device(s) found",
            total,
            report.reachable.len()
        );
        report
    }
}
