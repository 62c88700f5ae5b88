//! ASIC Miner Subnet Scanner
//!
//! Discovers ASIC mining devices on a local IPv4 subnet, reads their telemetry
//! over the CGMiner/BMMiner JSON API and fans it out to storage, a remote
//! collection endpoint and Prometheus.
//!
//! # Overview
//!
//! Every scan cycle enumerates the configured subnet, probes each address on
//! the API port, collects `summary`/`pools`/`stats` from the devices that
//! answered and hands one normalized record per device to every sink. A dead
//! host, a garbled reply or a failing sink only ever affects its own entry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    JSON over TCP     ┌──────────────────────────────┐
//! │   Miners    │ ◄─────────────────►  │           Scanner            │
//! │  :4028 API  │                      │                              │
//! └─────────────┘                      │ subnet → probe → collectors  │
//!                                      │              │               │
//!                                      │              ▼               │      HTTP      ┌────────────┐
//!                                      │            sinks ────────────┼──────────────► │ Prometheus │
//!                                      │  (file, push, prometheus)    │   /metrics     └────────────┘
//!                                      └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`subnet`] - Subnet descriptors and address enumeration
//! - [`miner`] - Device API client and wire types
//! - [`workers`] - Bounded concurrency shared by every phase
//! - [`probe`] - Device discovery
//! - [`arp`] - Best-effort MAC lookup
//! - [`collectors`] - Telemetry collection and normalization
//! - [`telemetry`] - The normalized record
//! - [`units`] - Hash rate units per device model
//! - [`sinks`] - Record delivery
//! - [`scanner`] - The scan cycle and loop
//! - [`metrics`] - Prometheus metric definitions
//! - [`server`] - HTTP server
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use asic_scanner::{config::Config, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     server::start(config).await?;
//!     Ok(())
//! }
//! ```

pub mod arp;
pub mod collectors;
pub mod config;
pub mod error;
pub mod metrics;
pub mod miner;
pub mod probe;
pub mod scanner;
pub mod server;
pub mod sinks;
pub mod subnet;
pub mod telemetry;
pub mod units;
pub mod workers;
