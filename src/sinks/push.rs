//! Remote push sink.
//!
//! POSTs each record as JSON to a configured endpoint with a bearer token.
//! By default the record is wrapped as `{"results": [record]}`, the batch
//! envelope the collection API expects; `wrap_results = false` sends the bare
//! record. Hash rates are also rendered in the unit customary for the device
//! model:
//!
//! - `hashrate_display` - sum of the board rates when boards reported one,
//!   else the average hash rate
//! - `hashrate_ideal_display` - the ideal rate
//! - `boards[i].hashrate_display` - each board's rate
//!
//! Any non-2xx status, connection error or timeout is a delivery failure.

use super::Sink;
use crate::config::PushSinkConfig;
use crate::error::{Result, ScannerError};
use crate::telemetry::TelemetryRecord;
use crate::units::format_hashrate;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const SINK_NAME: &str = "push";

pub struct RemotePush {
    http: reqwest::Client,
    url: String,
    api_key: Option<SecretString>,
    wrap_results: bool,
}

impl RemotePush {
    pub fn new(config: &PushSinkConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ScannerError::Config("push sink requires a url".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("asic-scanner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            url,
            api_key: config.api_key.clone(),
            wrap_results: config.wrap_results,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// JSON body posted for `record`.
    pub fn payload(&self, record: &TelemetryRecord) -> Result<Value> {
        let model = record.model.as_deref();
        let display = |ghs: f64| Value::String(format_hashrate(ghs, model));

        let mut body = serde_json::to_value(record)?;
        if let Value::Object(map) = &mut body {
            if let Some(ghs) = record.boards_hashrate_ghs().or(record.hashrate_ghs) {
                map.insert("hashrate_display".to_string(), display(ghs));
            }
            if let Some(ghs) = record.hashrate_ideal_ghs {
                map.insert("hashrate_ideal_display".to_string(), display(ghs));
            }
            if let Some(Value::Array(boards)) = map.get_mut("boards") {
                for (board, reading) in boards.iter_mut().zip(record.boards.iter().flatten()) {
                    if let (Value::Object(board), Some(ghs)) = (board, reading.hashrate_ghs) {
                        board.insert("hashrate_display".to_string(), display(ghs));
                    }
                }
            }
        }

        Ok(if self.wrap_results {
            json!({ "results": [body] })
        } else {
            body
        })
    }

    fn failure(reason: String) -> ScannerError {
        ScannerError::SinkDelivery {
            sink: SINK_NAME.to_string(),
            reason,
        }
    }
}

#[async_trait]
impl Sink for RemotePush {
    fn name(&self) -> &str {
        SINK_NAME
    }

    async fn deliver(&self, record: &TelemetryRecord) -> Result<()> {
        let body = self.payload(record)?;

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Self::failure(format!("POST {} timed out", self.url))
            } else {
                Self::failure(format!("POST {} failed: {}", self.url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::failure(format!("POST {} returned {}", self.url, status)));
        }

        debug!("Pushed {} to {} ({})", record.address, self.url, status);
        Ok(())
    }
}
