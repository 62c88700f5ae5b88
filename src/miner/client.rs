//! CGMiner/BMMiner API Client
//!
//! This module implements a single request/response exchange with a mining
//! device over its plain TCP API (port 4028 on stock firmware).
//!
//! # Protocol
//!
//! - **Connection**: one TCP connection per command, no authentication
//! - **Request**: one JSON object, `{"command": .., "parameter": ..}`
//! - **Response**: one JSON object, after which the device closes the socket.
//!   Several firmwares NUL-terminate the payload.
//!
//! The client keeps no state between calls and never retries. Retry policy
//! belongs to the caller.
//!
//! # Example
//!
//! ```no_run
//! use asic_scanner::config::RpcConfig;
//! use asic_scanner::miner::DeviceRpcClient;
//! use std::net::{Ipv4Addr, SocketAddrV4};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DeviceRpcClient::new(&RpcConfig::default());
//! let addr = SocketAddrV4::new(Ipv4Addr::new(192, 168, 2, 40), 4028);
//! let summary = client.summary(addr).await?;
//! println!("{:?}", summary.entries("SUMMARY"));
//! # Ok(())
//! # }
//! ```

use crate::config::RpcConfig;
use crate::error::RpcError;
use crate::miner::types::{CommandRequest, CommandResponse};
use serde_json::Value;
use std::io::ErrorKind;
use std::net::SocketAddrV4;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::debug;

const READ_CHUNK: usize = 4096;

/// Stateless client for the device JSON API.
///
/// Cheap to clone. The same instance may be shared by any number of tasks,
/// since every call opens (and drops) its own connection.
#[derive(Debug, Clone)]
pub struct DeviceRpcClient {
    timeout: Duration,
    max_response_bytes: usize,
}

type RpcResult<T> = std::result::Result<T, RpcError>;

impl DeviceRpcClient {
    pub fn new(config: &RpcConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_response_bytes: config.max_response_bytes,
        }
    }

    /// Same client with a different per-phase timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn summary(&self, addr: SocketAddrV4) -> RpcResult<CommandResponse> {
        self.send(addr, &CommandRequest::new("summary")).await
    }

    pub async fn pools(&self, addr: SocketAddrV4) -> RpcResult<CommandResponse> {
        self.send(addr, &CommandRequest::new("pools")).await
    }

    pub async fn stats(&self, addr: SocketAddrV4) -> RpcResult<CommandResponse> {
        self.send(addr, &CommandRequest::new("stats")).await
    }

    pub async fn version(&self, addr: SocketAddrV4) -> RpcResult<CommandResponse> {
        self.send(addr, &CommandRequest::new("version")).await
    }

    /// Soft reset: restarts the mining process without rebooting.
    pub async fn reset(&self, addr: SocketAddrV4) -> RpcResult<CommandResponse> {
        self.send(addr, &CommandRequest::new("restart")).await
    }

    /// Reboots the whole device.
    pub async fn reboot(&self, addr: SocketAddrV4) -> RpcResult<CommandResponse> {
        self.send(addr, &CommandRequest::new("reboot")).await
    }

    /// Makes pool `index` (as numbered by `pools`) the active one.
    pub async fn switch_pool(&self, addr: SocketAddrV4, index: u32) -> RpcResult<CommandResponse> {
        self.send(
            addr,
            &CommandRequest::with_parameter("switchpool", index.to_string()),
        )
        .await
    }

    pub async fn add_pool(
        &self,
        addr: SocketAddrV4,
        url: &str,
        user: &str,
        password: &str,
    ) -> RpcResult<CommandResponse> {
        let parameter = format!("{},{},{}", url, user, password);
        self.send(addr, &CommandRequest::with_parameter("addpool", parameter))
            .await
    }

    /// Sends `name` with an optional parameter.
    pub async fn command(
        &self,
        addr: SocketAddrV4,
        name: &str,
        parameter: Option<&str>,
    ) -> RpcResult<CommandResponse> {
        let request = match parameter {
            Some(p) => CommandRequest::with_parameter(name, p),
            None => CommandRequest::new(name),
        };
        self.send(addr, &request).await
    }

    /// Execute one command against `addr`.
    ///
    /// Connects, writes the request, half-closes, reads until the device closes the
    /// connection (or `max_response_bytes` is reached), then parses and
    /// validates the payload. The socket is dropped on every return path.
    pub async fn send(
        &self,
        addr: SocketAddrV4,
        request: &CommandRequest,
    ) -> RpcResult<CommandResponse> {
        let payload = serde_json::to_vec(request).map_err(|e| RpcError::MalformedResponse {
            addr,
            reason: format!("failed to encode request: {}", e),
        })?;

        debug!("Sending '{}' to {}", request.command, addr);
        let raw = self.exchange(addr, request, &payload).await?;
        debug!("{} bytes of '{}' response from {}", raw.len(), request.command, addr);

        parse_response(addr, request, &raw)
    }

    async fn exchange(
        &self,
        addr: SocketAddrV4,
        request: &CommandRequest,
        payload: &[u8],
    ) -> RpcResult<Vec<u8>> {
        let mut stream = match timeout(self.timeout, TcpStream::connect(addr)).await {
            Err(_) => return Err(RpcError::ConnectTimeout(addr)),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                return Err(RpcError::ConnectRefused(addr))
            }
            Ok(Err(source)) => return Err(RpcError::Connect { addr, source }),
            Ok(Ok(stream)) => stream,
        };

        let deadline = Instant::now() + self.timeout;

        match timeout_at(deadline, stream.write_all(payload)).await {
            Err(_) => return Err(RpcError::ReadTimeout(addr)),
            Ok(Err(source)) => return Err(RpcError::Io { addr, source }),
            Ok(Ok(())) => {}
        }
        if let Err(e) = stream.shutdown().await {
            debug!("Could not half-close connection to {}: {}", addr, e);
        }

        let mut raw = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];
        while raw.len() < self.max_response_bytes {
            let want = READ_CHUNK.min(self.max_response_bytes - raw.len());
            match timeout_at(deadline, stream.read(&mut chunk[..want])).await {
                Err(_) => {
                    // Some firmwares leave the socket open after a complete reply.
                    if is_complete_reply(addr, request, &raw) {
                        debug!("{} kept the connection open after a complete reply", addr);
                        break;
                    }
                    return Err(RpcError::ReadTimeout(addr));
                }
                Ok(Err(source)) => return Err(RpcError::Io { addr, source }),
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => raw.extend_from_slice(&chunk[..n]),
            }
        }

        Ok(raw)
    }
}

/// Turns the raw bytes of a reply into a validated [`CommandResponse`].
///
/// - NUL bytes and surrounding whitespace are stripped
/// - the `}{` concatenation emitted by some BMMiner `stats` builds is repaired
/// - the payload must be a JSON object
/// - an `E`/`F` status is reported as [`RpcError::CommandRejected`]
/// - otherwise the command's expected top-level key must be present
pub fn parse_response(
    addr: SocketAddrV4,
    request: &CommandRequest,
    raw: &[u8],
) -> RpcResult<CommandResponse> {
    let cleaned: Vec<u8> = raw.iter().copied().filter(|b| *b != 0).collect();
    let text = String::from_utf8_lossy(&cleaned);
    let text = text.trim();

    if text.is_empty() {
        return Err(RpcError::MalformedResponse {
            addr,
            reason: "empty response".to_string(),
        });
    }

    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(first_err) if text.contains("}{") => {
            serde_json::from_str::<Value>(&text.replace("}{", "},{")).map_err(|_| {
                RpcError::MalformedResponse {
                    addr,
                    reason: first_err.to_string(),
                }
            })?
        }
        Err(e) => {
            return Err(RpcError::MalformedResponse {
                addr,
                reason: e.to_string(),
            })
        }
    };

    let Value::Object(body) = value else {
        return Err(RpcError::MalformedResponse {
            addr,
            reason: "response is not a JSON object".to_string(),
        });
    };

    let response = CommandResponse::new(request.command.clone(), body);

    if let Some(status) = response.status() {
        if status.severity().is_failure() {
            return Err(RpcError::CommandRejected {
                code: status.code.unwrap_or_default(),
                message: status
                    .message
                    .unwrap_or_else(|| format!("status {}", status.status)),
            });
        }
    }

    let expected = request.expected_key();
    if response.get(expected).is_none() {
        return Err(RpcError::MalformedResponse {
            addr,
            reason: format!("missing '{}' in '{}' response", expected, request.command),
        });
    }

    Ok(response)
}

/// Whether `raw` already holds the whole reply, including replies that only
/// parse after repair or that carry an error status.
fn is_complete_reply(addr: SocketAddrV4, request: &CommandRequest, raw: &[u8]) -> bool {
    !matches!(
        parse_response(addr, request, raw),
        Err(RpcError::MalformedResponse { .. })
    )
}
