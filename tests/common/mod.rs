//! Simulated mining devices for integration tests.
//!
//! Each simulated device is a `TcpListener` on `127.0.0.1:0` that reads one
//! JSON request per connection and answers with whatever the test's responder
//! returns for it. JSON replies are NUL-terminated, as stock cgminer does.

#![allow(dead_code)]

use asic_scanner::config::RpcConfig;
use asic_scanner::miner::DeviceRpcClient;
use serde_json::{json, Value};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as seen by the simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: String,
    pub parameter: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Reply {
    /// Serialized and followed by a NUL byte.
    Json(Value),
    /// Written verbatim.
    Raw(Vec<u8>),
    /// Keep the connection open without answering.
    Silent,
    /// Answer like `Json`, then keep the connection open.
    Lingering(Value),
    /// Answer like `Raw`, then keep the connection open.
    LingeringRaw(Vec<u8>),
    /// Close the connection without writing anything.
    Close,
}

/// Connections a group of simulated devices are serving at once.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn bind_loopback() -> (TcpListener, SocketAddrV4) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("Failed to bind simulated device");
    let addr = match listener.local_addr().expect("Missing local address") {
        SocketAddr::V4(addr) => addr,
        SocketAddr::V6(addr) => panic!("Expected an IPv4 listener, got {}", addr),
    };
    (listener, addr)
}

/// Starts a device that holds every connection for `delay` before answering
/// `summary`, counting itself in `inflight` meanwhile.
///
/// The count drops before the reply is written, so it never runs ahead of the
/// client's own count of open requests.
pub async fn spawn_slow_antminer(inflight: Arc<InFlight>, delay: Duration) -> SocketAddrV4 {
    let (listener, addr) = bind_loopback().await;

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let inflight = Arc::clone(&inflight);
            tokio::spawn(async move {
                inflight.enter();
                let request = read_request(&mut stream).await;
                tokio::time::sleep(delay).await;
                inflight.leave();

                if request.is_some() {
                    let mut bytes = serde_json::to_vec(&summary_reply(100.0, 101.0))
                        .expect("Failed to encode reply");
                    bytes.push(0);
                    let _ = stream.write_all(&bytes).await;
                }
                let _ = stream.shutdown().await;
            });
        }
    });

    addr
}

/// Starts a device that answers every request with `respond(request)`.
pub async fn spawn_device<F>(respond: F) -> SocketAddrV4
where
    F: Fn(&Request) -> Reply + Send + Sync + 'static,
{
    let (listener, addr) = bind_loopback().await;

    let respond = Arc::new(respond);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                serve(stream, respond.as_ref()).await;
            });
        }
    });

    addr
}

async fn serve<F>(mut stream: TcpStream, respond: &F)
where
    F: Fn(&Request) -> Reply,
{
    let Some(request) = read_request(&mut stream).await else {
        return;
    };

    match respond(&request) {
        Reply::Json(value) => {
            let mut bytes = serde_json::to_vec(&value).expect("Failed to encode reply");
            bytes.push(0);
            let _ = stream.write_all(&bytes).await;
        }
        Reply::Raw(bytes) => {
            let _ = stream.write_all(&bytes).await;
        }
        Reply::Silent => {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Reply::Lingering(value) => {
            let mut bytes = serde_json::to_vec(&value).expect("Failed to encode reply");
            bytes.push(0);
            let _ = stream.write_all(&bytes).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Reply::LingeringRaw(bytes) => {
            let _ = stream.write_all(&bytes).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Reply::Close => {}
    }
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let value = loop {
        if let Ok(value) = serde_json::from_slice::<Value>(&buf) {
            break value;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break serde_json::from_slice::<Value>(&buf).ok()?;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    Some(Request {
        command: value.get("command")?.as_str()?.to_string(),
        parameter: value
            .get("parameter")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// An address on which nothing listens.
pub async fn refused_addr() -> SocketAddrV4 {
    let (listener, addr) = bind_loopback().await;
    drop(listener);
    addr
}

/// Client with a short timeout suited to loopback tests.
pub fn test_client(timeout_ms: u64) -> DeviceRpcClient {
    DeviceRpcClient::new(&RpcConfig {
        timeout_ms,
        max_response_bytes: 1024 * 1024,
    })
}

pub fn status_block(letter: &str, code: i64, msg: &str) -> Value {
    json!([{
        "STATUS": letter,
        "When": 1_700_000_000,
        "Code": code,
        "Msg": msg,
        "Description": "cgminer 4.11.1"
    }])
}

pub fn summary_reply(ghs_av: f64, ghs_5s: f64) -> Value {
    json!({
        "STATUS": status_block("S", 11, "Summary"),
        "SUMMARY": [{
            "Elapsed": 86_400,
            "GHS 5s": ghs_5s,
            "GHS av": ghs_av,
            "Found Blocks": 0,
            "Getworks": 2_880,
            "Accepted": 12_345,
            "Rejected": 12,
            "Hardware Errors": 7,
            "Utility": 8.57,
            "Discarded": 0,
            "Stale": 0
        }],
        "id": 1
    })
}

pub fn pool_entry(index: u64, url: &str, user: &str, active: bool) -> Value {
    json!({
        "POOL": index,
        "URL": url,
        "Status": "Alive",
        "Priority": index,
        "User": user,
        "Stratum Active": active,
        "Accepted": 1_000,
        "Rejected": 2
    })
}

pub fn pools_reply(pools: Vec<Value>) -> Value {
    json!({
        "STATUS": status_block("S", 7, format!("{} Pool(s)", pools.len()).as_str()),
        "POOLS": pools,
        "id": 1
    })
}

/// An Antminer S19-style `stats` reply.
pub fn stats_reply() -> Value {
    json!({
        "STATUS": status_block("S", 70, "BMMiner stats"),
        "STATS": [
            {
                "BMMiner": "1.0.0",
                "Miner": "49.0.1.3",
                "CompileTime": "Mon Mar 1 12:00:00 CST 2021",
                "Type": "Antminer S19j Pro"
            },
            {
                "STATS": 0,
                "ID": "BC50",
                "Elapsed": 86_400,
                "GHS 5s": "100512.34",
                "GHS av": 99_950.5,
                "rate_30m": 99_800.0,
                "total_rateideal": 104_000.0,
                "fan_num": 4,
                "fan1": 5_400,
                "fan2": 5_460,
                "fan3": 0,
                "fan4": 5_340,
                "temp_num": 3,
                "temp1": 60,
                "temp2": 62,
                "temp3": 61,
                "temp2_1": 75,
                "temp2_2": 78,
                "temp2_3": 0,
                "temp_in_chip_1": 56,
                "temp_in_chip_2": 58,
                "temp_in_chip_3": 57,
                "temp_out_chip_1": 73,
                "temp_out_chip_2": 76,
                "temp_out_chip_3": 0,
                "temp_max": 78,
                "frequency": 525,
                "miner_count": 3,
                "chain_acn1": 126,
                "chain_acn2": 126,
                "chain_acn3": 126,
                "chain_rate1": "33400.12",
                "chain_rate2": "33300.50",
                "chain_rate3": "33250.00",
                "chain_hw1": 4_756,
                "chain_hw2": 2_218,
                "chain_hw3": 7_553,
                "chain_avg_hashrate1": "33412.11 GH/s",
                "chain_avg_hashrate2": "33310.02 GH/s",
                "chain_avg_hashrate3": "33244.90 GH/s"
            }
        ],
        "id": 1
    })
}

pub fn error_reply(code: i64, msg: &str) -> Value {
    json!({
        "STATUS": status_block("E", code, msg),
        "id": 1
    })
}

/// A well-behaved device answering `summary`, `pools` and `stats`.
pub async fn spawn_antminer(ghs_av: f64) -> SocketAddrV4 {
    spawn_device(move |request| match request.command.as_str() {
        "summary" => Reply::Json(summary_reply(ghs_av, ghs_av + 10.0)),
        "pools" => Reply::Json(pools_reply(vec![
            pool_entry(0, "stratum+tcp://pool.example.com:3333", "acct.rig01", true),
            pool_entry(1, "stratum+tcp://backup.example.com:3333", "acct.rig01", false),
        ])),
        "stats" => Reply::Json(stats_reply()),
        _ => Reply::Json(error_reply(14, "Invalid command")),
    })
    .await
}
