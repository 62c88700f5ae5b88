//! Best-effort MAC lookup from the host's ARP cache.
//!
//! Only devices on the same L2 segment have an entry, and only after the host
//! has talked to them. The probe and collection connections take care of the
//! second part. Any failure (no `arp` binary, no entry, timeout) is `None`.

use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn lookup_mac(ip: Ipv4Addr) -> Option<String> {
    let lookup = Command::new("arp")
        .arg("-n")
        .arg(ip.to_string())
        .kill_on_drop(true)
        .output();

    let output = match timeout(LOOKUP_TIMEOUT, lookup).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!("arp lookup for {} failed: {}", ip, e);
            return None;
        }
        Err(_) => {
            debug!("arp lookup for {} timed out", ip);
            return None;
        }
    };

    if !output.status.success() {
        return None;
    }
    find_mac(&String::from_utf8_lossy(&output.stdout))
}

/// First MAC-shaped token in `text`, lowercased, zero-padded and
/// colon-separated. BSD `arp` drops leading zeros (`a4:bb:6d:1:2:f`).
pub fn find_mac(text: &str) -> Option<String> {
    text.split_whitespace().find_map(|token| {
        let parts: Vec<&str> = token.split([':', '-']).collect();
        let valid = parts.len() == 6
            && parts.iter().all(|p| {
                (1..=2).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_hexdigit())
            });
        valid.then(|| {
            parts
                .iter()
                .map(|p| format!("{:0>2}", p.to_ascii_lowercase()))
                .collect::<Vec<_>>()
                .join(":")
        })
    })
}
