//! Subnet Descriptors
//!
//! Expands a user-supplied IPv4 range into the ordered list of host addresses
//! to probe. Two notations are accepted:
//!
//! - CIDR: `192.168.2.0/24` (host bits are ignored, `192.168.2.77/24` is the same network)
//! - Wildcard last octet: `192.168.2.*`, shorthand for `192.168.2.0/24`
//!
//! A bare address (`192.168.2.10`) is treated as `/32`.
//!
//! Host enumeration excludes the network and broadcast addresses for prefixes
//! up to `/30`. A `/31` yields both of its addresses and a `/32` its single one.
//! Everything here is pure; nothing touches the network.

use crate::error::{Result, ScannerError};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An immutable IPv4 range to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetDescriptor {
    network: Ipv4Addr,
    prefix: u8,
    wildcard: bool,
}

impl SubnetDescriptor {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(invalid(input, "empty descriptor"));
        }

        if let Some(base) = input.strip_suffix(".*") {
            let octets = parse_octets(input, base, 3)?;
            let network = Ipv4Addr::new(octets[0], octets[1], octets[2], 0);
            return Ok(Self {
                network,
                prefix: 24,
                wildcard: true,
            });
        }

        let (addr, prefix) = match input.split_once('/') {
            Some((addr, prefix)) => {
                let prefix = prefix
                    .parse::<u8>()
                    .map_err(|_| invalid(input, "prefix length is not a number"))?;
                if prefix > 32 {
                    return Err(invalid(input, "prefix length must be 0-32"));
                }
                (addr, prefix)
            }
            None => (input, 32),
        };

        let octets = parse_octets(input, addr, 4)?;
        let addr = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);

        Ok(Self {
            network: Ipv4Addr::from(u32::from(addr) & mask(prefix)),
            prefix,
            wildcard: false,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses [`hosts`](Self::hosts) will yield.
    pub fn host_count(&self) -> u64 {
        let (first, last) = self.host_range();
        u64::from(last - first) + 1
    }

    /// Host addresses in ascending order.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        let (first, last) = self.host_range();
        (first..=last).map(Ipv4Addr::from)
    }

    /// Collects [`hosts`](Self::hosts) into a vector.
    pub fn enumerate(&self) -> Vec<Ipv4Addr> {
        self.hosts().collect()
    }

    fn host_range(&self) -> (u32, u32) {
        let network = u32::from(self.network);
        let broadcast = network | !mask(self.prefix);
        match self.prefix {
            32 => (network, network),
            31 => (network, broadcast),
            _ => (network + 1, broadcast - 1),
        }
    }
}

/// Parses `descriptor` and returns its host addresses.
pub fn enumerate(descriptor: &str) -> Result<Vec<Ipv4Addr>> {
    Ok(SubnetDescriptor::parse(descriptor)?.enumerate())
}

impl FromStr for SubnetDescriptor {
    type Err = ScannerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SubnetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wildcard {
            let [a, b, c, _] = self.network.octets();
            write!(f, "{}.{}.{}.*", a, b, c)
        } else {
            write!(f, "{}/{}", self.network, self.prefix)
        }
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn parse_octets(input: &str, dotted: &str, expected: usize) -> Result<Vec<u8>> {
    let parts: Vec<&str> = dotted.split('.').collect();
    if parts.len() != expected {
        return Err(invalid(
            input,
            &format!("expected {} octets, found {}", expected, parts.len()),
        ));
    }

    parts
        .iter()
        .map(|part| {
            if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(input, &format!("'{}' is not an octet", part)));
            }
            if part.len() > 1 && part.starts_with('0') {
                return Err(invalid(
                    input,
                    &format!("octet '{}' has a leading zero", part),
                ));
            }
            part.parse::<u8>()
                .map_err(|_| invalid(input, &format!("octet {} is out of range", part)))
        })
        .collect()
}

fn invalid(input: &str, reason: &str) -> ScannerError {
    ScannerError::InvalidDescriptor(format!("'{}': {}", input, reason))
}
