//! Error message quality tests
//!
//! Tests that verify error messages are helpful and distinguishable.

use asic_scanner::error::{RpcError, ScannerError};
use std::net::{Ipv4Addr, SocketAddrV4};

fn device() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::new(192, 168, 2, 40), 4028)
}

#[test]
fn test_descriptor_error_message_clarity() {
    // Given: A descriptor error
    let error = ScannerError::InvalidDescriptor("'192.168.2.999': octet 999 is out of range".to_string());

    // When: Converting to string
    let message = format!("{}", error);

    // Then: Message should clearly indicate the descriptor problem
    assert!(message.contains("Invalid subnet descriptor"));
    assert!(message.contains("192.168.2.999"));
}

#[test]
fn test_config_error_message_clarity() {
    let error = ScannerError::Config("push sink requires a url".to_string());
    let message = format!("{}", error);
    assert!(message.contains("Configuration error"));
    assert!(message.contains("push sink requires a url"));
}

#[test]
fn test_sink_error_names_the_sink() {
    // Given: A delivery failure
    let error = ScannerError::SinkDelivery {
        sink: "push".to_string(),
        reason: "POST https://collector/ingest returned 503".to_string(),
    };

    // Then: Both sink and reason are in the message
    let message = error.to_string();
    assert!(message.contains("'push'"));
    assert!(message.contains("503"));
}

#[test]
fn test_rpc_errors_name_the_device() {
    // Given: Every address-carrying RPC error
    let errors = vec![
        RpcError::ConnectRefused(device()),
        RpcError::ConnectTimeout(device()),
        RpcError::ReadTimeout(device()),
        RpcError::MalformedResponse {
            addr: device(),
            reason: "empty response".to_string(),
        },
    ];

    // Then: Each message names the device address
    for error in errors {
        assert!(
            error.to_string().contains("192.168.2.40:4028"),
            "{} does not name the device",
            error
        );
    }
}

#[test]
fn test_rpc_error_kinds_are_distinguishable() {
    let io = || std::io::Error::new(std::io::ErrorKind::Other, "boom");
    let kinds = [
        RpcError::ConnectRefused(device()).kind(),
        RpcError::ConnectTimeout(device()).kind(),
        RpcError::Connect {
            addr: device(),
            source: io(),
        }
        .kind(),
        RpcError::ReadTimeout(device()).kind(),
        RpcError::Io {
            addr: device(),
            source: io(),
        }
        .kind(),
        RpcError::MalformedResponse {
            addr: device(),
            reason: String::new(),
        }
        .kind(),
        RpcError::CommandRejected {
            code: 14,
            message: "Invalid command".to_string(),
        }
        .kind(),
    ];

    let mut unique = kinds.to_vec();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), kinds.len(), "Duplicate error kinds: {:?}", kinds);
}

#[test]
fn test_only_connect_failures_exclude_a_device() {
    assert!(RpcError::ConnectRefused(device()).is_connect_failure());
    assert!(RpcError::ConnectTimeout(device()).is_connect_failure());
    assert!(!RpcError::ReadTimeout(device()).is_connect_failure());
    assert!(!RpcError::CommandRejected {
        code: 45,
        message: "Access denied".to_string()
    }
    .is_connect_failure());
}

#[test]
fn test_rpc_error_converts_into_scanner_error() {
    // Given: An RPC error
    let rpc = RpcError::ReadTimeout(device());

    // When: Converting with `?`-style From
    let error: ScannerError = rpc.into();

    // Then: The context is preserved
    let message = error.to_string();
    assert!(message.contains("Device RPC error"));
    assert!(message.contains("timed out"));
}

#[test]
fn test_json_error_message_clarity() {
    let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
    let error: ScannerError = json_err.into();
    assert!(error.to_string().contains("JSON error"));
}

#[test]
fn test_error_debug_format() {
    let error = ScannerError::Config("bad".to_string());
    let debug = format!("{:?}", error);
    assert!(debug.contains("Config"));
}
