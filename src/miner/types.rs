//! CGMiner/BMMiner API Type Definitions
//!
//! Requests are a single JSON object written to the device:
//!
//! ```json
//! {"command": "switchpool", "parameter": "1"}
//! ```
//!
//! Responses are a JSON object holding a `STATUS` block plus one collection
//! named after the command (`SUMMARY`, `POOLS`, `STATS`, ...).
//!
//! # Design Notes
//!
//! - Field names differ between firmware builds (`URL` vs `Stratum URL`,
//!   numbers sent as strings, etc.), so payload collections stay as raw
//!   [`serde_json::Map`]s and are read through the lenient helpers in
//!   [`fields`]. Only the `STATUS` block is deserialized into a struct.
//! - Some firmwares report `STATUS` as an array of one object, others as a
//!   plain string with the status fields at the top level. Both are handled by
//!   [`CommandResponse::status`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A command sent to a device.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            parameter: None,
        }
    }

    pub fn with_parameter(command: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            parameter: Some(parameter.into()),
        }
    }

    /// Parses the `command|parameter` shorthand used by the cgminer tooling.
    ///
    /// Returns `None` for an empty command or more than one `|`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '|');
        let command = parts.next()?.trim();
        if command.is_empty() {
            return None;
        }
        let parameter = parts.next();
        if parts.next().is_some() {
            return None;
        }
        Some(match parameter {
            Some(p) => Self::with_parameter(command, p),
            None => Self::new(command),
        })
    }

    /// Top-level key a successful response to this command must contain.
    pub fn expected_key(&self) -> &'static str {
        match self.command.as_str() {
            "summary" => "SUMMARY",
            "pools" => "POOLS",
            "stats" => "STATS",
            "version" => "VERSION",
            "devs" => "DEVS",
            _ => "STATUS",
        }
    }
}

/// Severity letter carried in a `STATUS` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    Info,
    Warning,
    Error,
    Fatal,
    Unknown,
}

impl StatusCode {
    pub fn from_letter(letter: &str) -> Self {
        match letter {
            "S" => StatusCode::Success,
            "I" => StatusCode::Info,
            "W" => StatusCode::Warning,
            "E" => StatusCode::Error,
            "F" => StatusCode::Fatal,
            _ => StatusCode::Unknown,
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, StatusCode::Error | StatusCode::Fatal)
    }
}

/// The `STATUS` block of a response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StatusEntry {
    #[serde(rename = "STATUS")]
    pub status: String,
    #[serde(rename = "Code", default)]
    pub code: Option<i64>,
    #[serde(rename = "Msg", default)]
    pub message: Option<String>,
    #[serde(rename = "When", default)]
    pub when: Option<i64>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
}

impl StatusEntry {
    pub fn severity(&self) -> StatusCode {
        StatusCode::from_letter(&self.status)
    }
}

/// A parsed device response.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub command: String,
    pub body: Map<String, Value>,
}

impl CommandResponse {
    pub fn new(command: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            command: command.into(),
            body,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn status(&self) -> Option<StatusEntry> {
        match self.body.get("STATUS")? {
            Value::Array(items) => serde_json::from_value(items.first()?.clone()).ok(),
            Value::String(_) => serde_json::from_value(Value::Object(self.body.clone())).ok(),
            _ => None,
        }
    }

    /// Objects of the collection stored under `key`. Non-object items are skipped.
    pub fn entries(&self, key: &str) -> Vec<&Map<String, Value>> {
        match self.body.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
            Some(Value::Object(single)) => vec![single],
            _ => Vec::new(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

/// Lenient accessors over raw response objects.
///
/// Numbers may arrive as JSON numbers or as numeric strings; booleans as
/// `true`, `"true"`, `"Y"` or `1`.
pub mod fields {
    use serde_json::{Map, Value};

    pub fn number(map: &Map<String, Value>, key: &str) -> Option<f64> {
        let value = match map.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn first_number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|key| number(map, key))
    }

    pub fn unsigned(map: &Map<String, Value>, key: &str) -> Option<u64> {
        match map.get(key)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<u64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite() && *v >= 0.0)
                        .map(|v| v as u64)
                })
            }
            _ => None,
        }
    }

    pub fn first_unsigned(map: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
        keys.iter().find_map(|key| unsigned(map, key))
    }

    pub fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
        match map.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| text(map, key))
    }

    pub fn flag(map: &Map<String, Value>, key: &str) -> Option<bool> {
        match map.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|v| v != 0.0),
            Value::String(s) => Some(matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "y" | "on" | "alive"
            )),
            _ => None,
        }
    }
}
