//! Hash rate units.
//!
//! Records always store GH/s. Devices report in whatever prefix their
//! firmware uses (`MHS av`, `GHS av`, ...), and people reading a pushed
//! payload expect the unit customary for the model (TH/s for SHA-256
//! Antminers, GH/s for Scrypt L-series).
//!
//! L7 firmware labels its rates GH/s but reports MH/s. A stock L7 makes about
//! 9.5 GH/s, so any L7 value above 1000 is read as MH/s and scaled down.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashrateUnit {
    KHs,
    MHs,
    GHs,
    THs,
}

impl HashrateUnit {
    pub fn label(self) -> &'static str {
        match self {
            HashrateUnit::KHs => "KH/s",
            HashrateUnit::MHs => "MH/s",
            HashrateUnit::GHs => "GH/s",
            HashrateUnit::THs => "TH/s",
        }
    }

    fn ghs_factor(self) -> f64 {
        match self {
            HashrateUnit::KHs => 1e-6,
            HashrateUnit::MHs => 1e-3,
            HashrateUnit::GHs => 1.0,
            HashrateUnit::THs => 1e3,
        }
    }

    pub fn to_ghs(self, value: f64) -> f64 {
        value * self.ghs_factor()
    }

    pub fn from_ghs(self, ghs: f64) -> f64 {
        ghs / self.ghs_factor()
    }
}

impl fmt::Display for HashrateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// (model family key, unit)
const MODEL_UNITS: &[(&str, HashrateUnit)] = &[
    ("s21", HashrateUnit::THs),
    ("s19", HashrateUnit::THs),
    ("s17", HashrateUnit::THs),
    ("s9", HashrateUnit::THs),
    ("t21", HashrateUnit::THs),
    ("t19", HashrateUnit::THs),
    ("t17", HashrateUnit::THs),
    ("l7", HashrateUnit::GHs),
    ("l9", HashrateUnit::GHs),
];

/// Reduces a model name to its family key: `"Antminer S19j Pro"` -> `"s19"`.
pub fn model_key(model: &str) -> Option<String> {
    let chars: Vec<char> = model.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if !c.is_ascii_alphabetic() {
            continue;
        }
        let mut j = i + 1;
        while j < chars.len() && (chars[j] == ' ' || chars[j] == '-') {
            j += 1;
        }
        let digits: String = chars[j..]
            .iter()
            .take_while(|d| d.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            return Some(format!("{}{}", c.to_ascii_lowercase(), digits));
        }
    }
    let trimmed = model.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_ascii_lowercase())
}

/// Display unit for `model`, GH/s when unknown.
pub fn preferred_unit(model: Option<&str>) -> HashrateUnit {
    model
        .and_then(model_key)
        .and_then(|key| {
            MODEL_UNITS
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, unit)| *unit)
        })
        .unwrap_or(HashrateUnit::GHs)
}

const L7_MHS_THRESHOLD: f64 = 1000.0;

/// Corrects a reported GH/s value for firmwares that mislabel their unit.
///
/// A corrected L7 value is at most 1000 and so passes through unchanged.
pub fn normalize_ghs(ghs: f64, model: Option<&str>) -> f64 {
    let is_l7 = model.and_then(model_key).as_deref() == Some("l7");
    if is_l7 && ghs > L7_MHS_THRESHOLD {
        ghs / 1000.0
    } else {
        ghs
    }
}

/// `"13.50 TH/s"` style rendering of a GH/s value.
pub fn format_hashrate(ghs: f64, model: Option<&str>) -> String {
    let unit = preferred_unit(model);
    format!("{:.2} {}", unit.from_ghs(normalize_ghs(ghs, model)), unit)
}
