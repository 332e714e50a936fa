//! Transfer status extraction (amount, speed, ETA)

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::line::prepare_line;

static ETA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ETA\s+((?:[0-9]+(?:\.[0-9]+)?[smhdwy]?)+|-+)").expect("valid ETA regex")
});

static SPEED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9.]+)\s*([KMGTP]?i?B)/s").expect("valid speed regex"));

static TRANSFERRED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Transferred:\s*)?([0-9.]+\s*[KMGTP]?i?B)\s*/\s*([0-9.]+\s*[KMGTP]?i?B)")
        .expect("valid transferred regex")
});

/// Bytes moved so far against the total, as printed by the tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferredAmount {
    /// Amount transferred, e.g. `15.250 MiB`
    pub done: String,
    /// Total amount, e.g. `6.429 GiB`
    pub total: String,
}

/// A strictly positive transfer rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSpeed {
    pub value: f64,
    /// Size unit without the `/s` suffix, e.g. `MiB`
    pub unit: String,
}

impl fmt::Display for TransferSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/s", self.value, self.unit)
    }
}

/// Status fields parsed from a single output line
///
/// A snapshot is only as complete as the line it came from; snapshots are
/// never merged. At least one field is always present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub transferred: Option<TransferredAmount>,
    pub speed: Option<TransferSpeed>,
    pub eta: Option<String>,
}

impl StatusSnapshot {
    /// Whether no field was found
    pub fn is_empty(&self) -> bool {
        self.transferred.is_none() && self.speed.is_none() && self.eta.is_none()
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(3);
        if let Some(amount) = &self.transferred {
            parts.push(format!("{} / {}", amount.done, amount.total));
        }
        if let Some(speed) = &self.speed {
            parts.push(speed.to_string());
        }
        if let Some(eta) = &self.eta {
            parts.push(format!("ETA {}", eta));
        }
        write!(f, "{}", parts.join(" | "))
    }
}

/// Extract transferred amount, speed and ETA from one output line
///
/// `ETA -` means "no estimate" and is treated as absent, and a speed of zero
/// is dropped. Returns `None` when none of the three fields is present.
pub fn parse_status(line: &str) -> Option<StatusSnapshot> {
    let clean = prepare_line(line)?;

    let eta = ETA
        .captures(&clean)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|value| !value.chars().all(|c| c == '-'))
        .map(str::to_string);

    let speed = SPEED.captures(&clean).and_then(|caps| {
        let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let unit = caps.get(2)?.as_str();
        (value > 0.0).then(|| TransferSpeed {
            value,
            unit: unit.to_string(),
        })
    });

    let transferred = TRANSFERRED.captures(&clean).and_then(|caps| {
        Some(TransferredAmount {
            done: caps.get(1)?.as_str().trim().to_string(),
            total: caps.get(2)?.as_str().trim().to_string(),
        })
    });

    let snapshot = StatusSnapshot {
        transferred,
        speed,
        eta,
    };

    (!snapshot.is_empty()).then_some(snapshot)
}
