//! Serial device discovery: enumerate ports, rank them, pick one.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::DiscoveryError;

/// A USB vendor/product id pair, written `VID:PID` in hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl UsbId {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:04X}", self.vid, self.pid)
    }
}

/// A string that is not a `VID:PID` pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid USB id {0:?}, expected VID:PID in hex")]
pub struct InvalidUsbId(pub String);

impl FromStr for UsbId {
    type Err = InvalidUsbId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidUsbId(s.to_string());
        let (vid, pid) = s.trim().split_once(':').ok_or_else(invalid)?;
        let vid = u16::from_str_radix(vid, 16).map_err(|_| invalid())?;
        let pid = u16::from_str_radix(pid, 16).map_err(|_| invalid())?;
        Ok(Self { vid, pid })
    }
}

/// One port reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCandidate {
    /// OS path or name used to open the port (`/dev/ttyUSB0`, `COM3`).
    pub path: String,
    /// USB identity, for USB-attached ports.
    pub usb: Option<UsbId>,
    /// Human-readable product/manufacturer text.
    pub description: Option<String>,
}

impl DeviceCandidate {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            usb: None,
            description: None,
        }
    }

    pub fn with_usb(mut self, usb: UsbId) -> Self {
        self.usb = Some(usb);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Why a candidate qualified. Higher variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRank {
    AnyPort,
    Description,
    Identity,
}

impl MatchRank {
    /// Numeric score: identity 3, description 2, any port 1.
    pub fn score(self) -> u8 {
        match self {
            MatchRank::AnyPort => 1,
            MatchRank::Description => 2,
            MatchRank::Identity => 3,
        }
    }
}

impl fmt::Display for MatchRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchRank::AnyPort => "any-port",
            MatchRank::Description => "description",
            MatchRank::Identity => "identity",
        })
    }
}

/// Selection policy for display devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMatcher {
    /// USB identities of known display boards.
    pub identities: Vec<UsbId>,
    /// Lowercase substrings looked for in the description.
    pub keywords: Vec<String>,
    /// Accept any port when nothing better matches.
    pub accept_any: bool,
}

impl Default for DeviceMatcher {
    fn default() -> Self {
        Self {
            identities: vec![
                UsbId::new(0x303A, 0x1001), // Espressif native USB
                UsbId::new(0x10C4, 0xEA60), // CP210x
                UsbId::new(0x1A86, 0x7523), // CH340
                UsbId::new(0x1A86, 0x55D4), // CH9102
                UsbId::new(0x0403, 0x6001), // FTDI
            ],
            keywords: ["esp32", "cp210", "ch340", "ch910", "usb serial", "uart"]
                .into_iter()
                .map(String::from)
                .collect(),
            accept_any: true,
        }
    }
}

impl DeviceMatcher {
    /// Rank a single candidate; `None` means it does not qualify.
    pub fn rank(&self, candidate: &DeviceCandidate) -> Option<MatchRank> {
        if candidate
            .usb
            .is_some_and(|usb| self.identities.contains(&usb))
        {
            return Some(MatchRank::Identity);
        }

        if let Some(description) = &candidate.description {
            let description = description.to_lowercase();
            if self
                .keywords
                .iter()
                .any(|keyword| description.contains(&keyword.to_lowercase()))
            {
                return Some(MatchRank::Description);
            }
        }

        self.accept_any.then_some(MatchRank::AnyPort)
    }
}

/// A candidate together with its rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub candidate: DeviceCandidate,
    pub rank: Option<MatchRank>,
}

/// Rank every candidate, keeping enumeration order.
pub fn rank_candidates(
    matcher: &DeviceMatcher,
    candidates: Vec<DeviceCandidate>,
) -> Vec<RankedCandidate> {
    candidates
        .into_iter()
        .map(|candidate| RankedCandidate {
            rank: matcher.rank(&candidate),
            candidate,
        })
        .collect()
}

/// Pick the highest-ranked candidate; the first enumerated wins a tie.
pub fn select_best(ranked: &[RankedCandidate]) -> Option<&RankedCandidate> {
    let mut best: Option<(&RankedCandidate, MatchRank)> = None;
    for entry in ranked {
        let Some(rank) = entry.rank else { continue };
        if best.map_or(true, |(_, best_rank)| rank > best_rank) {
            best = Some((entry, rank));
        }
    }
    best.map(|(entry, _)| entry)
}

/// Lists candidate ports.
pub trait DeviceEnumerator: Send {
    fn list_candidates(&self) -> Result<Vec<DeviceCandidate>, DiscoveryError>;
}

/// Enumerates ports through `serialport`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortEnumerator;

impl DeviceEnumerator for SerialPortEnumerator {
    fn list_candidates(&self) -> Result<Vec<DeviceCandidate>, DiscoveryError> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(candidate_from_port).collect())
    }
}

fn candidate_from_port(port: serialport::SerialPortInfo) -> DeviceCandidate {
    let candidate = DeviceCandidate::new(port.port_name);
    match port.port_type {
        serialport::SerialPortType::UsbPort(info) => {
            let description = [info.product, info.manufacturer]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            let candidate = candidate.with_usb(UsbId::new(info.vid, info.pid));
            if description.is_empty() {
                candidate
            } else {
                candidate.with_description(description)
            }
        }
        serialport::SerialPortType::BluetoothPort => candidate.with_description("Bluetooth"),
        _ => candidate,
    }
}

/// Enumeration plus selection policy. Holds no state between scans.
pub struct DeviceDiscovery<E> {
    enumerator: E,
    matcher: DeviceMatcher,
}

impl<E: DeviceEnumerator> DeviceDiscovery<E> {
    pub fn new(enumerator: E) -> Self {
        Self {
            enumerator,
            matcher: DeviceMatcher::default(),
        }
    }

    pub fn with_matcher(mut self, matcher: DeviceMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Enumerate and rank every port.
    pub fn ranked(&self) -> Result<Vec<RankedCandidate>, DiscoveryError> {
        let candidates = self.enumerator.list_candidates()?;
        Ok(rank_candidates(&self.matcher, candidates))
    }

    /// Find the single best device, if any.
    ///
    /// Enumeration failures are logged and reported as "no candidate".
    pub fn scan(&self) -> Option<DeviceCandidate> {
        let ranked = match self.ranked() {
            Ok(ranked) => ranked,
            Err(err) => {
                warn!(error = %err, "device enumeration failed");
                return None;
            }
        };
        let best = select_best(&ranked)?;
        debug!(
            path = %best.candidate.path,
            rank = ?best.rank,
            candidates = ranked.len(),
            "selected device candidate"
        );
        Some(best.candidate.clone())
    }
}
