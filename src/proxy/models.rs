//! Proxy data models

use crate::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

/// Status code recorded for a probe that ran out of time
pub const TIMEOUT_STATUS: u16 = 408;

/// Status code recorded for a probe that failed below the HTTP layer
pub const UNAVAILABLE_STATUS: u16 = 503;

/// Address/port pair exactly as a provider produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawCandidate {
    pub address: String,
    pub port: String,
}

impl RawCandidate {
    pub fn new(address: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: port.into(),
        }
    }
}

/// A syntactically valid proxy endpoint
///
/// Only built through [`Candidate::parse`], so every value has passed the
/// address validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    address: String,
    port: u16,
}

impl Candidate {
    /// Validate and convert a raw address/port pair
    pub fn parse(address: &str, port: &str) -> Option<Self> {
        if !crate::proxy::parser::validate(address, port) {
            return None;
        }
        Some(Self {
            address: address.trim().to_string(),
            port: port.trim().parse().ok()?,
        })
    }

    /// IP literal as written by the source, without brackets
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Host part usable inside a URL authority (IPv6 gets brackets)
    fn host(&self) -> String {
        match self.address.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{}]", self.address),
            _ => self.address.clone(),
        }
    }

    /// Get the proxy URL string
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host(), self.port)
    }

    /// Get the proxy string in IP:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host(), self.port)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_simple_string())
    }
}

/// A URL every candidate is probed against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub label: String,
    pub url: String,
}

impl ProbeTarget {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Failure class of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The target answered (any HTTP status)
    None,
    /// The whole request did not finish in time
    Timeout,
    /// The proxy refused, reset or otherwise broke the TCP connection
    ProxyConnection,
    /// Anything else, with the underlying error text
    Unknown(String),
}

impl ErrorKind {
    pub fn is_success(&self) -> bool {
        matches!(self, ErrorKind::None)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::None => write!(f, "no"),
            ErrorKind::Timeout => write!(f, "timeout error"),
            ErrorKind::ProxyConnection => write!(f, "connection error"),
            ErrorKind::Unknown(details) => write!(f, "unknown error: {}", details),
        }
    }
}

/// Classified result of one candidate x target probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status_code: u16,
    /// Set only when the response was fully received
    pub elapsed_ms: Option<u64>,
    pub error_kind: ErrorKind,
}

impl ProbeOutcome {
    pub fn success(status_code: u16, elapsed_ms: u64) -> Self {
        Self {
            status_code,
            elapsed_ms: Some(elapsed_ms),
            error_kind: ErrorKind::None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            status_code: TIMEOUT_STATUS,
            elapsed_ms: None,
            error_kind: ErrorKind::Timeout,
        }
    }

    pub fn connection_error() -> Self {
        Self {
            status_code: UNAVAILABLE_STATUS,
            elapsed_ms: None,
            error_kind: ErrorKind::ProxyConnection,
        }
    }

    pub fn unknown(details: impl Into<String>) -> Self {
        Self {
            status_code: UNAVAILABLE_STATUS,
            elapsed_ms: None,
            error_kind: ErrorKind::Unknown(details.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_kind.is_success()
    }
}

/// Outcome for one labelled target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub label: String,
    pub outcome: ProbeOutcome,
}

/// All probe outcomes for one candidate, in target order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResult {
    pub candidate: Candidate,
    pub outcomes: Vec<TargetOutcome>,
}

impl ProxyResult {
    pub fn new(candidate: Candidate, outcomes: Vec<TargetOutcome>) -> Self {
        Self {
            candidate,
            outcomes,
        }
    }

    /// Number of targets reached without a transport failure
    pub fn score(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|t| t.outcome.is_success())
            .count()
    }

    /// Look up the outcome recorded for a target label
    pub fn outcome(&self, label: &str) -> Option<&ProbeOutcome> {
        self.outcomes
            .iter()
            .find(|t| t.label == label)
            .map(|t| &t.outcome)
    }

    /// Mean latency over successful probes
    pub fn average_latency_ms(&self) -> Option<u64> {
        let times: Vec<u64> = self
            .outcomes
            .iter()
            .filter_map(|t| t.outcome.elapsed_ms)
            .collect();
        if times.is_empty() {
            return None;
        }
        Some(times.iter().sum::<u64>() / times.len() as u64)
    }
}

/// Flattened as `ip`, `port`, then `<label>_status`, `<label>_error` and
/// `<label>_total_time` for every target.
impl Serialize for ProxyResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + 3 * self.outcomes.len()))?;
        map.serialize_entry("ip", self.candidate.address())?;
        map.serialize_entry("port", &self.candidate.port())?;
        for target in &self.outcomes {
            let label = &target.label;
            map.serialize_entry(&format!("{}_status", label), &target.outcome.status_code)?;
            map.serialize_entry(
                &format!("{}_error", label),
                &target.outcome.error_kind.to_string(),
            )?;
            map.serialize_entry(&format!("{}_total_time", label), &target.outcome.elapsed_ms)?;
        }
        map.end()
    }
}

/// Ranked results of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RankedSnapshot {
    #[serde(rename = "date", serialize_with = "serialize_date")]
    pub generated_at: DateTime<Utc>,
    pub proxies: Vec<ProxyResult>,
}

fn serialize_date<S: Serializer>(
    date: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Secs, true))
}

impl RankedSnapshot {
    /// Proxies that reached at least one target, best first
    pub fn working(&self) -> impl Iterator<Item = &ProxyResult> {
        self.proxies.iter().filter(|p| p.score() > 0)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save the snapshot as a JSON document
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}
