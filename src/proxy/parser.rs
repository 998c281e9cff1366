//! Candidate parsing, validation and de-duplication

use crate::proxy::models::{Candidate, RawCandidate};
use crate::Result;
use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info, warn};

/// Check that `address` is an IPv4/IPv6 literal and `port` an integer in
/// `1..=65535`.
///
/// Hostnames are rejected. Surrounding whitespace is ignored.
pub fn validate(address: &str, port: &str) -> bool {
    if address.trim().parse::<IpAddr>().is_err() {
        return false;
    }
    matches!(port.trim().parse::<i64>(), Ok(p) if (1..=65535).contains(&p))
}

/// Proxy parser for candidate lists in strings and files
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single candidate line
    ///
    /// Supports formats:
    /// - IP:PORT
    /// - [IPv6]:PORT
    /// - http://IP:PORT
    ///
    /// The pair is returned as-is; use [`validate`] or
    /// [`ProxyParser::prepare_candidates`] before probing.
    pub fn parse_line(line: &str) -> Option<RawCandidate> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let line = line
            .strip_prefix("http://")
            .or_else(|| line.strip_prefix("https://"))
            .unwrap_or(line)
            .trim_end_matches('/');

        let (host, port) = line.rsplit_once(':')?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() || host.contains(char::is_whitespace) {
            return None;
        }
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(RawCandidate::new(host, port))
    }

    /// Parse candidates from a string (multiple lines)
    pub fn parse_string(content: &str) -> Vec<RawCandidate> {
        content.lines().filter_map(Self::parse_line).collect()
    }

    /// Parse candidates from a file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<RawCandidate>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_string(&content))
    }

    /// Drop invalid pairs and duplicates, keeping first-encounter order
    pub fn prepare_candidates<I>(raw: I) -> Vec<Candidate>
    where
        I: IntoIterator<Item = RawCandidate>,
    {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut invalid = 0usize;
        let mut duplicates = 0usize;

        for pair in raw {
            let Some(candidate) = Candidate::parse(&pair.address, &pair.port) else {
                debug!(address = %pair.address, port = %pair.port, "dropping malformed candidate");
                invalid += 1;
                continue;
            };
            if seen.insert(candidate.clone()) {
                candidates.push(candidate);
            } else {
                duplicates += 1;
            }
        }

        if invalid > 0 {
            warn!(invalid, "dropped candidates that failed validation");
        }
        info!(
            kept = candidates.len(),
            invalid, duplicates, "prepared candidate set"
        );
        candidates
    }

    /// Save candidates to a file, one IP:PORT per line
    pub fn save_to_file<P: AsRef<Path>>(candidates: &[Candidate], path: P) -> Result<()> {
        let content: String = candidates
            .iter()
            .map(|c| c.to_simple_string())
            .collect::<Vec<_>>()
            .join("\n");

        fs::write(path, content)?;
        Ok(())
    }
}
