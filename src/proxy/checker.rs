//! Proxy checker: probes candidates through every target and runs batches

use crate::proxy::models::{
    Candidate, ProbeOutcome, ProbeTarget, ProxyResult, RankedSnapshot, TargetOutcome,
};
use crate::proxy::ranker::rank;
use crate::{Error, Result};
use reqwest::{Client, Proxy as ReqwestProxy, Url};
use std::collections::HashSet;
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Default timeout for a whole probe in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of candidates evaluated at once
pub const DEFAULT_CONCURRENCY: usize = 50;

/// Targets used when no configuration says otherwise
pub fn default_targets() -> Vec<ProbeTarget> {
    vec![
        ProbeTarget::new("google", "http://google.com/"),
        ProbeTarget::new("yandex", "http://ya.ru/"),
        ProbeTarget::new("yahoo", "http://yahoo.com/"),
        ProbeTarget::new("botsad", "http://botsad.ru/"),
    ]
}

/// Configuration for proxy checker
#[derive(Debug, Clone, PartialEq)]
pub struct CheckerConfig {
    /// Budget for one probe: connect, headers and body
    pub timeout: Duration,
    /// Maximum number of candidates evaluated at once
    pub concurrency: usize,
    /// URLs every candidate is probed against
    pub targets: Vec<ProbeTarget>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            targets: default_targets(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_targets(mut self, targets: Vec<ProbeTarget>) -> Self {
        self.targets = targets;
        self
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be greater than zero".into()));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency must be greater than zero".into(),
            ));
        }
        if self.targets.is_empty() {
            return Err(Error::InvalidConfig("at least one target is required".into()));
        }

        let mut labels = HashSet::new();
        for target in &self.targets {
            if target.label.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "target {} has an empty label",
                    target.url
                )));
            }
            if !labels.insert(target.label.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate target label: {}",
                    target.label
                )));
            }
            let url = Url::parse(&target.url).map_err(|e| {
                Error::InvalidConfig(format!("target {} has invalid url: {}", target.label, e))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::InvalidConfig(format!(
                    "target {} must use http or https, got {}",
                    target.label,
                    url.scheme()
                )));
            }
        }
        Ok(())
    }
}

/// Proxy checker for probing candidates
///
/// Cheap to clone; every clone shares the same read-only configuration.
#[derive(Debug, Clone)]
pub struct ProxyChecker {
    config: Arc<CheckerConfig>,
}

impl ProxyChecker {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Self {
        Self {
            config: Arc::new(CheckerConfig::default()),
        }
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Probe one target through one candidate
    pub async fn probe(&self, candidate: &Candidate, target: &ProbeTarget) -> ProbeOutcome {
        match self.create_client(candidate) {
            Ok(client) => self.probe_with(&client, target).await,
            Err(e) => ProbeOutcome::unknown(error_details(&e)),
        }
    }

    /// Probe every configured target through one candidate
    ///
    /// Targets are probed one after another. A failing target never stops
    /// the remaining ones, so the result always holds one outcome per target.
    pub async fn evaluate(&self, candidate: &Candidate) -> ProxyResult {
        let client = self.create_client(candidate);
        let mut outcomes = Vec::with_capacity(self.config.targets.len());

        for target in &self.config.targets {
            let outcome = match &client {
                Ok(client) => self.probe_with(client, target).await,
                Err(e) => ProbeOutcome::unknown(error_details(e)),
            };
            debug!(
                proxy = %candidate,
                target = %target.label,
                status = outcome.status_code,
                elapsed_ms = ?outcome.elapsed_ms,
                error = %outcome.error_kind,
                "probe finished"
            );
            outcomes.push(TargetOutcome {
                label: target.label.clone(),
                outcome,
            });
        }

        ProxyResult::new(candidate.clone(), outcomes)
    }

    /// Evaluate all candidates concurrently
    ///
    /// At most `concurrency` candidates are in flight. Results come back in
    /// input order. The only errors are runtime failures of a worker task;
    /// the remaining workers are aborted and no partial batch is returned.
    pub async fn check_proxies(&self, candidates: Vec<Candidate>) -> Result<Vec<ProxyResult>> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let total = candidates.len();

        info!(
            candidates = total,
            targets = self.config.targets.len(),
            concurrency = self.config.concurrency,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "starting proxy checks"
        );

        let handles: Vec<_> = candidates
            .into_iter()
            .map(|candidate| {
                let sem = Arc::clone(&semaphore);
                let checker = self.clone();
                tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await?;
                    Ok::<_, Error>(checker.evaluate(&candidate).await)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(total);
        let mut handles = handles.into_iter();
        while let Some(handle) = handles.next() {
            let joined = match handle.await {
                Ok(inner) => inner,
                Err(e) => Err(e.into()),
            };
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    handles.by_ref().for_each(|h| h.abort());
                    return Err(e);
                }
            }
        }

        info!(
            checked = results.len(),
            working = results.iter().filter(|r| r.score() > 0).count(),
            "proxy checks finished"
        );
        Ok(results)
    }

    /// Evaluate all candidates and rank the results
    pub async fn check_and_rank(&self, candidates: Vec<Candidate>) -> Result<RankedSnapshot> {
        let results = self.check_proxies(candidates).await?;
        Ok(rank(results))
    }

    async fn probe_with(&self, client: &Client, target: &ProbeTarget) -> ProbeOutcome {
        let start = Instant::now();
        let request = async {
            let response = client.get(&target.url).send().await?;
            let status = response.status().as_u16();
            // A proxy may stall after the headers; only a full body counts.
            response.bytes().await?;
            Ok::<_, reqwest::Error>(status)
        };

        match tokio::time::timeout(self.config.timeout, request).await {
            Ok(Ok(status)) => ProbeOutcome::success(status, round_millis(start.elapsed())),
            Ok(Err(e)) => classify_error(&e),
            Err(_) => ProbeOutcome::timeout(),
        }
    }

    /// Create a reqwest client routed through the candidate
    fn create_client(&self, candidate: &Candidate) -> reqwest::Result<Client> {
        let proxy = ReqwestProxy::all(candidate.proxy_url())?;

        Client::builder()
            .proxy(proxy)
            .danger_accept_invalid_certs(true)
            .timeout(self.config.timeout)
            .build()
    }
}

impl Default for ProxyChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_error(err: &reqwest::Error) -> ProbeOutcome {
    if err.is_timeout() {
        ProbeOutcome::timeout()
    } else if is_connection_failure(err) {
        ProbeOutcome::connection_error()
    } else {
        ProbeOutcome::unknown(error_details(err))
    }
}

/// Socket-level failure talking to the proxy
///
/// A proxy that accepts and then closes without answering is not one: hyper
/// reports that as an incomplete message for plain targets and reqwest as a
/// tunnel EOF for CONNECT targets, and neither carries an `io::Error`.
fn is_connection_failure(err: &reqwest::Error) -> bool {
    let connecting = err.is_connect();
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if connecting
                || matches!(
                    io_err.kind(),
                    io::ErrorKind::ConnectionRefused
                        | io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::NotConnected
                        | io::ErrorKind::BrokenPipe
                )
            {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Error text plus its root cause, unless the text already contains it
fn error_details(err: &(dyn StdError + 'static)) -> String {
    let details = err.to_string();
    let mut root = None;
    let mut source = err.source();
    while let Some(e) = source {
        root = Some(e);
        source = e.source();
    }
    match root.map(|e| e.to_string()) {
        Some(cause) if !details.contains(&cause) => format!("{}: {}", details, cause),
        _ => details,
    }
}

fn round_millis(elapsed: Duration) -> u64 {
    (elapsed.as_secs_f64() * 1000.0).round() as u64
}
