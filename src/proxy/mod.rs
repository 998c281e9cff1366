//! Proxy module for sourcing, checking and ranking proxies
//!
//! This module provides functionality for:
//! - Crawling public proxy lists into raw address/port pairs
//! - Validating and de-duplicating candidates
//! - Probing every candidate through a fixed set of target URLs
//! - Ranking the results by the number of reachable targets

pub mod checker;
pub mod crawler;
pub mod models;
pub mod parser;
pub mod ranker;

pub use checker::{default_targets, CheckerConfig, ProxyChecker};
pub use crawler::{
    merge_results, CrawlResult, CrawlerConfig, FreeProxyList, JsonApiList, PlainTextList,
    ProxyCrawler, ProxyProvider, SpysList,
};
pub use models::{
    Candidate, ErrorKind, ProbeOutcome, ProbeTarget, ProxyResult, RankedSnapshot, RawCandidate,
    TargetOutcome,
};
pub use parser::{validate, ProxyParser};
pub use ranker::rank;
