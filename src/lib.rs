//! Proxy Ranker - Proxy Discovery, Probing and Ranking
//!
//! Collects candidate HTTP proxies from public lists, probes every candidate
//! through a fixed set of target URLs and ranks the results by how many
//! targets were reachable.

pub mod config;
pub mod error;
pub mod proxy;

pub use error::{Error, Result};
pub use proxy::*;
