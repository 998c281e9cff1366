//! Proxy crawler module for fetching candidate lists from public sources
//!
//! This module provides functionality for:
//! - Fetching proxy list documents over HTTP
//! - Parsing plain-text, HTML table and JSON API lists into raw pairs
//! - Crawling many providers at once without one failure stopping the rest

use crate::proxy::models::{Candidate, RawCandidate};
use crate::proxy::parser::ProxyParser;
use crate::Result;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; U; Linux i686; en-US; rv:1.9.0.1) Gecko/2008071615 Fedora/3.0.1-1.fc9 Firefox/3.0.1";

const SPYS_URL: &str = "http://spys.me/proxy.txt";

const FREE_PROXY_LIST_URL: &str = "https://free-proxy-list.net";

/// Regex pattern to match IP:PORT patterns in text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b")
        .expect("Invalid IP:PORT regex")
});

/// Lines (or cells) that start with something shaped like an IPv4 address
static IP_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s?\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").expect("Invalid IP line regex")
});

static LIST_TABLE_ROWS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table#proxylisttable tr").expect("Invalid row selector"));

static ANY_TABLE_ROWS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table tr").expect("Invalid row selector"));

static CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("Invalid cell selector"));

/// A public source of candidate proxies
///
/// The crawler fetches [`url`](ProxyProvider::url) and hands the body to
/// [`parse`](ProxyProvider::parse); parsing never touches the network.
pub trait ProxyProvider: Send + Sync {
    fn name(&self) -> &str;

    fn url(&self) -> &str;

    fn parse(&self, body: &str) -> Vec<RawCandidate>;
}

/// spys.me plain-text list: `IP:PORT COUNTRY-ANON-SSL ...` per line
#[derive(Debug, Clone)]
pub struct SpysList {
    url: String,
}

impl SpysList {
    pub fn new() -> Self {
        Self::with_url(SPYS_URL)
    }

    pub fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

impl Default for SpysList {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyProvider for SpysList {
    fn name(&self) -> &str {
        "spys.me"
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn parse(&self, body: &str) -> Vec<RawCandidate> {
        body.lines()
            .filter(|line| IP_LINE_REGEX.is_match(line))
            .filter_map(|line| {
                let token = line.split_whitespace().next()?;
                let mut parts = token.split(':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(ip), Some(port), None) => Some(RawCandidate::new(ip, port)),
                    _ => None,
                }
            })
            .collect()
    }
}

/// free-proxy-list.net HTML table: first two cells of each row are IP and port
#[derive(Debug, Clone)]
pub struct FreeProxyList {
    url: String,
}

impl FreeProxyList {
    pub fn new() -> Self {
        Self::with_url(FREE_PROXY_LIST_URL)
    }

    pub fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

impl Default for FreeProxyList {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyProvider for FreeProxyList {
    fn name(&self) -> &str {
        "free-proxy-list.net"
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn parse(&self, body: &str) -> Vec<RawCandidate> {
        let document = Html::parse_document(body);

        let mut rows: Vec<_> = document.select(&LIST_TABLE_ROWS).collect();
        if rows.is_empty() {
            rows = document.select(&ANY_TABLE_ROWS).collect();
        }

        rows.into_iter()
            .filter_map(|row| {
                let mut cells = row.select(&CELLS);
                let ip = cells.next()?.text().collect::<String>();
                let port = cells.next()?.text().collect::<String>();
                if !IP_LINE_REGEX.is_match(&ip) {
                    return None;
                }
                Some(RawCandidate::new(ip.trim(), port.trim()))
            })
            .collect()
    }
}

/// Any `IP:PORT` per line document, with a regex fallback for free text
#[derive(Debug, Clone)]
pub struct PlainTextList {
    name: String,
    url: String,
}

impl PlainTextList {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

impl ProxyProvider for PlainTextList {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    /// This method tries multiple parsing strategies:
    /// 1. Line-by-line parsing using ProxyParser
    /// 2. Regex-based IP:PORT extraction
    fn parse(&self, body: &str) -> Vec<RawCandidate> {
        let candidates = ProxyParser::parse_string(body);
        if !candidates.is_empty() {
            return candidates;
        }

        IP_PORT_REGEX
            .captures_iter(body)
            .filter_map(|cap| Some(RawCandidate::new(cap.get(1)?.as_str(), cap.get(2)?.as_str())))
            .collect()
    }
}

/// JSON API returning objects with `ip` and `port` fields
///
/// Accepts a bare array or an object wrapping it in `data` or `proxies`.
#[derive(Debug, Clone)]
pub struct JsonApiList {
    name: String,
    url: String,
}

impl JsonApiList {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

impl ProxyProvider for JsonApiList {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn parse(&self, body: &str) -> Vec<RawCandidate> {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            warn!(source = %self.name, "response is not valid JSON");
            return Vec::new();
        };

        let entries = match &value {
            Value::Array(items) => items.as_slice(),
            Value::Object(map) => map
                .get("data")
                .or_else(|| map.get("proxies"))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            _ => &[],
        };

        entries
            .iter()
            .filter_map(|entry| {
                let ip = entry.get("ip")?.as_str()?;
                let port = match entry.get("port")? {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => return None,
                };
                Some(RawCandidate::new(ip, port))
            })
            .collect()
    }
}

/// Result of crawling a single source
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// The source that was crawled
    pub source: String,
    /// Raw pairs extracted from the source
    pub candidates: Vec<RawCandidate>,
    /// Error message if crawling failed
    pub error: Option<String>,
}

impl CrawlResult {
    /// Create a successful crawl result
    pub fn success(source: String, candidates: Vec<RawCandidate>) -> Self {
        Self {
            source,
            candidates,
            error: None,
        }
    }

    /// Create a failed crawl result
    pub fn failure(source: String, error: String) -> Self {
        Self {
            source,
            candidates: Vec::new(),
            error: Some(error),
        }
    }

    /// Check if the crawl was successful
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Validate and de-duplicate the pairs of every crawl, in source order
pub fn merge_results(results: &[CrawlResult]) -> Vec<Candidate> {
    ProxyParser::prepare_candidates(results.iter().flat_map(|r| r.candidates.iter().cloned()))
}

/// Configuration for proxy crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Timeout for HTTP requests
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Proxy crawler for fetching candidate lists
pub struct ProxyCrawler {
    client: Client,
}

impl ProxyCrawler {
    /// Create a new proxy crawler with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CrawlerConfig::default())
    }

    /// Create a new proxy crawler with custom configuration
    pub fn with_config(config: CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch and parse one provider
    pub async fn crawl(&self, provider: &dyn ProxyProvider) -> Result<Vec<RawCandidate>> {
        let body = self
            .client
            .get(provider.url())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(provider.parse(&body))
    }

    /// Crawl every provider concurrently, returning one result per provider
    pub async fn crawl_all(&self, providers: &[Box<dyn ProxyProvider>]) -> Vec<CrawlResult> {
        let crawls = providers.iter().map(|provider| async move {
            let name = provider.name().to_string();
            match self.crawl(provider.as_ref()).await {
                Ok(candidates) => {
                    info!(source = %name, found = candidates.len(), "crawled proxy source");
                    CrawlResult::success(name, candidates)
                }
                Err(e) => {
                    warn!(source = %name, error = %e, "failed to crawl proxy source");
                    CrawlResult::failure(name, e.to_string())
                }
            }
        });

        join_all(crawls).await
    }

    /// Get the built-in list of free proxy sources
    pub fn get_common_sources() -> Vec<Box<dyn ProxyProvider>> {
        vec![Box::new(FreeProxyList::new()), Box::new(SpysList::new())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `body` with status 200 to every connection
    async fn serve(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}/list.txt", addr)
    }

    #[test]
    fn test_crawler_config_default() {
        let config = CrawlerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_crawler_config_builder() {
        let config = CrawlerConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_user_agent("Custom Agent".to_string());

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.user_agent, "Custom Agent");
    }

    #[test]
    fn test_crawl_result_failure() {
        let result =
            CrawlResult::failure("test-source".to_string(), "Connection failed".to_string());
        assert!(!result.is_success());
        assert!(result.candidates.is_empty());
        assert_eq!(result.error, Some("Connection failed".to_string()));
    }

    #[test]
    fn test_spys_list_parse() {
        let body = "Proxy list updated at Mon, 01 Jan 24\n\
                    Support by donating\n\
                    \n\
                    1.2.3.4:8080 US-N-S +\n\
                    5.6.7.8:3128 RU-H -\n\
                    9.9.9.9 broken\n\
                    Free proxy list http://spys.one/en/\n";
        let raw = SpysList::new().parse(body);
        assert_eq!(
            raw,
            vec![
                RawCandidate::new("1.2.3.4", "8080"),
                RawCandidate::new("5.6.7.8", "3128"),
            ]
        );
    }

    #[test]
    fn test_free_proxy_list_parse() {
        let body = r#"
<html><body>
<table id="proxylisttable">
<thead><tr><th>IP Address</th><th>Port</th><th>Code</th></tr></thead>
<tbody>
<tr><td>10.1.1.1</td><td>8080</td><td>US</td></tr>
<tr><td>10.1.1.2</td><td>3128</td><td>DE</td></tr>
<tr><td>not-an-ip</td><td>80</td><td>FR</td></tr>
<tr><td>10.1.1.3</td></tr>
</tbody>
</table>
</body></html>
"#;
        let raw = FreeProxyList::new().parse(body);
        assert_eq!(
            raw,
            vec![
                RawCandidate::new("10.1.1.1", "8080"),
                RawCandidate::new("10.1.1.2", "3128"),
            ]
        );
    }

    #[test]
    fn test_free_proxy_list_parse_without_table_id() {
        let body = "<table><tr><td>10.2.2.2</td><td>80</td></tr></table>";
        let raw = FreeProxyList::new().parse(body);
        assert_eq!(raw, vec![RawCandidate::new("10.2.2.2", "80")]);
    }

    #[test]
    fn test_plain_text_list_parse() {
        let provider = PlainTextList::new("plain", "http://example.com");
        let content = r#"
# HTTP Proxies
192.168.1.1:8080
192.168.1.2:3128
"#;
        assert_eq!(provider.parse(content).len(), 2);
    }

    #[test]
    fn test_plain_text_list_regex_fallback() {
        let provider = PlainTextList::new("plain", "http://example.com");
        let content = "<p>Here is a proxy: 192.168.1.1:8080 and another one 10.0.0.1:3128.</p>";
        let raw = provider.parse(content);
        assert_eq!(
            raw,
            vec![
                RawCandidate::new("192.168.1.1", "8080"),
                RawCandidate::new("10.0.0.1", "3128"),
            ]
        );
    }

    #[test]
    fn test_json_api_list_parse() {
        let provider = JsonApiList::new("api", "http://example.com");

        let bare = r#"[{"ip": "1.1.1.1", "port": "80"}, {"ip": "2.2.2.2", "port": 3128}]"#;
        assert_eq!(
            provider.parse(bare),
            vec![
                RawCandidate::new("1.1.1.1", "80"),
                RawCandidate::new("2.2.2.2", "3128"),
            ]
        );

        let wrapped = r#"{"data": [{"ip": "3.3.3.3", "port": 8080}, {"host": "x"}]}"#;
        assert_eq!(
            provider.parse(wrapped),
            vec![RawCandidate::new("3.3.3.3", "8080")]
        );

        assert!(provider.parse("not json").is_empty());
        assert!(provider.parse(r#"{"status": "ok"}"#).is_empty());
    }

    #[test]
    fn test_merge_results_dedups_across_sources() {
        let results = vec![
            CrawlResult::success(
                "a".to_string(),
                vec![
                    RawCandidate::new("1.1.1.1", "80"),
                    RawCandidate::new("bad-host", "80"),
                ],
            ),
            CrawlResult::failure("b".to_string(), "timed out".to_string()),
            CrawlResult::success(
                "c".to_string(),
                vec![
                    RawCandidate::new("1.1.1.1", "80"),
                    RawCandidate::new("2.2.2.2", "8080"),
                ],
            ),
        ];
        let candidates = merge_results(&results);
        let simple: Vec<_> = candidates.iter().map(|c| c.to_simple_string()).collect();
        assert_eq!(simple, vec!["1.1.1.1:80", "2.2.2.2:8080"]);
    }

    #[test]
    fn test_get_common_sources() {
        let sources = ProxyCrawler::get_common_sources();
        assert!(!sources.is_empty());
        for source in &sources {
            assert!(!source.name().is_empty());
            assert!(source.url().starts_with("http"));
        }
    }

    #[tokio::test]
    async fn test_crawl_all_isolates_failing_sources() {
        let url = serve("10.0.0.1:8080\n10.0.0.2:3128\n").await;
        let dead = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            format!("http://{}/", listener.local_addr().unwrap())
        };
        let providers: Vec<Box<dyn ProxyProvider>> = vec![
            Box::new(PlainTextList::new("dead", &dead)),
            Box::new(PlainTextList::new("live", &url)),
        ];

        let crawler =
            ProxyCrawler::with_config(CrawlerConfig::new().with_timeout(Duration::from_secs(5)))
                .unwrap();
        let results = crawler.crawl_all(&providers).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "dead");
        assert!(!results[0].is_success());
        assert!(results[1].is_success());
        assert_eq!(results[1].candidates.len(), 2);
        assert_eq!(merge_results(&results).len(), 2);
    }
}
