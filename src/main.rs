use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use proxy_ranker::{
    config::load_checker_config, merge_results, CheckerConfig, CrawlResult, CrawlerConfig,
    PlainTextList, ProxyChecker, ProxyCrawler, ProxyParser, ProxyProvider, RawCandidate,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Discovers public HTTP proxies, probes them and ranks them by reliability
#[derive(Parser)]
#[command(name = "proxy-ranker")]
#[command(about = "Discovers public HTTP proxies, probes them and ranks them by reliability")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl proxy lists and print or save the unique valid candidates
    Crawl {
        /// Extra plain-text list URLs to crawl (can specify multiple)
        #[arg(short, long)]
        url: Vec<String>,
        /// Output file for crawled candidates
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Timeout in seconds for fetching each list
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
    /// Probe candidates through every target and write a ranked snapshot
    Check {
        /// Files with one IP:PORT per line
        inputs: Vec<PathBuf>,
        /// Also crawl the built-in free proxy sources
        #[arg(long)]
        common_sources: bool,
        /// Extra plain-text list URLs to crawl (can specify multiple)
        #[arg(short, long)]
        url: Vec<String>,
        /// TOML configuration file with timeout, concurrency and targets
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Probe timeout in seconds (overrides the config file)
        #[arg(long)]
        timeout: Option<u64>,
        /// Number of candidates checked at once (overrides the config file)
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,
        /// Output file for the ranked snapshot
        #[arg(short, long, default_value = "proxies.json")]
        output: PathBuf,
        /// Number of working proxies to print
        #[arg(long, default_value = "10")]
        top: usize,
        /// Timeout in seconds for fetching each list
        #[arg(long, default_value = "30")]
        crawl_timeout: u64,
    },
    /// Print the effective target list
    Targets {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Crawl {
            url,
            output,
            timeout,
        } => {
            let results = crawl(common_providers(true, &url), timeout).await?;
            let candidates = merge_results(&results);

            println!("Total unique proxies: {}", candidates.len());

            if let Some(output_path) = output {
                ProxyParser::save_to_file(&candidates, &output_path)
                    .with_context(|| format!("failed to write {:?}", output_path))?;
                println!("Saved proxies to {:?}", output_path);
            } else {
                for candidate in &candidates {
                    println!("{}", candidate);
                }
            }
        }
        Commands::Check {
            inputs,
            common_sources,
            url,
            config,
            timeout,
            concurrency,
            output,
            top,
            crawl_timeout,
        } => {
            let config = checker_config(config.as_deref(), timeout, concurrency)?;
            let checker = ProxyChecker::with_config(config)?;

            let providers = common_providers(common_sources, &url);
            if inputs.is_empty() && providers.is_empty() {
                bail!("no candidate source given: pass input files, --url or --common-sources");
            }

            let mut raw: Vec<RawCandidate> = Vec::new();
            for input in &inputs {
                let parsed = ProxyParser::parse_file(input)
                    .with_context(|| format!("failed to read {:?}", input))?;
                info!(file = ?input, found = parsed.len(), "loaded candidate file");
                raw.extend(parsed);
            }
            if !providers.is_empty() {
                for result in crawl(providers, crawl_timeout).await? {
                    raw.extend(result.candidates);
                }
            }

            let candidates = ProxyParser::prepare_candidates(raw);
            println!(
                "Checking {} proxies against {} targets with {} workers, timeout: {}s",
                candidates.len(),
                checker.config().targets.len(),
                checker.config().concurrency,
                checker.config().timeout.as_secs()
            );

            let snapshot = checker.check_and_rank(candidates).await?;
            snapshot
                .write_to_file(&output)
                .with_context(|| format!("failed to write {:?}", output))?;

            let working: Vec<_> = snapshot.working().collect();
            println!(
                "Results: {} working, {} total. Saved to {:?}",
                working.len(),
                snapshot.proxies.len(),
                output
            );

            if !working.is_empty() {
                println!("\nBest proxies:");
                for result in working.iter().take(top) {
                    let latency = result
                        .average_latency_ms()
                        .map_or_else(|| "-".to_string(), |ms| format!("{}ms", ms));
                    println!(
                        "  {} ({}/{} targets, avg {})",
                        result.candidate,
                        result.score(),
                        result.outcomes.len(),
                        latency
                    );
                }
            }
        }
        Commands::Targets { config } => {
            let config = load_checker_config(config.as_deref())?;
            for target in &config.targets {
                println!("{:<12} {}", target.label, target.url);
            }
            println!("timeout: {}s", config.timeout.as_secs());
            println!("concurrency: {}", config.concurrency);
        }
    }

    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn checker_config(
    path: Option<&Path>,
    timeout: Option<u64>,
    concurrency: Option<usize>,
) -> Result<CheckerConfig> {
    let mut config = load_checker_config(path)?;
    if let Some(timeout) = timeout {
        config = config.with_timeout(Duration::from_secs(timeout));
    }
    if let Some(concurrency) = concurrency {
        config = config.with_concurrency(concurrency);
    }
    Ok(config)
}

fn common_providers(include_builtin: bool, urls: &[String]) -> Vec<Box<dyn ProxyProvider>> {
    let mut providers = if include_builtin {
        ProxyCrawler::get_common_sources()
    } else {
        Vec::new()
    };
    for url in urls {
        providers.push(Box::new(PlainTextList::new(url, url)));
    }
    providers
}

async fn crawl(
    providers: Vec<Box<dyn ProxyProvider>>,
    timeout: u64,
) -> Result<Vec<CrawlResult>> {
    let crawler =
        ProxyCrawler::with_config(CrawlerConfig::new().with_timeout(Duration::from_secs(timeout)))?;
    let results = crawler.crawl_all(&providers).await;

    for result in &results {
        match &result.error {
            None => println!(
                "Found {} proxies from {}",
                result.candidates.len(),
                result.source
            ),
            Some(error) => eprintln!("Error crawling {}: {}", result.source, error),
        }
    }
    Ok(results)
}
