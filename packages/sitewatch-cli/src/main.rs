use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use sitewatch::{
    run_once, CrawlConfig, CrawlEngine, HtmlLinkExtractor, HttpRenderer, MarkdownRenderer,
    Notifier, SnapshotStore, SubdomainPolicy, WebhookNotifier,
};

/// Crawl a site into a timestamped snapshot, diff it against the previous
/// snapshot, and optionally deliver the changes to a webhook.
#[derive(Debug, Parser)]
#[command(name = "sitewatch", version, about)]
struct Args {
    /// Site to crawl. The crawl stays on this URL's host and port.
    start_url: Url,

    /// Number of concurrent crawl workers.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Directory that holds the per-site snapshot directories.
    #[arg(long, default_value = "crawls")]
    output_dir: String,

    /// Webhook endpoint to POST change records to. Omit to skip delivery.
    #[arg(long)]
    webhook_url: Option<Url>,

    /// Path prefix to exclude from the crawl. Repeatable.
    #[arg(long = "block")]
    block: Vec<String>,

    /// When given, only paths under these prefixes are crawled. Repeatable.
    #[arg(long = "allow")]
    allow: Vec<String>,

    /// Per-page fetch timeout in seconds.
    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,

    /// Total fetch attempts per page before it is abandoned.
    #[arg(long, default_value_t = 2)]
    fetch_attempts: u32,

    /// Also crawl subdomains of the start URL's host.
    #[arg(long)]
    include_subdomains: bool,

    /// Override the User-Agent header.
    #[arg(long)]
    user_agent: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = CrawlConfig::new(args.start_url.clone())
        .with_workers(args.workers)
        .with_fetch_timeout(Duration::from_secs(args.timeout_secs))
        .with_max_fetch_attempts(args.fetch_attempts);
    if !args.block.is_empty() {
        config = config.with_blocklist(args.block.clone());
    }
    if !args.allow.is_empty() {
        config = config.with_allowlist(args.allow.clone());
    }
    if args.include_subdomains {
        config = config.with_subdomain_policy(SubdomainPolicy::IncludeSubdomains);
    }
    if let Some(user_agent) = &args.user_agent {
        config = config.with_user_agent(user_agent.clone());
    }

    let page_renderer =
        HttpRenderer::new(&config.user_agent).context("failed to build HTTP client")?;
    let engine = CrawlEngine::new(
        config,
        page_renderer,
        MarkdownRenderer::new(),
        HtmlLinkExtractor::new(),
    );
    let store = SnapshotStore::new(&args.output_dir);

    let notifier = match &args.webhook_url {
        Some(endpoint) => Some(
            WebhookNotifier::new(endpoint.clone()).context("failed to build webhook client")?,
        ),
        None => None,
    };

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping crawl");
            ctrl_c_cancel.cancel();
        }
    });

    let report = run_once(
        &engine,
        &store,
        notifier.as_ref().map(|n| n as &dyn Notifier),
        &cancel,
    )
    .await?;

    info!(
        snapshot = %report.snapshot,
        pages_visited = report.pages_visited,
        unique_files = report.unique_files,
        changes = report.changes.len(),
        delivered = report.delivered,
        delivery_failures = report.delivery_failures,
        first_run = report.first_run,
        "watch cycle complete"
    );
    Ok(())
}
