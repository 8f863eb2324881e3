use std::time::Duration;

use url::Url;

use crate::canon::authority_of;
use crate::scope::{SubdomainPolicy, DEFAULT_SKIP_EXTENSIONS};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_MAX_FETCH_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_USER_AGENT: &str = "sitewatch/0.1 (site change monitor)";

/// Configuration for one crawl run, passed into the engine at construction.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub start_url: Url,
    pub workers: usize,
    pub fetch_timeout: Duration,
    /// Total fetch attempts per page (first try plus retries).
    pub max_fetch_attempts: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
    /// Path prefixes that are never crawled.
    pub blocklist: Vec<String>,
    /// When non-empty, only paths under one of these prefixes are crawled.
    pub allowlist: Vec<String>,
    pub skip_extensions: Vec<String>,
    pub subdomain_policy: SubdomainPolicy,
}

impl CrawlConfig {
    pub fn new(start_url: Url) -> Self {
        Self {
            start_url,
            workers: DEFAULT_WORKERS,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_fetch_attempts: DEFAULT_MAX_FETCH_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            blocklist: ["/wp-admin", "/admin", "/wp-login.php", "/cart"]
                .map(String::from)
                .to_vec(),
            allowlist: Vec::new(),
            skip_extensions: DEFAULT_SKIP_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            subdomain_policy: SubdomainPolicy::Strict,
        }
    }

    /// host[:port] of the crawl origin.
    pub fn authority(&self) -> String {
        authority_of(&self.start_url)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_fetch_attempts(mut self, attempts: u32) -> Self {
        self.max_fetch_attempts = attempts;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_blocklist(mut self, blocklist: Vec<String>) -> Self {
        self.blocklist = blocklist;
        self
    }

    pub fn with_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.allowlist = allowlist;
        self
    }

    pub fn with_skip_extensions(mut self, extensions: Vec<String>) -> Self {
        self.skip_extensions = extensions;
        self
    }

    pub fn with_subdomain_policy(mut self, policy: SubdomainPolicy) -> Self {
        self.subdomain_policy = policy;
        self
    }
}
