use url::Url;

use crate::canon::{authority_of, CanonicalUrl};
use crate::config::CrawlConfig;

/// Extensions that are never fetched (binary, media, and font assets).
pub const DEFAULT_SKIP_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".pdf", ".zip", ".rar", ".7z", ".tar",
    ".gz", ".mp3", ".wav", ".mp4", ".avi", ".mov", ".ogg", ".woff", ".woff2", ".ttf", ".eot",
    ".ico",
];

/// How the origin authority is matched when admitting URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubdomainPolicy {
    /// Authority must equal the origin authority exactly. Subdomains are out
    /// of scope and never crawled.
    #[default]
    Strict,
    /// Also admit `*.host` on the same port.
    IncludeSubdomains,
}

/// Decides whether a canonical URL belongs to the crawl.
///
/// Four independent predicates, all of which must pass: origin authority,
/// blocklist prefixes, allowlist prefixes (when non-empty), and the
/// skip-extension set.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    authority: String,
    host: String,
    port: Option<u16>,
    blocklist: Vec<String>,
    allowlist: Vec<String>,
    skip_extensions: Vec<String>,
    policy: SubdomainPolicy,
}

impl ScopeFilter {
    pub fn new(
        origin: &Url,
        blocklist: Vec<String>,
        allowlist: Vec<String>,
        skip_extensions: Vec<String>,
        policy: SubdomainPolicy,
    ) -> Self {
        Self {
            authority: authority_of(origin),
            host: origin.host_str().unwrap_or_default().to_string(),
            port: origin.port(),
            blocklist,
            allowlist,
            skip_extensions,
            policy,
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(
            &config.start_url,
            config.blocklist.clone(),
            config.allowlist.clone(),
            config.skip_extensions.clone(),
            config.subdomain_policy,
        )
    }

    /// True when all scope predicates admit the URL.
    pub fn admit(&self, url: &CanonicalUrl) -> bool {
        self.authority_matches(url) && self.path_allowed(url.path()) && self.looks_like_html(url)
    }

    fn authority_matches(&self, url: &CanonicalUrl) -> bool {
        if url.authority() == self.authority {
            return true;
        }
        match self.policy {
            SubdomainPolicy::Strict => false,
            SubdomainPolicy::IncludeSubdomains => {
                let host = url.as_url().host_str().unwrap_or_default();
                url.as_url().port() == self.port && host.ends_with(&format!(".{}", self.host))
            }
        }
    }

    fn path_allowed(&self, path: &str) -> bool {
        if self
            .blocklist
            .iter()
            .any(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
        {
            return false;
        }
        if self.allowlist.is_empty() {
            return true;
        }
        self.allowlist
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Cheap extension pre-filter applied before any network cost.
    pub fn looks_like_html(&self, url: &CanonicalUrl) -> bool {
        let path = url.path().to_lowercase();
        !self
            .skip_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::CanonicalUrl;

    fn filter(blocklist: &[&str], allowlist: &[&str], policy: SubdomainPolicy) -> ScopeFilter {
        ScopeFilter::new(
            &Url::parse("https://ex.com/").unwrap(),
            blocklist.iter().map(|s| s.to_string()).collect(),
            allowlist.iter().map(|s| s.to_string()).collect(),
            DEFAULT_SKIP_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            policy,
        )
    }

    fn url(s: &str) -> CanonicalUrl {
        CanonicalUrl::parse(s).unwrap()
    }

    #[test]
    fn blocklist_rejects_prefixed_paths() {
        let filter = filter(&["/admin"], &[], SubdomainPolicy::Strict);
        assert!(!filter.admit(&url("https://ex.com/admin/x")));
        assert!(filter.admit(&url("https://ex.com/blog/x")));
    }

    #[test]
    fn strict_policy_rejects_subdomains_and_other_origins() {
        let filter = filter(&[], &[], SubdomainPolicy::Strict);
        assert!(!filter.admit(&url("https://www.ex.com/page")));
        assert!(!filter.admit(&url("https://other.com/page")));
        assert!(filter.admit(&url("https://ex.com/page")));
    }

    #[test]
    fn subdomain_policy_admits_same_site_subdomains() {
        let filter = filter(&[], &[], SubdomainPolicy::IncludeSubdomains);
        assert!(filter.admit(&url("https://docs.ex.com/page")));
        assert!(!filter.admit(&url("https://ex.com.evil.net/page")));
    }

    #[test]
    fn allowlist_restricts_when_non_empty() {
        let filter = filter(&[], &["/blog"], SubdomainPolicy::Strict);
        assert!(filter.admit(&url("https://ex.com/blog/post")));
        assert!(!filter.admit(&url("https://ex.com/shop/item")));
    }

    #[test]
    fn skip_extensions_are_never_fetched() {
        let filter = filter(&[], &[], SubdomainPolicy::Strict);
        assert!(!filter.admit(&url("https://ex.com/brochure.PDF")));
        assert!(!filter.admit(&url("https://ex.com/logo.png")));
        assert!(filter.admit(&url("https://ex.com/page.html")));
    }

    #[test]
    fn blocklist_wins_over_allowlist() {
        let filter = filter(&["/blog/private"], &["/blog"], SubdomainPolicy::Strict);
        assert!(!filter.admit(&url("https://ex.com/blog/private/x")));
        assert!(filter.admit(&url("https://ex.com/blog/public")));
    }
}
