use std::fmt;

use url::Url;

/// Default document names that are stripped from URL paths so that
/// `/docs/index.html` and `/docs` count as the same page.
const DEFAULT_DOCUMENTS: &[&str] = &["index.html", "index.php", "home.html", "default.html"];

/// A normalized absolute URL: http(s) scheme, no fragment, no default-document
/// suffix, no trailing slash on non-root paths. Two raw links that normalize
/// to the same `CanonicalUrl` are the same crawl unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    /// Parse and canonicalize an absolute URL (used for the start URL).
    pub fn parse(input: &str) -> Option<Self> {
        let base = Url::parse(input.trim()).ok()?;
        canonicalize(input, &base)
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    /// host[:port] of this URL. Default ports are normalized away by the
    /// `url` crate, so `https://ex.com:443/` and `https://ex.com/` agree.
    pub fn authority(&self) -> String {
        authority_of(&self.0)
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub(crate) fn authority_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Normalize a raw href into a comparable absolute URL.
///
/// Resolves `href` relative to `base`, drops the fragment, collapses
/// default-document filenames to their directory, and strips trailing slashes
/// from non-root paths. Pure function; malformed or non-http(s) links yield
/// `None` and are treated as "no link" by callers.
pub fn canonicalize(href: &str, base: &Url) -> Option<CanonicalUrl> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);

    if let Some(dir) = strip_default_document(url.path()) {
        url.set_path(&dir);
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            url.set_path("/");
        } else {
            url.set_path(&trimmed);
        }
    }

    Some(CanonicalUrl(url))
}

fn strip_default_document(path: &str) -> Option<String> {
    let (dir, file) = path.rsplit_once('/')?;
    if DEFAULT_DOCUMENTS.contains(&file) {
        Some(format!("{dir}/"))
    } else {
        None
    }
}
