use std::time::Duration;

use async_trait::async_trait;

use crate::canon::CanonicalUrl;
use crate::error::{DeliveryError, FetchError};
use crate::types::{ChangeRecord, RenderedPage, RunInfo};

/// Fetches the rendered HTML for a URL (to allow mocking and alternative
/// backends such as a headless browser).
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn fetch(&self, url: &CanonicalUrl, timeout: Duration) -> Result<String, FetchError>;
}

/// Converts rendered HTML into canonical textual content plus its hash.
///
/// Must be deterministic: the same HTML and source URL always produce the
/// same `RenderedPage`.
pub trait ContentRenderer: Send + Sync {
    fn render(&self, html: &str, source_url: &CanonicalUrl) -> RenderedPage;
}

/// Extracts raw href strings from a page. Canonicalization and scope
/// filtering are the engine's job, not the extractor's.
pub trait LinkExtractor: Send + Sync {
    fn extract(&self, html: &str, base_url: &CanonicalUrl) -> Vec<String>;
}

/// Delivers a change record to an external sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, change: &ChangeRecord, run: &RunInfo) -> Result<(), DeliveryError>;
}
