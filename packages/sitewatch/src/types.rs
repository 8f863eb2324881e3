use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canon::CanonicalUrl;

/// SHA-256 digest of a page's canonical content, used for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn from_text(text: &str) -> Self {
        Self(Sha256::digest(text.as_bytes()).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Output of a `ContentRenderer` for one fetched page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Canonical textual content, starting with a provenance comment that
    /// names the source URL.
    pub markdown: String,
    /// Document title, when the page has one; used for filename assignment.
    pub title: Option<String>,
    /// Digest of the converted content body, excluding the provenance line,
    /// so content-identical pages at distinct URLs collapse to one file.
    pub hash: ContentHash,
}

/// Classification of a change between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// A single add/update/delete event produced by the change detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub filename: String,
    /// Full replacement content; absent for deletions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Identity of one crawl run, attached to outbound notifications.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub site_url: String,
    pub crawl_id: String,
}

/// Result of a completed crawl run.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// Finalized unique-content files: filename -> canonical text.
    pub files: BTreeMap<String, String>,
    /// Every processed URL -> the filename holding its content. Duplicate
    /// URLs alias the canonical owner's filename.
    pub aliases: HashMap<CanonicalUrl, String>,
    /// URLs that entered the visited set during this run.
    pub pages_visited: usize,
    /// Pages for which a fetch produced usable HTML.
    pub pages_fetched: usize,
    /// Pages whose content duplicated an earlier page.
    pub duplicates: usize,
}
