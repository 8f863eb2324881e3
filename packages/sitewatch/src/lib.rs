//! Domain-scoped site crawler with content deduplication and snapshot-based
//! change detection.
//!
//! A [`CrawlEngine`] walks every in-scope page of one site, converts each to
//! markdown, collapses content-identical pages to a single file, and writes
//! the result as an immutable timestamped snapshot. [`run_once`] wraps a
//! crawl in a full watch cycle: snapshot, diff against the previous
//! snapshot, and deliver the changes through a [`Notifier`].

pub mod canon;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod fetch;
mod frontier;
pub mod notify;
pub mod render;
pub mod scope;
pub mod store;
pub mod traits;
pub mod types;
pub mod watch;

pub use canon::{canonicalize, CanonicalUrl};
pub use config::CrawlConfig;
pub use detector::detect_changes;
pub use engine::CrawlEngine;
pub use error::{BackendInitError, CrawlError, DeliveryError, FetchError, PersistError};
pub use fetch::HttpRenderer;
pub use notify::WebhookNotifier;
pub use render::{HtmlLinkExtractor, MarkdownRenderer};
pub use scope::{ScopeFilter, SubdomainPolicy};
pub use store::{SnapshotId, SnapshotStore, SnapshotWriter};
pub use traits::{ContentRenderer, LinkExtractor, Notifier, PageRenderer};
pub use types::{ChangeKind, ChangeRecord, ContentHash, CrawlOutcome, RenderedPage, RunInfo};
pub use watch::{run_once, WatchReport};
