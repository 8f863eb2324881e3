use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::detector::{change_summary, detect_changes};
use crate::engine::CrawlEngine;
use crate::store::{SnapshotId, SnapshotStore};
use crate::traits::{ContentRenderer, LinkExtractor, Notifier, PageRenderer};
use crate::types::{ChangeRecord, RunInfo};

/// What one watch cycle produced.
#[derive(Debug)]
pub struct WatchReport {
    pub snapshot: SnapshotId,
    pub pages_visited: usize,
    pub unique_files: usize,
    pub changes: Vec<ChangeRecord>,
    pub delivered: usize,
    pub delivery_failures: usize,
    /// True when no earlier snapshot existed for this site.
    pub first_run: bool,
}

/// One full watch cycle: crawl the site into a fresh snapshot, diff it
/// against the most recent earlier snapshot, write a change summary into
/// the snapshot directory, and push each change to the notifier.
///
/// Delivery failures are logged and counted, never fatal; the snapshot on
/// disk is already complete by the time delivery starts.
pub async fn run_once<P, C, L>(
    engine: &CrawlEngine<P, C, L>,
    store: &SnapshotStore,
    notifier: Option<&dyn Notifier>,
    cancel: &CancellationToken,
) -> anyhow::Result<WatchReport>
where
    P: PageRenderer,
    C: ContentRenderer,
    L: LinkExtractor,
{
    let site_url = engine.config().start_url.to_string();
    let authority = engine.config().authority();

    let writer = store
        .create(&authority)
        .context("failed to create snapshot directory")?;
    let outcome = match engine.run(&writer, cancel).await {
        Ok(outcome) => outcome,
        Err(error) => {
            // An unfinished snapshot must not become a later run's baseline.
            let id = writer.id().clone();
            if let Err(cleanup_error) = writer.discard() {
                warn!(snapshot = %id, %cleanup_error, "failed to remove incomplete snapshot");
            }
            return Err(error.into());
        }
    };

    let snapshots = store
        .list(&authority)
        .context("failed to list snapshots")?;
    let previous = snapshots.iter().find(|id| *id != writer.id());

    let old = match previous {
        Some(id) => store
            .read(id)
            .with_context(|| format!("failed to read previous snapshot {id}"))?,
        None => Default::default(),
    };
    let changes = detect_changes(&old, &outcome.files);
    info!(
        snapshot = %writer.id(),
        previous = previous.map(|id| id.name()),
        changes = changes.len(),
        "change detection complete"
    );

    let summary = change_summary(&site_url, writer.id(), previous, &changes, &old, &outcome.files);
    if let Err(error) = writer.write_file("change_summary.txt", &summary) {
        warn!(%error, "failed to write change summary");
    }

    let mut delivered = 0;
    let mut delivery_failures = 0;
    if let Some(notifier) = notifier {
        let run = RunInfo {
            site_url,
            crawl_id: writer.id().name().to_string(),
        };
        for change in &changes {
            match notifier.deliver(change, &run).await {
                Ok(()) => delivered += 1,
                Err(error) => {
                    delivery_failures += 1;
                    warn!(filename = %change.filename, %error, "notification delivery failed");
                }
            }
        }
    }

    Ok(WatchReport {
        snapshot: writer.id().clone(),
        pages_visited: outcome.pages_visited,
        unique_files: outcome.files.len(),
        changes,
        delivered,
        delivery_failures,
        first_run: previous.is_none(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use url::Url;

    use crate::canon::CanonicalUrl;
    use crate::config::CrawlConfig;
    use crate::error::{DeliveryError, FetchError};
    use crate::render::{HtmlLinkExtractor, MarkdownRenderer};
    use crate::store::page_filename;
    use crate::types::ChangeKind;

    struct StaticRenderer {
        html: String,
    }

    #[async_trait]
    impl PageRenderer for StaticRenderer {
        async fn fetch(&self, url: &CanonicalUrl, _: Duration) -> Result<String, FetchError> {
            if url.as_str() == "https://site.test/" {
                Ok(self.html.clone())
            } else {
                Err(FetchError::Navigation("HTTP 404".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<ChangeRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, change: &ChangeRecord, run: &RunInfo) -> Result<(), DeliveryError> {
            assert_eq!(run.site_url, "https://site.test/");
            if self.fail {
                return Err(DeliveryError::Status(reqwest::StatusCode::BAD_GATEWAY));
            }
            self.seen.lock().unwrap().push(change.clone());
            Ok(())
        }
    }

    fn engine(html: &str) -> CrawlEngine<StaticRenderer, MarkdownRenderer, HtmlLinkExtractor> {
        CrawlEngine::new(
            CrawlConfig::new(Url::parse("https://site.test/").unwrap())
                .with_max_fetch_attempts(1)
                .with_retry_backoff(Duration::from_millis(1)),
            StaticRenderer {
                html: html.to_string(),
            },
            MarkdownRenderer::new(),
            HtmlLinkExtractor::new(),
        )
    }

    const PAGE: &str =
        "<html><head><title>Home</title></head><body><p>hello world</p></body></html>";

    #[tokio::test]
    async fn first_run_reports_every_file_as_added() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let notifier = RecordingNotifier::default();

        let report = run_once(
            &engine(PAGE),
            &store,
            Some(&notifier),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(report.first_run);
        assert_eq!(report.unique_files, 1);
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].kind, ChangeKind::Added);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.delivery_failures, 0);
        assert_eq!(notifier.seen.lock().unwrap().len(), 1);

        let summary_path = tmp.path().join(report.snapshot.name()).join("change_summary.txt");
        let summary = fs::read_to_string(summary_path).unwrap();
        assert!(summary.contains("First crawl"));
    }

    #[tokio::test]
    async fn second_run_diffs_against_the_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());

        // A hand-made earlier snapshot holding an outdated copy of the home
        // page plus a file the site no longer serves.
        let root = CanonicalUrl::parse("https://site.test/").unwrap();
        let home_filename = page_filename(&root, Some("Home"));
        let old_dir = tmp.path().join("site.test_20200101_000000");
        fs::create_dir(&old_dir).unwrap();
        fs::write(old_dir.join(&home_filename), "outdated\n").unwrap();
        fs::write(old_dir.join("Removed__12345678.md"), "gone\n").unwrap();

        let notifier = RecordingNotifier::default();
        let report = run_once(
            &engine(PAGE),
            &store,
            Some(&notifier),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(!report.first_run);
        let kinds: Vec<_> = report
            .changes
            .iter()
            .map(|c| (c.kind, c.filename.as_str()))
            .collect();
        assert!(kinds.contains(&(ChangeKind::Updated, home_filename.as_str())));
        assert!(kinds.contains(&(ChangeKind::Deleted, "Removed__12345678.md")));
        assert_eq!(report.changes.len(), 2);
        assert_eq!(report.delivered, 2);
    }

    #[tokio::test]
    async fn delivery_failures_are_counted_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };

        let report = run_once(
            &engine(PAGE),
            &store,
            Some(&notifier),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.delivered, 0);
        assert_eq!(report.delivery_failures, 1);
    }

    #[tokio::test]
    async fn cancelled_run_does_not_publish_a_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_once(&engine(PAGE), &store, None, &cancel).await;
        assert!(result.is_err());
        assert!(store.list("site.test").unwrap().is_empty());

        // The next run must not diff against the cancelled run's leftovers.
        let report = run_once(&engine(PAGE), &store, None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.first_run);
    }

    #[tokio::test]
    async fn no_notifier_skips_delivery() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());

        let report = run_once(&engine(PAGE), &store, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.changes.len(), 1);
    }
}
