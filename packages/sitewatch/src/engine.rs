use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use futures::future::join_all;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::canon::{canonicalize, CanonicalUrl};
use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::frontier::Frontier;
use crate::scope::ScopeFilter;
use crate::store::{page_filename, SnapshotWriter};
use crate::traits::{ContentRenderer, LinkExtractor, PageRenderer};
use crate::types::{ContentHash, CrawlOutcome};

/// First page to claim a content hash owns the file for that content.
struct DedupOwner {
    url: CanonicalUrl,
    filename: String,
}

#[derive(Default)]
struct OutputAccum {
    files: BTreeMap<String, String>,
    aliases: HashMap<CanonicalUrl, String>,
    pages_fetched: usize,
    duplicates: usize,
}

struct SharedState {
    frontier: Frontier,
    dedup: Mutex<HashMap<ContentHash, DedupOwner>>,
    output: Mutex<OutputAccum>,
}

/// Drives one crawl run: a fixed pool of workers drains the frontier,
/// fetching, rendering, deduplicating and persisting pages until no work
/// remains or the run is cancelled.
pub struct CrawlEngine<P, C, L> {
    config: CrawlConfig,
    scope: ScopeFilter,
    page_renderer: P,
    content_renderer: C,
    link_extractor: L,
}

impl<P, C, L> CrawlEngine<P, C, L>
where
    P: PageRenderer,
    C: ContentRenderer,
    L: LinkExtractor,
{
    pub fn new(
        config: CrawlConfig,
        page_renderer: P,
        content_renderer: C,
        link_extractor: L,
    ) -> Self {
        let scope = ScopeFilter::from_config(&config);
        Self {
            config,
            scope,
            page_renderer,
            content_renderer,
            link_extractor,
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub async fn run(
        &self,
        writer: &SnapshotWriter,
        cancel: &CancellationToken,
    ) -> Result<CrawlOutcome, CrawlError> {
        if self.config.workers == 0 {
            return Err(CrawlError::NoWorkers);
        }
        let seed = CanonicalUrl::parse(self.config.start_url.as_str())
            .ok_or_else(|| CrawlError::InvalidStartUrl(self.config.start_url.to_string()))?;

        let state = SharedState {
            frontier: Frontier::new(),
            dedup: Mutex::new(HashMap::new()),
            output: Mutex::new(OutputAccum::default()),
        };
        state.frontier.enqueue_if_new(seed);

        info!(
            start_url = %self.config.start_url,
            workers = self.config.workers,
            "starting crawl"
        );
        join_all((0..self.config.workers).map(|id| self.worker(id, &state, writer, cancel))).await;

        if cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }

        let output = state.output.into_inner().unwrap();
        writer.prune_except(&output.files)?;

        let outcome = CrawlOutcome {
            files: output.files,
            aliases: output.aliases,
            pages_visited: state.frontier.visited_count(),
            pages_fetched: output.pages_fetched,
            duplicates: output.duplicates,
        };
        info!(
            pages_visited = outcome.pages_visited,
            pages_fetched = outcome.pages_fetched,
            unique_files = outcome.files.len(),
            duplicates = outcome.duplicates,
            "crawl finished"
        );
        Ok(outcome)
    }

    async fn worker(
        &self,
        id: usize,
        state: &SharedState,
        writer: &SnapshotWriter,
        cancel: &CancellationToken,
    ) {
        loop {
            let url = tokio::select! {
                _ = cancel.cancelled() => break,
                task = state.frontier.next_task() => match task {
                    Some(url) => url,
                    None => break,
                },
            };
            self.process_task(url, state, writer).await;
            state.frontier.task_done();
        }
        debug!(worker = id, "worker exiting");
    }

    async fn process_task(&self, url: CanonicalUrl, state: &SharedState, writer: &SnapshotWriter) {
        // A URL can normalize differently once it is its own base (redirects
        // aside, this is rare). If it does, treat the result as a fresh
        // discovery and run it through the same scope and visited checks.
        let url = match canonicalize(url.as_str(), url.as_url()) {
            Some(recanon) if recanon != url => {
                if !self.scope.admit(&recanon) || !state.frontier.mark_visited(&recanon) {
                    return;
                }
                recanon
            }
            Some(same) => same,
            None => return,
        };

        let Some(html) = self.fetch_with_retries(&url).await else {
            return;
        };
        if !html.to_lowercase().contains("<html") {
            debug!(url = %url, "response does not look like an HTML document, skipping");
            return;
        }
        state.output.lock().unwrap().pages_fetched += 1;

        let rendered = self.content_renderer.render(&html, &url);
        let filename = page_filename(&url, rendered.title.as_deref());

        // Ownership of a content hash is decided before anything is written,
        // so two workers holding identical content cannot both persist it.
        // A duplicate records its alias under the same lock, so an alias
        // cannot slip in after the owner's failed write has been cleaned up
        // (lock order: dedup, then output).
        let is_duplicate = {
            let mut dedup = state.dedup.lock().unwrap();
            match dedup.get(&rendered.hash) {
                Some(owner) => {
                    debug!(url = %url, owner = %owner.url, "duplicate content");
                    let mut output = state.output.lock().unwrap();
                    output.duplicates += 1;
                    output.aliases.insert(url.clone(), owner.filename.clone());
                    true
                }
                None => {
                    dedup.insert(
                        rendered.hash,
                        DedupOwner {
                            url: url.clone(),
                            filename: filename.clone(),
                        },
                    );
                    false
                }
            }
        };

        if !is_duplicate {
            if let Err(error) = writer.write_file(&filename, &rendered.markdown) {
                warn!(url = %url, %error, "failed to persist page, dropping it");
                let mut dedup = state.dedup.lock().unwrap();
                dedup.remove(&rendered.hash);
                // Duplicates may have aliased this file before the write
                // failed; those aliases would point at nothing.
                let mut output = state.output.lock().unwrap();
                output.aliases.retain(|_, owner| *owner != filename);
                return;
            }
            let mut output = state.output.lock().unwrap();
            output.files.insert(filename.clone(), rendered.markdown);
            output.aliases.insert(url.clone(), filename);
        }

        for href in self.link_extractor.extract(&html, &url) {
            let Some(link) = canonicalize(&href, url.as_url()) else {
                continue;
            };
            if self.scope.admit(&link) {
                state.frontier.enqueue_if_new(link);
            }
        }
    }

    /// Fetch with a bounded retry budget. `None` means the page was
    /// abandoned; the run carries on without it.
    async fn fetch_with_retries(&self, url: &CanonicalUrl) -> Option<String> {
        let attempts = self.config.max_fetch_attempts.max(1);
        for attempt in 1..=attempts {
            match self
                .page_renderer
                .fetch(url, self.config.fetch_timeout)
                .await
            {
                Ok(html) => return Some(html),
                Err(error) => {
                    warn!(url = %url, attempt, %error, "fetch failed");
                    if attempt < attempts {
                        sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }
        warn!(url = %url, "abandoning page after {attempts} attempts");
        None
    }
}
