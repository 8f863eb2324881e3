use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Per-fetch failure from a `PageRenderer`. Retried up to the configured
/// budget, then the task is abandoned; never fatal to the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("page load timed out")]
    Timeout,
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("fetch backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// The rendering backend could not be started at all. Fatal: without a
/// working backend no page can be fetched, so the run is aborted.
#[derive(Debug, Error)]
#[error("failed to initialize fetch backend")]
pub struct BackendInitError(#[from] pub reqwest::Error);

/// Filesystem failure in the snapshot store.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to create snapshot directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to remove {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
}

/// Failure delivering a change notification. Logged, never retried
/// indefinitely, never fatal to the run.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// Run-level crawl failure.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("no crawl workers configured")]
    NoWorkers,
    #[error("invalid start URL: {0}")]
    InvalidStartUrl(String),
    #[error("crawl run was cancelled")]
    Cancelled,
    #[error(transparent)]
    Persist(#[from] PersistError),
}
