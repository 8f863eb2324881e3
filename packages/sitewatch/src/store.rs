use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{TimeDelta, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::canon::CanonicalUrl;
use crate::error::PersistError;

const MAX_FILENAME_LEN: usize = 200;
// "__" + 8 hex digest chars + ".md"
const FILENAME_SUFFIX_LEN: usize = 13;

/// Name of one persisted snapshot directory: origin authority plus a UTC
/// creation timestamp, so names sort newest-last lexically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Filesystem-backed store of immutable, timestamped crawl snapshots.
/// One directory per snapshot, one `.md` file per unique content item.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create a fresh snapshot directory for this origin and return a writer
    /// for it. A second create within the same second never reuses an
    /// existing directory; the timestamp is bumped until a new one appears.
    pub fn create(&self, authority: &str) -> Result<SnapshotWriter, PersistError> {
        fs::create_dir_all(&self.base_dir).map_err(|source| PersistError::CreateDir {
            path: self.base_dir.clone(),
            source,
        })?;

        let mut stamp = Utc::now();
        loop {
            let name = format!(
                "{}_{}",
                sanitize_authority(authority),
                stamp.format("%Y%m%d_%H%M%S")
            );
            let dir = self.base_dir.join(&name);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    return Ok(SnapshotWriter {
                        id: SnapshotId(name),
                        dir,
                    })
                }
                Err(source) if source.kind() == std::io::ErrorKind::AlreadyExists => {
                    stamp += TimeDelta::seconds(1);
                }
                Err(source) => return Err(PersistError::CreateDir { path: dir, source }),
            }
        }
    }

    /// Snapshot ids for this origin, most recent first.
    pub fn list(&self, authority: &str) -> Result<Vec<SnapshotId>, PersistError> {
        let prefix = format!("{}_", sanitize_authority(authority));
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PersistError::Read {
                    path: self.base_dir.clone(),
                    source,
                })
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PersistError::Read {
                path: self.base_dir.clone(),
                source,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            // An exact-timestamp suffix keeps `ex.com` from also matching
            // `ex.com_8080_*` snapshots of a different-port origin.
            if name
                .strip_prefix(&prefix)
                .is_some_and(is_timestamp_suffix)
            {
                ids.push(SnapshotId(name));
            }
        }
        ids.sort_unstable_by(|a, b| b.cmp(a));
        Ok(ids)
    }

    /// Load a snapshot's filename -> content mapping. Only `.md` files are
    /// part of a snapshot; auxiliary artifacts like change summaries are
    /// ignored.
    pub fn read(&self, id: &SnapshotId) -> Result<BTreeMap<String, String>, PersistError> {
        let dir = self.base_dir.join(id.name());
        let entries = fs::read_dir(&dir).map_err(|source| PersistError::Read {
            path: dir.clone(),
            source,
        })?;

        let mut pages = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| PersistError::Read {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.to_lowercase().ends_with(".md") {
                continue;
            }
            let path = entry.path();
            let content =
                fs::read_to_string(&path).map_err(|source| PersistError::Read { path, source })?;
            pages.insert(name, content);
        }
        Ok(pages)
    }
}

/// Write handle for one in-progress snapshot directory.
#[derive(Debug)]
pub struct SnapshotWriter {
    id: SnapshotId,
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_file(&self, filename: &str, content: &str) -> Result<(), PersistError> {
        let path = self.dir.join(filename);
        fs::write(&path, content).map_err(|source| PersistError::Write { path, source })
    }

    /// Remove this snapshot's directory entirely. For runs that did not
    /// complete; a discarded snapshot never appears in `list`.
    pub fn discard(self) -> Result<(), PersistError> {
        fs::remove_dir_all(&self.dir).map_err(|source| PersistError::Remove {
            path: self.dir,
            source,
        })
    }

    /// Delete any `.md` file not present in the finalized set, so the
    /// persisted snapshot contains exactly the unique-content files.
    pub fn prune_except(
        &self,
        keep: &BTreeMap<String, String>,
    ) -> Result<usize, PersistError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| PersistError::Read {
            path: self.dir.clone(),
            source,
        })?;

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|source| PersistError::Read {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.to_lowercase().ends_with(".md") || keep.contains_key(&name) {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(file = %name, "removed superseded snapshot file");
                    removed += 1;
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "failed to remove superseded file");
                }
            }
        }
        Ok(removed)
    }
}

fn sanitize_authority(authority: &str) -> String {
    authority.replace(':', "_")
}

/// `YYYYMMDD_HHMMSS`, as `create` mints it.
fn is_timestamp_suffix(s: &str) -> bool {
    match s.split_once('_') {
        Some((date, time)) => {
            date.len() == 8
                && time.len() == 6
                && date.chars().all(|c| c.is_ascii_digit())
                && time.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Output filename for a page: a readable base from the title (or the URL
/// path as fallback) plus a short URL digest for uniqueness.
pub fn page_filename(url: &CanonicalUrl, title: Option<&str>) -> String {
    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    let short = &digest[..8];

    let max_base = MAX_FILENAME_LEN - FILENAME_SUFFIX_LEN;
    let base = match title {
        Some(title) if !title.trim().is_empty() => sanitize_filename(title, max_base),
        _ => {
            let path = url.path().trim_matches('/');
            if path.is_empty() {
                sanitize_filename(&url.authority(), max_base)
            } else {
                sanitize_filename(path, max_base)
            }
        }
    };

    format!("{base}__{short}.md")
}

/// Sanitize a string for use in a filename: collapse whitespace, replace
/// anything outside `[A-Za-z0-9-_. ]`, and cap the length.
pub fn sanitize_filename(s: &str, max_len: usize) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out: String = collapsed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() {
        out = "untitled".to_string();
    }
    if out.len() > max_len {
        // The mapping above leaves only ASCII, so byte truncation is safe.
        out.truncate(max_len);
        out = out.trim_end_matches('_').to_string();
    }
    out
}
