use std::collections::BTreeMap;

use similar::TextDiff;

use crate::store::SnapshotId;
use crate::types::{ChangeKind, ChangeRecord};

const DIFF_CONTEXT_LINES: usize = 3;
const DIFF_TRUNCATE_LINES: usize = 150;

/// Compare two snapshots by filename and content. Filenames encode both a
/// title and a URL digest, so a page whose content changed shows up as an
/// `Updated` entry under the same name, while a page whose canonical text
/// moved to a different URL shows up as an add/delete pair.
///
/// Total: every filename in either snapshot yields exactly one record, or
/// none when its content is byte-identical on both sides. Records come out
/// sorted by filename.
pub fn detect_changes(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();

    for (filename, content) in new {
        match old.get(filename) {
            None => changes.push(ChangeRecord {
                kind: ChangeKind::Added,
                filename: filename.clone(),
                content: Some(content.clone()),
            }),
            Some(previous) if previous != content => changes.push(ChangeRecord {
                kind: ChangeKind::Updated,
                filename: filename.clone(),
                content: Some(content.clone()),
            }),
            Some(_) => {}
        }
    }

    for filename in old.keys() {
        if !new.contains_key(filename) {
            changes.push(ChangeRecord {
                kind: ChangeKind::Deleted,
                filename: filename.clone(),
                content: None,
            });
        }
    }

    changes.sort_by(|a, b| a.filename.cmp(&b.filename));
    changes
}

/// Unified diff of one file between snapshots, truncated past
/// `DIFF_TRUNCATE_LINES` lines.
pub fn unified_diff(filename: &str, old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let text = diff
        .unified_diff()
        .context_radius(DIFF_CONTEXT_LINES)
        .header(&format!("old/{filename}"), &format!("new/{filename}"))
        .to_string();

    let mut lines: Vec<&str> = text.lines().collect();
    if lines.len() > DIFF_TRUNCATE_LINES {
        lines.truncate(DIFF_TRUNCATE_LINES);
        let mut truncated = lines.join("\n");
        truncated.push_str("\n... (diff truncated) ...\n");
        truncated
    } else {
        text
    }
}

/// Human-readable report written into the snapshot directory alongside the
/// crawled files.
pub fn change_summary(
    site_url: &str,
    crawl_id: &SnapshotId,
    previous: Option<&SnapshotId>,
    changes: &[ChangeRecord],
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("Change summary for {site_url}\n"));
    out.push_str(&format!("Crawl: {crawl_id}\n"));
    match previous {
        Some(previous) => out.push_str(&format!("Compared against: {previous}\n")),
        None => out.push_str("First crawl for this site; every file is new.\n"),
    }
    out.push('\n');

    if changes.is_empty() {
        out.push_str("No changes detected.\n");
        return out;
    }

    let added = changes.iter().filter(|c| c.kind == ChangeKind::Added).count();
    let updated = changes.iter().filter(|c| c.kind == ChangeKind::Updated).count();
    let deleted = changes.iter().filter(|c| c.kind == ChangeKind::Deleted).count();
    out.push_str(&format!(
        "{added} added, {updated} updated, {deleted} deleted\n\n"
    ));

    for change in changes {
        out.push_str(&format!("[{}] {}\n", change.kind.as_str(), change.filename));
    }

    let updates: Vec<_> = changes
        .iter()
        .filter(|c| c.kind == ChangeKind::Updated)
        .collect();
    if !updates.is_empty() {
        out.push_str("\n--- diffs ---\n");
        for change in updates {
            let before = old.get(&change.filename).map(String::as_str).unwrap_or("");
            let after = new.get(&change.filename).map(String::as_str).unwrap_or("");
            out.push('\n');
            out.push_str(&unified_diff(&change.filename, before, after));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(name, content)| (name.to_string(), content.to_string()))
            .collect()
    }

    #[test]
    fn identical_snapshots_yield_no_changes() {
        let pages = snapshot(&[("a.md", "alpha"), ("b.md", "beta")]);
        assert!(detect_changes(&pages, &pages).is_empty());
    }

    #[test]
    fn classifies_added_updated_deleted() {
        let old = snapshot(&[("same.md", "x"), ("changed.md", "v1"), ("gone.md", "g")]);
        let new = snapshot(&[("same.md", "x"), ("changed.md", "v2"), ("fresh.md", "f")]);

        let changes = detect_changes(&old, &new);
        assert_eq!(changes.len(), 3);

        assert_eq!(changes[0].kind, ChangeKind::Updated);
        assert_eq!(changes[0].filename, "changed.md");
        assert_eq!(changes[0].content.as_deref(), Some("v2"));

        assert_eq!(changes[1].kind, ChangeKind::Added);
        assert_eq!(changes[1].filename, "fresh.md");
        assert_eq!(changes[1].content.as_deref(), Some("f"));

        assert_eq!(changes[2].kind, ChangeKind::Deleted);
        assert_eq!(changes[2].filename, "gone.md");
        assert!(changes[2].content.is_none());
    }

    #[test]
    fn empty_old_snapshot_marks_everything_added() {
        let new = snapshot(&[("a.md", "alpha"), ("b.md", "beta")]);
        let changes = detect_changes(&BTreeMap::new(), &new);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Added));
    }

    #[test]
    fn unified_diff_shows_changed_lines() {
        let diff = unified_diff("page.md", "one\ntwo\nthree\n", "one\n2\nthree\n");
        assert!(diff.contains("old/page.md"));
        assert!(diff.contains("-two"));
        assert!(diff.contains("+2"));
    }

    #[test]
    fn unified_diff_truncates_long_output() {
        let old: String = (0..400).map(|n| format!("line {n}\n")).collect();
        let new: String = (0..400).map(|n| format!("LINE {n}\n")).collect();
        let diff = unified_diff("big.md", &old, &new);
        assert!(diff.ends_with("... (diff truncated) ...\n"));
        assert!(diff.lines().count() <= DIFF_TRUNCATE_LINES + 1);
    }

    #[test]
    fn summary_includes_counts_and_diffs() {
        let old = snapshot(&[("changed.md", "before\n")]);
        let new = snapshot(&[("changed.md", "after\n"), ("new.md", "n\n")]);
        let changes = detect_changes(&old, &new);

        let crawl = make_id("ex.com_20240301_120000");
        let prev = make_id("ex.com_20240201_000000");
        let summary = change_summary("https://ex.com", &crawl, Some(&prev), &changes, &old, &new);

        assert!(summary.contains("1 added, 1 updated, 0 deleted"));
        assert!(summary.contains("[updated] changed.md"));
        assert!(summary.contains("-before"));
        assert!(summary.contains("+after"));
    }

    fn make_id(name: &str) -> SnapshotId {
        // Snapshot ids are only minted by the store; go through a real
        // directory listing to obtain one for the summary header.
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join(name)).unwrap();
        let store = crate::store::SnapshotStore::new(tmp.path());
        let authority = name.rsplitn(3, '_').nth(2).unwrap();
        store.list(authority).unwrap().into_iter().next().unwrap()
    }
}
