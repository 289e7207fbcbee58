// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reconcile manifests against live filesystem state.
//!
//! A manifest only records what was true at write time. Afterwards the
//! operator may delete a link, move the source worktree, or remove the source
//! file itself. Reconciliation reports how far reality has drifted, and
//! removal tears down whatever the manifest still lists.
//!
//! # Entry States
//!
//! - __Valid__: symlink whose referent resolves, or copy that still exists.
//! - __Broken__: symlink whose referent no longer resolves. Implies the
//!   source moved or was deleted.
//! - __Missing__: the link or copy itself is gone. Implies the operator or
//!   some tool removed it.
//!
//! A symlink entry whose target was replaced by a regular file is neither of
//! the above, and only counts towards the total.

use crate::{
    git::GitDirResolver,
    link::LinkType,
    manifest::{LinkEntry, ManifestStore},
    path::join_inside,
};

use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Live state of one manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Valid,
    Broken,
    Missing,

    /// Symlink entry now occupied by a regular file or directory.
    Replaced,
}

/// Aggregate status of a worktree's links.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub count: usize,
    pub symlinks: usize,
    pub copies: usize,
    pub valid: usize,
    pub broken: usize,
    pub missing: usize,

    /// Source worktree recorded in manifest.
    pub source: Option<PathBuf>,
}

/// Outcome of tearing down a worktree's links.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    pub removed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Probe live state of one manifest entry inside a worktree.
pub fn probe(worktree: impl AsRef<Path>, entry: &LinkEntry) -> EntryState {
    let Some(target) = join_inside(worktree, &entry.target) else {
        return EntryState::Missing;
    };

    match entry.kind {
        LinkType::Symlink => match fs::symlink_metadata(&target) {
            Ok(meta) if meta.file_type().is_symlink() => {
                if fs::metadata(&target).is_ok() {
                    EntryState::Valid
                } else {
                    EntryState::Broken
                }
            }
            Ok(_) => EntryState::Replaced,
            Err(_) => EntryState::Missing,
        },
        LinkType::Copy => {
            if target.exists() {
                EntryState::Valid
            } else {
                EntryState::Missing
            }
        }
    }
}

/// Probe every entry of a worktree's manifest.
///
/// Returns an empty list if worktree has no readable manifest.
pub fn inspect<R>(
    store: &ManifestStore<R>,
    worktree: impl AsRef<Path>,
) -> Vec<(LinkEntry, EntryState)>
where
    R: GitDirResolver,
{
    let worktree = worktree.as_ref();
    store
        .read(worktree)
        .map(|manifest| manifest.links)
        .unwrap_or_default()
        .into_iter()
        .map(|entry| {
            let state = probe(worktree, &entry);
            (entry, state)
        })
        .collect()
}

/// Compute live link status of worktree.
///
/// Always yields a well formed status. Without a manifest every count is
/// zero.
#[instrument(skip(store, worktree), level = "debug")]
pub fn status<R>(store: &ManifestStore<R>, worktree: impl AsRef<Path>) -> LinkStatus
where
    R: GitDirResolver,
{
    let worktree = worktree.as_ref();
    let Some(manifest) = store.read(worktree) else {
        debug!("no manifest for {:?}", worktree.display());
        return LinkStatus::default();
    };

    let mut status = LinkStatus {
        count: manifest.links.len(),
        source: Some(manifest.source_worktree.clone()),
        ..Default::default()
    };

    for entry in &manifest.links {
        match entry.kind {
            LinkType::Symlink => status.symlinks += 1,
            LinkType::Copy => status.copies += 1,
        }

        match probe(worktree, entry) {
            EntryState::Valid => status.valid += 1,
            EntryState::Broken => status.broken += 1,
            EntryState::Missing => status.missing += 1,
            EntryState::Replaced => {
                debug!("{:?} no longer a symlink", entry.target.display());
            }
        }
    }

    status
}

/// Remove every link listed in worktree's manifest, then the manifest itself.
///
/// Symlinks are always unlinked without touching their referent. Copies are
/// deleted only if `remove_copies` is set, and are otherwise reported as
/// failures. Entries already gone count as removed. The manifest is deleted
/// regardless of individual outcomes.
#[instrument(skip(store, worktree), level = "debug")]
pub fn remove<R>(
    store: &ManifestStore<R>,
    worktree: impl AsRef<Path>,
    remove_copies: bool,
) -> RemovalReport
where
    R: GitDirResolver,
{
    let worktree = worktree.as_ref();
    let mut report = RemovalReport::default();
    let Some(manifest) = store.read(worktree) else {
        report.errors.push("No manifest file found".into());
        return report;
    };

    for entry in &manifest.links {
        match remove_entry(worktree, entry, remove_copies) {
            Ok(()) => report.removed += 1,
            Err(message) => {
                warn!("{message}");
                report.errors.push(message);
                report.failed += 1;
            }
        }
    }

    store.delete(worktree);
    info!(
        "removed {} links from {:?}, {} failed",
        report.removed,
        worktree.display(),
        report.failed
    );

    report
}

fn remove_entry(worktree: &Path, entry: &LinkEntry, remove_copies: bool) -> Result<(), String> {
    let shown = entry.target.display();
    let Some(target) = join_inside(worktree, &entry.target) else {
        return Err(format!("Not inside worktree: {shown}"));
    };

    let meta = match fs::symlink_metadata(&target) {
        Ok(meta) => meta,
        Err(_) => {
            debug!("{shown:?} already gone");
            return Ok(());
        }
    };

    // INVARIANT: Unlink the symlink itself, never its referent.
    let result = if meta.file_type().is_symlink() {
        fs::remove_file(&target)
    } else {
        match entry.kind {
            LinkType::Copy if remove_copies && meta.is_dir() => fs::remove_dir_all(&target),
            LinkType::Copy if remove_copies => fs::remove_file(&target),
            LinkType::Copy => return Err(format!("Skipped copy (copies kept): {shown}")),
            LinkType::Symlink => return Err(format!("Not a symlink: {shown}")),
        }
    };

    result.map_err(|err| format!("Error removing {shown}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{create_links, LinkRequest};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            for dir in ["main/config", "feature", "gitdir"] {
                fs::create_dir_all(root.path().join(dir)).unwrap();
            }
            fs::write(root.path().join("main/.env"), "SECRET=1").unwrap();
            fs::write(root.path().join("main/local.db"), "rows").unwrap();
            fs::write(root.path().join("main/config/app.yml"), "a: 1").unwrap();

            Self { root }
        }

        fn main(&self) -> PathBuf {
            self.root.path().join("main")
        }

        fn feature(&self) -> PathBuf {
            self.root.path().join("feature")
        }

        fn store(&self) -> ManifestStore<impl GitDirResolver> {
            let gitdir = self.root.path().join("gitdir");
            ManifestStore::new(move |_: &Path| Some(gitdir.clone()))
        }

        fn link(&self, requests: Vec<LinkRequest>) {
            let result = create_links(self.main(), self.feature(), requests, false);
            assert!(result.failed.is_empty());
            self.store()
                .write(self.feature(), self.main(), &result.success)
                .unwrap();
        }
    }

    #[test]
    fn status_without_manifest_is_zeroed() {
        let fixture = Fixture::new();
        assert_eq!(status(&fixture.store(), fixture.feature()), LinkStatus::default());
    }

    #[test]
    fn status_counts_valid_links() {
        let fixture = Fixture::new();
        fixture.link(vec![
            LinkRequest::new(".env", LinkType::Symlink),
            LinkRequest::new("local.db", LinkType::Copy),
        ]);

        let expect = LinkStatus {
            count: 2,
            symlinks: 1,
            copies: 1,
            valid: 2,
            broken: 0,
            missing: 0,
            source: Some(fixture.main()),
        };
        assert_eq!(status(&fixture.store(), fixture.feature()), expect);
    }

    #[test]
    fn status_separates_broken_from_missing() {
        let fixture = Fixture::new();
        fixture.link(vec![".env".into()]);

        fs::remove_file(fixture.main().join(".env")).unwrap();
        let result = status(&fixture.store(), fixture.feature());
        assert_eq!((result.valid, result.broken, result.missing), (0, 1, 0));

        fs::remove_file(fixture.feature().join(".env")).unwrap();
        let result = status(&fixture.store(), fixture.feature());
        assert_eq!((result.valid, result.broken, result.missing), (0, 0, 1));
    }

    #[test]
    fn status_reports_missing_copy() {
        let fixture = Fixture::new();
        fixture.link(vec![LinkRequest::new("local.db", LinkType::Copy)]);

        fs::remove_file(fixture.feature().join("local.db")).unwrap();
        let result = status(&fixture.store(), fixture.feature());
        assert_eq!((result.valid, result.broken, result.missing), (0, 0, 1));
    }

    #[test]
    fn inspect_flags_replaced_symlink() {
        let fixture = Fixture::new();
        fixture.link(vec![".env".into()]);
        fs::remove_file(fixture.feature().join(".env")).unwrap();
        fs::write(fixture.feature().join(".env"), "LOCAL=1").unwrap();

        let result = inspect(&fixture.store(), fixture.feature());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].1, EntryState::Replaced);

        let result = status(&fixture.store(), fixture.feature());
        assert_eq!((result.count, result.valid, result.broken, result.missing), (1, 0, 0, 0));
    }

    #[test]
    fn remove_unlinks_without_touching_source() {
        let fixture = Fixture::new();
        fixture.link(vec![".env".into(), "config".into()]);

        let result = remove(&fixture.store(), fixture.feature(), true);
        let expect = RemovalReport {
            removed: 2,
            failed: 0,
            errors: vec![],
        };
        assert_eq!(result, expect);
        assert!(fs::symlink_metadata(fixture.feature().join(".env")).is_err());
        assert!(fs::symlink_metadata(fixture.feature().join("config")).is_err());
        assert_eq!(fs::read_to_string(fixture.main().join(".env")).unwrap(), "SECRET=1");
        assert!(fixture.main().join("config/app.yml").exists());
        assert_eq!(fixture.store().read(fixture.feature()), None);
    }

    #[test]
    fn remove_deletes_copies_recursively() {
        let fixture = Fixture::new();
        fixture.link(vec![
            LinkRequest::new("local.db", LinkType::Copy),
            LinkRequest::new("config", LinkType::Copy),
        ]);

        let result = remove(&fixture.store(), fixture.feature(), true);
        assert_eq!((result.removed, result.failed), (2, 0));
        assert!(!fixture.feature().join("local.db").exists());
        assert!(!fixture.feature().join("config").exists());
    }

    #[test]
    fn remove_keeps_copies_when_asked() {
        let fixture = Fixture::new();
        fixture.link(vec![
            LinkRequest::new(".env", LinkType::Symlink),
            LinkRequest::new("local.db", LinkType::Copy),
        ]);

        let result = remove(&fixture.store(), fixture.feature(), false);
        assert_eq!((result.removed, result.failed), (1, 1));
        assert_eq!(result.errors, vec!["Skipped copy (copies kept): local.db".to_string()]);
        assert!(fixture.feature().join("local.db").exists());
        // Best effort, then forget.
        assert_eq!(fixture.store().read(fixture.feature()), None);
    }

    #[test]
    fn remove_refuses_replaced_symlink_and_counts_gone_entries() {
        let fixture = Fixture::new();
        fixture.link(vec![".env".into(), "config/app.yml".into()]);
        fs::remove_file(fixture.feature().join(".env")).unwrap();
        fs::write(fixture.feature().join(".env"), "LOCAL=1").unwrap();
        fs::remove_file(fixture.feature().join("config/app.yml")).unwrap();

        let result = remove(&fixture.store(), fixture.feature(), true);
        assert_eq!((result.removed, result.failed), (1, 1));
        assert_eq!(result.errors, vec!["Not a symlink: .env".to_string()]);
        assert_eq!(fs::read_to_string(fixture.feature().join(".env")).unwrap(), "LOCAL=1");
    }

    #[test]
    fn remove_never_leaves_worktree() {
        let fixture = Fixture::new();
        let precious = fixture.root.path().join("precious");
        fs::create_dir_all(&precious).unwrap();
        fs::write(precious.join("keep.txt"), "mine").unwrap();

        let entries = [
            LinkEntry {
                target: "../precious".into(),
                source: "../main/precious".into(),
                kind: LinkType::Copy,
            },
            LinkEntry {
                target: precious.join("keep.txt"),
                source: PathBuf::new(),
                kind: LinkType::Copy,
            },
        ];
        fixture
            .store()
            .write(fixture.feature(), fixture.main(), entries)
            .unwrap();

        let result = remove(&fixture.store(), fixture.feature(), true);
        let expect = RemovalReport {
            removed: 0,
            failed: 2,
            errors: vec![
                "Not inside worktree: ../precious".to_string(),
                format!("Not inside worktree: {}", precious.join("keep.txt").display()),
            ],
        };
        assert_eq!(result, expect);
        assert_eq!(fs::read_to_string(precious.join("keep.txt")).unwrap(), "mine");
    }

    #[test]
    fn remove_twice_reports_missing_manifest() {
        let fixture = Fixture::new();
        fixture.link(vec![".env".into()]);

        remove(&fixture.store(), fixture.feature(), true);
        let result = remove(&fixture.store(), fixture.feature(), true);
        let expect = RemovalReport {
            removed: 0,
            failed: 0,
            errors: vec!["No manifest file found".into()],
        };
        assert_eq!(result, expect);
    }
}
