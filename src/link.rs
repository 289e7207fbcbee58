// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link creation between worktrees.
//!
//! Places either a relative symlink or a full copy of a source worktree file
//! into a target worktree.
//!
//! # Never Overwrite
//!
//! Link operations refuse to touch a target that already exists, including a
//! dangling symlink. The operator may have created that file independently in
//! the new worktree, and silently replacing it would destroy their work.
//!
//! # Symlink Payload
//!
//! Symlinks always store the path from the target's parent directory to the
//! source, e.g., `../project/.env`. Both worktrees can then be moved together
//! without breaking any link, as long as they keep their relative position.
//!
//! # Failure Isolation
//!
//! Batch creation through [`create_links`] never aborts early. Each request
//! independently lands in either the success or the failure list, because
//! later entries are typically unrelated files.

use crate::path::{absolutize, join_inside, relative_link_path};

use mkdirp::mkdirp;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{self, File, FileTimes},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Kind of link placed in a target worktree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// Relative symlink back to the source worktree.
    #[default]
    Symlink,

    /// Independent copy of the source.
    Copy,
}

impl Display for LinkType {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Symlink => fmt.write_str("symlink"),
            Self::Copy => fmt.write_str("copy"),
        }
    }
}

/// Request to link one repository relative path.
///
/// Deserializes from either a bare path string, which implies
/// [`LinkType::Symlink`], or an object of the form `{"path": ..., "type": ...}`.
/// The key `target` is accepted in place of `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLinkRequest")]
pub struct LinkRequest {
    pub path: String,

    #[serde(rename = "type")]
    pub kind: LinkType,
}

impl LinkRequest {
    pub fn new(path: impl Into<String>, kind: LinkType) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl From<&str> for LinkRequest {
    fn from(path: &str) -> Self {
        Self::new(path, LinkType::Symlink)
    }
}

impl From<String> for LinkRequest {
    fn from(path: String) -> Self {
        Self::new(path, LinkType::Symlink)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLinkRequest {
    Bare(String),
    Entry {
        #[serde(alias = "target")]
        path: String,

        #[serde(default, rename = "type")]
        kind: LinkType,
    },
}

impl From<RawLinkRequest> for LinkRequest {
    fn from(raw: RawLinkRequest) -> Self {
        match raw {
            RawLinkRequest::Bare(path) => Self::new(path, LinkType::Symlink),
            RawLinkRequest::Entry { path, kind } => Self::new(path, kind),
        }
    }
}

/// Outcome of one link request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    /// Path relative to target worktree root.
    pub target: PathBuf,

    /// Path from target's directory to its counterpart in source worktree.
    pub source: PathBuf,

    #[serde(rename = "type")]
    pub kind: LinkType,

    /// Human readable description of what happened.
    pub message: String,
}

/// Side by side success and failure lists of a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub success: Vec<LinkRecord>,
    pub failed: Vec<LinkRecord>,
}

impl BatchResult {
    /// File a single outcome into the proper list.
    pub fn record(&mut self, outcome: std::result::Result<LinkRecord, LinkRecord>) {
        match outcome {
            Ok(record) => self.success.push(record),
            Err(record) => self.failed.push(record),
        }
    }
}

/// Create one link from target worktree back to source worktree.
///
/// Both `Ok` and `Err` carry a full [`LinkRecord`], so the caller can report
/// failures alongside successes.
pub fn create_link(
    source_repo: impl AsRef<Path>,
    target_worktree: impl AsRef<Path>,
    request: &LinkRequest,
    dry_run: bool,
) -> std::result::Result<LinkRecord, LinkRecord> {
    // INVARIANT: Request paths never leave either worktree.
    let paths = join_inside(source_repo.as_ref(), &request.path)
        .zip(join_inside(target_worktree.as_ref(), &request.path));
    let Some((source, target)) = paths else {
        let err = LinkError::OutsideWorktree {
            path: request.path.clone().into(),
        };
        return Err(failure(request, request.path.clone().into(), err));
    };
    let relative = relative_link_path(&source, &target).unwrap_or_else(|_| source.clone());

    let outcome = match request.kind {
        LinkType::Symlink => create_symlink(&source, &target, dry_run),
        LinkType::Copy => copy_file(&source, &target, dry_run),
    };

    match outcome {
        Ok(message) => Ok(LinkRecord {
            target: request.path.clone().into(),
            source: relative,
            kind: request.kind,
            message,
        }),
        Err(err) => Err(failure(request, relative, err)),
    }
}

fn failure(request: &LinkRequest, source: PathBuf, err: LinkError) -> LinkRecord {
    warn!("{} {:?} failed: {err}", request.kind, request.path);
    LinkRecord {
        target: request.path.clone().into(),
        source,
        kind: request.kind,
        message: err.to_string(),
    }
}

/// Create links for a batch of requests.
///
/// Requests may be bare paths (symlinks) or [`LinkRequest`] values. One
/// failing request never stops the remaining ones.
#[instrument(skip(source_repo, target_worktree, requests), level = "debug")]
pub fn create_links(
    source_repo: impl AsRef<Path>,
    target_worktree: impl AsRef<Path>,
    requests: impl IntoIterator<Item = impl Into<LinkRequest>>,
    dry_run: bool,
) -> BatchResult {
    let mut result = BatchResult::default();
    for request in requests {
        let request = request.into();
        result.record(create_link(
            source_repo.as_ref(),
            target_worktree.as_ref(),
            &request,
            dry_run,
        ));
    }

    debug!(
        "link batch done: {} succeeded, {} failed",
        result.success.len(),
        result.failed.len()
    );

    result
}

/// Create symlinks for a batch of bare paths.
pub fn create_symlinks(
    source_repo: impl AsRef<Path>,
    target_worktree: impl AsRef<Path>,
    paths: impl IntoIterator<Item = impl Into<String>>,
    dry_run: bool,
) -> BatchResult {
    let requests = paths
        .into_iter()
        .map(|path| LinkRequest::new(path, LinkType::Symlink));
    create_links(source_repo, target_worktree, requests, dry_run)
}

/// Create relative symlink at `target` pointing to `source`.
///
/// Creates any missing parent directories of `target`. Returns a description
/// of what was done, or what would be done on dry run.
///
/// # Errors
///
/// - Return [`LinkError::SourceMissing`] if source does not exist.
/// - Return [`LinkError::SymlinkExists`] if target is already a symlink.
/// - Return [`LinkError::FileExists`] if target is already a file or directory.
/// - Return [`LinkError::CreateSymlink`] if filesystem operations fail.
pub fn create_symlink(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    dry_run: bool,
) -> Result<String> {
    let source = absolutize(source).map_err(|err| LinkError::CreateSymlink { source: err })?;
    let target = absolutize(target).map_err(|err| LinkError::CreateSymlink { source: err })?;

    if !source.exists() {
        return Err(LinkError::SourceMissing { path: source });
    }

    match occupant(&target) {
        Some(Occupant::Symlink) => return Err(LinkError::SymlinkExists { path: target }),
        Some(Occupant::Entry) => return Err(LinkError::FileExists { path: target }),
        None => {}
    }

    let payload = relative_link_path(&source, &target)
        .map_err(|err| LinkError::CreateSymlink { source: err })?;

    if dry_run {
        debug!("dry run, skip symlink creation");
        return Ok(format!("Would create: {} -> {}", target.display(), payload.display()));
    }

    ensure_parent(&target).map_err(|err| LinkError::CreateSymlink { source: err })?;
    symlink(&payload, &target, source.is_dir())
        .map_err(|err| LinkError::CreateSymlink { source: err })?;
    info!("symlink {:?} -> {:?}", target.display(), payload.display());

    Ok(format!("Created: {} -> {}", target.display(), payload.display()))
}

/// Copy `source` to `target`.
///
/// Directories are copied recursively. Files are copied byte for byte along
/// with their permissions and timestamps.
///
/// # Errors
///
/// - Return [`LinkError::SourceMissing`] if source does not exist.
/// - Return [`LinkError::SymlinkAtCopyTarget`] if target is already a symlink.
/// - Return [`LinkError::FileExists`] if target is already a file or directory.
/// - Return [`LinkError::Copy`] if filesystem operations fail.
pub fn copy_file(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    dry_run: bool,
) -> Result<String> {
    let source = absolutize(source).map_err(|err| LinkError::Copy { source: err })?;
    let target = absolutize(target).map_err(|err| LinkError::Copy { source: err })?;

    if !source.exists() {
        return Err(LinkError::SourceMissing { path: source });
    }

    match occupant(&target) {
        Some(Occupant::Symlink) => return Err(LinkError::SymlinkAtCopyTarget { path: target }),
        Some(Occupant::Entry) => return Err(LinkError::FileExists { path: target }),
        None => {}
    }

    if dry_run {
        debug!("dry run, skip copy");
        return Ok(format!("Would copy: {} -> {}", source.display(), target.display()));
    }

    ensure_parent(&target).map_err(|err| LinkError::Copy { source: err })?;
    let copied = if source.is_dir() {
        copy_tree(&source, &target)
    } else {
        copy_with_metadata(&source, &target)
    };

    // INVARIANT: A failed copy leaves nothing behind at target.
    if let Err(err) = copied {
        discard(&target);
        return Err(LinkError::Copy { source: err });
    }
    info!("copy {:?} -> {:?}", source.display(), target.display());

    Ok(format!("Copied: {} -> {}", source.display(), target.display()))
}

enum Occupant {
    Symlink,
    Entry,
}

// INVARIANT: Inspect the entry itself, so dangling symlinks count as occupied.
fn occupant(path: &Path) -> Option<Occupant> {
    fs::symlink_metadata(path).ok().map(|meta| {
        if meta.file_type().is_symlink() {
            Occupant::Symlink
        } else {
            Occupant::Entry
        }
    })
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        mkdirp(parent)?;
    }

    Ok(())
}

fn copy_tree(source: &Path, target: &Path) -> io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let from = entry.path();
        let to = target.join(entry.file_name());
        if fs::metadata(&from)?.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            copy_with_metadata(&from, &to)?;
        }
    }

    Ok(())
}

fn copy_with_metadata(source: &Path, target: &Path) -> io::Result<()> {
    let meta = fs::metadata(source)?;
    fs::copy(source, target)?;

    let mut times = FileTimes::new();
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    // INVARIANT: Read-only handle, since copied mode may forbid writing.
    File::open(target)?.set_times(times)?;

    Ok(())
}

fn discard(path: &Path) {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return,
    };

    if let Err(err) = result {
        warn!("cannot clean up partial copy {:?}: {err}", path.display());
    }
}

#[cfg(unix)]
fn symlink(payload: &Path, target: &Path, _is_dir: bool) -> io::Result<()> {
    std::os::unix::fs::symlink(payload, target)
}

#[cfg(windows)]
fn symlink(payload: &Path, target: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        std::os::windows::fs::symlink_dir(payload, target)
    } else {
        std::os::windows::fs::symlink_file(payload, target)
    }
}

/// Link creation error types.
///
/// Display text doubles as the human readable failure message of a batch.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Source path does not exist.
    #[error("Source does not exist: {}", path.display())]
    SourceMissing { path: PathBuf },

    /// Symlink already occupies target of symlink creation.
    #[error("Symlink already exists: {}", path.display())]
    SymlinkExists { path: PathBuf },

    /// Symlink already occupies target of copy.
    #[error("Symlink already exists at target: {}", path.display())]
    SymlinkAtCopyTarget { path: PathBuf },

    /// Regular file or directory already occupies target.
    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    /// Requested path escapes the worktree.
    #[error("Not inside worktree: {}", path.display())]
    OutsideWorktree { path: PathBuf },

    /// Symlink creation failed.
    #[error("Error creating symlink: {source}")]
    CreateSymlink {
        #[source]
        source: io::Error,
    },

    /// Copy failed.
    #[error("Error copying file: {source}")]
    Copy {
        #[source]
        source: io::Error,
    },
}

/// Friendly result alias :3
type Result<T, E = LinkError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, read_link, read_to_string, write};

    fn scaffold() {
        create_dir_all("source/config").unwrap();
        create_dir_all("target").unwrap();
        write("source/.env", "SECRET=value").unwrap();
        write("source/local.db", "database content").unwrap();
        write("source/config/settings.json", "{}").unwrap();
    }

    #[sealed_test]
    fn create_symlink_writes_relative_payload() -> anyhow::Result<()> {
        scaffold();

        let message = create_symlink("source/.env", "target/.env", false)?;
        assert!(message.starts_with("Created: "));
        assert_eq!(read_link("target/.env")?, PathBuf::from("../source/.env"));
        assert_eq!(read_to_string("target/.env")?, "SECRET=value");

        Ok(())
    }

    #[sealed_test]
    fn create_symlink_builds_nested_parents() -> anyhow::Result<()> {
        scaffold();

        create_symlink("source/config/settings.json", "target/config/settings.json", false)?;
        assert_eq!(
            read_link("target/config/settings.json")?,
            PathBuf::from("../../source/config/settings.json")
        );

        Ok(())
    }

    #[sealed_test]
    fn create_symlink_twice_fails_on_second_call() -> anyhow::Result<()> {
        scaffold();

        create_symlink("source/.env", "target/.env", false)?;
        let result = create_symlink("source/.env", "target/.env", false);
        assert!(matches!(result, Err(LinkError::SymlinkExists { .. })));
        assert!(result.unwrap_err().to_string().contains("already exists"));
        assert_eq!(read_link("target/.env")?, PathBuf::from("../source/.env"));

        Ok(())
    }

    #[sealed_test]
    fn create_symlink_refuses_existing_file() {
        scaffold();
        write("target/.env", "MINE=1").unwrap();

        let result = create_symlink("source/.env", "target/.env", false);
        assert!(matches!(result, Err(LinkError::FileExists { .. })));
        assert_eq!(read_to_string("target/.env").unwrap(), "MINE=1");
    }

    #[sealed_test]
    fn create_symlink_refuses_dangling_symlink() {
        scaffold();
        std::os::unix::fs::symlink("nowhere", "target/.env").unwrap();

        let result = create_symlink("source/.env", "target/.env", false);
        assert!(matches!(result, Err(LinkError::SymlinkExists { .. })));
    }

    #[sealed_test]
    fn create_symlink_requires_source() {
        scaffold();

        let result = create_symlink("source/.missing", "target/.missing", false);
        assert!(matches!(result, Err(LinkError::SourceMissing { .. })));
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[sealed_test]
    fn create_symlink_dry_run_leaves_no_trace() -> anyhow::Result<()> {
        scaffold();

        let message = create_symlink("source/.env", "target/nested/.env", true)?;
        assert!(message.starts_with("Would create: "));
        assert!(message.ends_with(" -> ../../source/.env"));
        assert!(!std::path::Path::new("target/nested").exists());

        Ok(())
    }

    #[sealed_test]
    fn copy_file_makes_independent_copy() -> anyhow::Result<()> {
        scaffold();

        let message = copy_file("source/local.db", "target/local.db", false)?;
        assert!(message.starts_with("Copied: "));
        assert!(!fs::symlink_metadata("target/local.db")?.file_type().is_symlink());
        assert_eq!(read_to_string("target/local.db")?, "database content");
        assert_eq!(
            fs::metadata("target/local.db")?.modified()?,
            fs::metadata("source/local.db")?.modified()?
        );

        Ok(())
    }

    #[sealed_test]
    fn copy_file_copies_directories_recursively() -> anyhow::Result<()> {
        scaffold();

        copy_file("source/config", "target/config", false)?;
        assert!(Path::new("target/config").is_dir());
        assert_eq!(read_to_string("target/config/settings.json")?, "{}");

        Ok(())
    }

    #[sealed_test]
    fn copy_file_handles_read_only_source() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        scaffold();
        write("source/server.pem", "-----BEGIN KEY-----")?;
        fs::set_permissions("source/server.pem", fs::Permissions::from_mode(0o400))?;

        let message = copy_file("source/server.pem", "target/server.pem", false)?;
        assert!(message.starts_with("Copied: "));
        assert_eq!(read_to_string("target/server.pem")?, "-----BEGIN KEY-----");
        assert_eq!(fs::metadata("target/server.pem")?.permissions().mode() & 0o777, 0o400);
        assert_eq!(
            fs::metadata("target/server.pem")?.modified()?,
            fs::metadata("source/server.pem")?.modified()?
        );

        Ok(())
    }

    #[sealed_test]
    fn copy_file_discards_partial_tree_on_failure() {
        scaffold();
        write("source/config/app.yml", "a: 1").unwrap();
        std::os::unix::fs::symlink("nowhere", "source/config/dangling").unwrap();

        let result = copy_file("source/config", "target/config", false);
        assert!(matches!(result, Err(LinkError::Copy { .. })));
        assert!(fs::symlink_metadata("target/config").is_err());

        // Nothing left behind, so a retry fails on the source again, not on the target.
        let result = copy_file("source/config", "target/config", false);
        assert!(matches!(result, Err(LinkError::Copy { .. })));
    }

    #[sealed_test]
    fn create_link_rejects_paths_outside_worktree() {
        scaffold();
        write("precious", "keep").unwrap();

        let requests = [
            LinkRequest::new("../precious", LinkType::Copy),
            LinkRequest::new("/etc/hostname", LinkType::Symlink),
            LinkRequest::new(".", LinkType::Symlink),
        ];
        let result = create_links("source", "target", requests, false);

        assert!(result.success.is_empty());
        let messages = result
            .failed
            .iter()
            .map(|record| record.message.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            messages,
            vec![
                "Not inside worktree: ../precious",
                "Not inside worktree: /etc/hostname",
                "Not inside worktree: .",
            ]
        );
        assert_eq!(read_to_string("precious").unwrap(), "keep");
        assert!(fs::symlink_metadata("target/precious").is_err());
    }

    #[sealed_test]
    fn copy_file_refuses_existing_targets() {
        scaffold();
        write("target/local.db", "other").unwrap();
        std::os::unix::fs::symlink("../source/.env", "target/.env").unwrap();

        let result = copy_file("source/local.db", "target/local.db", false);
        assert!(matches!(result, Err(LinkError::FileExists { .. })));
        let result = copy_file("source/.env", "target/.env", false);
        assert!(matches!(result, Err(LinkError::SymlinkAtCopyTarget { .. })));
        assert_eq!(read_to_string("target/local.db").unwrap(), "other");
    }

    #[sealed_test]
    fn copy_file_dry_run_leaves_no_trace() -> anyhow::Result<()> {
        scaffold();

        let message = copy_file("source/local.db", "target/local.db", true)?;
        assert!(message.starts_with("Would copy: "));
        assert!(!Path::new("target/local.db").exists());

        Ok(())
    }

    #[sealed_test]
    fn create_links_handles_mixed_types() -> anyhow::Result<()> {
        scaffold();

        let requests = [
            LinkRequest::new(".env", LinkType::Symlink),
            LinkRequest::new("local.db", LinkType::Copy),
        ];
        let result = create_links("source", "target", requests, false);

        assert_eq!(result.success.len(), 2);
        assert!(result.failed.is_empty());
        assert!(fs::symlink_metadata("target/.env")?.file_type().is_symlink());
        assert!(fs::symlink_metadata("target/local.db")?.file_type().is_file());

        let expect = LinkRecord {
            target: ".env".into(),
            source: "../source/.env".into(),
            kind: LinkType::Symlink,
            message: result.success[0].message.clone(),
        };
        assert_eq!(result.success[0], expect);
        assert_eq!(result.success[1].kind, LinkType::Copy);

        Ok(())
    }

    #[sealed_test]
    fn create_links_isolates_failures() {
        scaffold();

        let result = create_symlinks("source", "target", [".missing", ".env"], false);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].target, PathBuf::from(".missing"));
        assert!(result.failed[0].message.starts_with("Source does not exist: "));
        assert_eq!(result.success.len(), 1);
        assert_eq!(result.success[0].target, PathBuf::from(".env"));
    }

    #[test]
    fn link_request_accepts_legacy_and_tagged_forms() -> anyhow::Result<()> {
        let result: Vec<LinkRequest> = serde_json::from_str(
            r#"[".env", {"path": "app.db", "type": "copy"}, {"target": ".npmrc"}]"#,
        )?;

        let expect = vec![
            LinkRequest::new(".env", LinkType::Symlink),
            LinkRequest::new("app.db", LinkType::Copy),
            LinkRequest::new(".npmrc", LinkType::Symlink),
        ];
        assert_eq!(result, expect);

        Ok(())
    }
}
