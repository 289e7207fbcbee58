// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git repository queries.
//!
//! Arborist only ever asks Git read-only questions: where the private gitdir
//! of a worktree lives, which worktree is the main one, and which untracked
//! files are ignored. All answers come from libgit2.
//!
//! # Gitdir Layout
//!
//! A linked worktree stores its metadata in a private directory inside the
//! shared repository, i.e., `.git/worktrees/<name>/`. The main worktree uses
//! `.git/` itself. Either way the directory lives outside the working tree,
//! so anything stored there is never committed, never matched by gitignore
//! rules, and never linked over by Arborist itself.

use crate::path::absolutize;

use git2::{Repository, StatusOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Locate the gitdir of the worktree containing a path.
pub trait GitDirResolver {
    /// Resolve gitdir for worktree containing `path`.
    ///
    /// Returns `None` if path is not inside a Git worktree.
    fn git_dir_for(&self, path: &Path) -> Option<PathBuf>;
}

impl<F> GitDirResolver for F
where
    F: Fn(&Path) -> Option<PathBuf>,
{
    fn git_dir_for(&self, path: &Path) -> Option<PathBuf> {
        self(path)
    }
}

/// Gitdir resolution through libgit2.
///
/// Walks up from the given path the same way `git rev-parse --git-dir` does.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Resolver;

impl GitDirResolver for Git2Resolver {
    fn git_dir_for(&self, path: &Path) -> Option<PathBuf> {
        match Repository::discover(path) {
            Ok(repo) => absolutize(repo.path()).ok(),
            Err(err) => {
                debug!("no gitdir for {:?}: {}", path.display(), err.message());
                None
            }
        }
    }
}

/// Check if path lives inside a linked worktree rather than the main one.
pub fn is_linked_worktree(path: impl AsRef<Path>) -> bool {
    Repository::discover(path.as_ref())
        .map(|repo| repo.is_worktree())
        .unwrap_or(false)
}

/// Determine working directory of the main worktree.
///
/// Works from inside any worktree of the repository. For a bare repository
/// the repository directory itself is returned.
///
/// # Errors
///
/// - Return [`GitError::Git2`] if path is not inside a repository.
pub fn main_worktree(path: impl AsRef<Path>) -> Result<PathBuf> {
    let repo = Repository::discover(path.as_ref())?;
    let common = Repository::open(repo.commondir())?;
    let main = common.workdir().unwrap_or_else(|| common.path());

    Ok(absolutize(main)?)
}

/// Determine working directory of the worktree containing path.
///
/// # Errors
///
/// - Return [`GitError::Git2`] if path is not inside a repository.
/// - Return [`GitError::Bare`] if repository has no working directory.
pub fn worktree_root(path: impl AsRef<Path>) -> Result<PathBuf> {
    let repo = Repository::discover(path.as_ref())?;
    let workdir = repo.workdir().ok_or_else(|| GitError::Bare {
        path: repo.path().to_path_buf(),
    })?;

    Ok(absolutize(workdir)?)
}

/// List untracked files ignored by Git, relative to the worktree root.
///
/// Descends into ignored directories, so every ignored file is listed on its
/// own, just like `git ls-files --others --ignored --exclude-standard`.
///
/// # Errors
///
/// - Return [`GitError::Git2`] if repository cannot be opened or queried.
#[instrument(skip(repo_path), level = "debug")]
pub fn ignored_files(repo_path: impl AsRef<Path>) -> Result<Vec<String>> {
    let repo = Repository::discover(repo_path.as_ref())?;
    let mut opts = StatusOptions::new();
    opts.include_ignored(true)
        .recurse_ignored_dirs(true)
        .include_untracked(false);

    let statuses = repo.statuses(Some(&mut opts))?;
    let mut files = statuses
        .iter()
        .filter(|entry| entry.status().is_ignored())
        .filter_map(|entry| entry.path().map(str::to_owned))
        .collect::<Vec<_>>();
    files.sort();
    debug!("found {} ignored files", files.len());

    Ok(files)
}

/// Git query error types.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Repository has no working directory.
    #[error("repository at {:?} has no working directory", path.display())]
    Bare { path: PathBuf },

    /// Path cannot be made absolute.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = GitError> = std::result::Result<T, E>;
