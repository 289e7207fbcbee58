// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link manifest persistence.
//!
//! Every worktree that received links gets a __manifest__: a JSON record of
//! what was linked or copied into it, and how. The manifest is what makes
//! later auditing and teardown possible.
//!
//! # Manifest Location
//!
//! The manifest lives at `<gitdir>/arborist-config`, where `<gitdir>` is the
//! private gitdir of the worktree (see [`git`](crate::git)). It is never part
//! of the working tree itself.
//!
//! # Manifest Layout
//!
//! ```json
//! {
//!   "version": "2.2",
//!   "worktree_path": "/dev/project-feature",
//!   "source_worktree": "/dev/project",
//!   "created_at": "2025-01-01T00:00:00.000000Z",
//!   "links": [
//!     { "target": ".env", "source": "../project/.env", "type": "symlink" }
//!   ]
//! }
//! ```
//!
//! Older manifests keep their entries under `symlinks` instead of `links`,
//! and may omit `type`. Both are normalized at decode time, so the rest of
//! the crate only ever sees [`Manifest`].
//!
//! # Replace Wholesale
//!
//! A write always replaces the entire file. Callers must pass the complete
//! desired link set. The new content is written to a temporary file in the
//! same directory, then renamed over the old manifest, so readers never see a
//! truncated file. Concurrent writers are not locked out, and the last rename
//! wins.

use crate::{
    git::{Git2Resolver, GitDirResolver},
    link::{LinkRecord, LinkType},
    path::absolutize,
};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// File name of manifest inside a gitdir.
pub const MANIFEST_FILE: &str = "arborist-config";

/// Current manifest schema version.
pub const MANIFEST_VERSION: &str = "2.2";

/// One linked or copied path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Path relative to worktree root.
    pub target: PathBuf,

    /// Path from target's directory to counterpart in source worktree.
    #[serde(default)]
    pub source: PathBuf,

    #[serde(default, rename = "type")]
    pub kind: LinkType,
}

impl From<&LinkRecord> for LinkEntry {
    fn from(record: &LinkRecord) -> Self {
        Self {
            target: record.target.clone(),
            source: record.source.clone(),
            kind: record.kind,
        }
    }
}

impl From<LinkRecord> for LinkEntry {
    fn from(record: LinkRecord) -> Self {
        Self {
            target: record.target,
            source: record.source,
            kind: record.kind,
        }
    }
}

/// Record of links created for one worktree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawManifest")]
pub struct Manifest {
    pub version: String,
    pub worktree_path: PathBuf,
    pub source_worktree: PathBuf,
    pub created_at: String,
    pub links: Vec<LinkEntry>,
}

impl Manifest {
    /// Merge new entries into current link set.
    ///
    /// Entries whose target is already listed replace the old entry in place.
    /// Target paths stay unique.
    pub fn merge(&mut self, entries: impl IntoIterator<Item = LinkEntry>) {
        for entry in entries {
            match self.links.iter_mut().find(|link| link.target == entry.target) {
                Some(link) => *link = entry,
                None => self.links.push(entry),
            }
        }
    }
}

// INVARIANT: Legacy "symlinks" key only applies when "links" is absent.
#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    version: String,

    #[serde(default)]
    worktree_path: PathBuf,

    #[serde(default)]
    source_worktree: PathBuf,

    #[serde(default)]
    created_at: String,

    links: Option<Vec<LinkEntry>>,
    symlinks: Option<Vec<LinkEntry>>,
}

impl From<RawManifest> for Manifest {
    fn from(raw: RawManifest) -> Self {
        Self {
            version: raw.version,
            worktree_path: raw.worktree_path,
            source_worktree: raw.source_worktree,
            created_at: raw.created_at,
            links: raw.links.or(raw.symlinks).unwrap_or_default(),
        }
    }
}

/// Manifest storage inside worktree gitdirs.
#[derive(Debug, Default, Clone)]
pub struct ManifestStore<R = Git2Resolver>
where
    R: GitDirResolver,
{
    resolver: R,
}

impl<R> ManifestStore<R>
where
    R: GitDirResolver,
{
    /// Construct new manifest store with given gitdir resolver.
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Determine where manifest of worktree lives.
    ///
    /// Returns `None` if worktree has no resolvable gitdir.
    pub fn manifest_path(&self, worktree: impl AsRef<Path>) -> Option<PathBuf> {
        self.resolver
            .git_dir_for(worktree.as_ref())
            .map(|gitdir| gitdir.join(MANIFEST_FILE))
    }

    /// Write manifest of worktree, replacing any previous one.
    ///
    /// Duplicate targets collapse into one entry, last one wins. Returns the
    /// path written to.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::NoGitDir`] if worktree has no gitdir.
    /// - Return [`ManifestError::Serialize`] if manifest cannot be encoded.
    /// - Return [`ManifestError::Write`] if manifest cannot be persisted.
    #[instrument(skip(self, worktree, source_worktree, links), level = "debug")]
    pub fn write(
        &self,
        worktree: impl AsRef<Path>,
        source_worktree: impl AsRef<Path>,
        links: impl IntoIterator<Item = impl Into<LinkEntry>>,
    ) -> Result<PathBuf> {
        let worktree = worktree.as_ref();
        let manifest_path = self
            .manifest_path(worktree)
            .ok_or_else(|| ManifestError::NoGitDir {
                worktree: worktree.into(),
            })?;

        let mut manifest = Manifest {
            version: MANIFEST_VERSION.into(),
            worktree_path: absolutize(worktree).unwrap_or_else(|_| worktree.into()),
            source_worktree: absolutize(source_worktree.as_ref())
                .unwrap_or_else(|_| source_worktree.as_ref().into()),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            links: Vec::new(),
        };
        manifest.merge(links.into_iter().map(Into::<LinkEntry>::into));
        let data = serde_json::to_string_pretty(&manifest).map_err(ManifestError::Serialize)?;

        replace_file(&manifest_path, data.as_bytes()).map_err(|err| ManifestError::Write {
            source: err,
            manifest_path: manifest_path.clone(),
        })?;
        info!(
            "wrote {} links to {:?}",
            manifest.links.len(),
            manifest_path.display()
        );

        Ok(manifest_path)
    }

    /// Read manifest of worktree.
    ///
    /// Returns `None` if there is no gitdir, no manifest file, or the file is
    /// malformed. Callers treat all three the same.
    pub fn read(&self, worktree: impl AsRef<Path>) -> Option<Manifest> {
        let manifest_path = self.manifest_path(worktree)?;
        let data = match fs::read_to_string(&manifest_path) {
            Ok(data) => data,
            Err(err) => {
                debug!("cannot read {:?}: {err}", manifest_path.display());
                return None;
            }
        };

        match serde_json::from_str(&data) {
            Ok(manifest) => Some(manifest),
            Err(err) => {
                warn!("ignoring malformed manifest {:?}: {err}", manifest_path.display());
                None
            }
        }
    }

    /// Delete manifest of worktree.
    ///
    /// Returns whether a manifest file was actually removed.
    pub fn delete(&self, worktree: impl AsRef<Path>) -> bool {
        let Some(manifest_path) = self.manifest_path(worktree) else {
            return false;
        };

        match fs::remove_file(&manifest_path) {
            Ok(()) => {
                info!("removed manifest {:?}", manifest_path.display());
                true
            }
            Err(err) => {
                debug!("cannot remove {:?}: {err}", manifest_path.display());
                false
            }
        }
    }
}

fn replace_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;

    Ok(())
}

/// Manifest persistence error types.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Worktree has no gitdir to hold a manifest.
    #[error("no git directory found for {:?}", worktree.display())]
    NoGitDir { worktree: PathBuf },

    /// Manifest cannot be encoded.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Manifest cannot be written.
    #[error("failed to write manifest at {:?}", manifest_path.display())]
    Write {
        #[source]
        source: io::Error,
        manifest_path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = ManifestError> = std::result::Result<T, E>;
