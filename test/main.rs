// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use git2::{IndexEntry, IndexTime, Repository, RepositoryInitOptions};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// Main worktree with one linked worktree beside it.
pub(crate) struct WorktreeFixture {
    _root: TempDir,
    repo: Repository,
    main: PathBuf,
    linked: PathBuf,
}

impl WorktreeFixture {
    pub(crate) fn new(gitignore: impl AsRef<str>) -> Result<Self> {
        let root = TempDir::new()?;
        let main = root.path().join("main");
        let linked = root.path().join("feature");

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(&main, &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        let fixture = Self {
            _root: root,
            repo,
            main,
            linked,
        };
        fixture.stage_and_commit(".gitignore", gitignore)?;
        fixture.repo.worktree("feature", &fixture.linked, None)?;

        Ok(fixture)
    }

    pub(crate) fn main(&self) -> &Path {
        &self.main
    }

    pub(crate) fn linked(&self) -> &Path {
        &self.linked
    }

    /// Write untracked file into main worktree.
    pub(crate) fn write(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<()> {
        let path = self.main.join(filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents.as_ref())?;

        Ok(())
    }

    pub(crate) fn stage_and_commit(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<()> {
        self.write(filename.as_ref(), contents.as_ref())?;

        let entry = IndexEntry {
            ctime: IndexTime::new(0, 0),
            mtime: IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            file_size: contents.as_ref().len() as u32,
            id: self.repo.blob(contents.as_ref().as_bytes())?,
            flags: 0,
            flags_extended: 0,
            path: filename.as_ref().to_string_lossy().as_bytes().to_vec(),
        };

        // INVARIANT: Index on disk must match tree so staged file is not reported as untracked.
        let mut index = self.repo.index()?;
        index.add_frombuffer(&entry, contents.as_ref().as_bytes())?;
        index.write()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Some(parent) = self.repo.head().ok().and_then(|head| head.target()) {
            parents.push(self.repo.find_commit(parent)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            format!("chore: add {:?}", filename.as_ref()).as_ref(),
            &tree,
            &parents,
        )?;

        Ok(())
    }
}
