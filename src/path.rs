// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for files that Arborist links between
//! worktrees. All path math here is lexical. Symlinks are never resolved,
//! because the payload of a link must stay valid when both worktrees are moved
//! together as a unit.

use std::{
    io,
    path::{Component, Path, PathBuf},
};

/// Determine absolute path to Arborist's configuration directory.
///
/// Uses `$XDG_CONFIG_HOME/arborist` (or the platform equivalent). Does not
/// check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoConfigDir`] if configuration directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("arborist"))
        .ok_or(NoConfigDir)
}

/// Make path absolute against the current directory, and lexically normalize
/// it.
///
/// # Errors
///
/// - Return [`std::io::Error`] if current directory cannot be determined, or
///   the path is empty.
pub fn absolutize(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    std::path::absolute(path.as_ref()).map(|path| normalize(&path))
}

/// Lexically remove `.` and `..` components from a path.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => continue,
            // INVARIANT: Never pop past the root.
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    out
}

/// Join a worktree relative path onto its root, refusing to escape the root.
///
/// Returns `None` if `relative` is absolute, climbs out through `..`, or
/// names the root itself.
pub fn join_inside(root: impl AsRef<Path>, relative: impl AsRef<Path>) -> Option<PathBuf> {
    let root = normalize(root.as_ref());
    let joined = normalize(&root.join(relative));
    (joined != root && joined.starts_with(&root)).then_some(joined)
}

/// Relative path from the directory containing `target` to `source`.
///
/// This is the exact payload written into a symlink placed at `target`.
///
/// ```text
/// /dev/project/.env -> /dev/project-feature/.env  ==>  ../project/.env
/// ```
///
/// # Errors
///
/// - Return [`std::io::Error`] if either path cannot be made absolute.
pub fn relative_link_path(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
) -> io::Result<PathBuf> {
    let source = absolutize(source)?;
    let target = absolutize(target)?;
    let target_dir = target.parent().unwrap_or(Path::new("/"));

    let source_parts = source.components().collect::<Vec<_>>();
    let dir_parts = target_dir.components().collect::<Vec<_>>();
    let common = source_parts
        .iter()
        .zip(dir_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..dir_parts.len() {
        relative.push("..");
    }
    for part in &source_parts[common..] {
        relative.push(part.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }

    Ok(relative)
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoConfigDir;

/// Friendly result alias :3
pub type Result<T, E = NoConfigDir> = std::result::Result<T, E>;
