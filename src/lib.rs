// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Share gitignored configuration between Git worktrees.
//!
//! A freshly created worktree lacks every gitignored file of the checkout it
//! came from: env files, credentials, IDE settings, local databases. Arborist
//! classifies those files, links (or copies) the ones worth sharing back to
//! the source worktree, and records what it did in a __manifest__ so the links
//! can later be audited or torn down.
//!
//! # Flow
//!
//! 1. Enumerate ignored files of the source worktree ([`git::ignored_files`]).
//! 2. Bucket them into link, skip, and ask ([`classify`]).
//! 3. Create the accepted links ([`link::create_links`]).
//! 4. Persist the outcome ([`manifest::ManifestStore::write`]).
//! 5. Later, check or tear down ([`reconcile::status`], [`reconcile::remove`]).
//!
//! # Concurrency
//!
//! Everything is synchronous, and nothing is locked. Two invocations against
//! the same worktree may race on the manifest's read-modify-write. Each write
//! is a single atomic rename, so the file is never torn, but one invocation's
//! entries can be lost.

pub mod classify;
pub mod config;
pub mod git;
pub mod link;
pub mod manifest;
pub mod path;
pub mod reconcile;

pub use classify::{categorize, classify, Classification, ClassificationResult, Classifier};
pub use config::ArboristConfig;
pub use git::{Git2Resolver, GitDirResolver};
pub use link::{create_links, BatchResult, LinkRecord, LinkRequest, LinkType};
pub use manifest::{LinkEntry, Manifest, ManifestStore};
pub use reconcile::{remove, status, LinkStatus, RemovalReport};
