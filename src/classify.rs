// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Classification of untracked worktree files.
//!
//! A fresh worktree lacks every gitignored file of its source worktree. Some
//! of those files are shared configuration (credentials, env files, IDE
//! settings) that should be linked back to the source. Others are regenerable
//! artifacts (dependency directories, build output, caches) that must never
//! be linked, because every worktree has to build its own. Everything else is
//! left for the operator to decide.
//!
//! # Rule Precedence
//!
//! Two independent rule lists are consulted in a fixed order:
//!
//! 1. [`ALWAYS_LINK`] is checked first.
//! 2. [`ALWAYS_SKIP`] is checked second.
//!
//! The always-link list must win. Otherwise a directory-level skip rule like
//! `.env/` (a virtualenv some tools create) would swallow the `.env` file
//! rule. A path supplied with a trailing slash names a directory entry, and
//! is only matched by directory patterns. Thus `.env` links, while `.env/` is
//! skipped.
//!
//! # Matching
//!
//! Each pattern is tried three ways against a candidate path:
//!
//! 1. Glob match against the whole path, trailing slash removed.
//! 2. Glob match against the basename, for file patterns only.
//! 3. Containment for directory patterns (`dir/` or `dir/**`), where the path
//!    lives strictly inside `dir`, or is `dir/` itself.
//!
//! # See Also
//!
//! - [`rules`]

pub mod rules;

pub use rules::{ALWAYS_LINK, ALWAYS_SKIP, ASK_THRESHOLD_BYTES};

use crate::{
    classify::rules::{DATABASE_EXTENSIONS, SKIP_REASONS},
    config::ArboristConfig,
};

use glob::Pattern;
use serde::Serialize;
use std::{
    fs,
    path::Path,
    sync::LazyLock,
};
use tracing::{debug, instrument};

static DEFAULT_CLASSIFIER: LazyLock<Classifier> = LazyLock::new(Classifier::default);

/// Decision for a single path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Shared configuration, always linked.
    Symlink,

    /// Regenerable artifact, never linked.
    Skip,

    /// Operator must decide.
    #[default]
    Ambiguous,
}

/// Bucketed classification of a batch of paths.
///
/// Each bucket holds `(path, reason)` pairs in input order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub symlink: Vec<(String, String)>,
    pub skip: Vec<(String, String)>,
    pub ask: Vec<(String, String)>,
}

impl ClassificationResult {
    /// Total number of classified paths.
    pub fn len(&self) -> usize {
        self.symlink.len() + self.skip.len() + self.ask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Classify path with built-in rules.
pub fn classify(path: impl AsRef<str>) -> Classification {
    DEFAULT_CLASSIFIER.classify(path)
}

/// Categorize paths with built-in rules.
///
/// Sizes are checked relative to `base`.
pub fn categorize(
    paths: impl IntoIterator<Item = impl AsRef<str>>,
    base: impl AsRef<Path>,
) -> ClassificationResult {
    DEFAULT_CLASSIFIER.categorize(paths, base)
}

/// Check if path matches the built-in always-link list.
pub fn should_link(path: impl AsRef<str>) -> bool {
    DEFAULT_CLASSIFIER.should_link(path)
}

/// Check if path matches the built-in always-skip list.
pub fn should_skip(path: impl AsRef<str>) -> bool {
    DEFAULT_CLASSIFIER.should_skip(path)
}

/// Pattern classifier.
///
/// Holds the always-link and always-skip lists separately, plus the size
/// threshold above which otherwise unknown files are flagged as large.
#[derive(Debug, Clone)]
pub struct Classifier {
    link: RuleSet,
    skip: RuleSet,
    ask_threshold: u64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(RuleSet::builtin(ALWAYS_LINK), RuleSet::builtin(ALWAYS_SKIP))
    }
}

impl Classifier {
    /// Construct new classifier from explicit rule lists.
    pub fn new(link: RuleSet, skip: RuleSet) -> Self {
        Self {
            link,
            skip,
            ask_threshold: ASK_THRESHOLD_BYTES,
        }
    }

    /// Construct classifier from built-in rules extended by user
    /// configuration.
    ///
    /// Extra patterns are appended after the built-in ones of the same list.
    ///
    /// # Errors
    ///
    /// - Return [`ClassifyError::Pattern`] if an extra pattern is malformed.
    pub fn from_config(config: &ArboristConfig) -> Result<Self> {
        let mut link = RuleSet::builtin(ALWAYS_LINK);
        link.extend(&config.patterns.link)?;
        let mut skip = RuleSet::builtin(ALWAYS_SKIP);
        skip.extend(&config.patterns.skip)?;

        Ok(Self::new(link, skip).with_ask_threshold(config.settings.ask_threshold))
    }

    /// Set size threshold for large files.
    pub fn with_ask_threshold(mut self, bytes: u64) -> Self {
        self.ask_threshold = bytes;
        self
    }

    pub fn should_link(&self, path: impl AsRef<str>) -> bool {
        self.link.matches(path.as_ref())
    }

    pub fn should_skip(&self, path: impl AsRef<str>) -> bool {
        self.skip.matches(path.as_ref())
    }

    /// Classify a single path by pattern alone.
    pub fn classify(&self, path: impl AsRef<str>) -> Classification {
        let path = path.as_ref();

        // INVARIANT: Always-link wins over always-skip.
        if self.should_link(path) {
            Classification::Symlink
        } else if self.should_skip(path) {
            Classification::Skip
        } else {
            Classification::Ambiguous
        }
    }

    /// Bucket paths into link, skip, and ask categories.
    ///
    /// Paths that match neither rule list are always placed in the ask
    /// bucket. Their reason notes whether they are large, database files, or
    /// simply unknown.
    #[instrument(skip(self, paths, base), level = "debug")]
    pub fn categorize(
        &self,
        paths: impl IntoIterator<Item = impl AsRef<str>>,
        base: impl AsRef<Path>,
    ) -> ClassificationResult {
        let mut result = ClassificationResult::default();

        for path in paths {
            let path = path.as_ref();
            match self.classify(path) {
                Classification::Symlink => {
                    result.symlink.push((path.into(), "shared config".into()));
                }
                Classification::Skip => {
                    result.skip.push((path.into(), skip_reason(path).into()));
                }
                Classification::Ambiguous => {
                    let size = file_size(base.as_ref().join(path));
                    let reason = if size > self.ask_threshold {
                        format!("large file ({:.1}MB)", size as f64 / (1024.0 * 1024.0))
                    } else if DATABASE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
                        "database file".into()
                    } else {
                        "unknown pattern".into()
                    };
                    result.ask.push((path.into(), reason));
                }
            }
        }

        debug!(
            "categorized {} paths: {} link, {} skip, {} ask",
            result.len(),
            result.symlink.len(),
            result.skip.len(),
            result.ask.len()
        );

        result
    }
}

/// Ordered list of glob rules.
#[derive(Debug, Default, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile a rule list.
    ///
    /// # Errors
    ///
    /// - Return [`ClassifyError::Pattern`] if any pattern is malformed.
    pub fn new(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self> {
        let mut set = Self::default();
        set.extend(patterns)?;
        Ok(set)
    }

    /// Append patterns to the end of the list.
    ///
    /// # Errors
    ///
    /// - Return [`ClassifyError::Pattern`] if any pattern is malformed.
    pub fn extend(&mut self, patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Result<()> {
        for pattern in patterns {
            self.rules.push(Rule::new(pattern.as_ref())?);
        }

        Ok(())
    }

    /// Check if path matches any rule in the list.
    pub fn matches(&self, path: &str) -> bool {
        let candidate = Candidate::new(path);
        self.rules.iter().any(|rule| rule.matches(&candidate))
    }

    fn builtin(patterns: &[&str]) -> Self {
        // Built-in lists are covered by tests, so nothing is dropped here.
        let rules = patterns
            .iter()
            .filter_map(|pattern| Rule::new(pattern).ok())
            .collect();
        Self { rules }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    glob: Pattern,
    dir: Option<String>,
}

impl Rule {
    fn new(raw: &str) -> Result<Self> {
        let is_dir = raw.ends_with('/') || raw.ends_with("/**");
        let glob = Pattern::new(raw.trim_end_matches('/')).map_err(|err| ClassifyError::Pattern {
            source: err,
            pattern: raw.into(),
        })?;
        let dir = is_dir.then(|| raw.trim_end_matches(&['/', '*'][..]).to_owned());

        Ok(Self { glob, dir })
    }

    fn matches(&self, candidate: &Candidate<'_>) -> bool {
        match &self.dir {
            Some(dir) => {
                self.glob.matches(candidate.path)
                    || candidate
                        .path
                        .strip_prefix(dir.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
                    || (candidate.is_dir_entry && candidate.path == dir.as_str())
            }
            // INVARIANT: Directory entries are only matched by directory patterns.
            None if candidate.is_dir_entry => false,
            None => self.glob.matches(candidate.path) || self.glob.matches(candidate.basename),
        }
    }
}

struct Candidate<'a> {
    path: &'a str,
    basename: &'a str,
    is_dir_entry: bool,
}

impl<'a> Candidate<'a> {
    fn new(raw: &'a str) -> Self {
        let path = raw.trim_end_matches('/');
        let basename = path.rsplit('/').next().unwrap_or(path);

        Self {
            path,
            basename,
            is_dir_entry: raw.ends_with('/'),
        }
    }
}

fn skip_reason(path: &str) -> &'static str {
    SKIP_REASONS
        .iter()
        .find(|hint| {
            hint.contains.iter().any(|needle| path.contains(needle))
                || hint.ends_with.iter().any(|suffix| path.ends_with(suffix))
        })
        .map(|hint| hint.reason)
        .unwrap_or("regenerable artifact")
}

fn file_size(path: impl AsRef<Path>) -> u64 {
    fs::metadata(path.as_ref())
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .unwrap_or(0)
}

/// Classification error types.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// Pattern is not a valid glob.
    #[error("invalid pattern {pattern:?}")]
    Pattern {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },
}

/// Friendly result alias :3
type Result<T, E = ClassifyError> = std::result::Result<T, E>;
