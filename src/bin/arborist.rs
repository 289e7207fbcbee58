// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use arborist::{
    git::{self, Git2Resolver},
    link::create_link,
    path::absolutize,
    reconcile::{inspect, remove, status, EntryState},
    ArboristConfig, BatchResult, Classifier, LinkEntry, LinkRequest, LinkType, ManifestStore,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::MultiSelect;
use std::{
    env::current_dir,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "arborist [options] <arborist-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config = match self.config {
            Some(path) => ArboristConfig::load(path)?,
            None => ArboristConfig::load(ArboristConfig::default_path()?)?,
        };

        match self.command {
            Command::Status(opts) => run_status(opts),
            Command::List(opts) => run_list(opts),
            Command::Categorize(opts) => run_categorize(opts, &config),
            Command::Link(opts) => run_link(opts, &config),
            Command::Remove(opts) => run_remove(opts, &config),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show link status of a worktree.
    #[command(override_usage = "arborist status [options] [worktree]")]
    Status(StatusOptions),

    /// List gitignored files of a worktree.
    #[command(override_usage = "arborist list [repo]")]
    List(ListOptions),

    /// Classify gitignored files of a worktree as JSON.
    #[command(override_usage = "arborist categorize [repo]")]
    Categorize(ListOptions),

    /// Link configuration from source worktree into current worktree.
    #[command(override_usage = "arborist link [options] [<path>]...")]
    Link(LinkOptions),

    /// Remove all links recorded for a worktree.
    #[command(override_usage = "arborist remove [options] [worktree]")]
    Remove(RemoveOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct StatusOptions {
    /// Worktree to inspect, defaults to current directory.
    #[arg(value_name = "worktree")]
    pub worktree: Option<PathBuf>,

    /// Print status as JSON.
    #[arg(short, long)]
    pub json: bool,

    /// List state of every entry.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Repository to scan, defaults to current directory.
    #[arg(value_name = "repo")]
    pub repo: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct LinkOptions {
    /// Paths to link, relative to worktree root.
    #[arg(value_name = "path")]
    pub paths: Vec<String>,

    /// Paths to copy instead of link.
    #[arg(long, value_name = "path")]
    pub copy: Vec<String>,

    /// Source worktree, defaults to main worktree.
    #[arg(short, long, value_name = "dir")]
    pub source: Option<PathBuf>,

    /// Target worktree, defaults to current directory.
    #[arg(short, long, value_name = "dir")]
    pub worktree: Option<PathBuf>,

    /// Show what would be done without touching anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Accept always-link files only, never prompt.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Worktree to clean up, defaults to current directory.
    #[arg(value_name = "worktree")]
    pub worktree: Option<PathBuf>,

    /// Leave copied files in place.
    #[arg(short, long)]
    pub keep_copies: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_status(opts: StatusOptions) -> Result<()> {
    let worktree = worktree_or_cwd(opts.worktree)?;
    let store = ManifestStore::new(Git2Resolver);
    let result = status(&store, &worktree);

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.count == 0 {
        println!("no links recorded for {}", worktree.display());
        return Ok(());
    }

    println!(
        "{} links ({} symlinks, {} copies)",
        result.count, result.symlinks, result.copies
    );
    println!(
        "  valid: {}, broken: {}, missing: {}",
        result.valid, result.broken, result.missing
    );
    if let Some(source) = &result.source {
        println!("  source: {}", source.display());
    }

    if opts.verbose {
        for (entry, state) in inspect(&store, &worktree) {
            let state = match state {
                EntryState::Valid => "valid",
                EntryState::Broken => "broken",
                EntryState::Missing => "missing",
                EntryState::Replaced => "replaced",
            };
            println!(
                "  {state:<8} {:<8} {}",
                entry.kind.to_string(),
                entry.target.display()
            );
        }
    }

    Ok(())
}

fn run_list(opts: ListOptions) -> Result<()> {
    let repo = worktree_or_cwd(opts.repo)?;
    for file in git::ignored_files(&repo)? {
        println!("{file}");
    }

    Ok(())
}

fn run_categorize(opts: ListOptions, config: &ArboristConfig) -> Result<()> {
    let repo = git::worktree_root(worktree_or_cwd(opts.repo)?)?;
    let classifier = Classifier::from_config(config)?;
    let files = git::ignored_files(&repo)?;
    let result = classifier.categorize(&files, &repo);
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

fn run_link(opts: LinkOptions, config: &ArboristConfig) -> Result<()> {
    let worktree = git::worktree_root(worktree_or_cwd(opts.worktree)?)?;
    let source = match opts.source {
        Some(source) => absolutize(source)?,
        None => git::main_worktree(&worktree)?,
    };
    if source == worktree {
        bail!(
            "source and target are the same worktree: {}",
            worktree.display()
        );
    }

    let default_kind = config.settings.default_link_type;
    let mut requests = opts
        .paths
        .iter()
        .map(|path| LinkRequest::new(path.as_str(), default_kind))
        .chain(
            opts.copy
                .iter()
                .map(|path| LinkRequest::new(path.as_str(), LinkType::Copy)),
        )
        .collect::<Vec<_>>();
    if requests.is_empty() {
        requests = plan_links(&source, config, opts.yes)?;
    }

    if requests.is_empty() {
        info!("nothing to link from {}", source.display());
        return Ok(());
    }

    let result = link_with_progress(&source, &worktree, &requests, opts.dry_run)?;
    for record in &result.success {
        println!("{}", record.message);
    }
    for record in &result.failed {
        warn!("{}", record.message);
    }

    if opts.dry_run || result.success.is_empty() {
        return Ok(());
    }

    // INVARIANT: Keep earlier entries, and persist through one wholesale write.
    let store = ManifestStore::new(Git2Resolver);
    let existing = store
        .read(&worktree)
        .map(|manifest| manifest.links)
        .unwrap_or_default();
    let links = existing
        .into_iter()
        .chain(result.success.iter().map(LinkEntry::from))
        .collect::<Vec<_>>();
    let manifest_path = store.write(&worktree, &source, links)?;
    info!("manifest written to {}", manifest_path.display());

    Ok(())
}

fn run_remove(opts: RemoveOptions, config: &ArboristConfig) -> Result<()> {
    let worktree = worktree_or_cwd(opts.worktree)?;
    let store = ManifestStore::new(Git2Resolver);
    let remove_copies = config.settings.remove_copies && !opts.keep_copies;
    let result = remove(&store, &worktree, remove_copies);

    println!("removed {}, failed {}", result.removed, result.failed);
    for message in &result.errors {
        warn!("{message}");
    }

    Ok(())
}

fn worktree_or_cwd(path: Option<PathBuf>) -> Result<PathBuf> {
    Ok(match path {
        Some(path) => absolutize(path)?,
        None => current_dir()?,
    })
}

/// Pick files to link by classifying the source worktree's ignored files.
fn plan_links(source: &Path, config: &ArboristConfig, yes: bool) -> Result<Vec<LinkRequest>> {
    let classifier = Classifier::from_config(config)?;
    let files = git::ignored_files(source)?;
    let buckets = classifier.categorize(&files, source);
    if buckets.is_empty() {
        return Ok(Vec::new());
    }

    info!(
        "{} ignored files: {} shared, {} skipped, {} undecided",
        buckets.len(),
        buckets.symlink.len(),
        buckets.skip.len(),
        buckets.ask.len()
    );

    let mut requests = buckets
        .symlink
        .iter()
        .map(|(path, _)| LinkRequest::new(path.as_str(), LinkType::Symlink))
        .collect::<Vec<_>>();

    if yes || buckets.ask.is_empty() {
        return Ok(requests);
    }

    let options = buckets
        .ask
        .into_iter()
        .map(|(path, reason)| AskItem { path, reason })
        .collect::<Vec<_>>();
    let chosen = MultiSelect::new("Also share these files?", options)
        .with_help_message("space to toggle, enter to confirm")
        .prompt()?;
    if chosen.is_empty() {
        return Ok(requests);
    }

    let copies = MultiSelect::new("Copy instead of link?", chosen.clone())
        .with_help_message("unselected files are linked")
        .prompt()?;
    for item in chosen {
        let kind = if copies.contains(&item) {
            LinkType::Copy
        } else {
            config.settings.default_link_type
        };
        requests.push(LinkRequest::new(item.path, kind));
    }

    Ok(requests)
}

fn link_with_progress(
    source: &Path,
    worktree: &Path,
    requests: &[LinkRequest],
    dry_run: bool,
) -> Result<BatchResult> {
    let bar = ProgressBar::new(requests.len() as u64);
    let template = "{elapsed_precise:.green}  {msg:<40}  [{wide_bar:.yellow/blue}]";
    let style = ProgressStyle::with_template(template)?.progress_chars("-Cco.");
    bar.set_style(style);

    let mut result = BatchResult::default();
    for request in requests {
        bar.set_message(request.path.clone());
        result.record(create_link(source, worktree, request, dry_run));
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(result)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AskItem {
    path: String,
    reason: String,
}

impl Display for AskItem {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{} ({})", self.path, self.reason)
    }
}
