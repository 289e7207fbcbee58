// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Built-in rule lists.
//!
//! Patterns follow shell glob syntax where `*` also crosses `/`. A pattern
//! ending in `/` or `/**` is a __directory pattern__: it matches the contents
//! of the named directory, or the directory entry itself when the candidate
//! path carries a trailing slash.

/// Shared configuration that must always be linked.
///
/// Consulted before [`ALWAYS_SKIP`].
pub const ALWAYS_LINK: &[&str] = &[
    // Environment files.
    ".env",
    ".env.*",
    ".env.local",
    // Credentials.
    "credentials*.json",
    "serviceAccount*.json",
    "*.pem",
    "*.key",
    // Package manager configs.
    ".npmrc",
    ".yarnrc",
    ".yarnrc.yml",
    ".nvmrc",
    ".node-version",
    ".tool-versions",
    "pnpm-workspace.yaml",
    // IDE settings.
    ".vscode/",
    ".vscode/**",
    ".idea/",
    ".idea/**",
    // Project configuration.
    "config/",
    "config/**",
    "conf/",
    "conf/**",
    "*.local",
    "*.local.*",
    "settings.local.json",
    "appsettings.local.json",
];

/// Regenerable artifacts that must never be linked.
pub const ALWAYS_SKIP: &[&str] = &[
    // Node.js.
    "node_modules/",
    "node_modules/**",
    // PHP.
    "vendor/",
    "vendor/**",
    // Python.
    "__pycache__/",
    "__pycache__/**",
    "*.pyc",
    "*.pyo",
    ".venv/",
    ".venv/**",
    "venv/",
    "venv/**",
    "env/",
    "env/**",
    ".env/",
    "site-packages/",
    "site-packages/**",
    // iOS.
    "Pods/",
    "Pods/**",
    // Java and Kotlin.
    ".gradle/",
    ".gradle/**",
    // Rust and Java.
    "target/",
    "target/**",
    // Elixir.
    "deps/",
    "deps/**",
    "_build/",
    "_build/**",
    // Ruby.
    ".bundle/",
    ".bundle/**",
    // Legacy front end.
    "bower_components/",
    "bower_components/**",
    ".pnpm-store/",
    ".pnpm-store/**",
    // Build output.
    "dist/",
    "dist/**",
    "build/",
    "build/**",
    "out/",
    "out/**",
    "output/",
    "output/**",
    // Framework builds.
    ".next/",
    ".next/**",
    ".nuxt/",
    ".nuxt/**",
    ".svelte-kit/",
    ".svelte-kit/**",
    // Test coverage.
    "coverage/",
    "coverage/**",
    ".nyc_output/",
    ".nyc_output/**",
    // Bundled assets.
    "*.bundle.js",
    "*.min.js",
    "*.min.css",
    // Bundler caches.
    ".parcel-cache/",
    ".parcel-cache/**",
    ".turbo/",
    ".turbo/**",
    ".webpack/",
    ".webpack/**",
    // Caches.
    ".cache/",
    ".cache/**",
    "cache/",
    "cache/**",
    "caches/",
    "caches/**",
    // Temporary.
    "tmp/",
    "tmp/**",
    "temp/",
    "temp/**",
    ".tmp/",
    ".tmp/**",
    ".temp/",
    ".temp/**",
    // Logs.
    "*.log",
    "logs/",
    "logs/**",
    "*.log.*",
    // Linter caches.
    ".eslintcache",
    ".stylelintcache",
    ".prettiercache",
    // Editor swap files.
    "*.swp",
    "*.swo",
    "*~",
    // OS artifacts.
    ".DS_Store",
    "Thumbs.db",
    // Git internals.
    ".git/",
    ".git/**",
];

/// Hint explaining why a path was skipped.
pub(crate) struct SkipHint {
    pub(crate) contains: &'static [&'static str],
    pub(crate) ends_with: &'static [&'static str],
    pub(crate) reason: &'static str,
}

/// Hints used to explain why a path was skipped.
///
/// First matching hint wins. Purely cosmetic.
pub(crate) const SKIP_REASONS: &[SkipHint] = &[
    SkipHint {
        contains: &["node_modules"],
        ends_with: &[],
        reason: "npm install",
    },
    SkipHint {
        contains: &["vendor"],
        ends_with: &[],
        reason: "package manager install",
    },
    SkipHint {
        contains: &["__pycache__"],
        ends_with: &[".pyc", ".pyo"],
        reason: "Python cache (regenerates)",
    },
    SkipHint {
        contains: &["venv", ".venv", "env"],
        ends_with: &[],
        reason: "virtual environment",
    },
    SkipHint {
        contains: &["dist", "build", "out", "target"],
        ends_with: &[],
        reason: "build output",
    },
    SkipHint {
        contains: &[".next", ".nuxt", ".svelte-kit"],
        ends_with: &[],
        reason: "framework cache",
    },
    SkipHint {
        contains: &["coverage", ".nyc_output"],
        ends_with: &[],
        reason: "test coverage",
    },
    SkipHint {
        contains: &[".cache", "cache", "tmp", "temp"],
        ends_with: &[],
        reason: "cache/temp files",
    },
    SkipHint {
        contains: &["logs"],
        ends_with: &[".log"],
        reason: "log files",
    },
];

/// Extensions of local database files.
pub(crate) const DATABASE_EXTENSIONS: &[&str] = &[".sqlite", ".db", ".sqlite3"];

/// Files above this size are always left for the operator to decide.
pub const ASK_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;
