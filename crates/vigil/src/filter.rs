//! Ignore/only rule evaluation
//!
//! A `Filter` is an immutable snapshot of the current rule set. Mutating
//! operations build a fresh snapshot which the listener publishes
//! wholesale (`RwLock<Arc<Filter>>`), so the aggregation loop never
//! observes a partially-updated rule set.
//!
//! Three rule layers, in precedence order:
//! 1. `only` patterns — when set, a path is suppressed unless it matches
//!    at least one; ignore rules are not consulted.
//! 2. override patterns (`ignore_replace`) — when set, they replace both
//!    the built-in defaults and the cumulative ignores.
//! 3. built-in defaults + cumulative `ignore` patterns.

use crate::config::Config;
use crate::error::{Error, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Always-on ignore patterns, suppressed only by an override set.
///
/// Covers VCS bookkeeping, editor temp/swap files, OS junk and common
/// build directories.
const DEFAULT_IGNORES: &[&str] = &[
    // VCS bookkeeping
    ".git/",
    ".svn/",
    ".hg/",
    ".jj/",
    // Vim swap files
    "*.swp",
    "*.swo",
    "*.swn",
    "*.swm",
    // Vim/Emacs backup and lock files
    "*~",
    ".#*",
    "\\#*#",
    // OS junk
    ".DS_Store",
    "._*",
    "Thumbs.db",
    "desktop.ini",
    // Build output and vendored deps
    "node_modules/",
    "__pycache__/",
    "target/",
];

/// One immutable ignore/only rule snapshot.
#[derive(Debug)]
pub struct Filter {
    /// Cumulative user patterns; appended to, never deduplicated.
    ignore_patterns: Vec<String>,
    /// Wholesale replacement for defaults + cumulative ignores.
    override_patterns: Option<Vec<String>>,
    /// Allow-list; when set a path must match at least one entry.
    only_patterns: Option<Vec<String>>,

    ignore: Gitignore,
    ignore_override: Option<Gitignore>,
    only: Option<Gitignore>,
}

impl Filter {
    /// Build the initial snapshot from listener options.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::build(
            config.ignore.clone(),
            config.ignore_replace.clone(),
            config.only.clone(),
        )
    }

    fn build(
        ignore_patterns: Vec<String>,
        override_patterns: Option<Vec<String>>,
        only_patterns: Option<Vec<String>>,
    ) -> Result<Self> {
        let ignore = compile(
            DEFAULT_IGNORES
                .iter()
                .copied()
                .chain(ignore_patterns.iter().map(String::as_str)),
        )?;
        let ignore_override = override_patterns
            .as_ref()
            .map(|patterns| compile(patterns.iter().map(String::as_str)))
            .transpose()?;
        let only = only_patterns
            .as_ref()
            .map(|patterns| compile(patterns.iter().map(String::as_str)))
            .transpose()?;

        Ok(Self {
            ignore_patterns,
            override_patterns,
            only_patterns,
            ignore,
            ignore_override,
            only,
        })
    }

    /// Snapshot with `patterns` appended to the cumulative ignores.
    ///
    /// Does not touch the override or only sets; while an override is set
    /// it still takes precedence over the appended patterns.
    pub fn with_ignores<I, S>(&self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ignore_patterns = self.ignore_patterns.clone();
        ignore_patterns.extend(patterns.into_iter().map(Into::into));
        Self::build(
            ignore_patterns,
            self.override_patterns.clone(),
            self.only_patterns.clone(),
        )
    }

    /// Snapshot with the override set replaced wholesale.
    pub fn with_override<I, S>(&self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(
            self.ignore_patterns.clone(),
            Some(patterns.into_iter().map(Into::into).collect()),
            self.only_patterns.clone(),
        )
    }

    /// Snapshot with the only set replaced wholesale.
    pub fn with_only<I, S>(&self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(
            self.ignore_patterns.clone(),
            self.override_patterns.clone(),
            Some(patterns.into_iter().map(Into::into).collect()),
        )
    }

    /// Whether a path should be excluded from reporting.
    ///
    /// Pure predicate over this snapshot; `is_dir` is the coarse type
    /// label matched alongside the path string, per gitignore semantics.
    pub fn suppress(&self, path: &Path, is_dir: bool) -> bool {
        if let Some(only) = &self.only {
            return !only.matched_path_or_any_parents(path, is_dir).is_ignore();
        }
        if let Some(ignore_override) = &self.ignore_override {
            return ignore_override
                .matched_path_or_any_parents(path, is_dir)
                .is_ignore();
        }
        self.ignore
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }
}

fn compile<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Gitignore> {
    // Rooted at "/" so absolute event paths match patterns relative to any
    // watched directory.
    let mut builder = GitignoreBuilder::new("/");
    for line in lines {
        builder
            .add_line(None, line)
            .map_err(|e| Error::InvalidConfiguration(format!("invalid pattern {line:?}: {e}")))?;
    }
    builder
        .build()
        .map_err(|e| Error::InvalidConfiguration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> Filter {
        Filter::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn test_defaults_always_suppressed() {
        let filter = empty();

        assert!(filter.suppress(Path::new("/repo/.git/objects/ab/cd"), false));
        assert!(filter.suppress(Path::new("/repo/.DS_Store"), false));
        assert!(filter.suppress(Path::new("/repo/src/main.rs.swp"), false));
        assert!(filter.suppress(Path::new("/repo/notes.txt~"), false));
        assert!(filter.suppress(Path::new("/repo/#recover#"), false));
        assert!(filter.suppress(Path::new("/repo/node_modules/pkg/index.js"), false));

        assert!(!filter.suppress(Path::new("/repo/src/main.rs"), false));
        assert!(!filter.suppress(Path::new("/repo/README.md"), false));
    }

    #[test]
    fn test_ignore_appends() {
        let filter = empty().with_ignores(["*.log"]).unwrap();
        assert!(filter.suppress(Path::new("/repo/debug.log"), false));

        // Appending more patterns keeps the earlier ones active.
        let filter = filter.with_ignores(["*.tmp"]).unwrap();
        assert!(filter.suppress(Path::new("/repo/debug.log"), false));
        assert!(filter.suppress(Path::new("/repo/scratch.tmp"), false));
        assert!(!filter.suppress(Path::new("/repo/kept.txt"), false));
    }

    #[test]
    fn test_override_replaces_defaults_and_ignores() {
        let filter = empty()
            .with_ignores(["*.log"])
            .unwrap()
            .with_override(["*.bak"])
            .unwrap();

        assert!(filter.suppress(Path::new("/repo/old.bak"), false));
        // Defaults and cumulative ignores are disabled while overridden.
        assert!(!filter.suppress(Path::new("/repo/debug.log"), false));
        assert!(!filter.suppress(Path::new("/repo/.git/config"), false));
    }

    #[test]
    fn test_ignores_still_accumulate_under_override() {
        // addIgnore keeps appending while overridden; a later override
        // replacement decides what actually applies.
        let filter = empty()
            .with_override(["*.bak"])
            .unwrap()
            .with_ignores(["*.log"])
            .unwrap();
        assert!(!filter.suppress(Path::new("/repo/debug.log"), false));

        let filter = filter.with_override(Vec::<String>::new()).unwrap();
        assert!(!filter.suppress(Path::new("/repo/old.bak"), false));
    }

    #[test]
    fn test_only_takes_precedence() {
        let filter = empty()
            .with_ignores(["*.rs"])
            .unwrap()
            .with_only(["*.rs"])
            .unwrap();

        // Matches an only pattern: not suppressed, ignore rules unconsulted.
        assert!(!filter.suppress(Path::new("/repo/src/lib.rs"), false));
        // No only match: suppressed.
        assert!(filter.suppress(Path::new("/repo/README.md"), false));
    }

    #[test]
    fn test_directory_label_matters() {
        let filter = empty().with_ignores(["logs/"]).unwrap();
        assert!(filter.suppress(Path::new("/repo/logs"), true));
        assert!(filter.suppress(Path::new("/repo/logs/today.txt"), false));
        // A plain file named "logs" does not match a directory pattern.
        assert!(!filter.suppress(Path::new("/repo/other/logs"), false));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = empty().with_ignores(["["]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }
}
