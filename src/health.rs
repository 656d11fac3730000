//! Link health evaluation
//!
//! Classifies every registered link entry into one of five states by
//! inspecting the filesystem. Evaluation never mutates anything and a
//! failure on one entry is reported on that entry only.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::LinkMode;
use crate::fs::{read_regular, resolve_lenient, resolve_link_destination};
use crate::registry::LinkEntry;

/// Health of a single link entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// The target is the source: a correct symlink, or an identical
    /// copy for copy-mode entries
    Linked,
    /// The target is a dangling symlink or the source is gone
    Broken,
    /// Nothing exists at the target
    Unlinked,
    /// The target is a regular file or directory whose content differs
    Diverged,
    /// Something other than the expected link occupies the target
    Replaced,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkState::Linked => "linked",
            LinkState::Broken => "broken",
            LinkState::Unlinked => "unlinked",
            LinkState::Diverged => "diverged",
            LinkState::Replaced => "replaced",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The evaluated state of one link entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkHealth {
    #[serde(flatten)]
    pub entry: LinkEntry,
    pub state: LinkState,
    /// Human-readable explanation for non-linked states
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Filesystem error encountered while inspecting the entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl LinkHealth {
    fn new(entry: &LinkEntry, state: LinkState) -> Self {
        Self {
            entry: entry.clone(),
            state,
            message: None,
            err: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn with_err(mut self, err: impl fmt::Display) -> Self {
        self.err = Some(err.to_string());
        self
    }

    /// Message or error, whichever explains the state best
    pub fn reason(&self) -> Option<&str> {
        self.err.as_deref().or(self.message.as_deref())
    }
}

/// How the content at two paths compares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Comparison {
    Equal,
    Different,
    /// One side is a file, the other a directory
    KindMismatch,
}

pub(crate) const SPECIAL_FILE_MESSAGE: &str = "target is not a regular file or directory";

/// Evaluate one entry against the store at `store_root`.
pub fn check_link_health(entry: &LinkEntry, store_root: &Path) -> LinkHealth {
    let source = entry.source_path(store_root);
    let target = &entry.target;

    let meta = match fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return LinkHealth::new(entry, LinkState::Unlinked).with_message("target does not exist");
        }
        Err(e) => return LinkHealth::new(entry, LinkState::Unlinked).with_err(e),
    };

    let source_exists = source.exists();

    if meta.file_type().is_symlink() {
        let dest = match fs::read_link(target) {
            Ok(dest) => dest,
            Err(e) => return LinkHealth::new(entry, LinkState::Broken).with_err(e),
        };
        let resolved = resolve_lenient(&resolve_link_destination(target, &dest));

        if resolved == resolve_lenient(&source) {
            return if source_exists {
                LinkHealth::new(entry, LinkState::Linked)
            } else {
                LinkHealth::new(entry, LinkState::Broken).with_message("canonical source missing")
            };
        }
        if !target.exists() {
            return LinkHealth::new(entry, LinkState::Broken)
                .with_message(format!("dangling symlink to {}", dest.display()));
        }
        if !source_exists {
            return LinkHealth::new(entry, LinkState::Broken).with_message("canonical source missing");
        }
        return LinkHealth::new(entry, LinkState::Replaced)
            .with_message(format!("symlink points to {}", dest.display()));
    }

    if !meta.is_file() && !meta.is_dir() {
        return LinkHealth::new(entry, LinkState::Replaced).with_message(SPECIAL_FILE_MESSAGE);
    }

    if !source_exists {
        return LinkHealth::new(entry, LinkState::Replaced)
            .with_message("target exists but canonical source is missing");
    }

    match compare_content(&source, target) {
        Ok(Comparison::KindMismatch) => LinkHealth::new(entry, LinkState::Replaced)
            .with_message(kind_mismatch_message(&source)),
        Ok(Comparison::Equal) => match entry.mode {
            LinkMode::Copy => LinkHealth::new(entry, LinkState::Linked),
            LinkMode::Symlink => LinkHealth::new(entry, LinkState::Replaced)
                .with_message("standalone copy where a symlink is expected"),
        },
        Ok(Comparison::Different) => LinkHealth::new(entry, LinkState::Diverged)
            .with_message("content differs from the canonical source"),
        Err(e) => LinkHealth::new(entry, LinkState::Broken).with_err(e),
    }
}

/// Evaluate every entry, ordered by source then target.
pub fn evaluate_all(entries: &[LinkEntry], store_root: &Path) -> Vec<LinkHealth> {
    let mut health: Vec<_> = entries
        .iter()
        .map(|entry| check_link_health(entry, store_root))
        .collect();
    health.sort_by(|a, b| {
        (&a.entry.source, &a.entry.target).cmp(&(&b.entry.source, &b.entry.target))
    });
    health
}

pub(crate) fn kind_mismatch_message(source: &Path) -> &'static str {
    if source.is_dir() {
        "source is a directory but the target is a file"
    } else {
        "source is a file but the target is a directory"
    }
}

/// Compare the content at `a` and `b`, following symlinks at the top level.
pub(crate) fn compare_content(a: &Path, b: &Path) -> io::Result<Comparison> {
    let (meta_a, meta_b) = (fs::metadata(a)?, fs::metadata(b)?);
    match (meta_a.is_dir(), meta_b.is_dir()) {
        (false, false) => {
            if !meta_a.is_file() || !meta_b.is_file() {
                return Err(not_regular(if meta_a.is_file() { b } else { a }));
            }
            if meta_a.len() != meta_b.len() {
                return Ok(Comparison::Different);
            }
            Ok(equal_or_different(read_regular(a)? == read_regular(b)?))
        }
        (true, true) => compare_dirs(a, b),
        _ => Ok(Comparison::KindMismatch),
    }
}

fn equal_or_different(equal: bool) -> Comparison {
    if equal {
        Comparison::Equal
    } else {
        Comparison::Different
    }
}

fn compare_dirs(a: &Path, b: &Path) -> io::Result<Comparison> {
    let files_a = relative_entries(a)?;
    let files_b = relative_entries(b)?;
    if files_a != files_b {
        return Ok(Comparison::Different);
    }
    for (rel, is_dir) in &files_a {
        if *is_dir {
            continue;
        }
        let (pa, pb) = (a.join(rel), b.join(rel));
        let (la, lb) = (fs::symlink_metadata(&pa)?, fs::symlink_metadata(&pb)?);
        let same = if la.file_type().is_symlink() || lb.file_type().is_symlink() {
            la.file_type().is_symlink()
                && lb.file_type().is_symlink()
                && fs::read_link(&pa)? == fs::read_link(&pb)?
        } else {
            if !la.is_file() || !lb.is_file() {
                return Err(not_regular(if la.is_file() { &pb } else { &pa }));
            }
            la.len() == lb.len() && read_regular(&pa)? == read_regular(&pb)?
        };
        if !same {
            return Ok(Comparison::Different);
        }
    }
    Ok(Comparison::Equal)
}

fn not_regular(path: &Path) -> io::Error {
    io::Error::new(
        ErrorKind::InvalidInput,
        format!("{} is not a regular file or directory", path.display()),
    )
}

/// Relative paths under `root` paired with whether each is a directory.
pub(crate) fn relative_entries(root: &Path) -> io::Result<Vec<(PathBuf, bool)>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?
            .to_path_buf();
        out.push((rel, entry.file_type().is_dir()));
    }
    Ok(out)
}
