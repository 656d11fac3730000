//! Diff engine
//!
//! Produces unified diffs between canonical sources and what actually sits
//! at each link target. Only diverged and replaced entries carry a body.

use serde::Serialize;
use similar::TextDiff;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fs::read_regular;
use crate::health::{self, LinkHealth, LinkState};
use crate::registry::LinkEntry;
use crate::store::Store;

const CONTEXT_LINES: usize = 3;
const DEV_NULL: &str = "/dev/null";

/// Which entries to diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Restrict to one agent; `None` diffs every entry
    pub agent: Option<String>,
}

/// Diff body for entries whose target content can be compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffBody {
    /// Unified diff lines, without trailing newlines
    Lines(Vec<String>),
    /// Why no textual diff could be produced
    Unavailable(String),
}

/// Per-entry diff outcome; only comparable states carry a body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LinkDiff {
    Linked,
    Broken { reason: String },
    Unlinked { reason: String },
    Diverged { body: DiffBody },
    Replaced { body: DiffBody },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub link: LinkEntry,
    #[serde(flatten)]
    pub diff: LinkDiff,
}

impl DiffEntry {
    pub fn state(&self) -> LinkState {
        match self.diff {
            LinkDiff::Linked => LinkState::Linked,
            LinkDiff::Broken { .. } => LinkState::Broken,
            LinkDiff::Unlinked { .. } => LinkState::Unlinked,
            LinkDiff::Diverged { .. } => LinkState::Diverged,
            LinkDiff::Replaced { .. } => LinkState::Replaced,
        }
    }

    /// Unified diff lines; empty for states without a textual diff
    pub fn lines(&self) -> &[String] {
        match &self.diff {
            LinkDiff::Diverged {
                body: DiffBody::Lines(lines),
            }
            | LinkDiff::Replaced {
                body: DiffBody::Lines(lines),
            } => lines.as_slice(),
            _ => &[],
        }
    }

    /// Explanation when there are no lines to show
    pub fn note(&self) -> Option<&str> {
        match &self.diff {
            LinkDiff::Linked => None,
            LinkDiff::Broken { reason } | LinkDiff::Unlinked { reason } => Some(reason.as_str()),
            LinkDiff::Diverged { body } | LinkDiff::Replaced { body } => match body {
                DiffBody::Lines(_) => None,
                DiffBody::Unavailable(note) => Some(note.as_str()),
            },
        }
    }
}

/// Turn an evaluated entry into its diff.
pub fn diff_entry(health: LinkHealth, store_root: &Path) -> DiffEntry {
    let reason = health
        .reason()
        .map(str::to_string)
        .unwrap_or_else(|| default_reason(health.state).to_string());
    let source = health.entry.source_path(store_root);

    let diff = match health.state {
        LinkState::Linked => LinkDiff::Linked,
        LinkState::Broken => LinkDiff::Broken { reason },
        LinkState::Unlinked => LinkDiff::Unlinked { reason },
        LinkState::Diverged => LinkDiff::Diverged {
            body: diff_paths(&source, &health.entry.target),
        },
        LinkState::Replaced => LinkDiff::Replaced {
            body: diff_paths(&source, &health.entry.target),
        },
    };

    DiffEntry {
        link: health.entry,
        diff,
    }
}

fn default_reason(state: LinkState) -> &'static str {
    match state {
        LinkState::Broken => "symlink broken or canonical source missing",
        LinkState::Unlinked => "target does not exist",
        _ => "",
    }
}

/// Diff whatever lives at `source` against whatever lives at `target`.
pub fn diff_paths(source: &Path, target: &Path) -> DiffBody {
    let (source_meta, target_meta) = match (fs::metadata(source), fs::metadata(target)) {
        (Ok(s), Ok(t)) => (s, t),
        (Err(e), _) => return DiffBody::Unavailable(format!("cannot read source: {e}")),
        (_, Err(e)) => return DiffBody::Unavailable(format!("cannot read target: {e}")),
    };

    if !target_meta.is_file() && !target_meta.is_dir() {
        return DiffBody::Unavailable(health::SPECIAL_FILE_MESSAGE.to_string());
    }
    if !source_meta.is_file() && !source_meta.is_dir() {
        return DiffBody::Unavailable("source is not a regular file or directory".to_string());
    }

    match (source_meta.is_dir(), target_meta.is_dir()) {
        (false, false) => diff_files(source, target),
        (true, true) => diff_dirs(source, target),
        _ => DiffBody::Unavailable(health::kind_mismatch_message(source).to_string()),
    }
}

fn diff_files(source: &Path, target: &Path) -> DiffBody {
    let old = match read_regular(source) {
        Ok(bytes) => bytes,
        Err(e) => return DiffBody::Unavailable(format!("cannot read source: {e}")),
    };
    let new = match read_regular(target) {
        Ok(bytes) => bytes,
        Err(e) => return DiffBody::Unavailable(format!("cannot read target: {e}")),
    };
    match (as_text(&old), as_text(&new)) {
        (Some(old), Some(new)) => DiffBody::Lines(unified_diff(
            old,
            new,
            &source.display().to_string(),
            &target.display().to_string(),
        )),
        _ => DiffBody::Unavailable(format!("binary content differs: {}", target.display())),
    }
}

fn diff_dirs(source: &Path, target: &Path) -> DiffBody {
    let files = |root: &Path| -> std::io::Result<BTreeSet<PathBuf>> {
        Ok(health::relative_entries(root)?
            .into_iter()
            .filter(|(_, is_dir)| !is_dir)
            .map(|(rel, _)| rel)
            .collect())
    };
    let (source_files, target_files) = match (files(source), files(target)) {
        (Ok(s), Ok(t)) => (s, t),
        (Err(e), _) => return DiffBody::Unavailable(format!("cannot read source: {e}")),
        (_, Err(e)) => return DiffBody::Unavailable(format!("cannot read target: {e}")),
    };

    let mut lines = Vec::new();
    for rel in source_files.union(&target_files) {
        let (a, b) = (source.join(rel), target.join(rel));
        let a_label = if source_files.contains(rel) {
            a.display().to_string()
        } else {
            DEV_NULL.to_string()
        };
        let b_label = if target_files.contains(rel) {
            b.display().to_string()
        } else {
            DEV_NULL.to_string()
        };
        let old = read_or_empty(&a, source_files.contains(rel));
        let new = read_or_empty(&b, target_files.contains(rel));
        let (old, new) = match (old, new) {
            (Ok(old), Ok(new)) => (old, new),
            (Err(e), _) | (_, Err(e)) => {
                lines.push(format!("cannot read {}: {e}", rel.display()));
                continue;
            }
        };
        if old == new {
            continue;
        }
        match (as_text(&old), as_text(&new)) {
            (Some(old), Some(new)) => lines.extend(unified_diff(old, new, &a_label, &b_label)),
            _ => lines.push(format!("Binary files {a_label} and {b_label} differ")),
        }
    }
    DiffBody::Lines(lines)
}

fn read_or_empty(path: &Path, present: bool) -> std::io::Result<Vec<u8>> {
    if present { read_regular(path) } else { Ok(Vec::new()) }
}

/// Text when the bytes are valid UTF-8 without NUL bytes.
fn as_text(bytes: &[u8]) -> Option<&str> {
    if bytes.contains(&0) {
        return None;
    }
    std::str::from_utf8(bytes).ok()
}

/// Unified diff of `old` against `new`; empty when they are equal.
pub fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> Vec<String> {
    if old == new {
        return Vec::new();
    }
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(old_label, new_label)
        .to_string()
        .lines()
        .map(str::to_string)
        .collect()
}

impl Store {
    /// Diff every registered entry, or one agent's entries. Read-only.
    pub fn diff(&self, opts: &DiffOptions) -> Result<Vec<DiffEntry>> {
        self.ensure_initialized()?;
        let registry = self.registry()?;

        let entries = match &opts.agent {
            Some(input) => {
                let agent = self.resolve_agent(input, &self.config()?, &registry)?;
                registry.links_for(&agent)
            }
            None => registry.links.clone(),
        };

        Ok(health::evaluate_all(&entries, self.dir())
            .into_iter()
            .map(|h| diff_entry(h, self.dir()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkMode;
    use tempfile::TempDir;

    #[test]
    fn test_unified_diff_shape() {
        let lines = unified_diff("a\nb\nc\n", "a\nB\nc\n", "src", "dst");
        assert_eq!(lines[0], "--- src");
        assert_eq!(lines[1], "+++ dst");
        assert!(lines[2].starts_with("@@"));
        assert!(lines.contains(&"-b".to_string()));
        assert!(lines.contains(&"+B".to_string()));
    }

    #[test]
    fn test_unified_diff_equal_is_empty() {
        assert!(unified_diff("same\n", "same\n", "a", "b").is_empty());
    }

    #[test]
    fn test_unified_diff_context_radius() {
        let old: String = (1..=20).map(|i| format!("{i}\n")).collect();
        let new = old.replace("10\n", "ten\n");
        let lines = unified_diff(&old, &new, "a", "b");
        assert!(lines.contains(&" 7".to_string()));
        assert!(!lines.contains(&" 6".to_string()));
    }

    #[test]
    fn test_diff_paths_binary() {
        let temp = TempDir::new().unwrap();
        let (a, b) = (temp.path().join("a"), temp.path().join("b"));
        fs::write(&a, [0u8, 1, 2]).unwrap();
        fs::write(&b, [0u8, 1, 3]).unwrap();
        assert!(matches!(diff_paths(&a, &b), DiffBody::Unavailable(_)));
    }

    #[test]
    fn test_diff_paths_directories_union() {
        let temp = TempDir::new().unwrap();
        let (a, b) = (temp.path().join("a"), temp.path().join("b"));
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("only-source.md"), "gone\n").unwrap();
        fs::write(b.join("only-target.md"), "new\n").unwrap();
        fs::write(a.join("same.md"), "same\n").unwrap();
        fs::write(b.join("same.md"), "same\n").unwrap();

        let DiffBody::Lines(lines) = diff_paths(&a, &b) else {
            panic!("expected lines");
        };
        assert!(lines.contains(&"+++ /dev/null".to_string()));
        assert!(lines.contains(&"--- /dev/null".to_string()));
        assert!(lines.contains(&"-gone".to_string()));
        assert!(lines.contains(&"+new".to_string()));
        assert!(!lines.iter().any(|l| l.contains("same.md")));
    }

    #[test]
    fn test_diff_paths_kind_mismatch() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("dir");
        fs::create_dir_all(&dir).unwrap();
        let file = temp.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(matches!(diff_paths(&dir, &file), DiffBody::Unavailable(_)));
    }

    #[test]
    fn test_store_diff_reports_diverged_lines() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path().join("store"), temp.path().join("home"))
            .with_search_path(std::ffi::OsString::new());
        store.init().unwrap();
        let target = temp.path().join("home/.claude/CLAUDE.md");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "# Something else\n").unwrap();
        store
            .register_link("claude", "instructions/AGENTS.md", &target, LinkMode::Symlink)
            .unwrap();

        let entries = store.diff(&DiffOptions::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].state(), LinkState::Diverged);
        let lines = entries[0].lines();
        assert!(lines.iter().any(|l| l.starts_with('-')));
        assert!(lines.iter().any(|l| l.starts_with('+')));
        assert!(lines.iter().any(|l| l.starts_with("@@")));
    }

    #[cfg(unix)]
    fn mkfifo(path: &Path) {
        let status = std::process::Command::new("mkfifo").arg(path).status().unwrap();
        assert!(status.success());
    }

    #[test]
    #[cfg(unix)]
    fn test_diff_paths_never_opens_a_fifo() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("AGENTS.md");
        fs::write(&source, "").unwrap();
        let fifo = temp.path().join("CLAUDE.md");
        mkfifo(&fifo);

        assert_eq!(
            diff_paths(&source, &fifo),
            DiffBody::Unavailable("target is not a regular file or directory".to_string())
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_diff_dirs_skips_special_files() {
        let temp = TempDir::new().unwrap();
        let (a, b) = (temp.path().join("a"), temp.path().join("b"));
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("pipe"), "text\n").unwrap();
        mkfifo(&b.join("pipe"));

        let DiffBody::Lines(lines) = diff_paths(&a, &b) else {
            panic!("expected lines");
        };
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("cannot read pipe"));
    }

    #[test]
    #[cfg(unix)]
    fn test_store_diff_with_fifo_target_returns() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path().join("store"), temp.path().join("home"))
            .with_search_path(std::ffi::OsString::new());
        store.init().unwrap();
        let target = temp.path().join("home/.claude/CLAUDE.md");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        mkfifo(&target);
        store
            .register_link("claude", "instructions/AGENTS.md", &target, LinkMode::Symlink)
            .unwrap();

        let entries = store.diff(&DiffOptions::default()).unwrap();
        assert_eq!(entries[0].state(), LinkState::Replaced);
        assert!(entries[0].lines().is_empty());
        assert_eq!(
            entries[0].note(),
            Some("target is not a regular file or directory")
        );
    }

    #[test]
    fn test_store_diff_unknown_agent() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path().join("store"), temp.path().join("home"));
        store.init().unwrap();
        let err = store
            .diff(&DiffOptions {
                agent: Some("nope".into()),
            })
            .unwrap_err();
        assert!(matches!(err, crate::Error::UnknownAgent(_)));
    }
}
