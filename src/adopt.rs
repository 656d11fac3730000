//! Adopting existing agent configuration
//!
//! Imports what agents already keep in their configuration directories into
//! the store, then replaces the originals with links to the imported copy.
//! The first agent to supply a file wins; a later agent whose file differs is
//! reported as a conflict and left untouched.

use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::LinkMode;
use crate::error::Result;
use crate::fs::{read_regular, resolve_lenient, resolve_link_destination};
use crate::linker::{LinkOutcome, apply_entry};
use crate::registry::LinkEntry;
use crate::store::Store;
use crate::templates::STARTER_AGENTS_MD;

/// Options for adopting existing configuration
#[derive(Debug, Clone, Default)]
pub struct AdoptOptions {
    /// Restrict to one agent; `None` adopts from every detected agent
    pub agent: Option<String>,
    /// Report what would be imported without changing anything
    pub dry_run: bool,
    /// Import only; leave the originals in place
    pub copy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdoptKind {
    File,
    Directory,
}

/// What happened to one adoptable item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "kebab-case")]
pub enum AdoptStatus {
    /// Would be imported (dry run)
    Pending,
    Imported,
    /// The store already holds the same content
    AlreadyManaged,
    /// The store holds different content; nothing was imported
    Conflict(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdoptItem {
    pub agent: String,
    /// What was found in the agent's configuration directory
    pub original: PathBuf,
    /// Where the content lives in the store, relative to its root
    pub source: PathBuf,
    pub kind: AdoptKind,
    #[serde(flatten)]
    pub status: AdoptStatus,
    /// What linking did to the original
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkOutcome>,
}

impl AdoptItem {
    /// Whether the store now holds everything the original had
    fn is_covered(&self) -> bool {
        matches!(self.status, AdoptStatus::Imported | AdoptStatus::AlreadyManaged)
    }
}

/// Store-relative file paths claimed during this run, with their content.
///
/// Lets a dry run see what earlier items would have written.
type Claimed = HashMap<PathBuf, Vec<u8>>;

impl Store {
    /// Import agents' existing configuration into the store and link it back.
    pub fn adopt(&self, opts: &AdoptOptions) -> Result<Vec<AdoptItem>> {
        self.ensure_initialized()?;
        let _lock = self.lock()?;

        let config = self.config()?;
        let mut registry = self.registry()?;

        let agents = match &opts.agent {
            Some(input) => vec![self.resolve_agent(input, &config, &registry)?],
            None => {
                if registry.agents.is_empty() {
                    for agent in crate::detect::detect_agents(&config, self.search_path(), self.home()) {
                        registry.upsert_agent(agent);
                    }
                }
                let mut names: Vec<String> = registry
                    .agents
                    .iter()
                    .filter(|a| a.detected)
                    .filter(|a| config.agents.get(&a.name).is_some_and(|c| c.enabled))
                    .map(|a| a.name.clone())
                    .collect();
                names.sort();
                names
            }
        };

        let mut claimed = Claimed::new();
        let mut items = Vec::new();
        for agent in &agents {
            let Some(agent_config) = config.agents.get(agent) else {
                continue;
            };
            let config_dir = agent_config.config_dir_path(self.home());

            for (name, target) in &agent_config.targets {
                let source = match crate::fs::validate_store_relative(&target.source) {
                    Ok(source) => source,
                    Err(e) => {
                        tracing::warn!(agent = %agent, target_name = %name, error = %e, "Skipping target");
                        continue;
                    }
                };
                let original = target.destination_path(&config_dir, self.home());
                let Some(kind) = adoptable_kind(&original, self.dir()) else {
                    continue;
                };

                let status = match kind {
                    AdoptKind::File => self.adopt_file(&original, &source, opts.dry_run, &mut claimed),
                    AdoptKind::Directory => self.adopt_dir(&original, &source, opts.dry_run, &mut claimed),
                };
                let mut item = AdoptItem {
                    agent: agent.clone(),
                    original,
                    source,
                    kind,
                    status,
                    link: None,
                };

                if !opts.dry_run && !opts.copy && item.is_covered() {
                    let entry = LinkEntry {
                        source: item.source.clone(),
                        target: item.original.clone(),
                        agent: agent.clone(),
                        mode: LinkMode::Symlink,
                    };
                    registry.upsert_link(entry.clone());
                    item.link = Some(apply_entry(self.dir(), &entry, true));
                }

                match &item.status {
                    AdoptStatus::Conflict(reason) | AdoptStatus::Failed(reason) => {
                        tracing::warn!(path = %item.original.display(), reason = %reason, "Not adopted");
                    }
                    status => {
                        tracing::debug!(path = %item.original.display(), status = ?status, "Adopt processed");
                    }
                }
                items.push(item);
            }
        }

        if !opts.dry_run {
            registry.save(self.dir())?;
        }
        Ok(items)
    }

    fn adopt_file(&self, original: &Path, source: &Path, dry_run: bool, claimed: &mut Claimed) -> AdoptStatus {
        let store_path = self.dir().join(source);
        if store_path.is_dir() {
            return AdoptStatus::Conflict(format!("the store holds a directory at {}", source.display()));
        }

        let content = match read_regular(original) {
            Ok(content) => content,
            Err(e) => return AdoptStatus::Failed(e.to_string()),
        };
        let existing = match existing_content(self.dir(), source, claimed) {
            Ok(existing) => existing,
            Err(e) => return AdoptStatus::Failed(e.to_string()),
        };
        match existing {
            Some(existing) if existing == content => return AdoptStatus::AlreadyManaged,
            // The untouched starter file is not worth keeping.
            Some(existing) if existing == STARTER_AGENTS_MD.as_bytes() && !claimed.contains_key(source) => {}
            Some(_) => {
                return AdoptStatus::Conflict(format!("differs from {} in the store", source.display()));
            }
            None => {}
        }

        if !dry_run && let Err(e) = crate::fs::write_atomic(&store_path, &content) {
            return AdoptStatus::Failed(e.to_string());
        }
        claimed.insert(source.to_path_buf(), content);
        if dry_run {
            AdoptStatus::Pending
        } else {
            AdoptStatus::Imported
        }
    }

    fn adopt_dir(&self, original: &Path, source: &Path, dry_run: bool, claimed: &mut Claimed) -> AdoptStatus {
        let store_path = self.dir().join(source);
        if store_path.exists() && !store_path.is_dir() {
            return AdoptStatus::Conflict(format!("the store holds a file at {}", source.display()));
        }

        let files = match regular_files(original) {
            Ok(files) => files,
            Err(e) => return AdoptStatus::Conflict(e.to_string()),
        };

        let mut missing = Vec::new();
        let mut differing = Vec::new();
        for (rel, content) in files {
            let store_rel = source.join(&rel);
            match existing_content(self.dir(), &store_rel, claimed) {
                Ok(Some(existing)) if existing == content => {}
                Ok(Some(_)) => differing.push(rel),
                Ok(None) => missing.push((store_rel, content)),
                Err(e) => return AdoptStatus::Failed(e.to_string()),
            }
        }

        if let Some(first) = differing.first() {
            return AdoptStatus::Conflict(format!(
                "{} file(s) differ from the store, first {}",
                differing.len(),
                first.display()
            ));
        }
        if missing.is_empty() {
            return AdoptStatus::AlreadyManaged;
        }

        for (store_rel, content) in missing {
            if !dry_run && let Err(e) = crate::fs::write_atomic(&self.dir().join(&store_rel), &content) {
                return AdoptStatus::Failed(e.to_string());
            }
            claimed.insert(store_rel, content);
        }
        if dry_run {
            AdoptStatus::Pending
        } else {
            AdoptStatus::Imported
        }
    }
}

/// File or directory worth adopting at `path`; `None` when there is nothing
/// there, it is empty, or it already links into the store.
fn adoptable_kind(path: &Path, store_root: &Path) -> Option<AdoptKind> {
    let meta = fs::symlink_metadata(path).ok()?;
    if meta.file_type().is_symlink() {
        let dest = fs::read_link(path).ok()?;
        let resolved = resolve_lenient(&resolve_link_destination(path, &dest));
        if resolved.starts_with(resolve_lenient(store_root)) {
            return None;
        }
    }

    let meta = fs::metadata(path).ok()?;
    if meta.is_file() {
        Some(AdoptKind::File)
    } else if meta.is_dir() && crate::fs::dir_non_empty(path) {
        Some(AdoptKind::Directory)
    } else {
        None
    }
}

/// Content at `rel` under the store, preferring what this run already claimed.
fn existing_content(store_root: &Path, rel: &Path, claimed: &Claimed) -> io::Result<Option<Vec<u8>>> {
    if let Some(content) = claimed.get(rel) {
        return Ok(Some(content.clone()));
    }
    let path = store_root.join(rel);
    match fs::symlink_metadata(&path) {
        Ok(_) => read_regular(&path).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Every regular file under `root` with its content, keyed by relative path.
///
/// Anything else (symlinks, FIFOs, sockets) would be lost by replacing the
/// directory with a link, so it fails the whole directory.
fn regular_files(root: &Path) -> io::Result<Vec<(PathBuf, Vec<u8>)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
            .to_path_buf();
        if !file_type.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", rel.display()),
            ));
        }
        files.push((rel, fs::read(entry.path())?));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::registry::Registry;
    use std::ffi::OsString;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        store: Store,
    }

    impl Fixture {
        fn home(&self) -> PathBuf {
            self.temp.path().join("home")
        }

        fn write_home(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.home().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn store_file(&self, rel: &str) -> String {
            fs::read_to_string(self.store.dir().join(rel)).unwrap()
        }
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path().join("store"), temp.path().join("home"))
            .with_search_path(OsString::new());
        store.init().unwrap();
        Fixture { temp, store }
    }

    fn adopt(fx: &Fixture, agent: &str) -> Vec<AdoptItem> {
        fx.store
            .adopt(&AdoptOptions {
                agent: Some(agent.to_string()),
                ..AdoptOptions::default()
            })
            .unwrap()
    }

    fn is_symlink(path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
    }

    #[test]
    fn test_adopt_requires_init() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path().join("store"), temp.path().join("home"));
        assert!(matches!(
            store.adopt(&AdoptOptions::default()),
            Err(Error::NotInitialized(_))
        ));
    }

    #[test]
    fn test_nothing_to_adopt() {
        let fx = fixture();
        assert!(adopt(&fx, "claude").is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_adopt_replaces_starter_and_links() {
        let fx = fixture();
        let original = fx.write_home(".claude/CLAUDE.md", "# My rules\n");

        let items = adopt(&fx, "claude");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, AdoptStatus::Imported);
        assert_eq!(items[0].kind, AdoptKind::File);
        assert_eq!(items[0].link, Some(LinkOutcome::Overwritten));
        assert_eq!(fx.store_file("instructions/AGENTS.md"), "# My rules\n");
        assert!(is_symlink(&original));
        assert_eq!(fs::read_to_string(&original).unwrap(), "# My rules\n");
        assert!(fx.store.registry().unwrap().link(&original).is_some());
    }

    #[test]
    #[cfg(unix)]
    fn test_first_instructions_win_and_differing_duplicate_conflicts() {
        let fx = fixture();
        let claude = fx.write_home(".claude/CLAUDE.md", "# From claude\n");
        let gemini = fx.write_home(".gemini/GEMINI.md", "# From gemini\n");

        let first = adopt(&fx, "claude");
        assert_eq!(first[0].status, AdoptStatus::Imported);

        let second = adopt(&fx, "gemini");
        assert!(matches!(second[0].status, AdoptStatus::Conflict(_)));
        assert_eq!(second[0].link, None);

        assert_eq!(fx.store_file("instructions/AGENTS.md"), "# From claude\n");
        assert!(is_symlink(&claude));
        assert!(!is_symlink(&gemini));
        assert_eq!(fs::read_to_string(&gemini).unwrap(), "# From gemini\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_identical_duplicate_is_already_managed() {
        let fx = fixture();
        fx.write_home(".claude/CLAUDE.md", "# Shared\n");
        let codex = fx.write_home(".codex/AGENTS.md", "# Shared\n");
        adopt(&fx, "claude");

        let items = adopt(&fx, "codex");
        assert_eq!(items[0].status, AdoptStatus::AlreadyManaged);
        assert!(is_symlink(&codex));
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let fx = fixture();
        let original = fx.write_home(".claude/CLAUDE.md", "# Mine\n");
        fx.write_home(".claude/skills/pdf/SKILL.md", "skill\n");
        let registry_before = fs::read_to_string(Registry::path(fx.store.dir())).unwrap();

        let items = fx
            .store
            .adopt(&AdoptOptions {
                agent: Some("claude".into()),
                dry_run: true,
                copy: false,
            })
            .unwrap();

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.status == AdoptStatus::Pending));
        assert!(fx.store_file("instructions/AGENTS.md").starts_with("# Agent Instructions"));
        assert!(!fx.store.dir().join("skills/pdf").exists());
        assert_eq!(fs::read_to_string(&original).unwrap(), "# Mine\n");
        assert_eq!(
            fs::read_to_string(Registry::path(fx.store.dir())).unwrap(),
            registry_before
        );
    }

    #[test]
    fn test_copy_imports_without_linking() {
        let fx = fixture();
        let skills = fx.home().join(".codex/skills");
        fx.write_home(".codex/skills/lint/SKILL.md", "lint\n");

        let items = fx
            .store
            .adopt(&AdoptOptions {
                agent: Some("codex".into()),
                dry_run: false,
                copy: true,
            })
            .unwrap();

        assert_eq!(items[0].kind, AdoptKind::Directory);
        assert_eq!(items[0].status, AdoptStatus::Imported);
        assert_eq!(items[0].link, None);
        assert_eq!(fx.store_file("skills/lint/SKILL.md"), "lint\n");
        assert!(!is_symlink(&skills));
        assert!(fx.store.registry().unwrap().links.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_directory_merge_keeps_existing_store_files() {
        let fx = fixture();
        fs::create_dir_all(fx.store.dir().join("skills/pdf")).unwrap();
        fs::write(fx.store.dir().join("skills/pdf/SKILL.md"), "pdf\n").unwrap();
        let skills = fx.home().join(".claude/skills");
        fx.write_home(".claude/skills/pdf/SKILL.md", "pdf\n");
        fx.write_home(".claude/skills/lint/SKILL.md", "lint\n");

        let items = adopt(&fx, "claude");
        let item = items.iter().find(|i| i.source == Path::new("skills")).unwrap();

        assert_eq!(item.status, AdoptStatus::Imported);
        assert_eq!(fx.store_file("skills/lint/SKILL.md"), "lint\n");
        assert!(is_symlink(&skills));
        assert_eq!(fs::read_to_string(skills.join("pdf/SKILL.md")).unwrap(), "pdf\n");
    }

    #[test]
    fn test_directory_with_differing_file_conflicts() {
        let fx = fixture();
        fs::create_dir_all(fx.store.dir().join("skills/pdf")).unwrap();
        fs::write(fx.store.dir().join("skills/pdf/SKILL.md"), "store\n").unwrap();
        fx.write_home(".claude/skills/pdf/SKILL.md", "local\n");
        fx.write_home(".claude/skills/lint/SKILL.md", "lint\n");

        let items = adopt(&fx, "claude");
        let item = items.iter().find(|i| i.source == Path::new("skills")).unwrap();

        assert!(matches!(&item.status, AdoptStatus::Conflict(r) if r.contains("pdf")));
        assert!(!fx.store.dir().join("skills/lint").exists());
        assert!(fx.home().join(".claude/skills/lint/SKILL.md").is_file());
    }

    #[test]
    #[cfg(unix)]
    fn test_already_linked_targets_are_skipped() {
        let fx = fixture();
        fx.store
            .link(&crate::LinkOptions {
                agent: "claude".into(),
                ..crate::LinkOptions::default()
            })
            .unwrap();

        assert!(adopt(&fx, "claude").is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_adopt_without_agent_uses_detected_agents() {
        use std::os::unix::fs::PermissionsExt;
        let fx = fixture();
        let bin = fx.temp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let gemini = bin.join("gemini");
        fs::write(&gemini, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&gemini, fs::Permissions::from_mode(0o755)).unwrap();
        let store = fx.store.clone().with_search_path(bin.as_os_str());

        fx.write_home(".gemini/GEMINI.md", "# Gemini\n");
        fx.write_home(".claude/CLAUDE.md", "# Claude\n");

        let items = store.adopt(&AdoptOptions::default()).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].agent, "gemini");
        assert_eq!(fx.store_file("instructions/AGENTS.md"), "# Gemini\n");
        assert!(store.registry().unwrap().agent("gemini").unwrap().detected);
    }
}
