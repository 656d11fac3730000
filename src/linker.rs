//! Symbolic link creation and management
//!
//! Materializes registered link entries in agent configuration directories
//! and takes them back out again. Each entry is processed independently; a
//! failure on one entry never stops the others.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, LinkMode};
use crate::detect::probe_agent;
use crate::error::{Error, Result};
use crate::health::{LinkState, check_link_health};
use crate::registry::{Agent, LinkEntry};
use crate::store::Store;

/// Options for linking one agent
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Agent name or alias
    pub agent: String,
    /// Replace whatever occupies a target
    pub force: bool,
    /// Materialize entries as copies instead of symlinks
    pub copy: bool,
}

/// Options for unlinking
#[derive(Debug, Clone, Default)]
pub struct UnlinkOptions {
    /// Restrict to one agent; `None` unlinks everything
    pub agent: Option<String>,
}

/// What happened to a single entry during `link`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "kebab-case")]
pub enum LinkOutcome {
    Created,
    AlreadyLinked,
    /// A dangling symlink was replaced
    Repaired,
    /// An occupied target was replaced because of `force`
    Overwritten,
    /// A correct symlink was swapped for a copy of its source
    Converted,
    /// The target is occupied and was left untouched
    Conflict(String),
    Failed(String),
}

impl LinkOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, LinkOutcome::Conflict(_) | LinkOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkAction {
    pub entry: LinkEntry,
    #[serde(flatten)]
    pub outcome: LinkOutcome,
}

/// Result of linking one agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub agent: String,
    pub actions: Vec<LinkAction>,
}

impl LinkReport {
    fn count(&self, pred: impl Fn(&LinkOutcome) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(&a.outcome)).count()
    }

    /// Entries now in place that were not before
    pub fn changed(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                LinkOutcome::Created
                    | LinkOutcome::Repaired
                    | LinkOutcome::Overwritten
                    | LinkOutcome::Converted
            )
        })
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| *o == LinkOutcome::AlreadyLinked)
    }

    pub fn conflicts(&self) -> usize {
        self.count(|o| matches!(o, LinkOutcome::Conflict(_)))
    }

    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, LinkOutcome::Failed(_)))
    }

    pub fn is_clean(&self) -> bool {
        self.actions.iter().all(|a| a.outcome.is_ok())
    }
}

/// What happened to a single entry during `unlink`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "kebab-case")]
pub enum UnlinkOutcome {
    /// The symlink was replaced with a standalone copy
    Materialized,
    /// The target was left as it is and only the entry was dropped
    Untracked,
    /// The entry stays registered
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlinkAction {
    pub entry: LinkEntry,
    #[serde(flatten)]
    pub outcome: UnlinkOutcome,
}

impl Store {
    /// Link every configured target of one agent.
    pub fn link(&self, opts: &LinkOptions) -> Result<LinkReport> {
        self.ensure_initialized()?;
        let _lock = self.lock()?;

        let config = self.config()?;
        let mut registry = self.registry()?;
        let agent = self.resolve_agent(&opts.agent, &config, &registry)?;

        if let Some(agent_config) = config.agents.get(&agent) {
            if registry.agent(&agent).is_none() {
                registry.upsert_agent(probe_agent(&agent, agent_config, self.search_path(), self.home()));
            }
            for mut entry in self.plan_entries(&config, &agent) {
                // A target once materialized as a copy stays a copy.
                if registry.link(&entry.target).is_some_and(|l| l.mode == LinkMode::Copy) {
                    entry.mode = LinkMode::Copy;
                }
                registry.upsert_link(entry);
            }
        }

        let mut report = LinkReport {
            agent: agent.clone(),
            actions: Vec::new(),
        };
        for mut entry in registry.links_for(&agent) {
            if opts.copy && entry.mode != LinkMode::Copy {
                entry.mode = LinkMode::Copy;
                registry.upsert_link(entry.clone());
            }
            let outcome = apply_entry(self.dir(), &entry, opts.force);
            match &outcome {
                LinkOutcome::Failed(reason) | LinkOutcome::Conflict(reason) => {
                    tracing::warn!(path = %entry.target.display(), reason = %reason, "Link not applied");
                }
                other => {
                    tracing::debug!(path = %entry.target.display(), outcome = ?other, "Link processed");
                }
            }
            report.actions.push(LinkAction { entry, outcome });
        }

        registry.save(self.dir())?;
        Ok(report)
    }

    /// Link every detected, enabled agent.
    pub fn link_detected(&self, force: bool, copy: bool) -> Result<Vec<LinkReport>> {
        self.ensure_initialized()?;
        let config = self.config()?;
        let registry = self.registry()?;

        let agents: Vec<String> = registry
            .agents
            .iter()
            .filter(|a| a.detected)
            .filter(|a| config.agents.get(&a.name).is_some_and(|c| c.enabled))
            .map(|a| a.name.clone())
            .collect();

        agents
            .into_iter()
            .map(|agent| self.link(&LinkOptions { agent, force, copy }))
            .collect()
    }

    /// Stop managing link entries, leaving usable files behind.
    pub fn unlink(&self, opts: &UnlinkOptions) -> Result<Vec<UnlinkAction>> {
        self.ensure_initialized()?;
        let _lock = self.lock()?;

        let config = self.config()?;
        let mut registry = self.registry()?;
        let entries = match &opts.agent {
            Some(input) => registry.links_for(&self.resolve_agent(input, &config, &registry)?),
            None => {
                let mut all = registry.links.clone();
                all.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
                all
            }
        };

        let mut actions = Vec::new();
        for entry in entries {
            let outcome = match materialize(self.dir(), &entry) {
                Ok(outcome) => {
                    registry.remove_link(&entry.target);
                    outcome
                }
                Err(e) => {
                    tracing::warn!(path = %entry.target.display(), error = %e, "Unlink failed");
                    UnlinkOutcome::Failed(e.to_string())
                }
            };
            actions.push(UnlinkAction { entry, outcome });
        }

        registry.save(self.dir())?;
        Ok(actions)
    }

    /// Add or replace the entry for `target`.
    pub fn register_link(&self, agent: &str, source: &str, target: &Path, mode: LinkMode) -> Result<LinkEntry> {
        self.ensure_initialized()?;
        let source = crate::fs::validate_store_relative(source)?;
        let _lock = self.lock()?;

        let config = self.config()?;
        let mut registry = self.registry()?;
        let agent = self.resolve_agent(agent, &config, &registry)?;
        let target = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.home().join(target)
        };

        let entry = LinkEntry {
            source,
            target,
            agent,
            mode,
        };
        registry.upsert_link(entry.clone());
        registry.save(self.dir())?;
        Ok(entry)
    }

    /// Remove the entry for `target`. Returns whether one existed.
    pub fn unregister_link(&self, target: &Path) -> Result<bool> {
        self.ensure_initialized()?;
        let _lock = self.lock()?;

        let mut registry = self.registry()?;
        let removed = registry.remove_link(target).is_some();
        if removed {
            registry.save(self.dir())?;
        }
        Ok(removed)
    }

    /// Probe every enabled agent and record the result.
    pub fn detect(&self) -> Result<Vec<Agent>> {
        self.ensure_initialized()?;
        let _lock = self.lock()?;

        let config = self.config()?;
        let mut registry = self.registry()?;
        let agents = crate::detect::detect_agents(&config, self.search_path(), self.home());
        for agent in &agents {
            registry.upsert_agent(agent.clone());
        }
        registry.save(self.dir())?;
        Ok(agents)
    }

    /// Entries for the agent's configured targets whose source has content.
    fn plan_entries(&self, config: &Config, agent: &str) -> Vec<LinkEntry> {
        let Some(agent_config) = config.agents.get(agent) else {
            return Vec::new();
        };
        let config_dir = agent_config.config_dir_path(self.home());

        let mut planned = Vec::new();
        for (name, target) in &agent_config.targets {
            let source = match crate::fs::validate_store_relative(&target.source) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!(agent, target_name = %name, error = %e, "Skipping target");
                    continue;
                }
            };
            let source_path = self.dir().join(&source);
            if !crate::fs::file_exists(&source_path) && !crate::fs::dir_non_empty(&source_path) {
                tracing::debug!(agent, target_name = %name, "Source has no content; not planned");
                continue;
            }
            planned.push(LinkEntry {
                source,
                target: target.destination_path(&config_dir, self.home()),
                agent: agent.to_string(),
                mode: target.mode,
            });
        }
        planned
    }
}

/// Bring one entry's target in line with its source.
pub(crate) fn apply_entry(store_root: &Path, entry: &LinkEntry, force: bool) -> LinkOutcome {
    let source = entry.source_path(store_root);
    if !source.exists() {
        return LinkOutcome::Failed(format!("canonical source missing: {}", source.display()));
    }

    let health = check_link_health(entry, store_root);
    let reason = || health.reason().unwrap_or("target occupied").to_string();

    let result = match health.state {
        LinkState::Linked if entry.mode == LinkMode::Copy && is_symlink(&entry.target) => {
            crate::fs::remove_path(&entry.target)
                .and_then(|()| materialize_link(entry, &source))
                .map(|()| LinkOutcome::Converted)
        }
        LinkState::Linked => return LinkOutcome::AlreadyLinked,
        LinkState::Unlinked => match &health.err {
            Some(err) => return LinkOutcome::Failed(err.clone()),
            None => materialize_link(entry, &source).map(|()| LinkOutcome::Created),
        },
        LinkState::Broken if is_symlink(&entry.target) => crate::fs::remove_path(&entry.target)
            .and_then(|()| materialize_link(entry, &source))
            .map(|()| LinkOutcome::Repaired),
        LinkState::Broken | LinkState::Diverged | LinkState::Replaced => {
            if !force {
                return LinkOutcome::Conflict(reason());
            }
            crate::fs::remove_path(&entry.target)
                .and_then(|()| materialize_link(entry, &source))
                .map(|()| LinkOutcome::Overwritten)
        }
    };

    result.unwrap_or_else(|e| LinkOutcome::Failed(e.to_string()))
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Create the target for `entry`; the target path must be free.
fn materialize_link(entry: &LinkEntry, source: &Path) -> Result<()> {
    let target = &entry.target;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    match entry.mode {
        LinkMode::Symlink => {
            let relative = crate::fs::relative_link_target(target, source);
            crate::fs::symlink(&relative, target, source.is_dir())
        }
        LinkMode::Copy => copy_content(source, target),
    }
}

fn copy_content(source: &Path, target: &Path) -> Result<()> {
    if source.is_dir() {
        crate::fs::copy_dir_all(source, target)
    } else {
        fs::copy(source, target).map_err(|e| Error::io(target, e))?;
        Ok(())
    }
}

/// Replace a symlinked target with a standalone copy of what it points at.
fn materialize(store_root: &Path, entry: &LinkEntry) -> Result<UnlinkOutcome> {
    let target = &entry.target;
    if !is_symlink(target) {
        return Ok(UnlinkOutcome::Untracked);
    }
    if !target.exists() {
        // Dangling: nothing worth keeping.
        crate::fs::remove_path(target)?;
        return Ok(UnlinkOutcome::Untracked);
    }

    let resolved = fs::canonicalize(target).map_err(|e| Error::io(target, e))?;
    let staging = staging_path(target);
    crate::fs::remove_path(&staging)?;
    let copied = copy_content(&resolved, &staging);
    if let Err(e) = copied {
        let _ = crate::fs::remove_path(&staging);
        return Err(e);
    }
    crate::fs::remove_path(target)?;
    fs::rename(&staging, target).map_err(|e| Error::io(target, e))?;

    tracing::debug!(
        path = %target.display(),
        source = %entry.source_path(store_root).display(),
        "Replaced symlink with copy"
    );
    Ok(UnlinkOutcome::Materialized)
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".agentstore-unlink");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
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
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path().join("store"), temp.path().join("home"))
            .with_search_path(OsString::new());
        store.init().unwrap();
        Fixture { temp, store }
    }

    fn opts(agent: &str) -> LinkOptions {
        LinkOptions {
            agent: agent.to_string(),
            ..LinkOptions::default()
        }
    }

    #[test]
    fn test_link_requires_init() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path().join("store"), temp.path().join("home"));
        assert!(matches!(
            store.link(&opts("claude")),
            Err(Error::NotInitialized(_))
        ));
    }

    #[test]
    fn test_link_unknown_agent() {
        let fx = fixture();
        assert!(matches!(
            fx.store.link(&opts("vim")),
            Err(Error::UnknownAgent(_))
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_link_plans_only_sources_with_content() {
        let fx = fixture();

        let report = fx.store.link(&opts("claude")).unwrap();

        // A fresh store only has instructions/AGENTS.md.
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].outcome, LinkOutcome::Created);
        let target = fx.home().join(".claude/CLAUDE.md");
        assert_eq!(report.actions[0].entry.target, target);
        let dest = fs::read_link(&target).unwrap();
        assert!(dest.is_relative());
        assert!(fs::read_to_string(&target).unwrap().starts_with("# Agent Instructions"));

        let registry = fx.store.registry().unwrap();
        assert!(registry.link(&target).is_some());
        assert!(registry.agent("claude").is_some());
    }

    #[test]
    #[cfg(unix)]
    fn test_link_is_idempotent() {
        let fx = fixture();
        fx.store.link(&opts("codex")).unwrap();

        let second = fx.store.link(&opts("codex-cli")).unwrap();
        assert_eq!(second.agent, "codex");
        assert_eq!(second.unchanged(), 1);
        assert_eq!(second.changed(), 0);
        assert!(second.is_clean());
    }

    #[test]
    #[cfg(unix)]
    fn test_conflict_without_force_then_overwrite() {
        let fx = fixture();
        let target = fx.home().join(".gemini/GEMINI.md");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "# Local\n").unwrap();

        let report = fx.store.link(&opts("gemini")).unwrap();
        assert_eq!(report.conflicts(), 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "# Local\n");

        let forced = fx
            .store
            .link(&LinkOptions {
                agent: "gemini".into(),
                force: true,
                copy: false,
            })
            .unwrap();
        assert_eq!(forced.actions[0].outcome, LinkOutcome::Overwritten);
        assert!(is_symlink(&target));
    }

    #[test]
    #[cfg(unix)]
    fn test_dangling_symlink_is_repaired_without_force() {
        let fx = fixture();
        let target = fx.home().join(".codex/AGENTS.md");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        crate::fs::symlink(Path::new("/nonexistent/AGENTS.md"), &target, false).unwrap();

        let report = fx.store.link(&opts("codex")).unwrap();
        assert_eq!(report.actions[0].outcome, LinkOutcome::Repaired);
        assert!(target.exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_one_failing_entry_does_not_stop_others() {
        let fx = fixture();
        fs::create_dir_all(fx.store.dir().join("skills/pdf")).unwrap();
        fs::write(fx.store.dir().join("skills/pdf/SKILL.md"), "x").unwrap();

        // A regular file where the agent directory should be makes every
        // target under it fail.
        let blocked = fx.temp.path().join("blocked");
        fs::write(&blocked, "file").unwrap();
        fx.store
            .register_link("claude", "skills", &blocked.join("skills"), LinkMode::Symlink)
            .unwrap();

        let report = fx.store.link(&opts("claude")).unwrap();
        assert_eq!(report.failures(), 1);
        assert_eq!(report.changed(), 2);
    }

    #[test]
    fn test_copy_mode_creates_standalone_copies() {
        let fx = fixture();
        let report = fx
            .store
            .link(&LinkOptions {
                agent: "opencode".into(),
                force: false,
                copy: true,
            })
            .unwrap();

        let target = fx.home().join(".config/opencode/AGENTS.md");
        assert_eq!(report.actions[0].outcome, LinkOutcome::Created);
        assert_eq!(report.actions[0].entry.mode, LinkMode::Copy);
        assert!(!is_symlink(&target));

        let again = fx.store.link(&opts("opencode")).unwrap();
        assert_eq!(again.actions[0].outcome, LinkOutcome::AlreadyLinked);
    }

    #[test]
    #[cfg(unix)]
    fn test_copy_flag_converts_existing_symlink() {
        let fx = fixture();
        fx.store.link(&opts("claude")).unwrap();
        let target = fx.home().join(".claude/CLAUDE.md");
        assert!(is_symlink(&target));

        let report = fx
            .store
            .link(&LinkOptions {
                agent: "claude".into(),
                force: false,
                copy: true,
            })
            .unwrap();

        assert_eq!(report.actions[0].outcome, LinkOutcome::Converted);
        assert_eq!(report.changed(), 1);
        assert!(!is_symlink(&target));
        assert!(fs::read_to_string(&target).unwrap().starts_with("# Agent Instructions"));
        let registry = fx.store.registry().unwrap();
        assert_eq!(registry.link(&target).unwrap().mode, LinkMode::Copy);

        let again = fx.store.link(&opts("claude")).unwrap();
        assert_eq!(again.actions[0].outcome, LinkOutcome::AlreadyLinked);
    }

    #[test]
    #[cfg(unix)]
    fn test_unlink_leaves_standalone_copies() {
        let fx = fixture();
        fx.store.link(&opts("claude")).unwrap();
        let target = fx.home().join(".claude/CLAUDE.md");

        let actions = fx
            .store
            .unlink(&UnlinkOptions {
                agent: Some("claude".into()),
            })
            .unwrap();

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].outcome, UnlinkOutcome::Materialized);
        assert!(!is_symlink(&target));
        assert!(fs::read_to_string(&target).unwrap().starts_with("# Agent Instructions"));
        assert!(fx.store.registry().unwrap().links.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_unlink_directory_symlink() {
        let fx = fixture();
        fs::create_dir_all(fx.store.dir().join("skills/pdf")).unwrap();
        fs::write(fx.store.dir().join("skills/pdf/SKILL.md"), "skill").unwrap();
        fx.store.link(&opts("codex")).unwrap();
        let target = fx.home().join(".codex/skills");
        assert!(is_symlink(&target));

        fx.store.unlink(&UnlinkOptions::default()).unwrap();

        assert!(target.is_dir());
        assert!(!is_symlink(&target));
        assert_eq!(
            fs::read_to_string(target.join("pdf/SKILL.md")).unwrap(),
            "skill"
        );
    }

    #[test]
    fn test_register_and_unregister_link() {
        let fx = fixture();
        let target = fx.home().join("custom/RULES.md");

        let entry = fx
            .store
            .register_link("claude", "rules", &target, LinkMode::Symlink)
            .unwrap();
        assert_eq!(entry.source, PathBuf::from("rules"));

        assert!(matches!(
            fx.store
                .register_link("claude", "../escape", &target, LinkMode::Symlink),
            Err(Error::UnsafePath { .. })
        ));

        assert!(fx.store.unregister_link(&target).unwrap());
        assert!(!fx.store.unregister_link(&target).unwrap());
    }

    #[test]
    #[cfg(unix)]
    fn test_detect_then_link_detected() {
        use std::os::unix::fs::PermissionsExt;
        let fx = fixture();
        let bin = fx.temp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let codex = bin.join("codex");
        fs::write(&codex, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&codex, fs::Permissions::from_mode(0o755)).unwrap();
        let store = fx.store.clone().with_search_path(bin.as_os_str());

        let agents = store.detect().unwrap();
        assert_eq!(agents.iter().filter(|a| a.detected).count(), 1);

        let reports = store.link_detected(false, false).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].agent, "codex");
        assert!(fx.home().join(".codex/AGENTS.md").exists());
    }
}
