//! Persisted agent registry and link table
//!
//! The registry is a small JSON document at the store root. It is loaded
//! explicitly at the start of an operation and saved only when something
//! changed; nothing is cached between calls.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::LinkMode;
use crate::error::{Error, Result};

/// Registry file name inside the store root
pub const REGISTRY_FILE_NAME: &str = ".registry.json";

/// A known agent product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique, stable key (e.g. `claude`)
    pub name: String,
    /// Executable name probed on PATH
    #[serde(default)]
    pub binary: Option<String>,
    /// Where the binary resolved during the last detection
    #[serde(default)]
    pub binary_path: Option<PathBuf>,
    /// Whether the binary was found during the last detection
    #[serde(default)]
    pub detected: bool,
    /// The agent's configuration directory
    #[serde(default)]
    pub config_dir: PathBuf,
}

/// A mapping from a store artifact to the place an agent expects it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Path relative to the store root
    pub source: PathBuf,
    /// Absolute path in the agent's configuration directory
    pub target: PathBuf,
    /// Which agent this entry serves
    pub agent: String,
    #[serde(default)]
    pub mode: LinkMode,
}

impl LinkEntry {
    /// Absolute source path under `store_root`
    pub fn source_path(&self, store_root: &Path) -> PathBuf {
        store_root.join(&self.source)
    }
}

/// The agent registry and link table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub links: Vec<LinkEntry>,
}

impl Registry {
    /// Path of the registry file for `store_root`
    pub fn path(store_root: &Path) -> PathBuf {
        store_root.join(REGISTRY_FILE_NAME)
    }

    /// Read the registry; a missing file reads as empty.
    pub fn load(store_root: &Path) -> Result<Self> {
        let path = Self::path(store_root);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::io(&path, e)),
        };

        let mut registry: Self = serde_json::from_str(&content).map_err(|e| Error::Registry {
            path: path.clone(),
            message: format!("failed to parse: {e}"),
        })?;
        registry.check_sources(&path)?;
        Ok(registry)
    }

    /// Every link source must stay under the store root.
    fn check_sources(&mut self, path: &Path) -> Result<()> {
        for entry in &mut self.links {
            let raw = entry.source.to_string_lossy().into_owned();
            entry.source =
                crate::fs::validate_store_relative(&raw).map_err(|e| Error::Registry {
                    path: path.to_path_buf(),
                    message: format!("link entry for {}: {e}", entry.target.display()),
                })?;
        }
        Ok(())
    }

    /// Write the registry atomically, in a stable order.
    pub fn save(&mut self, store_root: &Path) -> Result<()> {
        self.agents.sort_by(|a, b| a.name.cmp(&b.name));
        self.links
            .sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
        self.last_updated = Some(Utc::now().to_rfc3339());

        let path = Self::path(store_root);
        let mut body = serde_json::to_string_pretty(self).map_err(|e| Error::Registry {
            path: path.clone(),
            message: format!("failed to encode: {e}"),
        })?;
        body.push('\n');
        crate::fs::write_atomic(&path, body.as_bytes())
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// The entry managing `target`, if any
    pub fn link(&self, target: &Path) -> Option<&LinkEntry> {
        self.links.iter().find(|l| l.target == target)
    }

    /// Insert or replace an agent by name.
    pub fn upsert_agent(&mut self, agent: Agent) {
        match self.agents.iter_mut().find(|a| a.name == agent.name) {
            Some(existing) => *existing = agent,
            None => self.agents.push(agent),
        }
    }

    /// Insert or replace a link entry by target.
    pub fn upsert_link(&mut self, entry: LinkEntry) {
        match self.links.iter_mut().find(|l| l.target == entry.target) {
            Some(existing) => *existing = entry,
            None => self.links.push(entry),
        }
    }

    /// Remove the entry for `target`, returning it if present.
    pub fn remove_link(&mut self, target: &Path) -> Option<LinkEntry> {
        let idx = self.links.iter().position(|l| l.target == target)?;
        Some(self.links.remove(idx))
    }

    /// Entries belonging to `agent`, ordered by source path
    pub fn links_for(&self, agent: &str) -> Vec<LinkEntry> {
        let mut links: Vec<_> = self
            .links
            .iter()
            .filter(|l| l.agent == agent)
            .cloned()
            .collect();
        links.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
        links
    }

    /// Names of every agent mentioned by the registry
    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.links.iter().map(|l| l.agent.as_str()))
    }
}
