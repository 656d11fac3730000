//! Configuration parsing for agentstore
//!
//! Handles the TOML file at the store root that describes which agents
//! exist, where their configuration directories live, and which store
//! paths get linked into them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Configuration file name inside the store root
pub const CONFIG_FILE_NAME: &str = "agentstore.toml";

const CONFIG_HEADER: &str = r#"# agentstore configuration
#
# Each agent has:
#   - enabled:     whether `agentstore link --all` and `detect` consider it
#   - description: human-readable description
#   - binary:      executable looked up on PATH by `agentstore detect`
#   - config_dir:  the agent's configuration directory (~ expands to $HOME)
#   - targets:     store paths to link into config_dir
#
# Each target has:
#   - source:      path relative to the store root
#   - destination: path relative to config_dir (absolute and ~ paths allowed)
#   - type:        "symlink" (default) or "copy"

"#;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Agent configurations, keyed by agent name
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,
}

/// Configuration for a single AI agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Whether this agent is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Executable name probed on PATH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,

    /// The agent's configuration directory
    pub config_dir: String,

    /// Targets to link for this agent
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

fn default_true() -> bool {
    true
}

/// Configuration for a single link target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Source path (relative to the store root)
    pub source: String,

    /// Destination path (relative to the agent's config_dir)
    pub destination: String,

    /// How the target is materialized
    #[serde(rename = "type", default)]
    pub mode: LinkMode,
}

/// How a link entry is materialized at its target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkMode {
    /// A symbolic link pointing back into the store
    #[default]
    Symlink,
    /// A standalone copy of the store content
    Copy,
}

impl std::fmt::Display for LinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkMode::Symlink => write!(f, "symlink"),
            LinkMode::Copy => write!(f, "copy"),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

        let config: Config = toml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.validate(path)?;
        Ok(config)
    }

    /// Load the store's configuration, falling back to the built-in agents
    /// when the file does not exist.
    pub fn load_for_store(store_root: &Path) -> Result<Self> {
        let path = store_root.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::builtin())
        }
    }

    /// The agents supported out of the box.
    pub fn builtin() -> Self {
        let mut agents = BTreeMap::new();

        agents.insert(
            "claude".to_string(),
            AgentConfig::builtin(
                "Claude Code",
                "claude",
                "~/.claude",
                &[
                    ("instructions", "instructions/AGENTS.md", "CLAUDE.md"),
                    ("skills", "skills", "skills"),
                    ("commands", "commands", "commands"),
                    ("agents", "agents", "agents"),
                    ("settings", "settings/claude.json", "settings.json"),
                    ("mcp", "mcp/.mcp.json", ".mcp.json"),
                ],
            ),
        );
        agents.insert(
            "codex".to_string(),
            AgentConfig::builtin(
                "OpenAI Codex CLI",
                "codex",
                "~/.codex",
                &[
                    ("instructions", "instructions/AGENTS.md", "AGENTS.md"),
                    ("skills", "skills", "skills"),
                    ("settings", "settings/codex.json", "settings.json"),
                ],
            ),
        );
        agents.insert(
            "gemini".to_string(),
            AgentConfig::builtin(
                "Gemini CLI",
                "gemini",
                "~/.gemini",
                &[
                    ("instructions", "instructions/AGENTS.md", "GEMINI.md"),
                    ("skills", "skills", "skills"),
                    ("settings", "settings/gemini.json", "settings.json"),
                ],
            ),
        );
        agents.insert(
            "opencode".to_string(),
            AgentConfig::builtin(
                "OpenCode",
                "opencode",
                "~/.config/opencode",
                &[
                    ("instructions", "instructions/AGENTS.md", "AGENTS.md"),
                    ("skills", "skills", "skills"),
                    ("settings", "settings/opencode.json", "settings.json"),
                ],
            ),
        );

        Config { agents }
    }

    /// Render the configuration as the commented starter file.
    pub fn render(&self) -> Result<String> {
        let body = toml::to_string_pretty(self).map_err(|e| Error::Config {
            path: PathBuf::from(CONFIG_FILE_NAME),
            message: e.to_string(),
        })?;
        Ok(format!("{CONFIG_HEADER}{body}"))
    }

    /// Names of all configured agents, in sorted order
    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        for (agent_name, agent) in &self.agents {
            for (target_name, target) in &agent.targets {
                crate::fs::validate_store_relative(&target.source).map_err(|e| Error::Config {
                    path: path.to_path_buf(),
                    message: format!("agents.{agent_name}.targets.{target_name}: {e}"),
                })?;
            }
        }
        Ok(())
    }
}

impl AgentConfig {
    fn builtin(description: &str, binary: &str, config_dir: &str, targets: &[(&str, &str, &str)]) -> Self {
        Self {
            enabled: true,
            description: description.to_string(),
            binary: Some(binary.to_string()),
            config_dir: config_dir.to_string(),
            targets: targets
                .iter()
                .map(|(name, source, destination)| {
                    (
                        name.to_string(),
                        TargetConfig {
                            source: source.to_string(),
                            destination: destination.to_string(),
                            mode: LinkMode::Symlink,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Absolute configuration directory for this agent
    pub fn config_dir_path(&self, home: &Path) -> PathBuf {
        expand_path(&self.config_dir, home, home)
    }
}

impl TargetConfig {
    /// Absolute destination path for this target
    pub fn destination_path(&self, config_dir: &Path, home: &Path) -> PathBuf {
        expand_path(&self.destination, config_dir, home)
    }
}

/// Expand `~`, keep absolute paths, and join relative ones onto `base`.
pub fn expand_path(raw: &str, base: &Path, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return home.join(rest);
    }
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
