//! Agent detection
//!
//! An agent counts as detected when its binary resolves on the search path.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::config::{AgentConfig, Config};
use crate::fs::is_executable;
use crate::registry::Agent;

/// Find `binary` on `search_path` (a PATH-style list).
pub fn find_on_path(binary: &str, search_path: &OsStr) -> Option<PathBuf> {
    let candidate = Path::new(binary);
    if candidate.is_absolute() || binary.contains('/') || binary.contains('\\') {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    for dir in std::env::split_paths(search_path) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let full_path = dir.join(binary);
        if is_executable(&full_path) {
            return Some(full_path);
        }
        #[cfg(windows)]
        {
            for ext in ["exe", "cmd", "bat", "com"] {
                let with_ext = full_path.with_extension(ext);
                if is_executable(&with_ext) {
                    return Some(with_ext);
                }
            }
        }
    }
    None
}

/// Probe a single configured agent.
pub fn probe_agent(name: &str, agent: &AgentConfig, search_path: &OsStr, home: &Path) -> Agent {
    let binary_path = agent
        .binary
        .as_deref()
        .and_then(|binary| find_on_path(binary, search_path));

    tracing::debug!(
        agent = name,
        found = binary_path.is_some(),
        "Probed agent binary"
    );

    Agent {
        name: name.to_string(),
        binary: agent.binary.clone(),
        detected: binary_path.is_some(),
        binary_path,
        config_dir: agent.config_dir_path(home),
    }
}

/// Probe every enabled agent in `config`, in name order.
pub fn detect_agents(config: &Config, search_path: &OsStr, home: &Path) -> Vec<Agent> {
    config
        .agents
        .iter()
        .filter(|(_, agent)| agent.enabled)
        .map(|(name, agent)| probe_agent(name, agent, search_path, home))
        .collect()
}
