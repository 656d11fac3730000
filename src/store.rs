//! The canonical agent store
//!
//! [`Store`] resolves where the store lives and owns every operation on it.
//! Environment lookups happen once, in [`Store::locate`]; everything else
//! works on the paths it was constructed with.

use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE_NAME, Config};
use crate::error::{Error, Result};
use crate::inventory::Category;
use crate::registry::{REGISTRY_FILE_NAME, Registry};
use crate::templates;
use crate::vcs;

/// Environment variable overriding the store location
pub const STORE_DIR_ENV: &str = "AGENTSTORE_DIR";

const LOCK_FILE_NAME: &str = ".lock";

/// Directories created under the store root besides the content categories
const EXTRA_DIRS: &[&str] = &["mcp"];

/// Handle on the canonical store
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    home: PathBuf,
    search_path: OsString,
}

/// What `init` created. Empty when the store was already complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub root: PathBuf,
    /// Paths created, relative to the root
    pub created: Vec<PathBuf>,
}

impl InitReport {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
    }
}

/// Exclusive advisory lock held by writers; released on drop.
#[derive(Debug)]
pub(crate) struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl Store {
    /// Resolve the store from the environment.
    ///
    /// `AGENTSTORE_DIR` wins; otherwise the platform data directory is used.
    pub fn locate() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            Error::io(
                "~",
                std::io::Error::new(ErrorKind::NotFound, "could not determine home directory"),
            )
        })?;

        let root = match std::env::var_os(STORE_DIR_ENV).filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .unwrap_or_else(|| home.join(".local").join("share"))
                .join("agentstore"),
        };

        Ok(Self::new(root, home))
    }

    /// A store at `root` serving agents under `home`.
    pub fn new(root: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            home: home.into(),
            search_path: std::env::var_os("PATH").unwrap_or_default(),
        }
    }

    /// Override the PATH-style list probed during detection.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = search_path.into();
        self
    }

    /// The store root. Pure path computation.
    pub fn dir(&self) -> &Path {
        &self.root
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub(crate) fn search_path(&self) -> &OsString {
        &self.search_path
    }

    /// True when the root is a directory holding a registry file.
    pub fn is_initialized(&self) -> bool {
        self.root.is_dir() && self.root.join(REGISTRY_FILE_NAME).is_file()
    }

    /// Create the store layout. Safe to call repeatedly; never overwrites.
    pub fn init(&self) -> Result<InitReport> {
        let mut report = InitReport {
            root: self.root.clone(),
            created: Vec::new(),
        };

        if !self.root.is_dir() {
            fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
            tracing::info!(dir = %self.root.display(), "Created store directory");
        }

        let _lock = self.lock()?;

        let dirs = Category::ALL
            .iter()
            .map(|c| c.dir_name())
            .chain(EXTRA_DIRS.iter().copied());
        for name in dirs {
            let path = self.root.join(name);
            if !path.is_dir() {
                fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
                report.created.push(PathBuf::from(name));
            }
        }

        if vcs::init_repo(&self.root)? {
            report.created.push(PathBuf::from(".git"));
        }

        let config = Config::builtin().render()?;
        let files = [
            (".gitignore", templates::STORE_GITIGNORE.to_string()),
            (CONFIG_FILE_NAME, config),
            ("instructions/AGENTS.md", templates::STARTER_AGENTS_MD.to_string()),
        ];
        for (rel, content) in files {
            if crate::fs::write_if_missing(&self.root.join(rel), &content)? {
                report.created.push(PathBuf::from(rel));
            }
        }

        // Written last: its presence is what marks the store initialized.
        let registry_path = Registry::path(&self.root);
        if !registry_path.exists() {
            Registry::default().save(&self.root)?;
            report.created.push(PathBuf::from(REGISTRY_FILE_NAME));
        }

        for path in &report.created {
            tracing::debug!(path = %path.display(), "Created");
        }
        Ok(report)
    }

    /// Load the store configuration, or the built-in agents if absent.
    pub fn config(&self) -> Result<Config> {
        Config::load_for_store(&self.root)
    }

    /// Load the registry from disk.
    pub fn registry(&self) -> Result<Registry> {
        Registry::load(&self.root)
    }

    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized(self.root.clone()))
        }
    }

    /// Take the store's exclusive writer lock, blocking until available.
    pub(crate) fn lock(&self) -> Result<StoreLock> {
        let path = self.root.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;
        FileExt::lock_exclusive(&file).map_err(|source| Error::Lock { path, source })?;
        Ok(StoreLock { file })
    }

    /// Resolve a user-supplied agent name against the configured and
    /// registered agents.
    pub(crate) fn resolve_agent(&self, input: &str, config: &Config, registry: &Registry) -> Result<String> {
        let known: Vec<&str> = config.agent_names().chain(registry.agent_names()).collect();
        crate::agent_ids::resolve_agent_name(input, known)
            .ok_or_else(|| Error::UnknownAgent(input.to_string()))
    }
}
