//! Persisted workspace settings, read from and written to
//! `<workspace>/.frepo/config.ini`, plus ancestor-directory workspace
//! discovery.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

const CONFIG_DIR: &str = ".frepo";
const CONFIG_FILE: &str = "config.ini";

const KEY_MANIFEST_REPO: &str = "manifest-repo";
const KEY_MANIFEST_NAME: &str = "manifest-name";
const KEY_MANIFEST_URL: &str = "manifest-url";
const KEY_MIRROR: &str = "mirror";
const KEY_GROUP_FILTER: &str = "group-filter";

const DEFAULT_MANIFEST_REPO: &str = "manifest";
const DEFAULT_MANIFEST_NAME: &str = "default.xml";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("no workspace found: no '.frepo' directory in '{0}' or any ancestor")]
    WorkspaceNotFound(PathBuf),
}

/// Settings persisted for a workspace: which manifest repository/file to
/// track, whether it is mirrored, and the default group filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub manifest_repo: String,
    pub manifest_name: String,
    pub manifest_url: Option<String>,
    pub mirror: bool,
    pub group_filter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manifest_repo: DEFAULT_MANIFEST_REPO.to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            manifest_url: None,
            mirror: false,
            group_filter: None,
        }
    }
}

impl Settings {
    /// Path to a workspace's `<manifest_repo>/<manifest_name>` manifest file.
    pub fn manifest_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.manifest_repo).join(&self.manifest_name)
    }

    pub fn manifest_repo_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.manifest_repo)
    }

    pub fn snapshot_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join("manifest.xml")
    }

    fn config_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Read settings from `<workspace>/.frepo/config.ini`. A missing or
    /// unreadable file falls back to defaults with a warning — config
    /// read failure is never fatal.
    pub fn load(workspace_root: &Path) -> Settings {
        let path = Self::config_path(workspace_root);
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_ini(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                warn!("could not read {}: {e}; using defaults", path.display());
                Settings::default()
            }
        }
    }

    /// Write settings to `<workspace>/.frepo/config.ini`.
    pub fn save(&self, workspace_root: &Path) -> Result<(), SettingsError> {
        let dir = workspace_root.join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| SettingsError::Write(dir.clone(), e))?;
        let path = Self::config_path(workspace_root);
        std::fs::write(&path, self.to_ini()).map_err(|e| SettingsError::Write(path, e))
    }

    fn from_ini(content: &str) -> Settings {
        let mut values: HashMap<String, String> = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Settings {
            manifest_repo: values
                .get(KEY_MANIFEST_REPO)
                .cloned()
                .unwrap_or_else(|| DEFAULT_MANIFEST_REPO.to_string()),
            manifest_name: values
                .get(KEY_MANIFEST_NAME)
                .cloned()
                .unwrap_or_else(|| DEFAULT_MANIFEST_NAME.to_string()),
            manifest_url: values.get(KEY_MANIFEST_URL).cloned(),
            mirror: values.get(KEY_MIRROR).map(|v| v == "1").unwrap_or(false),
            group_filter: values.get(KEY_GROUP_FILTER).cloned(),
        }
    }

    fn to_ini(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{KEY_MANIFEST_REPO}={}\n", self.manifest_repo));
        out.push_str(&format!("{KEY_MANIFEST_NAME}={}\n", self.manifest_name));
        if let Some(url) = &self.manifest_url {
            out.push_str(&format!("{KEY_MANIFEST_URL}={url}\n"));
        }
        out.push_str(&format!("{KEY_MIRROR}={}\n", if self.mirror { 1 } else { 0 }));
        if let Some(filter) = &self.group_filter {
            out.push_str(&format!("{KEY_GROUP_FILTER}={filter}\n"));
        }
        out
    }
}

/// Ascend from `start` toward `/` looking for a `.frepo` directory,
/// returning the directory that contains it (the workspace root).
pub fn find_workspace_root(start: &Path) -> Result<PathBuf, SettingsError> {
    let mut search = start.to_path_buf();
    loop {
        if search.join(CONFIG_DIR).is_dir() {
            return Ok(search);
        }
        match search.parent() {
            Some(parent) => search = parent.to_path_buf(),
            None => return Err(SettingsError::WorkspaceNotFound(start.to_path_buf())),
        }
    }
}
