//! Editor preferences persisted as JSON, separate from the saves themselves.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_ENV: &str = "LOP_SE_CONFIG";
pub const MAX_RECENT: usize = 10;

const APP_DIR: &str = "lop-se";
const FILE_NAME: &str = "settings.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("{}: invalid settings: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Display name and tooltip of a weapon part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartMeta {
    pub name: String,
    pub tooltip: String,
}

/// Parts added or renamed by the user, keyed by item code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserParts {
    pub handles: BTreeMap<String, PartMeta>,
    pub blades: BTreeMap<String, PartMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Most recently opened first.
    pub recent_files: Vec<PathBuf>,
    pub guid_nicknames: BTreeMap<String, String>,
    /// Alias name to save GUID.
    pub slot_aliases: BTreeMap<String, String>,
    pub default_template: Option<PathBuf>,
    pub backups: bool,
    pub weapon_parts: UserParts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            recent_files: Vec::new(),
            guid_nicknames: BTreeMap::new(),
            slot_aliases: BTreeMap::new(),
            default_template: None,
            backups: true,
            weapon_parts: UserParts::default(),
        }
    }
}

impl Settings {
    /// Settings file location: `explicit`, else `$LOP_SE_CONFIG`, else the
    /// XDG config directory, else `~/.config`.
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        resolve_path_with(explicit, |key| std::env::var_os(key))
    }

    /// Missing file gives defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("no settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&text).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(io_err)?;
        log::debug!("saved settings to {}", path.display());
        Ok(())
    }

    pub fn push_recent(&mut self, path: &Path) {
        self.recent_files.retain(|p| p != path);
        self.recent_files.insert(0, path.to_path_buf());
        self.recent_files.truncate(MAX_RECENT);
    }

    /// An empty nickname removes the entry.
    pub fn set_guid_nickname(&mut self, guid: &str, nickname: &str) {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            self.guid_nicknames.remove(guid);
        } else {
            self.guid_nicknames.insert(guid.to_string(), nickname.to_string());
        }
    }

    /// Nickname for `guid`, or the GUID itself.
    pub fn resolve_guid<'a>(&'a self, guid: &'a str) -> &'a str {
        self.guid_nicknames.get(guid).map(String::as_str).unwrap_or(guid)
    }

    /// An empty GUID removes the alias.
    pub fn set_slot_alias(&mut self, alias: &str, guid: &str) {
        let (alias, guid) = (alias.trim(), guid.trim());
        if alias.is_empty() {
            return;
        }
        if guid.is_empty() {
            self.slot_aliases.remove(alias);
        } else {
            self.slot_aliases.insert(alias.to_string(), guid.to_string());
        }
    }

    pub fn alias_guid(&self, alias: &str) -> Option<&str> {
        self.slot_aliases.get(alias.trim()).map(String::as_str)
    }
}

fn resolve_path_with(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<OsString>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let non_empty = |key: &str| env(key).filter(|v| !v.is_empty()).map(PathBuf::from);
    if let Some(path) = non_empty(CONFIG_ENV) {
        return Some(path);
    }
    if let Some(dir) = non_empty("XDG_CONFIG_HOME") {
        return Some(dir.join(APP_DIR).join(FILE_NAME));
    }
    non_empty("HOME").map(|home| home.join(".config").join(APP_DIR).join(FILE_NAME))
}
