//! Reading saves from disk and writing them back safely.

use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::gvas::Document;
use crate::merge::merge_document;

const BACKUP_TIMESTAMP: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("{}: invalid JSON: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{}: not a readable save: {source}", .path.display())]
    Parse { path: PathBuf, source: io::Error },

    #[error("merged document does not encode: {source}")]
    Encode { source: io::Error },
}

impl StorageError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub backup: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { backup: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
    pub bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCopy {
    Merged,
    Failed,
}

impl DebugCopy {
    fn extension(self) -> &'static str {
        match self {
            Self::Merged => "merged.json",
            Self::Failed => "failed.json",
        }
    }
}

pub fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

pub fn read_save(path: &Path) -> Result<Document, StorageError> {
    let bytes = fs::read(path).map_err(|e| StorageError::io(path, e))?;
    Document::parse_with_layout(Cursor::new(bytes)).map_err(|source| StorageError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_json(path: &Path) -> Result<Value, StorageError> {
    let text = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a save. JSON files are merged onto `template` when one is given,
/// otherwise they must be a complete export.
pub fn load_path(path: &Path, template: Option<&Path>) -> Result<Document, StorageError> {
    if !is_json_path(path) {
        return read_save(path);
    }
    let edited = read_json(path)?;
    match template {
        Some(template) => import_json(&read_save(template)?, &edited, None),
        None => {
            let json = serde_json::from_value(edited).map_err(|source| StorageError::Json {
                path: path.to_path_buf(),
                source,
            })?;
            Document::from_json(json).map_err(|source| StorageError::Encode { source })
        }
    }
}

/// Merge edited JSON onto `template`. With `debug_target`, the merged JSON
/// is also written next to it (`.merged.json`, or `.failed.json` when the
/// merged tree does not encode).
pub fn import_json(
    template: &Document,
    edited: &Value,
    debug_target: Option<&Path>,
) -> Result<Document, StorageError> {
    let (merged, merged_json) =
        merge_document(&template.to_json(), edited).map_err(|source| StorageError::Json {
            path: PathBuf::from("<merged>"),
            source,
        })?;
    match Document::from_json(merged) {
        Ok(doc) => {
            if let Some(target) = debug_target {
                write_debug_json(target, &merged_json, DebugCopy::Merged)?;
            }
            Ok(doc)
        }
        Err(source) => {
            if let Some(target) = debug_target {
                write_debug_json(target, &merged_json, DebugCopy::Failed)?;
            }
            Err(StorageError::Encode { source })
        }
    }
}

pub fn backup_path(target: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format(BACKUP_TIMESTAMP);
    let mut name = target.as_os_str().to_os_string();
    name.push(format!(".bak-{stamp}"));
    PathBuf::from(name)
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Write `bytes` to `target` through a synced `.part` file and a rename,
/// backing up an existing target first unless disabled.
pub fn write_save(
    target: &Path,
    bytes: &[u8],
    options: WriteOptions,
) -> Result<WriteReport, StorageError> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let backup = if options.backup && target.exists() {
        let backup = backup_path(target);
        fs::copy(target, &backup).map_err(|e| StorageError::io(&backup, e))?;
        log::info!("backed up {} to {}", target.display(), backup.display());
        Some(backup)
    } else {
        None
    };

    let part = part_path(target);
    {
        let mut file = File::create(&part).map_err(|e| StorageError::io(&part, e))?;
        file.write_all(bytes).map_err(|e| StorageError::io(&part, e))?;
        file.sync_all().map_err(|e| StorageError::io(&part, e))?;
    }
    fs::rename(&part, target).map_err(|e| StorageError::io(target, e))?;
    log::info!("wrote {} bytes to {}", bytes.len(), target.display());

    Ok(WriteReport {
        path: target.to_path_buf(),
        backup,
        bytes: bytes.len(),
    })
}

/// Pretty JSON copy next to `target` with its extension replaced.
pub fn write_debug_json(target: &Path, json: &Value, kind: DebugCopy) -> Result<PathBuf, StorageError> {
    let path = target.with_extension(kind.extension());
    let text = serde_json::to_string_pretty(json).map_err(|source| StorageError::Json {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, text).map_err(|e| StorageError::io(&path, e))?;
    log::debug!("wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_save_backs_up_existing_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("slot.sav");

        let first = write_save(&target, b"one", WriteOptions::default()).unwrap();
        assert_eq!(first.backup, None);

        let second = write_save(&target, b"two", WriteOptions::default()).unwrap();
        let backup = second.backup.expect("backup written");
        assert_eq!(fs::read(&backup).unwrap(), b"one");
        assert_eq!(fs::read(&target).unwrap(), b"two");
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("slot.sav.bak-"), "{name}");
        assert!(!part_path(&target).exists());

        let third = write_save(&target, b"three", WriteOptions { backup: false }).unwrap();
        assert_eq!(third.backup, None);
    }

    #[test]
    fn debug_copies_replace_extension() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("slot.sav");
        let path = write_debug_json(&target, &serde_json::json!({"a": 1}), DebugCopy::Failed).unwrap();
        assert_eq!(path, dir.path().join("slot.failed.json"));
        assert!(fs::read_to_string(path).unwrap().contains("\"a\": 1"));
    }

    #[test]
    fn json_paths_are_detected() {
        assert!(is_json_path(Path::new("x/edited.JSON")));
        assert!(!is_json_path(Path::new("x/slot.sav")));
    }

    #[test]
    fn unreadable_save_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.sav");
        fs::write(&path, b"nope").unwrap();
        let err = read_save(&path).unwrap_err();
        assert!(matches!(err, StorageError::Parse { .. }));
        assert!(err.to_string().contains("bad.sav"));
    }
}
