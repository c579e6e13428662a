use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use super::error::{CoreError, CoreErrorCode};
use crate::settings::{PartMeta, UserParts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    Handle,
    Blade,
}

impl PartKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Handle => "handle",
            Self::Blade => "blade",
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartKind {
    type Err = String;

    /// Anything starting with `h` is a handle; everything else a blade.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s.is_empty() {
            return Err("empty part kind".to_string());
        }
        Ok(if s.starts_with('h') {
            Self::Handle
        } else {
            Self::Blade
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartInfo {
    pub code: String,
    pub name: String,
    pub tooltip: String,
    pub kind: PartKind,
}

/// Weapon handle and blade names: a base table from disk with the user's
/// additions and overrides applied on top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeaponPartsDb {
    handles: BTreeMap<String, PartInfo>,
    blades: BTreeMap<String, PartInfo>,
}

impl WeaponPartsDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base table in the `{"handles": {code: {name, tooltip}}, "blades": ...}`
    /// layout.
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let base: UserParts = serde_json::from_str(text).map_err(|e| {
            CoreError::new(CoreErrorCode::Json, format!("invalid weapon parts table: {e}"))
        })?;
        let mut db = Self::new();
        db.apply_user(&base);
        Ok(db)
    }

    /// An unreadable base table is logged and treated as empty.
    pub fn load(base: Option<&Path>, user: &UserParts) -> Self {
        let mut db = match base {
            Some(path) => match fs::read_to_string(path)
                .map_err(|e| CoreError::new(CoreErrorCode::Io, e.to_string()))
                .and_then(|text| Self::from_json_str(&text))
            {
                Ok(db) => db,
                Err(err) => {
                    log::warn!("weapon parts table {}: {err}", path.display());
                    Self::new()
                }
            },
            None => Self::new(),
        };
        db.apply_user(user);
        db
    }

    pub fn apply_user(&mut self, user: &UserParts) {
        for (kind, bucket) in [(PartKind::Handle, &user.handles), (PartKind::Blade, &user.blades)] {
            for (code, meta) in bucket {
                self.insert(kind, code, meta);
            }
        }
    }

    fn insert(&mut self, kind: PartKind, code: &str, meta: &PartMeta) {
        let info = PartInfo {
            code: code.to_string(),
            name: meta.name.clone(),
            tooltip: meta.tooltip.clone(),
            kind,
        };
        let dest = match kind {
            PartKind::Handle => &mut self.handles,
            PartKind::Blade => &mut self.blades,
        };
        dest.insert(code.to_string(), info);
    }

    /// Record a part in `user` and apply it.
    pub fn upsert_user_part(
        &mut self,
        user: &mut UserParts,
        kind: PartKind,
        code: &str,
        name: &str,
        tooltip: &str,
    ) {
        let meta = PartMeta {
            name: name.trim().to_string(),
            tooltip: tooltip.trim().to_string(),
        };
        let bucket = match kind {
            PartKind::Handle => &mut user.handles,
            PartKind::Blade => &mut user.blades,
        };
        bucket.insert(code.trim().to_string(), meta.clone());
        self.insert(kind, code.trim(), &meta);
    }

    pub fn handles(&self) -> Vec<&PartInfo> {
        sorted(&self.handles)
    }

    pub fn blades(&self) -> Vec<&PartInfo> {
        sorted(&self.blades)
    }

    pub fn lookup(&self, code: &str) -> Option<&PartInfo> {
        self.handles.get(code).or_else(|| self.blades.get(code))
    }

    /// `Name  [CODE]`, or the bare code when unknown.
    pub fn label_for_code(&self, code: &str) -> String {
        let Some(info) = self.lookup(code) else {
            return code.to_string();
        };
        let name = info.name.trim();
        let name = if name.is_empty() { code } else { name };
        format!("{name}  [{code}]")
    }

    pub fn len(&self) -> usize {
        self.handles.len() + self.blades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty() && self.blades.is_empty()
    }
}

fn sort_key(info: &PartInfo) -> (String, String) {
    let code = info.code.to_lowercase();
    let name = info.name.to_lowercase();
    (if name.is_empty() { code.clone() } else { name }, code)
}

fn sorted(bucket: &BTreeMap<String, PartInfo>) -> Vec<&PartInfo> {
    let mut parts: Vec<&PartInfo> = bucket.values().collect();
    parts.sort_by_cached_key(|p| sort_key(p));
    parts
}
