//! Shape-preserving merge of edited JSON onto a baseline export.
//!
//! The baseline fixes the shape: tagged variants keep their tag, objects keep
//! their key set, arrays keep their length and scalars keep their JSON kind.
//! Only values that fit the baseline's shape are taken from the edit.

use serde_json::{Map, Value};

use crate::gvas::DocumentJson;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Null,
    Bool,
    Integer,
    Float,
    String,
}

fn scalar_kind(value: &Value) -> Option<Kind> {
    match value {
        Value::Null => Some(Kind::Null),
        Value::Bool(_) => Some(Kind::Bool),
        Value::Number(n) if n.is_f64() => Some(Kind::Float),
        Value::Number(_) => Some(Kind::Integer),
        Value::String(_) => Some(Kind::String),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Merge `edited` into `base`, returning the merged value.
pub fn merge_preserving_shape(base: &Value, edited: &Value) -> Value {
    let mut out = base.clone();
    merge_into(&mut out, edited, "$");
    out
}

/// In-place form of [`merge_preserving_shape`]; returns how many scalars
/// were replaced.
pub fn merge_into(base: &mut Value, edited: &Value, path: &str) -> usize {
    match (base, edited) {
        (Value::Object(base), Value::Object(edited)) => {
            let mut taken = 0;
            for (key, value) in edited {
                match base.get_mut(key) {
                    Some(slot) => taken += merge_into(slot, value, &format!("{path}.{key}")),
                    None => log::debug!("merge: ignoring unknown key {path}.{key}"),
                }
            }
            taken
        }
        (Value::Array(base), Value::Array(edited)) => {
            if base.len() != edited.len() {
                log::debug!(
                    "merge: {path} has {} items, baseline keeps {}",
                    edited.len(),
                    base.len()
                );
            }
            base.iter_mut()
                .zip(edited)
                .enumerate()
                .map(|(i, (slot, value))| merge_into(slot, value, &format!("{path}[{i}]")))
                .sum()
        }
        (base, edited) => {
            let (Some(have), Some(want)) = (scalar_kind(base), scalar_kind(edited)) else {
                log::debug!("merge: shape mismatch at {path}, keeping baseline");
                return 0;
            };
            if have != Kind::Null && have != want {
                log::debug!("merge: {path} expects {have:?}, got {want:?}; keeping baseline");
                return 0;
            }
            if *base == *edited {
                return 0;
            }
            *base = edited.clone();
            1
        }
    }
}

/// Merge an edited export onto `base`. `edited` is either a whole export
/// (`{"header", "root", "trailer"}`) or just the `root` object. Returns the
/// merged document together with the merged JSON.
pub fn merge_document(base: &DocumentJson, edited: &Value) -> serde_json::Result<(DocumentJson, Value)> {
    let baseline = serde_json::to_value(base)?;
    let whole_export = edited.as_object().is_some_and(|o| o.contains_key("root"));
    let edited = if whole_export {
        edited.clone()
    } else {
        let mut wrapper = Map::new();
        wrapper.insert("root".to_string(), edited.clone());
        Value::Object(wrapper)
    };
    let mut merged = baseline;
    let taken = merge_into(&mut merged, &edited, "$");
    log::debug!("merge: {taken} values taken from the edited document");
    let doc = serde_json::from_value(merged.clone())?;
    Ok((doc, merged))
}
