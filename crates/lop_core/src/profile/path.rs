//! Addressing nodes inside a property tree.
//!
//! A [`FieldPath`] names a node by property keys and array indices, rendered
//! as `QuestList_0[3].Objectives_0[0].Count_0`. Struct values are entered
//! implicitly by the next key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::gvas::{ArrayValue, Element, PropertyMap, PropertyValue, StructValue};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push_key(&mut self, key: impl Into<String>) {
        self.0.push(Segment::Key(key.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.0.push(Segment::Index(index));
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }

    pub fn join(&self, other: &FieldPath) -> FieldPath {
        let mut out = self.clone();
        out.0.extend(other.0.iter().cloned());
        out
    }

    pub fn last_key(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|s| match s {
            Segment::Key(k) => Some(k.as_str()),
            Segment::Index(_) => None,
        })
    }

    /// Path below `prefix`, if this path starts with it.
    pub fn strip_prefix(&self, prefix: &FieldPath) -> Option<FieldPath> {
        self.0
            .strip_prefix(prefix.0.as_slice())
            .map(|rest| FieldPath(rest.to_vec()))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(k) if i == 0 => f.write_str(k)?,
                Segment::Key(k) => write!(f, ".{k}")?,
                Segment::Index(n) => write!(f, "[{n}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut path = FieldPath::new();
        for part in s.split('.').filter(|p| !p.is_empty()) {
            let (key, mut rest) = part.split_once('[').map_or((part, ""), |(k, r)| (k, r));
            if !key.is_empty() {
                path.push_key(key);
            }
            while !rest.is_empty() {
                let (index, tail) = rest
                    .split_once(']')
                    .ok_or_else(|| format!("unclosed index in path '{s}'"))?;
                let index = index
                    .parse()
                    .map_err(|_| format!("bad index '{index}' in path '{s}'"))?;
                path.push_index(index);
                rest = tail.strip_prefix('[').unwrap_or(tail);
            }
        }
        Ok(path)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Map(&'a PropertyMap),
    Value(&'a PropertyValue),
    Struct(&'a StructValue),
    Element(&'a Element),
}

#[derive(Debug)]
pub enum NodeMut<'a> {
    Map(&'a mut PropertyMap),
    Value(&'a mut PropertyValue),
    Struct(&'a mut StructValue),
    Element(&'a mut Element),
}

impl<'a> NodeRef<'a> {
    pub fn child(self, segment: &Segment) -> Option<NodeRef<'a>> {
        match (self, segment) {
            (NodeRef::Map(map), Segment::Key(k)) => map.get(k).map(NodeRef::Value),
            (NodeRef::Value(v), Segment::Key(_)) => NodeRef::Map(v.as_struct()?).child(segment),
            (NodeRef::Value(PropertyValue::Array { value, .. }), Segment::Index(i)) => match value {
                ArrayValue::Struct { elements, .. } => elements.get(*i).map(NodeRef::Struct),
                ArrayValue::Base(elements) => elements.get(*i).map(NodeRef::Element),
            },
            (NodeRef::Struct(s), Segment::Key(_)) => NodeRef::Map(s.as_properties()?).child(segment),
            (NodeRef::Element(Element::Struct(s)), Segment::Key(_)) => {
                NodeRef::Struct(s).child(segment)
            }
            _ => None,
        }
    }

    pub fn as_map(self) -> Option<&'a PropertyMap> {
        match self {
            NodeRef::Map(map) => Some(map),
            NodeRef::Value(v) => v.as_struct(),
            NodeRef::Struct(s) | NodeRef::Element(Element::Struct(s)) => s.as_properties(),
            NodeRef::Element(_) => None,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            NodeRef::Value(v) => v.as_i64(),
            NodeRef::Element(e) => e.as_i64(),
            _ => None,
        }
    }
}

impl<'a> NodeMut<'a> {
    pub fn child(self, segment: &Segment) -> Option<NodeMut<'a>> {
        match (self, segment) {
            (NodeMut::Map(map), Segment::Key(k)) => map.get_mut(k).map(NodeMut::Value),
            (NodeMut::Value(v), Segment::Key(_)) => {
                NodeMut::Map(v.as_struct_mut()?).child(segment)
            }
            (NodeMut::Value(PropertyValue::Array { value, .. }), Segment::Index(i)) => match value {
                ArrayValue::Struct { elements, .. } => elements.get_mut(*i).map(NodeMut::Struct),
                ArrayValue::Base(elements) => elements.get_mut(*i).map(NodeMut::Element),
            },
            (NodeMut::Struct(s), Segment::Key(_)) => {
                NodeMut::Map(s.as_properties_mut()?).child(segment)
            }
            (NodeMut::Element(Element::Struct(s)), Segment::Key(_)) => {
                NodeMut::Struct(s).child(segment)
            }
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<&'a mut PropertyMap> {
        match self {
            NodeMut::Map(map) => Some(map),
            NodeMut::Value(v) => v.as_struct_mut(),
            NodeMut::Struct(s) | NodeMut::Element(Element::Struct(s)) => s.as_properties_mut(),
            NodeMut::Element(_) => None,
        }
    }

    /// Store an integer keeping the stored width. `None` for non-integers.
    pub fn set_integer(self, value: i64) -> Option<bool> {
        match self {
            NodeMut::Value(v) => v.set_integer(value),
            NodeMut::Element(e) => set_element_integer(e, value),
            _ => None,
        }
    }
}

fn set_element_integer(element: &mut Element, value: i64) -> Option<bool> {
    let before = element.as_i64()?;
    match element {
        Element::Byte(v) => *v = value.clamp(0, u8::MAX.into()) as u8,
        Element::Int8(v) => *v = value.clamp(i8::MIN.into(), i8::MAX.into()) as i8,
        Element::Int16(v) => *v = value.clamp(i16::MIN.into(), i16::MAX.into()) as i16,
        Element::Int(v) => *v = value.clamp(i32::MIN.into(), i32::MAX.into()) as i32,
        Element::Int64(v) => *v = value,
        Element::UInt16(v) => *v = value.clamp(0, u16::MAX.into()) as u16,
        Element::UInt32(v) => *v = value.clamp(0, u32::MAX.into()) as u32,
        Element::UInt64(v) => *v = value.max(0) as u64,
        _ => return None,
    }
    Some(element.as_i64() != Some(before))
}

pub fn resolve<'a>(map: &'a PropertyMap, path: &FieldPath) -> Option<NodeRef<'a>> {
    path.segments()
        .iter()
        .try_fold(NodeRef::Map(map), |node, segment| node.child(segment))
}

pub fn resolve_mut<'a>(map: &'a mut PropertyMap, path: &FieldPath) -> Option<NodeMut<'a>> {
    path.segments()
        .iter()
        .try_fold(NodeMut::Map(map), |node, segment| node.child(segment))
}

/// Depth-first visit of every value, struct array element and base array
/// element below `map`, in file order.
pub fn walk<'a, F>(map: &'a PropertyMap, visit: &mut F)
where
    F: FnMut(&FieldPath, NodeRef<'a>),
{
    let mut path = FieldPath::new();
    walk_map(map, &mut path, visit);
}

fn walk_map<'a, F>(map: &'a PropertyMap, path: &mut FieldPath, visit: &mut F)
where
    F: FnMut(&FieldPath, NodeRef<'a>),
{
    for property in map.iter() {
        path.push_key(property.name.clone());
        walk_value(&property.value, path, visit);
        path.pop();
    }
}

fn walk_value<'a, F>(value: &'a PropertyValue, path: &mut FieldPath, visit: &mut F)
where
    F: FnMut(&FieldPath, NodeRef<'a>),
{
    visit(path, NodeRef::Value(value));
    match value {
        PropertyValue::Struct { value, .. } => {
            if let Some(map) = value.as_properties() {
                walk_map(map, path, visit);
            }
        }
        PropertyValue::Array {
            value: ArrayValue::Struct { elements, .. },
            ..
        } => {
            for (i, element) in elements.iter().enumerate() {
                path.push_index(i);
                visit(path, NodeRef::Struct(element));
                if let Some(map) = element.as_properties() {
                    walk_map(map, path, visit);
                }
                path.pop();
            }
        }
        PropertyValue::Array {
            value: ArrayValue::Base(elements),
            ..
        } => {
            for (i, element) in elements.iter().enumerate() {
                path.push_index(i);
                visit(path, NodeRef::Element(element));
                if let Some(map) = match element {
                    Element::Struct(s) => s.as_properties(),
                    _ => None,
                } {
                    walk_map(map, path, visit);
                }
                path.pop();
            }
        }
        _ => {}
    }
}

/// Path of the first struct array stored under `key` anywhere below `map`.
pub fn find_struct_array(map: &PropertyMap, key: &str) -> Option<FieldPath> {
    let mut found = None;
    walk(map, &mut |path, node| {
        if found.is_some() {
            return;
        }
        if let NodeRef::Value(v) = node {
            let matches = path.last_key().is_some_and(|k| k.eq_ignore_ascii_case(key));
            if matches && v.as_struct_array().is_some() {
                found = Some(path.clone());
            }
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gvas::Guid;

    fn sample() -> PropertyMap {
        let mut inner = PropertyMap::new();
        inner.insert("Count_0", PropertyValue::Int(4));
        let mut root = PropertyMap::new();
        root.insert(
            "List_0",
            PropertyValue::Array {
                inner_type: "StructProperty".into(),
                value: ArrayValue::Struct {
                    field_name: "List_0".into(),
                    struct_name: "Entry".into(),
                    struct_guid: Guid::ZERO,
                    elements: vec![StructValue::Properties(inner)],
                },
            },
        );
        root.insert(
            "Flags_0",
            PropertyValue::Array {
                inner_type: "IntProperty".into(),
                value: ArrayValue::Base(vec![Element::Int(1), Element::Int(2)]),
            },
        );
        root
    }

    #[test]
    fn display_and_parse_agree() {
        let path: FieldPath = "QuestList_0[3].Objectives_0[0][1].Count_0".parse().unwrap();
        assert_eq!(path.segments().len(), 6);
        assert_eq!(path.to_string(), "QuestList_0[3].Objectives_0[0][1].Count_0");
        assert_eq!(path.last_key(), Some("Count_0"));
        assert!("A[x]".parse::<FieldPath>().is_err());
    }

    #[test]
    fn resolve_and_set_through_arrays() {
        let mut root = sample();
        let count: FieldPath = "List_0[0].Count_0".parse().unwrap();
        assert_eq!(resolve(&root, &count).and_then(NodeRef::as_i64), Some(4));
        assert_eq!(resolve_mut(&mut root, &count).and_then(|n| n.set_integer(9)), Some(true));
        assert_eq!(resolve(&root, &count).and_then(NodeRef::as_i64), Some(9));

        let flag: FieldPath = "Flags_0[1]".parse().unwrap();
        assert_eq!(resolve_mut(&mut root, &flag).and_then(|n| n.set_integer(7)), Some(true));
        assert_eq!(resolve(&root, &flag).and_then(NodeRef::as_i64), Some(7));
        assert!(resolve(&root, &"Flags_0[5]".parse().unwrap()).is_none());
    }

    #[test]
    fn walk_visits_leaves_in_order() {
        let root = sample();
        let mut ints = Vec::new();
        walk(&root, &mut |path, node| {
            if let Some(v) = node.as_i64() {
                ints.push((path.to_string(), v));
            }
        });
        assert_eq!(
            ints,
            vec![
                ("List_0[0].Count_0".to_string(), 4),
                ("Flags_0[0]".to_string(), 1),
                ("Flags_0[1]".to_string(), 2),
            ]
        );
        assert_eq!(find_struct_array(&root, "list_0").map(|p| p.to_string()), Some("List_0".into()));
    }
}
