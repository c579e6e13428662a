use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::guid::Guid;

/// One tagged property. Several properties may share a name when they are
/// elements of a static array, told apart by `array_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub array_index: i32,
    pub guid: Option<Guid>,
    pub value: PropertyValue,
}

impl Property {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            array_index: 0,
            guid: None,
            value,
        }
    }

    fn json_key(&self) -> String {
        if self.array_index == 0 {
            self.name.clone()
        } else {
            format!("{}[{}]", self.name, self.array_index)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int(i32),
    Int64(i64),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(#[serde(with = "f32_bits")] f32),
    Double(#[serde(with = "f64_bits")] f64),
    Str(Option<String>),
    Name(Option<String>),
    Object(Option<String>),
    Byte {
        enum_name: String,
        value: ByteValue,
    },
    Enum {
        enum_name: String,
        value: Option<String>,
    },
    Struct {
        struct_name: String,
        #[serde(default, skip_serializing_if = "Guid::is_zero")]
        struct_guid: Guid,
        value: StructValue,
    },
    Array {
        inner_type: String,
        value: ArrayValue,
    },
    Set {
        inner_type: String,
        elements: Vec<Element>,
    },
    Map {
        key_type: String,
        value_type: String,
        entries: Vec<MapEntry>,
    },
    /// Payload kept verbatim because it has no typed decoding that
    /// reproduces the stored bytes exactly.
    Raw(RawValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ByteValue {
    Byte(u8),
    Label(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawValue {
    pub type_name: String,
    #[serde(with = "base64_bytes")]
    pub header: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Bool(bool),
    Byte(u8),
    Int8(i8),
    Int16(i16),
    Int(i32),
    Int64(i64),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(#[serde(with = "f32_bits")] f32),
    Double(#[serde(with = "f64_bits")] f64),
    Str(Option<String>),
    Name(Option<String>),
    Object(Option<String>),
    Enum(Option<String>),
    Struct(StructValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    pub key: Element,
    pub value: Element,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayValue {
    Base(Vec<Element>),
    Struct {
        field_name: String,
        struct_name: String,
        #[serde(default, skip_serializing_if = "Guid::is_zero")]
        struct_guid: Guid,
        elements: Vec<StructValue>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    #[serde(with = "f64_bits")]
    pub x: f64,
    #[serde(with = "f64_bits")]
    pub y: f64,
    #[serde(with = "f64_bits")]
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2D {
    #[serde(with = "f64_bits")]
    pub x: f64,
    #[serde(with = "f64_bits")]
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotator {
    #[serde(with = "f64_bits")]
    pub pitch: f64,
    #[serde(with = "f64_bits")]
    pub yaw: f64,
    #[serde(with = "f64_bits")]
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quat {
    #[serde(with = "f64_bits")]
    pub x: f64,
    #[serde(with = "f64_bits")]
    pub y: f64,
    #[serde(with = "f64_bits")]
    pub z: f64,
    #[serde(with = "f64_bits")]
    pub w: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearColor {
    #[serde(with = "f32_bits")]
    pub r: f32,
    #[serde(with = "f32_bits")]
    pub g: f32,
    #[serde(with = "f32_bits")]
    pub b: f32,
    #[serde(with = "f32_bits")]
    pub a: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntPoint {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StructValue {
    Vector(Vector),
    Vector2D(Vector2D),
    Rotator(Rotator),
    Quat(Quat),
    LinearColor(LinearColor),
    Color(Color),
    IntPoint(IntPoint),
    Guid(Guid),
    DateTime(i64),
    Timespan(i64),
    Properties(PropertyMap),
}

impl StructValue {
    pub fn as_properties(&self) -> Option<&PropertyMap> {
        match self {
            StructValue::Properties(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_properties_mut(&mut self) -> Option<&mut PropertyMap> {
        match self {
            StructValue::Properties(map) => Some(map),
            _ => None,
        }
    }
}

impl PropertyValue {
    pub fn type_name(&self) -> &str {
        match self {
            PropertyValue::Bool(_) => "BoolProperty",
            PropertyValue::Int8(_) => "Int8Property",
            PropertyValue::Int16(_) => "Int16Property",
            PropertyValue::Int(_) => "IntProperty",
            PropertyValue::Int64(_) => "Int64Property",
            PropertyValue::UInt16(_) => "UInt16Property",
            PropertyValue::UInt32(_) => "UInt32Property",
            PropertyValue::UInt64(_) => "UInt64Property",
            PropertyValue::Float(_) => "FloatProperty",
            PropertyValue::Double(_) => "DoubleProperty",
            PropertyValue::Str(_) => "StrProperty",
            PropertyValue::Name(_) => "NameProperty",
            PropertyValue::Object(_) => "ObjectProperty",
            PropertyValue::Byte { .. } => "ByteProperty",
            PropertyValue::Enum { .. } => "EnumProperty",
            PropertyValue::Struct { .. } => "StructProperty",
            PropertyValue::Array { .. } => "ArrayProperty",
            PropertyValue::Set { .. } => "SetProperty",
            PropertyValue::Map { .. } => "MapProperty",
            PropertyValue::Raw(raw) => &raw.type_name,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, PropertyValue::Raw(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int8(v) => Some(i64::from(*v)),
            PropertyValue::Int16(v) => Some(i64::from(*v)),
            PropertyValue::Int(v) => Some(i64::from(*v)),
            PropertyValue::Int64(v) => Some(*v),
            PropertyValue::UInt16(v) => Some(i64::from(*v)),
            PropertyValue::UInt32(v) => Some(i64::from(*v)),
            PropertyValue::UInt64(v) => i64::try_from(*v).ok(),
            PropertyValue::Byte {
                value: ByteValue::Byte(v),
                ..
            } => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(f64::from(*v)),
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Text of a Str, Name or Object property.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(v) | PropertyValue::Name(v) | PropertyValue::Object(v) => {
                v.as_deref()
            }
            _ => None,
        }
    }

    /// Label of an Enum property, or of a Byte property backed by an enum.
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            PropertyValue::Enum { value, .. } => value.as_deref(),
            PropertyValue::Byte {
                value: ByteValue::Label(value),
                ..
            } => value.as_deref(),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&PropertyMap> {
        match self {
            PropertyValue::Struct { value, .. } => value.as_properties(),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut PropertyMap> {
        match self {
            PropertyValue::Struct { value, .. } => value.as_properties_mut(),
            _ => None,
        }
    }

    pub fn as_struct_array(&self) -> Option<&Vec<StructValue>> {
        match self {
            PropertyValue::Array {
                value: ArrayValue::Struct { elements, .. },
                ..
            } => Some(elements),
            _ => None,
        }
    }

    pub fn as_struct_array_mut(&mut self) -> Option<&mut Vec<StructValue>> {
        match self {
            PropertyValue::Array {
                value: ArrayValue::Struct { elements, .. },
                ..
            } => Some(elements),
            _ => None,
        }
    }

    /// Store an integer keeping the stored width. Values outside the width's
    /// range are clamped. Returns `None` when the value is not an integer.
    pub fn set_integer(&mut self, value: i64) -> Option<bool> {
        let before = self.as_i64()?;
        match self {
            PropertyValue::Int8(v) => *v = value.clamp(i8::MIN.into(), i8::MAX.into()) as i8,
            PropertyValue::Int16(v) => *v = value.clamp(i16::MIN.into(), i16::MAX.into()) as i16,
            PropertyValue::Int(v) => *v = value.clamp(i32::MIN.into(), i32::MAX.into()) as i32,
            PropertyValue::Int64(v) => *v = value,
            PropertyValue::UInt16(v) => *v = value.clamp(0, u16::MAX.into()) as u16,
            PropertyValue::UInt32(v) => *v = value.clamp(0, u32::MAX.into()) as u32,
            PropertyValue::UInt64(v) => *v = value.max(0) as u64,
            PropertyValue::Byte {
                value: ByteValue::Byte(v),
                ..
            } => *v = value.clamp(0, u8::MAX.into()) as u8,
            _ => return None,
        }
        Some(self.as_i64() != Some(before))
    }
}

impl Element {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Element::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Element::Byte(v) => Some(i64::from(*v)),
            Element::Int8(v) => Some(i64::from(*v)),
            Element::Int16(v) => Some(i64::from(*v)),
            Element::Int(v) => Some(i64::from(*v)),
            Element::Int64(v) => Some(*v),
            Element::UInt16(v) => Some(i64::from(*v)),
            Element::UInt32(v) => Some(i64::from(*v)),
            Element::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Element::Str(v) | Element::Name(v) | Element::Object(v) | Element::Enum(v) => {
                v.as_deref()
            }
            _ => None,
        }
    }
}

/// Ordered property list of a struct or of the save root.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyMap {
    entries: Vec<Property>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.entries.iter_mut()
    }

    pub fn properties(&self) -> &[Property] {
        &self.entries
    }

    pub fn push(&mut self, property: Property) {
        self.entries.push(property);
    }

    /// Case-insensitive lookup of the first property with this name.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.position(name).map(|i| &self.entries[i].value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PropertyValue> {
        self.position(name).map(|i| &mut self.entries[i].value)
    }

    pub fn get_indexed(&self, name: &str, array_index: i32) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|p| p.array_index == array_index && p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// First key among `names` present in the map, with its stored spelling.
    pub fn first_present<'a>(&self, names: &[&'a str]) -> Option<&'a str> {
        names.iter().copied().find(|name| self.contains(name))
    }

    /// Replace the value of an existing property or append a new one.
    pub fn insert(&mut self, name: &str, value: PropertyValue) {
        match self.position(name) {
            Some(i) => self.entries[i].value = value,
            None => self.entries.push(Property::new(name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Property> {
        self.position(name).map(|i| self.entries.remove(i))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
    }
}

impl FromIterator<Property> for PropertyMap {
    fn from_iter<T: IntoIterator<Item = Property>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[derive(Serialize)]
struct PropertyJsonRef<'a> {
    #[serde(flatten)]
    value: &'a PropertyValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    guid: Option<&'a Guid>,
}

#[derive(Deserialize)]
struct PropertyJson {
    #[serde(flatten)]
    value: PropertyValue,
    #[serde(default)]
    guid: Option<Guid>,
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for property in &self.entries {
            map.serialize_entry(
                &property.json_key(),
                &PropertyJsonRef {
                    value: &property.value,
                    guid: property.guid.as_ref(),
                },
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PropertyMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PropertyMapVisitor)
    }
}

struct PropertyMapVisitor;

impl<'de> Visitor<'de> for PropertyMapVisitor {
    type Value = PropertyMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of named properties")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut out = PropertyMap::new();
        while let Some((key, property)) = access.next_entry::<String, PropertyJson>()? {
            let (name, array_index) = split_json_key(&key);
            out.push(Property {
                name: name.to_string(),
                array_index,
                guid: property.guid,
                value: property.value,
            });
        }
        Ok(out)
    }
}

fn split_json_key(key: &str) -> (&str, i32) {
    key.strip_suffix(']')
        .and_then(|stripped| stripped.rsplit_once('['))
        .and_then(|(name, index)| index.parse().ok().map(|index| (name, index)))
        .unwrap_or((key, 0))
}

pub(crate) mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// JSON has no NaN or infinity, so those serialize as `{"bits": n}` with the
/// exact bit pattern. Finite values stay plain numbers.
macro_rules! float_bits_serde {
    ($module:ident, $float:ty, $bits:ty) => {
        pub(crate) mod $module {
            use serde::{Deserialize, Deserializer, Serialize, Serializer};

            #[derive(Serialize, Deserialize)]
            #[serde(untagged)]
            enum Repr {
                Number($float),
                Bits { bits: $bits },
            }

            pub fn serialize<S: Serializer>(value: &$float, serializer: S) -> Result<S::Ok, S::Error> {
                let repr = if value.is_finite() {
                    Repr::Number(*value)
                } else {
                    Repr::Bits {
                        bits: value.to_bits(),
                    }
                };
                repr.serialize(serializer)
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<$float, D::Error> {
                Ok(match Repr::deserialize(deserializer)? {
                    Repr::Number(value) => value,
                    Repr::Bits { bits } => <$float>::from_bits(bits),
                })
            }
        }
    };
}

float_bits_serde!(f32_bits, f32, u32);
float_bits_serde!(f64_bits, f64, u64);
