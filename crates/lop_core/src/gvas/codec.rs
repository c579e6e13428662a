use std::io::{self, Cursor, Read, Seek};

use super::guid::Guid;
use super::property::{
    ArrayValue, ByteValue, Color, Element, IntPoint, LinearColor, MapEntry, Property, PropertyMap,
    PropertyValue, Quat, RawValue, Rotator, StructValue, Vector, Vector2D,
};
use crate::reader::LittleEndianReader;
use crate::writer::{LittleEndianWriter, checked_len};

const NONE_NAME: &str = "None";
const STRUCT_PROPERTY: &str = "StructProperty";
/// Container levels decoded as typed values; deeper payloads stay raw.
pub(crate) const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CodecContext {
    /// Vectors, rotators and quaternions are stored as f64 instead of f32.
    pub large_world_coordinates: bool,
    pub depth: usize,
}

impl CodecContext {
    fn nested(&self) -> io::Result<Self> {
        if self.depth >= MAX_NESTING {
            return Err(invalid(format!("nested deeper than {MAX_NESTING} levels")));
        }
        Ok(Self {
            depth: self.depth + 1,
            ..*self
        })
    }
}

enum TagHeader {
    Plain,
    Struct { struct_name: String, struct_guid: Guid },
    Bool(u8),
    Enum(String),
    Container(String),
    Map { key_type: String, value_type: String },
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

pub(crate) fn read_property_list<R: Read + Seek>(
    r: &mut LittleEndianReader<R>,
    ctx: &CodecContext,
) -> io::Result<PropertyMap> {
    let mut map = PropertyMap::new();
    while let Some(property) = read_property(r, ctx)? {
        map.push(property);
    }
    Ok(map)
}

/// Read one tagged property, or `None` at the list terminator.
pub(crate) fn read_property<R: Read + Seek>(
    r: &mut LittleEndianReader<R>,
    ctx: &CodecContext,
) -> io::Result<Option<Property>> {
    let name = r.read_name()?;
    if name == NONE_NAME {
        return Ok(None);
    }

    let type_name = r.read_name()?;
    let size = r.read_i32()?;
    if size < 0 {
        return Err(invalid(format!("property {name}: negative size {size}")));
    }
    let array_index = r.read_i32()?;

    let header_start = r.position()?;
    let tag = read_tag_header(r, &type_name)
        .map_err(|e| invalid(format!("property {name} ({type_name}) tag: {e}")))?;
    let header_end = r.position()?;
    r.seek_to(header_start)?;
    let header = r.read_bytes((header_end - header_start) as usize)?;

    let guid = match r.read_u8()? {
        0 => None,
        1 => Some(Guid(r.read_array()?)),
        other => {
            return Err(invalid(format!(
                "property {name}: invalid has_guid flag {other}"
            )));
        }
    };

    let payload = r
        .read_bytes(size as usize)
        .map_err(|e| io::Error::new(e.kind(), format!("property {name} payload: {e}")))?;

    let value = decode_verified(&name, type_name, &tag, header, payload, ctx);
    Ok(Some(Property {
        name,
        array_index,
        guid,
        value,
    }))
}

fn read_tag_header<R: Read + Seek>(
    r: &mut LittleEndianReader<R>,
    type_name: &str,
) -> io::Result<TagHeader> {
    Ok(match type_name {
        STRUCT_PROPERTY => TagHeader::Struct {
            struct_name: r.read_name()?,
            struct_guid: Guid(r.read_array()?),
        },
        "BoolProperty" => TagHeader::Bool(r.read_u8()?),
        "ByteProperty" | "EnumProperty" => TagHeader::Enum(r.read_name()?),
        "ArrayProperty" | "SetProperty" => TagHeader::Container(r.read_name()?),
        "MapProperty" => TagHeader::Map {
            key_type: r.read_name()?,
            value_type: r.read_name()?,
        },
        _ => TagHeader::Plain,
    })
}

/// Decode a payload and accept the typed value only if it encodes back to the
/// exact header and payload bytes. Anything else is kept raw.
fn decode_verified(
    name: &str,
    type_name: String,
    tag: &TagHeader,
    header: Vec<u8>,
    payload: Vec<u8>,
    ctx: &CodecContext,
) -> PropertyValue {
    match decode_typed(&type_name, tag, &payload, ctx) {
        Ok(value) => match encode_value_parts(&value, ctx) {
            Ok((h, p)) if h == header && p == payload => return value,
            Ok(_) => log::warn!(
                "property {name} ({type_name}) does not re-encode identically; keeping raw bytes"
            ),
            Err(e) => log::warn!("property {name} ({type_name}) failed to re-encode: {e}"),
        },
        Err(e) => log::debug!("property {name} ({type_name}) kept raw: {e}"),
    }

    PropertyValue::Raw(RawValue {
        type_name,
        header,
        payload,
    })
}

fn decode_typed(
    type_name: &str,
    tag: &TagHeader,
    payload: &[u8],
    ctx: &CodecContext,
) -> io::Result<PropertyValue> {
    let mut r = LittleEndianReader::new(Cursor::new(payload));
    let value = match (type_name, tag) {
        ("BoolProperty", TagHeader::Bool(b)) => PropertyValue::Bool(match b {
            0 => false,
            1 => true,
            other => return Err(invalid(format!("bool byte {other}"))),
        }),
        ("Int8Property", _) => PropertyValue::Int8(r.read_i8()?),
        ("Int16Property", _) => PropertyValue::Int16(r.read_i16()?),
        ("IntProperty", _) => PropertyValue::Int(r.read_i32()?),
        ("Int64Property", _) => PropertyValue::Int64(r.read_i64()?),
        ("UInt16Property", _) => PropertyValue::UInt16(r.read_u16()?),
        ("UInt32Property", _) => PropertyValue::UInt32(r.read_u32()?),
        ("UInt64Property", _) => PropertyValue::UInt64(r.read_u64()?),
        ("FloatProperty", _) => PropertyValue::Float(r.read_f32()?),
        ("DoubleProperty", _) => PropertyValue::Double(r.read_f64()?),
        ("StrProperty", _) => PropertyValue::Str(r.read_fstring()?),
        ("NameProperty", _) => PropertyValue::Name(r.read_fstring()?),
        ("ObjectProperty", _) => PropertyValue::Object(r.read_fstring()?),
        ("ByteProperty", TagHeader::Enum(enum_name)) => PropertyValue::Byte {
            enum_name: enum_name.clone(),
            value: if enum_name == NONE_NAME {
                ByteValue::Byte(r.read_u8()?)
            } else {
                ByteValue::Label(r.read_fstring()?)
            },
        },
        ("EnumProperty", TagHeader::Enum(enum_name)) => PropertyValue::Enum {
            enum_name: enum_name.clone(),
            value: r.read_fstring()?,
        },
        (
            STRUCT_PROPERTY,
            TagHeader::Struct {
                struct_name,
                struct_guid,
            },
        ) => PropertyValue::Struct {
            struct_name: struct_name.clone(),
            struct_guid: *struct_guid,
            value: read_struct_value(&mut r, struct_name, &ctx.nested()?)?,
        },
        ("ArrayProperty", TagHeader::Container(inner_type)) => PropertyValue::Array {
            inner_type: inner_type.clone(),
            value: read_array(&mut r, inner_type, &ctx.nested()?)?,
        },
        ("SetProperty", TagHeader::Container(inner_type)) => {
            let ctx = &ctx.nested()?;
            read_removed_count(&mut r)?;
            let count = read_count(&mut r)?;
            let mut elements = Vec::with_capacity(count.min(payload.len()));
            for _ in 0..count {
                elements.push(read_element(&mut r, inner_type, ctx)?);
            }
            PropertyValue::Set {
                inner_type: inner_type.clone(),
                elements,
            }
        }
        (
            "MapProperty",
            TagHeader::Map {
                key_type,
                value_type,
            },
        ) => {
            let ctx = &ctx.nested()?;
            read_removed_count(&mut r)?;
            let count = read_count(&mut r)?;
            let mut entries = Vec::with_capacity(count.min(payload.len()));
            for _ in 0..count {
                entries.push(MapEntry {
                    key: read_element(&mut r, key_type, ctx)?,
                    value: read_element(&mut r, value_type, ctx)?,
                });
            }
            PropertyValue::Map {
                key_type: key_type.clone(),
                value_type: value_type.clone(),
                entries,
            }
        }
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("no typed decoding for {type_name}"),
            ));
        }
    };

    let left = r.remaining()?;
    if left != 0 {
        return Err(invalid(format!("{left} trailing payload bytes")));
    }
    Ok(value)
}

fn read_count<R: Read + Seek>(r: &mut LittleEndianReader<R>) -> io::Result<usize> {
    let count = r.read_i32()?;
    usize::try_from(count).map_err(|_| invalid(format!("negative element count {count}")))
}

fn read_removed_count<R: Read + Seek>(r: &mut LittleEndianReader<R>) -> io::Result<()> {
    match r.read_i32()? {
        0 => Ok(()),
        n => Err(invalid(format!("{n} removed entries"))),
    }
}

fn read_real<R: Read + Seek>(r: &mut LittleEndianReader<R>, ctx: &CodecContext) -> io::Result<f64> {
    if ctx.large_world_coordinates {
        r.read_f64()
    } else {
        r.read_f32().map(f64::from)
    }
}

fn read_struct_value<R: Read + Seek>(
    r: &mut LittleEndianReader<R>,
    struct_name: &str,
    ctx: &CodecContext,
) -> io::Result<StructValue> {
    Ok(match struct_name {
        "Vector" => StructValue::Vector(Vector {
            x: read_real(r, ctx)?,
            y: read_real(r, ctx)?,
            z: read_real(r, ctx)?,
        }),
        "Vector2D" => StructValue::Vector2D(Vector2D {
            x: read_real(r, ctx)?,
            y: read_real(r, ctx)?,
        }),
        "Rotator" => StructValue::Rotator(Rotator {
            pitch: read_real(r, ctx)?,
            yaw: read_real(r, ctx)?,
            roll: read_real(r, ctx)?,
        }),
        "Quat" => StructValue::Quat(Quat {
            x: read_real(r, ctx)?,
            y: read_real(r, ctx)?,
            z: read_real(r, ctx)?,
            w: read_real(r, ctx)?,
        }),
        "LinearColor" => StructValue::LinearColor(LinearColor {
            r: r.read_f32()?,
            g: r.read_f32()?,
            b: r.read_f32()?,
            a: r.read_f32()?,
        }),
        "Color" => StructValue::Color(Color {
            b: r.read_u8()?,
            g: r.read_u8()?,
            r: r.read_u8()?,
            a: r.read_u8()?,
        }),
        "IntPoint" => StructValue::IntPoint(IntPoint {
            x: r.read_i32()?,
            y: r.read_i32()?,
        }),
        "Guid" => StructValue::Guid(Guid(r.read_array()?)),
        "DateTime" => StructValue::DateTime(r.read_i64()?),
        "Timespan" => StructValue::Timespan(r.read_i64()?),
        _ => StructValue::Properties(read_property_list(r, ctx)?),
    })
}

fn read_array<R: Read + Seek>(
    r: &mut LittleEndianReader<R>,
    inner_type: &str,
    ctx: &CodecContext,
) -> io::Result<ArrayValue> {
    let count = read_count(r)?;
    let capacity = count.min(r.remaining()? as usize);

    if inner_type != STRUCT_PROPERTY {
        let mut elements = Vec::with_capacity(capacity);
        for _ in 0..count {
            elements.push(read_element(r, inner_type, ctx)?);
        }
        return Ok(ArrayValue::Base(elements));
    }

    let field_name = r.read_name()?;
    let tag_type = r.read_name()?;
    if tag_type != STRUCT_PROPERTY {
        return Err(invalid(format!("struct array inner tag has type {tag_type}")));
    }
    let size = r.read_i32()?;
    let index = r.read_i32()?;
    if index != 0 {
        return Err(invalid(format!("struct array inner tag index {index}")));
    }
    let struct_name = r.read_name()?;
    let struct_guid = Guid(r.read_array()?);
    if r.read_u8()? != 0 {
        return Err(invalid("struct array inner tag carries a guid"));
    }

    let start = r.position()?;
    let mut elements = Vec::with_capacity(capacity);
    for _ in 0..count {
        elements.push(read_struct_value(r, &struct_name, ctx)?);
    }
    let used = r.position()? - start;
    if i64::from(size) != used as i64 {
        return Err(invalid(format!(
            "struct array {field_name}: inner size {size}, elements used {used}"
        )));
    }

    Ok(ArrayValue::Struct {
        field_name,
        struct_name,
        struct_guid,
        elements,
    })
}

fn read_element<R: Read + Seek>(
    r: &mut LittleEndianReader<R>,
    type_name: &str,
    ctx: &CodecContext,
) -> io::Result<Element> {
    Ok(match type_name {
        "BoolProperty" => match r.read_u8()? {
            0 => Element::Bool(false),
            1 => Element::Bool(true),
            other => return Err(invalid(format!("bool element byte {other}"))),
        },
        "ByteProperty" => Element::Byte(r.read_u8()?),
        "Int8Property" => Element::Int8(r.read_i8()?),
        "Int16Property" => Element::Int16(r.read_i16()?),
        "IntProperty" => Element::Int(r.read_i32()?),
        "Int64Property" => Element::Int64(r.read_i64()?),
        "UInt16Property" => Element::UInt16(r.read_u16()?),
        "UInt32Property" => Element::UInt32(r.read_u32()?),
        "UInt64Property" => Element::UInt64(r.read_u64()?),
        "FloatProperty" => Element::Float(r.read_f32()?),
        "DoubleProperty" => Element::Double(r.read_f64()?),
        "StrProperty" => Element::Str(r.read_fstring()?),
        "NameProperty" => Element::Name(r.read_fstring()?),
        "ObjectProperty" => Element::Object(r.read_fstring()?),
        "EnumProperty" => Element::Enum(r.read_fstring()?),
        STRUCT_PROPERTY => Element::Struct(StructValue::Properties(read_property_list(r, ctx)?)),
        other => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("no element decoding for {other}"),
            ));
        }
    })
}

pub(crate) fn write_property_list(
    w: &mut LittleEndianWriter,
    map: &PropertyMap,
    ctx: &CodecContext,
) -> io::Result<()> {
    for property in map.iter() {
        write_property(w, property, ctx)?;
    }
    w.write_name(NONE_NAME)
}

pub(crate) fn write_property(
    w: &mut LittleEndianWriter,
    property: &Property,
    ctx: &CodecContext,
) -> io::Result<()> {
    let (header, payload) = encode_value_parts(&property.value, ctx)
        .map_err(|e| io::Error::new(e.kind(), format!("property {}: {e}", property.name)))?;
    w.write_name(&property.name)?;
    w.write_name(property.value.type_name())?;
    w.write_i32(checked_len(payload.len())?);
    w.write_i32(property.array_index);
    w.write_bytes(&header);
    match property.guid {
        Some(guid) => {
            w.write_u8(1);
            w.write_bytes(&guid.0);
        }
        None => w.write_u8(0),
    }
    w.write_bytes(&payload);
    Ok(())
}

/// Encode the type-specific tag header and the payload of a value.
fn encode_value_parts(value: &PropertyValue, ctx: &CodecContext) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let mut h = LittleEndianWriter::new();
    let mut p = LittleEndianWriter::new();

    match value {
        PropertyValue::Bool(v) => h.write_u8(u8::from(*v)),
        PropertyValue::Int8(v) => p.write_i8(*v),
        PropertyValue::Int16(v) => p.write_i16(*v),
        PropertyValue::Int(v) => p.write_i32(*v),
        PropertyValue::Int64(v) => p.write_i64(*v),
        PropertyValue::UInt16(v) => p.write_u16(*v),
        PropertyValue::UInt32(v) => p.write_u32(*v),
        PropertyValue::UInt64(v) => p.write_u64(*v),
        PropertyValue::Float(v) => p.write_f32(*v),
        PropertyValue::Double(v) => p.write_f64(*v),
        PropertyValue::Str(v) | PropertyValue::Name(v) | PropertyValue::Object(v) => {
            p.write_fstring(v.as_deref())?
        }
        PropertyValue::Byte { enum_name, value } => {
            h.write_name(enum_name)?;
            match value {
                ByteValue::Byte(b) => p.write_u8(*b),
                ByteValue::Label(label) => p.write_fstring(label.as_deref())?,
            }
        }
        PropertyValue::Enum { enum_name, value } => {
            h.write_name(enum_name)?;
            p.write_fstring(value.as_deref())?;
        }
        PropertyValue::Struct {
            struct_name,
            struct_guid,
            value,
        } => {
            h.write_name(struct_name)?;
            h.write_bytes(&struct_guid.0);
            write_struct_value(&mut p, value, ctx)?;
        }
        PropertyValue::Array { inner_type, value } => {
            h.write_name(inner_type)?;
            write_array(&mut p, inner_type, value, ctx)?;
        }
        PropertyValue::Set {
            inner_type,
            elements,
        } => {
            h.write_name(inner_type)?;
            p.write_i32(0);
            p.write_i32(checked_len(elements.len())?);
            for element in elements {
                write_element(&mut p, element, ctx)?;
            }
        }
        PropertyValue::Map {
            key_type,
            value_type,
            entries,
        } => {
            h.write_name(key_type)?;
            h.write_name(value_type)?;
            p.write_i32(0);
            p.write_i32(checked_len(entries.len())?);
            for entry in entries {
                write_element(&mut p, &entry.key, ctx)?;
                write_element(&mut p, &entry.value, ctx)?;
            }
        }
        PropertyValue::Raw(raw) => {
            h.write_bytes(&raw.header);
            p.write_bytes(&raw.payload);
        }
    }

    Ok((h.into_inner(), p.into_inner()))
}

fn write_real(w: &mut LittleEndianWriter, v: f64, ctx: &CodecContext) {
    if ctx.large_world_coordinates {
        w.write_f64(v);
    } else {
        w.write_f32(v as f32);
    }
}

fn write_struct_value(
    w: &mut LittleEndianWriter,
    value: &StructValue,
    ctx: &CodecContext,
) -> io::Result<()> {
    match value {
        StructValue::Vector(v) => {
            write_real(w, v.x, ctx);
            write_real(w, v.y, ctx);
            write_real(w, v.z, ctx);
        }
        StructValue::Vector2D(v) => {
            write_real(w, v.x, ctx);
            write_real(w, v.y, ctx);
        }
        StructValue::Rotator(v) => {
            write_real(w, v.pitch, ctx);
            write_real(w, v.yaw, ctx);
            write_real(w, v.roll, ctx);
        }
        StructValue::Quat(v) => {
            write_real(w, v.x, ctx);
            write_real(w, v.y, ctx);
            write_real(w, v.z, ctx);
            write_real(w, v.w, ctx);
        }
        StructValue::LinearColor(c) => {
            w.write_f32(c.r);
            w.write_f32(c.g);
            w.write_f32(c.b);
            w.write_f32(c.a);
        }
        StructValue::Color(c) => {
            w.write_u8(c.b);
            w.write_u8(c.g);
            w.write_u8(c.r);
            w.write_u8(c.a);
        }
        StructValue::IntPoint(p) => {
            w.write_i32(p.x);
            w.write_i32(p.y);
        }
        StructValue::Guid(g) => w.write_bytes(&g.0),
        StructValue::DateTime(ticks) | StructValue::Timespan(ticks) => w.write_i64(*ticks),
        StructValue::Properties(map) => write_property_list(w, map, ctx)?,
    }
    Ok(())
}

fn write_array(
    w: &mut LittleEndianWriter,
    inner_type: &str,
    value: &ArrayValue,
    ctx: &CodecContext,
) -> io::Result<()> {
    match value {
        ArrayValue::Base(elements) => {
            w.write_i32(checked_len(elements.len())?);
            for element in elements {
                write_element(w, element, ctx)?;
            }
        }
        ArrayValue::Struct {
            field_name,
            struct_name,
            struct_guid,
            elements,
        } => {
            if inner_type != STRUCT_PROPERTY {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("struct elements in an array of {inner_type}"),
                ));
            }
            w.write_i32(checked_len(elements.len())?);
            w.write_name(field_name)?;
            w.write_name(STRUCT_PROPERTY)?;
            let size_at = w.placeholder_i32();
            w.write_i32(0);
            w.write_name(struct_name)?;
            w.write_bytes(&struct_guid.0);
            w.write_u8(0);
            let start = w.len();
            for element in elements {
                write_struct_value(w, element, ctx)?;
            }
            let size = checked_len(w.len() - start)?;
            w.patch_i32(size_at, size)?;
        }
    }
    Ok(())
}

fn write_element(w: &mut LittleEndianWriter, element: &Element, ctx: &CodecContext) -> io::Result<()> {
    match element {
        Element::Bool(v) => w.write_u8(u8::from(*v)),
        Element::Byte(v) => w.write_u8(*v),
        Element::Int8(v) => w.write_i8(*v),
        Element::Int16(v) => w.write_i16(*v),
        Element::Int(v) => w.write_i32(*v),
        Element::Int64(v) => w.write_i64(*v),
        Element::UInt16(v) => w.write_u16(*v),
        Element::UInt32(v) => w.write_u32(*v),
        Element::UInt64(v) => w.write_u64(*v),
        Element::Float(v) => w.write_f32(*v),
        Element::Double(v) => w.write_f64(*v),
        Element::Str(v) | Element::Name(v) | Element::Object(v) | Element::Enum(v) => {
            w.write_fstring(v.as_deref())?
        }
        Element::Struct(value) => write_struct_value(w, value, ctx)?,
    }
    Ok(())
}
