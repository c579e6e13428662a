//! Unreal Engine GVAS save container: header, tagged property tree, trailer.

mod codec;
pub mod guid;
pub mod header;
pub mod property;

use std::io::{self, Cursor, Read, Seek};

use serde::{Deserialize, Serialize};

use crate::layout::{ByteRange, FileLayout, SectionId, SectionLayout};
use crate::reader::LittleEndianReader;
use crate::writer::LittleEndianWriter;
use codec::{CodecContext, read_property, write_property_list};
pub use guid::Guid;
pub use header::{CustomVersion, EngineVersion, SaveHeader};
pub use property::{
    ArrayValue, ByteValue, Color, Element, IntPoint, LinearColor, MapEntry, Property, PropertyMap,
    PropertyValue, Quat, RawValue, Rotator, StructValue, Vector, Vector2D,
};

#[derive(Debug, Clone)]
pub struct Document {
    pub header: SaveHeader,
    pub root: PropertyMap,
    pub trailer: Vec<u8>,
    layout: FileLayout,
    original: Vec<u8>,
    roundtrip_exact: bool,
}

/// Serializable form of a whole document, used for JSON export/import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentJson {
    pub header: SaveHeader,
    pub root: PropertyMap,
    #[serde(with = "property::base64_bytes")]
    pub trailer: Vec<u8>,
}

struct Capture {
    sections: Vec<SectionLayout>,
}

impl Capture {
    fn new() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    fn record(&mut self, id: SectionId, start: usize, end: usize, label: Option<String>) {
        self.sections.push(SectionLayout {
            id,
            range: ByteRange { start, end },
            label,
        });
    }
}

impl Document {
    pub fn parse_with_layout<R: Read + Seek>(mut reader: R) -> io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        let mut capture = Capture::new();
        let mut r = LittleEndianReader::new(Cursor::new(bytes.as_slice()));

        let header = SaveHeader::parse(&mut r)?;
        let header_end = r.position()? as usize;
        capture.record(SectionId::Header, 0, header_end, None);

        let ctx = context_for(&header);
        let mut root = PropertyMap::new();
        loop {
            let start = r.position()? as usize;
            let index = root.len();
            let next = read_property(&mut r, &ctx).map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("root property {index} at offset {start}: {e}"),
                )
            })?;
            let end = r.position()? as usize;
            match next {
                Some(property) => {
                    capture.record(
                        SectionId::Property(index),
                        start,
                        end,
                        Some(property.name.clone()),
                    );
                    root.push(property);
                }
                None => {
                    capture.record(SectionId::Terminator, start, end, None);
                    break;
                }
            }
        }

        let consumed = r.position()? as usize;
        let file_len = bytes.len();
        if consumed < file_len {
            capture.record(SectionId::Tail, consumed, file_len, None);
        }

        let layout = FileLayout {
            file_len,
            sections: capture.sections,
        };
        layout.validate()?;

        let trailer = bytes[consumed..].to_vec();
        let mut doc = Self {
            header,
            root,
            trailer,
            layout,
            original: bytes,
            roundtrip_exact: false,
        };

        doc.roundtrip_exact = doc.encode()? == doc.original;
        if doc.roundtrip_exact {
            log::debug!(
                "parsed GVAS document: {} root properties, {} trailer bytes",
                doc.root.len(),
                doc.trailer.len()
            );
        } else {
            log::warn!("GVAS document does not re-encode byte-identically");
        }

        Ok(doc)
    }

    /// Build a document from its parts; the result is encoded and parsed back
    /// so the layout and original bytes describe the new file.
    pub fn from_parts(header: SaveHeader, root: PropertyMap, trailer: Vec<u8>) -> io::Result<Self> {
        let bytes = encode_parts(&header, &root, &trailer)?;
        Self::parse_with_layout(Cursor::new(bytes))
    }

    pub fn from_json(json: DocumentJson) -> io::Result<Self> {
        Self::from_parts(json.header, json.root, json.trailer)
    }

    pub fn to_json(&self) -> DocumentJson {
        DocumentJson {
            header: self.header.clone(),
            root: self.root.clone(),
            trailer: self.trailer.clone(),
        }
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    /// Whether re-encoding the freshly parsed tree reproduced the input.
    pub fn roundtrip_exact(&self) -> bool {
        self.roundtrip_exact
    }

    pub fn section_bytes(&self, id: SectionId) -> Option<&[u8]> {
        self.layout
            .section(id)
            .and_then(|s| self.original.get(s.range.start..s.range.end))
    }

    /// Count of properties anywhere in the tree kept as raw bytes.
    pub fn raw_property_count(&self) -> usize {
        count_raw(&self.root)
    }

    pub fn to_bytes_unmodified(&self) -> io::Result<Vec<u8>> {
        Ok(self.original.clone())
    }

    pub fn to_bytes_modified(&self) -> io::Result<Vec<u8>> {
        self.encode()
    }

    fn encode(&self) -> io::Result<Vec<u8>> {
        encode_parts(&self.header, &self.root, &self.trailer)
    }
}

fn context_for(header: &SaveHeader) -> CodecContext {
    CodecContext {
        large_world_coordinates: header.large_world_coordinates(),
        ..CodecContext::default()
    }
}

fn encode_parts(header: &SaveHeader, root: &PropertyMap, trailer: &[u8]) -> io::Result<Vec<u8>> {
    let mut w = LittleEndianWriter::new();
    header.write(&mut w)?;
    write_property_list(&mut w, root, &context_for(header))?;
    w.write_bytes(trailer);
    Ok(w.into_inner())
}

fn count_raw(map: &PropertyMap) -> usize {
    map.iter().map(|p| count_raw_value(&p.value)).sum()
}

fn count_raw_value(value: &PropertyValue) -> usize {
    match value {
        PropertyValue::Raw(_) => 1,
        PropertyValue::Struct { value, .. } => count_raw_struct(value),
        PropertyValue::Array {
            value: ArrayValue::Struct { elements, .. },
            ..
        } => elements.iter().map(count_raw_struct).sum(),
        _ => 0,
    }
}

fn count_raw_struct(value: &StructValue) -> usize {
    value.as_properties().map(count_raw).unwrap_or(0)
}
