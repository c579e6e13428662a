use std::io::{self, Read, Seek};

use serde::{Deserialize, Serialize};

use super::guid::Guid;
use crate::reader::LittleEndianReader;
use crate::writer::{LittleEndianWriter, checked_len};

pub const GVAS_MAGIC: [u8; 4] = *b"GVAS";

/// Save game file version that added the UE5 package version field.
const SAVE_VERSION_UE5_PACKAGE: i32 = 3;
/// Oldest save game file version with custom versions in the header.
const SAVE_VERSION_CUSTOM_VERSIONS: i32 = 2;
/// UE5 object version enabling double precision vectors.
const UE5_LARGE_WORLD_COORDINATES: i32 = 1004;
/// UE5 object version that changed the property tag layout.
const UE5_PROPERTY_TAG_EXTENSION: i32 = 1011;
const CUSTOM_VERSION_FORMAT_GUIDS: i32 = 3;
const MAX_CUSTOM_VERSIONS: i32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub changelist: u32,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomVersion {
    pub guid: Guid,
    pub version: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveHeader {
    pub save_game_version: i32,
    pub package_version_ue4: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version_ue5: Option<i32>,
    pub engine_version: EngineVersion,
    pub custom_version_format: i32,
    pub custom_versions: Vec<CustomVersion>,
    pub save_game_class: Option<String>,
}

impl SaveHeader {
    pub fn parse<R: Read + Seek>(r: &mut LittleEndianReader<R>) -> io::Result<Self> {
        let magic: [u8; 4] = r.read_array()?;
        if magic != GVAS_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("not a GVAS save: magic {magic:02X?}"),
            ));
        }

        let save_game_version = r.read_i32()?;
        if !(SAVE_VERSION_CUSTOM_VERSIONS..=SAVE_VERSION_UE5_PACKAGE).contains(&save_game_version)
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported save game version {save_game_version}"),
            ));
        }

        let package_version_ue4 = r.read_i32()?;
        let package_version_ue5 = if save_game_version >= SAVE_VERSION_UE5_PACKAGE {
            Some(r.read_i32()?)
        } else {
            None
        };
        if let Some(ue5) = package_version_ue5.filter(|v| *v >= UE5_PROPERTY_TAG_EXTENSION) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("UE5 package version {ue5} uses an unsupported property tag layout"),
            ));
        }

        let engine_version = EngineVersion {
            major: r.read_u16()?,
            minor: r.read_u16()?,
            patch: r.read_u16()?,
            changelist: r.read_u32()?,
            branch: r.read_fstring()?,
        };

        let custom_version_format = r.read_i32()?;
        if custom_version_format != CUSTOM_VERSION_FORMAT_GUIDS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported custom version format {custom_version_format}"),
            ));
        }
        let count = r.read_i32()?;
        if !(0..=MAX_CUSTOM_VERSIONS).contains(&count) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("custom version count {count} out of range"),
            ));
        }
        let mut custom_versions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            custom_versions.push(CustomVersion {
                guid: Guid(r.read_array()?),
                version: r.read_i32()?,
            });
        }

        let save_game_class = r.read_fstring()?;

        Ok(Self {
            save_game_version,
            package_version_ue4,
            package_version_ue5,
            engine_version,
            custom_version_format,
            custom_versions,
            save_game_class,
        })
    }

    pub fn write(&self, w: &mut LittleEndianWriter) -> io::Result<()> {
        w.write_bytes(&GVAS_MAGIC);
        w.write_i32(self.save_game_version);
        w.write_i32(self.package_version_ue4);
        if self.save_game_version >= SAVE_VERSION_UE5_PACKAGE {
            w.write_i32(self.package_version_ue5.unwrap_or_default());
        }
        w.write_u16(self.engine_version.major);
        w.write_u16(self.engine_version.minor);
        w.write_u16(self.engine_version.patch);
        w.write_u32(self.engine_version.changelist);
        w.write_fstring(self.engine_version.branch.as_deref())?;
        w.write_i32(self.custom_version_format);
        w.write_i32(checked_len(self.custom_versions.len())?);
        for cv in &self.custom_versions {
            w.write_bytes(&cv.guid.0);
            w.write_i32(cv.version);
        }
        w.write_fstring(self.save_game_class.as_deref())
    }

    pub fn large_world_coordinates(&self) -> bool {
        self.package_version_ue5
            .is_some_and(|v| v >= UE5_LARGE_WORLD_COORDINATES)
    }

    pub fn engine_label(&self) -> String {
        let v = &self.engine_version;
        format!("{}.{}.{}-{}", v.major, v.minor, v.patch, v.changelist)
    }
}
