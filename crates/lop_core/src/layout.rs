use std::fmt;
use std::io;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Sections of a GVAS file, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SectionId {
    Header,
    /// Top-level property by position in the root list.
    Property(usize),
    /// The `None` name closing the root property list.
    Terminator,
    Tail,
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionId::Header => write!(f, "header"),
            SectionId::Property(index) => write!(f, "property[{index}]"),
            SectionId::Terminator => write!(f, "terminator"),
            SectionId::Tail => write!(f, "tail"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionLayout {
    pub id: SectionId,
    pub range: ByteRange,
    /// Property name for `SectionId::Property` sections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileLayout {
    pub file_len: usize,
    pub sections: Vec<SectionLayout>,
}

impl FileLayout {
    pub fn section(&self, id: SectionId) -> Option<&SectionLayout> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn validate(&self) -> io::Result<()> {
        let Some(first) = self.sections.first() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "file layout must contain at least one section",
            ));
        };

        if first.range.start != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "layout does not start at byte 0",
            ));
        }

        let mut expected = 0usize;
        for section in &self.sections {
            if section.range.start != expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "layout gap/overlap around section {}: expected start {}, got {}",
                        section.id, expected, section.range.start
                    ),
                ));
            }
            if section.range.end < section.range.start {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "invalid section range {}: {}..{}",
                        section.id, section.range.start, section.range.end
                    ),
                ));
            }
            expected = section.range.end;
        }

        if expected != self.file_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "layout does not cover file: ended at {}, file length {}",
                    expected, self.file_len
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: SectionId, start: usize, end: usize) -> SectionLayout {
        SectionLayout {
            id,
            range: ByteRange { start, end },
            label: None,
        }
    }

    #[test]
    fn contiguous_layout_validates() {
        let layout = FileLayout {
            file_len: 10,
            sections: vec![
                section(SectionId::Header, 0, 4),
                section(SectionId::Property(0), 4, 8),
                section(SectionId::Tail, 8, 10),
            ],
        };
        layout.validate().expect("layout should be valid");
        assert_eq!(layout.section(SectionId::Property(0)).map(|s| s.range.len()), Some(4));
    }

    #[test]
    fn gap_is_reported() {
        let layout = FileLayout {
            file_len: 10,
            sections: vec![section(SectionId::Header, 0, 4), section(SectionId::Tail, 5, 10)],
        };
        let err = layout.validate().expect_err("gap should fail");
        assert!(err.to_string().contains("tail"));
    }
}
