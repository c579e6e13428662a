use std::io;

#[derive(Debug, Default)]
pub struct LittleEndianWriter {
    buf: Vec<u8>,
}

impl LittleEndianWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write an `FString`. `None` is the null string (length 0). Text made only
    /// of Latin-1 characters is stored single-byte, anything else as UTF-16LE.
    pub fn write_fstring(&mut self, value: Option<&str>) -> io::Result<()> {
        let Some(text) = value else {
            self.write_i32(0);
            return Ok(());
        };

        if text.chars().all(|c| (c as u32) <= 0xFF) {
            let len = checked_len(text.chars().count() + 1)?;
            self.write_i32(len);
            for c in text.chars() {
                self.buf.push(c as u32 as u8);
            }
            self.buf.push(0);
        } else {
            let units: Vec<u16> = text.encode_utf16().collect();
            let len = checked_len(units.len() + 1)?;
            self.write_i32(-len);
            for unit in units {
                self.write_u16(unit);
            }
            self.write_u16(0);
        }
        Ok(())
    }

    pub fn write_name(&mut self, name: &str) -> io::Result<()> {
        self.write_fstring(Some(name))
    }

    /// Reserve an i32 slot to be filled by [`patch_i32`](Self::patch_i32).
    pub fn placeholder_i32(&mut self) -> usize {
        let at = self.buf.len();
        self.write_i32(0);
        at
    }

    pub fn patch_i32(&mut self, at: usize, v: i32) -> io::Result<()> {
        let Some(slot) = self.buf.get_mut(at..at + 4) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("patch offset {at} out of range (len {})", self.buf.len()),
            ));
        };
        slot.copy_from_slice(&v.to_le_bytes());
        Ok(())
    }
}

pub(crate) fn checked_len(n: usize) -> io::Result<i32> {
    i32::try_from(n).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("length {n} does not fit in i32"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::LittleEndianWriter;

    #[test]
    fn narrow_and_wide_strings_pick_encoding_by_content() {
        let mut w = LittleEndianWriter::new();
        w.write_fstring(Some("abc")).unwrap();
        w.write_fstring(Some("\u{3042}")).unwrap();
        w.write_fstring(None).unwrap();
        w.write_fstring(Some("")).unwrap();

        let out = w.into_inner();
        assert_eq!(&out[..8], &[4, 0, 0, 0, b'a', b'b', b'c', 0]);
        assert_eq!(&out[8..12], &(-2i32).to_le_bytes());
        assert_eq!(&out[12..16], &[0x42, 0x30, 0, 0]);
        assert_eq!(&out[16..20], &[0, 0, 0, 0]);
        assert_eq!(&out[20..], &[1, 0, 0, 0, 0]);
    }

    #[test]
    fn patch_rewrites_placeholder() {
        let mut w = LittleEndianWriter::new();
        let at = w.placeholder_i32();
        w.write_u8(9);
        w.patch_i32(at, 0x0102_0304).unwrap();
        assert_eq!(w.into_inner(), vec![4, 3, 2, 1, 9]);
        let mut short = LittleEndianWriter::new();
        assert!(short.patch_i32(0, 1).is_err());
    }
}
