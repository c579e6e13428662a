use std::io::{self, Read, Seek, SeekFrom};

const MAX_FSTRING_UNITS: i64 = 1 << 24;

pub struct LittleEndianReader<R> {
    inner: R,
}

impl<R: Read + Seek> LittleEndianReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_i8(&mut self) -> io::Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.inner.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        let mut buf = [0u8; 2];
        self.inner.read_exact(&mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_i64(&mut self) -> io::Result<i64> {
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_f32(&mut self) -> io::Result<f32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    pub fn read_f64(&mut self) -> io::Result<f64> {
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    pub fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let remaining = self.remaining()?;
        if n as u64 > remaining {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("wanted {n} bytes, only {remaining} remain"),
            ));
        }
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read an Unreal `FString`.
    ///
    /// A zero length is the null string and yields `None`. Positive lengths are
    /// single-byte (Latin-1) text, negative lengths are UTF-16LE; both count the
    /// trailing NUL, which is consumed but not returned.
    pub fn read_fstring(&mut self) -> io::Result<Option<String>> {
        let len = self.read_i32()? as i64;
        if len == 0 {
            return Ok(None);
        }
        if len.abs() > MAX_FSTRING_UNITS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("string length {len} out of range"),
            ));
        }

        if len > 0 {
            let bytes = self.read_bytes(len as usize)?;
            let (body, nul) = bytes.split_at(bytes.len() - 1);
            if nul[0] != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "narrow string missing NUL terminator",
                ));
            }
            return Ok(Some(body.iter().map(|&b| b as char).collect()));
        }

        let units = (-len) as usize;
        let bytes = self.read_bytes(units * 2)?;
        let mut wide: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        if wide.pop() != Some(0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "wide string missing NUL terminator",
            ));
        }
        String::from_utf16(&wide)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Read an `FString` that must not be null, such as a property or type name.
    pub fn read_name(&mut self) -> io::Result<String> {
        self.read_fstring()?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "unexpected null name string")
        })
    }

    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Current(n as i64))?;
        Ok(())
    }

    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    pub fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn len(&mut self) -> io::Result<u64> {
        let cur = self.position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(cur))?;
        Ok(end)
    }

    pub fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn remaining(&mut self) -> io::Result<u64> {
        let cur = self.position()?;
        Ok(self.len()?.saturating_sub(cur))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::LittleEndianReader;

    #[test]
    fn reads_narrow_wide_and_null_strings() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4i32.to_le_bytes());
        bytes.extend_from_slice(b"abc\0");
        bytes.extend_from_slice(&(-3i32).to_le_bytes());
        for unit in ['h' as u16, 0x00e9, 0] {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes.extend_from_slice(&0i32.to_le_bytes());

        let mut r = LittleEndianReader::new(Cursor::new(bytes));
        assert_eq!(r.read_fstring().unwrap().as_deref(), Some("abc"));
        assert_eq!(r.read_fstring().unwrap().as_deref(), Some("h\u{e9}"));
        assert_eq!(r.read_fstring().unwrap(), None);
        assert_eq!(r.remaining().unwrap(), 0);
    }

    #[test]
    fn rejects_oversized_byte_reads() {
        let mut r = LittleEndianReader::new(Cursor::new(vec![1u8, 2, 3]));
        assert!(r.read_bytes(4).is_err());
        assert_eq!(r.read_bytes(3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn narrow_string_without_terminator_is_rejected() {
        let mut bytes = 2i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"ab");
        let mut r = LittleEndianReader::new(Cursor::new(bytes));
        assert!(r.read_fstring().is_err());
    }
}
