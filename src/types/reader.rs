//! Bounds-checked cursor over a byte slice.

use crate::error::{Result, ThumbnailError};

/// A forward cursor over a byte slice.
///
/// Every read is checked against the end of the slice and fails with a
/// format error naming the current section instead of panicking. The cursor
/// never moves past the end.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    cursor: usize,
    section: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8], section: &'static str) -> Self {
        Self {
            data,
            cursor: 0,
            section,
        }
    }

    /// Name of the section errors are attributed to.
    pub fn section(&self) -> &'static str {
        self.section
    }

    pub fn set_section(&mut self, section: &'static str) {
        self.section = section;
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    /// Error value for this reader's section.
    pub fn error(&self, reason: impl Into<String>) -> ThumbnailError {
        ThumbnailError::format(self.section, reason)
    }

    /// Move the cursor to an absolute offset within the slice.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(self.error(format!(
                "offset {} is outside the {}-byte buffer",
                offset,
                self.data.len()
            )));
        }
        self.cursor = offset;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.error(format!(
                "unexpected end of data at offset {} (needed {} bytes, {} left)",
                self.cursor,
                n,
                self.remaining()
            )));
        }
        let bytes = &self.data[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Sub-reader over the next `n` bytes; advances this reader past them.
    pub fn sub_reader(&mut self, n: usize, section: &'static str) -> Result<ByteReader<'a>> {
        let bytes = self.read_bytes(n)?;
        Ok(ByteReader::new(bytes, section))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    /// 24-bit little-endian integer.
    pub fn read_u24_le(&mut self) -> Result<u32> {
        let [a, b, c] = self.read_array()?;
        Ok(u32::from_le_bytes([a, b, c, 0]))
    }

    /// 24-bit big-endian integer.
    pub fn read_u24_be(&mut self) -> Result<u32> {
        let [a, b, c] = self.read_array()?;
        Ok(u32::from_be_bytes([0, a, b, c]))
    }

    pub fn read_magic(&mut self) -> Result<[u8; 4]> {
        self.read_array()
    }
}
