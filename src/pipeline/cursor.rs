//! Positional reads over an immutable container buffer.
//!
//! Every structure in a note container is addressed by an absolute offset,
//! so the cursor is little more than a `seek` plus a handful of bounded
//! reads. Out-of-range reads surface as [`NoteError::Parse`] rather than a
//! panic: a corrupt pointer in one layer must not take the process down.

use crate::error::NoteError;
use byteorder::{ByteOrder, LittleEndian};

/// A read position over a borrowed byte buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Move to an absolute offset. Seeking past the end is allowed; the next
    /// read fails instead.
    pub fn seek(&mut self, offset: usize) {
        self.pos = offset;
    }

    /// Read `len` raw bytes and advance.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], NoteError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                NoteError::parse(format!(
                    "read of {} bytes at offset {} runs past end of buffer ({} bytes)",
                    len,
                    self.pos,
                    self.data.len()
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, NoteError> {
        let bytes = self.read_bytes(4)?;
        Ok(LittleEndian::read_u32(bytes))
    }

    /// Read `len` bytes as UTF-8, replacing invalid sequences.
    pub fn read_string(&mut self, len: usize) -> Result<String, NoteError> {
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a length-prefixed block: `u32` LE size followed by that many bytes.
    ///
    /// A zero-length block yields an empty slice.
    pub fn read_block(&mut self) -> Result<&'a [u8], NoteError> {
        let size = self.read_u32_le()? as usize;
        if size == 0 {
            return Ok(&[]);
        }
        self.read_bytes(size)
    }

    pub fn read_block_string(&mut self) -> Result<String, NoteError> {
        let bytes = self.read_block()?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn reads_u32_little_endian() {
        let data = [0x78, 0x56, 0x34, 0x12, 0xff];
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.read_u32_le().unwrap(), 0x1234_5678);
        assert_eq!(c.position(), 4);
    }

    #[test]
    fn read_past_end_is_parse_error() {
        let data = [1, 2, 3];
        let mut c = ByteCursor::new(&data);
        assert!(matches!(c.read_u32_le(), Err(NoteError::Parse(_))));
    }

    #[test]
    fn seek_then_read_string() {
        let data = b"xxnoteyy";
        let mut c = ByteCursor::new(data);
        c.seek(2);
        assert_eq!(c.read_string(4).unwrap(), "note");
    }

    #[test]
    fn zero_length_block_is_empty() {
        let data = block(&[]);
        let mut c = ByteCursor::new(&data);
        assert!(c.read_block().unwrap().is_empty());
        assert_eq!(c.position(), 4);
    }

    #[test]
    fn block_as_string() {
        let data = block(b"<PAGEID:p1>");
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.read_block_string().unwrap(), "<PAGEID:p1>");
    }

    #[test]
    fn block_with_oversized_length_fails() {
        let mut data = 100u32.to_le_bytes().to_vec();
        data.extend_from_slice(b"short");
        let mut c = ByteCursor::new(&data);
        assert!(c.read_block().is_err());
    }
}
