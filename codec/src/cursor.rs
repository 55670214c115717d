//! Byte cursor over an in-memory snapshot image.
//!
//! All reads are little-endian. The cursor tracks its absolute position so
//! every error names the offending offset and deferred payloads can be
//! re-read later through a fresh file handle.

use exodus_common::{Asset, FormatError, Symbol};

/// Forward-only reader over a byte slice with absolute position tracking
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Construct over the whole image, positioned at `start`
    pub fn new(data: &'a [u8], start: usize) -> Self {
        Self { data, pos: start }
    }

    /// Absolute position in the image
    pub fn pos(&self) -> u64 {
        self.pos as u64
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, needed: usize, what: &'static str) -> Result<&'a [u8], FormatError> {
        if self.remaining() < needed {
            return Err(FormatError::Truncated {
                what,
                offset: self.pos(),
                needed,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, FormatError> {
        let bytes = self.take(2, "u16")?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        let bytes = self.take(4, "u32")?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, FormatError> {
        let bytes = self.take(8, "u64")?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> Result<i64, FormatError> {
        let bytes = self.take(8, "i64")?;
        Ok(i64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_bool(&mut self) -> Result<bool, FormatError> {
        let offset = self.pos();
        match self.take(1, "bool")?[0] {
            0 => Ok(false),
            1 => Ok(true),
            found => Err(FormatError::BadPresenceByte { found, offset }),
        }
    }

    pub fn read_bytes(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], FormatError> {
        self.take(len, what)
    }

    /// `amount: i64` + `symbol: u64`
    pub fn read_asset(&mut self) -> Result<Asset, FormatError> {
        let amount = self.read_i64()?;
        let symbol = Symbol(self.read_u64()?);
        Ok(Asset { amount, symbol })
    }

    /// `u32` length prefix + UTF-8 bytes
    pub fn read_string(&mut self) -> Result<String, FormatError> {
        let len = self.read_u32()? as usize;
        let offset = self.pos();
        let bytes = self.take(len, "string body")?;
        String::from_utf8(bytes.to_vec()).map_err(|_| FormatError::InvalidString { offset })
    }

    /// Skip over a length-prefixed payload, returning where its bytes start
    /// and how long they are, for deferred decoding through a fresh handle.
    pub fn skip_payload(&mut self) -> Result<(u64, u32), FormatError> {
        let len = self.read_u32()?;
        let offset = self.pos();
        self.take(len as usize, "deferred payload")?;
        Ok((offset, len))
    }

    /// Presence byte (0/1) then payload
    pub fn read_optional<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, FormatError>,
    ) -> Result<Option<T>, FormatError> {
        let offset = self.pos();
        match self.take(1, "presence byte")?[0] {
            0 => Ok(None),
            1 => Ok(Some(read(self)?)),
            found => Err(FormatError::BadPresenceByte { found, offset }),
        }
    }

    /// `u32` count prefix + that many elements
    pub fn read_vec<T>(
        &mut self,
        mut read: impl FnMut(&mut Self) -> Result<T, FormatError>,
    ) -> Result<Vec<T>, FormatError> {
        let count = self.read_u32()? as usize;
        let mut items = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    #[test]
    fn little_endian_primitives() {
        let data = image(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        let mut cur = Cursor::new(&data, 0);
        assert_eq!(cur.read_u8().unwrap(), 0x01);
        assert_eq!(cur.read_u32().unwrap(), 0x0504_0302);
        assert_eq!(cur.pos(), 5);
        assert!(cur.at_end());
    }

    #[test]
    fn truncation_reports_offset() {
        let data = image(&[0x01, 0x02]);
        let mut cur = Cursor::new(&data, 0);
        let err = cur.read_u32().unwrap_err();
        match err {
            FormatError::Truncated {
                offset,
                needed,
                available,
                ..
            } => {
                assert_eq!(offset, 0);
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn string_and_asset() {
        let mut data = Vec::new();
        data.extend_from_slice(&5u32.to_le_bytes());
        data.extend_from_slice(b"alice");
        data.extend_from_slice(&1000i64.to_le_bytes());
        data.extend_from_slice(&Symbol::new(3, "GLS").0.to_le_bytes());

        let mut cur = Cursor::new(&data, 0);
        assert_eq!(cur.read_string().unwrap(), "alice");
        let asset = cur.read_asset().unwrap();
        assert_eq!(asset.amount, 1000);
        assert_eq!(asset.symbol.code(), "GLS");
    }

    #[test]
    fn skip_payload_records_span() {
        let mut data = Vec::new();
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(b"body");
        data.push(0xff);

        let mut cur = Cursor::new(&data, 0);
        let (offset, len) = cur.skip_payload().unwrap();
        assert_eq!(offset, 4);
        assert_eq!(len, 4);
        assert_eq!(cur.read_u8().unwrap(), 0xff);
    }

    #[test]
    fn optional_presence_byte_is_strict() {
        let data = image(&[2]);
        let mut cur = Cursor::new(&data, 0);
        assert!(cur.read_optional(|c| c.read_u8()).is_err());
    }
}
