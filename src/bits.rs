//! Bit-addressable views over byte slices.
//!
//! Bits are addressed in MSB-first order: bit 0 is the high bit of the first
//! byte in view. A [BitBuffer] is an immutable window that can be sub-sliced
//! without copying; a [BitCursor] consumes a buffer sequentially.

use crate::errors::ReadError;

/// An immutable, bit-addressable view over a byte region.
///
/// The view is a bit offset plus an optional bit length into a shared backing
/// slice. An unknown length is valid for slicing but not for integer
/// conversion. Sub-slicing adjusts offset and length only; bytes are never
/// copied. Reads are bounded by the view's declared end, not just the backing
/// slice, so a sub-view can never reach bits its parent does not cover.
#[derive(Debug, Clone, Copy)]
pub struct BitBuffer<'a> {
    data: &'a [u8],
    bit_offset: usize,
    bit_len: Option<usize>,
    /// Absolute end of readable bits: the declared end of the view, capped by
    /// the backing slice. Sub-views inherit and can only shrink it.
    bit_limit: usize,
}

impl<'a> BitBuffer<'a> {
    /// Creates a view of unknown length starting at `byte_offset`.
    pub fn new(data: &'a [u8], byte_offset: usize) -> Self {
        BitBuffer {
            data,
            bit_offset: byte_offset * 8,
            bit_len: None,
            bit_limit: data.len() * 8,
        }
    }

    /// Creates a view of `byte_len` bytes starting at `byte_offset`.
    pub fn with_len(data: &'a [u8], byte_offset: usize, byte_len: usize) -> Self {
        BitBuffer {
            data,
            bit_offset: byte_offset * 8,
            bit_len: Some(byte_len * 8),
            bit_limit: (data.len() * 8).min((byte_offset + byte_len) * 8),
        }
    }

    /// Length of this view in bits, if known.
    pub fn bit_len(&self) -> Option<usize> {
        self.bit_len
    }

    /// Returns the sub-view `[start, end)` in bits, relative to this view.
    ///
    /// Shares the same backing bytes. The result is empty when `end <= start`.
    /// A sub-view reaching past this view's declared end fails on read, not
    /// here.
    pub fn trim(&self, start: usize, end: usize) -> BitBuffer<'a> {
        let mut limit = self.bit_limit;
        if let Some(len) = self.bit_len {
            limit = limit.min(self.bit_offset + len);
        }
        BitBuffer {
            data: self.data,
            bit_offset: self.bit_offset + start,
            bit_len: Some(end.saturating_sub(start)),
            bit_limit: limit,
        }
    }

    /// Range-style slicing. Only contiguous (`step == 1`) slices are
    /// representable; any other step fails with [ReadError::UnsupportedStep].
    pub fn slice(&self, start: usize, end: usize, step: usize) -> Result<BitBuffer<'a>, ReadError> {
        if step != 1 {
            return Err(ReadError::UnsupportedStep(step));
        }
        Ok(self.trim(start, end))
    }

    /// Reads the single bit at `index` (relative to this view). Returns 0 or 1.
    pub fn bit_at(&self, index: usize) -> Result<u8, ReadError> {
        let pos = self.bit_offset + index;
        if pos >= self.bit_limit {
            return Err(ReadError::OutOfBounds {
                offset: index,
                requested: 1,
                available: self.bit_limit.saturating_sub(self.bit_offset),
            });
        }
        Ok((self.data[pos / 8] >> (7 - pos % 8)) & 1)
    }

    /// Converts the whole view to an unsigned integer, MSB-first.
    ///
    /// Extracts the remaining bits of the current byte, then continues into
    /// following bytes, accumulating big-endian. Requires a known length of at
    /// most 64 bits.
    pub fn to_uint(&self) -> Result<u64, ReadError> {
        let len = self.bit_len.ok_or(ReadError::UnknownLength)?;
        if len > 64 {
            return Err(ReadError::TooManyBits(len));
        }
        if self.bit_offset + len > self.bit_limit {
            return Err(ReadError::OutOfBounds {
                offset: self.bit_offset,
                requested: len,
                available: self.bit_limit.saturating_sub(self.bit_offset),
            });
        }

        let mut left = len;
        let mut pos = self.bit_offset / 8;
        let mut msb = self.bit_offset % 8;
        let mut res = 0u64;
        while left > 0 {
            let extractable = 8 - msb;
            let v = (self.data[pos] & ((1u16 << extractable) - 1) as u8) as u64;
            if extractable >= left {
                res += v >> (extractable - left);
                break;
            }
            left -= extractable;
            res += v << left;
            pos += 1;
            msb = 0;
        }
        Ok(res)
    }
}

/// Sequential reader over a [BitBuffer].
///
/// Tracks a monotonic read offset in bits; every [get](BitCursor::get)
/// advances it. Nested structure decodes share one cursor by mutable
/// reference, never by duplicating cursor state.
#[derive(Debug)]
pub struct BitCursor<'a> {
    buf: BitBuffer<'a>,
    offset: usize,
}

impl<'a> BitCursor<'a> {
    pub fn new(buf: BitBuffer<'a>) -> Self {
        BitCursor { buf, offset: 0 }
    }

    /// Bits consumed so far.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Extracts the next `n` bits as an unsigned integer and advances.
    pub fn get(&mut self, n: usize) -> Result<u64, ReadError> {
        let portion = self.buf.trim(self.offset, self.offset + n);
        let value = portion.to_uint()?;
        self.offset += n;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_at() {
        let buf = BitBuffer::new(&[0b10100000], 0);
        assert_eq!(buf.bit_at(0).unwrap(), 1);
        assert_eq!(buf.bit_at(1).unwrap(), 0);
        assert_eq!(buf.bit_at(2).unwrap(), 1);
    }

    #[test]
    fn test_bit_at_out_of_bounds() {
        let buf = BitBuffer::new(&[0xff], 0);
        assert!(matches!(
            buf.bit_at(8).unwrap_err(),
            ReadError::OutOfBounds { .. }
        ));
    }

    #[test]
    fn test_to_uint_whole_byte() {
        let buf = BitBuffer::with_len(&[0xAB], 0, 1);
        assert_eq!(buf.to_uint().unwrap(), 0xAB);
    }

    #[test]
    fn test_to_uint_crosses_byte_boundary() {
        // 13 bits starting at bit 3, crossing into the second byte.
        let data = [0b000_01111, 0b11111_100];
        let buf = BitBuffer::new(&data, 0).trim(3, 16);
        assert_eq!(buf.to_uint().unwrap(), 0b01111_11111_100);
    }

    #[test]
    fn test_to_uint_unknown_length() {
        let buf = BitBuffer::new(&[0xff], 0);
        assert_eq!(buf.to_uint().unwrap_err(), ReadError::UnknownLength);
    }

    #[test]
    fn test_to_uint_out_of_bounds() {
        let buf = BitBuffer::with_len(&[0xff], 0, 2);
        assert!(matches!(
            buf.to_uint().unwrap_err(),
            ReadError::OutOfBounds { .. }
        ));
    }

    #[test]
    fn test_to_uint_more_than_64() {
        let data = [0u8; 16];
        let buf = BitBuffer::new(&data, 0).trim(0, 65);
        assert_eq!(buf.to_uint().unwrap_err(), ReadError::TooManyBits(65));
    }

    #[test]
    fn test_trim_is_relative() {
        let data = [0x00, 0xF0];
        let outer = BitBuffer::new(&data, 0).trim(8, 16);
        let inner = outer.trim(0, 4);
        assert_eq!(inner.to_uint().unwrap(), 0xF);
    }

    #[test]
    fn test_byte_offset_constructor() {
        let data = [0x00, 0x42];
        let buf = BitBuffer::with_len(&data, 1, 1);
        assert_eq!(buf.to_uint().unwrap(), 0x42);
    }

    #[test]
    fn test_slice_rejects_step() {
        let buf = BitBuffer::new(&[0xff], 0);
        assert_eq!(
            buf.slice(0, 8, 2).unwrap_err(),
            ReadError::UnsupportedStep(2)
        );
        assert!(buf.slice(0, 8, 1).is_ok());
    }

    #[test]
    fn test_cursor_sequential_reads() {
        let data = [0b110_10001, 0b0_1111111];
        let mut cur = BitCursor::new(BitBuffer::new(&data, 0));
        assert_eq!(cur.get(3).unwrap(), 0b110);
        assert_eq!(cur.get(6).unwrap(), 0b10001_0);
        assert_eq!(cur.position(), 9);
        assert_eq!(cur.get(7).unwrap(), 0b1111111);
    }

    #[test]
    fn test_trim_cannot_extend_past_declared_end() {
        // The backing slice has more bytes than the view declares; a sub-view
        // reaching past the declared end must not see them.
        let data = [0xAB, 0xCD];
        let buf = BitBuffer::with_len(&data, 0, 1);
        assert!(matches!(
            buf.trim(4, 12).to_uint().unwrap_err(),
            ReadError::OutOfBounds { .. }
        ));
        assert!(matches!(
            buf.bit_at(8).unwrap_err(),
            ReadError::OutOfBounds { .. }
        ));
        assert_eq!(buf.trim(4, 8).to_uint().unwrap(), 0xB);
    }

    #[test]
    fn test_cursor_stops_at_declared_length() {
        let data = [0xAB, 0xCD];
        let mut cur = BitCursor::new(BitBuffer::with_len(&data, 0, 1));
        assert_eq!(cur.get(8).unwrap(), 0xAB);
        let err = cur.get(8).unwrap_err();
        assert_eq!(
            err,
            ReadError::OutOfBounds {
                offset: 8,
                requested: 8,
                available: 0,
            }
        );
    }

    #[test]
    fn test_nested_trim_inherits_parent_end() {
        let data = [0xFF, 0xFF, 0xFF];
        let outer = BitBuffer::with_len(&data, 0, 2).trim(0, 13);
        assert!(outer.trim(10, 20).to_uint().is_err());
        assert_eq!(outer.trim(10, 13).to_uint().unwrap(), 0b111);
    }

    #[test]
    fn test_cursor_past_end() {
        let data = [0xff];
        let mut cur = BitCursor::new(BitBuffer::new(&data, 0));
        cur.get(4).unwrap();
        assert!(matches!(
            cur.get(5).unwrap_err(),
            ReadError::OutOfBounds { .. }
        ));
    }
}
