//! # Byte Cursor
//!
//! Positional reader/writer over a fixed-capacity byte buffer.
//!
//! The cursor never grows its buffer: every read or write that would cross
//! the buffer bound fails with `OutOfRange` and leaves the position untouched.

use crate::error::{LapRfError, Result};

use super::number::{Number, NumberType};

/// Byte order for multi-byte reads/writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Wire format default
    #[default]
    Little,
    Big,
}

/// Cursor over a fixed byte region
///
/// `B` is anything viewable as a byte slice: a borrowed `&[u8]` for decoding,
/// an owned array for encoding.
///
/// # Examples
///
/// ```no_run
/// use laprf_codec::laprf::cursor::ByteCursor;
///
/// let data = [0x5A, 0x0E, 0x00];
/// let mut cursor = ByteCursor::new(&data[..]);
/// cursor.seek(1)?;
/// assert_eq!(cursor.read_u16()?, 14);
/// # Ok::<(), laprf_codec::error::LapRfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ByteCursor<B> {
    buf: B,
    position: usize,
    endian: Endian,
}

macro_rules! read_write_number {
    ($read:ident, $write:ident, $ty:ty, $width:literal) => {
        pub fn $read(&mut self) -> Result<$ty> {
            let bytes = self.take::<$width>()?;
            Ok(match self.endian {
                Endian::Little => <$ty>::from_le_bytes(bytes),
                Endian::Big => <$ty>::from_be_bytes(bytes),
            })
        }

        pub fn $write(&mut self, value: $ty) -> Result<()>
        where
            B: AsMut<[u8]>,
        {
            let bytes = match self.endian {
                Endian::Little => value.to_le_bytes(),
                Endian::Big => value.to_be_bytes(),
            };
            self.put(&bytes)
        }
    };
}

impl<B: AsRef<[u8]>> ByteCursor<B> {
    /// Wrap a buffer, positioned at 0, little-endian
    pub fn new(buf: B) -> Self {
        Self {
            buf,
            position: 0,
            endian: Endian::Little,
        }
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total capacity of the underlying buffer
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.as_ref().len()
    }

    /// Bytes left between the position and the buffer end
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.position
    }

    /// Move to an absolute position (the end of the buffer is a valid position)
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.capacity() {
            return Err(LapRfError::OutOfRange {
                position,
                requested: 0,
                capacity: self.capacity(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// Advance the position by `count` bytes
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.check(count)?;
        self.position += count;
        Ok(())
    }

    /// Borrow `[begin, end)` of the underlying buffer
    pub fn slice(&self, begin: usize, end: usize) -> Result<&[u8]> {
        if begin > end || end > self.capacity() {
            return Err(LapRfError::OutOfRange {
                position: begin,
                requested: end.saturating_sub(begin),
                capacity: self.capacity(),
            });
        }
        Ok(&self.buf.as_ref()[begin..end])
    }

    /// Bytes written or consumed so far (`[0, position)`)
    pub fn filled(&self) -> &[u8] {
        &self.buf.as_ref()[..self.position]
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    read_write_number!(read_u8, write_u8, u8, 1);
    read_write_number!(read_u16, write_u16, u16, 2);
    read_write_number!(read_u32, write_u32, u32, 4);
    read_write_number!(read_u64, write_u64, u64, 8);
    read_write_number!(read_f32, write_f32, f32, 4);
    read_write_number!(read_f64, write_f64, f64, 8);

    /// Read a value of the given number type
    pub fn read(&mut self, number_type: NumberType) -> Result<Number> {
        Ok(match number_type {
            NumberType::U8 => Number::U8(self.read_u8()?),
            NumberType::U16 => Number::U16(self.read_u16()?),
            NumberType::U32 => Number::U32(self.read_u32()?),
            NumberType::U64 => Number::U64(self.read_u64()?),
            NumberType::F32 => Number::F32(self.read_f32()?),
            NumberType::F64 => Number::F64(self.read_f64()?),
        })
    }

    /// Write a value using its own number type
    pub fn write(&mut self, value: Number) -> Result<()>
    where
        B: AsMut<[u8]>,
    {
        match value {
            Number::U8(v) => self.write_u8(v),
            Number::U16(v) => self.write_u16(v),
            Number::U32(v) => self.write_u32(v),
            Number::U64(v) => self.write_u64(v),
            Number::F32(v) => self.write_f32(v),
            Number::F64(v) => self.write_f64(v),
        }
    }

    fn check(&self, requested: usize) -> Result<()> {
        if requested > self.remaining() {
            return Err(LapRfError::OutOfRange {
                position: self.position,
                requested,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.check(N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.buf.as_ref()[self.position..self.position + N]);
        self.position += N;
        Ok(bytes)
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()>
    where
        B: AsMut<[u8]>,
    {
        self.check(bytes.len())?;
        let start = self.position;
        self.buf.as_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_little_endian() {
        let cursor = ByteCursor::new(&[0u8; 4][..]);
        assert_eq!(cursor.endian(), Endian::Little);
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.remaining(), 4);
    }

    #[test]
    fn test_read_little_endian() {
        let data = [0x02, 0xDA, 0x70, 0x17, 0x00, 0x00];
        let mut cursor = ByteCursor::new(&data[..]);

        assert_eq!(cursor.read_u16().unwrap(), 0xDA02);
        assert_eq!(cursor.read_u32().unwrap(), 6000);
        assert_eq!(cursor.position(), 6);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_read_big_endian() {
        let data = [0xDA, 0x02];
        let mut cursor = ByteCursor::new(&data[..]).with_endian(Endian::Big);
        assert_eq!(cursor.read_u16().unwrap(), 0xDA02);
    }

    #[test]
    fn test_read_u64_and_f32() {
        let data = [
            0x60, 0x51, 0xFC, 0xAF, 0x01, 0x00, 0x00, 0x00, // 7247516000
            0x00, 0x80, 0x89, 0x44, // 1100.0
        ];
        let mut cursor = ByteCursor::new(&data[..]);
        assert_eq!(cursor.read_u64().unwrap(), 7_247_516_000);
        assert_eq!(cursor.read_f32().unwrap(), 1100.0);
    }

    #[test]
    fn test_generic_read_dispatches_on_type() {
        let data = [0x3A, 0x00, 0x80, 0x16];
        let mut cursor = ByteCursor::new(&data[..]);
        assert_eq!(cursor.read(NumberType::U16).unwrap(), Number::U16(58));
        assert_eq!(cursor.read(NumberType::U16).unwrap(), Number::U16(5760));
    }

    #[test]
    fn test_write_then_read_back() {
        let mut cursor = ByteCursor::new([0u8; 16]);
        cursor.write(Number::U8(0x5A)).unwrap();
        cursor.write_u16(0x0025).unwrap();
        cursor.write(Number::F64(-2.5)).unwrap();
        assert_eq!(cursor.position(), 11);
        assert_eq!(&cursor.filled()[..3], &[0x5A, 0x25, 0x00]);

        cursor.seek(3).unwrap();
        assert_eq!(cursor.read_f64().unwrap(), -2.5);
    }

    #[test]
    fn test_read_past_end_is_out_of_range() {
        let data = [0x01, 0x02, 0x03];
        let mut cursor = ByteCursor::new(&data[..]);
        cursor.skip(2).unwrap();

        let err = cursor.read_u16().unwrap_err();
        assert!(matches!(
            err,
            LapRfError::OutOfRange { position: 2, requested: 2, capacity: 3 }
        ));
        // Failed reads do not move the cursor
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.read_u8().unwrap(), 0x03);
    }

    #[test]
    fn test_write_past_end_is_out_of_range() {
        let mut cursor = ByteCursor::new([0u8; 3]);
        cursor.write_u16(1).unwrap();
        assert!(cursor.write_u32(1).is_err());
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_seek_and_skip_bounds() {
        let mut cursor = ByteCursor::new(&[0u8; 4][..]);
        assert!(cursor.seek(4).is_ok());
        assert!(cursor.seek(5).is_err());
        cursor.seek(1).unwrap();
        assert!(cursor.skip(3).is_ok());
        assert!(cursor.skip(1).is_err());
    }

    #[test]
    fn test_slice() {
        let data = [1u8, 2, 3, 4, 5];
        let cursor = ByteCursor::new(&data[..]);
        assert_eq!(cursor.slice(1, 4).unwrap(), &[2, 3, 4]);
        assert!(cursor.slice(3, 2).is_err());
        assert!(cursor.slice(0, 6).is_err());
    }
}
