//! Fixed-width primitive encoders.
//!
//! Thin wrappers over `byteorder` on top of the stream's `std::io` impls.
//! A short read is `StreamError::Eof`.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errno::{Result, StreamError};

use super::Stream;

macro_rules! primitive_pair {
    ($write:ident, $read:ident, $ty:ty, $wfn:ident, $rfn:ident, $order:ty) => {
        pub fn $write(&mut self, value: $ty) -> Result<()> {
            WriteBytesExt::$wfn::<$order>(self, value).map_err(StreamError::from)
        }

        pub fn $read(&mut self) -> Result<$ty> {
            ReadBytesExt::$rfn::<$order>(self).map_err(StreamError::from)
        }
    };
}

impl Stream {
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        WriteBytesExt::write_u8(self, value).map_err(StreamError::from)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        ReadBytesExt::read_u8(self).map_err(StreamError::from)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        WriteBytesExt::write_i8(self, value).map_err(StreamError::from)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        ReadBytesExt::read_i8(self).map_err(StreamError::from)
    }

    primitive_pair!(write_u16_le, read_u16_le, u16, write_u16, read_u16, LittleEndian);
    primitive_pair!(write_u16_be, read_u16_be, u16, write_u16, read_u16, BigEndian);
    primitive_pair!(write_i16_le, read_i16_le, i16, write_i16, read_i16, LittleEndian);
    primitive_pair!(write_i16_be, read_i16_be, i16, write_i16, read_i16, BigEndian);
    primitive_pair!(write_u32_le, read_u32_le, u32, write_u32, read_u32, LittleEndian);
    primitive_pair!(write_u32_be, read_u32_be, u32, write_u32, read_u32, BigEndian);
    primitive_pair!(write_i32_le, read_i32_le, i32, write_i32, read_i32, LittleEndian);
    primitive_pair!(write_i32_be, read_i32_be, i32, write_i32, read_i32, BigEndian);
    primitive_pair!(write_u64_le, read_u64_le, u64, write_u64, read_u64, LittleEndian);
    primitive_pair!(write_u64_be, read_u64_be, u64, write_u64, read_u64, BigEndian);
    primitive_pair!(write_i64_le, read_i64_le, i64, write_i64, read_i64, LittleEndian);
    primitive_pair!(write_i64_be, read_i64_be, i64, write_i64, read_i64, BigEndian);
    primitive_pair!(write_f32_le, read_f32_le, f32, write_f32, read_f32, LittleEndian);
    primitive_pair!(write_f32_be, read_f32_be, f32, write_f32, read_f32, BigEndian);
    primitive_pair!(write_f64_le, read_f64_le, f64, write_f64, read_f64, LittleEndian);
    primitive_pair!(write_f64_be, read_f64_be, f64, write_f64, read_f64, BigEndian);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_is_respected() {
        let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
        s.write_u16_le(0x0102).unwrap();
        s.write_u32_be(0x0304_0506).unwrap();
        s.write_i8(-1).unwrap();
        assert_eq!(
            s.underlying_buffer(),
            Some(&[0x02, 0x01, 0x03, 0x04, 0x05, 0x06, 0xff][..])
        );
        s.rewind().unwrap();
        assert_eq!(s.read_u16_le().unwrap(), 0x0102);
        assert_eq!(s.read_u32_be().unwrap(), 0x0304_0506);
        assert_eq!(s.read_i8().unwrap(), -1);
    }

    #[test]
    fn floats_and_wide_ints() {
        let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
        s.write_f64_be(-2.5).unwrap();
        s.write_i64_le(i64::MIN).unwrap();
        s.write_f32_le(0.25).unwrap();
        s.rewind().unwrap();
        assert_eq!(s.read_f64_be().unwrap(), -2.5);
        assert_eq!(s.read_i64_le().unwrap(), i64::MIN);
        assert_eq!(s.read_f32_le().unwrap(), 0.25);
    }

    #[test]
    fn short_read_is_eof() {
        let mut s = Stream::open_const_buffer(&[1u8, 2, 3][..], "rb").unwrap();
        assert_eq!(s.read_u32_le(), Err(StreamError::Eof));
    }
}
