//! Argument lists for the printf and scanf engines.

use std::any::Any;
use std::cell::Cell;

use crate::errno::{Result, StreamError};
use crate::serial::base::{ContainerBase, ParseFn, SerializeFn};
use crate::serial::value::Value;

/// One printf argument.
#[derive(Clone, Copy)]
pub enum Arg<'a> {
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(u8),
    Str(&'a [u8]),
    Ptr(usize),
    /// Target of `%n`.
    Count(&'a Cell<usize>),
    /// Data of a `%{...}` directive.
    Value(&'a dyn Any),
    /// `?` in the type slot of `%{...}`.
    Base(&'a ContainerBase),
    /// `?` in the format slot of `%{...}`.
    Serializer(SerializeFn),
}

impl<'a> Arg<'a> {
    pub(crate) fn int(self) -> Result<i64> {
        match self {
            Arg::Int(v) => Ok(v),
            Arg::Uint(v) => Ok(v as i64),
            Arg::Char(c) => Ok(i64::from(c)),
            Arg::Ptr(p) => Ok(p as i64),
            _ => Err(StreamError::InvalidArgument),
        }
    }

    pub(crate) fn uint(self) -> Result<u64> {
        self.int().map(|v| v as u64)
    }

    pub(crate) fn float(self) -> Result<f64> {
        match self {
            Arg::Float(v) => Ok(v),
            Arg::Int(v) => Ok(v as f64),
            Arg::Uint(v) => Ok(v as f64),
            _ => Err(StreamError::InvalidArgument),
        }
    }

    pub(crate) fn bytes(self) -> Result<&'a [u8]> {
        match self {
            Arg::Str(s) => Ok(s),
            _ => Err(StreamError::InvalidArgument),
        }
    }

    /// A name for `*` in a `%{...}` directive.
    pub(crate) fn name(self) -> Result<&'a str> {
        std::str::from_utf8(self.bytes()?).map_err(|_| StreamError::InvalidArgument)
    }
}

macro_rules! arg_from {
    ($variant:ident as $target:ty: $($ty:ty),*) => {
        $(impl From<$ty> for Arg<'_> {
            fn from(v: $ty) -> Self {
                Arg::$variant(<$target>::from(v))
            }
        })*
    };
}

arg_from!(Int as i64: i8, i16, i32, i64);
arg_from!(Uint as u64: u8, u16, u32, u64);
arg_from!(Float as f64: f32, f64);

impl From<isize> for Arg<'_> {
    fn from(v: isize) -> Self {
        Arg::Int(v as i64)
    }
}

impl From<usize> for Arg<'_> {
    fn from(v: usize) -> Self {
        Arg::Uint(v as u64)
    }
}

impl From<char> for Arg<'_> {
    fn from(c: char) -> Self {
        Arg::Char(u8::try_from(c).unwrap_or(b'?'))
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(s: &'a str) -> Self {
        Arg::Str(s.as_bytes())
    }
}

impl<'a> From<&'a String> for Arg<'a> {
    fn from(s: &'a String) -> Self {
        Arg::Str(s.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for Arg<'a> {
    fn from(s: &'a [u8]) -> Self {
        Arg::Str(s)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Arg<'a> {
    fn from(s: &'a [u8; N]) -> Self {
        Arg::Str(s)
    }
}

impl<'a> From<&'a Cell<usize>> for Arg<'a> {
    fn from(c: &'a Cell<usize>) -> Self {
        Arg::Count(c)
    }
}

impl<'a> From<&'a Value> for Arg<'a> {
    fn from(v: &'a Value) -> Self {
        Arg::Value(v)
    }
}

impl<'a> From<&'a ContainerBase> for Arg<'a> {
    fn from(b: &'a ContainerBase) -> Self {
        Arg::Base(b)
    }
}

/// One scanf destination.
pub enum ScanArg<'a> {
    Int(&'a mut i64),
    I32(&'a mut i32),
    Uint(&'a mut u64),
    U32(&'a mut u32),
    Float(&'a mut f64),
    F32(&'a mut f32),
    /// `%c` with no width.
    Char(&'a mut u8),
    Bytes(&'a mut Vec<u8>),
    /// `%s`, `%[`, `%c`; invalid UTF-8 is replaced.
    Str(&'a mut String),
    /// Target of `%n`.
    Count(&'a mut usize),
    /// Data of a `%{...}` directive.
    Value(&'a mut dyn Any),
    /// `*` in a `%{...}` directive.
    Name(&'a str),
    /// `?` in the type slot of `%{...}`.
    Base(&'a ContainerBase),
    /// `?` in the format slot of `%{...}`.
    Parser(ParseFn),
}

impl ScanArg<'_> {
    /// Store an integer, wrapping into narrower destinations.
    pub(crate) fn store_int(&mut self, v: i64) -> Result<()> {
        match self {
            ScanArg::Int(p) => **p = v,
            ScanArg::I32(p) => **p = v as i32,
            ScanArg::Uint(p) => **p = v as u64,
            ScanArg::U32(p) => **p = v as u32,
            ScanArg::Count(p) => **p = v as usize,
            ScanArg::Char(p) => **p = v as u8,
            _ => return Err(StreamError::InvalidArgument),
        }
        Ok(())
    }

    pub(crate) fn store_float(&mut self, v: f64) -> Result<()> {
        match self {
            ScanArg::Float(p) => **p = v,
            ScanArg::F32(p) => **p = v as f32,
            _ => return Err(StreamError::InvalidArgument),
        }
        Ok(())
    }

    pub(crate) fn store_bytes(&mut self, bytes: Vec<u8>) -> Result<()> {
        match self {
            ScanArg::Bytes(p) => **p = bytes,
            ScanArg::Str(p) => **p = String::from_utf8_lossy(&bytes).into_owned(),
            ScanArg::Char(p) if bytes.len() == 1 => **p = bytes[0],
            _ => return Err(StreamError::InvalidArgument),
        }
        Ok(())
    }
}

macro_rules! scan_from {
    ($($variant:ident: $ty:ty),*) => {
        $(impl<'a> From<&'a mut $ty> for ScanArg<'a> {
            fn from(p: &'a mut $ty) -> Self {
                ScanArg::$variant(p)
            }
        })*
    };
}

scan_from!(Int: i64, I32: i32, Uint: u64, U32: u32, Float: f64, F32: f32, Char: u8, Bytes: Vec<u8>, Str: String, Count: usize);

impl<'a> From<&'a mut Value> for ScanArg<'a> {
    fn from(v: &'a mut Value) -> Self {
        ScanArg::Value(v)
    }
}

impl<'a> From<&'a str> for ScanArg<'a> {
    fn from(name: &'a str) -> Self {
        ScanArg::Name(name)
    }
}

impl<'a> From<&'a ContainerBase> for ScanArg<'a> {
    fn from(b: &'a ContainerBase) -> Self {
        ScanArg::Base(b)
    }
}
