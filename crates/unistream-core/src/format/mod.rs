//! printf/scanf engines over [`Stream`](crate::stream::Stream).
//!
//! The directive grammar is C's, plus `%{type[format]}` which writes or
//! reads a typed value through the registry. Arguments are passed as
//! slices of [`Arg`] and [`ScanArg`]; the [`uprintf!`](crate::uprintf) and
//! [`uscanf!`](crate::uscanf) macros build those slices.

pub mod args;
pub mod printf;
pub mod render;
pub mod scanf;
pub mod spec;

pub use args::{Arg, ScanArg};
pub use printf::{format_bytes, format_string, snprintf};
pub use scanf::sscanf;
pub use spec::{Count, Dialect, FormatFlags, FormatSpec, LengthMod, Segment, parse_format_spec, parse_format_string};

/// `uprintf!(stream, fmt, args...)`: [`Stream::printf`](crate::stream::Stream::printf)
/// with each argument converted through `Arg::from`.
#[macro_export]
macro_rules! uprintf {
    ($stream:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        $crate::stream::Stream::printf($stream, $fmt, &[$($crate::format::Arg::from($arg)),*])
    };
}

/// `uscanf!(stream, fmt, &mut dest...)`: [`Stream::scanf`](crate::stream::Stream::scanf)
/// with each destination converted through `ScanArg::from`.
#[macro_export]
macro_rules! uscanf {
    ($stream:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        $crate::stream::Stream::scanf($stream, $fmt, &mut [$($crate::format::ScanArg::from($arg)),*])
    };
}

#[cfg(test)]
mod tests {
    use crate::stream::Stream;

    #[test]
    fn macros_round_trip_through_a_buffer() {
        let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
        let n = crate::uprintf!(&mut s, "%s=%d;", "answer", 42).unwrap();
        assert_eq!(n, 10);
        s.rewind().unwrap();

        let mut name = String::new();
        let mut value = 0_i64;
        let got = crate::uscanf!(&mut s, "%[a-z]=%d;", &mut name, &mut value).unwrap();
        assert_eq!(got, 2);
        assert_eq!((name.as_str(), value), ("answer", 42));
    }
}
