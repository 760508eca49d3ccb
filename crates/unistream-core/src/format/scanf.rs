//! The scanf engine.

use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use crate::errno::{Result, StreamError};
use crate::registry;
use crate::serial::base::{ContainerBase, Identity, ParseFn};
use crate::serial::value::value_base;
use crate::smallbuf::SmallBuf;
use crate::stream::Stream;

use super::args::ScanArg;
use super::spec::{Count, Dialect, FormatRef, FormatSpec, Segment, TypeRef, TypedSpec, parse_format_string};

/// How a directive ended.
enum Step {
    /// Converted; `true` when a destination was assigned.
    Converted(bool),
    /// The input did not match.
    Mismatch,
    /// The input ran out.
    Exhausted,
}

/// Byte source with pushback and a consumed-byte count.
struct Scanner<'s> {
    stream: &'s mut Stream,
    consumed: usize,
}

impl Scanner<'_> {
    fn next(&mut self) -> Option<u8> {
        let byte = self.stream.getc()?;
        self.consumed += 1;
        Some(byte)
    }

    fn back(&mut self, byte: u8) {
        if self.stream.ungetc(byte).is_some() {
            self.consumed -= 1;
        }
    }

    /// Take the next byte if `pred` holds and `left` allows it.
    fn accept(&mut self, left: &mut usize, pred: impl Fn(u8) -> bool) -> Option<u8> {
        if *left == 0 {
            return None;
        }
        let byte = self.next()?;
        if pred(byte) {
            *left -= 1;
            Some(byte)
        } else {
            self.back(byte);
            None
        }
    }

    fn peek(&mut self) -> Option<u8> {
        let byte = self.next()?;
        self.back(byte);
        Some(byte)
    }

    fn skip_whitespace(&mut self) {
        while let Some(byte) = self.next() {
            if !byte.is_ascii_whitespace() {
                self.back(byte);
                break;
            }
        }
    }

    /// Why nothing could be taken: end of input, or a byte that does not fit.
    fn stalled(&self) -> Step {
        if self.stream.eof() || self.stream.error().is_some() {
            Step::Exhausted
        } else {
            Step::Mismatch
        }
    }

    /// Take bytes matching `word` case-insensitively; returns how many
    /// matched.
    fn accept_word(&mut self, left: &mut usize, word: &[u8]) -> usize {
        word.iter()
            .take_while(|&&w| self.accept(left, |b| b.eq_ignore_ascii_case(&w)).is_some())
            .count()
    }
}

fn width_of(spec: &FormatSpec<'_>) -> usize {
    match spec.width {
        Count::Fixed(w) if w > 0 => w,
        _ => usize::MAX,
    }
}

fn digit_value(byte: u8) -> Option<u32> {
    (byte as char).to_digit(16)
}

/// `%d %i %u %o %x %p`: sign, base prefix, digits. Overflow saturates: at
/// the `i64` bounds for `%d`/`%i`, at `u64::MAX` for the unsigned forms,
/// which hand back the bit pattern.
fn scan_integer(sc: &mut Scanner<'_>, spec: &FormatSpec<'_>) -> std::result::Result<i64, Step> {
    let mut left = width_of(spec);
    let negative = match sc.accept(&mut left, |b| b == b'+' || b == b'-') {
        Some(sign) => sign == b'-',
        None => false,
    };
    let mut base = match spec.conversion {
        b'i' => 0,
        b'o' => 8,
        b'x' | b'X' | b'p' => 16,
        _ => 10,
    };
    let mut any = false;
    if (base == 0 || base == 16) && sc.accept(&mut left, |b| b == b'0').is_some() {
        any = true;
        if let Some(x) = sc.accept(&mut left, |b| b == b'x' || b == b'X') {
            if left > 0 && sc.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
                base = 16;
            } else {
                // "0x" with no hex digit: the value is the lone zero.
                sc.back(x);
                return Ok(0);
            }
        } else if base == 0 {
            base = 8;
        }
    }
    if base == 0 {
        base = 10;
    }

    let mut magnitude: u64 = 0;
    while let Some(byte) = sc.accept(&mut left, |b| digit_value(b).is_some_and(|d| d < base)) {
        any = true;
        let d = u64::from(digit_value(byte).unwrap_or(0));
        magnitude = magnitude.saturating_mul(u64::from(base)).saturating_add(d);
    }
    if !any {
        return Err(sc.stalled());
    }
    Ok(match (matches!(spec.conversion, b'd' | b'i'), negative) {
        (true, true) => 0_i64.checked_sub_unsigned(magnitude).unwrap_or(i64::MIN),
        (true, false) => i64::try_from(magnitude).unwrap_or(i64::MAX),
        (false, true) => magnitude.wrapping_neg() as i64,
        (false, false) => magnitude as i64,
    })
}

/// Value of `mantissa × 2^exp` for hexadecimal float text.
fn hex_float_value(digits: &[u8], exponent: i32) -> f64 {
    let mut mantissa = 0_u64;
    let mut scale = exponent;
    let mut seen_point = false;
    for &b in digits {
        if b == b'.' {
            seen_point = true;
            continue;
        }
        let d = u64::from(digit_value(b).unwrap_or(0));
        if mantissa >> 60 == 0 {
            mantissa = mantissa * 16 + d;
            if seen_point {
                scale -= 4;
            }
        } else if !seen_point {
            scale += 4;
        }
    }
    mantissa as f64 * 2_f64.powi(scale)
}

/// `%f %e %g %a`: collect the number's bytes, then convert.
fn scan_float(sc: &mut Scanner<'_>, spec: &FormatSpec<'_>) -> Result<std::result::Result<f64, Step>> {
    let mut left = width_of(spec);
    let mut text = SmallBuf::new();
    let negative = match sc.accept(&mut left, |b| b == b'+' || b == b'-') {
        Some(sign) => sign == b'-',
        None => false,
    };
    let signed = |v: f64| if negative { -v } else { v };

    match sc.accept(&mut left, |b| matches!(b, b'i' | b'I' | b'n' | b'N')) {
        Some(b'i' | b'I') => {
            if sc.accept_word(&mut left, b"nf") < 2 {
                return Ok(Err(Step::Mismatch));
            }
            let _ = sc.accept_word(&mut left, b"inity");
            return Ok(Ok(signed(f64::INFINITY)));
        }
        Some(_) => {
            if sc.accept_word(&mut left, b"an") == 2 {
                return Err(StreamError::BadMessage);
            }
            return Ok(Err(Step::Mismatch));
        }
        None => {}
    }

    let mut hex = false;
    if sc.accept(&mut left, |b| b == b'0').is_some() {
        text.push(b'0')?;
        hex = sc.accept(&mut left, |b| b == b'x' || b == b'X').is_some();
    }
    let is_digit = move |b: u8| if hex { b.is_ascii_hexdigit() } else { b.is_ascii_digit() };
    let mut digits = !text.is_empty() && !hex;
    while let Some(b) = sc.accept(&mut left, is_digit) {
        text.push(b)?;
        digits = true;
    }
    if sc.accept(&mut left, |b| b == b'.').is_some() {
        text.push(b'.')?;
        while let Some(b) = sc.accept(&mut left, is_digit) {
            text.push(b)?;
            digits = true;
        }
    }
    if !digits {
        return Ok(Err(sc.stalled()));
    }

    // Exponent, given back whole if no digit follows.
    let marker = if hex { [b'p', b'P'] } else { [b'e', b'E'] };
    let mut exponent = SmallBuf::new();
    if let Some(e) = sc.accept(&mut left, |b| marker.contains(&b)) {
        let sign = sc.accept(&mut left, |b| b == b'+' || b == b'-');
        while let Some(b) = sc.accept(&mut left, |b| b.is_ascii_digit()) {
            exponent.push(b)?;
        }
        if exponent.is_empty() {
            if let Some(sign) = sign {
                sc.back(sign);
            }
            sc.back(e);
        } else if sign == Some(b'-') {
            let mut negated = SmallBuf::new();
            negated.push(b'-')?;
            negated.extend(exponent.as_bytes())?;
            exponent = negated;
        }
    }

    let value = if hex {
        let exp = exponent.as_str().and_then(|e| e.parse::<i32>().ok()).unwrap_or(0);
        hex_float_value(&text.as_bytes()[1..], exp)
    } else {
        if !exponent.is_empty() {
            text.push(b'e')?;
            text.extend(exponent.as_bytes())?;
        }
        text.as_str()
            .and_then(|t| t.parse::<f64>().ok())
            .ok_or(StreamError::BadMessage)?
    };
    Ok(Ok(signed(value)))
}

/// Parse the body of `%[...]` into a membership table.
fn char_set(set: &[u8]) -> [bool; 256] {
    let (negate, body) = match set.split_first() {
        Some((b'^', rest)) => (true, rest),
        _ => (false, set),
    };
    let mut table = [negate; 256];
    let mut i = 0;
    while i < body.len() {
        let lo = body[i];
        if i + 2 < body.len() && body[i + 1] == b'-' {
            let hi = body[i + 2];
            for c in lo.min(hi)..=lo.max(hi) {
                table[usize::from(c)] = !negate;
            }
            i += 3;
        } else {
            table[usize::from(lo)] = !negate;
            i += 1;
        }
    }
    table
}

struct Destinations<'b, 'a> {
    args: &'b mut [ScanArg<'a>],
    next: usize,
}

impl<'a> Destinations<'_, 'a> {
    fn start(&mut self, spec: &FormatSpec<'_>) {
        if let Some(position) = spec.position {
            self.next = position - 1;
        }
    }

    fn take(&mut self) -> Result<&mut ScanArg<'a>> {
        let index = self.next;
        self.next += 1;
        self.args.get_mut(index).ok_or(StreamError::InvalidArgument)
    }

    fn name(&mut self) -> Result<&'a str> {
        match self.take()? {
            ScanArg::Name(name) => Ok(*name),
            _ => Err(StreamError::InvalidArgument),
        }
    }
}

fn named_parser(name: &str) -> Result<(ParseFn, Identity)> {
    let entry = registry::lookup_format(name).ok_or(StreamError::InvalidArgument)?;
    let parse = entry.parse.ok_or(StreamError::NotSupported)?;
    Ok((parse, Identity::requesting(entry.name)))
}

fn scan_typed(sc: &mut Scanner<'_>, dest: &mut Destinations<'_, '_>, typed: TypedSpec<'_>, suppress: bool) -> Result<Step> {
    let owned: Arc<ContainerBase>;
    let base: &ContainerBase = match typed.ty {
        TypeRef::Default => {
            owned = Arc::new(value_base());
            &owned
        }
        TypeRef::Named(name) => {
            owned = registry::lookup_type(name).ok_or(StreamError::InvalidArgument)?;
            &owned
        }
        TypeRef::NameArg => {
            owned = registry::lookup_type(dest.name()?).ok_or(StreamError::InvalidArgument)?;
            &owned
        }
        TypeRef::BaseArg => match dest.take()? {
            ScanArg::Base(base) => *base,
            _ => return Err(StreamError::InvalidArgument),
        },
    };
    let (parse, mut id) = match typed.format {
        FormatRef::Native => (
            base.parse.ok_or(StreamError::NotSupported)?,
            Identity::requesting(base.native_format.clone()),
        ),
        FormatRef::Named(name) => named_parser(name)?,
        FormatRef::NameArg => named_parser(dest.name()?)?,
        FormatRef::FnArg => match dest.take()? {
            ScanArg::Parser(f) => (*f, Identity::default()),
            _ => return Err(StreamError::InvalidArgument),
        },
    };

    let outcome = if suppress {
        let mut scratch = (base.create)();
        parse(sc.stream, scratch.as_mut(), base, &mut id)
    } else {
        match dest.take()? {
            ScanArg::Value(data) => parse(sc.stream, &mut **data, base, &mut id),
            _ => return Err(StreamError::InvalidArgument),
        }
    };
    match outcome {
        Ok(()) => {
            trace!(base = %base.name, format = %id.format, "typed value read");
            Ok(Step::Converted(!suppress))
        }
        Err(StreamError::Eof) => Ok(Step::Exhausted),
        Err(err) => Err(err),
    }
}

fn directive(sc: &mut Scanner<'_>, dest: &mut Destinations<'_, '_>, spec: &FormatSpec<'_>) -> Result<Step> {
    dest.start(spec);
    if !matches!(spec.conversion, b'[' | b'c' | b'n') {
        sc.skip_whitespace();
    }
    if let Some(typed) = spec.typed {
        return scan_typed(sc, dest, typed, spec.suppress);
    }
    let assign = !spec.suppress;

    match spec.conversion {
        b'n' => {
            if assign {
                dest.take()?.store_int(sc.consumed as i64)?;
            }
            // %n neither counts nor fails.
            return Ok(Step::Converted(false));
        }
        b'd' | b'i' | b'u' | b'o' | b'x' | b'X' | b'p' => match scan_integer(sc, spec) {
            Ok(v) if assign => dest.take()?.store_int(v)?,
            Ok(_) => {}
            Err(step) => return Ok(step),
        },
        b'f' | b'F' | b'e' | b'E' | b'g' | b'G' | b'a' | b'A' => match scan_float(sc, spec)? {
            Ok(v) if assign => dest.take()?.store_float(v)?,
            Ok(_) => {}
            Err(step) => return Ok(step),
        },
        b's' | b'[' => {
            let table = match spec.set {
                Some(set) => char_set(set),
                None => {
                    let mut t = [true; 256];
                    for b in [b' ', b'\t', b'\n', b'\r', 0x0b, 0x0c] {
                        t[usize::from(b)] = false;
                    }
                    t
                }
            };
            let mut left = width_of(spec);
            let mut out = Vec::new();
            while let Some(b) = sc.accept(&mut left, |b| table[usize::from(b)]) {
                out.push(b);
            }
            if out.is_empty() {
                return Ok(sc.stalled());
            }
            if assign {
                dest.take()?.store_bytes(out)?;
            }
        }
        b'c' => {
            let want = match spec.width {
                Count::Fixed(w) if w > 0 => w,
                _ => 1,
            };
            let mut out = Vec::with_capacity(want);
            while out.len() < want {
                match sc.next() {
                    Some(b) => out.push(b),
                    None => break,
                }
            }
            if out.len() < want {
                return Ok(Step::Exhausted);
            }
            if assign {
                dest.take()?.store_bytes(out)?;
            }
        }
        _ => return Err(StreamError::InvalidArgument),
    }
    Ok(Step::Converted(assign))
}

impl Stream {
    /// Formatted read. Returns the number of destinations assigned, or
    /// `Eof` when the input ends before the first conversion.
    ///
    /// `%{type[format]}` parses into a [`ScanArg::Value`] through a
    /// registered type and format.
    pub fn scanf(&mut self, fmt: impl AsRef<[u8]>, args: &mut [ScanArg<'_>]) -> Result<usize> {
        let segments = parse_format_string(fmt.as_ref(), Dialect::Scanf)?;
        let mut sc = Scanner { stream: self, consumed: 0 };
        let mut dest = Destinations { args, next: 0 };
        let mut assigned = 0;
        let mut converted = 0;

        let step = 'scan: {
            for segment in &segments {
                let literal: &[u8] = match segment {
                    Segment::Literal(bytes) => bytes,
                    Segment::Percent => b"%",
                    Segment::Spec(spec) => {
                        match directive(&mut sc, &mut dest, spec)? {
                            Step::Converted(counted) => {
                                // `%n` reads nothing, so it cannot turn end of input into a match.
                                converted += usize::from(spec.conversion != b'n');
                                assigned += usize::from(counted);
                            }
                            step => break 'scan step,
                        }
                        continue;
                    }
                };
                if matches!(segment, Segment::Percent) {
                    sc.skip_whitespace();
                }
                for &expected in literal {
                    if expected.is_ascii_whitespace() {
                        sc.skip_whitespace();
                        continue;
                    }
                    match sc.next() {
                        Some(b) if b == expected => {}
                        Some(b) => {
                            sc.back(b);
                            break 'scan Step::Mismatch;
                        }
                        None => break 'scan Step::Exhausted,
                    }
                }
            }
            Step::Converted(false)
        };

        if let Some(err) = sc.stream.error() {
            return Err(err);
        }
        match step {
            Step::Exhausted if converted == 0 => Err(StreamError::Eof),
            _ => Ok(assigned),
        }
    }
}

/// scanf over a byte string.
pub fn sscanf(input: impl AsRef<[u8]>, fmt: impl AsRef<[u8]>, args: &mut [ScanArg<'_>]) -> Result<usize> {
    let mut stream = Stream::open_const_buffer(Bytes::copy_from_slice(input.as_ref()), "rb")?;
    stream.scanf(fmt, args)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::serial::value::Value;

    #[test]
    fn integers_with_base_detection() {
        let (mut a, mut b, mut c, mut d) = (0_i64, 0_i64, 0_i64, 0_u32);
        let n = sscanf(
            "-42 0x1f 017 ff",
            "%d %i %i %x",
            &mut [(&mut a).into(), (&mut b).into(), (&mut c).into(), (&mut d).into()],
        )
        .unwrap();
        assert_eq!(n, 4);
        assert_eq!((a, b, c, d), (-42, 31, 15, 255));
    }

    #[test]
    fn width_limits_digits() {
        let (mut a, mut b) = (0_i64, 0_i64);
        assert_eq!(sscanf("12345", "%2d%d", &mut [(&mut a).into(), (&mut b).into()]).unwrap(), 2);
        assert_eq!((a, b), (12, 345));
    }

    #[test]
    fn zero_x_without_digits_is_zero() {
        let mut a = 7_i64;
        let mut rest = String::new();
        assert_eq!(sscanf("0xg", "%x%s", &mut [(&mut a).into(), (&mut rest).into()]).unwrap(), 2);
        assert_eq!(a, 0);
        assert_eq!(rest, "xg");
    }

    #[test]
    fn floats_and_infinity() {
        let (mut a, mut b, mut c) = (0.0_f64, 0.0_f32, 0.0_f64);
        sscanf("2.5e3 -0.125 inf", "%f %g %e", &mut [(&mut a).into(), (&mut b).into(), (&mut c).into()]).unwrap();
        assert_eq!(a, 2500.0);
        assert_eq!(b, -0.125);
        assert!(c.is_infinite());

        let mut h = 0.0_f64;
        sscanf("0x1.8p1", "%a", &mut [(&mut h).into()]).unwrap();
        assert_eq!(h, 3.0);
    }

    #[test]
    fn nan_is_rejected() {
        let mut a = 0.0_f64;
        assert_eq!(sscanf("nan", "%f", &mut [(&mut a).into()]), Err(StreamError::BadMessage));
    }

    #[test]
    fn dangling_exponent_is_left_in_input() {
        let mut a = 0.0_f64;
        let mut rest = String::new();
        assert_eq!(sscanf("1.5e+x", "%f%s", &mut [(&mut a).into(), (&mut rest).into()]).unwrap(), 2);
        assert_eq!(a, 1.5);
        assert_eq!(rest, "e+x");
    }

    #[test]
    fn strings_sets_and_chars() {
        let (mut word, mut digits) = (String::new(), Vec::new());
        let mut c = 0_u8;
        let n = sscanf(
            "  hello 123abc!",
            "%s %[0-9]%*[a-z]%c",
            &mut [(&mut word).into(), (&mut digits).into(), (&mut c).into()],
        )
        .unwrap();
        assert_eq!(n, 3);
        assert_eq!(word, "hello");
        assert_eq!(digits, b"123");
        assert_eq!(c, b'!');

        let mut not_comma = String::new();
        sscanf("a b,c", "%[^,]", &mut [(&mut not_comma).into()]).unwrap();
        assert_eq!(not_comma, "a b");
    }

    #[test]
    fn literals_and_count() {
        let (mut h, mut m, mut pos) = (0_i64, 0_i64, 0_usize);
        let n = sscanf("12:34 tail", "%d:%d%n", &mut [(&mut h).into(), (&mut m).into(), (&mut pos).into()]).unwrap();
        assert_eq!(n, 2);
        assert_eq!((h, m, pos), (12, 34, 5));
    }

    #[test]
    fn mismatch_and_eof() {
        let mut a = 0_i64;
        assert_eq!(sscanf("abc", "%d", &mut [(&mut a).into()]).unwrap(), 0);
        assert_eq!(sscanf("", "%d", &mut [(&mut a).into()]), Err(StreamError::Eof));
        assert_eq!(sscanf("   ", "%d", &mut [(&mut a).into()]), Err(StreamError::Eof));
        assert_eq!(sscanf("5 x", "%d %d", &mut [(&mut a).into(), (&mut 0_i64).into()]).unwrap(), 1);
        assert_eq!(sscanf("5", "%d %d", &mut [(&mut a).into(), (&mut 0_i64).into()]).unwrap(), 1);
    }

    #[test]
    fn typed_values_parse_json() {
        let mut v = Value::Null;
        let mut after = 0_i64;
        let n = sscanf(r#"{"a": [1, 2]} 9"#, "%{} %d", &mut [(&mut v).into(), (&mut after).into()]).unwrap();
        assert_eq!(n, 2);
        let expected = BTreeMap::from([("a".to_string(), Value::List(vec![1.into(), 2.into()]))]);
        assert_eq!(v, Value::from(expected));
        assert_eq!(after, 9);

        let mut x = 0_i64;
        assert_eq!(sscanf("77", "%{i64}", &mut [ScanArg::Value(&mut x)]).unwrap(), 1);
        assert_eq!(x, 77);
        assert_eq!(sscanf("77", "%{*}", &mut ["i64".into(), ScanArg::Value(&mut x)]).unwrap(), 1);
    }

    #[test]
    fn signed_overflow_saturates_at_the_bounds() {
        let scan = |input: &str| {
            let mut v = 0_i64;
            sscanf(input, "%d", &mut [(&mut v).into()]).unwrap();
            v
        };
        assert_eq!(scan("9223372036854775807"), i64::MAX);
        assert_eq!(scan("9223372036854775808"), i64::MAX);
        assert_eq!(scan("99999999999999999999"), i64::MAX);
        assert_eq!(scan("-9223372036854775808"), i64::MIN);
        assert_eq!(scan("-9223372036854775809"), i64::MIN);
        assert_eq!(scan("-99999999999999999999"), i64::MIN);

        let mut i = 0_i64;
        sscanf("0x8000000000000000", "%i", &mut [(&mut i).into()]).unwrap();
        assert_eq!(i, i64::MAX);
    }

    #[test]
    fn unsigned_overflow_saturates_at_u64_max() {
        let (mut u, mut x, mut neg) = (0_u64, 0_u64, 0_u64);
        sscanf(
            "99999999999999999999 1ffffffffffffffff -1",
            "%u %x %u",
            &mut [(&mut u).into(), (&mut x).into(), (&mut neg).into()],
        )
        .unwrap();
        assert_eq!((u, x, neg), (u64::MAX, u64::MAX, u64::MAX));
        sscanf("18446744073709551615", "%u", &mut [(&mut u).into()]).unwrap();
        assert_eq!(u, u64::MAX);
    }

    #[test]
    fn count_alone_does_not_hide_end_of_input() {
        let (mut pos, mut a) = (9_usize, 0_i64);
        assert_eq!(sscanf("", "%n%d", &mut [(&mut pos).into(), (&mut a).into()]), Err(StreamError::Eof));
        assert_eq!(pos, 0);
        assert_eq!(sscanf("", "%n", &mut [(&mut pos).into()]).unwrap(), 0);
    }

    #[test]
    fn upper_case_hex_prefix_is_pushed_back_as_read() {
        let mut a = 7_i64;
        let mut rest = String::new();
        assert_eq!(sscanf("0Xg", "%x%s", &mut [(&mut a).into(), (&mut rest).into()]).unwrap(), 2);
        assert_eq!((a, rest.as_str()), (0, "Xg"));
    }

    #[test]
    fn printed_integers_scan_back() {
        for i in [0_i64, 1, -1, 42, i64::MAX, i64::MIN] {
            let text = crate::format::format_string("%d", &[i.into()]).unwrap();
            let mut back = 0_i64;
            sscanf(&text, "%d", &mut [(&mut back).into()]).unwrap();
            assert_eq!(back, i);
        }
    }
}
