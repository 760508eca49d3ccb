//! Directive grammar shared by printf and scanf.
//!
//! `%[position$][flags][width][.precision][length]specifier`, plus the
//! typed-value directive `%{type[format]}`.

use crate::errno::{Result, StreamError};

/// Flags parsed from a directive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatFlags {
    pub left_justify: bool, // '-'
    pub force_sign: bool,   // '+'
    pub space_sign: bool,   // ' '
    pub alt_form: bool,     // '#'
    pub zero_pad: bool,     // '0'
    pub grouping: bool,     // '\''
}

/// Width or precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    None,
    Fixed(usize),
    /// `*`: taken from the next integer argument.
    FromArg,
}

/// Length modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthMod {
    None,
    Hh,   // 'hh'
    H,    // 'h'
    L,    // 'l'
    Ll,   // 'll', 'q', 'I64'
    J,    // 'j'
    Z,    // 'z', 'I'
    T,    // 't'
    BigL, // 'L'
    I32,  // 'I32'
}

/// Where a `%{...}` directive gets its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef<'a> {
    /// No type given: the value must be a `Value`.
    Default,
    Named(&'a str),
    /// `*`: a string argument names the type.
    NameArg,
    /// `?`: a container base argument.
    BaseArg,
}

/// Where a `%{...}` directive gets its serializer or parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRef<'a> {
    /// The type's own.
    Native,
    Named(&'a str),
    /// `*`: a string argument names the format.
    NameArg,
    /// `?`: a function argument.
    FnArg,
}

/// Body of a `%{type[format]}` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedSpec<'a> {
    pub ty: TypeRef<'a>,
    pub format: FormatRef<'a>,
}

/// A parsed directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec<'a> {
    /// 1-based argument position from `n$`.
    pub position: Option<usize>,
    pub flags: FormatFlags,
    pub width: Count,
    pub precision: Count,
    pub length: LengthMod,
    /// The specifier byte; `{` for a typed-value directive.
    pub conversion: u8,
    /// `*` right after `%`: scanf's assignment suppression.
    pub suppress: bool,
    /// Set for `%[...]`: the raw set between the brackets.
    pub set: Option<&'a [u8]>,
    pub typed: Option<TypedSpec<'a>>,
}

/// A piece of a parsed format string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Bytes to emit (printf) or match (scanf) verbatim.
    Literal(&'a [u8]),
    /// `%%`.
    Percent,
    Spec(FormatSpec<'a>),
}

/// Which engine the string is parsed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Printf,
    Scanf,
}

/// Largest width, precision or position a directive may carry; C's limit
/// is `INT_MAX`.
pub const MAX_COUNT: usize = i32::MAX as usize;

fn parse_decimal(digits: &[u8]) -> Result<usize> {
    let mut result = 0_usize;
    for &d in digits {
        result = result
            .checked_mul(10)
            .and_then(|r| r.checked_add(usize::from(d - b'0')))
            .ok_or(StreamError::InvalidArgument)?;
    }
    if result > MAX_COUNT {
        return Err(StreamError::InvalidArgument);
    }
    Ok(result)
}

fn digits_end(fmt: &[u8], mut pos: usize) -> usize {
    while pos < fmt.len() && fmt[pos].is_ascii_digit() {
        pos += 1;
    }
    pos
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| StreamError::InvalidArgument)
}

fn parse_typed(fmt: &[u8]) -> Result<(TypedSpec<'_>, usize)> {
    let close = fmt
        .iter()
        .position(|&b| b == b'}')
        .ok_or(StreamError::InvalidArgument)?;
    let body = &fmt[..close];
    let (ty_part, fmt_part) = match body.iter().position(|&b| b == b'[') {
        Some(open) => {
            if body.last() != Some(&b']') {
                return Err(StreamError::InvalidArgument);
            }
            (&body[..open], Some(&body[open + 1..body.len() - 1]))
        }
        None => (body, None),
    };
    let ty = match ty_part {
        b"" => TypeRef::Default,
        b"*" => TypeRef::NameArg,
        b"?" => TypeRef::BaseArg,
        name => TypeRef::Named(utf8(name)?),
    };
    let format = match fmt_part {
        None | Some(b"") => FormatRef::Native,
        Some(b"*") => FormatRef::NameArg,
        Some(b"?") => FormatRef::FnArg,
        Some(name) => FormatRef::Named(utf8(name)?),
    };
    Ok((TypedSpec { ty, format }, close + 1))
}

/// Parse one directive. `fmt` starts right after the `%`.
///
/// Returns the directive and the bytes consumed, or `None` when the bytes do
/// not form a directive. A width, precision or position past
/// [`MAX_COUNT`] is `InvalidArgument`.
pub fn parse_format_spec(fmt: &[u8], dialect: Dialect) -> Result<Option<(FormatSpec<'_>, usize)>> {
    let len = fmt.len();
    let mut pos = 0;

    let mut suppress = false;
    if dialect == Dialect::Scanf && pos < len && fmt[pos] == b'*' {
        suppress = true;
        pos += 1;
    }

    // --- position ---
    let mut position = None;
    let end = digits_end(fmt, pos);
    if end > pos && end < len && fmt[end] == b'$' && fmt[pos] != b'0' {
        position = Some(parse_decimal(&fmt[pos..end])?);
        pos = end + 1;
    }

    // --- flags ---
    let mut flags = FormatFlags::default();
    if dialect == Dialect::Printf {
        while pos < len {
            match fmt[pos] {
                b'-' => flags.left_justify = true,
                b'+' => flags.force_sign = true,
                b' ' => flags.space_sign = true,
                b'#' => flags.alt_form = true,
                b'0' => flags.zero_pad = true,
                b'\'' => flags.grouping = true,
                _ => break,
            }
            pos += 1;
        }
        // '+' overrides ' '; '-' overrides '0'.
        if flags.force_sign {
            flags.space_sign = false;
        }
        if flags.left_justify {
            flags.zero_pad = false;
        }
    }

    // --- width ---
    let width = if dialect == Dialect::Printf && pos < len && fmt[pos] == b'*' {
        pos += 1;
        Count::FromArg
    } else {
        let end = digits_end(fmt, pos);
        let width = if end > pos {
            Count::Fixed(parse_decimal(&fmt[pos..end])?)
        } else {
            Count::None
        };
        pos = end;
        width
    };

    // --- precision ---
    let precision = if dialect == Dialect::Printf && pos < len && fmt[pos] == b'.' {
        pos += 1;
        if pos < len && fmt[pos] == b'*' {
            pos += 1;
            Count::FromArg
        } else {
            let end = digits_end(fmt, pos);
            let p = if end > pos {
                parse_decimal(&fmt[pos..end])?
            } else {
                0
            };
            pos = end;
            Count::Fixed(p)
        }
    } else {
        Count::None
    };

    // --- length modifier ---
    let rest = &fmt[pos..];
    let (length, used) = if rest.starts_with(b"hh") {
        (LengthMod::Hh, 2)
    } else if rest.starts_with(b"ll") {
        (LengthMod::Ll, 2)
    } else if rest.starts_with(b"I64") {
        (LengthMod::Ll, 3)
    } else if rest.starts_with(b"I32") {
        (LengthMod::I32, 3)
    } else {
        match rest.first() {
            Some(b'h') => (LengthMod::H, 1),
            Some(b'l') => (LengthMod::L, 1),
            Some(b'q') => (LengthMod::Ll, 1),
            Some(b'j') => (LengthMod::J, 1),
            Some(b'z') | Some(b'I') => (LengthMod::Z, 1),
            Some(b't') => (LengthMod::T, 1),
            Some(b'L') => (LengthMod::BigL, 1),
            _ => (LengthMod::None, 0),
        }
    };
    pos += used;

    // --- conversion specifier ---
    let Some(&conversion) = fmt.get(pos) else {
        return Ok(None);
    };
    pos += 1;

    let mut set = None;
    let mut typed = None;
    match conversion {
        b'd' | b'i' | b'u' | b'x' | b'X' | b'o' | b's' | b'c' | b'p' | b'n' | b'f' | b'F'
        | b'e' | b'E' | b'g' | b'G' | b'a' | b'A' => {}
        b'{' => {
            let Ok((t, used)) = parse_typed(&fmt[pos..]) else {
                return Ok(None);
            };
            typed = Some(t);
            pos += used;
        }
        b'[' if dialect == Dialect::Scanf => {
            // A ']' right after '[' or '[^' is part of the set.
            let start = pos;
            let mut i = pos;
            if i < len && fmt[i] == b'^' {
                i += 1;
            }
            if i < len && fmt[i] == b']' {
                i += 1;
            }
            while i < len && fmt[i] != b']' {
                i += 1;
            }
            if i >= len {
                return Ok(None);
            }
            set = Some(&fmt[start..i]);
            pos = i + 1;
        }
        _ => return Ok(None),
    }

    Ok(Some((
        FormatSpec {
            position,
            flags,
            width,
            precision,
            length,
            conversion,
            suppress,
            set,
            typed,
        },
        pos,
    )))
}

/// Split a format string into literal runs and directives.
///
/// A `%` that does not start a directive is kept as a literal. Mixing
/// positional (`%1$d`) and plain directives is `InvalidArgument`.
pub fn parse_format_string(fmt: &[u8], dialect: Dialect) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut pos = 0;
    let len = fmt.len();
    let mut positional = None;

    while pos < len {
        let start = pos;
        while pos < len && fmt[pos] != b'%' {
            pos += 1;
        }
        if pos > start {
            segments.push(Segment::Literal(&fmt[start..pos]));
        }
        if pos >= len {
            break;
        }
        pos += 1;
        if pos >= len {
            segments.push(Segment::Literal(&fmt[pos - 1..pos]));
            break;
        }
        if fmt[pos] == b'%' {
            segments.push(Segment::Percent);
            pos += 1;
            continue;
        }
        match parse_format_spec(&fmt[pos..], dialect)? {
            Some((spec, consumed)) => {
                let uses_position = spec.position.is_some();
                // `%*d` in scanf takes no argument, so it fits either style.
                let takes_arg = !(spec.suppress || spec.conversion == b'%');
                if takes_arg {
                    match positional {
                        None => positional = Some(uses_position),
                        Some(p) if p != uses_position => {
                            return Err(StreamError::InvalidArgument);
                        }
                        Some(_) => {}
                    }
                }
                pos += consumed;
                segments.push(Segment::Spec(spec));
            }
            None => segments.push(Segment::Literal(&fmt[pos - 1..pos])),
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> FormatSpec<'_> {
        parse_format_spec(s.as_bytes(), Dialect::Printf).unwrap().unwrap().0
    }

    #[test]
    fn simple_int() {
        let (s, consumed) = parse_format_spec(b"d", Dialect::Printf).unwrap().unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(s.conversion, b'd');
        assert_eq!(s.width, Count::None);
        assert_eq!(s.precision, Count::None);
    }

    #[test]
    fn width_precision_and_flags() {
        let s = spec("-+#010.5f");
        assert_eq!(s.width, Count::Fixed(10));
        assert_eq!(s.precision, Count::Fixed(5));
        assert!(s.flags.left_justify && s.flags.force_sign && s.flags.alt_form);
        assert!(!s.flags.zero_pad);
        assert_eq!(spec(".*d").precision, Count::FromArg);
        assert_eq!(spec("*d").width, Count::FromArg);
    }

    #[test]
    fn length_modifiers() {
        assert_eq!(spec("hhd").length, LengthMod::Hh);
        assert_eq!(spec("llu").length, LengthMod::Ll);
        assert_eq!(spec("I64d").length, LengthMod::Ll);
        assert_eq!(spec("I32x").length, LengthMod::I32);
        assert_eq!(spec("Iu").length, LengthMod::Z);
        assert_eq!(spec("qd").length, LengthMod::Ll);
        assert_eq!(spec("Lf").length, LengthMod::BigL);
    }

    #[test]
    fn positional_argument() {
        let s = spec("2$-4d");
        assert_eq!(s.position, Some(2));
        assert_eq!(s.width, Count::Fixed(4));
    }

    #[test]
    fn typed_directive_parts() {
        let s = spec("{int}");
        assert_eq!(s.conversion, b'{');
        assert_eq!(
            s.typed,
            Some(TypedSpec {
                ty: TypeRef::Named("int"),
                format: FormatRef::Native
            })
        );
        let s = spec("{*[json]}");
        assert_eq!(s.typed.unwrap().ty, TypeRef::NameArg);
        assert_eq!(s.typed.unwrap().format, FormatRef::Named("json"));
        let s = spec("8{?[?]}");
        assert_eq!(s.width, Count::Fixed(8));
        assert_eq!(s.typed.unwrap().ty, TypeRef::BaseArg);
        assert_eq!(s.typed.unwrap().format, FormatRef::FnArg);
        assert_eq!(parse_format_spec(b"{int", Dialect::Printf), Ok(None));
    }

    #[test]
    fn scanf_set_and_suppress() {
        let (s, used) = parse_format_spec(b"*[]a-z]rest", Dialect::Scanf).unwrap().unwrap();
        assert!(s.suppress);
        assert_eq!(s.set, Some(&b"]a-z"[..]));
        assert_eq!(used, 7);
        let (s, _) = parse_format_spec(b"[^,]", Dialect::Scanf).unwrap().unwrap();
        assert_eq!(s.set, Some(&b"^,"[..]));
    }

    #[test]
    fn segments() {
        let segs = parse_format_string(b"hello %d world %s!", Dialect::Printf).unwrap();
        assert_eq!(segs.len(), 5);
        assert_eq!(segs[0], Segment::Literal(b"hello "));
        assert!(matches!(&segs[1], Segment::Spec(s) if s.conversion == b'd'));
        assert_eq!(segs[4], Segment::Literal(b"!"));
        let segs = parse_format_string(b"100%%", Dialect::Printf).unwrap();
        assert_eq!(segs, vec![Segment::Literal(b"100"), Segment::Percent]);
    }

    #[test]
    fn malformed_directive_is_literal() {
        let segs = parse_format_string(b"50%!", Dialect::Printf).unwrap();
        assert_eq!(
            segs,
            vec![
                Segment::Literal(b"50"),
                Segment::Literal(b"%"),
                Segment::Literal(b"!")
            ]
        );
    }

    #[test]
    fn mixing_positional_and_plain_is_rejected() {
        assert_eq!(
            parse_format_string(b"%1$d %d", Dialect::Printf),
            Err(StreamError::InvalidArgument)
        );
        assert!(parse_format_string(b"%2$s %1$s", Dialect::Printf).is_ok());
    }

    #[test]
    fn oversized_counts_are_rejected() {
        for fmt in [&b"%99999999999999999999999d"[..], b"%2147483648d", b"%.2147483648f", b"%4294967296$d"] {
            assert_eq!(parse_format_string(fmt, Dialect::Printf), Err(StreamError::InvalidArgument));
        }
        assert_eq!(spec("2147483647d").width, Count::Fixed(MAX_COUNT));
    }
}
