//! Field renderers for the printf engine.
//!
//! Every numeric field is laid out as
//! `[width fill][addon][precision fill][digits][trailing fill]`, where the
//! addon is the sign and/or radix prefix. With `0` and without `-`, the width
//! fill becomes zeros placed after the addon (integers only when no
//! precision was given).

use crate::errno::{Result, StreamError};

use super::spec::{FormatFlags, FormatSpec, MAX_COUNT};

/// A directive with `*` width and precision already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub flags: FormatFlags,
    pub width: usize,
    pub precision: Option<usize>,
    pub conversion: u8,
}

impl Layout {
    /// Layout of `spec` with fixed width/precision; `*` counts as absent.
    #[must_use]
    pub fn of(spec: &FormatSpec<'_>) -> Self {
        use super::spec::Count;
        Self {
            flags: spec.flags,
            width: match spec.width {
                Count::Fixed(w) => w,
                _ => 0,
            },
            precision: match spec.precision {
                Count::Fixed(p) => Some(p),
                _ => None,
            },
            conversion: spec.conversion,
        }
    }

    /// Apply a `*` width argument: negative means left-justified. A
    /// magnitude past [`MAX_COUNT`] is `InvalidArgument`.
    pub fn set_width_arg(&mut self, width: i64) -> Result<()> {
        let magnitude = usize::try_from(width.unsigned_abs())
            .ok()
            .filter(|&w| w <= MAX_COUNT)
            .ok_or(StreamError::InvalidArgument)?;
        if width < 0 {
            self.flags.left_justify = true;
            self.flags.zero_pad = false;
        }
        self.width = magnitude;
        Ok(())
    }

    /// Apply a `*` precision argument: negative means none.
    pub fn set_precision_arg(&mut self, precision: i64) -> Result<()> {
        self.precision = match usize::try_from(precision) {
            Ok(p) if p > MAX_COUNT => return Err(StreamError::InvalidArgument),
            Ok(p) => Some(p),
            Err(_) => None,
        };
        Ok(())
    }
}

/// Sign and radix prefix; at most one sign byte plus `0x`.
#[derive(Default)]
struct Addon {
    bytes: [u8; 3],
    len: usize,
}

impl Addon {
    fn push(&mut self, s: &[u8]) {
        self.bytes[self.len..self.len + s.len()].copy_from_slice(s);
        self.len += s.len();
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

fn sign_of(negative: bool, flags: FormatFlags) -> Option<u8> {
    if negative {
        Some(b'-')
    } else if flags.force_sign {
        Some(b'+')
    } else if flags.space_sign {
        Some(b' ')
    } else {
        None
    }
}

fn fill(out: &mut Vec<u8>, byte: u8, count: usize) {
    out.resize(out.len() + count, byte);
}

/// Lay out one field. `zero_fill_ok` says whether the `0` flag may turn the
/// width fill into zeros. The whole field is reserved up front, so a field
/// too large to hold fails with `NoMemory` instead of aborting.
fn emit(
    out: &mut Vec<u8>,
    layout: &Layout,
    addon: &[u8],
    digit_fill: usize,
    body: &[u8],
    zero_fill_ok: bool,
) -> Result<()> {
    let content = addon
        .len()
        .checked_add(digit_fill)
        .and_then(|n| n.checked_add(body.len()))
        .ok_or(StreamError::Overflow)?;
    let pad = layout.width.saturating_sub(content);
    out.try_reserve(content + pad).map_err(|_| StreamError::NoMemory)?;
    let left = layout.flags.left_justify;
    let zeros = zero_fill_ok && layout.flags.zero_pad && !left;
    if !left && !zeros {
        fill(out, b' ', pad);
    }
    out.extend_from_slice(addon);
    if zeros {
        fill(out, b'0', pad);
    }
    fill(out, b'0', digit_fill);
    out.extend_from_slice(body);
    if left {
        fill(out, b' ', pad);
    }
    Ok(())
}

fn radix(conversion: u8) -> (u64, &'static [u8; 16]) {
    match conversion {
        b'o' => (8, b"0123456789abcdef"),
        b'x' => (16, b"0123456789abcdef"),
        b'X' => (16, b"0123456789ABCDEF"),
        _ => (10, b"0123456789abcdef"),
    }
}

/// Digits of `value`, right-aligned in `buf`; returns where they start.
fn digits_into(mut value: u64, conversion: u8, buf: &mut [u8; 64]) -> usize {
    let (base, symbols) = radix(conversion);
    let mut start = buf.len();
    loop {
        start -= 1;
        buf[start] = symbols[(value % base) as usize];
        value /= base;
        if value == 0 {
            return start;
        }
    }
}

fn integer(out: &mut Vec<u8>, layout: &Layout, negative: bool, magnitude: u64) -> Result<()> {
    let mut buf = [0u8; 64];
    let start = digits_into(magnitude, layout.conversion, &mut buf);
    let body: &[u8] = if magnitude == 0 && layout.precision == Some(0) {
        &[]
    } else {
        &buf[start..]
    };

    let mut addon = Addon::default();
    if matches!(layout.conversion, b'd' | b'i')
        && let Some(sign) = sign_of(negative, layout.flags)
    {
        addon.push(&[sign]);
    }
    if layout.flags.alt_form && magnitude != 0 {
        match layout.conversion {
            b'x' => addon.push(b"0x"),
            b'X' => addon.push(b"0X"),
            _ => {}
        }
    }

    let mut digit_fill = layout.precision.unwrap_or(1).saturating_sub(body.len());
    if layout.conversion == b'o'
        && layout.flags.alt_form
        && digit_fill == 0
        && body.first() != Some(&b'0')
    {
        digit_fill = 1;
    }
    emit(out, layout, addon.as_bytes(), digit_fill, body, layout.precision.is_none())
}

/// `%d`/`%i` (and the unsigned conversions, reinterpreting the bits).
pub fn render_signed(value: i64, layout: &Layout, out: &mut Vec<u8>) -> Result<()> {
    if matches!(layout.conversion, b'd' | b'i') {
        integer(out, layout, value < 0, value.unsigned_abs())
    } else {
        integer(out, layout, false, value as u64)
    }
}

/// `%u`, `%o`, `%x`, `%X`.
pub fn render_unsigned(value: u64, layout: &Layout, out: &mut Vec<u8>) -> Result<()> {
    integer(out, layout, false, value)
}

/// Split Rust's `1.5e-7` exponent form into mantissa and exponent.
fn split_exp(s: &str) -> (&str, i32) {
    match s.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse().unwrap_or(0)),
        None => (s, 0),
    }
}

fn c_exponent(mantissa: &str, exp: i32, upper: bool) -> String {
    let e = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}{e}{sign}{:02}", exp.unsigned_abs())
}

fn fixed(value: f64, precision: usize, alt: bool) -> String {
    let mut s = format!("{value:.precision$}");
    if alt && precision == 0 {
        s.push('.');
    }
    s
}

fn scientific(value: f64, precision: usize, upper: bool, alt: bool) -> String {
    let raw = format!("{value:.precision$e}");
    let (mantissa, exp) = split_exp(&raw);
    if alt && precision == 0 {
        c_exponent(&format!("{mantissa}."), exp, upper)
    } else {
        c_exponent(mantissa, exp, upper)
    }
}

fn strip_fraction_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// `%g`: `%e` when the exponent is below -4 or not below the precision,
/// `%f` otherwise; trailing fraction zeros go unless `#`.
fn general(value: f64, precision: usize, upper: bool, alt: bool) -> String {
    let p = precision.max(1);
    let probe = format!("{value:.prec$e}", prec = p - 1);
    let (_, exp) = split_exp(&probe);
    let p_i32 = i32::try_from(p).unwrap_or(i32::MAX);
    if exp >= -4 && exp < p_i32 {
        let frac = usize::try_from(p_i32 - 1 - exp).unwrap_or(0);
        let s = fixed(value, frac, alt);
        if alt { s } else { strip_fraction_zeros(&s).to_owned() }
    } else {
        let raw = format!("{value:.prec$e}", prec = p - 1);
        let (mantissa, exp) = split_exp(&raw);
        let mantissa = if alt {
            if mantissa.contains('.') { mantissa.to_owned() } else { format!("{mantissa}.") }
        } else {
            strip_fraction_zeros(mantissa).to_owned()
        };
        c_exponent(&mantissa, exp, upper)
    }
}

/// `%a` body after the `0x` prefix: `h.hhhp±d`.
fn hex_float(value: f64, precision: Option<usize>, alt: bool) -> String {
    const FRAC_BITS: u32 = 52;
    const FRAC_DIGITS: usize = 13;
    let bits = value.to_bits();
    let biased = ((bits >> FRAC_BITS) & 0x7ff) as i64;
    let mut frac = bits & ((1 << FRAC_BITS) - 1);
    let (mut lead, exp) = match (biased, frac) {
        (0, 0) => (0_u64, 0_i64),
        (0, _) => (0, -1022),
        _ => (1, biased - 1023),
    };
    let mut digits = FRAC_DIGITS;
    if let Some(p) = precision
        && p < FRAC_DIGITS
    {
        // Round half to even at the requested hex digit.
        let shift = (FRAC_DIGITS - p) as u32 * 4;
        let whole = (lead << FRAC_BITS) | frac;
        let rem = whole & ((1 << shift) - 1);
        let half = 1 << (shift - 1);
        let mut q = whole >> shift;
        if rem > half || (rem == half && q & 1 == 1) {
            q += 1;
        }
        let kept = p as u32 * 4;
        lead = q >> kept;
        frac = q & ((1 << kept) - 1);
        digits = p;
    }
    let mut fraction = if digits == 0 {
        String::new()
    } else {
        format!("{frac:0digits$x}")
    };
    match precision {
        Some(p) if p > FRAC_DIGITS => fraction.extend(std::iter::repeat_n('0', p - FRAC_DIGITS)),
        None => fraction.truncate(fraction.trim_end_matches('0').len()),
        _ => {}
    }
    let dot = if fraction.is_empty() && !alt { "" } else { "." };
    format!("{lead:x}{dot}{fraction}p{exp:+}")
}

/// `%f`, `%e`, `%g`, `%a` and their upper-case forms.
pub fn render_float(value: f64, layout: &Layout, out: &mut Vec<u8>) -> Result<()> {
    let upper = layout.conversion.is_ascii_uppercase();
    let mut addon = Addon::default();
    if let Some(sign) = sign_of(value.is_sign_negative(), layout.flags) {
        addon.push(&[sign]);
    }
    if !value.is_finite() {
        let body: &[u8] = match (value.is_nan(), upper) {
            (true, false) => b"nan",
            (true, true) => b"NAN",
            (false, false) => b"inf",
            (false, true) => b"INF",
        };
        return emit(out, layout, addon.as_bytes(), 0, body, false);
    }
    let abs = value.abs();
    let alt = layout.flags.alt_form;
    let precision = layout.precision.unwrap_or(6);
    let mut body = match layout.conversion | 0x20 {
        b'e' => scientific(abs, precision, upper, alt),
        b'g' => general(abs, precision, upper, alt),
        b'a' => {
            addon.push(if upper { b"0X" } else { b"0x" });
            hex_float(abs, layout.precision, alt)
        }
        _ => fixed(abs, precision, alt),
    };
    if upper {
        body.make_ascii_uppercase();
    }
    emit(out, layout, addon.as_bytes(), 0, body.as_bytes(), true)
}

/// `%s`, and staged `%{...}` output: precision truncates.
pub fn render_bytes(s: &[u8], layout: &Layout, out: &mut Vec<u8>) -> Result<()> {
    let shown = &s[..layout.precision.map_or(s.len(), |p| p.min(s.len()))];
    emit(out, layout, &[], 0, shown, false)
}

pub fn render_char(c: u8, layout: &Layout, out: &mut Vec<u8>) -> Result<()> {
    emit(out, layout, &[], 0, &[c], false)
}

/// `%p`: `0x` and the address zero-padded to pointer width.
pub fn render_pointer(addr: usize, layout: &Layout, out: &mut Vec<u8>) -> Result<()> {
    const DIGITS: usize = 2 * std::mem::size_of::<usize>();
    let body = format!("{addr:0DIGITS$x}");
    emit(out, layout, b"0x", 0, body.as_bytes(), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::spec::{Dialect, parse_format_spec};

    fn render(directive: &str, f: impl FnOnce(&Layout, &mut Vec<u8>) -> Result<()>) -> String {
        let (spec, _) = parse_format_spec(directive.as_bytes(), Dialect::Printf).unwrap().unwrap();
        let mut out = Vec::new();
        f(&Layout::of(&spec), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn int(directive: &str, v: i64) -> String {
        render(directive, |l, o| render_signed(v, l, o))
    }

    fn uint(directive: &str, v: u64) -> String {
        render(directive, |l, o| render_unsigned(v, l, o))
    }

    fn float(directive: &str, v: f64) -> String {
        render(directive, |l, o| render_float(v, l, o))
    }

    #[test]
    fn signed_padding_and_signs() {
        assert_eq!(int("d", 42), "42");
        assert_eq!(int("+6d", 42), "   +42");
        assert_eq!(int("-6d", 42), "42    ");
        assert_eq!(int("08d", -42), "-0000042");
        assert_eq!(int(" d", 7), " 7");
        assert_eq!(int("d", i64::MIN), "-9223372036854775808");
    }

    #[test]
    fn precision_fill_sits_after_sign() {
        assert_eq!(int("8.4d", -5), "   -0005");
        // The zero flag yields to an explicit precision.
        assert_eq!(int("08.3d", 5), "     005");
        assert_eq!(int(".0d", 0), "");
        assert_eq!(int("3.0d", 0), "   ");
    }

    #[test]
    fn radix_forms() {
        assert_eq!(uint("#x", 255), "0xff");
        assert_eq!(uint("#X", 255), "0XFF");
        assert_eq!(uint("#x", 0), "0");
        assert_eq!(uint("#o", 8), "010");
        assert_eq!(uint("#.0o", 0), "0");
        assert_eq!(uint("#010x", 255), "0x000000ff");
        assert_eq!(uint("+u", 3), "3");
    }

    #[test]
    fn fixed_and_scientific() {
        assert_eq!(float("f", 3.14159), "3.141590");
        assert_eq!(float(".2f", -0.005), "-0.01");
        assert_eq!(float("#.0f", 2.0), "2.");
        assert_eq!(float("e", 1234.5), "1.234500e+03");
        assert_eq!(float(".0E", 0.00012), "1E-04");
        assert_eq!(float("010.2f", -1.5), "-000001.50");
    }

    #[test]
    fn general_picks_shorter_form() {
        assert_eq!(float("g", 100000.0), "100000");
        assert_eq!(float("g", 1000000.0), "1e+06");
        assert_eq!(float("g", 0.0001), "0.0001");
        assert_eq!(float("g", 0.00001), "1e-05");
        assert_eq!(float("#g", 1.0), "1.00000");
        assert_eq!(float("G", 1.5e-10), "1.5E-10");
        assert_eq!(float("g", 0.0), "0");
    }

    #[test]
    fn hex_floats() {
        assert_eq!(float("a", 1.0), "0x1p+0");
        assert_eq!(float("a", -0.5), "-0x1p-1");
        assert_eq!(float("A", 10.0), "0X1.4P+3");
        assert_eq!(float(".1a", 1.0), "0x1.0p+0");
        assert_eq!(float("a", 0.0), "0x0p+0");
        assert_eq!(float("010a", 1.0), "0x00001p+0");
    }

    #[test]
    fn non_finite_ignore_zero_flag() {
        assert_eq!(float("05f", f64::NAN), "  nan");
        assert_eq!(float("F", f64::NEG_INFINITY), "-INF");
        assert_eq!(float("+f", f64::INFINITY), "+inf");
    }

    #[test]
    fn strings_chars_pointers() {
        assert_eq!(render(".3s", |l, o| render_bytes(b"hello", l, o)), "hel");
        assert_eq!(render("-7s|", |l, o| render_bytes(b"hi", l, o)), "hi     ");
        assert_eq!(render("5c", |l, o| render_char(b'A', l, o)), "    A");
        let p = render("p", |l, o| render_pointer(0xdead, l, o));
        assert!(p.starts_with("0x") && p.ends_with("dead"));
        assert_eq!(p.len(), 2 + 2 * std::mem::size_of::<usize>());
    }

    #[test]
    fn star_arguments() {
        let (spec, _) = parse_format_spec(b"*.*d", Dialect::Printf).unwrap().unwrap();
        let mut layout = Layout::of(&spec);
        layout.set_width_arg(-5).unwrap();
        layout.set_precision_arg(-1).unwrap();
        let mut out = Vec::new();
        render_signed(7, &layout, &mut out).unwrap();
        assert_eq!(out, b"7    ");
    }

    #[test]
    fn star_arguments_past_int_range_are_rejected() {
        let (spec, _) = parse_format_spec(b"*.*d", Dialect::Printf).unwrap().unwrap();
        let mut layout = Layout::of(&spec);
        assert_eq!(layout.set_width_arg(i64::MAX), Err(StreamError::InvalidArgument));
        assert_eq!(layout.set_width_arg(i64::MIN), Err(StreamError::InvalidArgument));
        assert_eq!(layout.set_width_arg(-(MAX_COUNT as i64) - 1), Err(StreamError::InvalidArgument));
        assert_eq!(layout.set_precision_arg(i64::from(i32::MAX) + 1), Err(StreamError::InvalidArgument));
        assert_eq!(layout, Layout::of(&spec));
        layout.set_width_arg(-(MAX_COUNT as i64)).unwrap();
        assert_eq!(layout.width, MAX_COUNT);
        assert!(layout.flags.left_justify);
    }
}
