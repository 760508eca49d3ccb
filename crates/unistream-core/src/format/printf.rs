//! The printf engine.

use std::sync::Arc;

use tracing::trace;

use crate::errno::{Result, StreamError};
use crate::registry;
use crate::serial::base::{ContainerBase, Identity, SerializeFn};
use crate::serial::value::value_base;
use crate::stream::Stream;

use super::args::Arg;
use super::render::{Layout, render_bytes, render_char, render_float, render_pointer, render_signed, render_unsigned};
use super::spec::{Count, Dialect, FormatRef, FormatSpec, LengthMod, Segment, TypeRef, TypedSpec, parse_format_string};

/// Argument cursor. A positional directive moves the cursor to its
/// position; its `*` counts and `%{...}` extras follow from there.
struct Cursor<'b, 'a> {
    args: &'b [Arg<'a>],
    next: usize,
}

impl<'a> Cursor<'_, 'a> {
    fn start(&mut self, spec: &FormatSpec<'_>) {
        if let Some(position) = spec.position {
            self.next = position - 1;
        }
    }

    fn take(&mut self) -> Result<Arg<'a>> {
        let arg = *self.args.get(self.next).ok_or(StreamError::InvalidArgument)?;
        self.next += 1;
        Ok(arg)
    }
}

fn truncate_signed(v: i64, length: LengthMod) -> i64 {
    match length {
        LengthMod::Hh => i64::from(v as i8),
        LengthMod::H => i64::from(v as i16),
        LengthMod::I32 => i64::from(v as i32),
        _ => v,
    }
}

fn truncate_unsigned(v: u64, length: LengthMod) -> u64 {
    match length {
        LengthMod::Hh => u64::from(v as u8),
        LengthMod::H => u64::from(v as u16),
        LengthMod::I32 => u64::from(v as u32),
        _ => v,
    }
}

struct Printer<'s, 'b, 'a> {
    stream: &'s mut Stream,
    args: Cursor<'b, 'a>,
    written: usize,
    field: Vec<u8>,
}

impl Printer<'_, '_, '_> {
    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        self.written += bytes.len();
        Ok(())
    }

    fn layout(&mut self, spec: &FormatSpec<'_>) -> Result<Layout> {
        let mut layout = Layout::of(spec);
        if spec.width == Count::FromArg {
            layout.set_width_arg(self.args.take()?.int()?)?;
        }
        if spec.precision == Count::FromArg {
            layout.set_precision_arg(self.args.take()?.int()?)?;
        }
        Ok(layout)
    }

    fn directive(&mut self, spec: &FormatSpec<'_>) -> Result<()> {
        self.args.start(spec);
        let layout = self.layout(spec)?;
        if let Some(typed) = spec.typed {
            let staged = spec.width != Count::None || spec.precision != Count::None;
            return self.typed(typed, staged.then_some(layout));
        }

        let arg = self.args.take()?;
        if spec.conversion == b'n' {
            let Arg::Count(cell) = arg else {
                return Err(StreamError::InvalidArgument);
            };
            cell.set(self.written);
            return Ok(());
        }

        let mut field = std::mem::take(&mut self.field);
        field.clear();
        let result = render(spec, &layout, arg, &mut field).and_then(|()| self.emit(&field));
        self.field = field;
        result
    }

    /// `%{type[format]}`; `layout` is set when the output must be staged
    /// for padding or truncation.
    fn typed(&mut self, typed: TypedSpec<'_>, layout: Option<Layout>) -> Result<()> {
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
                owned = registry::lookup_type(self.args.take()?.name()?).ok_or(StreamError::InvalidArgument)?;
                &owned
            }
            TypeRef::BaseArg => match self.args.take()? {
                Arg::Base(base) => base,
                _ => return Err(StreamError::InvalidArgument),
            },
        };

        let (serialize, mut id): (SerializeFn, Identity) = match typed.format {
            FormatRef::Native => (
                base.serialize.ok_or(StreamError::NotSupported)?,
                Identity::requesting(base.native_format.clone()),
            ),
            FormatRef::Named(name) => named_serializer(name)?,
            FormatRef::NameArg => named_serializer(self.args.take()?.name()?)?,
            FormatRef::FnArg => match self.args.take()? {
                Arg::Serializer(f) => (f, Identity::default()),
                _ => return Err(StreamError::InvalidArgument),
            },
        };

        let Arg::Value(data) = self.args.take()? else {
            return Err(StreamError::InvalidArgument);
        };

        match layout {
            None => {
                let start = self.stream.bytes_written();
                serialize(self.stream, data, base, &mut id)?;
                let n = usize::try_from(self.stream.bytes_written() - start).map_err(|_| StreamError::Overflow)?;
                self.written += n;
                trace!(base = %base.name, format = %id.format, bytes = n, "typed value written");
                Ok(())
            }
            Some(layout) => {
                let mut staging = Stream::open_dynamic_buffer("w+b")?;
                serialize(&mut staging, data, base, &mut id)?;
                let staged = staging.take_underlying_buffer()?;
                staging.close()?;
                let mut field = Vec::with_capacity(staged.len().max(layout.width));
                render_bytes(&staged, &layout, &mut field)?;
                self.emit(&field)
            }
        }
    }
}

fn render(spec: &FormatSpec<'_>, layout: &Layout, arg: Arg<'_>, field: &mut Vec<u8>) -> Result<()> {
    match spec.conversion {
        b'd' | b'i' => render_signed(truncate_signed(arg.int()?, spec.length), layout, field),
        b'u' | b'o' | b'x' | b'X' => render_unsigned(truncate_unsigned(arg.uint()?, spec.length), layout, field),
        b'f' | b'F' | b'e' | b'E' | b'g' | b'G' | b'a' | b'A' => render_float(arg.float()?, layout, field),
        b'c' => render_char(arg.int()? as u8, layout, field),
        b's' => render_bytes(arg.bytes()?, layout, field),
        b'p' => render_pointer(arg.uint()? as usize, layout, field),
        _ => Err(StreamError::InvalidArgument),
    }
}

fn named_serializer(name: &str) -> Result<(SerializeFn, Identity)> {
    let entry = registry::lookup_format(name).ok_or(StreamError::InvalidArgument)?;
    let serialize = entry.serialize.ok_or(StreamError::NotSupported)?;
    Ok((serialize, Identity::requesting(entry.name)))
}

impl Stream {
    /// Formatted write. Returns the bytes produced.
    ///
    /// Besides the C directives, `%{type[format]}` writes an
    /// [`Arg::Value`] through a registered type and format.
    pub fn printf(&mut self, fmt: impl AsRef<[u8]>, args: &[Arg<'_>]) -> Result<usize> {
        let segments = parse_format_string(fmt.as_ref(), Dialect::Printf)?;
        let mut printer = Printer {
            stream: self,
            args: Cursor { args, next: 0 },
            written: 0,
            field: Vec::new(),
        };
        for segment in &segments {
            match segment {
                Segment::Literal(bytes) => printer.emit(bytes)?,
                Segment::Percent => printer.emit(b"%")?,
                Segment::Spec(spec) => printer.directive(spec)?,
            }
        }
        Ok(printer.written)
    }
}

/// printf into a fresh byte vector.
pub fn format_bytes(fmt: impl AsRef<[u8]>, args: &[Arg<'_>]) -> Result<Vec<u8>> {
    let mut stream = Stream::open_dynamic_buffer("w+b")?;
    stream.printf(fmt, args)?;
    let out = stream.take_underlying_buffer()?;
    stream.close()?;
    Ok(out)
}

/// printf into a `String`; fails with `BadMessage` if the output is not
/// UTF-8.
pub fn format_string(fmt: impl AsRef<[u8]>, args: &[Arg<'_>]) -> Result<String> {
    String::from_utf8(format_bytes(fmt, args)?).map_err(|_| StreamError::BadMessage)
}

/// printf into `buf`, truncating. Returns the full length the output would
/// have had; no terminator is written.
pub fn snprintf(buf: &mut [u8], fmt: impl AsRef<[u8]>, args: &[Arg<'_>]) -> Result<usize> {
    let out = format_bytes(fmt, args)?;
    let n = out.len().min(buf.len());
    buf[..n].copy_from_slice(&out[..n]);
    Ok(out.len())
}
