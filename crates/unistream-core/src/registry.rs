//! Process-wide registries of named types and formats, and the standard
//! streams.
//!
//! Both registries live behind one mutex and are filled with the builtin
//! entries the first time either is touched. The standard streams are
//! created lazily by their accessors; when two threads race, the first to
//! install its stream wins and the other closes its own.
//!
//! Rust runs no exit hooks for statics: call [`shutdown`] before the process
//! exits to flush the standard streams and empty the registries.

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::{StdBackend, config};
use crate::errno::{Result, StreamError};
use crate::serial::base::{ContainerBase, ParseFn, SerializeFn, null_base, scalar_base};
use crate::serial::dispatch::serialize_base64;
use crate::serial::json::{JSON_ASCII, parse_json, serialize_json};
use crate::serial::text::{parse_utf8, serialize_utf8};
use crate::serial::value::value_base;
use crate::stream::{BufMode, SharedStream, StdioFile, Stream};

/// A registered type.
#[derive(Debug, Clone)]
pub struct TypeEntry {
    pub name: Cow<'static, str>,
    pub base: Arc<ContainerBase>,
}

/// A registered format. At least one direction is present.
#[derive(Debug, Clone)]
pub struct FormatEntry {
    pub name: Cow<'static, str>,
    pub parse: Option<ParseFn>,
    pub serialize: Option<SerializeFn>,
}

struct Registry {
    types: Vec<TypeEntry>,
    formats: Vec<FormatEntry>,
    builtins: bool,
}

static REGISTRY: Mutex<Registry> = Mutex::new(Registry {
    types: Vec::new(),
    formats: Vec::new(),
    builtins: false,
});

fn name_matches(entry: &str, name: &str) -> bool {
    entry.len() == name.len() && entry.as_bytes() == name.as_bytes()
}

impl Registry {
    fn ensure_builtins(&mut self) {
        if self.builtins {
            return;
        }
        self.builtins = true;
        let types: [ContainerBase; 8] = [
            null_base(),
            scalar_base::<bool>(),
            scalar_base::<i64>(),
            scalar_base::<u64>(),
            scalar_base::<f64>(),
            scalar_base::<String>(),
            scalar_base::<Vec<u8>>(),
            value_base(),
        ];
        for base in types {
            self.types.push(TypeEntry {
                name: base.name.clone(),
                base: Arc::new(base),
            });
        }
        let formats: [(&'static str, Option<ParseFn>, Option<SerializeFn>); 4] = [
            ("utf8", Some(parse_utf8), Some(serialize_utf8)),
            ("json", Some(parse_json), Some(serialize_json)),
            (JSON_ASCII, Some(parse_json), Some(serialize_json)),
            ("base64", None, Some(serialize_base64)),
        ];
        for (name, parse, serialize) in formats {
            self.formats.push(FormatEntry {
                name: Cow::Borrowed(name),
                parse,
                serialize,
            });
        }
        debug!(types = self.types.len(), formats = self.formats.len(), "builtin registry entries installed");
    }
}

fn with_registry<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
    let mut registry = REGISTRY.lock();
    registry.ensure_builtins();
    f(&mut registry)
}

/// Register `base` under `name`. A later registration of the same name
/// shadows the earlier one until it is removed.
pub fn register_type(name: impl Into<Cow<'static, str>>, base: impl Into<Arc<ContainerBase>>) -> Result<()> {
    let name = name.into();
    if name.is_empty() {
        return Err(StreamError::InvalidArgument);
    }
    debug!(%name, "type registered");
    with_registry(|r| {
        r.types.push(TypeEntry {
            name,
            base: base.into(),
        });
    });
    Ok(())
}

#[must_use]
pub fn lookup_type(name: &str) -> Option<Arc<ContainerBase>> {
    with_registry(|r| {
        r.types
            .iter()
            .rev()
            .find(|e| name_matches(&e.name, name))
            .map(|e| Arc::clone(&e.base))
    })
}

/// Remove the newest entry named `name` and hand back its base.
pub fn remove_type(name: &str) -> Option<Arc<ContainerBase>> {
    let removed = with_registry(|r| {
        let index = r.types.iter().rposition(|e| name_matches(&e.name, name))?;
        Some(r.types.remove(index).base)
    });
    if removed.is_some() {
        debug!(name, "type removed");
    }
    removed
}

/// Register a format. Fails with `InvalidArgument` when both directions
/// are missing.
pub fn register_format(
    name: impl Into<Cow<'static, str>>,
    parse: Option<ParseFn>,
    serialize: Option<SerializeFn>,
) -> Result<()> {
    let name = name.into();
    if name.is_empty() || (parse.is_none() && serialize.is_none()) {
        return Err(StreamError::InvalidArgument);
    }
    debug!(%name, "format registered");
    with_registry(|r| {
        r.formats.push(FormatEntry {
            name,
            parse,
            serialize,
        });
    });
    Ok(())
}

#[must_use]
pub fn lookup_format(name: &str) -> Option<FormatEntry> {
    with_registry(|r| {
        r.formats
            .iter()
            .rev()
            .find(|e| name_matches(&e.name, name))
            .cloned()
    })
}

pub fn remove_format(name: &str) -> Option<FormatEntry> {
    let removed = with_registry(|r| {
        let index = r.formats.iter().rposition(|e| name_matches(&e.name, name))?;
        Some(r.formats.remove(index))
    });
    if removed.is_some() {
        debug!(name, "format removed");
    }
    removed
}

// ---------------------------------------------------------------------------
// Standard streams
// ---------------------------------------------------------------------------

type Slot = LazyLock<ArcSwapOption<SharedStream>>;

static STDIN: Slot = LazyLock::new(ArcSwapOption::empty);
static STDOUT: Slot = LazyLock::new(ArcSwapOption::empty);
static STDERR: Slot = LazyLock::new(ArcSwapOption::empty);

fn open_stdio(fd: i32) -> Stream {
    Stream::from_stdio(match fd {
        0 => StdioFile::stdin(),
        1 => StdioFile::stdout(),
        _ => StdioFile::stderr(),
    })
}

#[cfg(unix)]
fn open_os(fd: i32) -> Result<Stream> {
    let file = crate::stream::os::std_descriptor(fd)?;
    let mut stream = Stream::from_os_handle(file, if fd == 0 { "rb" } else { "wb" })?;
    match fd {
        1 => stream.setvbuf(BufMode::Line, 0)?,
        2 => stream.setvbuf(BufMode::None, 0)?,
        _ => {}
    }
    Ok(stream)
}

#[cfg(not(unix))]
fn open_os(fd: i32) -> Result<Stream> {
    Ok(open_stdio(fd))
}

fn open_standard(fd: i32) -> Result<Stream> {
    match config().std_backend {
        StdBackend::Os => open_os(fd),
        StdBackend::Stdio => Ok(open_stdio(fd)),
    }
}

fn close_shared(stream: Arc<SharedStream>, what: &str) {
    let Ok(shared) = Arc::try_unwrap(stream) else {
        return;
    };
    match shared.try_close() {
        Ok(Err(err)) => warn!(stream = what, error = %err, "error discarded while closing standard stream"),
        Ok(Ok(())) => {}
        // Someone still holds a handle: flush what we can and let them
        // close it.
        Err(shared) => {
            if let Ok(Err(err)) = shared.with(Stream::flush) {
                warn!(stream = what, error = %err, "error discarded while flushing standard stream");
            }
        }
    }
}

fn standard(slot: &Slot, fd: i32, what: &str) -> Result<SharedStream> {
    if let Some(current) = slot.load_full() {
        return Ok((*current).clone());
    }
    let fresh = Arc::new(SharedStream::new(open_standard(fd)?));
    let previous = slot.compare_and_swap(&None::<Arc<SharedStream>>, Some(Arc::clone(&fresh)));
    match &*previous {
        None => {
            debug!(stream = what, "standard stream installed");
            Ok((*fresh).clone())
        }
        Some(winner) => {
            let winner = (**winner).clone();
            drop(previous);
            close_shared(fresh, what);
            Ok(winner)
        }
    }
}

/// Process-wide standard input.
pub fn stdin() -> Result<SharedStream> {
    standard(&STDIN, 0, "stdin")
}

/// Process-wide standard output, line buffered.
pub fn stdout() -> Result<SharedStream> {
    standard(&STDOUT, 1, "stdout")
}

/// Process-wide standard error, unbuffered.
pub fn stderr() -> Result<SharedStream> {
    standard(&STDERR, 2, "stderr")
}

/// Flush and close the standard streams and empty both registries.
///
/// Safe to call more than once; accessors and registry calls made
/// afterwards start over from a fresh state.
pub fn shutdown() {
    for (slot, what) in [(&STDIN, "stdin"), (&STDOUT, "stdout"), (&STDERR, "stderr")] {
        if let Some(stream) = slot.swap(None) {
            close_shared(stream, what);
        }
    }
    let mut registry = REGISTRY.lock();
    registry.types.clear();
    registry.formats.clear();
    registry.builtins = false;
    debug!("registries torn down");
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::serial::base::Identity;

    fn write_marker(stream: &mut Stream, _: &dyn Any, _: &ContainerBase, _: &mut Identity) -> Result<()> {
        stream.puts("marker")
    }

    #[test]
    fn builtins_are_present() {
        for name in ["null", "bool", "i64", "u64", "f64", "str", "bytes", "value"] {
            assert!(lookup_type(name).is_some(), "missing type {name}");
        }
        for name in ["utf8", "json", "json:ascii"] {
            let entry = lookup_format(name).unwrap();
            assert!(entry.parse.is_some() && entry.serialize.is_some());
        }
        assert!(lookup_format("base64").unwrap().parse.is_none());
    }

    #[test]
    fn newest_registration_shadows() {
        register_type("registry-test-shadow", scalar_base::<i64>()).unwrap();
        register_type("registry-test-shadow", scalar_base::<bool>()).unwrap();
        assert_eq!(lookup_type("registry-test-shadow").unwrap().name, "bool");
        assert_eq!(remove_type("registry-test-shadow").unwrap().name, "bool");
        assert_eq!(lookup_type("registry-test-shadow").unwrap().name, "i64");
        remove_type("registry-test-shadow");
        assert!(lookup_type("registry-test-shadow").is_none());
        assert!(lookup_type("registry-test-shado").is_none());
    }

    #[test]
    fn format_needs_a_direction() {
        assert_eq!(
            register_format("registry-test-none", None, None),
            Err(StreamError::InvalidArgument)
        );
        register_format("registry-test-fmt", None, Some(write_marker)).unwrap();
        assert!(lookup_format("registry-test-fmt").is_some());
        assert!(remove_format("registry-test-fmt").is_some());
        assert!(lookup_format("registry-test-fmt").is_none());
    }

    #[test]
    fn empty_names_are_rejected() {
        assert_eq!(
            register_type("", scalar_base::<i64>()),
            Err(StreamError::InvalidArgument)
        );
    }

    #[test]
    fn standard_streams_are_shared() {
        let a = stderr().unwrap();
        let b = stderr().unwrap();
        assert!(a.ptr_eq(&b));
        assert!(a.with(|s| s.writable()).unwrap());
    }
}
