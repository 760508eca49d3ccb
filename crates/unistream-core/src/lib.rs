//! # unistream-core
//!
//! Unified byte streams over OS handles, memory buffers and user-defined
//! backends, with one engine for buffering, text-mode newline translation,
//! unget, positioning and error state.
//!
//! On top of the engine sit printf/scanf engines whose `%{type[format]}`
//! directive serializes typed values through a process-wide registry, and
//! filter streams (concatenation, base-N codecs) that layer one stream over
//! others.
//!
//! Only the OS-handle module uses `unsafe`, to adopt and close raw
//! descriptors.

pub mod config;
pub mod errno;
pub mod filter;
pub mod format;
pub mod metrics;
pub mod registry;
pub mod serial;
pub mod smallbuf;
pub mod stream;

pub use errno::{Result, StreamError};
pub use filter::{Alphabet, Direction, open_basen, open_concat};
pub use format::{Arg, ScanArg, format_bytes, format_string, snprintf, sscanf};
pub use registry::{shutdown, stderr, stdin, stdout};
pub use serial::{ContainerBase, Identity, Value};
pub use stream::{BufMode, CustomBackend, SharedStream, Stream, StreamPos, Whence};
