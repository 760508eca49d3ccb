//! Open-mode string parsing.
//!
//! A mode is an order-insensitive run of single-character flags:
//! `r`, `w`, `+`, `a`, `x`, `b`, `t`, `g`. Anything after an `@` is a
//! backend-specific suffix (`@ncp` is the only one the OS backend knows).
//! Characters the core does not recognise are ignored so filters can claim
//! their own.

use std::fs::OpenOptions;

use crate::errno::{Result, StreamError};

use super::flags::StreamFlags;

/// Flags decoded from a mode string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub readable: bool,
    pub writable: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
    pub binary: bool,
    pub exclusive: bool,
    /// `g`: the stream takes ownership of a handle passed to it.
    pub grab: bool,
    /// `@ncp`: the path needs no code-page conversion.
    pub no_codepage: bool,
}

/// Parse a mode string.
///
/// Fails with `InvalidArgument` when no direction (`r`, `w`, `a` or `+`) is
/// present.
pub fn parse_mode(mode: &str) -> Result<OpenFlags> {
    let (core, suffix) = match mode.split_once('@') {
        Some((core, suffix)) => (core, Some(suffix)),
        None => (mode, None),
    };

    let mut flags = OpenFlags::default();
    let mut direction = false;
    let mut text = false;

    for byte in core.bytes() {
        match byte {
            b'r' => {
                flags.readable = true;
                direction = true;
            }
            b'w' => {
                flags.writable = true;
                flags.create = true;
                flags.truncate = true;
                direction = true;
            }
            b'a' => {
                flags.writable = true;
                flags.create = true;
                flags.append = true;
                direction = true;
            }
            b'+' => {
                flags.readable = true;
                flags.writable = true;
                direction = true;
            }
            b'x' => flags.exclusive = true,
            b'b' => flags.binary = true,
            b't' => text = true,
            b'g' => flags.grab = true,
            _ => {}
        }
    }

    if !direction {
        return Err(StreamError::InvalidArgument);
    }
    // An explicit 't' wins over 'b'.
    if text {
        flags.binary = false;
    }
    // "a+" keeps appending; "w+" still truncates.
    if flags.append {
        flags.truncate = false;
    }
    if let Some(suffix) = suffix {
        flags.no_codepage = suffix.split('@').any(|s| s == "ncp");
    }
    Ok(flags)
}

impl OpenFlags {
    /// Read-only, text mode.
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            readable: true,
            writable: false,
            append: false,
            truncate: false,
            create: false,
            binary: false,
            exclusive: false,
            grab: false,
            no_codepage: false,
        }
    }

    /// Read-write, binary.
    #[must_use]
    pub const fn read_write_binary() -> Self {
        Self {
            readable: true,
            writable: true,
            binary: true,
            ..Self::read_only()
        }
    }

    /// Translate to filesystem open options.
    #[must_use]
    pub fn to_open_options(&self) -> OpenOptions {
        let mut opts = OpenOptions::new();
        opts.read(self.readable)
            .write(self.writable && !self.append)
            .append(self.append);
        if self.exclusive && self.create {
            opts.create_new(true);
        } else {
            opts.create(self.create).truncate(self.truncate);
        }
        opts
    }

    /// The persistent state flags a stream opened with this mode starts with.
    #[must_use]
    pub fn stream_flags(&self) -> StreamFlags {
        let mut flags = StreamFlags::empty();
        flags.set(StreamFlags::READ, self.readable);
        flags.set(StreamFlags::WRITE, self.writable);
        flags.set(StreamFlags::UPDATE, self.readable && self.writable);
        flags.set(StreamFlags::APPEND, self.append);
        flags.set(StreamFlags::EXCLUSIVE, self.exclusive);
        flags.set(StreamFlags::BINARY, self.binary);
        flags
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_read() {
        let f = parse_mode("r").unwrap();
        assert!(f.readable);
        assert!(!f.writable);
        assert!(!f.binary);
    }

    #[test]
    fn test_parse_mode_write_truncates() {
        let f = parse_mode("w").unwrap();
        assert!(f.writable);
        assert!(f.create);
        assert!(f.truncate);
        assert!(!f.readable);
    }

    #[test]
    fn test_parse_mode_is_order_insensitive() {
        assert_eq!(parse_mode("b+r").unwrap(), parse_mode("rb+").unwrap());
        assert_eq!(parse_mode("+a").unwrap(), parse_mode("a+").unwrap());
    }

    #[test]
    fn test_parse_mode_append_plus() {
        let f = parse_mode("a+").unwrap();
        assert!(f.readable);
        assert!(f.writable);
        assert!(f.append);
        assert!(!f.truncate);
    }

    #[test]
    fn test_parse_mode_grab_and_exclusive() {
        let f = parse_mode("wxg").unwrap();
        assert!(f.exclusive);
        assert!(f.grab);
    }

    #[test]
    fn test_parse_mode_text_overrides_binary() {
        assert!(parse_mode("rb").unwrap().binary);
        assert!(!parse_mode("rbt").unwrap().binary);
    }

    #[test]
    fn test_parse_mode_ignores_unknown_and_reads_suffix() {
        let f = parse_mode("rz~@ncp").unwrap();
        assert!(f.readable);
        assert!(f.no_codepage);
        // A suffix is not a flag.
        assert!(!parse_mode("r@w").unwrap().writable);
    }

    #[test]
    fn test_parse_mode_requires_direction() {
        assert_eq!(parse_mode(""), Err(StreamError::InvalidArgument));
        assert_eq!(parse_mode("bt"), Err(StreamError::InvalidArgument));
    }

    #[test]
    fn test_stream_flags_from_mode() {
        let f = parse_mode("r+b").unwrap().stream_flags();
        assert!(f.contains(StreamFlags::READ | StreamFlags::WRITE | StreamFlags::UPDATE));
        assert!(f.contains(StreamFlags::BINARY));
        assert!(!f.contains(StreamFlags::APPEND));
    }
}
