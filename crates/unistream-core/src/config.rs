//! Runtime configuration.
//!
//! Read from the environment on first use and cached for the life of the
//! process:
//! - `UNISTREAM_BUFSIZ`: default engine buffer size for OS-handle streams.
//! - `UNISTREAM_NEWLINE`: `native`, `lf` or `crlf`; the terminator text-mode
//!   writes emit for `\n`.
//! - `UNISTREAM_STD_BACKEND`: `os` or `stdio`; which backend the standard
//!   streams are opened on.

use std::sync::OnceLock;

/// Default engine buffer size.
pub const DEFAULT_BUFSIZ: usize = 4096;
/// Smallest engine buffer the configuration will hand out.
pub const MIN_BUFSIZ: usize = 16;

/// Line terminator emitted by text-mode writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// The terminator of the build target.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(windows) { Self::CrLf } else { Self::Lf }
    }

    /// Parse from string (case-insensitive). Unknown values mean native.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "lf" | "unix" => Self::Lf,
            "crlf" | "dos" | "windows" => Self::CrLf,
            _ => Self::native(),
        }
    }

    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
        }
    }
}

impl Default for LineEnding {
    fn default() -> Self {
        Self::native()
    }
}

/// Backend used for the process-wide standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdBackend {
    /// Raw descriptors 0/1/2 with engine-side buffering.
    Os,
    /// The Rust standard library's stdin/stdout/stderr handles.
    Stdio,
}

impl StdBackend {
    /// Parse from string (case-insensitive). Unknown values mean the platform default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "os" | "fd" | "handle" => Self::Os,
            "stdio" | "std" => Self::Stdio,
            _ => Self::default(),
        }
    }
}

impl Default for StdBackend {
    fn default() -> Self {
        if cfg!(unix) { Self::Os } else { Self::Stdio }
    }
}

/// Snapshot of the process configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub bufsiz: usize,
    pub line_ending: LineEnding,
    pub std_backend: StdBackend,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bufsiz: DEFAULT_BUFSIZ,
            line_ending: LineEnding::native(),
            std_backend: StdBackend::default(),
        }
    }
}

impl StreamConfig {
    /// Build a configuration from a variable lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bufsiz: lookup("UNISTREAM_BUFSIZ")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .map_or(defaults.bufsiz, |n| n.max(MIN_BUFSIZ)),
            line_ending: lookup("UNISTREAM_NEWLINE")
                .map_or(defaults.line_ending, |v| LineEnding::from_str_loose(&v)),
            std_backend: lookup("UNISTREAM_STD_BACKEND")
                .map_or(defaults.std_backend, |v| StdBackend::from_str_loose(&v)),
        }
    }
}

static GLOBAL_CONFIG: OnceLock<StreamConfig> = OnceLock::new();

/// Get the process configuration (reads env vars on first call, caches thereafter).
#[must_use]
pub fn config() -> &'static StreamConfig {
    GLOBAL_CONFIG.get_or_init(|| StreamConfig::from_lookup(|key| std::env::var(key).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_endings() {
        assert_eq!(LineEnding::from_str_loose("LF"), LineEnding::Lf);
        assert_eq!(LineEnding::from_str_loose("crlf"), LineEnding::CrLf);
        assert_eq!(LineEnding::from_str_loose("dos"), LineEnding::CrLf);
        assert_eq!(LineEnding::from_str_loose("bogus"), LineEnding::native());
    }

    #[test]
    fn parse_std_backend() {
        assert_eq!(StdBackend::from_str_loose("OS"), StdBackend::Os);
        assert_eq!(StdBackend::from_str_loose("stdio"), StdBackend::Stdio);
        assert_eq!(StdBackend::from_str_loose("?"), StdBackend::default());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let cfg = StreamConfig::from_lookup(|key| match key {
            "UNISTREAM_BUFSIZ" => Some("64".into()),
            "UNISTREAM_NEWLINE" => Some("crlf".into()),
            _ => None,
        });
        assert_eq!(cfg.bufsiz, 64);
        assert_eq!(cfg.line_ending, LineEnding::CrLf);
        assert_eq!(cfg.std_backend, StdBackend::default());
    }

    #[test]
    fn tiny_bufsiz_is_clamped() {
        let cfg = StreamConfig::from_lookup(|key| {
            (key == "UNISTREAM_BUFSIZ").then(|| "1".to_string())
        });
        assert_eq!(cfg.bufsiz, MIN_BUFSIZ);
    }

    #[test]
    fn garbage_bufsiz_keeps_default() {
        let cfg = StreamConfig::from_lookup(|key| {
            (key == "UNISTREAM_BUFSIZ").then(|| "lots".to_string())
        });
        assert_eq!(cfg.bufsiz, DEFAULT_BUFSIZ);
    }
}
