use std::fmt;
use std::io;

/// Why an extent specification string failed to parse.
///
/// Mirrors the three failure classes spec'd for the extent grammar: a
/// syntax violation, a numeric literal that doesn't fit a signed 64-bit
/// integer, and a length that isn't strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentParseError {
    /// The string doesn't match `pair ("," pair)*`, `pair = offset ":" length`.
    BadGrammar,
    /// A numeric literal doesn't fit a signed 64-bit integer.
    Overflow,
    /// A `length` field was zero (lengths must be strictly positive).
    ZeroLength,
}

impl fmt::Display for ExtentParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExtentParseError::BadGrammar => "malformed extent specification",
            ExtentParseError::Overflow => "extent numeric literal overflows i64",
            ExtentParseError::ZeroLength => "extent length must be positive",
        })
    }
}

impl std::error::Error for ExtentParseError {}

/// Top-level error type for every operation this crate exposes.
#[derive(Debug)]
pub enum Error {
    /// The patch stream is malformed: bad magic, a negative declared length,
    /// a truncated sub-stream, a negative control field, a sanity-bound
    /// violation, or the reconstructed image not matching the declared size.
    CorruptPatch(String),
    /// An extent specification string failed to parse.
    ExtentParse(ExtentParseError),
    /// A seek or write landed outside an extent view's logical range.
    ExtentBounds(String),
    /// A lower-level read/write/open failure, with the path that caused it
    /// when one is known.
    Io {
        path: Option<std::path::PathBuf>,
        source: io::Error,
    },
    /// An allocation failed outright.
    OutOfMemory,
    /// A declared size exceeded the implementation's sanity ceiling.
    TooLarge { requested: u64, limit: u64 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CorruptPatch(msg) => write!(f, "corrupt patch: {msg}"),
            Error::ExtentParse(e) => write!(f, "extent parse error: {e}"),
            Error::ExtentBounds(msg) => write!(f, "extent bounds error: {msg}"),
            Error::Io { path: Some(p), source } => {
                write!(f, "i/o error on {}: {source}", p.display())
            }
            Error::Io { path: None, source } => write!(f, "i/o error: {source}"),
            Error::OutOfMemory => write!(f, "allocation failed"),
            Error::TooLarge { requested, limit } => write!(
                f,
                "declared size {requested} exceeds sanity ceiling of {limit} bytes"
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ExtentParse(e) => Some(e),
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io { path: None, source }
    }
}

impl From<ExtentParseError> for Error {
    fn from(e: ExtentParseError) -> Self {
        Error::ExtentParse(e)
    }
}

impl Error {
    /// Attaches a path to an I/O error for a better diagnostic; leaves
    /// other variants untouched.
    pub fn with_path(self, path: impl Into<std::path::PathBuf>) -> Self {
        match self {
            Error::Io { source, .. } => Error::Io {
                path: Some(path.into()),
                source,
            },
            other => other,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
