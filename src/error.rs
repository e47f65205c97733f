use std::{fmt, io, result};

/// Error kinds produced by the dataset storage engine.
///
/// Every variant carries a `file:line` prefixed message (see [`err_at`])
/// so that on-disk corruption reports point at the check that failed,
/// following the same string-bearing-variant idiom the rest of this
/// codebase uses instead of nested structured payloads.
#[derive(Debug)]
pub enum Error {
    /// Missing or invalid dataset/registry configuration.
    Config(String),
    /// Filesystem failure.
    Io(String),
    /// Binary metadata codec failure.
    Codec(String),
    /// Message bytes failed format validation.
    Validator(String),
    /// The dataset's advisory write lock is held by someone else.
    IndexBusy(String),
    /// The index file itself is unreadable/inconsistent.
    IndexCorrupt(String),
    /// A uniqueness constraint rejected an insert.
    IndexConstraint(String),
    /// A segment's bytes don't match what the index/manifest expects.
    SegmentCorrupt(String),
    /// Matcher expression failed to parse.
    Matcher(String),
    /// An insert collided with an existing fingerprint under `replace=no`.
    Duplicate(String),
    /// The query was cancelled by the caller (`dest` returned false, or
    /// the output stream was closed).
    Cancelled(String),
    /// The requested operation is not supported for this format/container.
    Unsupported(String),
}

impl Error {
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "Config",
            Error::Io(_) => "Io",
            Error::Codec(_) => "Codec",
            Error::Validator(_) => "Validator",
            Error::IndexBusy(_) => "IndexBusy",
            Error::IndexCorrupt(_) => "IndexCorrupt",
            Error::IndexConstraint(_) => "IndexConstraint",
            Error::SegmentCorrupt(_) => "SegmentCorrupt",
            Error::Matcher(_) => "Matcher",
            Error::Duplicate(_) => "Duplicate",
            Error::Cancelled(_) => "Cancelled",
            Error::Unsupported(_) => "Unsupported",
        }
    }

    fn message(&self) -> &str {
        match self {
            Error::Config(s)
            | Error::Io(s)
            | Error::Codec(s)
            | Error::Validator(s)
            | Error::IndexBusy(s)
            | Error::IndexCorrupt(s)
            | Error::IndexConstraint(s)
            | Error::SegmentCorrupt(s)
            | Error::Matcher(s)
            | Error::Duplicate(s)
            | Error::Cancelled(s)
            | Error::Unsupported(s) => s,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(format!("{}", err))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Error {
        Error::IndexCorrupt(format!("{}", err))
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Construct an [`Error`], stamping the call site into the message.
///
/// ```ignore
/// return err_at!(Io, "cannot open {:?}", path);
/// return err_at!(Io, Err(io_err));
/// ```
#[macro_export]
macro_rules! err_at {
    ($variant:ident, $msg:expr) => {
        Err($crate::error::Error::$variant(format!(
            "{}:{} {}",
            file!(),
            line!(),
            $msg
        )))
    };
    ($variant:ident, $fmt:expr, $($arg:expr),+ $(,)?) => {
        Err($crate::error::Error::$variant(format!(
            "{}:{} {}",
            file!(),
            line!(),
            format!($fmt, $($arg),+),
        )))
    };
    ($variant:ident, Err($err:expr)) => {
        Err($crate::error::Error::$variant(format!(
            "{}:{} {}",
            file!(),
            line!(),
            $err,
        )))
    };
}
