use std::{fmt, io, path::PathBuf};

/// Typed errors for store creation, batch loading and tree queries.
#[derive(Debug)]
pub enum Error {
    /// Create was called on a path that already holds non-empty store files.
    AlreadyExists { path: PathBuf },
    /// Open was called on a path with absent or incomplete store files.
    NotExists { path: PathBuf },
    /// A queried directory is absent from every opened store.
    DirNotFound { dir: String },
    /// A malformed line in the intermediate summary format.
    Parse { line: u64, reason: String },
    Db(sled::Error),
    Encode(bincode::error::EncodeError),
    Decode(bincode::error::DecodeError),
    Io(io::Error),
    /// Close failures from multiple underlying stores, collected rather than
    /// short-circuited so the caller sees every problem at once.
    CloseAll(Vec<Error>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadyExists { path } => {
                write!(f, "{}: store already exists", path.display())
            }
            Error::NotExists { path } => write!(f, "{}: store does not exist", path.display()),
            Error::DirNotFound { dir } => write!(f, "{dir}: directory not found"),
            Error::Parse { line, reason } => write!(f, "line {line}: {reason}"),
            Error::Db(e) => write!(f, "store error: {e}"),
            Error::Encode(e) => write!(f, "encode error: {e}"),
            Error::Decode(e) => write!(f, "decode error: {e}"),
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::CloseAll(errs) => {
                write!(f, "{} close error(s):", errs.len())?;
                for e in errs {
                    write!(f, " {e};")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Db(e) => Some(e),
            Error::Encode(e) => Some(e),
            Error::Decode(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::Db(e)
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(e: bincode::error::EncodeError) -> Self {
        Error::Encode(e)
    }
}

impl From<bincode::error::DecodeError> for Error {
    fn from(e: bincode::error::DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when a query simply found nothing, as opposed to a hard failure.
    pub fn is_dir_not_found(&self) -> bool {
        matches!(self, Error::DirNotFound { .. })
    }
}
