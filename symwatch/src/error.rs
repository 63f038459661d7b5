//! Error types

use std::error::Error as StdError;
use std::path::PathBuf;
use std::{self, fmt, io};

/// Type alias to use this library's `Error` type in a Result
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds
#[derive(Debug)]
pub enum ErrorKind {
    /// Generic error
    ///
    /// May be used in cases where a platform specific error is mapped to this type, or for opaque
    /// internal errors.
    Generic(String),

    /// I/O errors, surfaced as the operating system reported them.
    Io(io::Error),

    /// The requested path does not exist, before any symbolic link is followed.
    PathNotFound,

    /// A read was attempted while no low-level watch is registered.
    NoWatches,

    /// Can't add the low-level watch because the inotify watch limit was reached.
    MaxFilesWatch,
}

/// Watcher error type.
///
/// Errors are emitted either at creation time of a `Watcher`, or during a call to `add` or
/// `read`.
///
/// Some errors are about specific paths, in which case these paths are set in the `paths` field.
#[derive(Debug)]
pub struct Error {
    /// Kind of the error.
    pub kind: ErrorKind,

    /// Relevant paths to the error, if any.
    pub paths: Vec<PathBuf>,
}

impl Error {
    /// Adds a path to the error.
    pub fn add_path(mut self, path: PathBuf) -> Self {
        self.paths.push(path);
        self
    }

    /// Replaces the paths for the error.
    pub fn set_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = paths;
        self
    }

    /// Creates a new Error with empty paths given its kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            paths: Vec::new(),
        }
    }

    /// Creates a new generic Error from a message.
    pub fn generic(msg: &str) -> Self {
        Self::new(ErrorKind::Generic(msg.into()))
    }

    /// Creates a new i/o Error from a stdlib `io::Error`.
    pub fn io(err: io::Error) -> Self {
        Self::new(ErrorKind::Io(err))
    }

    /// Similar to [`Error::io`], but for errors from `inotify_add_watch`.
    ///
    /// `ENOSPC` there means the watch limit was reached, not that a disk is full.
    pub fn io_watch(err: io::Error) -> Self {
        if err.raw_os_error() == Some(libc::ENOSPC) {
            Self::new(ErrorKind::MaxFilesWatch)
        } else {
            Self::io(err)
        }
    }

    /// Creates a new "path not found" error.
    pub fn path_not_found() -> Self {
        Self::new(ErrorKind::PathNotFound)
    }

    /// Creates a new "no watches" error.
    pub fn no_watches() -> Self {
        Self::new(ErrorKind::NoWatches)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let error = match self.kind {
            ErrorKind::PathNotFound => "No path was found.".into(),
            ErrorKind::NoWatches => "There are no files to watch.".into(),
            ErrorKind::MaxFilesWatch => "inotify watch limit reached".into(),
            ErrorKind::Generic(ref err) => err.clone(),
            ErrorKind::Io(ref err) => err.to_string(),
        };

        if self.paths.is_empty() {
            write!(f, "{error}")
        } else {
            write!(f, "{error} about {:?}", self.paths)
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self.kind {
            ErrorKind::Io(ref cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err)
    }
}
