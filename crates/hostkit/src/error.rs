//! Error types for host effects

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while touching the host
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist (callers create it before appending)
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// File is not writable and privilege escalation is unavailable
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// Any other IO error on a path
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The program could not be started at all
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Section anchor for an insertion is missing from the file
    #[error("anchor '{anchor}' not found in {}", .path.display())]
    AnchorNotFound { anchor: String, path: PathBuf },

    /// Privilege escalation was refused or is unavailable
    #[error("could not obtain privileges: {0}")]
    Privilege(String),

    /// Download failed
    #[error("failed to download {url}: {message}")]
    Download { url: String, message: String },
}

impl Error {
    /// Map an IO error on `path` to the closest variant
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io { path, source },
        }
    }
}

/// Result type for host operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_from_io_classifies_kinds() {
        let err = Error::from_io("/etc/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, Error::NotFound(_)));

        let err = Error::from_io("/etc/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, Error::PermissionDenied(_)));

        let err = Error::from_io("/etc/x", io::Error::other("boom"));
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_display_includes_path() {
        let err = Error::NotFound(PathBuf::from("/etc/fstab"));
        assert_eq!(err.to_string(), "file not found: /etc/fstab");
    }
}
