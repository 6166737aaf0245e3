//! Error types for archive extraction operations.

use crate::types::FileMode;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for extraction operations.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive could not be opened or its central directory could not be parsed.
    #[error("failed to open archive {path}: {source}")]
    ArchiveOpen {
        /// Path of the archive
        path: PathBuf,
        /// Underlying reader failure
        #[source]
        source: zip::result::ZipError,
    },

    /// Reading a member from an already opened archive failed.
    #[error("archive read error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The output sink rejected a directory, file or finalize request.
    #[error("sink error for {name}: {source}")]
    Sink {
        /// Member name as stored in the archive
        name: String,
        /// Failure reported by the sink
        #[source]
        source: SinkError,
    },

    /// The member's kind cannot be reproduced (symbolic link, device, ...).
    #[error("unsupported file mode {mode} for {name}")]
    UnsupportedMember {
        /// Raw mode bits of the member
        mode: FileMode,
        /// Member name as stored in the archive
        name: String,
    },

    /// Copying decompressed bytes into the destination failed.
    #[error("failed to copy {name}: {source}")]
    Copy {
        /// Member name as stored in the archive
        name: String,
        /// Read or write failure
        #[source]
        source: std::io::Error,
    },

    /// Cancellation fired while waiting for a concurrency slot.
    #[error("extraction cancelled")]
    Cancelled,

    /// The task extracting a member panicked or was aborted.
    #[error("extraction task for {name} failed: {reason}")]
    TaskFailed {
        /// Member name as stored in the archive
        name: String,
        /// Panic message or join failure description
        reason: String,
    },

    /// An I/O error outside of a specific member.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    pub(crate) fn sink(name: &str, source: SinkError) -> Self {
        ExtractError::Sink {
            name: name.to_string(),
            source,
        }
    }

    /// Returns the sink failure wrapped by this error, if any.
    pub fn sink_error(&self) -> Option<&SinkError> {
        match self {
            ExtractError::Sink { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether this error came from a cancelled run.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExtractError::Cancelled)
    }
}

/// Errors raised by an [`OutputSink`](crate::sink::OutputSink).
#[derive(Debug, Error)]
pub enum SinkError {
    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The member name would escape the sink's root.
    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),

    /// The name decoder could not re-interpret a non UTF-8 name.
    #[error("cannot decode name {name:?}: {reason}")]
    Decode {
        /// Name as read from the archive
        name: String,
        /// Decoder explanation
        reason: String,
    },

    /// The sink refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Any other failure from a custom sink.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Security-related errors during extraction.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Path traversal attempt detected (e.g., "../../../etc/passwd").
    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    /// Absolute path not allowed in archive entries.
    #[error("Absolute path not allowed: {0}")]
    AbsolutePath(String),
}
