//! Type definitions for archive extraction.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

/// Raw unix mode bits of an archive member (file type and permissions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMode(pub u32);

impl FileMode {
    /// Permission bits only (`rwxrwxrwx` plus setuid/setgid/sticky).
    pub fn permissions(self) -> u32 {
        self.0 & 0o7777
    }

    /// File type bits only.
    pub fn file_type(self) -> u32 {
        self.0 & S_IFMT
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#o}", self.0)
    }
}

/// Kind of an archive member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    /// Directory
    Directory,
    /// Regular file
    File,
    /// Anything else: symbolic link, device, fifo, socket
    Unsupported,
}

impl MemberKind {
    /// Classify from unix mode bits. Plain or typeless modes count as a
    /// directory when the entry is flagged as one (trailing `/`).
    pub fn from_mode(mode: FileMode, is_dir: bool) -> Self {
        match mode.file_type() {
            S_IFDIR => MemberKind::Directory,
            0 | S_IFREG if is_dir => MemberKind::Directory,
            0 | S_IFREG => MemberKind::File,
            _ => MemberKind::Unsupported,
        }
    }
}

/// One entry of an archive. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Position of the member in the archive
    pub index: usize,

    /// Path of the entry within the archive
    pub name: String,

    /// Directory, regular file, or unsupported
    pub kind: MemberKind,

    /// Unix mode bits (type and permissions)
    pub mode: FileMode,

    /// Uncompressed size in bytes
    pub size: u64,

    /// Last modification time, when the archive records one
    pub modified: Option<SystemTime>,

    /// The stored name bytes are not valid UTF-8
    pub non_utf8: bool,
}

/// Completion snapshot passed to a [`ProgressMonitor`](crate::ProgressMonitor).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Number of members whose extraction attempt has finished
    pub completed: usize,

    /// Number of members in the archive
    pub total: usize,
}

impl Progress {
    /// Whether every member has been accounted for.
    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }

    /// Completion ratio in `0.0..=1.0`; an empty archive counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Options for extracting an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Maximum number of members extracted at the same time; 0 means unlimited
    pub concurrency: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get(),
        }
    }
}

/// Statistics about a completed extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractStats {
    /// Number of members in the archive
    pub total: usize,

    /// Number of members whose extraction attempt finished
    pub completed: usize,

    /// Number of members that failed
    pub failed: usize,

    /// Total bytes copied into the sink
    pub bytes_written: u64,

    /// Duration of the run (in seconds)
    #[serde(with = "duration_serde")]
    pub duration: Duration,

    /// Whether the cancellation token stopped the run early
    pub cancelled: bool,
}

impl Default for ExtractStats {
    fn default() -> Self {
        Self {
            total: 0,
            completed: 0,
            failed: 0,
            bytes_written: 0,
            duration: Duration::from_secs(0),
            cancelled: false,
        }
    }
}

/// A failure recorded for one member during a run.
#[derive(Debug)]
pub struct MemberError {
    /// Archive index of the failing member
    pub index: usize,

    /// Member name as stored in the archive
    pub name: String,

    /// What went wrong
    pub error: ExtractError,
}

/// Full outcome of a run: statistics plus every recorded member failure,
/// in the order the failures were recorded.
#[derive(Debug)]
pub struct ExtractReport {
    /// Run statistics
    pub stats: ExtractStats,

    /// Every member failure, in completion order
    pub errors: Vec<MemberError>,
}

impl ExtractReport {
    /// Whether the run finished without member errors and without cancellation.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.stats.cancelled
    }

    /// Collapse the report to a single result. The error with the lowest
    /// archive index wins; a cancelled run without member errors yields
    /// [`ExtractError::Cancelled`].
    pub fn into_result(self) -> Result<ExtractStats, ExtractError> {
        let first = self
            .errors
            .into_iter()
            .min_by_key(|e| e.index)
            .map(|e| e.error);
        match first {
            Some(err) => Err(err),
            None if self.stats.cancelled => Err(ExtractError::Cancelled),
            None => Ok(self.stats),
        }
    }
}

// Helper module for Duration serialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
