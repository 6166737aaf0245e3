//! Archive probing: read metadata without extracting anything.

use crate::archive::{ArchiveSource, ZipSource};
use crate::error::ExtractError;
use crate::types::{FileMode, Member, MemberKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Individual entry within an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Path of the entry within the archive
    pub path: String,

    /// Directory, regular file, or unsupported
    pub kind: MemberKind,

    /// Unix mode bits
    pub mode: FileMode,

    /// Uncompressed size in bytes
    pub size: u64,
}

impl From<&Member> for ArchiveEntry {
    fn from(member: &Member) -> Self {
        Self {
            path: member.name.clone(),
            kind: member.kind,
            mode: member.mode,
            size: member.size,
        }
    }
}

/// Metadata information about an archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveInfo {
    /// Archive format
    pub format: String,

    /// Number of entries in the archive
    pub entries: u64,

    /// Size of the archive file (if known)
    pub compressed_bytes: Option<u64>,

    /// Sum of the uncompressed sizes of all entries
    pub uncompressed_bytes: u64,

    /// Number of directory entries
    pub directories: u64,

    /// Number of regular file entries
    pub files: u64,

    /// Number of entries that cannot be extracted (links, devices, ...)
    pub unsupported: u64,

    /// List of all entries in the archive
    pub entry_list: Vec<ArchiveEntry>,
}

/// Probe a zip archive on disk.
///
/// # Errors
///
/// Returns [`ExtractError::ArchiveOpen`] if the file is missing or is not a
/// readable zip archive.
pub fn probe_archive(path: &Path) -> Result<ArchiveInfo, ExtractError> {
    let source = ZipSource::open(path)?;
    let mut info = summarize("ZIP", &source);
    info.compressed_bytes = std::fs::metadata(path).ok().map(|m| m.len());
    Ok(info)
}

/// Summarize the members of any opened archive.
pub fn summarize(format: &str, source: &dyn ArchiveSource) -> ArchiveInfo {
    let members = source.members();
    let count = |kind: MemberKind| members.iter().filter(|m| m.kind == kind).count() as u64;

    ArchiveInfo {
        format: format.to_string(),
        entries: members.len() as u64,
        compressed_bytes: None,
        uncompressed_bytes: members
            .iter()
            .filter(|m| m.kind == MemberKind::File)
            .map(|m| m.size)
            .sum(),
        directories: count(MemberKind::Directory),
        files: count(MemberKind::File),
        unsupported: count(MemberKind::Unsupported),
        entry_list: members.iter().map(ArchiveEntry::from).collect(),
    }
}
