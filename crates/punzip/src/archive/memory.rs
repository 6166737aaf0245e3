//! In-memory archive for tests and synthetic workloads.

use super::{ArchiveSource, MemberConsumer};
use crate::error::ExtractError;
use crate::types::{FileMode, Member, MemberKind};
use std::io::{self, Read};
use std::time::SystemTime;

#[derive(Debug, Clone)]
enum Content {
    Bytes(Vec<u8>),
    /// Yields the bytes, then fails.
    Broken(Vec<u8>),
}

/// Archive built member by member in memory.
///
/// ```
/// use punzip::archive::{ArchiveSource, MemoryArchive};
///
/// let archive = MemoryArchive::new()
///     .dir("docs/", 0o755)
///     .file("docs/a.txt", 0o644, b"alpha");
/// assert_eq!(archive.members().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    members: Vec<Member>,
    contents: Vec<Content>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory with the given permission bits.
    pub fn dir(self, name: &str, perm: u32) -> Self {
        self.entry(name, FileMode(0o040000 | (perm & 0o7777)), Vec::new())
    }

    /// Add a regular file with the given permission bits.
    pub fn file(self, name: &str, perm: u32, data: impl AsRef<[u8]>) -> Self {
        self.entry(
            name,
            FileMode(0o100000 | (perm & 0o7777)),
            data.as_ref().to_vec(),
        )
    }

    /// Add a symbolic link pointing at `target`.
    pub fn symlink(self, name: &str, target: &str) -> Self {
        self.entry(name, FileMode(0o120777), target.as_bytes().to_vec())
    }

    /// Add a regular file whose stream fails after yielding `data`.
    pub fn broken_file(mut self, name: &str, perm: u32, data: impl AsRef<[u8]>) -> Self {
        let data = data.as_ref().to_vec();
        self.push(name, FileMode(0o100000 | (perm & 0o7777)), data.len() as u64);
        self.contents.push(Content::Broken(data));
        self
    }

    /// Add an entry with raw mode bits (type and permissions).
    pub fn entry(mut self, name: &str, mode: FileMode, data: Vec<u8>) -> Self {
        self.push(name, mode, data.len() as u64);
        self.contents.push(Content::Bytes(data));
        self
    }

    /// Set the modification time of the most recently added member.
    pub fn modified(mut self, at: SystemTime) -> Self {
        if let Some(last) = self.members.last_mut() {
            last.modified = Some(at);
        }
        self
    }

    /// Flag the most recently added member's name as not UTF-8 in the archive.
    pub fn non_utf8(mut self) -> Self {
        if let Some(last) = self.members.last_mut() {
            last.non_utf8 = true;
        }
        self
    }

    fn push(&mut self, name: &str, mode: FileMode, size: u64) {
        self.members.push(Member {
            index: self.members.len(),
            name: name.to_string(),
            kind: MemberKind::from_mode(mode, name.ends_with('/')),
            mode,
            size,
            modified: None,
            non_utf8: false,
        });
    }
}

impl ArchiveSource for MemoryArchive {
    fn members(&self) -> &[Member] {
        &self.members
    }

    fn read_member(
        &self,
        member: &Member,
        consume: &mut MemberConsumer<'_>,
    ) -> Result<(), ExtractError> {
        match self.contents.get(member.index) {
            Some(Content::Bytes(data)) => consume(&mut data.as_slice()),
            Some(Content::Broken(data)) => consume(&mut BrokenReader {
                data: data.as_slice(),
            }),
            None => Err(ExtractError::Archive(zip::result::ZipError::FileNotFound)),
        }
    }
}

struct BrokenReader<'a> {
    data: &'a [u8],
}

impl Read for BrokenReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt stream"));
        }
        self.data.read(buf)
    }
}
