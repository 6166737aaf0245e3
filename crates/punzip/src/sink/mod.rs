//! Output sinks: where extracted directories and file bytes end up.

mod dir;
mod discard;
mod memory;

pub use dir::{DirSink, NameDecoder, PassthroughDecoder};
pub use discard::DiscardSink;
pub use memory::{MemorySink, SinkCall};

use crate::error::SinkError;
use crate::types::FileMode;
use std::io::Write;
use std::time::SystemTime;

/// Metadata passed along with a directory creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirInfo {
    /// The name may not be UTF-8 in the archive's own encoding
    pub non_utf8: bool,

    /// Mode bits recorded in the archive
    pub mode: FileMode,
}

/// Metadata passed along with a file creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// The name may not be UTF-8 in the archive's own encoding
    pub non_utf8: bool,

    /// Expected number of bytes that will be written
    pub size: u64,

    /// Modification time recorded in the archive
    pub modified: Option<SystemTime>,

    /// Mode bits recorded in the archive
    pub mode: FileMode,
}

/// Writable destination for one file.
///
/// `finish` is always called once the copy is over, whether or not the copy
/// succeeded, so implementations can close handles and apply metadata there.
pub trait FileDestination: Write + Send {
    /// Finalize the file. The default does nothing.
    fn finish(self: Box<Self>) -> Result<(), SinkError> {
        Ok(())
    }
}

impl FileDestination for std::io::Sink {}

impl FileDestination for Vec<u8> {}

/// Materializes extracted members.
///
/// Both calls may arrive concurrently from several threads, for any nesting
/// depth and in any order: a sink must create missing parent directories
/// itself.
pub trait OutputSink: Send + Sync {
    /// Create a directory (and any missing ancestors).
    fn create_dir(&self, name: &str, info: &DirInfo) -> Result<(), SinkError>;

    /// Create a file and return where its bytes go.
    fn create_file(&self, name: &str, info: &FileInfo)
        -> Result<Box<dyn FileDestination>, SinkError>;
}
