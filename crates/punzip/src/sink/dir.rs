//! Sink writing members into a directory on the real filesystem.

use super::{DirInfo, FileDestination, FileInfo, OutputSink};
use crate::error::SinkError;
use crate::safety::resolve_under;
use crate::types::FileMode;
use filetime::FileTime;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::trace;

/// Re-interprets member names whose bytes were not stored as UTF-8.
pub trait NameDecoder: Send + Sync {
    /// Return the name to use on disk.
    fn decode(&self, name: &str) -> Result<String, SinkError>;
}

impl<F> NameDecoder for F
where
    F: Fn(&str) -> Result<String, SinkError> + Send + Sync,
{
    fn decode(&self, name: &str) -> Result<String, SinkError> {
        self(name)
    }
}

/// Keeps names as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDecoder;

impl NameDecoder for PassthroughDecoder {
    fn decode(&self, name: &str) -> Result<String, SinkError> {
        Ok(name.to_string())
    }
}

/// Creates real directories and files below a root directory.
///
/// Member names are validated before anything touches the disk, so an entry
/// can never be written outside `root`.
#[derive(Clone)]
pub struct DirSink {
    root: PathBuf,
    preserve_permissions: bool,
    preserve_modified: bool,
    decoder: Arc<dyn NameDecoder>,
}

impl std::fmt::Debug for DirSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirSink")
            .field("root", &self.root)
            .field("preserve_permissions", &self.preserve_permissions)
            .field("preserve_modified", &self.preserve_modified)
            .finish_non_exhaustive()
    }
}

impl DirSink {
    /// Sink rooted at `root`. The root itself is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            preserve_permissions: true,
            preserve_modified: true,
            decoder: Arc::new(PassthroughDecoder),
        }
    }

    /// Apply the archive's permission bits (unix only).
    pub fn preserve_permissions(mut self, yes: bool) -> Self {
        self.preserve_permissions = yes;
        self
    }

    /// Apply the archive's modification times.
    pub fn preserve_modified(mut self, yes: bool) -> Self {
        self.preserve_modified = yes;
        self
    }

    /// Decoder used for members flagged as non UTF-8.
    pub fn with_name_decoder(mut self, decoder: impl NameDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target(&self, name: &str, non_utf8: bool) -> Result<PathBuf, SinkError> {
        let name = if non_utf8 {
            Cow::Owned(self.decoder.decode(name)?)
        } else {
            Cow::Borrowed(name)
        };
        Ok(resolve_under(&self.root, &name)?)
    }
}

impl OutputSink for DirSink {
    fn create_dir(&self, name: &str, info: &DirInfo) -> Result<(), SinkError> {
        if names_root(name) {
            trace!("mkdir {} (root entry {:?})", self.root.display(), name);
            fs::create_dir_all(&self.root)?;
            return Ok(());
        }
        let path = self.target(name, info.non_utf8)?;
        trace!("mkdir {}", path.display());
        fs::create_dir_all(&path)?;
        if self.preserve_permissions {
            // owner keeps rwx so later members can still be written inside
            set_mode(&path, info.mode.permissions() | 0o700)?;
        }
        Ok(())
    }

    fn create_file(
        &self,
        name: &str,
        info: &FileInfo,
    ) -> Result<Box<dyn FileDestination>, SinkError> {
        let path = self.target(name, info.non_utf8)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        trace!("create {}", path.display());
        let file = File::create(&path)?;
        Ok(Box::new(DirFile {
            writer: BufWriter::new(file),
            path,
            modified: info.modified.filter(|_| self.preserve_modified),
            mode: self.preserve_permissions.then_some(info.mode),
        }))
    }
}

/// `./`, `.` and the like: a directory entry for the output root itself.
fn names_root(name: &str) -> bool {
    name.split(['/', '\\'])
        .all(|part| part.is_empty() || part == ".")
}

struct DirFile {
    writer: BufWriter<File>,
    path: PathBuf,
    modified: Option<SystemTime>,
    mode: Option<FileMode>,
}

impl Write for DirFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl FileDestination for DirFile {
    fn finish(self: Box<Self>) -> Result<(), SinkError> {
        let DirFile {
            writer,
            path,
            modified,
            mode,
        } = *self;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        drop(file);

        if let Some(modified) = modified {
            let mtime = FileTime::from_system_time(modified);
            filetime::set_file_times(&path, mtime, mtime)?;
        }
        if let Some(mode) = mode {
            set_mode(&path, mode.permissions())?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
