//! In-memory sink that records every request.

use super::{DirInfo, FileDestination, FileInfo, OutputSink};
use crate::error::SinkError;
use crate::types::FileMode;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::sync::Arc;

/// One request received by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    /// `create_dir`
    Dir { name: String, mode: FileMode },
    /// `create_file`
    File {
        name: String,
        mode: FileMode,
        size: u64,
    },
}

impl SinkCall {
    /// Member name of the request.
    pub fn name(&self) -> &str {
        match self {
            SinkCall::Dir { name, .. } | SinkCall::File { name, .. } => name,
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<SinkCall>,
    files: BTreeMap<String, Vec<u8>>,
}

/// Keeps the sequence of calls and the finished file contents in memory.
///
/// Requests can be made to fail, which makes it the usual test double.
#[derive(Debug, Default)]
pub struct MemorySink {
    recorded: Arc<Mutex<Recorded>>,
    fail_dirs: bool,
    fail_files: bool,
    fail_names: HashSet<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every `create_dir`.
    pub fn fail_dirs(mut self) -> Self {
        self.fail_dirs = true;
        self
    }

    /// Reject every `create_file`.
    pub fn fail_files(mut self) -> Self {
        self.fail_files = true;
        self
    }

    /// Reject requests for this member name.
    pub fn fail_on(mut self, name: impl Into<String>) -> Self {
        self.fail_names.insert(name.into());
        self
    }

    /// Calls received so far, in arrival order. Rejected calls are included.
    pub fn calls(&self) -> Vec<SinkCall> {
        self.recorded.lock().calls.clone()
    }

    /// Names of the calls received so far, in arrival order.
    pub fn names(&self) -> Vec<String> {
        self.recorded
            .lock()
            .calls
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Contents of a finished file.
    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.recorded.lock().files.get(name).cloned()
    }

    /// Number of finished files.
    pub fn file_count(&self) -> usize {
        self.recorded.lock().files.len()
    }

    fn rejects(&self, name: &str, all: bool) -> Result<(), SinkError> {
        if all || self.fail_names.contains(name) {
            return Err(SinkError::Rejected(format!("memory sink refuses {name}")));
        }
        Ok(())
    }
}

impl OutputSink for MemorySink {
    fn create_dir(&self, name: &str, info: &DirInfo) -> Result<(), SinkError> {
        self.recorded.lock().calls.push(SinkCall::Dir {
            name: name.to_string(),
            mode: info.mode,
        });
        self.rejects(name, self.fail_dirs)
    }

    fn create_file(
        &self,
        name: &str,
        info: &FileInfo,
    ) -> Result<Box<dyn FileDestination>, SinkError> {
        self.recorded.lock().calls.push(SinkCall::File {
            name: name.to_string(),
            mode: info.mode,
            size: info.size,
        });
        self.rejects(name, self.fail_files)?;
        Ok(Box::new(MemoryFile {
            name: name.to_string(),
            buf: Vec::with_capacity(info.size.min(1 << 20) as usize),
            recorded: Arc::clone(&self.recorded),
        }))
    }
}

struct MemoryFile {
    name: String,
    buf: Vec<u8>,
    recorded: Arc<Mutex<Recorded>>,
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileDestination for MemoryFile {
    fn finish(self: Box<Self>) -> Result<(), SinkError> {
        let MemoryFile {
            name,
            buf,
            recorded,
        } = *self;
        recorded.lock().files.insert(name, buf);
        Ok(())
    }
}
