//! Sink that drops everything, for dry runs and benchmarks.

use super::{DirInfo, FileDestination, FileInfo, OutputSink};
use crate::error::SinkError;

/// Accepts every directory and file and discards all bytes. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl OutputSink for DiscardSink {
    fn create_dir(&self, _name: &str, _info: &DirInfo) -> Result<(), SinkError> {
        Ok(())
    }

    fn create_file(
        &self,
        _name: &str,
        _info: &FileInfo,
    ) -> Result<Box<dyn FileDestination>, SinkError> {
        Ok(Box::new(std::io::sink()))
    }
}
