//! # punzip
//!
//! Concurrent zip extraction into pluggable output sinks.
//!
//! Every archive member is extracted by its own blocking task. A concurrency
//! gate bounds how many members are in flight, a single run-scoped lock
//! guards the completion counter and the list of failures, and the run waits
//! for every admitted member before returning.
//!
//! - [`Extractor`] drives a run over any [`ArchiveSource`]
//! - [`OutputSink`] receives directories and file bytes: [`DirSink`] writes
//!   to disk, [`DiscardSink`] drops everything, [`MemorySink`] records calls
//! - [`ProgressMonitor`] sees a `{completed, total}` snapshot per member
//!
//! ## Example
//!
//! ```rust,no_run
//! use punzip::{extract_file, probe, DirSink, ExtractOptions};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let info = probe(Path::new("archive.zip"))?;
//! println!("Format: {}, Entries: {}", info.format, info.entries);
//!
//! let stats = extract_file(
//!     Path::new("archive.zip"),
//!     Arc::new(DirSink::new("output")),
//!     &ExtractOptions { concurrency: 8 },
//! )
//! .await?;
//! println!("Extracted {} members ({} bytes)", stats.completed, stats.bytes_written);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod error;
pub mod extract;
pub mod gate;
pub mod member;
pub mod probe;
pub mod progress;
pub mod safety;
pub mod sink;
pub mod types;

// Re-export main types
pub use archive::{ArchiveSource, MemoryArchive, ZipSource};
pub use error::{ExtractError, SecurityError, SinkError};
pub use extract::Extractor;
pub use gate::ConcurrencyGate;
pub use probe::{ArchiveEntry, ArchiveInfo};
pub use progress::{NoopMonitor, ProgressMonitor};
pub use sink::{DirInfo, DirSink, DiscardSink, FileDestination, FileInfo, MemorySink, OutputSink};
pub use tokio_util::sync::CancellationToken;
pub use types::{
    ExtractOptions, ExtractReport, ExtractStats, FileMode, Member, MemberError, MemberKind,
    Progress,
};

use std::path::Path;
use std::sync::Arc;

/// Probe a zip archive to retrieve metadata without extracting.
///
/// # Errors
///
/// Returns an error if the archive file doesn't exist or is not a zip archive.
pub fn probe(path: &Path) -> Result<ArchiveInfo, ExtractError> {
    probe::probe_archive(path)
}

/// Extract all members of the zip file at `path` into `sink`.
///
/// The archive is opened on the blocking pool; a failure to open it is
/// returned before anything is extracted.
pub async fn extract_file(
    path: &Path,
    sink: Arc<dyn OutputSink>,
    options: &ExtractOptions,
) -> Result<ExtractStats, ExtractError> {
    let archive_path = path.to_path_buf();
    let source = tokio::task::spawn_blocking(move || ZipSource::open(archive_path))
        .await
        .map_err(|e| ExtractError::TaskFailed {
            name: path.display().to_string(),
            reason: e.to_string(),
        })??;

    Extractor::from_options(options)
        .extract(Arc::new(source), sink)
        .await
}
