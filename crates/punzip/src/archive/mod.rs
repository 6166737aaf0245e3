//! Archive readers feeding the extractor.

mod memory;
mod zip_source;

pub use self::memory::MemoryArchive;
pub use self::zip_source::ZipSource;

use crate::error::ExtractError;
use crate::types::Member;
use std::io::Read;

/// Receives the decompressed bytes of one member.
pub type MemberConsumer<'a> = dyn FnMut(&mut dyn Read) -> Result<(), ExtractError> + 'a;

/// An opened archive: an ordered member list plus per-member byte streams.
///
/// `read_member` is called concurrently from several threads.
pub trait ArchiveSource: Send + Sync {
    /// Members in archive order.
    fn members(&self) -> &[Member];

    /// Open the stream of `member` and hand it to `consume`.
    ///
    /// Errors from opening the stream are returned as is; whatever `consume`
    /// returns is passed through.
    fn read_member(
        &self,
        member: &Member,
        consume: &mut MemberConsumer<'_>,
    ) -> Result<(), ExtractError>;
}
