//! Extraction of a single archive member.

use crate::archive::ArchiveSource;
use crate::error::ExtractError;
use crate::sink::{DirInfo, FileInfo, OutputSink};
use crate::types::{Member, MemberKind};
use std::io::{self, Read};

/// Extract one member into `sink`, returning the number of bytes copied.
///
/// - Directories become a single `create_dir` call.
/// - Regular files are streamed from `source` into the destination returned
///   by `create_file`. The destination is finalized even when the copy fails;
///   the copy error still wins over a finalize error.
/// - Every other kind is refused with [`ExtractError::UnsupportedMember`].
pub fn extract_member(
    source: &dyn ArchiveSource,
    sink: &dyn OutputSink,
    member: &Member,
) -> Result<u64, ExtractError> {
    match member.kind {
        MemberKind::Directory => {
            let info = DirInfo {
                non_utf8: member.non_utf8,
                mode: member.mode,
            };
            sink.create_dir(&member.name, &info)
                .map_err(|e| ExtractError::sink(&member.name, e))?;
            Ok(0)
        }
        MemberKind::File => {
            let info = FileInfo {
                non_utf8: member.non_utf8,
                size: member.size,
                modified: member.modified,
                mode: member.mode,
            };
            let mut written = 0;
            source.read_member(member, &mut |reader: &mut dyn Read| {
                let mut dest = sink
                    .create_file(&member.name, &info)
                    .map_err(|e| ExtractError::sink(&member.name, e))?;
                let copied = io::copy(reader, &mut dest);
                let finished = dest.finish();

                written = copied.map_err(|source| ExtractError::Copy {
                    name: member.name.clone(),
                    source,
                })?;
                finished.map_err(|e| ExtractError::sink(&member.name, e))
            })?;
            Ok(written)
        }
        MemberKind::Unsupported => Err(ExtractError::UnsupportedMember {
            mode: member.mode,
            name: member.name.clone(),
        }),
    }
}
