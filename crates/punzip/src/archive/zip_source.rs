//! Zip archives via the `zip` crate.

use super::{ArchiveSource, MemberConsumer};
use crate::error::ExtractError;
use crate::types::{FileMode, Member, MemberKind};
use chrono::{NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;
use zip::result::{ZipError, ZipResult};
use zip::ZipArchive;

type Reopen<R> = Box<dyn Fn() -> io::Result<R> + Send + Sync>;

/// A zip archive whose members can be read from several threads at once.
///
/// The central directory is parsed once up front. Each concurrent reader
/// checks out its own `ZipArchive` handle from an idle pool, opening a new
/// handle only when the pool is empty, so the number of handles never exceeds
/// the number of simultaneous readers.
pub struct ZipSource<R> {
    members: Vec<Member>,
    reopen: Reopen<R>,
    idle: Mutex<Vec<ZipArchive<R>>>,
}

impl<R> std::fmt::Debug for ZipSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipSource")
            .field("members", &self.members.len())
            .field("idle_handles", &self.idle.lock().len())
            .finish()
    }
}

impl<R: Read + Seek + Send> ZipSource<R> {
    /// Parse `reader` as a zip archive. `reopen` produces a fresh,
    /// independently seekable reader over the same bytes.
    pub fn new(
        reader: R,
        reopen: impl Fn() -> io::Result<R> + Send + Sync + 'static,
    ) -> ZipResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let members = read_members(&mut archive)?;
        Ok(Self {
            members,
            reopen: Box::new(reopen),
            idle: Mutex::new(vec![archive]),
        })
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the archive has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn checkout(&self) -> Result<ZipArchive<R>, ExtractError> {
        if let Some(archive) = self.idle.lock().pop() {
            return Ok(archive);
        }
        debug!("opening additional zip handle");
        let reader = (self.reopen)()?;
        Ok(ZipArchive::new(reader)?)
    }

    fn checkin(&self, archive: ZipArchive<R>) {
        self.idle.lock().push(archive);
    }
}

impl ZipSource<BufReader<File>> {
    /// Open a zip file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let path = path.as_ref().to_path_buf();
        let open_failed = |source: ZipError| ExtractError::ArchiveOpen {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).map_err(|e| open_failed(e.into()))?;
        let reopen_path = path.clone();
        Self::new(BufReader::new(file), move || {
            File::open(&reopen_path).map(BufReader::new)
        })
        .map_err(open_failed)
    }
}

impl ZipSource<Cursor<Arc<[u8]>>> {
    /// Parse a zip archive held in memory.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self, ExtractError> {
        let bytes: Arc<[u8]> = bytes.into();
        let reopen_bytes = Arc::clone(&bytes);
        Self::new(Cursor::new(bytes), move || {
            Ok(Cursor::new(Arc::clone(&reopen_bytes)))
        })
        .map_err(|source| ExtractError::ArchiveOpen {
            path: PathBuf::from("<memory>"),
            source,
        })
    }
}

impl<R: Read + Seek + Send> ArchiveSource for ZipSource<R> {
    fn members(&self) -> &[Member] {
        &self.members
    }

    fn read_member(
        &self,
        member: &Member,
        consume: &mut MemberConsumer<'_>,
    ) -> Result<(), ExtractError> {
        let mut archive = self.checkout()?;
        let result = match archive.by_index(member.index) {
            Ok(mut entry) => consume(&mut entry),
            Err(e) => Err(ExtractError::Archive(e)),
        };
        self.checkin(archive);
        result
    }
}

fn read_members<R: Read + Seek>(archive: &mut ZipArchive<R>) -> ZipResult<Vec<Member>> {
    (0..archive.len())
        .map(|index| {
            let entry = archive.by_index_raw(index)?;
            let is_dir = entry.is_dir();
            let mode = FileMode(entry.unix_mode().unwrap_or(if is_dir {
                0o040755
            } else {
                0o100644
            }));
            let modified: Option<zip::DateTime> = entry.last_modified().into();
            let (name, non_utf8) = decode_name(entry.name_raw(), entry.name());
            Ok(Member {
                index,
                name,
                kind: MemberKind::from_mode(mode, is_dir),
                mode,
                size: entry.size(),
                modified: modified.and_then(dos_to_system_time),
                non_utf8,
            })
        })
        .collect()
}

/// Pick the member name from its raw bytes.
///
/// `decoded` is what the zip crate made of the name: the bytes as UTF-8 when
/// the language-encoding flag (bit 11) is set, CP437 otherwise. Valid UTF-8
/// is kept as-is either way. A non-ASCII name is flagged `non_utf8` when its
/// bytes are invalid UTF-8 or when the archive did not declare them UTF-8,
/// which is the case exactly when the CP437 decoding differs.
fn decode_name(raw: &[u8], decoded: &str) -> (String, bool) {
    match std::str::from_utf8(raw) {
        Ok(utf8) if utf8.is_ascii() => (utf8.to_string(), false),
        Ok(utf8) => (utf8.to_string(), decoded != utf8),
        Err(_) => (decoded.to_string(), true),
    }
}

/// Zip stores local wall-clock time without a zone; it is taken as UTC.
fn dos_to_system_time(dt: zip::DateTime) -> Option<SystemTime> {
    let date = NaiveDate::from_ymd_opt(dt.year().into(), dt.month().into(), dt.day().into())?;
    let naive = date.and_hms_opt(dt.hour().into(), dt.minute().into(), dt.second().into())?;
    Some(Utc.from_utc_datetime(&naive).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip() -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.add_directory("docs/", SimpleFileOptions::default())
            .unwrap();
        zip.start_file(
            "docs/readme.txt",
            SimpleFileOptions::default().unix_permissions(0o640),
        )
        .unwrap();
        zip.write_all(b"read me").unwrap();
        zip.add_symlink("link", "docs/readme.txt", SimpleFileOptions::default())
            .unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_members_are_classified() {
        let source = ZipSource::from_bytes(build_zip()).unwrap();
        let kinds: Vec<_> = source
            .members()
            .iter()
            .map(|m| (m.name.as_str(), m.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("docs/", MemberKind::Directory),
                ("docs/readme.txt", MemberKind::File),
                ("link", MemberKind::Unsupported),
            ]
        );
        let readme = &source.members()[1];
        assert_eq!(readme.mode.permissions(), 0o640);
        assert_eq!(readme.size, 7);
        assert!(!readme.non_utf8);
    }

    /// Clear the UTF-8 flag in every local and central header.
    fn clear_utf8_flag(bytes: &mut [u8]) {
        for i in 0..bytes.len().saturating_sub(10) {
            let flags = match &bytes[i..i + 4] {
                b"PK\x03\x04" => i + 6,
                b"PK\x01\x02" => i + 8,
                _ => continue,
            };
            bytes[flags + 1] &= !0x08;
        }
    }

    fn single_file_zip(name: &str) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(b"x").unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_utf8_name_without_flag_is_kept() {
        let mut bytes = single_file_zip("日本.txt");
        clear_utf8_flag(&mut bytes);

        let source = ZipSource::from_bytes(bytes).unwrap();
        let member = &source.members()[0];
        assert_eq!(member.name, "日本.txt");
        assert!(member.non_utf8);
    }

    #[test]
    fn test_utf8_name_with_flag() {
        let source = ZipSource::from_bytes(single_file_zip("日本.txt")).unwrap();
        let member = &source.members()[0];
        assert_eq!(member.name, "日本.txt");
        assert!(!member.non_utf8);
    }

    #[test]
    fn test_invalid_utf8_name_is_flagged() {
        // "日" in Shift-JIS
        let mut bytes = single_file_zip("@@.txt");
        for i in 0..bytes.len() - 1 {
            if &bytes[i..i + 2] == b"@@" {
                bytes[i] = 0x93;
                bytes[i + 1] = 0xfa;
            }
        }
        clear_utf8_flag(&mut bytes);

        let source = ZipSource::from_bytes(bytes).unwrap();
        let member = &source.members()[0];
        assert!(member.non_utf8);
        assert!(member.name.ends_with(".txt"));
        assert_eq!(member.name.chars().count(), 6);
    }

    #[test]
    fn test_ascii_name_is_never_flagged() {
        let mut bytes = single_file_zip("plain.txt");
        clear_utf8_flag(&mut bytes);

        let source = ZipSource::from_bytes(bytes).unwrap();
        assert!(!source.members()[0].non_utf8);
    }

    #[test]
    fn test_concurrent_reads_use_separate_handles() {
        let source = Arc::new(ZipSource::from_bytes(build_zip()).unwrap());
        let readme = source.members()[1].clone();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let source = Arc::clone(&source);
                let readme = readme.clone();
                std::thread::spawn(move || {
                    let mut out = String::new();
                    source
                        .read_member(&readme, &mut |r: &mut dyn Read| {
                            r.read_to_string(&mut out)?;
                            Ok(())
                        })
                        .unwrap();
                    out
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "read me");
        }
    }

    #[test]
    fn test_garbage_is_archive_open_error() {
        let err = ZipSource::from_bytes(b"definitely not a zip".to_vec()).unwrap_err();
        assert!(matches!(err, ExtractError::ArchiveOpen { .. }));
    }

    #[test]
    fn test_missing_file_is_archive_open_error() {
        let err = ZipSource::open("/nonexistent/archive.zip").unwrap_err();
        match err {
            ExtractError::ArchiveOpen { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/archive.zip"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dos_time_conversion() {
        let dt = zip::DateTime::from_date_and_time(2020, 2, 29, 13, 45, 10).unwrap();
        let expected = Utc.with_ymd_and_hms(2020, 2, 29, 13, 45, 10).unwrap();
        assert_eq!(dos_to_system_time(dt), Some(expected.into()));
    }
}
