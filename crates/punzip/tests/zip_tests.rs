//! End-to-end extraction of real zip files onto disk.

use parking_lot::Mutex;
use punzip::{
    extract_file, DirSink, DiscardSink, ExtractError, ExtractOptions, Extractor, Progress,
    ZipSource,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Helper to create a ZIP archive from `(name, content)` pairs.
/// Names ending in `/` become directory entries.
fn create_zip(path: &Path, entries: &[(&str, &[u8])]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options.unix_permissions(0o755))?;
        } else {
            zip.start_file(*name, options)?;
            zip.write_all(content)?;
        }
    }

    zip.finish()?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_extract_two_files_serially() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("simple.zip");
    create_zip(&archive_path, &[("foo.txt", b"foo"), ("bar.txt", b"bar")]).unwrap();
    let out = temp_dir.path().join("out");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let stats = Extractor::new()
        .with_concurrency(1)
        .with_monitor(move |p: Progress| recorder.lock().push(p))
        .extract(
            Arc::new(ZipSource::open(&archive_path).unwrap()),
            Arc::new(DirSink::new(&out)),
        )
        .await
        .unwrap();

    assert_eq!(stats.completed, 2);
    assert_eq!(stats.bytes_written, 6);
    assert_eq!(fs::read_to_string(out.join("foo.txt")).unwrap(), "foo");
    assert_eq!(fs::read_to_string(out.join("bar.txt")).unwrap(), "bar");
    assert_eq!(
        seen.lock().last().copied(),
        Some(Progress {
            completed: 2,
            total: 2
        })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_extract_nested_tree_unlimited() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("tree.zip");
    create_zip(
        &archive_path,
        &[
            ("src/", b""),
            ("src/main.rs", b"fn main() {}"),
            ("src/bin/", b""),
            ("src/bin/tool.rs", b"// tool"),
            ("docs/guide/intro.md", b"# Intro"),
            ("README.md", b"readme"),
        ],
    )
    .unwrap();
    let out = temp_dir.path().join("out");

    let options = ExtractOptions { concurrency: 0 };
    let stats = extract_file(&archive_path, Arc::new(DirSink::new(&out)), &options)
        .await
        .unwrap();
    assert_eq!(stats.completed, 6);

    let mut files: Vec<String> = WalkDir::new(&out)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(&out)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    assert_eq!(
        files,
        vec![
            "README.md",
            "docs/guide/intro.md",
            "src/bin/tool.rs",
            "src/main.rs"
        ]
    );
    assert!(out.join("src/bin").is_dir());
    assert_eq!(
        fs::read_to_string(out.join("docs/guide/intro.md")).unwrap(),
        "# Intro"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dot_directory_entry_is_output_root() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("dot.zip");
    create_zip(&archive_path, &[("./", b""), ("./a.txt", b"a")]).unwrap();
    let out = temp_dir.path().join("out");

    let stats = extract_file(
        &archive_path,
        Arc::new(DirSink::new(&out)),
        &ExtractOptions { concurrency: 1 },
    )
    .await
    .unwrap();

    assert_eq!(stats.completed, 2);
    assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "a");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_archive_fails_to_open() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.zip");

    let err = extract_file(
        &missing,
        Arc::new(DiscardSink),
        &ExtractOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExtractError::ArchiveOpen { .. }));
    assert!(err.to_string().contains("nope.zip"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_not_a_zip_fails_to_open() {
    let temp_dir = TempDir::new().unwrap();
    let bogus = temp_dir.path().join("bogus.zip");
    fs::write(&bogus, b"definitely not a zip file").unwrap();

    let err = extract_file(&bogus, Arc::new(DiscardSink), &ExtractOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::ArchiveOpen { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_discard_sink_with_real_zip() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("data.zip");
    let big = vec![7u8; 64 * 1024];
    create_zip(
        &archive_path,
        &[("a/", b""), ("a/big.bin", &big), ("a/small.txt", b"small")],
    )
    .unwrap();

    let stats = extract_file(
        &archive_path,
        Arc::new(DiscardSink),
        &ExtractOptions { concurrency: 2 },
    )
    .await
    .unwrap();

    assert_eq!(stats.completed, 3);
    assert_eq!(stats.bytes_written, 64 * 1024 + 5);
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_unix_permissions_survive_extraction() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("perms.zip");
    {
        let mut zip = ZipWriter::new(File::create(&archive_path).unwrap());
        zip.start_file(
            "run.sh",
            SimpleFileOptions::default().unix_permissions(0o755),
        )
        .unwrap();
        zip.write_all(b"#!/bin/sh\n").unwrap();
        zip.start_file(
            "secret.txt",
            SimpleFileOptions::default().unix_permissions(0o600),
        )
        .unwrap();
        zip.write_all(b"s").unwrap();
        zip.finish().unwrap();
    }
    let out = temp_dir.path().join("out");

    extract_file(
        &archive_path,
        Arc::new(DirSink::new(&out)),
        &ExtractOptions::default(),
    )
    .await
    .unwrap();

    let mode = |name: &str| fs::metadata(out.join(name)).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode("run.sh"), 0o755);
    assert_eq!(mode("secret.txt"), 0o600);
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_permissions_can_be_ignored() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("perms.zip");
    {
        let mut zip = ZipWriter::new(File::create(&archive_path).unwrap());
        zip.start_file(
            "locked.txt",
            SimpleFileOptions::default().unix_permissions(0o400),
        )
        .unwrap();
        zip.write_all(b"l").unwrap();
        zip.finish().unwrap();
    }
    let out = temp_dir.path().join("out");

    extract_file(
        &archive_path,
        Arc::new(DirSink::new(&out).preserve_permissions(false)),
        &ExtractOptions::default(),
    )
    .await
    .unwrap();

    let mode = fs::metadata(out.join("locked.txt"))
        .unwrap()
        .permissions()
        .mode();
    assert_ne!(mode & 0o777, 0o400);
}
