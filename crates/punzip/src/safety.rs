//! Entry name validation for the filesystem sink.
//!
//! Member names come straight from the archive and must never be allowed to
//! point outside the output root (zip-slip).

use crate::error::SecurityError;
use std::path::{Component, Path, PathBuf};

/// Validates and normalizes an archive member name into a relative path.
///
/// - Rejects absolute paths and drive prefixes
/// - Rejects any `..` component
/// - Drops `.` components and redundant separators
/// - Rejects names that normalize to nothing
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use punzip::safety::validate_entry_path;
///
/// let safe_path = validate_entry_path("dir/./file.txt").unwrap();
/// assert_eq!(safe_path, Path::new("dir/file.txt"));
///
/// assert!(validate_entry_path("../../etc/passwd").is_err());
/// assert!(validate_entry_path("/etc/passwd").is_err());
/// ```
pub fn validate_entry_path(name: &str) -> Result<PathBuf, SecurityError> {
    // zip names always use '/', but archives produced on Windows sometimes carry '\'
    let unified;
    let name = if cfg!(windows) || !name.contains('\\') {
        name
    } else {
        unified = name.replace('\\', "/");
        unified.as_str()
    };
    let path = Path::new(name);

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => continue,
            Component::ParentDir => {
                return Err(SecurityError::PathTraversal(format!(
                    "Path contains '..' component: {}",
                    name
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SecurityError::AbsolutePath(name.to_string()));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(SecurityError::PathTraversal(format!(
            "Path normalizes to empty: {:?}",
            name
        )));
    }

    Ok(normalized)
}

/// Joins a validated member name onto `root`.
pub fn resolve_under(root: &Path, name: &str) -> Result<PathBuf, SecurityError> {
    Ok(root.join(validate_entry_path(name)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_entry_path_valid() {
        assert_eq!(validate_entry_path("file.txt").unwrap(), Path::new("file.txt"));
        assert_eq!(
            validate_entry_path("dir/subdir/file.txt").unwrap(),
            Path::new("dir/subdir/file.txt")
        );
        assert_eq!(
            validate_entry_path("./dir/file.txt").unwrap(),
            Path::new("dir/file.txt")
        );
        // directory entries keep their trailing separator in zip archives
        assert_eq!(validate_entry_path("dir/sub/").unwrap(), Path::new("dir/sub"));
        assert_eq!(validate_entry_path("dir//file.txt").unwrap(), Path::new("dir/file.txt"));
    }

    #[test]
    fn test_validate_entry_path_absolute() {
        let result = validate_entry_path("/etc/passwd");
        assert!(matches!(result, Err(SecurityError::AbsolutePath(_))));
    }

    #[test]
    fn test_validate_entry_path_traversal() {
        for name in [
            "../etc/passwd",
            "../../../../../../../etc/passwd",
            "safe/../../etc/passwd",
            "./../../etc/passwd",
            "dir/..",
        ] {
            let result = validate_entry_path(name);
            assert!(
                matches!(result, Err(SecurityError::PathTraversal(_))),
                "{name} should be rejected"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_entry_path_backslash_traversal() {
        assert!(validate_entry_path("..\\..\\etc\\passwd").is_err());
        assert_eq!(
            validate_entry_path("dir\\file.txt").unwrap(),
            Path::new("dir/file.txt")
        );
    }

    #[test]
    fn test_validate_entry_path_empty() {
        assert!(validate_entry_path(".").is_err());
        assert!(validate_entry_path("").is_err());
        assert!(validate_entry_path("././").is_err());
    }

    #[test]
    fn test_validate_entry_path_unicode() {
        assert_eq!(
            validate_entry_path("日本語/ファイル.txt").unwrap(),
            Path::new("日本語/ファイル.txt")
        );
        assert!(validate_entry_path("日本語/../../etc/passwd").is_err());
    }

    #[test]
    fn test_resolve_under() {
        let root = Path::new("/out");
        assert_eq!(
            resolve_under(root, "a/b.txt").unwrap(),
            Path::new("/out/a/b.txt")
        );
        assert!(resolve_under(root, "../b.txt").is_err());
    }
}
