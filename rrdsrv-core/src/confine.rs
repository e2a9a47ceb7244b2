//! Path confinement against the configured rrd root
//!
//! Check ordering is load-bearing: string-only checks (absolute-path
//! rejection, lexical traversal rejection) run before anything touches the
//! filesystem, and existence is probed only once confinement already holds,
//! so nothing outside the root is ever statted.

use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::error::{SanitizeError, SanitizeResult};

/// Maximum accepted length for a single path field, in bytes.
pub const MAX_PATH_LENGTH: usize = 4096;

/// The directory under which every file reference in a query must resolve.
///
/// Built once at startup from an absolute, existing directory and
/// canonicalized so symlinks in the root itself are resolved up front.
/// Immutable for the process lifetime; threaded explicitly into every
/// sanitizer call, so concurrent requests share nothing mutable.
#[derive(Debug, Clone)]
pub struct RrdRoot {
    root: PathBuf,
}

/// A validated file reference: the canonical absolute path, guaranteed to
/// be a strict descendant of the root after symlink resolution, plus the
/// root-relative suffix used in user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedPath {
    absolute: PathBuf,
    relative: PathBuf,
}

impl ConfinedPath {
    /// The canonical absolute path, safe to hand to the external tool.
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// The root-relative suffix, for messages.
    pub fn relative(&self) -> &Path {
        &self.relative
    }
}

impl RrdRoot {
    /// Resolve a root directory for the process lifetime.
    ///
    /// Fails with `Configuration` if the path does not canonicalize to an
    /// existing directory; the caller is expected to abort startup on this.
    pub fn new<P: AsRef<Path>>(path: P) -> SanitizeResult<Self> {
        let path = path.as_ref();
        let root = path.canonicalize().map_err(|e| {
            SanitizeError::configuration(format!(
                "cannot resolve rrd root {}: {e}",
                path.display()
            ))
        })?;
        if !root.is_dir() {
            return Err(SanitizeError::configuration(format!(
                "rrd root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// The canonical root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Validate one extracted path field against this root.
    ///
    /// Stages, cheapest information first:
    /// 1. reject absolute paths unconditionally (all references are
    ///    root-relative by policy);
    /// 2. reject lexical traversal: any `..` that would climb above the
    ///    root before symlink resolution even begins;
    /// 3. canonicalize and require the real path to be a strict descendant
    ///    of the canonical root (the root itself is not a file reference);
    /// 4. require the result to be an existing regular file.
    pub fn confine(&self, raw: &str) -> SanitizeResult<ConfinedPath> {
        if raw.is_empty() {
            return Err(SanitizeError::malformed_clause("empty path field"));
        }
        if raw.len() > MAX_PATH_LENGTH {
            return Err(SanitizeError::malformed_clause(format!(
                "path field too long: {} > {} bytes",
                raw.len(),
                MAX_PATH_LENGTH
            )));
        }
        if raw.contains('\0') {
            return Err(SanitizeError::malformed_clause(
                "path field contains a NUL byte",
            ));
        }

        let candidate = Path::new(raw);
        if candidate.is_absolute() {
            warn!(path = raw, "rejected absolute path reference");
            return Err(SanitizeError::AbsolutePathRejected(raw.to_string()));
        }

        // Lexical traversal check, before any filesystem access. Depth
        // counts segments below the root; a `..` at depth zero climbs out.
        let mut depth = 0i32;
        for component in candidate.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(_) => depth += 1,
                Component::ParentDir => {
                    depth -= 1;
                    if depth < 0 {
                        warn!(path = raw, "rejected path traversal");
                        return Err(SanitizeError::TraversalRejected(raw.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(SanitizeError::AbsolutePathRejected(raw.to_string()));
                }
            }
        }

        // The join is lexically inside the root at this point, so the
        // canonicalize probe never touches anything outside it except
        // through a symlink, which the prefix check below catches.
        let joined = self.root.join(candidate);
        let resolved = joined
            .canonicalize()
            .map_err(|_| SanitizeError::NotFound(raw.to_string()))?;

        if resolved == self.root || !resolved.starts_with(&self.root) {
            warn!(
                path = raw,
                resolved = %resolved.display(),
                "rejected reference escaping the rrd root"
            );
            return Err(SanitizeError::EscapeRejected(raw.to_string()));
        }

        let metadata = resolved
            .metadata()
            .map_err(|_| SanitizeError::NotFound(raw.to_string()))?;
        if !metadata.is_file() {
            return Err(SanitizeError::NotFound(raw.to_string()));
        }

        let relative = resolved
            .strip_prefix(&self.root)
            .map_err(|_| SanitizeError::EscapeRejected(raw.to_string()))?
            .to_path_buf();

        Ok(ConfinedPath {
            absolute: resolved,
            relative,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn root_with_files() -> (TempDir, RrdRoot) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.rrd"), b"rrd").unwrap();
        fs::create_dir(dir.path().join("hosts")).unwrap();
        fs::write(dir.path().join("hosts/web.rrd"), b"rrd").unwrap();
        let root = RrdRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_confines_existing_file() {
        let (_dir, root) = root_with_files();
        let confined = root.confine("data.rrd").unwrap();
        assert!(confined.absolute().starts_with(root.path()));
        assert_eq!(confined.relative(), Path::new("data.rrd"));
    }

    #[test]
    fn test_confines_nested_file() {
        let (_dir, root) = root_with_files();
        let confined = root.confine("hosts/web.rrd").unwrap();
        assert_eq!(confined.relative(), Path::new("hosts/web.rrd"));
    }

    #[test]
    fn test_curdir_segments_are_harmless() {
        let (_dir, root) = root_with_files();
        let confined = root.confine("./hosts/./web.rrd").unwrap();
        assert_eq!(confined.relative(), Path::new("hosts/web.rrd"));
    }

    #[test]
    fn test_internal_parentdir_stays_inside() {
        let (_dir, root) = root_with_files();
        let confined = root.confine("hosts/../data.rrd").unwrap();
        assert_eq!(confined.relative(), Path::new("data.rrd"));
    }

    #[test]
    fn test_rejects_absolute_path() {
        let (_dir, root) = root_with_files();
        let inside = root.path().join("data.rrd");
        // Absolute references are rejected even when the target is inside.
        let err = root.confine(inside.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, SanitizeError::AbsolutePathRejected(_)));

        let err = root.confine("/etc/passwd").unwrap_err();
        assert!(matches!(err, SanitizeError::AbsolutePathRejected(_)));
    }

    #[test]
    fn test_rejects_traversal() {
        let (_dir, root) = root_with_files();
        let err = root.confine("../../etc/passwd").unwrap_err();
        assert!(matches!(err, SanitizeError::TraversalRejected(_)));

        let err = root.confine("hosts/../../outside.rrd").unwrap_err();
        assert!(matches!(err, SanitizeError::TraversalRejected(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let (dir, root) = root_with_files();
        std::os::unix::fs::symlink("/etc/passwd", dir.path().join("link.rrd")).unwrap();
        let err = root.confine("link.rrd").unwrap_err();
        assert!(matches!(err, SanitizeError::EscapeRejected(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_accepts_symlink_staying_inside() {
        let (dir, root) = root_with_files();
        std::os::unix::fs::symlink(
            dir.path().join("data.rrd"),
            dir.path().join("alias.rrd"),
        )
        .unwrap();
        let confined = root.confine("alias.rrd").unwrap();
        assert_eq!(confined.relative(), Path::new("data.rrd"));
    }

    #[test]
    fn test_rejects_missing_file() {
        let (_dir, root) = root_with_files();
        let err = root.confine("missing.rrd").unwrap_err();
        assert!(matches!(err, SanitizeError::NotFound(_)));
    }

    #[test]
    fn test_rejects_directory_reference() {
        let (_dir, root) = root_with_files();
        let err = root.confine("hosts").unwrap_err();
        assert!(matches!(err, SanitizeError::NotFound(_)));
    }

    #[test]
    fn test_rejects_root_itself() {
        let (_dir, root) = root_with_files();
        let err = root.confine(".").unwrap_err();
        assert!(matches!(err, SanitizeError::EscapeRejected(_)));
    }

    #[test]
    fn test_rejects_nul_byte() {
        let (_dir, root) = root_with_files();
        let err = root.confine("data\0.rrd").unwrap_err();
        assert!(matches!(err, SanitizeError::MalformedClause(_)));
    }

    #[test]
    fn test_root_must_exist() {
        let err = RrdRoot::new("/nonexistent/rrd/root").unwrap_err();
        assert!(matches!(err, SanitizeError::Configuration(_)));
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("flat.rrd");
        fs::write(&file, b"rrd").unwrap();
        let err = RrdRoot::new(&file).unwrap_err();
        assert!(matches!(err, SanitizeError::Configuration(_)));
    }
}
