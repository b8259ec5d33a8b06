//! Path Sandbox - confine tool paths to a base directory
//!
//! Every filesystem tool resolves its path arguments here before touching
//! the disk. A candidate is accepted only when both its lexical form and its
//! physical (post-symlink) form stay inside the canonical base.
//!
//! ## Steps
//! 1. Reject null bytes and paths longer than [`MAX_PATH_LEN`]
//! 2. Canonicalize the base
//! 3. Join relative candidates onto the base, then clean lexically
//! 4. Lexical containment check
//! 5. Sensitive prefix check ([`SENSITIVE_PREFIXES`])
//! 6. Resolve symlinks component by component; missing tails are kept as-is
//! 7. Containment and sensitive checks again on the resolved path
//!
//! [`resolve_no_follow`] stops before the last component so `readlink` can
//! report a link instead of its target.
//!
//! ## Known limitation
//!
//! Resolution and use are separate steps. Another process that swaps a
//! directory for a symlink between the two can still redirect the operation
//! (TOCTOU). Holding a directory descriptor and operating relative to it
//! would close the gap; nothing here does that.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use toolgate_foundation::ToolError;

/// Longest accepted candidate path (bytes)
pub const MAX_PATH_LEN: usize = 4096;

/// Symlinks followed per resolution before giving up
pub const MAX_SYMLINK_HOPS: usize = 40;

/// Always rejected, even under the base. Matched per component, so `/etc`
/// and `/etc/passwd` match but `/etcetera` does not.
pub const SENSITIVE_PREFIXES: &[&str] = &[
    "/etc", "/proc", "/sys", "/dev", "/boot", "/root", "/var/run", "/var/lib",
];

// ============================================================================
// Sandbox
// ============================================================================

/// A canonical base directory with resolve helpers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    base: PathBuf,
}

impl Sandbox {
    /// Canonicalize `base`; it must exist and be a directory
    pub fn new(base: impl AsRef<Path>) -> Result<Self, ToolError> {
        let base = canonical_base(base.as_ref())?;
        if !base.is_dir() {
            return Err(ToolError::InvalidPath(format!(
                "sandbox base is not a directory: {}",
                base.display()
            )));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn resolve(&self, candidate: &str) -> Result<PathBuf, ToolError> {
        resolve(candidate, &self.base)
    }

    pub fn resolve_no_follow(&self, candidate: &str) -> Result<PathBuf, ToolError> {
        resolve_no_follow(candidate, &self.base)
    }

    /// Path relative to the base for display (`.` for the base itself)
    pub fn display_relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.base) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve `candidate` inside `base`, following every symlink.
///
/// Missing paths are allowed (create operations): the existing prefix is
/// resolved and the missing tail reattached unresolved.
pub fn resolve(candidate: &str, base: &Path) -> Result<PathBuf, ToolError> {
    check_candidate(candidate)?;
    let base = canonical_base(base)?;

    let cleaned = clean_candidate(candidate, &base);
    ensure_contained(&base, &cleaned, candidate)?;
    ensure_not_sensitive(&cleaned)?;

    let resolved = resolve_physical(&cleaned)?;
    ensure_contained(&base, &resolved, candidate)?;
    ensure_not_sensitive(&resolved)?;

    Ok(resolved)
}

/// Like [`resolve`], but the last component is never dereferenced.
pub fn resolve_no_follow(candidate: &str, base: &Path) -> Result<PathBuf, ToolError> {
    check_candidate(candidate)?;
    let base = canonical_base(base)?;

    let cleaned = clean_candidate(candidate, &base);
    ensure_contained(&base, &cleaned, candidate)?;
    ensure_not_sensitive(&cleaned)?;

    if cleaned == base {
        return Ok(base);
    }

    let (parent, leaf) = match (cleaned.parent(), cleaned.file_name()) {
        (Some(parent), Some(leaf)) => (parent, leaf),
        _ => return Err(ToolError::InvalidPath(candidate.to_string())),
    };

    let resolved_parent = resolve_physical(parent)?;
    ensure_contained(&base, &resolved_parent, candidate)?;

    let resolved = resolved_parent.join(leaf);
    ensure_contained(&base, &resolved, candidate)?;
    ensure_not_sensitive(&resolved)?;

    Ok(resolved)
}

/// Normalize `.` and `..` without touching the filesystem.
///
/// `..` at the root stays at the root; leading `..` of a relative path is kept.
pub fn lexical_clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();

    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Component-wise containment (equal to base counts as inside)
pub fn is_within(base: &Path, path: &Path) -> bool {
    path.starts_with(base)
}

pub fn is_sensitive(path: &Path) -> bool {
    SENSITIVE_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

fn check_candidate(candidate: &str) -> Result<(), ToolError> {
    if candidate.is_empty() {
        return Err(ToolError::InvalidPath("empty path".to_string()));
    }
    if candidate.contains('\0') {
        return Err(ToolError::InvalidPath(
            "path contains a null byte".to_string(),
        ));
    }
    if candidate.len() > MAX_PATH_LEN {
        return Err(ToolError::InvalidPath(format!(
            "path too long ({} bytes, max {})",
            candidate.len(),
            MAX_PATH_LEN
        )));
    }
    Ok(())
}

fn canonical_base(base: &Path) -> Result<PathBuf, ToolError> {
    std::fs::canonicalize(base).map_err(|e| {
        ToolError::InvalidPath(format!("sandbox base {}: {}", base.display(), e))
    })
}

fn clean_candidate(candidate: &str, base: &Path) -> PathBuf {
    let path = Path::new(candidate);
    if path.is_absolute() {
        lexical_clean(path)
    } else {
        lexical_clean(&base.join(path))
    }
}

fn ensure_contained(base: &Path, path: &Path, candidate: &str) -> Result<(), ToolError> {
    if is_within(base, path) {
        Ok(())
    } else {
        Err(ToolError::PathEscapesSandbox(format!(
            "'{}' resolves to {} outside {}",
            candidate,
            path.display(),
            base.display()
        )))
    }
}

fn ensure_not_sensitive(path: &Path) -> Result<(), ToolError> {
    if is_sensitive(path) {
        Err(ToolError::SensitivePath(path.display().to_string()))
    } else {
        Ok(())
    }
}

/// One owned path component in the resolution queue
enum Part {
    Root(OsString),
    Parent,
    Name(OsString),
}

fn parts_of(path: &Path) -> impl Iterator<Item = Part> + '_ {
    path.components().filter_map(|comp| match comp {
        Component::Prefix(_) | Component::RootDir => Some(Part::Root(comp.as_os_str().into())),
        Component::CurDir => None,
        Component::ParentDir => Some(Part::Parent),
        Component::Normal(name) => Some(Part::Name(name.to_os_string())),
    })
}

/// Walk an absolute, cleaned path one component at a time, splicing in
/// symlink targets as they are met. Components below the first missing
/// entry are appended literally; `..` pops them again.
fn resolve_physical(path: &Path) -> Result<PathBuf, ToolError> {
    let mut pending: VecDeque<Part> = parts_of(path).collect();
    let mut resolved = PathBuf::new();
    // trailing components of `resolved` that do not exist
    let mut missing = 0usize;
    let mut hops = 0usize;

    while let Some(part) = pending.pop_front() {
        match part {
            Part::Root(root) => {
                resolved = PathBuf::from(root);
                missing = 0;
            }
            Part::Parent => {
                resolved.pop();
                missing = missing.saturating_sub(1);
            }
            Part::Name(name) => {
                let candidate = resolved.join(&name);
                if missing > 0 {
                    resolved = candidate;
                    missing += 1;
                    continue;
                }

                match std::fs::symlink_metadata(&candidate) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        hops += 1;
                        if hops > MAX_SYMLINK_HOPS {
                            return Err(ToolError::InvalidPath(format!(
                                "too many levels of symbolic links: {}",
                                path.display()
                            )));
                        }
                        let target = std::fs::read_link(&candidate).map_err(|e| {
                            ToolError::InvalidPath(format!("{}: {}", candidate.display(), e))
                        })?;
                        // splice the target in front of what is left
                        for part in parts_of(&target).collect::<Vec<_>>().into_iter().rev() {
                            pending.push_front(part);
                        }
                    }
                    Ok(_) => resolved = candidate,
                    Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                        return Err(ToolError::InvalidPath(format!(
                            "{}: {}",
                            candidate.display(),
                            e
                        )));
                    }
                    // not found, or a file used as a directory
                    Err(_) => {
                        resolved = candidate;
                        missing = 1;
                    }
                }
            }
        }
    }

    if resolved.as_os_str().is_empty() {
        resolved.push(Component::RootDir.as_os_str());
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(base.join("sub/inner")).unwrap();
        fs::write(base.join("sub/file.txt"), "hello").unwrap();
        (dir, base)
    }

    #[test]
    fn test_lexical_clean() {
        assert_eq!(lexical_clean(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(lexical_clean(Path::new("/../../a")), PathBuf::from("/a"));
        assert_eq!(lexical_clean(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(lexical_clean(Path::new("./")), PathBuf::from("."));
        assert_eq!(lexical_clean(Path::new("/")), PathBuf::from("/"));
    }

    #[test]
    fn test_base_itself_resolves() {
        let (_dir, base) = setup();
        assert_eq!(resolve(".", &base).unwrap(), base);
        assert_eq!(resolve(base.to_str().unwrap(), &base).unwrap(), base);
        assert_eq!(resolve("sub/..", &base).unwrap(), base);
    }

    #[test]
    fn test_relative_and_absolute_inside() {
        let (_dir, base) = setup();
        assert_eq!(
            resolve("sub/file.txt", &base).unwrap(),
            base.join("sub/file.txt")
        );
        let abs = base.join("sub/inner");
        assert_eq!(resolve(abs.to_str().unwrap(), &base).unwrap(), abs);
        assert_eq!(
            resolve("sub/inner/../file.txt", &base).unwrap(),
            base.join("sub/file.txt")
        );
    }

    #[test]
    fn test_parent_escapes() {
        let (_dir, base) = setup();

        let parent = format!("{}/..", base.display());
        assert!(matches!(
            resolve(&parent, &base),
            Err(ToolError::PathEscapesSandbox(_))
        ));
        assert!(matches!(
            resolve("../outside", &base),
            Err(ToolError::PathEscapesSandbox(_))
        ));
        assert!(matches!(
            resolve("sub/../../outside", &base),
            Err(ToolError::PathEscapesSandbox(_))
        ));

        let other = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve(other.path().to_str().unwrap(), &base),
            Err(ToolError::PathEscapesSandbox(_))
        ));
    }

    #[test]
    fn test_invalid_candidates() {
        let (_dir, base) = setup();
        assert!(matches!(resolve("a\0b", &base), Err(ToolError::InvalidPath(_))));
        assert!(matches!(resolve("", &base), Err(ToolError::InvalidPath(_))));

        let long = "a/".repeat(MAX_PATH_LEN);
        assert!(matches!(resolve(&long, &base), Err(ToolError::InvalidPath(_))));
    }

    #[test]
    fn test_missing_tail_is_kept() {
        let (_dir, base) = setup();
        assert_eq!(
            resolve("new/deeper/file.txt", &base).unwrap(),
            base.join("new/deeper/file.txt")
        );
        assert_eq!(
            resolve("new/../sub/file.txt", &base).unwrap(),
            base.join("sub/file.txt")
        );
    }

    #[test]
    fn test_sensitive_prefixes() {
        assert!(is_sensitive(Path::new("/etc")));
        assert!(is_sensitive(Path::new("/etc/passwd")));
        assert!(is_sensitive(Path::new("/var/lib/dpkg")));
        assert!(!is_sensitive(Path::new("/etcetera")));
        assert!(!is_sensitive(Path::new("/var/tmp")));

        // a base of "/" still cannot reach them
        let root = Path::new("/");
        assert!(matches!(
            resolve("/etc/passwd", root),
            Err(ToolError::SensitivePath(_))
        ));
        assert!(matches!(
            resolve("proc/self/environ", root),
            Err(ToolError::SensitivePath(_))
        ));
    }

    #[test]
    fn test_sandbox_wrapper() {
        let (_dir, base) = setup();
        let sandbox = Sandbox::new(&base).unwrap();

        let file = sandbox.resolve("sub/file.txt").unwrap();
        assert_eq!(sandbox.display_relative(&file), "sub/file.txt");
        assert_eq!(sandbox.display_relative(sandbox.base()), ".");

        assert!(Sandbox::new(base.join("sub/file.txt")).is_err());
        assert!(Sandbox::new(base.join("missing")).is_err());
    }

    #[cfg(unix)]
    mod symlinks {
        use super::*;
        use std::os::unix::fs::symlink;

        #[test]
        fn test_symlink_pointing_outside_is_caught() {
            let (_dir, base) = setup();
            let outside = tempfile::tempdir().unwrap();
            fs::write(outside.path().join("secret.txt"), "nope").unwrap();

            symlink(outside.path(), base.join("escape")).unwrap();

            // lexically contained, physically not
            assert!(matches!(
                resolve("escape/secret.txt", &base),
                Err(ToolError::PathEscapesSandbox(_))
            ));
            assert!(matches!(
                resolve("escape", &base),
                Err(ToolError::PathEscapesSandbox(_))
            ));
        }

        #[test]
        fn test_dangling_symlink_pointing_outside() {
            let (_dir, base) = setup();
            let outside = tempfile::tempdir().unwrap();

            symlink(outside.path().join("created.txt"), base.join("trap")).unwrap();
            assert!(matches!(
                resolve("trap", &base),
                Err(ToolError::PathEscapesSandbox(_))
            ));
        }

        #[test]
        fn test_symlink_inside_is_followed() {
            let (_dir, base) = setup();
            symlink("sub/file.txt", base.join("alias")).unwrap();
            symlink(base.join("sub"), base.join("subdir")).unwrap();

            assert_eq!(resolve("alias", &base).unwrap(), base.join("sub/file.txt"));
            assert_eq!(
                resolve("subdir/inner/new.txt", &base).unwrap(),
                base.join("sub/inner/new.txt")
            );
        }

        #[test]
        fn test_relative_dotdot_through_symlinked_dir() {
            let (_dir, base) = setup();
            // subdir -> sub/inner, so subdir/.. is sub, not base
            symlink(base.join("sub/inner"), base.join("subdir")).unwrap();
            symlink("../file.txt", base.join("sub/inner/up")).unwrap();

            assert_eq!(
                resolve("subdir/up", &base).unwrap(),
                base.join("sub/file.txt")
            );
        }

        #[test]
        fn test_symlink_loop() {
            let (_dir, base) = setup();
            symlink(base.join("b"), base.join("a")).unwrap();
            symlink(base.join("a"), base.join("b")).unwrap();

            assert!(matches!(resolve("a", &base), Err(ToolError::InvalidPath(_))));
        }

        #[test]
        fn test_no_follow_keeps_leaf() {
            let (_dir, base) = setup();
            let outside = tempfile::tempdir().unwrap();
            symlink(outside.path(), base.join("escape")).unwrap();

            assert_eq!(resolve_no_follow("escape", &base).unwrap(), base.join("escape"));
            assert!(resolve("escape", &base).is_err());
            assert_eq!(resolve_no_follow(".", &base).unwrap(), base);
        }

        #[test]
        fn test_no_follow_still_checks_parents() {
            let (_dir, base) = setup();
            let outside = tempfile::tempdir().unwrap();
            fs::write(outside.path().join("link"), "x").unwrap();
            symlink(outside.path(), base.join("escape")).unwrap();

            assert!(matches!(
                resolve_no_follow("escape/link", &base),
                Err(ToolError::PathEscapesSandbox(_))
            ));
        }
    }
}
