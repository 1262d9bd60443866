//! Decides whether a candidate path is covered by one of the policy's
//! allow-list roots.
//!
//! Grounded on `original_source/src/file_detector.hh`'s `FileDetector`, which
//! normalizes a relative path against the tracer's cwd and then tests
//! containment against a single whitelist string. That source uses plain
//! substring containment (`file.find(whitelist_) != npos`), which is known
//! to accept `/tmp/abc` against a root of `/tmp/a` — a directory-boundary
//! bug. This implementation corrects that: a root is only a match if the
//! next byte of the candidate is a path separator or the end of the string.

use crate::policy::{AccessMode, Policy};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PathAuthority {
    /// The tracer's own canonical working directory, used to resolve
    /// relative candidate paths. Stored without a trailing separator.
    cwd: PathBuf,
    read_root: Option<String>,
    readwrite_root: Option<String>,
}

impl PathAuthority {
    pub fn new(policy: &Policy, cwd: PathBuf) -> PathAuthority {
        PathAuthority {
            cwd,
            read_root: policy.read_root.as_ref().map(|p| canonical_root_string(p)),
            readwrite_root: policy
                .readwrite_root
                .as_ref()
                .map(|p| canonical_root_string(p)),
        }
    }

    /// `path` may be relative or absolute; `mode` selects which root(s) are
    /// consulted. Total: never panics, never touches the filesystem.
    pub fn is_allowed<P: AsRef<Path>>(&self, path: P, mode: AccessMode) -> bool {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return false;
        }

        let candidate = self.to_absolute_candidate(path);

        match mode {
            AccessMode::ReadWrite => self.under_root(&candidate, self.readwrite_root.as_deref()),
            AccessMode::Read => {
                self.under_root(&candidate, self.read_root.as_deref())
                    || self.under_root(&candidate, self.readwrite_root.as_deref())
            }
        }
    }

    fn to_absolute_candidate(&self, path: &Path) -> String {
        let path_str = path.to_string_lossy();
        if path_str.starts_with('/') {
            path_str.into_owned()
        } else {
            let mut candidate = self.cwd.to_string_lossy().into_owned();
            candidate.push('/');
            candidate.push_str(&path_str);
            candidate
        }
    }

    fn under_root(&self, candidate: &str, root: Option<&str>) -> bool {
        match root {
            None => false,
            Some(root) => is_directory_boundary_prefix(root, candidate),
        }
    }
}

/// Canonicalizes away a trailing separator on an already-canonical root
/// (std::fs::canonicalize never adds one except for `/` itself).
fn canonical_root_string(path: &Path) -> String {
    let s = path.to_string_lossy().into_owned();
    if s.len() > 1 && s.ends_with('/') {
        s[..s.len() - 1].to_string()
    } else {
        s
    }
}

/// `root` is a directory-boundary prefix of `candidate` iff `candidate`
/// starts with `root` and the next byte (if any) is a path separator.
fn is_directory_boundary_prefix(root: &str, candidate: &str) -> bool {
    if !candidate.starts_with(root) {
        return false;
    }
    match candidate.as_bytes().get(root.len()) {
        None => true,
        Some(&b'/') => true,
        _ => false,
    }
}
