//! Immutable description of what a tracee may do: two filesystem allow-list
//! roots (read, read-write) and three capability flags (fork, exec, socket).
//!
//! A `Policy` is built once, at startup, from either the CLI defaults or a
//! parsed configuration file (see `crate::config`), and is shared read-only
//! by every tracee for the lifetime of the tracer.

use crate::errors::{Error, Result, WithContext};
use nix::errno::Errno;
use std::path::PathBuf;

/// The access mode a path is being checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

#[derive(Debug, Clone)]
pub struct Policy {
    /// Canonical absolute path of the read-only allow-list root, if any.
    pub read_root: Option<PathBuf>,
    /// Canonical absolute path of the read-write allow-list root, if any.
    pub readwrite_root: Option<PathBuf>,
    pub allow_fork: bool,
    pub allow_exec: bool,
    pub allow_socket: bool,
}

impl Policy {
    /// A policy with no file-system reach and no capabilities: the default
    /// when no configuration file is supplied on the command line.
    pub fn deny_all() -> Policy {
        Policy {
            read_root: None,
            readwrite_root: None,
            allow_fork: false,
            allow_exec: false,
            allow_socket: false,
        }
    }

    /// Builds a policy from raw (possibly relative, possibly nonexistent)
    /// root paths, canonicalizing each one that is present.
    ///
    /// Per spec: both roots, if present, must exist and must be given in
    /// absolute form; relative forms are rejected rather than silently
    /// resolved against some implicit base, since "relative to what?" has no
    /// good answer this early in startup.
    pub fn new(
        read_root: Option<PathBuf>,
        readwrite_root: Option<PathBuf>,
        allow_fork: bool,
        allow_exec: bool,
        allow_socket: bool,
    ) -> Result<Policy> {
        Ok(Policy {
            read_root: canonicalize_root(read_root)?,
            readwrite_root: canonicalize_root(readwrite_root)?,
            allow_fork,
            allow_exec,
            allow_socket,
        })
    }
}

fn canonicalize_root(root: Option<PathBuf>) -> Result<Option<PathBuf>> {
    match root {
        None => Ok(None),
        Some(path) => {
            if !path.is_absolute() {
                return Err(Error::errno_with_msg(
                    Errno::EINVAL,
                    format!("policy root {:?} must be an absolute path", path),
                ));
            }
            let canonical = std::fs::canonicalize(&path)
                .context(format!("policy root {:?} does not exist", path))?;
            Ok(Some(canonical))
        }
    }
}
