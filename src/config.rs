//! Reads the policy configuration file named on the command line.
//!
//! Hand-rolled `key: value` / `key = value` parser, not a serialization
//! crate: the grammar is a flat four-key list with no nesting, and
//! spec.md §1 treats configuration parsing as an external collaborator's
//! concern, supplying only the shape of the `Policy` it must produce.

use crate::errors::{Error, Result, WithContext};
use crate::policy::Policy;
use nix::errno::Errno;
use std::path::PathBuf;

#[derive(Debug, Default)]
struct RawConfig {
    read: Option<String>,
    read_write: Option<String>,
    fork: bool,
    exec: bool,
    socket: bool,
}

/// Parses the file at `path` into a `Policy`. Unknown keys, a malformed
/// line, or an unreadable file are all configuration errors (spec.md §7,
/// category 3): the tracer must abort before launching the tracee.
pub fn load(path: &str) -> Result<Policy> {
    let contents = std::fs::read_to_string(path).context(format!("reading config file {}", path))?;
    let raw = parse(&contents)?;

    Policy::new(
        raw.read.map(PathBuf::from),
        raw.read_write.map(PathBuf::from),
        raw.fork,
        raw.exec,
        raw.socket,
    )
}

fn parse(contents: &str) -> Result<RawConfig> {
    let mut config = RawConfig::default();

    for (line_number, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = split_key_value(line).ok_or_else(|| {
            Error::errno_with_msg(
                Errno::EINVAL,
                format!("config line {}: expected `key: value`", line_number + 1),
            )
        })?;

        match key {
            "read" => config.read = Some(value.to_string()),
            "read_write" => config.read_write = Some(value.to_string()),
            "fork" => config.fork = parse_bool(key, value, line_number)?,
            "exec" => config.exec = parse_bool(key, value, line_number)?,
            "socket" => config.socket = parse_bool(key, value, line_number)?,
            other => {
                return Err(Error::errno_with_msg(
                    Errno::EINVAL,
                    format!("config line {}: unknown key `{}`", line_number + 1, other),
                ))
            }
        }
    }

    Ok(config)
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let separator = line.find(|c| c == ':' || c == '=')?;
    let key = line[..separator].trim();
    let value = line[separator + 1..].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

fn parse_bool(key: &str, value: &str, line_number: usize) -> Result<bool> {
    match value {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(Error::errno_with_msg(
            Errno::EINVAL,
            format!(
                "config line {}: `{}` is not a boolean (got `{}`)",
                line_number + 1,
                key,
                other
            ),
        )),
    }
}
