//! Kill-and-report primitive: the terminal action taken against a tracee
//! that has violated policy.
//!
//! Grounded on `original_source/src/ptrace_syscall.cc`'s `ReadHandler`,
//! which on denial does `kill(child_pid_, SIGKILL); exit(1);` after logging
//! what it was about to do.

use log::warn;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// Synchronously kills `pid` and logs `reason`. Does not return to the
/// dispatcher on success — the caller (the event loop) must drop the
/// tracee from its live set immediately after calling this, since the
/// tracee is no longer resumable.
///
/// If the kill primitive itself fails, the whole tracer aborts: we have no
/// way left to enforce the policy against this tracee, and limping on would
/// silently downgrade the sandbox to "advisory".
pub fn kill_tracee(pid: Pid, reason: &str) {
    warn!("killing tracee {}: {}", pid, reason);
    signal::kill(pid, Signal::SIGKILL).expect("failed to kill a denied tracee");
}
