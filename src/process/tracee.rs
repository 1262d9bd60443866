//! Per-tracee bookkeeping: which way the next syscall-stop faces, and
//! whether the initial exec has already been waived.
//!
//! Grounded on the teacher's `process::tracee::Tracee`, narrowed to the
//! three fields the policy engine actually needs; there is no filesystem
//! translation state and no seccomp bookkeeping here, since this sandbox
//! does not rewrite paths or accelerate via seccomp.

use crate::errors::Result;
use crate::path_authority::PathAuthority;
use crate::policy::Policy;
use nix::sys::ptrace;
use nix::unistd::Pid;
use std::rc::Rc;

/// The ptrace-events this sandbox needs distinct stops for. Per spec, these
/// must be installed together in a single `PTRACE_SETOPTIONS` call: each
/// call replaces the previous option mask, so setting them incrementally
/// would silently drop earlier options.
fn trace_options() -> ptrace::Options {
    ptrace::Options::PTRACE_O_TRACESYSGOOD
        | ptrace::Options::PTRACE_O_TRACEFORK
        | ptrace::Options::PTRACE_O_TRACEVFORK
        | ptrace::Options::PTRACE_O_TRACEVFORKDONE
        | ptrace::Options::PTRACE_O_TRACEEXEC
        | ptrace::Options::PTRACE_O_TRACECLONE
}

#[derive(Debug)]
pub struct TraceeProcess {
    pub pid: Pid,
    syscall_parity: bool,
    first_exec_consumed: bool,
    pub policy: Rc<Policy>,
    pub authority: Rc<PathAuthority>,
}

impl TraceeProcess {
    /// A freshly-launched tracee: has not yet gone through the initial-exec
    /// waiver described in spec §4.E.3.
    pub fn new(pid: Pid, policy: Rc<Policy>, authority: Rc<PathAuthority>) -> TraceeProcess {
        TraceeProcess {
            pid,
            syscall_parity: false,
            first_exec_consumed: false,
            policy,
            authority,
        }
    }

    /// A tracee produced by a fork-family event. The waiver must not apply
    /// to children: they never go through the launcher's own `execve`, so
    /// `first_exec_consumed` starts true (see §9 Open Questions: the
    /// original's process-wide waiver flag incorrectly lets a forked child
    /// exec once for free too).
    pub fn new_from_fork(
        pid: Pid,
        policy: Rc<Policy>,
        authority: Rc<PathAuthority>,
    ) -> TraceeProcess {
        TraceeProcess {
            pid,
            syscall_parity: false,
            first_exec_consumed: true,
            policy,
            authority,
        }
    }

    pub fn install_trace_options(&self) -> Result<()> {
        Ok(ptrace::setoptions(self.pid, trace_options())?)
    }

    /// Flips the entry/exit parity bit and returns the new value. `true`
    /// means the stop just observed is a syscall entry.
    pub fn toggle_parity(&mut self) -> bool {
        self.syscall_parity = !self.syscall_parity;
        self.syscall_parity
    }

    pub fn first_exec_consumed(&self) -> bool {
        self.first_exec_consumed
    }

    pub fn consume_first_exec(&mut self) {
        self.first_exec_consumed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn shared() -> (Rc<Policy>, Rc<PathAuthority>) {
        let policy = Rc::new(Policy::deny_all());
        let authority = Rc::new(PathAuthority::new(&policy, PathBuf::from("/")));
        (policy, authority)
    }

    #[test]
    fn freshly_launched_tracee_has_not_waived_exec() {
        let (policy, authority) = shared();
        let tracee = TraceeProcess::new(Pid::from_raw(1), policy, authority);
        assert!(!tracee.first_exec_consumed());
    }

    /// The §9 correction: forked children start with the waiver already
    /// consumed, instead of sharing a process-wide flag with the parent.
    #[test]
    fn forked_tracee_starts_with_exec_already_waived() {
        let (policy, authority) = shared();
        let tracee = TraceeProcess::new_from_fork(Pid::from_raw(2), policy, authority);
        assert!(tracee.first_exec_consumed());
    }

    /// E3: parity alternates, entry-exit-entry-exit.
    #[test]
    fn parity_toggles_on_each_call() {
        let (policy, authority) = shared();
        let mut tracee = TraceeProcess::new(Pid::from_raw(3), policy, authority);
        assert!(tracee.toggle_parity());
        assert!(!tracee.toggle_parity());
        assert!(tracee.toggle_parity());
    }
}
