//! The tracer control loop: launches the target, attaches, and drives every
//! live tracee through `wait`/resume until none remain.
//!
//! Grounded on the teacher's `process::proot::PRoot` (`launch_process` and
//! `event_loop`), which is itself the teacher's newer, `nix`-0.24-style
//! rewrite of the ptrace loop (as opposed to the older `ptrace(2)`-wrapper
//! style used by `src/tracee.rs`/`src/proot.rs` at the repo root). The
//! six-way event classification in `run` follows spec.md §4.E directly.

use crate::errors::{Error, Result};
use crate::kernel::{dispatch, Decision};
use crate::path_authority::PathAuthority;
use crate::policy::Policy;
use crate::process::tracee::TraceeProcess;
use crate::register::Registers;
use crate::termination::kill_tracee;
use log::{debug, warn};
use nix::sys::ptrace::{self, Event};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, fork, getpid, ForkResult, Pid};
use std::collections::HashMap;
use std::ffi::CString;
use std::rc::Rc;

/// Owns the live-tracee set and runs the event loop of spec.md §4.E.
#[derive(Debug)]
pub struct Tracer {
    tracees: HashMap<Pid, TraceeProcess>,
}

impl Tracer {
    /// Implements the launcher protocol of spec.md §4.F: fork, have the
    /// child request tracing and stop itself, then wait for that stop
    /// before returning a `Tracer` ready to run its event loop.
    pub fn launch(policy: Rc<Policy>, program: &str, args: &[String]) -> Result<Tracer> {
        let cwd = std::env::current_dir()?;
        let authority = Rc::new(PathAuthority::new(&policy, cwd));

        match unsafe { fork() }? {
            ForkResult::Child => {
                ptrace::traceme().expect("ptrace traceme");
                kill(getpid(), Signal::SIGSTOP).expect("child synchronisation sigstop");

                let program_c = CString::new(program).expect("program name has no interior NUL");
                let mut argv = Vec::with_capacity(args.len() + 1);
                argv.push(program_c.clone());
                for arg in args {
                    argv.push(CString::new(arg.as_str()).expect("argument has no interior NUL"));
                }
                execvp(&program_c, &argv).expect("execvp target program");
                unreachable!("execvp does not return on success")
            }
            ForkResult::Parent { child } => {
                match waitpid(child, Some(WaitPidFlag::__WALL))? {
                    WaitStatus::Stopped(pid, Signal::SIGSTOP) if pid == child => {}
                    other => {
                        return Err(Error::msg(format!(
                            "unexpected wait status while attaching to the launched program: {:?}",
                            other
                        )));
                    }
                }

                let tracee = TraceeProcess::new(child, Rc::clone(&policy), Rc::clone(&authority));
                tracee.install_trace_options()?;

                let mut tracees = HashMap::new();
                tracees.insert(child, tracee);
                ptrace::syscall(child, None)?;

                Ok(Tracer { tracees })
            }
        }
    }

    /// Runs until every tracee has terminated, returning the exit code to
    /// propagate to the sandbox's own caller (spec.md §6, "Exit code
    /// propagated from the tracee's normal termination on success").
    pub fn run(&mut self) -> Result<i32> {
        let mut exit_code = 0;

        while !self.tracees.is_empty() {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::__WALL))? {
                WaitStatus::Exited(pid, status) => {
                    debug!("pid {}: exited with status {}", pid, status);
                    if self.tracees.remove(&pid).is_some() {
                        exit_code = status;
                    }
                }
                WaitStatus::Signaled(pid, signal, _core_dumped) => {
                    warn!("pid {}: terminated by signal {:?}", pid, signal);
                    if self.tracees.remove(&pid).is_some() {
                        exit_code = 128 + signal as i32;
                    }
                }
                WaitStatus::PtraceEvent(pid, _signal, raw_event) => {
                    self.handle_ptrace_event(pid, raw_event)?;
                }
                WaitStatus::PtraceSyscall(pid) => {
                    self.handle_syscall_stop(pid)?;
                }
                WaitStatus::Stopped(pid, signal) => {
                    // an ordinary signal-delivery-stop, unrelated to a
                    // syscall boundary: resume with the signal re-injected.
                    ptrace::cont(pid, Some(signal))?;
                }
                _ => {}
            }
        }

        Ok(exit_code)
    }

    fn handle_ptrace_event(&mut self, pid: Pid, raw_event: i32) -> Result<()> {
        if raw_event == Event::PTRACE_EVENT_EXEC as i32 {
            self.handle_exec_event(pid)
        } else if raw_event == Event::PTRACE_EVENT_FORK as i32
            || raw_event == Event::PTRACE_EVENT_VFORK as i32
            || raw_event == Event::PTRACE_EVENT_CLONE as i32
        {
            self.handle_fork_event(pid)
        } else {
            Ok(ptrace::cont(pid, None)?)
        }
    }

    /// Category 3 of spec.md §4.E: the first exec after launch is always
    /// waived; later execs are gated on `allow_exec`.
    fn handle_exec_event(&mut self, pid: Pid) -> Result<()> {
        let allow_exec = {
            let tracee = self
                .tracees
                .get_mut(&pid)
                .expect("exec event for an untracked pid");
            if !tracee.first_exec_consumed() {
                tracee.consume_first_exec();
                ptrace::cont(pid, None)?;
                return Ok(());
            }
            tracee.policy.allow_exec
        };

        if allow_exec {
            ptrace::cont(pid, None)?;
        } else {
            kill_tracee(pid, "the program is not allowed to exec");
        }
        Ok(())
    }

    /// Category 4 of spec.md §4.E: fork/clone/vfork. New tracees are
    /// installed into the map with their waiver already consumed and the
    /// same trace options as the parent, per §9's per-tracee correction.
    fn handle_fork_event(&mut self, pid: Pid) -> Result<()> {
        let (allow_fork, policy, authority) = {
            let tracee = self
                .tracees
                .get(&pid)
                .expect("fork event for an untracked pid");
            (
                tracee.policy.allow_fork,
                Rc::clone(&tracee.policy),
                Rc::clone(&tracee.authority),
            )
        };

        if !allow_fork {
            // The kernel has already created and ptrace-stopped the new
            // child by the time this event reaches us, and it inherits the
            // parent's trace options. If it is left untracked it is free to
            // report its own syscall-stop on the next `waitpid(-1)`, which
            // `handle_syscall_stop` would panic on (untracked pid). Fetch
            // its pid from the event message before killing the parent, and
            // kill it too, so no untracked pid survives into the next wait.
            let child_raw = ptrace::getevent(pid)?;
            let child = Pid::from_raw(child_raw as libc::pid_t);
            kill_tracee(pid, "the program is not allowed to fork or clone");
            kill_tracee(child, "parent was denied permission to fork or clone");
            return Ok(());
        }

        let child_raw = ptrace::getevent(pid)?;
        let child = Pid::from_raw(child_raw as libc::pid_t);
        let child_tracee = TraceeProcess::new_from_fork(child, policy, authority);
        child_tracee.install_trace_options()?;
        self.tracees.insert(child, child_tracee);

        Ok(ptrace::cont(pid, None)?)
    }

    /// Category 5 of spec.md §4.E: toggles parity and dispatches on entry
    /// stops only; exit stops are a silent resume.
    fn handle_syscall_stop(&mut self, pid: Pid) -> Result<()> {
        let is_entry = {
            let tracee = self
                .tracees
                .get_mut(&pid)
                .expect("syscall stop for an untracked pid");
            tracee.toggle_parity()
        };

        if !is_entry {
            ptrace::syscall(pid, None)?;
            return Ok(());
        }

        let regs = Registers::fetch(pid)?;
        let decision = {
            let tracee = self
                .tracees
                .get(&pid)
                .expect("syscall stop for an untracked pid");
            dispatch(pid, &regs, &tracee.authority, &tracee.policy)
        };

        match decision {
            Decision::Allow => {
                ptrace::syscall(pid, None)?;
            }
            Decision::Deny(reason) => {
                kill_tracee(pid, &reason);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;

    /// Regression test for the fork-deny path: the kernel creates and
    /// ptrace-stops the new child before `handle_fork_event` ever runs, so
    /// if that child is left untracked when the parent's fork is denied, it
    /// inherits the parent's trace options and its next syscall-stop panics
    /// `handle_syscall_stop`'s "untracked pid" expect. `allow_fork = false`
    /// here must kill the shell (parent) and its already-forked child alike
    /// and let the loop run to completion instead.
    #[test]
    fn fork_denied_kills_child_too_and_does_not_panic() {
        let policy = Rc::new(Policy::new(None, None, false, true, false).unwrap());
        let mut tracer = Tracer::launch(
            policy,
            "sh",
            &["-c".to_string(), "true & wait".to_string()],
        )
        .expect("launch sh");
        tracer.run().expect("run to completion without panicking");
    }

    #[test]
    fn launch_attaches_and_runs_a_trivial_program_to_completion() {
        let policy = Rc::new(Policy::new(None, None, false, true, false).unwrap());
        let mut tracer = Tracer::launch(policy, "true", &[]).expect("launch true(1)");
        let exit_code = tracer.run().expect("run to completion");
        assert_eq!(exit_code, 0);
    }
}
