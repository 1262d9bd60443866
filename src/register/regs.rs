//! Cached snapshot of a tracee's general-purpose registers, and the x86-64
//! System V syscall ABI's mapping from argument position to register.
//!
//! Grounded on the teacher's `register::regs`/`register::abi` modules, which
//! use a `get_reg!` macro over `libc::user_regs_struct` fields; here the
//! mapping is a plain `match` over an argument-index enum instead, since we
//! only need the six syscall argument registers (no stack pointer / rip /
//! eflags bookkeeping, which the teacher needs for its execve loader and
//! this sandbox does not).

use crate::errors::Result;
use libc::user_regs_struct;
use nix::sys::ptrace;
use nix::unistd::Pid;

/// Index of one of the six syscall arguments, in the x86-64 System V calling
/// convention used for syscalls: `RDI, RSI, RDX, R10, R8, R9`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SysArg {
    Arg1,
    Arg2,
    Arg3,
    Arg4,
    Arg5,
    Arg6,
}

#[derive(Debug, Copy, Clone)]
pub struct Registers {
    raw: user_regs_struct,
}

impl Registers {
    /// Reads the tracee's current registers via `PTRACE_GETREGS`. Must only
    /// be called while `pid` is known-stopped (see the tracer's suspension
    /// points).
    pub fn fetch(pid: Pid) -> Result<Registers> {
        let raw = ptrace::getregs(pid)?;
        Ok(Registers { raw })
    }

    /// The syscall number, preserved in `orig_rax` across syscall entry.
    pub fn sys_num(&self) -> u64 {
        self.raw.orig_rax
    }

    pub fn arg(&self, index: SysArg) -> u64 {
        match index {
            SysArg::Arg1 => self.raw.rdi,
            SysArg::Arg2 => self.raw.rsi,
            SysArg::Arg3 => self.raw.rdx,
            SysArg::Arg4 => self.raw.r10,
            SysArg::Arg5 => self.raw.r8,
            SysArg::Arg6 => self.raw.r9,
        }
    }
}
