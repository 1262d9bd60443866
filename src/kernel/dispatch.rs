//! The per-syscall policy table: resolves path arguments through
//! `TraceeMemory`, judges them through `PathAuthority`, and returns a
//! decision for the tracer loop to act on.
//!
//! Grounded on the teacher's `kernel::exit`/`kernel::enter` dispatch (a
//! `match` on `SyscallGroup` calling a handler per group) and, for the rule
//! table itself, `original_source/src/ptrace_syscall.cc`'s `ReadHandler`/
//! `WriteHandler`/`ForkHandler` family. Unlike the teacher, there is no
//! translation step here (no bind-mount path rewriting): a handler either
//! allows the syscall to proceed unmodified or kills the tracee.
use crate::kernel::groups::{syscall_group_from_sysnum, SyscallGroup};
use crate::path_authority::PathAuthority;
use crate::policy::{AccessMode, Policy};
use crate::register::{read_cstring, Registers, SysArg};
use libc::{O_RDWR, O_WRONLY};
use log::debug;
use nix::unistd::Pid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

/// Evaluates the syscall currently at entry in `regs` against `policy`
/// (via `authority`). `pid` is the tracee whose address space path
/// arguments are read from; it must be stopped.
pub fn dispatch(pid: Pid, regs: &Registers, authority: &PathAuthority, policy: &Policy) -> Decision {
    let sysnum = regs.sys_num();
    match syscall_group_from_sysnum(sysnum) {
        SyscallGroup::Open => dispatch_open(pid, regs, authority),
        SyscallGroup::OpenAt => Decision::Deny(
            "openat is not allowed; use open with an absolute path instead".to_string(),
        ),
        SyscallGroup::ReadPath => require_one(pid, regs, SysArg::Arg1, authority, AccessMode::Read),
        SyscallGroup::WritePath => {
            require_one(pid, regs, SysArg::Arg1, authority, AccessMode::ReadWrite)
        }
        SyscallGroup::RenameOrLink => require_both(
            pid,
            regs,
            SysArg::Arg1,
            SysArg::Arg2,
            authority,
            AccessMode::ReadWrite,
            AccessMode::ReadWrite,
        ),
        SyscallGroup::SymLink => require_both(
            pid,
            regs,
            SysArg::Arg1,
            SysArg::Arg2,
            authority,
            AccessMode::Read,
            AccessMode::ReadWrite,
        ),
        SyscallGroup::Chdir => require_one(pid, regs, SysArg::Arg1, authority, AccessMode::Read),
        SyscallGroup::GetCwd => {
            if authority.is_allowed(".", AccessMode::Read) {
                Decision::Allow
            } else {
                Decision::Deny("the current directory is not granted read permission".to_string())
            }
        }
        SyscallGroup::Socket => {
            if policy.allow_socket {
                Decision::Allow
            } else {
                Decision::Deny("the program is not allowed to perform socket operations".to_string())
            }
        }
        SyscallGroup::DeniedSignal => {
            Decision::Deny("the program is not allowed to send signals".to_string())
        }
        SyscallGroup::ProcessControl => {
            // clone/fork/vfork/execve are decided by the ptrace-event path
            // in the tracer loop; seeing them here as ordinary syscall-stops
            // is only ever informational.
            debug!("pid {}: syscall {} handled by the event path", pid, sysnum);
            Decision::Allow
        }
        SyscallGroup::Other => Decision::Allow,
    }
}

fn dispatch_open(pid: Pid, regs: &Registers, authority: &PathAuthority) -> Decision {
    let flags = regs.arg(SysArg::Arg2) as i32;
    let wants_write = flags & (O_WRONLY | O_RDWR) != 0;
    let mode = if wants_write {
        AccessMode::ReadWrite
    } else {
        AccessMode::Read
    };
    require_one(pid, regs, SysArg::Arg1, authority, mode)
}

fn require_one(
    pid: Pid,
    regs: &Registers,
    arg: SysArg,
    authority: &PathAuthority,
    mode: AccessMode,
) -> Decision {
    let path = resolve_path(pid, regs, arg);
    if authority.is_allowed(&path, mode) {
        Decision::Allow
    } else {
        Decision::Deny(deny_reason(mode))
    }
}

fn require_both(
    pid: Pid,
    regs: &Registers,
    first: SysArg,
    second: SysArg,
    authority: &PathAuthority,
    first_mode: AccessMode,
    second_mode: AccessMode,
) -> Decision {
    let first_path = resolve_path(pid, regs, first);
    if !authority.is_allowed(&first_path, first_mode) {
        return Decision::Deny(deny_reason(first_mode));
    }
    let second_path = resolve_path(pid, regs, second);
    if !authority.is_allowed(&second_path, second_mode) {
        return Decision::Deny(deny_reason(second_mode));
    }
    Decision::Allow
}

/// A zero tracee pointer resolves to the empty string (never crashes);
/// an empty path fails every allow-list check by construction.
fn resolve_path(pid: Pid, regs: &Registers, arg: SysArg) -> String {
    let addr = regs.arg(arg);
    read_cstring(pid, addr).unwrap_or_default()
}

fn deny_reason(mode: AccessMode) -> String {
    match mode {
        AccessMode::Read => "the file is not granted read permission".to_string(),
        AccessMode::ReadWrite => "the file is not granted read-write permission".to_string(),
    }
}

// These tests drive a real traced child through `utils::tests::fork_test`
// (the same harness `register/regs.rs` uses) and call `dispatch()` itself
// against the registers of a real syscall-entry stop, rather than only
// exercising `PathAuthority` or hand-duplicating the dispatcher's match.
// Each child issues its syscall directly via `libc::syscall` with an
// explicit syscall number, so the exact syscall under test is guaranteed
// regardless of which wrapper the C library would otherwise have chosen.
// `func_parent` skips any stop that isn't the syscall under test (e.g. an
// incidental `mmap`/`brk` from allocating the `CString` path arguments)
// and only asserts once the expected syscall number is observed.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::tests::fork_test;
    use std::ffi::CString;
    use std::path::PathBuf;

    fn authority(read: Option<&str>, readwrite: Option<&str>) -> PathAuthority {
        let mut policy = Policy::deny_all();
        policy.read_root = read.map(PathBuf::from);
        policy.readwrite_root = readwrite.map(PathBuf::from);
        PathAuthority::new(&policy, PathBuf::from("/home/sandboxed"))
    }

    /// D2 (the allow half): an already-resolved path under the read root,
    /// checked directly through the authority and the same reason-building
    /// path `dispatch_open` would take for O_RDONLY.
    #[test]
    fn d2_open_read_only_under_read_root_is_allowed() {
        let authority = authority(Some("/tmp"), None);
        assert!(authority.is_allowed("/tmp/a", AccessMode::Read));
    }

    /// D2 (the deny half), exercised against the real `dispatch_open`
    /// write-intent branch: a real child opens a path under a read-only
    /// root with `O_WRONLY`, and `dispatch()` must deny it.
    #[test]
    fn d2_dispatch_denies_write_open_under_read_only_root() {
        let mut policy = Policy::deny_all();
        policy.read_root = Some(PathBuf::from("/tmp"));
        let authority = PathAuthority::new(&policy, PathBuf::from("/"));

        fork_test(
            0,
            |pid, regs, _first| {
                if regs.sys_num() != libc::SYS_open as u64 {
                    return false;
                }
                let decision = dispatch(pid, regs, &authority, &policy);
                assert!(matches!(decision, Decision::Deny(_)));
                true
            },
            || {
                let path = CString::new("/tmp/sandbox-dispatch-test-open-write").unwrap();
                unsafe {
                    libc::syscall(libc::SYS_open, path.as_ptr(), libc::O_WRONLY, 0o600);
                }
            },
        );
    }

    /// The blanket `openat` deny, exercised against the real dispatcher
    /// rather than a hand-reimplemented match on `syscall_group_from_sysnum`.
    #[test]
    fn dispatch_denies_openat_unconditionally() {
        let policy = Policy::deny_all();
        let authority = PathAuthority::new(&policy, PathBuf::from("/"));

        fork_test(
            0,
            |pid, regs, _first| {
                if regs.sys_num() != libc::SYS_openat as u64 {
                    return false;
                }
                let decision = dispatch(pid, regs, &authority, &policy);
                assert!(matches!(decision, Decision::Deny(_)));
                true
            },
            || {
                let path = CString::new("/tmp").unwrap();
                unsafe {
                    libc::syscall(libc::SYS_openat, libc::AT_FDCWD, path.as_ptr(), libc::O_RDONLY);
                }
            },
        );
    }

    /// The socket capability gate, exercised against a real `socket(2)`
    /// syscall-entry stop.
    #[test]
    fn dispatch_denies_socket_without_capability() {
        let mut policy = Policy::deny_all();
        policy.allow_socket = false;
        let authority = PathAuthority::new(&policy, PathBuf::from("/"));

        fork_test(
            0,
            |pid, regs, _first| {
                if regs.sys_num() != libc::SYS_socket as u64 {
                    return false;
                }
                match dispatch(pid, regs, &authority, &policy) {
                    Decision::Deny(reason) => assert!(reason.contains("socket")),
                    Decision::Allow => panic!("socket must be denied when allow_socket is false"),
                }
                true
            },
            || unsafe {
                libc::syscall(libc::SYS_socket, libc::AF_INET, libc::SOCK_STREAM, 0);
            },
        );
    }

    /// RenameOrLink's two-path check: the source is under the readwrite
    /// root but the destination is not, so the second `is_allowed` call
    /// inside `require_both` must be the one that fails.
    #[test]
    fn dispatch_denies_rename_when_destination_outside_readwrite_root() {
        let mut policy = Policy::deny_all();
        policy.readwrite_root = Some(PathBuf::from("/tmp"));
        let authority = PathAuthority::new(&policy, PathBuf::from("/"));

        fork_test(
            0,
            |pid, regs, _first| {
                if regs.sys_num() != libc::SYS_rename as u64 {
                    return false;
                }
                let decision = dispatch(pid, regs, &authority, &policy);
                assert!(matches!(decision, Decision::Deny(_)));
                true
            },
            || {
                let src = CString::new("/tmp/sandbox-dispatch-test-rename-src").unwrap();
                let dst = CString::new("/etc/sandbox-dispatch-test-rename-dst").unwrap();
                unsafe {
                    libc::syscall(libc::SYS_rename, src.as_ptr(), dst.as_ptr());
                }
            },
        );
    }

    /// SymLink's two-path check, on the allow side: target satisfies Read
    /// and linkpath satisfies ReadWrite, both via the same readwrite root
    /// (ReadWrite also satisfies Read per PA3), so `require_both` must
    /// return `Allow` only after both checks pass.
    #[test]
    fn dispatch_allows_symlink_when_target_read_and_linkpath_readwrite() {
        let mut policy = Policy::deny_all();
        policy.readwrite_root = Some(PathBuf::from("/tmp"));
        let authority = PathAuthority::new(&policy, PathBuf::from("/"));
        let linkpath = "/tmp/sandbox-dispatch-test-symlink-link";

        fork_test(
            0,
            |pid, regs, _first| {
                if regs.sys_num() != libc::SYS_symlink as u64 {
                    return false;
                }
                let decision = dispatch(pid, regs, &authority, &policy);
                assert_eq!(decision, Decision::Allow);
                true
            },
            || {
                let target = CString::new("/tmp/sandbox-dispatch-test-symlink-target").unwrap();
                let linkpath = CString::new(linkpath).unwrap();
                unsafe {
                    libc::syscall(libc::SYS_symlink, target.as_ptr(), linkpath.as_ptr());
                }
            },
        );

        let _ = std::fs::remove_file(linkpath);
    }
}
