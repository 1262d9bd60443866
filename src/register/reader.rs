//! Reads a NUL-terminated C string out of a tracee's address space.
//!
//! Grounded on `original_source/src/ptrace_peek.hh` (`PtracePeek::operator[]`,
//! a single `PTRACE_PEEKDATA` call) and the teacher's
//! `register::reader::read_string`, which loops that primitive one machine
//! word at a time and slices out bytes up to the first NUL.

use crate::errors::Result;
use libc::{c_void, PATH_MAX};
use nix::sys::ptrace;
use nix::unistd::Pid;
use std::mem::size_of;

type Word = libc::c_long;

/// Reads a NUL-terminated string from `addr` in `pid`'s address space.
///
/// A null `addr` (as seen for some optional path arguments, e.g.
/// `symlink`'s rarely-used forms) is treated as an empty string rather than
/// a read attempt, per the dispatcher's "zero pointer => empty path" edge
/// case.
///
/// A `PTRACE_PEEKDATA` failure here means either a programming bug (a bad
/// address decoded from the registers) or a tracee that raced us by
/// unmapping the page; both are unrecoverable for the current dispatch, so
/// this aborts the tracer rather than returning an error the dispatcher
/// could misinterpret as "path not in any allow-list, but otherwise fine".
pub fn read_cstring(pid: Pid, addr: u64) -> Result<String> {
    if addr == 0 {
        return Ok(String::new());
    }

    let word_size = size_of::<Word>();
    let mut bytes: Vec<u8> = Vec::with_capacity(PATH_MAX as usize);

    'words: for word_index in 0.. {
        let src = (addr as usize + word_index * word_size) as *mut c_void;
        let word = ptrace::read(pid, src).expect("ptrace PEEKDATA while reading tracee string");
        let word_bytes = word.to_ne_bytes();

        for &byte in word_bytes.iter() {
            if byte == 0 {
                break 'words;
            }
            bytes.push(byte);
            if bytes.len() >= PATH_MAX as usize {
                break 'words;
            }
        }
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
