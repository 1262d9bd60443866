//! Command-line entry point: `sandbox [CONFIG] -- PROGRAM [ARG...]`.
//!
//! Grounded on the teacher's `src/cli.rs`, which builds a `clap::App` for
//! `--help`/usage text and validates individual tokens with `validator`
//! closures while leaving the bulk of argument handling to hand-written
//! code. The grammar here has a position-dependent optional token ahead of
//! a passthrough `--` separator, which clap's declarative parser does not
//! model directly, so clap is kept for `--help`/version output only and
//! the actual split is done against `std::env::args()`.

use crate::errors::{Error, Result};
use clap::{App, Arg};
use nix::errno::Errno;

/// The parsed command line: an optional path to a configuration file, the
/// program to launch, and that program's own arguments.
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedArgs {
    pub config_path: Option<String>,
    pub program: String,
    pub program_args: Vec<String>,
}

/// Builds the `clap::App` used solely to render `--help`/usage text; the
/// actual token stream is never handed to it for matching, since clap 2.x
/// has no way to express "one optional positional, then a literal `--`,
/// then a passthrough tail".
fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("sandbox")
        .about("Runs PROGRAM under a ptrace-based syscall policy sandbox.")
        .usage("sandbox [CONFIG] -- PROGRAM [ARG...]")
        .arg(
            Arg::with_name("config")
                .help("Path to a policy configuration file.")
                .index(1),
        )
        .arg(
            Arg::with_name("program")
                .help("The program to run under the sandbox, and its arguments.")
                .last(true)
                .multiple(true),
        )
}

/// Parses `argv` (excluding the program name) per spec.md §6: if the token
/// right after the program name is `--`, no configuration file was given;
/// otherwise the first token names one and `--` must follow it.
pub fn parse_args(argv: &[String]) -> Result<ParsedArgs> {
    if argv.iter().any(|a| a == "--help" || a == "-h") {
        let mut help_app = app();
        help_app.print_help().ok();
        println!();
        return Err(Error::errno_with_msg(Errno::EINVAL, "help requested"));
    }

    let separator = argv.iter().position(|a| a == "--").ok_or_else(|| {
        Error::errno_with_msg(
            Errno::EINVAL,
            "usage: sandbox [CONFIG] -- PROGRAM [ARG...]",
        )
    })?;

    let config_path = match separator {
        0 => None,
        1 => Some(argv[0].clone()),
        _ => {
            return Err(Error::errno_with_msg(
                Errno::EINVAL,
                "usage: sandbox [CONFIG] -- PROGRAM [ARG...]",
            ))
        }
    };

    let tail = &argv[separator + 1..];
    let (program, program_args) = tail.split_first().ok_or_else(|| {
        Error::errno_with_msg(Errno::EINVAL, "no program given after `--`")
    })?;

    Ok(ParsedArgs {
        config_path,
        program: program.clone(),
        program_args: program_args.to_vec(),
    })
}
