mod cli;
mod config;
mod errors;
mod kernel;
mod path_authority;
mod policy;
mod process;
mod register;
mod termination;

use crate::errors::Result;
use crate::policy::Policy;
use crate::process::Tracer;
use log::error;
use std::process::exit;
use std::rc::Rc;

fn main() {
    env_logger::init();

    match run() {
        Ok(exit_code) => exit(exit_code),
        Err(error) => {
            error!("{}", error);
            exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let parsed = cli::parse_args(&argv)?;

    let policy = match parsed.config_path {
        Some(path) => config::load(&path)?,
        None => Policy::deny_all(),
    };

    let mut tracer = Tracer::launch(Rc::new(policy), &parsed.program, &parsed.program_args)?;
    tracer.run()
}
