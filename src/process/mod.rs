mod tracee;
mod proot;

pub use self::proot::Tracer;
pub use self::tracee::TraceeProcess;
