mod reader;
mod regs;

pub use self::reader::read_cstring;
pub use self::regs::{Registers, SysArg};
