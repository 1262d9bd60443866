mod dispatch;
mod groups;

pub use dispatch::{dispatch, Decision};
pub use groups::SyscallGroup;
