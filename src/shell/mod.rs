mod command;
mod session;

pub use command::Command;
pub use session::{Reply, Session};
