mod link;
mod protocol;

pub use link::{ConnectPolicy, LinkState, RobotError, RobotLink};
pub use protocol::{RobotTask, TaskKind};
