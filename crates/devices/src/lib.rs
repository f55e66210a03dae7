mod cylinder;
mod feeder;
mod robot;

pub use cylinder::{CylinderBank, CylinderCommand, CylinderError, DigitalOutput, CHANNEL_COUNT};
pub use feeder::{Feeder, FeederError, RegisterBus};
pub use robot::{ConnectPolicy, LinkState, RobotError, RobotLink, RobotTask, TaskKind};
