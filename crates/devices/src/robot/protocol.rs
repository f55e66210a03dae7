//! Robot controller wire protocol.
//!
//! One task per message, text over TCP. The canonical frame is
//! `(task,x,y,angle,plate_seq)\n`; any non-empty reply line means the task
//! was accepted. Tasks 6-8 carry coordinates, the rest send zeros.

use std::fmt;

/// The nine task numbers the controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskKind {
    Home = 0,
    ToolPlateInit = 1,
    AttachGripper = 2,
    DetachGripper = 3,
    AttachSuction = 4,
    DetachSuction = 5,
    BlockPickPlace = 6,
    PartPickPlace = 7,
    WastePickPlace = 8,
}

impl TaskKind {
    #[must_use]
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Whether x/y/angle/plate_seq are meaningful for this task.
    #[must_use]
    pub fn carries_coordinates(self) -> bool {
        matches!(
            self,
            Self::BlockPickPlace | Self::PartPickPlace | Self::WastePickPlace
        )
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Home => "home",
            Self::ToolPlateInit => "tool-plate init",
            Self::AttachGripper => "attach gripper",
            Self::DetachGripper => "detach gripper",
            Self::AttachSuction => "attach suction",
            Self::DetachSuction => "detach suction",
            Self::BlockPickPlace => "block pick-place",
            Self::PartPickPlace => "part pick-place",
            Self::WastePickPlace => "waste pick-place",
        };
        write!(f, "{name}")
    }
}

/// One immutable robot command. Serialized to exactly one wire message; one
/// message yields exactly one response or one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobotTask {
    pub kind: TaskKind,
    pub x: i32,
    pub y: i32,
    pub angle: i32,
    pub plate_seq: u32,
}

impl RobotTask {
    /// A task that carries no coordinates (home, tool changes).
    #[must_use]
    pub fn simple(kind: TaskKind) -> Self {
        Self { kind, x: 0, y: 0, angle: 0, plate_seq: 0 }
    }

    #[must_use]
    pub fn home() -> Self {
        Self::simple(TaskKind::Home)
    }

    #[must_use]
    pub fn tool_plate_init() -> Self {
        Self::simple(TaskKind::ToolPlateInit)
    }

    #[must_use]
    pub fn attach_suction() -> Self {
        Self::simple(TaskKind::AttachSuction)
    }

    #[must_use]
    pub fn detach_suction() -> Self {
        Self::simple(TaskKind::DetachSuction)
    }

    #[must_use]
    pub fn part_pick_place(x: i32, y: i32, angle: i32, plate_seq: u32) -> Self {
        Self { kind: TaskKind::PartPickPlace, x, y, angle, plate_seq }
    }

    /// Render the wire frame. Coordinate fields of non-carrying tasks are
    /// forced to zero regardless of the struct contents.
    #[must_use]
    pub fn encode(&self) -> String {
        if self.kind.carries_coordinates() {
            format!(
                "({},{},{},{},{})\n",
                self.kind.number(),
                self.x,
                self.y,
                self.angle,
                self.plate_seq
            )
        } else {
            format!("({},0,0,0,0)\n", self.kind.number())
        }
    }
}
