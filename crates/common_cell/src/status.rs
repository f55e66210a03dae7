use serde::Serialize;
use std::fmt;

/// Explicit per-device connection state, replacing ad hoc `connected` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Offline,
    Online,
}

impl ConnectionState {
    #[must_use]
    pub fn from_online(online: bool) -> Self {
        if online { Self::Online } else { Self::Offline }
    }

    #[must_use]
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => write!(f, "offline"),
            Self::Online => write!(f, "online"),
        }
    }
}

/// Aggregated snapshot of every device the cell talks to.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SystemStatus {
    pub camera: ConnectionState,
    pub robot: ConnectionState,
    pub feeder: ConnectionState,
    pub cylinder: ConnectionState,
}

impl SystemStatus {
    /// True when every subsystem needed for a pick-and-place job is up.
    #[must_use]
    pub fn fully_operational(&self) -> bool {
        self.camera.is_online()
            && self.robot.is_online()
            && self.feeder.is_online()
            && self.cylinder.is_online()
    }
}
