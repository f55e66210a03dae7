use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppSettings {
    pub logging: LoggingSettings,
    pub robot: RobotSettings,
    pub camera: CameraSettings,
    pub feeder: FeederSettings,
    pub cylinder: CylinderSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct RobotSettings {
    pub host: String,
    pub port: u16,
    pub connect_timeout_s: u64,
    /// 1 = fail fast, >1 = bounded retry loop with `connect_retry_delay_s`
    /// between attempts.
    pub connect_attempts: u32,
    pub connect_retry_delay_s: f64,
    /// Per-task send budget; the link reconnects before every retry after
    /// the first attempt.
    pub task_attempts: u32,
    pub response_timeout_s: u64,
}

#[derive(Debug, Deserialize)]
pub struct CameraSettings {
    /// Inference crop as `[x, y, width, height]` in full-frame pixels.
    pub roi: [u32; 4],
    pub capture_timeout_s: u64,
}

#[derive(Debug, Deserialize)]
pub struct FeederSettings {
    pub host: String,
    pub port: u16,
    /// Work-light brightness in percent (0-100).
    pub light_brightness_pct: u16,
    pub bounce_s: f64,
    pub consolidate_s: f64,
    /// Settle time after agitation before re-querying detections.
    pub resettle_s: f64,
}

#[derive(Debug, Deserialize)]
pub struct CylinderSettings {
    pub pulse_on_s: f64,
    pub pulse_off_s: f64,
}

#[derive(Debug, Deserialize)]
pub struct PathSettings {
    pub coordination_file: String,
    pub calibration_file: String,
}
