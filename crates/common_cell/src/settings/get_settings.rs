use crate::settings::structs::AppSettings;
use std::path::Path;
use std::sync::LazyLock;

/// Load the app settings from YAML + environment variables
pub fn load_app_settings() -> color_eyre::Result<AppSettings> {
    let config_path = Path::new("config/settings.yaml").canonicalize()?;

    let builder = config::Config::builder()
        .add_source(config::File::from(config_path))
        .add_source(
            config::Environment::with_prefix("CELL")
                .separator("__")
                .try_parsing(true),
        );
    Ok(builder.build()?.try_deserialize::<AppSettings>()?)
}

/// Immutable global settings, initialized on first access.
pub static SETTINGS: LazyLock<AppSettings> =
    LazyLock::new(|| load_app_settings().expect("Failed to load app settings"));

#[must_use]
pub fn settings() -> &'static AppSettings {
    &SETTINGS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_settings_deserialize_with_every_section() {
        let yaml = r"
logging:
  level: devices=debug,info
robot:
  host: 192.168.0.10
  port: 64512
  connect_timeout_s: 30
  connect_attempts: 100
  connect_retry_delay_s: 1.0
  task_attempts: 3
  response_timeout_s: 30
camera:
  roi: [684, 421, 1256, 978]
  capture_timeout_s: 5
feeder:
  host: 192.168.1.100
  port: 502
  light_brightness_pct: 10
  bounce_s: 0.5
  consolidate_s: 3.0
  resettle_s: 1.0
cylinder:
  pulse_on_s: 1.0
  pulse_off_s: 1.0
paths:
  coordination_file: config/coordination.json
  calibration_file: config/calibration.json
";
        let settings: AppSettings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.logging.level, "devices=debug,info");
        assert_eq!(settings.robot.task_attempts, 3);
        assert_eq!(settings.camera.roi, [684, 421, 1256, 978]);
        assert_eq!(settings.feeder.light_brightness_pct, 10);
    }
}
