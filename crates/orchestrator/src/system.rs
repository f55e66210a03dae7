use common_cell::{CellError, ConnectionState, SystemStatus};
use devices::{CylinderBank, DigitalOutput, Feeder, RegisterBus, RobotLink, RobotTask};
use tracing::{info, warn};
use vision::{BlockClass, Roi, VisionService};

pub type BoxedFeeder = Feeder<Box<dyn RegisterBus>>;
pub type BoxedCylinders = CylinderBank<Box<dyn DigitalOutput>>;

/// Every device the cell talks to, assembled once at startup. Gateways that
/// are not wired in (or fail to come up) leave the system in degraded mode
/// rather than aborting the process.
pub struct CellSystem {
    pub robot: RobotLink,
    vision: Option<VisionService>,
    feeder: Option<BoxedFeeder>,
    cylinders: Option<BoxedCylinders>,
}

impl CellSystem {
    #[must_use]
    pub fn new(robot: RobotLink) -> Self {
        Self { robot, vision: None, feeder: None, cylinders: None }
    }

    #[must_use]
    pub fn with_vision(mut self, vision: VisionService) -> Self {
        self.vision = Some(vision);
        self
    }

    #[must_use]
    pub fn with_feeder(mut self, feeder: BoxedFeeder) -> Self {
        self.feeder = Some(feeder);
        self
    }

    #[must_use]
    pub fn with_cylinders(mut self, cylinders: BoxedCylinders) -> Self {
        self.cylinders = Some(cylinders);
        self
    }

    /// Bring every wired device up: camera loop, feeder light, cylinders
    /// retracted, robot homed with its tool plate initialized. Every failure
    /// is logged and leaves that device offline; startup always completes.
    pub async fn initialize(&mut self, light_brightness_pct: u16) {
        info!("System initialization started");

        match &mut self.vision {
            Some(vision) => {
                vision.start();
                info!("Camera capture started");
            }
            None => warn!("Starting without camera: {}", CellError::DeviceUnavailable { device: "camera" }),
        }

        match &mut self.feeder {
            Some(feeder) => match feeder.set_light(true, light_brightness_pct).await {
                Ok(()) => info!("Feeder light on ({light_brightness_pct}%)"),
                Err(e) => warn!("Feeder light control failed: {e}"),
            },
            None => warn!("Starting without feeder: {}", CellError::DeviceUnavailable { device: "feeder" }),
        }

        match &mut self.cylinders {
            Some(bank) => match bank.all_off().await {
                Ok(()) => info!("Cylinders initialized (all off)"),
                Err(e) => warn!("Cylinder initialization failed: {e}"),
            },
            None => warn!("Starting without cylinders: {}", CellError::DeviceUnavailable { device: "cylinder" }),
        }

        match self.robot.connect().await {
            Ok(()) => {
                for task in [RobotTask::home(), RobotTask::tool_plate_init()] {
                    if let Err(e) = self.robot.send_task(&task).await {
                        warn!("Startup {} task failed: {e}", task.kind);
                        break;
                    }
                }
            }
            Err(e) => warn!("Starting without robot: {e}"),
        }

        info!("System initialization complete");
    }

    /// Best-effort teardown: light off, cylinders retracted, capture loop
    /// joined, robot session closed.
    pub async fn shutdown(&mut self) {
        info!("System shutdown started");

        if let Some(feeder) = &mut self.feeder {
            if let Err(e) = feeder.set_light(false, 0).await {
                warn!("Feeder light off failed: {e}");
            }
        }
        if let Some(bank) = &mut self.cylinders {
            if let Err(e) = bank.all_off().await {
                warn!("Cylinder shutdown failed: {e}");
            }
        }
        if let Some(vision) = &mut self.vision {
            vision.stop();
        }
        self.robot.disconnect();

        info!("System shutdown complete");
    }

    #[must_use]
    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            camera: ConnectionState::from_online(self.vision.is_some()),
            robot: ConnectionState::from_online(self.robot.is_connected()),
            feeder: ConnectionState::from_online(self.feeder.is_some()),
            cylinder: ConnectionState::from_online(self.cylinders.is_some()),
        }
    }

    /// ROI-local centroids of currently visible pickable parts; empty when
    /// the camera is offline or nothing has been published yet.
    #[must_use]
    pub fn front_centroids(&self) -> Vec<(f32, f32)> {
        self.vision
            .as_ref()
            .map(|v| v.detections(BlockClass::Front))
            .unwrap_or_default()
    }

    /// Current inference crop; its origin converts ROI-local centroids to
    /// full-frame pixels.
    #[must_use]
    pub fn roi(&self) -> Roi {
        self.vision.as_ref().map_or(Roi::new(0, 0, 0, 0), VisionService::roi)
    }

    pub fn vision(&self) -> Option<&VisionService> {
        self.vision.as_ref()
    }

    /// # Errors
    ///
    /// [`CellError::DeviceUnavailable`] when no feeder gateway is wired in.
    pub fn feeder_mut(&mut self) -> Result<&mut BoxedFeeder, CellError> {
        self.feeder
            .as_mut()
            .ok_or(CellError::DeviceUnavailable { device: "feeder" })
    }

    /// # Errors
    ///
    /// [`CellError::DeviceUnavailable`] when no cylinder gateway is wired in.
    pub fn cylinders_mut(&mut self) -> Result<&mut BoxedCylinders, CellError> {
        self.cylinders
            .as_mut()
            .ok_or(CellError::DeviceUnavailable { device: "cylinder" })
    }
}
