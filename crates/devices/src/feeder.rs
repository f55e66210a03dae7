//! Feeder gateway: work light and agitation motions driven through holding
//! registers. The register transport itself (Modbus TCP in production) is
//! behind [`RegisterBus`]; this module only owns the register map and the
//! motion timing contract.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

/// Start/stop switch for the selected motion.
pub const REG_SWITCH: u16 = 0;
/// Motion program selector.
pub const REG_MOTION: u16 = 1;
/// Work light on/off.
pub const REG_LIGHT_SWITCH: u16 = 10;
/// Work light brightness, 0-1000.
pub const REG_LIGHT_BRIGHTNESS: u16 = 11;

/// Short scatter motion that un-stacks piled parts.
pub const MOTION_BOUNCE: u16 = 10113;
/// Longer motion that gathers parts back to the center.
pub const MOTION_CONSOLIDATE: u16 = 10114;

#[derive(Debug, Error)]
pub enum FeederError {
    #[error("Register write failed: {0}")]
    Bus(String),
}

/// Transport boundary for the feeder's register protocol; implemented by the
/// embedder's Modbus client, faked in tests.
#[async_trait]
pub trait RegisterBus: Send {
    async fn write_register(&mut self, addr: u16, value: u16) -> Result<(), FeederError>;
}

#[async_trait]
impl RegisterBus for Box<dyn RegisterBus> {
    async fn write_register(&mut self, addr: u16, value: u16) -> Result<(), FeederError> {
        (**self).write_register(addr, value).await
    }
}

pub struct Feeder<B: RegisterBus> {
    bus: B,
}

impl<B: RegisterBus> Feeder<B> {
    #[must_use]
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Switch the work light. Brightness is percent (0-100), scaled to the
    /// 0-1000 register range; only written when turning on.
    ///
    /// # Errors
    ///
    /// Propagates the first failed register write.
    pub async fn set_light(&mut self, on: bool, brightness_pct: u16) -> Result<(), FeederError> {
        self.bus
            .write_register(REG_LIGHT_SWITCH, u16::from(on))
            .await?;
        if on {
            let value = brightness_pct.min(100) * 10;
            self.bus.write_register(REG_LIGHT_BRIGHTNESS, value).await?;
        }
        Ok(())
    }

    /// Run one motion program: select, start, hold for the given duration,
    /// stop.
    ///
    /// # Errors
    ///
    /// Propagates the first failed register write; the stop write is still
    /// attempted after a hold.
    pub async fn run_motion(&mut self, code: u16, hold: Duration) -> Result<(), FeederError> {
        self.bus.write_register(REG_MOTION, code).await?;
        self.bus.write_register(REG_SWITCH, 1).await?;
        sleep(hold).await;
        self.bus.write_register(REG_SWITCH, 0).await?;
        Ok(())
    }

    /// The recovery sequence: a short bounce to break up piles, then a
    /// consolidate pass to bring parts back under the camera.
    ///
    /// # Errors
    ///
    /// Propagates the first failed register write.
    pub async fn agitate(&mut self, bounce: Duration, consolidate: Duration) -> Result<(), FeederError> {
        info!("Feeder agitation: bounce {bounce:?}, consolidate {consolidate:?}");
        self.run_motion(MOTION_BOUNCE, bounce).await?;
        self.run_motion(MOTION_CONSOLIDATE, consolidate).await?;
        Ok(())
    }
}
