//! Pneumatic cylinder bank behind a digital I/O card. The card driver is an
//! external SDK; only the channel on/off primitive crosses the boundary.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

/// Channels wired on the I/O card.
pub const CHANNEL_COUNT: u8 = 4;

#[derive(Debug, Error)]
pub enum CylinderError {
    #[error("Invalid cylinder channel {0}")]
    InvalidChannel(u8),

    #[error("Digital output failed: {0}")]
    Output(String),
}

/// Boundary to the digital I/O card driver.
#[async_trait]
pub trait DigitalOutput: Send {
    async fn set_channel(&mut self, channel: u8, on: bool) -> Result<(), CylinderError>;
}

#[async_trait]
impl DigitalOutput for Box<dyn DigitalOutput> {
    async fn set_channel(&mut self, channel: u8, on: bool) -> Result<(), CylinderError> {
        (**self).set_channel(channel, on).await
    }
}

/// A closed command set per cylinder, matched exhaustively. Replaces
/// string-routed `"on"/"off"/"pulse"` dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CylinderCommand {
    On,
    Off,
    /// Extend, hold `on`, retract, then settle for `off`.
    Pulse { on: Duration, off: Duration },
}

pub struct CylinderBank<D: DigitalOutput> {
    io: D,
}

impl<D: DigitalOutput> CylinderBank<D> {
    #[must_use]
    pub fn new(io: D) -> Self {
        Self { io }
    }

    /// Execute one command on one channel.
    ///
    /// # Errors
    ///
    /// Rejects channels outside the bank; propagates driver failures.
    pub async fn execute(&mut self, channel: u8, command: CylinderCommand) -> Result<(), CylinderError> {
        if channel >= CHANNEL_COUNT {
            return Err(CylinderError::InvalidChannel(channel));
        }
        match command {
            CylinderCommand::On => self.io.set_channel(channel, true).await,
            CylinderCommand::Off => self.io.set_channel(channel, false).await,
            CylinderCommand::Pulse { on, off } => {
                info!("Cylinder {channel} pulse (on {on:?}, settle {off:?})");
                self.io.set_channel(channel, true).await?;
                sleep(on).await;
                self.io.set_channel(channel, false).await?;
                sleep(off).await;
                Ok(())
            }
        }
    }

    /// Retract every cylinder; used at startup and shutdown.
    ///
    /// # Errors
    ///
    /// Stops at the first failing channel.
    pub async fn all_off(&mut self) -> Result<(), CylinderError> {
        for channel in 0..CHANNEL_COUNT {
            self.io.set_channel(channel, false).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingIo {
        states: Vec<(u8, bool)>,
    }

    #[async_trait]
    impl DigitalOutput for RecordingIo {
        async fn set_channel(&mut self, channel: u8, on: bool) -> Result<(), CylinderError> {
            self.states.push((channel, on));
            Ok(())
        }
    }

    #[tokio::test]
    async fn pulse_extends_then_retracts() {
        let mut bank = CylinderBank::new(RecordingIo::default());
        bank.execute(1, CylinderCommand::Pulse { on: Duration::ZERO, off: Duration::ZERO })
            .await
            .unwrap();
        assert_eq!(bank.io.states, vec![(1, true), (1, false)]);
    }

    #[tokio::test]
    async fn out_of_range_channel_is_rejected() {
        let mut bank = CylinderBank::new(RecordingIo::default());
        let err = bank.execute(CHANNEL_COUNT, CylinderCommand::On).await.unwrap_err();
        assert!(matches!(err, CylinderError::InvalidChannel(4)));
        assert!(bank.io.states.is_empty());
    }

    #[tokio::test]
    async fn all_off_touches_every_channel() {
        let mut bank = CylinderBank::new(RecordingIo::default());
        bank.all_off().await.unwrap();
        assert_eq!(
            bank.io.states,
            vec![(0, false), (1, false), (2, false), (3, false)]
        );
    }
}
