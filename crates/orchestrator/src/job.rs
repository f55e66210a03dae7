//! The pick-and-place job state machine.
//!
//! A job walks AttachingTool → LoadingWorkItems → Sequencing → Finalizing.
//! Sequencing pairs visible centroids with pending plate sequences strictly
//! positionally; an empty detection queue triggers one feeder recovery per
//! occurrence. Finalizing always runs so the robot never ends a job holding
//! a part or parked away from home.

use crate::system::CellSystem;
use common_cell::{AppSettings, CellError, CoordinationTable};
use devices::{CylinderCommand, RobotTask};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use vision::AffineTransform;

/// Cylinder that ejects the finished plate carrier during finalization.
const EJECT_CYLINDER: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Completed,
    Error,
}

/// Structured outcome of one job. Always produced; device failures degrade
/// to logged, recorded outcomes instead of crashing the process.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub shape: String,
    pub status: JobStatus,
    pub reason: Option<String>,
    pub total_plates: usize,
    pub completed: usize,
    pub skipped: usize,
}

impl JobReport {
    fn failed(shape: &str, reason: String) -> Self {
        Self {
            shape: shape.to_string(),
            status: JobStatus::Error,
            reason: Some(reason),
            total_plates: 0,
            completed: 0,
            skipped: 0,
        }
    }
}

/// Fixed-duration waits the job performs, resolved from settings once.
#[derive(Debug, Clone, Copy)]
pub struct JobTimings {
    pub bounce: Duration,
    pub consolidate: Duration,
    pub resettle: Duration,
    pub pulse_on: Duration,
    pub pulse_off: Duration,
}

impl JobTimings {
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            bounce: Duration::from_secs_f64(settings.feeder.bounce_s),
            consolidate: Duration::from_secs_f64(settings.feeder.consolidate_s),
            resettle: Duration::from_secs_f64(settings.feeder.resettle_s),
            pulse_on: Duration::from_secs_f64(settings.cylinder.pulse_on_s),
            pulse_off: Duration::from_secs_f64(settings.cylinder.pulse_off_s),
        }
    }
}

/// Run one drawing job for `shape`, consuming plate sequences front-to-back.
pub async fn execute_job(
    system: &mut CellSystem,
    table: &CoordinationTable,
    transform: &AffineTransform,
    shape: &str,
    timings: &JobTimings,
) -> JobReport {
    info!("Job started: {shape}");

    // AttachingTool. A failure here aborts before any other side effect;
    // there is nothing to finalize yet.
    if let Err(e) = system.robot.send_task(&RobotTask::attach_suction()).await {
        let reason = CellError::ToolAttachFailed(e.to_string());
        warn!("{reason}");
        return JobReport::failed(shape, reason.to_string());
    }

    // LoadingWorkItems. A missing shape aborts before any pick or feeder
    // motion.
    let plates = match table.plates_for(shape) {
        Ok(plates) => plates,
        Err(e) => {
            warn!("{e}");
            return JobReport::failed(shape, e.to_string());
        }
    };
    let total_plates = plates.len();
    info!("Loaded {total_plates} plate(s) for '{shape}'");

    // Sequencing.
    let mut queue: VecDeque<(f32, f32)> = system.front_centroids().into();
    let mut completed = 0;
    let mut skipped = 0;
    let mut abort_reason = None;

    for (index, &plate_seq) in plates.iter().enumerate() {
        if queue.is_empty() {
            recover(system, timings).await;
            queue = system.front_centroids().into();
            if queue.is_empty() {
                let remaining = total_plates - index;
                warn!("Still no pickable parts after recovery, abandoning {remaining} plate(s)");
                skipped += remaining;
                abort_reason = Some("no pickable parts after recovery".to_string());
                break;
            }
        }
        let Some((roi_x, roi_y)) = queue.pop_front() else {
            break;
        };

        // ROI-local → full-frame pixels → robot millimeters, truncated to
        // integers for the wire.
        let roi = system.roi();
        let camera_x = f64::from(roi.x) + f64::from(roi_x);
        let camera_y = f64::from(roi.y) + f64::from(roi_y);
        let (robot_x, robot_y) = transform.apply(camera_x, camera_y);

        info!(
            "[{}/{total_plates}] Plate #{plate_seq}: camera ({camera_x:.1}, {camera_y:.1}) → robot ({robot_x:.3}, {robot_y:.3})",
            index + 1
        );
        let task = RobotTask::part_pick_place(robot_x as i32, robot_y as i32, 0, plate_seq);
        match system.robot.send_task(&task).await {
            Ok(_) => completed += 1,
            Err(e) => {
                // One bad pick never aborts the job; the plate is skipped,
                // not requeued.
                warn!("Plate #{plate_seq} failed, skipping: {e}");
                skipped += 1;
            }
        }
    }

    finalize(system, timings).await;

    let status = if abort_reason.is_some() { JobStatus::Error } else { JobStatus::Completed };
    info!(
        "Job finished: {shape} ({completed}/{total_plates} placed, {skipped} skipped)"
    );
    JobReport {
        shape: shape.to_string(),
        status,
        reason: abort_reason,
        total_plates,
        completed,
        skipped,
    }
}

/// Recovering: park the robot, agitate the feeder, give parts time to
/// settle. Runs at most once per empty-queue occurrence.
async fn recover(system: &mut CellSystem, timings: &JobTimings) {
    info!("No pickable parts visible, running feeder recovery");

    if let Err(e) = system.robot.send_task(&RobotTask::home()).await {
        warn!("Parking robot for recovery failed: {e}");
    }

    let (bounce, consolidate) = (timings.bounce, timings.consolidate);
    match system.feeder_mut() {
        Ok(feeder) => {
            if let Err(e) = feeder.agitate(bounce, consolidate).await {
                warn!("Feeder agitation failed: {e}");
            }
        }
        Err(e) => warn!("Skipping agitation: {e}"),
    }

    sleep(timings.resettle).await;
}

/// Finalizing: home, eject the carrier, detach the tool, home again. Every
/// step is best-effort but all of them are always attempted, even when
/// sequencing aborted early.
async fn finalize(system: &mut CellSystem, timings: &JobTimings) {
    info!("Finalizing job");

    if let Err(e) = system.robot.send_task(&RobotTask::home()).await {
        warn!("Return to home failed: {e}");
    }

    let pulse = CylinderCommand::Pulse { on: timings.pulse_on, off: timings.pulse_off };
    match system.cylinders_mut() {
        Ok(bank) => {
            if let Err(e) = bank.execute(EJECT_CYLINDER, pulse).await {
                warn!("Carrier eject pulse failed: {e}");
            }
        }
        Err(e) => warn!("Skipping carrier eject: {e}"),
    }

    if let Err(e) = system.robot.send_task(&RobotTask::detach_suction()).await {
        warn!("Tool detach failed: {e}");
    }
    if let Err(e) = system.robot.send_task(&RobotTask::home()).await {
        warn!("Final return to home failed: {e}");
    }
}
