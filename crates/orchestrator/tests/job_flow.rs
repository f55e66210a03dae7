//! End-to-end job flows against a scripted TCP robot controller and fake
//! vision/feeder/cylinder gateways.

use async_trait::async_trait;
use common_cell::CoordinationTable;
use devices::{
    ConnectPolicy, CylinderBank, CylinderError, DigitalOutput, Feeder, FeederError, RegisterBus,
    RobotLink,
};
use image::RgbImage;
use orchestrator::job::{JobStatus, JobTimings, execute_job};
use orchestrator::system::CellSystem;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use vision::{
    AffineTransform, BlockClass, BoundingBox, DetectError, Detection, Detector, Roi,
    StaticFrameSource, VisionService,
};

/// Per-frame behavior of the scripted robot double.
#[derive(Clone, Copy)]
enum Reply {
    Ok,
    /// Bare newline, which the link reports as an empty response.
    Empty,
    /// Drop the connection without answering.
    Close,
}

/// Robot controller double: consumes one scripted reply per received frame
/// (defaulting to `OK` once the script runs out) and records what it
/// received.
async fn spawn_robot(script: Vec<Reply>) -> (u16, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let lines = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&lines);
    tokio::spawn(async move {
        let mut script = VecDeque::from(script);
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let (read_half, mut write_half) = socket.into_split();
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        recorded.lock().unwrap().push(line.trim().to_string());
                        match script.pop_front().unwrap_or(Reply::Ok) {
                            Reply::Ok => write_half.write_all(b"OK\n").await.unwrap(),
                            Reply::Empty => write_half.write_all(b"\n").await.unwrap(),
                            Reply::Close => break,
                        }
                    }
                }
            }
        }
    });
    (port, lines)
}

struct FixedDetector(Vec<Detection>);

impl Detector for FixedDetector {
    fn infer(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, DetectError> {
        Ok(self.0.clone())
    }
}

struct SharedBus(Arc<Mutex<Vec<(u16, u16)>>>);

#[async_trait]
impl RegisterBus for SharedBus {
    async fn write_register(&mut self, addr: u16, value: u16) -> Result<(), FeederError> {
        self.0.lock().unwrap().push((addr, value));
        Ok(())
    }
}

struct SharedIo(Arc<Mutex<Vec<(u8, bool)>>>);

#[async_trait]
impl DigitalOutput for SharedIo {
    async fn set_channel(&mut self, channel: u8, on: bool) -> Result<(), CylinderError> {
        self.0.lock().unwrap().push((channel, on));
        Ok(())
    }
}

fn front_detection(x: f32, y: f32) -> Detection {
    Detection {
        bbox: BoundingBox { x1: x - 2.0, y1: y - 2.0, x2: x + 2.0, y2: y + 2.0 },
        class: BlockClass::Front,
        confidence: 0.9,
    }
}

fn identity_transform() -> AffineTransform {
    AffineTransform::from_coefficients([[1.0, 0.0], [0.0, 1.0], [0.0, 0.0]])
}

fn started_vision(detections: Vec<Detection>) -> VisionService {
    let mut vision = VisionService::new(
        Box::new(StaticFrameSource::new(RgbImage::new(2000, 1500))),
        Box::new(FixedDetector(detections)),
        Roi::new(684, 421, 1256, 978),
        Duration::from_millis(20),
    );
    vision.start();
    vision
}

async fn connected_link(port: u16) -> RobotLink {
    let mut link = RobotLink::new(
        "127.0.0.1",
        port,
        Duration::from_secs(1),
        Duration::from_secs(1),
        ConnectPolicy::FailFast,
        1,
    );
    link.connect().await.unwrap();
    link
}

fn zero_timings() -> JobTimings {
    JobTimings {
        bounce: Duration::ZERO,
        consolidate: Duration::ZERO,
        resettle: Duration::ZERO,
        pulse_on: Duration::ZERO,
        pulse_off: Duration::ZERO,
    }
}

async fn wait_for_centroids(system: &CellSystem, count: usize) {
    for _ in 0..200 {
        if system.front_centroids().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("vision never published {count} centroid(s)");
}

#[tokio::test]
async fn square_job_places_both_plates_in_order() {
    let (port, lines) = spawn_robot(Vec::new()).await;
    let feeder_writes = Arc::new(Mutex::new(Vec::new()));
    let cylinder_states = Arc::new(Mutex::new(Vec::new()));

    let mut system = CellSystem::new(connected_link(port).await)
        .with_vision(started_vision(vec![
            front_detection(10.0, 10.0),
            front_detection(20.0, 20.0),
        ]))
        .with_feeder(Feeder::new(
            Box::new(SharedBus(Arc::clone(&feeder_writes))) as Box<dyn RegisterBus>
        ))
        .with_cylinders(CylinderBank::new(
            Box::new(SharedIo(Arc::clone(&cylinder_states))) as Box<dyn DigitalOutput>,
        ));
    wait_for_centroids(&system, 2).await;

    let table = CoordinationTable::from_map(HashMap::from([(
        "square".to_string(),
        vec![101, 102],
    )]));
    let report = execute_job(
        &mut system,
        &table,
        &identity_transform(),
        "square",
        &zero_timings(),
    )
    .await;

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.total_plates, 2);
    assert_eq!(report.completed, 2);
    assert_eq!(report.skipped, 0);
    assert!(report.reason.is_none());

    // Attach, the two positionally-paired picks (ROI origin 684,421 added,
    // identity transform, integer truncation), then the finalize triple.
    assert_eq!(
        *lines.lock().unwrap(),
        vec![
            "(4,0,0,0,0)",
            "(7,694,431,0,101)",
            "(7,704,441,0,102)",
            "(0,0,0,0,0)",
            "(5,0,0,0,0)",
            "(0,0,0,0,0)",
        ]
    );
    // No recovery ran, so the feeder was never touched.
    assert!(feeder_writes.lock().unwrap().is_empty());
    // Carrier eject pulse during finalize.
    assert_eq!(*cylinder_states.lock().unwrap(), vec![(1, true), (1, false)]);

    system.shutdown().await;
}

#[tokio::test]
async fn empty_scene_recovers_once_then_abandons_the_job() {
    let (port, lines) = spawn_robot(Vec::new()).await;
    let feeder_writes = Arc::new(Mutex::new(Vec::new()));
    let cylinder_states = Arc::new(Mutex::new(Vec::new()));

    let mut system = CellSystem::new(connected_link(port).await)
        .with_vision(started_vision(Vec::new()))
        .with_feeder(Feeder::new(
            Box::new(SharedBus(Arc::clone(&feeder_writes))) as Box<dyn RegisterBus>
        ))
        .with_cylinders(CylinderBank::new(
            Box::new(SharedIo(Arc::clone(&cylinder_states))) as Box<dyn DigitalOutput>,
        ));

    let table = CoordinationTable::from_map(HashMap::from([("dot".to_string(), vec![5])]));
    let report = execute_job(
        &mut system,
        &table,
        &identity_transform(),
        "dot",
        &zero_timings(),
    )
    .await;

    assert_eq!(report.status, JobStatus::Error);
    assert_eq!(report.total_plates, 1);
    assert_eq!(report.completed, 0);
    assert_eq!(report.skipped, 1);
    assert!(report.reason.is_some());

    // Exactly one agitation cycle: bounce then consolidate.
    assert_eq!(
        *feeder_writes.lock().unwrap(),
        vec![(1, 10113), (0, 1), (0, 0), (1, 10114), (0, 1), (0, 0)]
    );
    // Attach, recovery park, then the full finalize triple: the robot still
    // ends the job homed with the tool detached.
    assert_eq!(
        *lines.lock().unwrap(),
        vec![
            "(4,0,0,0,0)",
            "(0,0,0,0,0)",
            "(0,0,0,0,0)",
            "(5,0,0,0,0)",
            "(0,0,0,0,0)",
        ]
    );

    system.shutdown().await;
}

#[tokio::test]
async fn failed_pick_is_skipped_and_the_job_continues() {
    // Attach succeeds, the first pick frame gets an empty reply, everything
    // after that succeeds again.
    let (port, lines) = spawn_robot(vec![Reply::Ok, Reply::Empty]).await;

    let mut system = CellSystem::new(connected_link(port).await).with_vision(started_vision(vec![
        front_detection(10.0, 10.0),
        front_detection(20.0, 20.0),
    ]));
    wait_for_centroids(&system, 2).await;

    let table = CoordinationTable::from_map(HashMap::from([(
        "square".to_string(),
        vec![101, 102],
    )]));
    let report = execute_job(
        &mut system,
        &table,
        &identity_transform(),
        "square",
        &zero_timings(),
    )
    .await;

    // The failed plate is skipped, not retried; the job still completes.
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.total_plates, 2);
    assert_eq!(report.completed, 1);
    assert_eq!(report.skipped, 1);
    assert!(report.reason.is_none());

    // Plate #101's frame went out once, #102 followed it, and the finalize
    // triple still ran.
    assert_eq!(
        *lines.lock().unwrap(),
        vec![
            "(4,0,0,0,0)",
            "(7,694,431,0,101)",
            "(7,704,441,0,102)",
            "(0,0,0,0,0)",
            "(5,0,0,0,0)",
            "(0,0,0,0,0)",
        ]
    );

    system.shutdown().await;
}

#[tokio::test]
async fn unknown_shape_aborts_before_any_motion() {
    let (port, lines) = spawn_robot(Vec::new()).await;

    let mut system = CellSystem::new(connected_link(port).await);
    let table = CoordinationTable::from_map(HashMap::new());
    let report = execute_job(
        &mut system,
        &table,
        &identity_transform(),
        "circle",
        &zero_timings(),
    )
    .await;

    assert_eq!(report.status, JobStatus::Error);
    assert_eq!(report.total_plates, 0);
    assert!(report.reason.unwrap().contains("circle"));
    // Only the tool attach went out; no pick, no finalize motion.
    assert_eq!(*lines.lock().unwrap(), vec!["(4,0,0,0,0)"]);

    system.shutdown().await;
}

#[tokio::test]
async fn tool_attach_failure_aborts_without_side_effects() {
    let (port, lines) = spawn_robot(vec![Reply::Close]).await;
    let cylinder_states = Arc::new(Mutex::new(Vec::new()));

    let mut system = CellSystem::new(connected_link(port).await).with_cylinders(
        CylinderBank::new(Box::new(SharedIo(Arc::clone(&cylinder_states))) as Box<dyn DigitalOutput>),
    );
    let table = CoordinationTable::from_map(HashMap::from([("dot".to_string(), vec![5])]));
    let report = execute_job(
        &mut system,
        &table,
        &identity_transform(),
        "dot",
        &zero_timings(),
    )
    .await;

    assert_eq!(report.status, JobStatus::Error);
    assert!(report.reason.unwrap().contains("Tool attach failed"));
    assert_eq!(report.total_plates, 0);
    assert_eq!(report.completed, 0);
    // The attach frame went out, nothing else did.
    assert_eq!(*lines.lock().unwrap(), vec!["(4,0,0,0,0)"]);
    assert!(cylinder_states.lock().unwrap().is_empty());

    system.shutdown().await;
}
