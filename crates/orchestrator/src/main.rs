use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use common_cell::{CoordinationTable, settings};
use devices::RobotLink;
use dotenv::dotenv;
use orchestrator::job::{JobTimings, execute_job};
use orchestrator::system::CellSystem;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vision::{AffineTransform, CalibrationPoint};

#[derive(Parser)]
#[command(about = "Pick-and-place cell orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one drawing job for a shape from the coordination table.
    Run {
        #[arg(long)]
        shape: String,
    },
    /// Probe the configured devices and print the aggregated status.
    Status,
    /// Fit the camera→robot transform from a calibration point file and
    /// report its coefficients and residuals.
    Calibrate {
        #[arg(long)]
        points: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    // RUST_LOG wins; the configured level is the fallback.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings().logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    color_eyre::install()?;

    let cli = Cli::parse();
    match cli.command {
        Command::Run { shape } => run_job(&shape).await,
        Command::Status => show_status().await,
        Command::Calibrate { points } => calibrate(&points),
    }
}

async fn run_job(shape: &str) -> Result<()> {
    let settings = settings();

    let table = CoordinationTable::load(Path::new(&settings.paths.coordination_file))
        .wrap_err("loading coordination table")?;
    let transform = load_transform(&settings.paths.calibration_file)
        .wrap_err("fitting camera calibration")?;

    // The camera, feeder and cylinder gateways are wired in by the
    // deployment-specific SDK bindings; without them the job runs degraded
    // and reports the plates it could not place.
    let mut system = CellSystem::new(RobotLink::from_settings(&settings.robot));
    system.initialize(settings.feeder.light_brightness_pct).await;
    let status = system.status();
    if !status.fully_operational() {
        tracing::warn!(
            "Running degraded (camera {}, robot {}, feeder {}, cylinder {})",
            status.camera,
            status.robot,
            status.feeder,
            status.cylinder
        );
    }

    let timings = JobTimings::from_settings(settings);
    let report = execute_job(&mut system, &table, &transform, shape, &timings).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    system.shutdown().await;
    Ok(())
}

async fn show_status() -> Result<()> {
    let settings = settings();

    let mut system = CellSystem::new(RobotLink::from_settings(&settings.robot));
    if let Err(e) = system.robot.connect().await {
        tracing::warn!("Robot probe failed: {e}");
    }
    println!("{}", serde_json::to_string_pretty(&system.status())?);

    system.shutdown().await;
    Ok(())
}

fn load_transform(path: &str) -> Result<AffineTransform> {
    let raw = fs::read_to_string(path)?;
    let points: Vec<CalibrationPoint> = serde_json::from_str(&raw)?;
    Ok(AffineTransform::fit(&points)?)
}

fn calibrate(points_file: &Path) -> Result<()> {
    let raw = fs::read_to_string(points_file)?;
    let points: Vec<CalibrationPoint> = serde_json::from_str(&raw)?;
    let transform = AffineTransform::fit(&points)?;

    let [[xx, xy], [yx, yy], [tx, ty]] = transform.coefficients();
    println!("robot_x = {xx:.10} * camera_x + {yx:.10} * camera_y + {tx:.10}");
    println!("robot_y = {xy:.10} * camera_x + {yy:.10} * camera_y + {ty:.10}");

    let residuals = transform.residuals(&points);
    for r in &residuals {
        println!(
            "({:.1}, {:.1}) → ({:.3}, {:.3}), expected ({:.3}, {:.3}), error {:.4}",
            r.camera.0, r.camera.1, r.mapped.0, r.mapped.1, r.expected.0, r.expected.1, r.error
        );
    }
    let max_error = residuals.iter().map(|r| r.error).fold(0.0, f64::max);
    println!("max error: {max_error:.4}");
    Ok(())
}
