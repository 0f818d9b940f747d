mod config; // brings `config.rs` in as `crate::config`
mod sim; // brings `sim.rs` in as `crate::sim`

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use farmx_mission::{
    CancelToken, CoordinateLog, FixedWind, GeoPoint, MissionController, MissionReport, SpraySequencer,
};
use farmx_targeting::{LinearDrift, ServoAngleMapper, WindCompensator};
use sim::{SimActuator, SimBoard, SimCamera, SimDetector, SimNavigator, snapshot};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Fly a simulated spray mission over a rectangular field.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of waypoint rows
    #[arg(long)]
    field_length: u32,

    /// Number of waypoints per row
    #[arg(long)]
    field_width: u32,

    /// First waypoint as LAT,LON in decimal degrees
    #[arg(long, value_name = "LAT,LON")]
    start: GeoPoint,

    /// Hover altitude in meters (overrides mission.altitude)
    #[arg(long)]
    altitude: Option<f64>,

    /// TOML configuration file (default: config/default.toml if present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write per-waypoint sprayed coordinates into this directory
    #[arg(long, value_name = "DIR")]
    coords_dir: Option<PathBuf>,

    /// Seed for the simulated detector and actuator
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(report) => {
            print!("{report}");
            ExitCode::from(exit_status(&report))
        }
        Err(e) => {
            error!("Mission setup failed: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<MissionReport> {
    let mut cfg = config::load_config(args.config.as_deref()).context("loading configuration")?;
    if let Some(altitude) = args.altitude {
        cfg.mission.altitude = altitude;
    }
    if let Some(dir) = args.coords_dir {
        cfg.output.coords_dir = Some(dir);
    }
    if let Some(seed) = args.seed {
        cfg.sim.seed = seed;
    }
    cfg.sim.validate()?;

    let servo = ServoAngleMapper::new(cfg.grid.size, cfg.servo).context("invalid [servo] or [grid] settings")?;
    let drift = LinearDrift::new(cfg.wind.compensation_factor).context("invalid [wind] settings")?;
    let compensator = WindCompensator::with_model(cfg.grid.size, drift).context("invalid [grid] settings")?;

    let board = SimBoard::default();
    let actuator = SimActuator::new(cfg.sim.seed.wrapping_add(1), cfg.sim.fault_rate, board.clone());
    let sequencer = SpraySequencer::new(actuator, servo, cfg.spray.clone()).context("invalid [spray] settings")?;

    let mut mission = MissionController::new(
        SimCamera::new(cfg.sim.frame_size(), board.clone()),
        SimDetector::new(cfg.sim.seed, cfg.sim.max_weeds_per_frame),
        SimNavigator::new(board.clone()),
        sequencer,
        cfg.mission.clone(),
    )
    .context("invalid [mission] settings")?
    .with_wind_compensator(compensator)?
    .with_detection_filter(cfg.detection);

    if cfg.sim.wind_sensor {
        mission = mission.with_wind_sensor(Box::new(FixedWind(cfg.sim.wind())));
    }
    if let Some(dir) = &cfg.output.coords_dir {
        let log = CoordinateLog::new(dir)
            .with_context(|| format!("creating coordinate directory {}", dir.display()))?;
        info!(dir = %log.dir().display(), "Writing coordinate lists");
        mission = mission.with_coordinate_log(log);
    }

    let cancel = CancelToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, cancelling mission");
                cancel.cancel();
            }
        }
    });

    let report = mission
        .run_mission(args.start, args.field_length, args.field_width, &cancel)
        .await;

    let state = snapshot(&board);
    if state.valve_open {
        error!("Valve reported open after mission end");
    }
    info!(
        position = ?state.position,
        holding = state.holding,
        aim = %state.aim,
        frames = state.frames,
        valve_cycles = state.valve_cycles,
        sim_faults = state.faults.len(),
        "Simulated hardware summary"
    );
    Ok(report)
}

/// 0 for a clean mission, 1 if any target was lost to an actuator fault,
/// 130 when cancelled.
fn exit_status(report: &MissionReport) -> u8 {
    if report.cancelled {
        130
    } else if report.is_success() {
        0
    } else {
        1
    }
}
