//! `qmag-nav` command-line surface.
//!
//! Two subcommands: `simulate`, a map-independent deterministic path
//! generator for quick demos, and `estimate`, which drives the same
//! position-pseudo-observation pipeline as `nav-api`'s `/estimate`
//! route against a loaded map.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mag_calibration::CalibrationParams;
use mag_map::{InterpolationMethod, MagneticMap};
use nav_core::NavigationService;
use nav_ekf::FilterConfig;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "qmag-nav")]
#[command(about = "Magnetic-anomaly navigation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a deterministic straight-line lat/lon path.
    Simulate {
        #[arg(long)]
        steps: usize,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fuse one position pseudo-observation into the filter and
    /// print the resulting estimate.
    Estimate {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lon: f64,
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Serialize)]
struct LatLonPoint {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct EstimateOutput {
    lat: f64,
    lon: f64,
    quality: f64,
}

const SIM_START: (f64, f64) = (0.0, 0.0);
const SIM_END: (f64, f64) = (1.0, 1.0);

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _ = tracing_subscriber::fmt::try_init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().expect("failed to start Tokio runtime");

    match cli.command {
        Command::Simulate { steps, output } => run_simulate(steps, output),
        Command::Estimate { lat, lon, reset } => runtime.block_on(run_estimate(lat, lon, reset)),
    }
}

fn run_simulate(steps: usize, output: Option<PathBuf>) -> ExitCode {
    let points: Vec<LatLonPoint> = (0..=steps)
        .map(|i| {
            let frac = if steps == 0 {
                0.0
            } else {
                i as f64 / steps as f64
            };
            LatLonPoint {
                lat: SIM_START.0 + (SIM_END.0 - SIM_START.0) * frac,
                lon: SIM_START.1 + (SIM_END.1 - SIM_START.1) * frac,
            }
        })
        .collect();

    let json = serde_json::to_string_pretty(&points).expect("path serializes to JSON");

    match output {
        Some(path) => match std::fs::File::create(&path).and_then(|mut f| f.write_all(json.as_bytes())) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("failed to write {}: {e}", path.display());
                ExitCode::FAILURE
            }
        },
        None => {
            println!("{json}");
            ExitCode::SUCCESS
        }
    }
}

async fn run_estimate(lat: f64, lon: f64, reset: bool) -> ExitCode {
    let Ok(map_path) = std::env::var("QMAG_NAV_MAP_PATH") else {
        eprintln!("QMAG_NAV_MAP_PATH must be set to run 'estimate'");
        return ExitCode::FAILURE;
    };

    let map = match MagneticMap::open(&map_path) {
        Ok(map) => map,
        Err(e) => {
            eprintln!("failed to load map at {map_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let nav = match NavigationService::new(
        std::sync::Arc::new(map),
        FilterConfig::default(),
        CalibrationParams::identity(),
        1,
        lat,
        lon,
    ) {
        Ok(nav) => nav,
        Err(e) => {
            eprintln!("failed to initialize navigation service: {e}");
            return ExitCode::FAILURE;
        }
    };

    if reset {
        if let Err(e) = nav.reset(lat, lon).await {
            eprintln!("reset failed: {e}");
            return ExitCode::FAILURE;
        }
    }

    let claimed_field = match nav.query_field(lat, lon, InterpolationMethod::Bilinear).await {
        Ok(v) => v,
        Err(e) => {
            eprintln!("position is outside the loaded map: {e}");
            return ExitCode::FAILURE;
        }
    };

    let estimate = match nav.observe_scalar(claimed_field, 1.0).await {
        Ok(e) => e,
        Err(e) => {
            eprintln!("estimate failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let output = EstimateOutput {
        lat: estimate.lat,
        lon: estimate.lon,
        quality: estimate.quality,
    };
    println!("{}", serde_json::to_string(&output).expect("estimate serializes to JSON"));
    ExitCode::SUCCESS
}
