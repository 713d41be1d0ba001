use std::{error::Error, path::PathBuf};

use clap::Parser;
use gnss_align::algorithms::projection::hapi_to_internal;
use gnss_align::api::{spawn_alignment, AlignmentReport, AlignmentSession, TransformCell};
use gnss_align::{ConfigurationManager, ProjectionRegistry};
use log::{info, warn};

/// Align a structure-from-motion reconstruction with DJI GNSS captions.
#[derive(Debug, Parser)]
#[command(author, version, about = "GNSS to reconstruction alignment")]
struct Args {
    /// AliceVision `.sfm` chunk files, in playback order.
    #[arg(long, required = true, num_args = 1..)]
    sfm: Vec<PathBuf>,

    /// DJI `.SRT` caption file recorded with the video.
    #[arg(long)]
    captions: PathBuf,

    /// Optional JSON AlignmentConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target projection, either an internal name (`sweref_99_13_30`) or
    /// HAPI style (`13 30`, `TM`).
    #[arg(long)]
    projection: Option<String>,

    /// Frames whose camera pose is added to the report.
    #[arg(long = "frame")]
    frames: Vec<u32>,

    /// Place a ground marker below every GNSS fix.
    #[arg(long)]
    markers: bool,

    /// Print a short summary instead of JSON.
    #[arg(long)]
    text: bool,
}

/// Internal projection name for `name`, accepting HAPI style names
fn resolve_projection(name: &str, registry: &ProjectionRegistry) -> String {
    if registry.contains(name) {
        name.to_string()
    } else {
        hapi_to_internal(name)
    }
}

fn run(args: &Args) -> Result<String, Box<dyn Error>> {
    let registry = ProjectionRegistry::with_sweref_zones();

    let mut manager = match &args.config {
        Some(path) => ConfigurationManager::from_file(path)?,
        None => ConfigurationManager::new(),
    };
    if let Some(name) = &args.projection {
        let projection = resolve_projection(name, &registry);
        manager.set_projection(&projection)?;
    }

    let mut session = AlignmentSession::new(manager.config().clone(), registry)?;
    let added = session.load_reconstructions(&args.sfm)?;
    info!("{} posed frames from {} chunk files", added, args.sfm.len());

    let cell = TransformCell::new();
    let alignment = spawn_alignment(&session, args.captions.clone()).wait_and_publish(&cell)?;
    if alignment.diagnostics.ill_conditioned {
        warn!(
            "rotation is poorly constrained (condition ratio {:.3e})",
            alignment.diagnostics.condition_ratio
        );
    }

    let queries = args
        .frames
        .iter()
        .map(|&frame| session.get_pose(frame))
        .collect::<Result<Vec<_>, _>>()?;
    let mut report = AlignmentReport::from_alignment(&alignment).with_poses(&queries);

    if args.markers {
        let transform = cell.snapshot().ok_or("no transform was published")?;
        let markers = session.gnss_markers(&args.captions)?;
        report = report.with_markers(transform.place_markers(&markers, session.registry())?);
    }

    if args.text {
        Ok(report.to_string())
    } else {
        Ok(report.to_json(true)?)
    }
}

fn main() {
    pretty_env_logger::init();
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let output = run(&args)?;
    println!("{}", output);
    Ok(())
}
