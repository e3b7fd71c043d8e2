//! `geoapi_generate`: builds the point store offline.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use geoapi::{generate_world, init_logging, AppError, AppResult, WorldGenOptions};
use geoapi_server::ServerConfig;
use geoapi_store::PointStore;
use geoapi_terrain::TerrainSynthesizer;

#[derive(Parser, Debug)]
#[command(name = "geoapi_generate")]
#[command(about = "Sample the planet into the point store and place named regions")]
struct Args {
    /// Server configuration to read the store path and terrain settings from
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output database, overrides the config file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Terrain seed, overrides the config file
    #[arg(short, long)]
    seed: Option<u64>,

    /// Grid spacing in degrees
    #[arg(long, default_value = "0.5")]
    step: f64,

    /// Number of regions to place
    #[arg(short, long, default_value = "2000")]
    regions: usize,

    /// Seed for region placement and names
    #[arg(long, default_value = "24301")]
    region_seed: u64,

    /// Log filter directives
    #[arg(long)]
    log_filter: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("geoapi_generate: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> AppResult<()> {
    init_logging(args.log_filter.as_deref(), args.log_file.as_deref())?;

    let config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    let mut terrain_config = config.terrain;
    if let Some(seed) = args.seed {
        terrain_config.seed = seed;
    }
    let output = args.output.unwrap_or(config.store.path);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| AppError::OutputDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let options = WorldGenOptions {
        grid_step: args.step,
        regions: args.regions,
        region_seed: args.region_seed,
    };
    options.validate()?;

    tracing::info!(
        target: "geoapi::system",
        client = "-",
        output = %output.display(),
        seed = terrain_config.seed,
        step = options.grid_step,
        "generating world"
    );
    let terrain = TerrainSynthesizer::init(terrain_config)?;
    let mut store = PointStore::open(&output)?;
    let report = generate_world(&terrain, &mut store, &options)?;
    store.close()?;
    terrain.shutdown();

    tracing::info!(
        target: "geoapi::system",
        client = "-",
        points = report.points,
        candidates = report.candidates,
        regions = report.regions,
        "world generated"
    );
    Ok(())
}
