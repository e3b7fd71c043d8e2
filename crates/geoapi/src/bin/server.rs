//! `geoapi_server`: serves tiles and point data over HTTP.

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use geoapi::{init_logging, AppResult};
use geoapi_server::{GeoServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "geoapi_server")]
#[command(about = "Serve procedural planet tiles and point data over HTTP")]
struct Args {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind host, overrides the config file
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Worker threads, overrides the config file
    #[arg(short, long)]
    workers: Option<usize>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Log filter directives, e.g. "info,geoapi::access=warn"
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
            eprintln!("geoapi_server: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> AppResult<()> {
    init_logging(args.log_filter.as_deref(), args.log_file.as_deref())?;

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(workers) = args.workers {
        config.server.workers = workers;
    }

    let server = GeoServer::bind(config)?;

    if let Some(seconds) = args.duration {
        let handle = server.shutdown_handle();
        thread::Builder::new()
            .name("geoapi-timer".to_owned())
            .spawn(move || {
                thread::sleep(Duration::from_secs(seconds));
                tracing::info!(target: "geoapi::system", client = "-", seconds, "run duration elapsed");
                handle.shutdown();
            })
            .map_err(|source| geoapi_server::ServerError::Spawn {
                name: "geoapi-timer".to_owned(),
                source,
            })?;
    }

    server.run()?;
    Ok(())
}
