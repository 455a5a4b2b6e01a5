//! palmgrove — gesture-to-scene control core.
//!
//! Turns a stream of 21-point hand landmarks into an application mode,
//! a smoothed 3D pointer, grab events, a particle morph between a tree
//! and a scattered cloud, and photo picks. Scene state and events are
//! served over a Unix-socket s-expression protocol.

mod backend;
mod config;
mod events;
mod hand;
mod ipc;
mod pipeline;
mod scene;
mod state;

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use backend::{BackendType, RunOptions};
use config::CoreConfig;

#[derive(Parser, Debug)]
#[command(name = "palmgrove", about = "Gesture-driven particle grove core")]
struct Cli {
    /// Landmark source: replay, synthetic, or auto
    #[arg(long, default_value = "auto")]
    backend: String,

    /// Capture file for the replay backend
    #[arg(long)]
    replay: Option<PathBuf>,

    /// IPC socket path (default: $XDG_RUNTIME_DIR/palmgrove-ipc.sock)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Exit after N seconds (scripted runs)
    #[arg(long)]
    exit_after: Option<u64>,

    /// Particle count override
    #[arg(long)]
    particles: Option<usize>,

    /// Formation seed override
    #[arg(long)]
    seed: Option<u64>,

    /// Treat input as unmirrored (rear camera)
    #[arg(long)]
    no_mirror: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("palmgrove {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "palmgrove=info".into()),
        )
        .init();

    info!("palmgrove v{} starting", env!("CARGO_PKG_VERSION"));

    let backend_type = match cli.backend.as_str() {
        "replay" => BackendType::Replay,
        "synthetic" => BackendType::Synthetic,
        "auto" => {
            if cli.replay.is_some() {
                info!("auto-detected: capture file given, using replay backend");
                BackendType::Replay
            } else {
                info!("auto-detected: no capture file, using synthetic backend");
                BackendType::Synthetic
            }
        }
        other => {
            eprintln!("Unknown backend: {other}. Use: replay, synthetic, or auto");
            std::process::exit(1);
        }
    };

    let mut config = CoreConfig::default();
    if let Some(particles) = cli.particles {
        config.particle_count = particles;
        config.photo_slots = config.photo_slots.min(particles);
    }
    if let Some(seed) = cli.seed {
        config.formation_seed = seed;
    }
    if cli.no_mirror {
        config.mirror_input = false;
    }
    if let Err(reason) = config.validate() {
        anyhow::bail!("invalid configuration: {reason}");
    }

    let options = RunOptions {
        socket_path: cli
            .socket
            .unwrap_or_else(ipc::IpcServer::default_socket_path),
        exit_after: cli.exit_after,
        replay_file: cli.replay,
    };

    backend::run(backend_type, config, options)
}
