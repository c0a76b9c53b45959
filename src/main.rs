// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use viewfinder::Config;

mod cli;

/// Log file used while the terminal owns the screen
const TERMINAL_LOG_FILE: &str = "viewfinder.log";

#[derive(Parser)]
#[command(name = "viewfinder")]
#[command(about = "Camera viewfinder with wide-angle, zoom and stabilization")]
#[command(version = viewfinder::constants::app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: <config dir>/viewfinder/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the viewfinder in the terminal (default)
    Terminal {
        /// Camera index to use (from 'viewfinder list')
        #[arg(short, long)]
        camera: Option<usize>,
    },

    /// List available cameras and video encoders
    List,

    /// Take a raw photo
    Photo {
        /// Camera index to use (from 'viewfinder list')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Output file or directory (default: <pictures>/photo_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record the processed viewfinder stream
    Video {
        /// Camera index to use (from 'viewfinder list')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Zoom level, 0.5 (wide) to 5.0
        #[arg(short, long)]
        zoom: Option<f32>,

        /// Enable stabilization
        #[arg(short, long)]
        stabilize: bool,

        /// Output file or directory (default: <videos>/video_TIMESTAMP.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run an image through the viewfinder transforms
    Process {
        /// Input image
        #[arg(short, long)]
        input: PathBuf,

        /// Output image (format from extension)
        #[arg(short, long)]
        output: PathBuf,

        /// Zoom level, 0.5 (wide) to 5.0
        #[arg(short, long, default_value = "1.0")]
        zoom: f32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Terminal { camera: None });
    init_logging(matches!(command, Commands::Terminal { .. }));

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };

    match command {
        Commands::Terminal { camera } => {
            if let Some(camera) = camera {
                config.camera_index = camera;
            }
            viewfinder::terminal::run(config)
        }
        Commands::List => cli::list_cameras(),
        Commands::Photo { camera, output } => {
            if let Some(camera) = camera {
                config.camera_index = camera;
            }
            cli::take_photo(&config, output)
        }
        Commands::Video {
            camera,
            duration,
            zoom,
            stabilize,
            output,
        } => {
            if let Some(camera) = camera {
                config.camera_index = camera;
            }
            let zoom = zoom.unwrap_or(config.initial_zoom);
            let stabilize = stabilize || config.stabilization_enabled;
            cli::record_video(&config, duration, zoom, stabilize, output)
        }
        Commands::Process {
            input,
            output,
            zoom,
        } => cli::process_image(&input, &output, zoom),
    }
}

/// Initialize logging
///
/// Set RUST_LOG environment variable to control log level.
/// Examples: RUST_LOG=debug, RUST_LOG=viewfinder=debug, RUST_LOG=info
fn init_logging(to_file: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .init();
        return;
    }

    // The terminal UI owns stdout; without a log file there is no logging
    let Some(dir) = dirs::cache_dir().map(|d| d.join("viewfinder")) else {
        return;
    };
    let Ok(file) = std::fs::create_dir_all(&dir)
        .and_then(|_| std::fs::File::create(dir.join(TERMINAL_LOG_FILE)))
    else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
}
