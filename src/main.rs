// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use qr_scanner::config::Config;
use qr_scanner::constants::APP_ID;
use qr_scanner::terminal::{self, PreviewSource};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "qr-scanner")]
#[command(about = "Scan QR codes with your camera, in the terminal")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Camera device to scan with (default: from config, else the first camera)
    #[arg(short, long)]
    camera: Option<PathBuf>,

    /// Scan image files instead of a camera
    #[arg(short, long, num_args = 1.., conflicts_with = "camera")]
    image: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Decode QR codes from image files and print them
    Decode {
        /// Image files to decode
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load();

    // The scanner screen owns the terminal, so its logs go to a file
    let screen = cli.command.is_none();
    init_logging(&config.log_filter, screen);

    match cli.command {
        Some(Commands::List) => cli::list_cameras(),
        Some(Commands::Decode { files }) => {
            cli::decode_images(&files, config.analysis_max_dimension)
        }
        None => {
            let source = if cli.image.is_empty() {
                PreviewSource::Camera(cli.camera)
            } else {
                PreviewSource::Images(cli.image)
            };

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .thread_name("qr-scanner-worker")
                .build()?;
            terminal::run(source, &config, runtime.handle())
        }
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over the configured filter, e.g. `RUST_LOG=qr_scanner=debug`.
fn init_logging(default_filter: &str, to_file: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    if to_file && let Some(file) = open_log_file() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .init();
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}

fn open_log_file() -> Option<std::fs::File> {
    let dir = dirs::cache_dir()?.join(APP_ID);
    std::fs::create_dir_all(&dir).ok()?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{}.log", APP_ID)))
        .ok()
}
