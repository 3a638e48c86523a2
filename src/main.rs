// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use photobooth::app::{CaptureSession, SessionHandle};
use photobooth::backends::camera::{self, CameraPlatform};
use photobooth::backends::virtual_camera::VirtualPlatform;
use photobooth::config::{CameraSource, Config};
use photobooth::constants::files;
use photobooth::i18n;
use photobooth::pipelines::photo::OverlaySlot;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod cli;

#[derive(Parser)]
#[command(name = "photobooth")]
#[command(about = "Camera photobooth: live preview, framed capture, PNG download")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ~/.config/photobooth/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Camera platform
    #[arg(long, value_enum, global = true)]
    source: Option<CameraSource>,

    /// Show this image as the camera (implies --source virtual)
    #[arg(long, global = true)]
    camera_image: Option<PathBuf>,

    /// Frame artwork drawn over captures (PNG, JPEG or SVG)
    #[arg(long, global = true)]
    overlay: Option<PathBuf>,

    /// Directory downloads are written to
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the photobooth in the terminal (default)
    Terminal,

    /// List available cameras
    List,

    /// Take one framed photo and save it
    Capture {
        /// Name printed on the photo
        #[arg(short, long)]
        name: String,

        /// Branch printed on the photo
        #[arg(short, long)]
        branch: String,

        /// Use the rear-facing camera
        #[arg(long)]
        rear: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let terminal_mode = matches!(cli.command, None | Some(Commands::Terminal));
    init_logging(terminal_mode);

    // Get the system's preferred languages.
    let requested_languages = i18n_embed::DesktopLanguageRequester::requested_languages();
    i18n::init(&requested_languages);

    let config = load_config(&cli)?;
    let platform = build_platform(&cli, &config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        match cli.command {
            Some(Commands::List) => cli::list_cameras(platform.as_ref()).await?,
            Some(Commands::Capture { name, branch, rear }) => {
                // A requested overlay must be on the photo, so wait for it
                let overlay = overlay_slot(&config);
                if let Err(err) = overlay.wait_loaded().await {
                    error!(error = %err, "Overlay could not be loaded");
                    return Err(photobooth::AppError::from(err).into());
                }
                let handle = SessionHandle::spawn(CaptureSession::new(platform, &config, overlay));
                let result = cli::take_photo(&handle, name, branch, rear).await;
                handle.teardown().await;
                match result {
                    Ok(path) => println!("Saved: {}", path.display()),
                    Err(photobooth::AppError::Camera(err)) => {
                        error!(error = %err, "Capture failed");
                        return Err(err.user_message().into());
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Some(Commands::Terminal) | None => {
                let overlay = overlay_slot(&config);
                let handle = SessionHandle::spawn(CaptureSession::new(platform, &config, overlay));
                photobooth::terminal::run(handle).await?;
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Set RUST_LOG to control the log level (e.g. RUST_LOG=photobooth=debug)
///
/// The terminal UI owns the screen, so its logs go to a file in the cache
/// directory instead of stderr.
fn init_logging(terminal_mode: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let log_file = terminal_mode
        .then(|| dirs::cache_dir().map(|dir| dir.join(files::APP_DIR)))
        .flatten()
        .and_then(|dir| {
            std::fs::create_dir_all(&dir).ok()?;
            std::fs::File::create(dir.join(files::LOG_FILE)).ok()
        });

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .init(),
        None if terminal_mode => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .init(),
    }
}

fn load_config(cli: &Cli) -> Result<Config, photobooth::errors::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    if let Some(source) = cli.source {
        config.source = source;
    }
    if cli.camera_image.is_some() {
        config.source = CameraSource::Virtual;
    }
    if let Some(overlay) = &cli.overlay {
        config.overlay_path = Some(overlay.clone());
    }
    if let Some(dir) = &cli.download_dir {
        config.download_dir = Some(dir.clone());
    }
    info!(source = ?config.source, "Configuration ready");
    Ok(config)
}

fn build_platform(
    cli: &Cli,
    config: &Config,
) -> Result<Arc<dyn CameraPlatform>, photobooth::backends::camera::BackendError> {
    match &cli.camera_image {
        Some(path) => Ok(Arc::new(VirtualPlatform::from_image_file(path)?)),
        None => Ok(camera::get_platform(config.source)),
    }
}

/// Start loading the configured overlay in the background
fn overlay_slot(config: &Config) -> OverlaySlot {
    match &config.overlay_path {
        Some(path) => OverlaySlot::spawn_load(path.clone()),
        None => OverlaySlot::empty(),
    }
}
