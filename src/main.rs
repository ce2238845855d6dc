//! # Pad Bridge
//!
//! Drive a virtual joystick from a PS5 DualSense controller.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging (stderr, plus a daily file with `--log-dir`)
//!    - Load the mapping profile, falling back to defaults
//!    - Open the controller and pick a port (`--port auto` waits for a press)
//!    - Create the virtual joystick, or run in demo mode without one
//!
//! 2. **Main Loop**
//!    - The mapping worker polls, transforms and writes at `update_rate` Hz
//!    - The optional recorder samples published frames into JSONL files
//!
//! 3. **Graceful Shutdown**
//!    - Ctrl+C cancels both tasks
//!    - The worker centers all axes and releases all buttons
//!
//! # Examples
//!
//! ```bash
//! pad-bridge --profile mapping_profile.json --port auto
//! pad-bridge --no-device --record ./frames
//! pad-bridge init
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pad_bridge::config::Profile;
use pad_bridge::controller::detect_active_port;
use pad_bridge::controller::ps5::DualSenseSource;
use pad_bridge::device::uinput::{UinputJoystick, DEVICE_NAME};
use pad_bridge::runtime::{MappingWorker, ProfileHandle};
use pad_bridge::telemetry::{FrameRecorder, RecorderConfig};

/// Profile path used when `--profile` is not given
const DEFAULT_PROFILE_PATH: &str = "mapping_profile.json";

/// How long `--port auto` waits for a button press
const DETECT_TIMEOUT: Duration = Duration::from_secs(30);

/// File name prefix for the daily log file
const LOG_FILE_NAME: &str = "pad-bridge.log";

#[derive(Debug, Parser)]
#[command(name = "pad-bridge", version, about = "Drive a virtual joystick from a gamepad")]
struct Cli {
    /// Mapping profile (JSON, or TOML with a .toml extension)
    #[arg(long, default_value = DEFAULT_PROFILE_PATH)]
    profile: PathBuf,

    /// Controller port index, or `auto` to use the first one that presses a button
    #[arg(long, default_value = "0")]
    port: PortSelection,

    /// Run without creating a virtual joystick
    #[arg(long)]
    no_device: bool,

    /// Record published frames as JSONL into this directory
    #[arg(long, value_name = "DIR")]
    record: Option<PathBuf>,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Subcommand)]
enum Command {
    /// Run the mapping loop (default)
    #[default]
    Run,
    /// Write the default profile
    Init {
        /// Overwrite an existing profile
        #[arg(long)]
        force: bool,
    },
    /// Unmap every button and axis in the profile
    UnmapAll,
    /// Restore every profile setting to its default
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortSelection {
    Auto,
    Index(usize),
}

impl FromStr for PortSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(PortSelection::Auto);
        }
        s.parse()
            .map(PortSelection::Index)
            .map_err(|_| format!("expected a port number or `auto`, got `{s}`"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_dir.as_deref())?;

    info!("Pad Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command.clone().unwrap_or_default() {
        Command::Run => run(&cli).await,
        Command::Init { force } => init_profile(&cli.profile, force),
        Command::UnmapAll => edit_profile(&cli.profile, Profile::unmap_all),
        Command::Reset => edit_profile(&cli.profile, Profile::reset_to_defaults),
    }
}

/// Log to stderr, and to a daily file when `log_dir` is set.
///
/// `RUST_LOG` overrides the default `info` level. The returned guard must
/// stay alive for the file writer to flush.
fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let profile = ProfileHandle::new(Profile::load_or_default(&cli.profile));

    let mut source = DualSenseSource::open().context("Failed to open controller")?;
    for (port, path, name) in source.describe() {
        info!("Port {}: {} at {}", port, name, path.display());
    }

    let ports = source.port_count();
    let port = match cli.port {
        PortSelection::Index(port) => {
            if port >= ports {
                warn!("Port {} has no controller yet ({} found)", port, ports);
            }
            port
        }
        PortSelection::Auto => match detect_active_port(&mut source, ports, DETECT_TIMEOUT).await {
            Some(port) => port,
            None => {
                warn!("No button press detected, using port 0");
                0
            }
        },
    };

    let sink = if cli.no_device {
        info!("Demo mode: no virtual joystick will be created");
        None
    } else {
        match UinputJoystick::create(DEVICE_NAME) {
            Ok(device) => Some(device),
            Err(e) => {
                warn!("Could not create virtual joystick: {}, running in demo mode", e);
                None
            }
        }
    };

    let worker = MappingWorker::new(source, port, sink, profile.subscribe());
    let cancel = CancellationToken::new();

    let recorder = match &cli.record {
        Some(dir) => {
            let recorder = FrameRecorder::new(RecorderConfig::new(dir))
                .with_context(|| format!("Failed to start recorder in {}", dir.display()))?;
            Some(tokio::spawn(recorder.run(worker.observer(), cancel.clone())))
        }
        None => None,
    };

    let worker_task = tokio::spawn(worker.run(cancel.clone()));

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    cancel.cancel();

    let stats = worker_task.await?;
    info!("Total cycles: {}, frames published: {}", stats.cycles, stats.frames);

    if let Some(task) = recorder {
        let records = task.await?;
        info!("Total frames recorded: {}", records);
    }

    Ok(())
}

/// Write the default profile to `path`.
fn init_profile(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    Profile::default().save(path)?;
    Ok(())
}

/// Load `path`, apply `edit` and save it back.
fn edit_profile(path: &Path, edit: impl FnOnce(&mut Profile)) -> Result<()> {
    let mut profile = Profile::load(path)
        .with_context(|| format!("Failed to load profile {}", path.display()))?;
    edit(&mut profile);
    profile.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pad_bridge::config::UNMAPPED;
    use tempfile::tempdir;

    // ==================== Constants Tests ====================

    #[test]
    fn test_default_profile_path() {
        assert_eq!(DEFAULT_PROFILE_PATH, "mapping_profile.json");
    }

    #[test]
    fn test_detect_timeout_is_reasonable() {
        assert!(DETECT_TIMEOUT >= Duration::from_secs(5));
    }

    // ==================== Command line Tests ====================

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["pad-bridge"]).unwrap();
        assert_eq!(cli.profile, PathBuf::from(DEFAULT_PROFILE_PATH));
        assert_eq!(cli.port, PortSelection::Index(0));
        assert!(!cli.no_device);
        assert!(cli.record.is_none());
        assert!(cli.log_dir.is_none());
        assert_eq!(cli.command.unwrap_or_default(), Command::Run);
    }

    #[test]
    fn test_cli_run_options() {
        let cli = Cli::try_parse_from([
            "pad-bridge", "--profile", "wheel.toml", "--port", "auto", "--no-device", "--record", "frames",
        ])
        .unwrap();
        assert_eq!(cli.profile, PathBuf::from("wheel.toml"));
        assert_eq!(cli.port, PortSelection::Auto);
        assert!(cli.no_device);
        assert_eq!(cli.record, Some(PathBuf::from("frames")));
    }

    #[test]
    fn test_cli_subcommands() {
        let cli = Cli::try_parse_from(["pad-bridge", "init", "--force"]).unwrap();
        assert_eq!(cli.command, Some(Command::Init { force: true }));

        let cli = Cli::try_parse_from(["pad-bridge", "unmap-all"]).unwrap();
        assert_eq!(cli.command, Some(Command::UnmapAll));

        let cli = Cli::try_parse_from(["pad-bridge", "reset"]).unwrap();
        assert_eq!(cli.command, Some(Command::Reset));
    }

    #[test]
    fn test_port_selection_parsing() {
        assert_eq!("auto".parse::<PortSelection>(), Ok(PortSelection::Auto));
        assert_eq!("AUTO".parse::<PortSelection>(), Ok(PortSelection::Auto));
        assert_eq!("2".parse::<PortSelection>(), Ok(PortSelection::Index(2)));
        assert!("first".parse::<PortSelection>().is_err());
        assert!(Cli::try_parse_from(["pad-bridge", "--port", "-1"]).is_err());
    }

    // ==================== Profile commands Tests ====================

    #[test]
    fn test_init_writes_default_profile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.json");

        init_profile(&path, false).unwrap();
        assert_eq!(Profile::load(&path).unwrap(), Profile::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(&path, "{}").unwrap();

        assert!(init_profile(&path, false).is_err());
        assert!(init_profile(&path, true).is_ok());
    }

    #[test]
    fn test_unmap_all_then_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.json");
        init_profile(&path, false).unwrap();

        edit_profile(&path, Profile::unmap_all).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(UNMAPPED));
        assert_eq!(Profile::load(&path).unwrap().axes.lx.target, None);

        edit_profile(&path, Profile::reset_to_defaults).unwrap();
        assert_eq!(Profile::load(&path).unwrap(), Profile::default());
    }
}
