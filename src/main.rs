use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod backend;
mod columns;
mod devices;
mod hexgrid;
mod layers;
mod pdml;
mod selection;
mod session;
mod store;
mod themes;
mod ui;
mod version;
mod window;

use app::App;
use backend::{CaptureTarget, TsharkBackend};
use themes::ThemeName;

fn theme_help_text() -> String {
    let themes = ThemeName::all_themes()
        .iter()
        .map(|theme| theme.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Color theme to use (available: {})", themes)
}

fn parse_theme(s: &str) -> Result<String, String> {
    if ThemeName::all_themes()
        .iter()
        .any(|theme| theme.as_str() == s)
    {
        Ok(s.to_string())
    } else {
        let available = ThemeName::all_themes()
            .iter()
            .map(|theme| theme.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Err(format!(
            "Invalid theme '{}'. Available themes: {}",
            s, available
        ))
    }
}

#[derive(Parser)]
#[command(name = "wirescope")]
#[command(about = "A terminal UI for capturing and inspecting network packets")]
#[command(version = version::get_version())]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Network interface to capture from. If not specified, an interface
    /// picker is shown on startup.
    #[arg(short, long, conflicts_with = "pcap_file")]
    interface: Option<String>,

    /// Read packets from a pcap file instead of capturing live
    #[arg(short = 'f', long, value_name = "FILE", conflicts_with = "interface")]
    pcap_file: Option<String>,

    /// Update interval in milliseconds
    #[arg(short, long, default_value = "1000")]
    update_interval: u64,

    /// Enable debug logging to wirescope.log
    #[arg(short, long)]
    debug: bool,

    #[arg(short, long, default_value = "default", value_parser = parse_theme, help = theme_help_text())]
    theme: String,

    /// Disable mouse support (mouse support is enabled by default)
    #[arg(long)]
    no_mouse: bool,
}

#[derive(Parser)]
pub enum Commands {
    /// Show detailed version information
    VersionInfo,
}

/// Debug logging goes to a file because stdout and stderr belong to the
/// terminal UI while it is running.
fn init_logging(debug: bool) -> Result<Option<WorkerGuard>> {
    if !debug {
        return Ok(None);
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("wirescope.log")?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wirescope=debug")),
        )
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle subcommands
    if let Some(command) = cli.command {
        match command {
            Commands::VersionInfo => {
                version::print_header_info();
                return Ok(());
            }
        }
    }

    let _log_guard = init_logging(cli.debug)?;
    tracing::info!(version = version::get_version(), "wirescope starting");

    // Parse theme
    let theme_name = ThemeName::from_str(&cli.theme).unwrap_or_else(|| {
        eprintln!("Unknown theme '{}', using default", cli.theme);
        ThemeName::Default
    });

    // Capture target chosen on the command line, if any (either a live
    // interface or a pcap file)
    let initial_target = if let Some(path) = &cli.pcap_file {
        Some(CaptureTarget::File { path: path.into() })
    } else {
        cli.interface.as_ref().map(|device| CaptureTarget::Live {
            device: device.clone(),
        })
    };

    // Initialize the application
    let update_interval = Duration::from_millis(cli.update_interval);
    let mut app = App::new(
        update_interval,
        cli.debug,
        theme_name,
        TsharkBackend::new(),
        initial_target,
        !cli.no_mouse,
    );

    // Run the TUI application
    app.run().await?;

    Ok(())
}
