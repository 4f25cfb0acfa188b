// src/main.rs - Command-line entry point
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use yzscan_rs::config::{self, Config};
use yzscan_rs::console::{self, Console};
use yzscan_rs::hardware::{self, SIMULATED_PORT};
use yzscan_rs::motion::{LogCapture, MotionSequencer, run_scan_until};
use yzscan_rs::{HomeAxes, Link};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

const DEFAULT_CONFIG: &str = "yzscan.toml";

#[derive(Debug, Parser)]
#[command(name = "yzscan", version, about = "Y/Z scanning rig controller for grblHAL")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Serial port, overriding the configuration
    #[arg(short, long, global = true)]
    port: Option<String>,
    /// Baud rate, overriding the configuration
    #[arg(short, long, global = true)]
    baud: Option<u32>,
    /// Talk to an in-process simulated controller instead of a serial port
    #[arg(long, global = true)]
    simulate: bool,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Interactive command loop (default)
    Console,
    /// List serial ports
    Ports,
    /// Print one status report
    Status,
    /// Home the given axes
    Home {
        #[arg(default_value = "YZ")]
        axes: HomeAxes,
    },
    /// Run the home-and-scan routine
    Scan,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    tracing::info!("Starting yzscan {}", env!("CARGO_PKG_VERSION"));

    let explicit = cli.config.is_some();
    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut config = config::load_or_default(&config_path, explicit).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", config_path.display(), e);
        Box::new(e) as BoxError
    })?;
    if let Some(port) = cli.port.clone() {
        config.connection.port = Some(port);
    }
    if let Some(baud) = cli.baud {
        config.connection.baud = baud;
    }
    config.validate()?;

    match cli.command.unwrap_or(Mode::Console) {
        Mode::Console => Console::new(config, cli.simulate).run().await?,
        Mode::Ports => {
            console::list_ports();
        }
        Mode::Status => {
            let mut sequencer = open_sequencer(&config, cli.simulate).await?;
            match sequencer.status().await? {
                Some(status) => println!("{} {}", status.state, status.position),
                None => println!("Status unknown"),
            }
        }
        Mode::Home { axes } => {
            let mut sequencer = open_sequencer(&config, cli.simulate).await?;
            println!("{}", sequencer.home(axes).await?);
        }
        Mode::Scan => {
            let mut sequencer = open_sequencer(&config, cli.simulate).await?;
            let mut capture = LogCapture;
            let interrupt = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            match run_scan_until(&mut sequencer, &config.scan, &mut capture, interrupt).await? {
                Some(report) => print!("{}", report),
                None => println!("Scan interrupted; feed hold sent"),
            }
            sequencer.connection_mut().close();
        }
    }

    Ok(())
}

async fn open_sequencer(config: &Config, simulate: bool) -> Result<MotionSequencer<Box<dyn Link>>, BoxError> {
    let port = match (&config.connection.port, simulate) {
        (Some(port), _) => port.clone(),
        (None, true) => SIMULATED_PORT.to_string(),
        (None, false) => return Err("No serial port configured; pass --port or set connection.port".into()),
    };
    let connection = hardware::connect(&port, config, simulate).await?;
    Ok(MotionSequencer::new(connection, &config.motion))
}
