// src/console.rs - Interactive command loop driving the motion sequencer
use std::io::Write;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use yzscan_shared::config::Config;
use yzscan_shared::serial_interface::Link;
use yzscan_shared::{Axis, HomeAxes};

use crate::hardware::{self, Connection, SIMULATED_PORT, serial};
use crate::motion::{LogCapture, MotionSequencer, run_scan};

const HELP: &str = "\
Commands:
  connect [port]           - Connect to controller
  home [Y|Z|YZ]            - Home axes
  speed <rate>             - Set feed rate (mm/min)
  move <Y|Z> <position>    - Feed move to absolute position
  rapid <Y|Z> <position>   - Rapid move to absolute position
  status                   - Get machine status
  stop                     - Feed hold (emergency stop)
  resume                   - Cycle start after a feed hold
  reset                    - Soft reset
  scan                     - Run the home-and-scan routine
  raw <line>               - Send a line unmodified
  ports                    - List serial ports
  help                     - Show this list
  quit                     - Exit program";

#[derive(Debug, Error, PartialEq)]
pub enum ConsoleError {
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("{0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Connect(Option<String>),
    Home(HomeAxes),
    Speed(String),
    Move { axis: Axis, target: f64, rapid: bool },
    Status,
    Stop,
    Resume,
    Reset,
    Scan,
    Raw(String),
    Ports,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();
        let command = match head.to_ascii_lowercase().as_str() {
            "quit" | "exit" => ConsoleCommand::Quit,
            "help" | "?" => ConsoleCommand::Help,
            "connect" => ConsoleCommand::Connect(args.first().map(|p| p.to_string())),
            "home" => {
                let axes = match args.first() {
                    Some(axes) => axes.parse::<HomeAxes>().map_err(ConsoleError::InvalidArgument)?,
                    None => HomeAxes::YZ,
                };
                ConsoleCommand::Home(axes)
            }
            "speed" => match args.first() {
                Some(rate) => ConsoleCommand::Speed(rate.to_string()),
                None => return Err(ConsoleError::Usage("speed <rate>")),
            },
            verb @ ("move" | "rapid") => {
                let rapid = verb == "rapid";
                let (Some(axis), Some(target)) = (args.first(), args.get(1)) else {
                    return Err(ConsoleError::Usage(if rapid {
                        "rapid <Y|Z> <position>"
                    } else {
                        "move <Y|Z> <position>"
                    }));
                };
                let axis = axis.parse::<Axis>().map_err(ConsoleError::InvalidArgument)?;
                let target = target
                    .parse::<f64>()
                    .ok()
                    .filter(|t| t.is_finite())
                    .ok_or_else(|| ConsoleError::InvalidArgument(format!("invalid position '{}'", target)))?;
                ConsoleCommand::Move { axis, target, rapid }
            }
            "status" => ConsoleCommand::Status,
            "stop" => ConsoleCommand::Stop,
            "resume" => ConsoleCommand::Resume,
            "reset" => ConsoleCommand::Reset,
            "scan" => ConsoleCommand::Scan,
            "raw" => {
                if args.is_empty() {
                    return Err(ConsoleError::Usage("raw <line>"));
                }
                ConsoleCommand::Raw(args.join(" "))
            }
            "ports" => ConsoleCommand::Ports,
            other => return Err(ConsoleError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Line-oriented front end. Owns the sequencer and a closed-or-open link.
pub struct Console {
    config: Config,
    simulate: bool,
    sequencer: MotionSequencer<Box<dyn Link>>,
    input: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn new(config: Config, simulate: bool) -> Self {
        let port = config.connection.port.clone().unwrap_or_default();
        let connection = Connection::from_config(port, &config);
        let sequencer = MotionSequencer::new(connection, &config.motion);
        Self {
            config,
            simulate,
            sequencer,
            input: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Reads and executes commands until `quit`, end of input or Ctrl-C.
    pub async fn run(&mut self) -> Result<(), BoxError> {
        println!("=== Y/Z Scanner Controller ===");
        println!("{}", HELP);
        println!();

        loop {
            let line = tokio::select! {
                line = self.prompt(">>> ") => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!("\nInterrupted by user");
                    break;
                }
            };
            let Some(line) = line else { break };

            match ConsoleCommand::parse(&line) {
                Ok(None) => continue,
                Ok(Some(ConsoleCommand::Quit)) => break,
                Ok(Some(command)) => {
                    if let Err(e) = self.dispatch(command).await {
                        println!("{}", e);
                    }
                }
                Err(e) => println!("{}", e),
            }
        }

        self.sequencer.connection_mut().close();
        println!("Goodbye!");
        Ok(())
    }

    async fn prompt(&mut self, text: &str) -> std::io::Result<Option<String>> {
        print!("{}", text);
        std::io::stdout().flush()?;
        self.input.next_line().await
    }

    pub async fn dispatch(&mut self, command: ConsoleCommand) -> Result<(), BoxError> {
        match command {
            ConsoleCommand::Connect(port) => self.connect(port).await?,
            ConsoleCommand::Home(axes) => {
                let result = self.sequencer.home(axes).await?;
                println!("{}", result);
            }
            ConsoleCommand::Speed(rate) => {
                let rate = self.sequencer.set_feed_rate(&rate)?;
                println!("Feed rate set to {} mm/min", rate);
            }
            ConsoleCommand::Move { axis, target, rapid } => {
                let result = self.sequencer.move_axis(axis, target, rapid).await?;
                println!("{}", result);
            }
            ConsoleCommand::Status => match self.sequencer.status().await? {
                Some(status) => println!("{} {}", status.state, status.position),
                None => println!("Status unknown"),
            },
            ConsoleCommand::Stop => {
                let result = self.sequencer.feed_hold().await?;
                println!("Feed hold sent ({})", result);
            }
            ConsoleCommand::Resume => {
                let result = self.sequencer.cycle_start().await?;
                println!("{}", result);
            }
            ConsoleCommand::Reset => {
                let result = self.sequencer.soft_reset().await?;
                println!("{}", result);
            }
            ConsoleCommand::Scan => {
                let report = run_scan(&mut self.sequencer, &self.config.scan, &mut LogCapture).await?;
                print!("{}", report);
            }
            ConsoleCommand::Raw(line) => {
                let result = self.sequencer.send_line(&line).await?;
                println!("{}", result);
            }
            ConsoleCommand::Ports => {
                list_ports();
            }
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {}
        }
        Ok(())
    }

    async fn connect(&mut self, port: Option<String>) -> Result<(), BoxError> {
        let port = match port.or_else(|| self.config.connection.port.clone()) {
            Some(port) => port,
            None if self.simulate => SIMULATED_PORT.to_string(),
            None => match self.select_port().await? {
                Some(port) => port,
                None => return Ok(()),
            },
        };

        // Keep the configured feed rate across reconnects.
        let feed_rate = self.sequencer.feed_rate();
        let mut connection = hardware::connect(&port, &self.config, self.simulate).await?;
        connection.store_feed_rate(feed_rate);
        self.sequencer.connection_mut().close();
        self.sequencer = MotionSequencer::new(connection, &self.config.motion);
        println!("Connected to {}", port);
        Ok(())
    }

    async fn select_port(&mut self) -> Result<Option<String>, BoxError> {
        let ports = list_ports();
        if ports.is_empty() {
            return Ok(None);
        }
        let choice = self.prompt("Select port number: ").await?.unwrap_or_default();
        match choice.trim().parse::<usize>().ok().and_then(|n| n.checked_sub(1)).and_then(|i| ports.get(i)) {
            Some(port) => Ok(Some(port.clone())),
            None => {
                println!("Invalid selection!");
                Ok(None)
            }
        }
    }
}

/// Prints the available serial ports, numbered from 1.
pub fn list_ports() -> Vec<String> {
    let ports = serial::available_ports();
    if ports.is_empty() {
        println!("No serial ports found!");
    } else {
        println!("Available serial ports:");
        for (i, port) in ports.iter().enumerate() {
            println!("{}: {}", i + 1, port);
        }
    }
    ports
}
