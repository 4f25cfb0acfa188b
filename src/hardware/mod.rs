// src/hardware/mod.rs - Connection state and hardware error taxonomy
pub mod serial;
pub mod sim;
pub mod transaction;

use std::time::Duration;
use thiserror::Error;
use yzscan_shared::config::Config;
use yzscan_shared::serial_interface::Link;

pub use transaction::{Command, RealtimeCommand, TransactionResult};

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("Not connected to controller")]
    NotConnected,
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid axis: {0}")]
    InvalidAxis(String),
    #[error("Invalid feed rate: {0}")]
    InvalidFeedRate(String),
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

/// Timing used by the transaction engine.
#[derive(Debug, Clone, Copy)]
pub struct TransactionTiming {
    /// Overall deadline from write to classification.
    pub timeout: Duration,
    /// Idle wait between polls for incoming bytes.
    pub poll_interval: Duration,
}

impl Default for TransactionTiming {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Transaction statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub commands_sent: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub ok: u64,
    pub errors: u64,
    pub timeouts: u64,
}

/// An open or closed link to the controller plus the process-side feed rate.
///
/// The feed rate is independent of whatever feed the firmware has latched; it
/// is attached to every feed move this process issues.
pub struct Connection<L: Link> {
    link: Option<L>,
    port: String,
    baud: u32,
    feed_rate: f64,
    timing: TransactionTiming,
    stats: TransactionStats,
}

impl<L: Link> Connection<L> {
    /// A closed connection.
    pub fn new(port: impl Into<String>, baud: u32, feed_rate: f64, timing: TransactionTiming) -> Self {
        Self {
            link: None,
            port: port.into(),
            baud,
            feed_rate,
            timing,
            stats: TransactionStats::default(),
        }
    }

    pub fn from_config(port: impl Into<String>, config: &Config) -> Self {
        Self::new(
            port,
            config.connection.baud,
            config.motion.default_feed_rate,
            TransactionTiming {
                timeout: config.transaction.timeout(),
                poll_interval: config.transaction.poll_interval(),
            },
        )
    }

    /// Opens the connection over an already established link.
    pub fn attach(&mut self, link: L) {
        if self.link.is_some() {
            tracing::warn!("Replacing open link to {}", self.port);
        }
        self.link = Some(link);
        tracing::info!("Connected to controller on {} at {} baud", self.port, self.baud);
    }

    /// Closes the link. Returns false when it was already closed.
    pub fn close(&mut self) -> bool {
        match self.link.take() {
            Some(_) => {
                tracing::info!("Disconnected from controller on {}", self.port);
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn feed_rate(&self) -> f64 {
        self.feed_rate
    }

    pub(crate) fn store_feed_rate(&mut self, rate: f64) {
        self.feed_rate = rate;
    }

    pub fn timing(&self) -> TransactionTiming {
        self.timing
    }

    pub fn stats(&self) -> &TransactionStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut TransactionStats {
        &mut self.stats
    }

    pub fn link(&self) -> Option<&L> {
        self.link.as_ref()
    }

    pub(crate) fn link_mut(&mut self) -> Result<&mut L, MachineError> {
        self.link.as_mut().ok_or(MachineError::NotConnected)
    }
}

impl<L: Link> std::fmt::Debug for Connection<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("port", &self.port)
            .field("baud", &self.baud)
            .field("open", &self.is_open())
            .field("feed_rate", &self.feed_rate)
            .finish()
    }
}

/// Port name that selects the in-process simulated controller.
pub const SIMULATED_PORT: &str = "sim";

/// Opens a link to `port`, or to a [`sim::SimulatedController`] when
/// `simulate` is set, and probes it with one status query.
pub async fn connect(
    port: &str,
    config: &Config,
    simulate: bool,
) -> Result<Connection<Box<dyn Link>>, MachineError> {
    let link: Box<dyn Link> = if simulate {
        tracing::info!("Using simulated controller");
        Box::new(sim::SimulatedController::new(config.simulator.step_mm))
    } else {
        Box::new(serial::SerialLink::open(port, config.connection.baud, config.connection.settle()).await?)
    };
    let mut connection = Connection::from_config(port, config);
    connection.attach(link);

    match connection.execute(&Command::status_query()).await? {
        TransactionResult::Timeout(text) if text.is_empty() => {
            tracing::warn!("No response from controller on {}", port)
        }
        response => tracing::info!("Controller response: {}", response.text()),
    }
    Ok(connection)
}
