// src/motion/sequencer.rs - Typed motion operations and position polling
use std::time::Duration;
use tokio::time::{Instant, sleep};
use yzscan_shared::config::MotionConfig;
use yzscan_shared::serial_interface::Link;
use yzscan_shared::{Axis, HomeAxes, Position};

use crate::hardware::{Command, Connection, MachineError, RealtimeCommand, TransactionResult};
use crate::telemetry::{MachineStatus, parse_status};

/// Result of waiting for the machine to report a target position.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionWait {
    Reached(MachineStatus),
    /// Deadline passed first. Carries the last status that could be parsed.
    DeadlineElapsed(Option<MachineStatus>),
}

impl PositionWait {
    pub fn reached(&self) -> bool {
        matches!(self, PositionWait::Reached(_))
    }
}

/// Issues motion commands one at a time over an owned [`Connection`].
///
/// The firmware acknowledges motion and homing requests before the axes move,
/// so completion is only ever established by [`MotionSequencer::await_position`].
pub struct MotionSequencer<L: Link> {
    connection: Connection<L>,
    poll_interval: Duration,
    tolerance: f64,
}

impl<L: Link> MotionSequencer<L> {
    pub fn new(connection: Connection<L>, config: &MotionConfig) -> Self {
        Self {
            connection,
            poll_interval: config.poll_interval(),
            tolerance: config.position_tolerance,
        }
    }

    pub fn connection(&self) -> &Connection<L> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection<L> {
        &mut self.connection
    }

    pub async fn home(&mut self, axes: HomeAxes) -> Result<TransactionResult, MachineError> {
        tracing::info!("Homing {:?} ({})", axes, axes.command());
        self.connection.execute(&Command::line(axes.command())).await
    }

    /// Validates and stores the feed rate used by subsequent feed moves.
    /// No traffic reaches the controller.
    pub fn set_feed_rate(&mut self, rate: &str) -> Result<f64, MachineError> {
        let value = rate
            .trim()
            .parse::<f64>()
            .map_err(|_| MachineError::InvalidFeedRate(rate.to_string()))?;
        self.apply_feed_rate(value)
    }

    pub fn apply_feed_rate(&mut self, rate: f64) -> Result<f64, MachineError> {
        if !rate.is_finite() {
            return Err(MachineError::InvalidFeedRate(rate.to_string()));
        }
        self.connection.store_feed_rate(rate);
        tracing::info!("Feed rate set to {} mm/min", rate);
        Ok(rate)
    }

    pub fn feed_rate(&self) -> f64 {
        self.connection.feed_rate()
    }

    /// `G0 <axis><target>` for rapids, `G1 <axis><target> F<feed>` otherwise.
    /// Targets are absolute; the controller is assumed to be in G90.
    pub fn motion_command(&self, axis: Axis, target: f64, rapid: bool) -> Result<Command, MachineError> {
        if !target.is_finite() {
            return Err(MachineError::InvalidTarget(target.to_string()));
        }
        let text = if rapid {
            format!("G0 {}{}", axis, target)
        } else {
            format!("G1 {}{} F{}", axis, target, self.connection.feed_rate())
        };
        Ok(Command::line(text))
    }

    pub async fn move_axis(&mut self, axis: Axis, target: f64, rapid: bool) -> Result<TransactionResult, MachineError> {
        let command = self.motion_command(axis, target, rapid)?;
        tracing::info!("Moving {} to {} ({})", axis, target, if rapid { "rapid" } else { "feed" });
        self.connection.execute(&command).await
    }

    /// As [`MotionSequencer::move_axis`] with the axis given by letter.
    /// Anything but Y or Z is refused before the wire.
    pub async fn move_named(&mut self, axis: &str, target: f64, rapid: bool) -> Result<TransactionResult, MachineError> {
        let axis = axis.parse::<Axis>().map_err(MachineError::InvalidAxis)?;
        self.move_axis(axis, target, rapid).await
    }

    /// Untyped line passthrough; the text is not validated.
    pub async fn send_line(&mut self, line: &str) -> Result<TransactionResult, MachineError> {
        self.connection.execute(&Command::line(line)).await
    }

    pub async fn feed_hold(&mut self) -> Result<TransactionResult, MachineError> {
        tracing::warn!("Feed hold requested");
        self.realtime(RealtimeCommand::FeedHold).await
    }

    pub async fn cycle_start(&mut self) -> Result<TransactionResult, MachineError> {
        self.realtime(RealtimeCommand::CycleStart).await
    }

    pub async fn soft_reset(&mut self) -> Result<TransactionResult, MachineError> {
        tracing::info!("Soft-resetting controller");
        self.realtime(RealtimeCommand::SoftReset).await
    }

    async fn realtime(&mut self, command: RealtimeCommand) -> Result<TransactionResult, MachineError> {
        self.connection.execute(&Command::Realtime(command)).await
    }

    /// Queries and parses one status frame. `Ok(None)` means status unknown.
    pub async fn status(&mut self) -> Result<Option<MachineStatus>, MachineError> {
        let result = self.connection.execute(&Command::status_query()).await?;
        Ok(parse_status(result.text()))
    }

    /// Polls status until both axes equal `target` or `deadline` elapses.
    ///
    /// Unparseable or missing frames and transaction timeouts only mean
    /// another poll; running out of time is returned, not raised.
    pub async fn await_position(&mut self, target: Position, deadline: Duration) -> Result<PositionWait, MachineError> {
        let expires = Instant::now() + deadline;
        let query = Command::status_query();
        let transaction_timeout = self.connection.timing().timeout;
        let mut last = None;

        tracing::debug!("Waiting up to {:?} for {}", deadline, target);
        loop {
            let remaining = expires.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let result = self
                .connection
                .execute_within(&query, transaction_timeout.min(remaining))
                .await?;
            match parse_status(result.text()) {
                Some(status) if status.position.matches(&target, self.tolerance) => {
                    tracing::info!("Reached {} ({})", target, status.state);
                    return Ok(PositionWait::Reached(status));
                }
                Some(status) => last = Some(status),
                None => tracing::debug!("Status unknown: {}", result),
            }

            let remaining = expires.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            sleep(self.poll_interval.min(remaining)).await;
        }

        match &last {
            Some(status) => tracing::warn!(
                "Deadline of {:?} elapsed before reaching {}; last seen {} ({})",
                deadline,
                target,
                status.position,
                status.state
            ),
            None => tracing::warn!("Deadline of {:?} elapsed before reaching {}; no status seen", deadline, target),
        }
        Ok(PositionWait::DeadlineElapsed(last))
    }
}
