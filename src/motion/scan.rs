// src/motion/scan.rs - Composite home-and-scan routine
use std::fmt;
use std::time::Duration;
use yzscan_shared::config::ScanConfig;
use yzscan_shared::serial_interface::Link;
use yzscan_shared::{Axis, HomeAxes, Position};

use super::sequencer::{MotionSequencer, PositionWait};
use crate::hardware::{MachineError, TransactionResult};

/// Parameters of the capture pass handed to the trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPass {
    pub from_y: f64,
    pub to_y: f64,
    pub feed_rate: f64,
}

/// Notified once the slow scan move has been issued. Fire-and-continue: the
/// routine does not wait for any acknowledgment.
pub trait CaptureTrigger: Send {
    fn trigger(&mut self, pass: &ScanPass);
}

/// Capture trigger that only logs.
#[derive(Debug, Default)]
pub struct LogCapture;

impl CaptureTrigger for LogCapture {
    fn trigger(&mut self, pass: &ScanPass) {
        tracing::info!(
            "Capture start: Y {} -> {} at {} mm/min",
            pass.from_y,
            pass.to_y,
            pass.feed_rate
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    SoftReset,
    Home,
    AwaitHome,
    SetTravelFeed,
    ApproachMove,
    AwaitApproach,
    SetScanFeed,
    ScanMove,
    AwaitFar,
    RestoreTravelFeed,
    ReturnMove,
    AwaitReturn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Accepted(String),
    Rejected(String),
    TimedOut(String),
    FeedRate(f64),
    Reached(Position),
    DeadlineElapsed,
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            StepOutcome::Accepted(_) | StepOutcome::FeedRate(_) | StepOutcome::Reached(_)
        )
    }
}

impl From<TransactionResult> for StepOutcome {
    fn from(result: TransactionResult) -> Self {
        match result {
            TransactionResult::Ok(text) => StepOutcome::Accepted(text),
            TransactionResult::Error(text) => StepOutcome::Rejected(text),
            TransactionResult::Timeout(text) => StepOutcome::TimedOut(text),
        }
    }
}

impl From<PositionWait> for StepOutcome {
    fn from(wait: PositionWait) -> Self {
        match wait {
            PositionWait::Reached(status) => StepOutcome::Reached(status.position),
            PositionWait::DeadlineElapsed(_) => StepOutcome::DeadlineElapsed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub steps: Vec<(ScanStep, StepOutcome)>,
}

impl ScanReport {
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|(_, outcome)| outcome.succeeded())
    }

    pub fn outcome(&self, step: ScanStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, o)| o)
    }

    fn record(&mut self, step: ScanStep, outcome: StepOutcome) {
        if outcome.succeeded() {
            tracing::debug!("{:?}: {:?}", step, outcome);
        } else {
            tracing::warn!("{:?} did not complete ({:?}); continuing", step, outcome);
        }
        self.steps.push((step, outcome));
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (step, outcome) in &self.steps {
            writeln!(f, "{:<18} {:?}", format!("{:?}", step), outcome)?;
        }
        Ok(())
    }
}

/// Soft reset, home, travel to the approach position, scan slowly to the far
/// position while the capture runs, and travel back.
///
/// Each motion step is followed by a position wait. Timeouts and controller
/// errors are recorded and the routine carries on with the next step; only a
/// lost connection or I/O failure aborts it.
pub async fn run_scan<L: Link, C: CaptureTrigger>(
    sequencer: &mut MotionSequencer<L>,
    config: &ScanConfig,
    capture: &mut C,
) -> Result<ScanReport, MachineError> {
    let home = Position::new(0.0, 0.0);
    let approach = Position::new(config.approach_y, home.z);
    let far = Position::new(config.far_y, home.z);
    let move_deadline = config.move_timeout();
    let mut report = ScanReport::default();

    tracing::info!(
        "Starting scan: approach Y={} far Y={} travel {} mm/min scan {} mm/min",
        config.approach_y,
        config.far_y,
        config.travel_feed_rate,
        config.scan_feed_rate
    );

    let reset = sequencer.soft_reset().await?;
    report.record(ScanStep::SoftReset, reset.into());

    let homing = sequencer.home(HomeAxes::YZ).await?;
    report.record(ScanStep::Home, homing.into());
    let wait = sequencer.await_position(home, config.home_timeout()).await?;
    report.record(ScanStep::AwaitHome, wait.into());

    set_feed(sequencer, &mut report, ScanStep::SetTravelFeed, config.travel_feed_rate)?;
    let moved = sequencer.move_axis(Axis::Y, approach.y, false).await?;
    report.record(ScanStep::ApproachMove, moved.into());
    await_step(sequencer, &mut report, ScanStep::AwaitApproach, approach, move_deadline).await?;

    set_feed(sequencer, &mut report, ScanStep::SetScanFeed, config.scan_feed_rate)?;
    let moved = sequencer.move_axis(Axis::Y, far.y, false).await?;
    capture.trigger(&ScanPass {
        from_y: approach.y,
        to_y: far.y,
        feed_rate: sequencer.feed_rate(),
    });
    report.record(ScanStep::ScanMove, moved.into());
    await_step(sequencer, &mut report, ScanStep::AwaitFar, far, move_deadline).await?;

    set_feed(sequencer, &mut report, ScanStep::RestoreTravelFeed, config.travel_feed_rate)?;
    let moved = sequencer.move_axis(Axis::Y, approach.y, false).await?;
    report.record(ScanStep::ReturnMove, moved.into());
    await_step(sequencer, &mut report, ScanStep::AwaitReturn, approach, move_deadline).await?;

    if report.all_succeeded() {
        tracing::info!("Scan complete");
    } else {
        tracing::warn!("Scan finished with incomplete steps");
    }
    Ok(report)
}

/// Runs [`run_scan`] until `interrupt` resolves. An interrupted scan is
/// dropped between polls and a feed hold is sent; that case returns `Ok(None)`.
pub async fn run_scan_until<L, C, F>(
    sequencer: &mut MotionSequencer<L>,
    config: &ScanConfig,
    capture: &mut C,
    interrupt: F,
) -> Result<Option<ScanReport>, MachineError>
where
    L: Link,
    C: CaptureTrigger,
    F: Future<Output = ()>,
{
    let outcome = tokio::select! {
        report = run_scan(sequencer, config, capture) => Some(report),
        _ = interrupt => None,
    };
    match outcome {
        Some(report) => report.map(Some),
        None => {
            tracing::warn!("Scan interrupted, holding feed");
            sequencer.feed_hold().await?;
            Ok(None)
        }
    }
}

fn set_feed<L: Link>(
    sequencer: &mut MotionSequencer<L>,
    report: &mut ScanReport,
    step: ScanStep,
    rate: f64,
) -> Result<(), MachineError> {
    let rate = sequencer.apply_feed_rate(rate)?;
    report.record(step, StepOutcome::FeedRate(rate));
    Ok(())
}

async fn await_step<L: Link>(
    sequencer: &mut MotionSequencer<L>,
    report: &mut ScanReport,
    step: ScanStep,
    target: Position,
    deadline: Duration,
) -> Result<(), MachineError> {
    let wait = sequencer.await_position(target, deadline).await?;
    report.record(step, wait.into());
    Ok(())
}
