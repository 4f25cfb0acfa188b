// src/motion/mod.rs - Motion sequencing over the transaction engine
pub mod scan;
pub mod sequencer;

pub use scan::{CaptureTrigger, LogCapture, ScanPass, ScanReport, ScanStep, StepOutcome, run_scan, run_scan_until};
pub use sequencer::{MotionSequencer, PositionWait};
