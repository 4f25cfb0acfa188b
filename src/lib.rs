// yzscan-rs: host-side driver for a two-axis (Y/Z) scanning rig on grblHAL
pub mod config;
pub mod console;
pub mod hardware;
pub mod motion;
pub mod telemetry;

pub use hardware::{Command, Connection, MachineError, RealtimeCommand, TransactionResult, TransactionTiming};
pub use motion::{MotionSequencer, PositionWait};
pub use telemetry::{MachineStatus, parse_status};
pub use yzscan_shared::serial_interface::Link;
pub use yzscan_shared::{Axis, HomeAxes, Position};
