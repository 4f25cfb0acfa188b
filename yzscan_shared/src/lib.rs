// yzscan_shared: shared traits and types for the host driver, simulator and tests

pub mod config;
pub mod serial_interface;

use std::fmt;
use std::str::FromStr;

/// Machine position in millimetres. The firmware reports X as well, but this
/// machine has no X axis so it is never carried.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(y: f64, z: f64) -> Self {
        Self { y, z }
    }

    /// Exact match when `tolerance` is zero.
    pub fn matches(&self, target: &Position, tolerance: f64) -> bool {
        if tolerance <= 0.0 {
            self.y == target.y && self.z == target.z
        } else {
            (self.y - target.y).abs() <= tolerance && (self.z - target.z).abs() <= tolerance
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Y={:.3} Z={:.3}", self.y, self.z)
    }
}

/// A single movable axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Y,
    Z,
}

impl Axis {
    pub fn letter(&self) -> char {
        match self {
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "Y" => Ok(Axis::Y),
            "Z" => Ok(Axis::Z),
            other => Err(format!("unsupported axis '{}', expected Y or Z", other)),
        }
    }
}

/// Axis selection for a homing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HomeAxes {
    Y,
    Z,
    #[default]
    YZ,
}

impl HomeAxes {
    /// Firmware homing command for this selection.
    pub fn command(&self) -> &'static str {
        match self {
            HomeAxes::Y => "$HY",
            HomeAxes::Z => "$HZ",
            HomeAxes::YZ => "$H",
        }
    }
}

impl FromStr for HomeAxes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "Y" => Ok(HomeAxes::Y),
            "Z" => Ok(HomeAxes::Z),
            "YZ" | "ZY" => Ok(HomeAxes::YZ),
            other => Err(format!("unsupported home axes '{}', expected Y, Z or YZ", other)),
        }
    }
}
