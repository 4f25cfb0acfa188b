// src/hardware/sim.rs - In-process stand-in for the motion controller
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use yzscan_shared::serial_interface::Link;
use yzscan_shared::{Axis, Position};

const BANNER: &str = "\r\nGrblHAL 1.1f ['$' or '$HELP' for help]\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimState {
    Idle,
    Run,
    Home,
    Hold,
}

impl SimState {
    fn label(&self) -> &'static str {
        match self {
            SimState::Idle => "Idle",
            SimState::Run => "Run",
            SimState::Home => "Home",
            SimState::Hold => "Hold:0",
        }
    }
}

/// Emulates the subset of the firmware this host talks to: homing and
/// single-axis moves answered with `ok`, status frames on `?`, feed hold,
/// cycle start and soft reset. Motion advances `step_mm` per status query
/// and always lands exactly on the commanded target.
#[derive(Debug)]
pub struct SimulatedController {
    position: Position,
    target: Position,
    state: SimState,
    held_from: SimState,
    step_mm: f64,
    line: String,
    output: VecDeque<u8>,
    lines_received: Vec<String>,
}

impl SimulatedController {
    pub fn new(step_mm: f64) -> Self {
        Self::with_position(step_mm, Position::default())
    }

    pub fn with_position(step_mm: f64, position: Position) -> Self {
        Self {
            position,
            target: position,
            state: SimState::Idle,
            held_from: SimState::Idle,
            step_mm,
            line: String::new(),
            output: VecDeque::new(),
            lines_received: Vec::new(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Every line command received so far, without terminators.
    pub fn lines_received(&self) -> &[String] {
        &self.lines_received
    }

    fn reply(&mut self, text: &str) {
        self.output.extend(text.as_bytes());
    }

    fn handle_byte(&mut self, byte: u8) {
        match byte {
            b'?' => {
                self.advance();
                let frame = format!(
                    "<{}|MPos:0.000,{:.3},{:.3}|FS:0,0>\r\n",
                    self.state.label(),
                    self.position.y,
                    self.position.z
                );
                self.reply(&frame);
            }
            b'!' => {
                if self.state != SimState::Hold {
                    self.held_from = self.state;
                    self.state = SimState::Hold;
                }
            }
            b'~' => {
                if self.state == SimState::Hold {
                    self.state = self.held_from;
                }
            }
            0x18 => {
                self.target = self.position;
                self.state = SimState::Idle;
                self.line.clear();
                self.reply(BANNER);
            }
            b'\n' => {
                let line = std::mem::take(&mut self.line);
                self.handle_line(line.trim());
            }
            b'\r' => {}
            other => self.line.push(other as char),
        }
    }

    fn handle_line(&mut self, line: &str) {
        tracing::debug!("Simulator RX line: {}", line);
        self.lines_received.push(line.to_string());
        let upper = line.to_ascii_uppercase();
        let reply = match upper.as_str() {
            "" | "$X" => "ok\r\n",
            "$H" => {
                self.start_motion(Position::new(0.0, 0.0), SimState::Home);
                "ok\r\n"
            }
            "$HY" => {
                self.start_motion(Position::new(0.0, self.target.z), SimState::Home);
                "ok\r\n"
            }
            "$HZ" => {
                self.start_motion(Position::new(self.target.y, 0.0), SimState::Home);
                "ok\r\n"
            }
            _ => match self.parse_move(&upper) {
                Some(Some(target)) => {
                    self.start_motion(target, SimState::Run);
                    "ok\r\n"
                }
                // Malformed number
                Some(None) => "error:2\r\n",
                None => "error:20\r\n",
            },
        };
        self.reply(reply);
    }

    /// `None` when the line is not a G0/G1 move, `Some(None)` when it is but a
    /// word value does not parse.
    fn parse_move(&self, line: &str) -> Option<Option<Position>> {
        let mut words = line.split_whitespace();
        match words.next()? {
            "G0" | "G00" | "G1" | "G01" => {}
            _ => return None,
        }
        let mut target = self.target;
        for word in words {
            let mut chars = word.chars();
            let letter = chars.next()?;
            let value = chars.as_str();
            let axis = match letter {
                'Y' => Axis::Y,
                'Z' => Axis::Z,
                'F' => {
                    if value.parse::<f64>().is_err() {
                        return Some(None);
                    }
                    continue;
                }
                _ => return None,
            };
            let Ok(value) = value.parse::<f64>() else {
                return Some(None);
            };
            match axis {
                Axis::Y => target.y = value,
                Axis::Z => target.z = value,
            }
        }
        Some(Some(target))
    }

    fn start_motion(&mut self, target: Position, state: SimState) {
        self.target = target;
        if self.position != target {
            self.state = state;
        }
    }

    fn advance(&mut self) {
        if matches!(self.state, SimState::Hold | SimState::Idle) {
            return;
        }
        self.position.y = step_towards(self.position.y, self.target.y, self.step_mm);
        self.position.z = step_towards(self.position.z, self.target.z, self.step_mm);
        if self.position == self.target {
            self.state = SimState::Idle;
        }
    }
}

fn step_towards(current: f64, target: f64, step: f64) -> f64 {
    let remaining = target - current;
    if remaining.abs() <= step {
        target
    } else {
        current + step * remaining.signum()
    }
}

#[async_trait]
impl Link for SimulatedController {
    async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        for &byte in bytes {
            self.handle_byte(byte);
        }
        Ok(())
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    async fn read_available(&mut self, buf: &mut [u8], wait: Duration) -> std::io::Result<usize> {
        if self.output.is_empty() {
            tokio::time::sleep(wait).await;
            return Ok(0);
        }
        let n = buf.len().min(self.output.len());
        for (slot, byte) in buf.iter_mut().zip(self.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(sim: &mut SimulatedController) -> String {
        String::from_utf8(sim.output.drain(..).collect()).unwrap()
    }

    #[test]
    fn moves_land_exactly_on_target() {
        let mut sim = SimulatedController::new(30.0);
        for &b in b"G1 Y80 F2000\n" {
            sim.handle_byte(b);
        }
        assert_eq!(drain(&mut sim), "ok\r\n");
        sim.handle_byte(b'?');
        assert!(drain(&mut sim).starts_with("<Run|MPos:0.000,30.000,0.000|"));
        sim.handle_byte(b'?');
        sim.handle_byte(b'?');
        assert_eq!(sim.position(), Position::new(80.0, 0.0));
        assert!(drain(&mut sim).contains("<Idle|MPos:0.000,80.000,0.000|"));
    }

    #[test]
    fn unsupported_and_malformed_lines_are_rejected() {
        let mut sim = SimulatedController::new(10.0);
        sim.handle_line("M3 S1000");
        assert_eq!(drain(&mut sim), "error:20\r\n");
        sim.handle_line("G0 Yabc");
        assert_eq!(drain(&mut sim), "error:2\r\n");
    }

    #[test]
    fn feed_hold_freezes_motion_until_cycle_start() {
        let mut sim = SimulatedController::with_position(10.0, Position::new(50.0, 5.0));
        sim.handle_line("$H");
        sim.handle_byte(b'!');
        sim.handle_byte(b'?');
        assert_eq!(sim.position(), Position::new(50.0, 5.0));
        assert!(drain(&mut sim).contains("<Hold:0|"));
        sim.handle_byte(b'~');
        sim.handle_byte(b'?');
        assert_eq!(sim.position(), Position::new(40.0, 0.0));
    }

    #[test]
    fn soft_reset_stops_motion_and_prints_banner() {
        let mut sim = SimulatedController::new(10.0);
        sim.handle_line("G0 Z40");
        drain(&mut sim);
        sim.handle_byte(b'?');
        sim.handle_byte(0x18);
        let out = drain(&mut sim);
        assert!(out.contains("GrblHAL"));
        sim.handle_byte(b'?');
        assert_eq!(sim.position(), Position::new(0.0, 10.0));
        assert!(drain(&mut sim).contains("<Idle|"));
    }
}
