//! Realtime status frame parsing.
//!
//! The controller answers the `?` query with a frame such as
//! `<Idle|MPos:0.000,10.000,5.000|FS:0,0>`. Only the state label and the
//! machine position are consumed. The firmware reports three axes; the first
//! (X) does not exist on this machine and is skipped.

use yzscan_shared::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct MachineStatus {
    /// Free-text state label, e.g. `Idle`, `Run`, `Hold:0`, `Alarm`.
    pub state: String,
    pub position: Position,
}

impl MachineStatus {
    pub fn is_idle(&self) -> bool {
        self.state.eq_ignore_ascii_case("idle")
    }

    pub fn is_alarm(&self) -> bool {
        self.state.to_ascii_lowercase().starts_with("alarm")
    }
}

/// Parses the first status frame found in `text`.
///
/// Returns `None` when no closed frame is present, the `MPos:` field is
/// missing, or a coordinate is not numeric. Absence means "status unknown".
pub fn parse_status(text: &str) -> Option<MachineStatus> {
    let start = text.find('<')?;
    let len = text[start + 1..].find('>')?;
    let frame = &text[start + 1..start + 1 + len];

    let mut fields = frame.split('|');
    let state = fields.next()?.trim().to_string();
    let mpos = fields.find_map(|field| field.trim().strip_prefix("MPos:"))?;

    let mut axes = mpos.split(',').skip(1);
    let y = axes.next()?.trim().parse::<f64>().ok()?;
    let z = axes.next()?.trim().parse::<f64>().ok()?;

    Some(MachineStatus {
        state,
        position: Position::new(y, z),
    })
}
