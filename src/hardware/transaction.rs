// src/hardware/transaction.rs - Command/response transaction engine
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use yzscan_shared::serial_interface::Link;

use super::{Connection, MachineError};

/// Single-byte controls acted on by the firmware immediately, outside the
/// line buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RealtimeCommand {
    StatusReport = b'?',
    FeedHold = b'!',
    CycleStart = b'~',
    SoftReset = 0x18,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Realtime(RealtimeCommand),
    Line(String),
}

impl Command {
    pub fn line(text: impl Into<String>) -> Self {
        Command::Line(text.into())
    }

    pub fn status_query() -> Self {
        Command::Realtime(RealtimeCommand::StatusReport)
    }

    /// Wire bytes. Line commands get a trailing `\n` unless already present.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Command::Realtime(rt) => vec![*rt as u8],
            Command::Line(text) => {
                let mut bytes = text.as_bytes().to_vec();
                if !text.ends_with('\n') {
                    bytes.push(b'\n');
                }
                bytes
            }
        }
    }

    /// Feed hold and cycle start are executed silently by the firmware.
    pub fn expects_reply(&self) -> bool {
        !matches!(
            self,
            Command::Realtime(RealtimeCommand::FeedHold | RealtimeCommand::CycleStart)
        )
    }

    /// Completion markers besides `ok`/`error`: the status query is answered
    /// with a bare frame and a soft reset with the startup banner.
    fn completes(&self, text: &str) -> bool {
        match self {
            Command::Realtime(RealtimeCommand::StatusReport) => has_status_frame(text),
            Command::Realtime(RealtimeCommand::SoftReset) => has_banner(text),
            _ => false,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Line(text) => write!(f, "'{}'", text.trim_end()),
            Command::Realtime(rt) => write!(f, "realtime 0x{:02x}", *rt as u8),
        }
    }
}

/// Classified outcome of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionResult {
    Ok(String),
    /// The firmware rejected the command; the text carries its error code.
    Error(String),
    /// No completion marker before the deadline; whatever arrived is kept.
    Timeout(String),
}

impl TransactionResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, TransactionResult::Ok(_))
    }

    pub fn text(&self) -> &str {
        match self {
            TransactionResult::Ok(text)
            | TransactionResult::Error(text)
            | TransactionResult::Timeout(text) => text,
        }
    }
}

impl fmt::Display for TransactionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionResult::Ok(text) => write!(f, "ok: {}", text),
            TransactionResult::Error(text) => write!(f, "error: {}", text),
            TransactionResult::Timeout(text) if text.is_empty() => write!(f, "timeout (no response)"),
            TransactionResult::Timeout(text) => write!(f, "timeout: {}", text),
        }
    }
}

/// Looks for the `ok`/`error` tokens anywhere in `text`, ignoring case.
/// When both are present the earlier one wins.
pub fn classify(text: &str) -> Option<TransactionResult> {
    let lower = text.to_ascii_lowercase();
    let ok = lower.find("ok");
    let error = lower.find("error");
    let trimmed = text.trim().to_string();
    match (ok, error) {
        (Some(o), Some(e)) if e < o => Some(TransactionResult::Error(trimmed)),
        (Some(_), _) => Some(TransactionResult::Ok(trimmed)),
        (None, Some(_)) => Some(TransactionResult::Error(trimmed)),
        (None, None) => None,
    }
}

/// True once `text` holds a closed `<...>` status frame.
fn has_status_frame(text: &str) -> bool {
    text.find('<')
        .is_some_and(|start| text[start..].contains('>'))
}

/// True once a full `Grbl...` startup line has arrived.
fn has_banner(text: &str) -> bool {
    text.to_ascii_lowercase()
        .find("grbl")
        .is_some_and(|start| text[start..].contains('\n'))
}

impl<L: Link> Connection<L> {
    /// Sends `command` and waits for a classified response using the
    /// connection's transaction timeout.
    pub async fn execute(&mut self, command: &Command) -> Result<TransactionResult, MachineError> {
        let timeout = self.timing().timeout;
        self.execute_within(command, timeout).await
    }

    /// As [`Connection::execute`] with an explicit deadline.
    ///
    /// Commands that get no reply only listen for one poll interval; silence
    /// then counts as acceptance, while an `error` in that window still
    /// classifies as a rejection.
    pub async fn execute_within(
        &mut self,
        command: &Command,
        timeout: Duration,
    ) -> Result<TransactionResult, MachineError> {
        let poll_interval = self.timing().poll_interval;
        let bytes = command.to_bytes();

        let link = self.link_mut()?;
        tracing::debug!("TX {}", command);
        link.write_all(&bytes).await?;
        link.flush().await?;

        let silent_ok = !command.expects_reply();
        let window = if silent_ok { timeout.min(poll_interval) } else { timeout };
        let start = Instant::now();
        let deadline = start + window;
        let mut accumulated = String::new();
        let mut received = 0usize;
        let mut buf = [0u8; 512];

        let result = loop {
            let now = Instant::now();
            if now >= deadline && silent_ok {
                break TransactionResult::Ok(accumulated.trim().to_string());
            }
            if now >= deadline {
                break TransactionResult::Timeout(accumulated.trim().to_string());
            }
            let wait = poll_interval.min(deadline - now);
            let n = link.read_available(&mut buf, wait).await?;
            if n == 0 {
                continue;
            }
            received += n;
            accumulated.push_str(&String::from_utf8_lossy(&buf[..n]));
            tracing::trace!("RX {} bytes, {} accumulated", n, accumulated.len());

            if command.completes(&accumulated) {
                break TransactionResult::Ok(accumulated.trim().to_string());
            }
            if let Some(result) = classify(&accumulated) {
                break result;
            }
        };

        let stats = self.stats_mut();
        stats.commands_sent += 1;
        stats.bytes_sent += bytes.len() as u64;
        stats.bytes_received += received as u64;
        match &result {
            TransactionResult::Ok(text) => {
                stats.ok += 1;
                tracing::debug!("RX {} -> {:?}", command, text);
            }
            TransactionResult::Error(text) => {
                stats.errors += 1;
                tracing::warn!("Controller rejected {}: {}", command, text);
            }
            TransactionResult::Timeout(text) => {
                stats.timeouts += 1;
                tracing::warn!(
                    "No response to {} after {}ms (partial: {:?})",
                    command,
                    start.elapsed().as_millis(),
                    text
                );
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_commands_are_newline_terminated_once() {
        assert_eq!(Command::line("$H").to_bytes(), b"$H\n".to_vec());
        assert_eq!(Command::line("G0 Y10\n").to_bytes(), b"G0 Y10\n".to_vec());
    }

    #[test]
    fn realtime_commands_are_single_bytes() {
        assert_eq!(Command::status_query().to_bytes(), vec![b'?']);
        assert_eq!(Command::Realtime(RealtimeCommand::FeedHold).to_bytes(), vec![b'!']);
        assert_eq!(Command::Realtime(RealtimeCommand::SoftReset).to_bytes(), vec![0x18]);
    }

    #[test]
    fn only_hold_and_resume_go_unanswered() {
        assert!(!Command::Realtime(RealtimeCommand::FeedHold).expects_reply());
        assert!(!Command::Realtime(RealtimeCommand::CycleStart).expects_reply());
        assert!(Command::status_query().expects_reply());
        assert!(Command::Realtime(RealtimeCommand::SoftReset).expects_reply());
        assert!(Command::line("$H").expects_reply());
    }

    #[test]
    fn classify_is_case_insensitive() {
        assert_eq!(classify("OK\r\n"), Some(TransactionResult::Ok("OK".to_string())));
        assert_eq!(classify("ERROR:9"), Some(TransactionResult::Error("ERROR:9".to_string())));
        assert_eq!(classify("[MSG:Pgm End]"), None);
    }

    #[test]
    fn classify_prefers_earliest_token() {
        assert!(classify("ok\r\nerror:2\r\n").is_some_and(|r| r.is_ok()));
        assert!(matches!(classify("error:20\r\nok\r\n"), Some(TransactionResult::Error(_))));
    }

    #[test]
    fn banner_detection() {
        assert!(has_banner("\r\nGrblHAL 1.1f ['$' or '$HELP' for help]\r\n"));
        assert!(!has_banner("\r\nGrblHAL 1.1f ['$' or"));
        assert!(!has_banner("ok\r\n"));
    }

    #[test]
    fn status_frame_detection() {
        assert!(has_status_frame("junk\r\n<Idle|MPos:0,0,0>"));
        assert!(!has_status_frame("<Idle|MPos:0,0"));
        assert!(!has_status_frame("> <"));
    }
}
