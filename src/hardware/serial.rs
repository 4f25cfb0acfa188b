// src/hardware/serial.rs - Serial link to the motion controller
use async_trait::async_trait;
use serial2_tokio::SerialPort;
use std::time::Duration;
use yzscan_shared::serial_interface::Link;

/// Serial communication handler for the controller connection.
pub struct SerialLink {
    port: SerialPort,
    port_name: String,
}

impl SerialLink {
    /// Opens `port_name` raw at `baud`, 8 data bits, no parity, 1 stop bit,
    /// then waits `settle` while the firmware runs its reset/boot sequence.
    pub async fn open(port_name: &str, baud: u32, settle: Duration) -> std::io::Result<Self> {
        tracing::info!("Opening {} at {} baud (8N1)", port_name, baud);
        // A plain baud rate selects raw mode with 8N1 and no flow control.
        let port = SerialPort::open(port_name, baud)?;
        if !settle.is_zero() {
            tracing::debug!("Waiting {:?} for controller to settle", settle);
            tokio::time::sleep(settle).await;
        }
        Ok(Self {
            port,
            port_name: port_name.to_string(),
        })
    }
}

#[async_trait]
impl Link for SerialLink {
    async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.port.write_all(bytes).await
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        tokio::io::AsyncWriteExt::flush(&mut self.port).await
    }

    async fn read_available(&mut self, buf: &mut [u8], wait: Duration) -> std::io::Result<usize> {
        match tokio::time::timeout(wait, self.port.read(buf)).await {
            Ok(result) => result,
            Err(_) => Ok(0),
        }
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("port_name", &self.port_name)
            .finish()
    }
}

/// Candidate serial devices, in the order the OS reports them.
pub fn available_ports() -> Vec<String> {
    match SerialPort::available_ports() {
        Ok(paths) => paths.iter().map(|p| p.display().to_string()).collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate serial ports: {}", e);
            vec![]
        }
    }
}
