use async_trait::async_trait;
use std::time::Duration;

/// Byte channel to the motion controller.
///
/// Implementations carry no timeout or retry policy of their own beyond the
/// bounded wait in [`Link::read_available`].
#[async_trait]
pub trait Link: Send {
    async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()>;
    async fn flush(&mut self) -> std::io::Result<()>;
    /// Waits at most `wait` for incoming bytes and copies whatever is
    /// available into `buf`. Returns `Ok(0)` when nothing arrived.
    async fn read_available(&mut self, buf: &mut [u8], wait: Duration) -> std::io::Result<usize>;
}

#[async_trait]
impl<T: Link + ?Sized> Link for Box<T> {
    async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        (**self).write_all(bytes).await
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        (**self).flush().await
    }

    async fn read_available(&mut self, buf: &mut [u8], wait: Duration) -> std::io::Result<usize> {
        (**self).read_available(buf, wait).await
    }
}
