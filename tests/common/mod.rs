// Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use yzscan_rs::{Connection, Link, TransactionTiming};

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

/// Link that answers each write with chunks produced by a responder closure
/// and records everything written.
pub struct ScriptedLink {
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    pending: VecDeque<Vec<u8>>,
    responder: Responder,
}

impl ScriptedLink {
    pub fn new(responder: impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let link = Self {
            written: written.clone(),
            pending: VecDeque::new(),
            responder: Box::new(responder),
        };
        (link, written)
    }

    /// Never answers anything.
    pub fn silent() -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
        Self::new(|_| vec![])
    }
}

#[async_trait]
impl Link for ScriptedLink {
    async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.written.lock().unwrap().push(bytes.to_vec());
        let replies = (self.responder)(bytes);
        self.pending.extend(replies);
        Ok(())
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    async fn read_available(&mut self, buf: &mut [u8], wait: Duration) -> std::io::Result<usize> {
        match self.pending.pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.pending.push_front(chunk[n..].to_vec());
                }
                Ok(n)
            }
            None => {
                tokio::time::sleep(wait).await;
                Ok(0)
            }
        }
    }
}

pub fn chunks(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

pub fn open_connection<L: Link>(link: L) -> Connection<L> {
    let mut connection = Connection::new("test", 115200, 1000.0, TransactionTiming::default());
    connection.attach(link);
    connection
}

pub fn written_text(written: &Arc<Mutex<Vec<Vec<u8>>>>) -> Vec<String> {
    written
        .lock()
        .unwrap()
        .iter()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .collect()
}
