//! Bounded stderr capture
//!
//! The child's stderr is forwarded to the terminal and copied into a
//! `TailBuffer` that keeps only the most recent bytes.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Capacity of the captured stderr tail
pub const STDERR_TAIL_LIMIT: usize = 64 * 1024;

/// Thread-safe buffer retaining the last `limit` bytes written to it
#[derive(Debug, Clone)]
pub struct TailBuffer {
    limit: usize,
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TailBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            buf: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append bytes, trimming from the front to stay within the limit.
    ///
    /// A write at or above the limit replaces the buffer with its own tail.
    pub fn push(&self, data: &[u8]) {
        let mut buf = self.lock();
        if data.len() >= self.limit {
            buf.clear();
            buf.extend_from_slice(&data[data.len() - self.limit..]);
            return;
        }
        buf.extend_from_slice(data);
        if buf.len() > self.limit {
            let excess = buf.len() - self.limit;
            buf.drain(..excess);
        }
    }

    /// Copy of the retained bytes
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // plain bytes: a panic mid-write cannot leave them in an invalid state
        self.buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Write for TailBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.push(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes everything to a primary sink and a tail buffer
pub struct TeeWriter<W: Write> {
    primary: W,
    tail: TailBuffer,
}

impl<W: Write> TeeWriter<W> {
    pub fn new(primary: W, tail: TailBuffer) -> Self {
        Self { primary, tail }
    }
}

impl<W: Write> Write for TeeWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.tail.push(data);
        // the terminal may be gone; the captured tail is what we report
        if let Err(e) = self.primary.write_all(data) {
            tracing::trace!("stderr forward failed: {}", e);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()
    }
}
