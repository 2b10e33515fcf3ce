use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::link::{Link, Sleeper};

#[derive(Clone, Debug)]
enum ReadStep {
    Data(Vec<u8>),
    Fail,
}

/// Scripted link: each queued chunk is served by successive reads, an empty
/// chunk models a poll with no data, and an exhausted script reads as silence.
#[derive(Clone, Debug, Default)]
pub struct MockLink {
    reads: VecDeque<ReadStep>,
    written: Vec<u8>,
    write_calls: usize,
    write_limit: Option<usize>,
    fail_writes_after: Option<usize>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_read(mut self, chunk: &[u8]) -> Self {
        self.reads.push_back(ReadStep::Data(chunk.to_vec()));
        self
    }

    pub fn then_fail_read(mut self) -> Self {
        self.reads.push_back(ReadStep::Fail);
        self
    }

    /// Accept at most `limit` bytes per write call.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Fail every write once `bytes` bytes have been accepted.
    pub fn fail_writes_after(mut self, bytes: usize) -> Self {
        self.fail_writes_after = Some(bytes);
        self
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    pub fn is_drained(&self) -> bool {
        self.reads.is_empty()
    }
}

impl Link for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reads.pop_front() {
            None => Ok(0),
            Some(ReadStep::Fail) => Err(io::Error::other("mock read failure")),
            Some(ReadStep::Data(chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.reads.push_front(ReadStep::Data(chunk[n..].to_vec()));
                }
                Ok(n)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_calls += 1;
        if let Some(limit) = self.fail_writes_after {
            if self.written.len() >= limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
            }
        }

        let n = self.write_limit.map_or(buf.len(), |l| l.min(buf.len()));
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

/// Records requested sleeps instead of sleeping.
#[derive(Clone, Debug, Default)]
pub struct NoSleep {
    pub naps: Vec<Duration>,
}

impl Sleeper for NoSleep {
    fn sleep(&mut self, duration: Duration) {
        self.naps.push(duration);
    }
}
