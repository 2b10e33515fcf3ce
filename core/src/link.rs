//! The serial link seam: the transport trait, polling clock, and the two
//! primitives every exchange starts with (idle handshake and command write).

use std::io;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, SentinelError};

/// Byte the unit repeats while it waits for a command.
pub const WAIT_MARKER: u8 = b'P';
/// Lists the dive headers.
pub const LIST_COMMAND: &[u8] = b"M";
/// Starts every header record.
pub const RECORD_START: &[u8] = b"d\r\n";
/// Separates lines inside a payload.
pub const LINE_SEPARATOR: &str = "\r\n";
/// Ends a dive listing: the unit falls back to waiting at the start of a line.
pub const LISTING_END: &[u8] = b"\r\nP";
/// Ends a dive download.
pub const PROFILE_END: &[u8] = b"End\r\n";
/// Filler the unit emits when it has nothing to send.
pub const FILLER_BYTE: u8 = 0xFF;

/// Number of consecutive wait markers that mean "idle".
const IDLE_RUN: usize = 3;

/// A half-duplex byte link to the unit.
///
/// Reads must not block indefinitely: returning `Ok(0)` means "nothing this poll".
pub trait Link {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// Suspension point between polls, replaceable in tests.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retry budgets and poll intervals for one exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkTiming {
    pub idle_tries: u32,
    pub idle_poll: Duration,
    /// Empty polls allowed before the first response byte.
    pub start_poll_cycles: u32,
    pub poll_interval: Duration,
    /// Pause after every byte read.
    pub read_interval: Duration,
    /// Consecutive empty polls allowed once the response has started.
    pub max_idle_polls: u32,
    /// Bytes discarded while looking for the start marker.
    pub max_preamble_bytes: u32,
    /// Length of a run of wait/filler bytes treated as noise.
    pub noise_run: usize,
    /// Payload size below which noise is not checked.
    pub noise_min_bytes: usize,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            idle_tries: 10,
            idle_poll: Duration::from_millis(200),
            start_poll_cycles: 20,
            poll_interval: Duration::from_millis(200),
            read_interval: Duration::from_millis(10),
            max_idle_polls: 50,
            max_preamble_bytes: 4096,
            noise_run: 32,
            noise_min_bytes: 64,
        }
    }
}

/// Command requesting the full log of dive `index`.
pub fn dive_command(index: u32) -> Vec<u8> {
    format!("D{index}").into_bytes()
}

/// Read from the link, folding "no data yet" conditions into `Ok(0)`.
pub(crate) fn read_link<L: Link + ?Sized>(link: &mut L, buf: &mut [u8]) -> Result<usize> {
    match link.read(buf) {
        Ok(n) => Ok(n),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            ) =>
        {
            Ok(0)
        }
        Err(e) => Err(SentinelError::LinkReadFailed(e.to_string())),
    }
}

/// Wait until the unit has sent three wait markers in a row, draining anything
/// left over from an earlier exchange.
///
/// Each read that changes the last three bytes seen restarts the retry budget;
/// an empty or unchanged read uses one try.
pub fn wait_for_idle<L, S>(link: &mut L, sleeper: &mut S, timing: &LinkTiming) -> Result<()>
where
    L: Link + ?Sized,
    S: Sleeper + ?Sized,
{
    let tries = timing.idle_tries;
    let mut remaining = tries;
    let mut window = [0u8; IDLE_RUN];
    let mut chunk = [0u8; IDLE_RUN];
    let mut flushed = 0usize;

    while remaining > 0 {
        let n = read_link(link, &mut chunk)?;
        let before = window;

        for &byte in &chunk[..n] {
            window.rotate_left(1);
            window[IDLE_RUN - 1] = byte;
        }
        flushed += n;

        if window == [WAIT_MARKER; IDLE_RUN] {
            if flushed > IDLE_RUN {
                info!(flushed, "flushed device buffer");
            }
            return Ok(());
        }

        if window != before {
            remaining = tries;
        } else {
            remaining -= 1;
        }

        sleeper.sleep(timing.idle_poll);
    }

    Err(SentinelError::DeviceNotIdle { tries })
}

/// Boolean form of [`wait_for_idle`].
pub fn is_device_idle<L, S>(link: &mut L, sleeper: &mut S, timing: &LinkTiming) -> bool
where
    L: Link + ?Sized,
    S: Sleeper + ?Sized,
{
    match wait_for_idle(link, sleeper, timing) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "device not idle");
            false
        }
    }
}

/// Write the whole command, continuing after short writes.
pub fn send_command<L: Link + ?Sized>(link: &mut L, command: &[u8]) -> Result<()> {
    let mut sent = 0;

    while sent < command.len() {
        match link.write(&command[sent..]) {
            Ok(0) => {
                return Err(SentinelError::LinkWriteFailed {
                    sent,
                    expected: command.len(),
                    reason: "link accepted no bytes".to_string(),
                })
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(SentinelError::LinkWriteFailed {
                    sent,
                    expected: command.len(),
                    reason: e.to_string(),
                })
            }
        }
    }

    debug!(command = %String::from_utf8_lossy(command), "command sent");
    Ok(())
}
