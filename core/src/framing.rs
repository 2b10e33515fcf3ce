//! Response framing over a stream with no length prefix.
//!
//! A response is recognized by a start marker and closed by an end marker; the
//! bytes in between are the payload. The reader is a byte-fed state machine so
//! that the polling driver stays a thin loop over the link.

use tracing::{debug, info, warn};

use crate::error::{Result, SentinelError};
use crate::link::{
    read_link, Link, LinkTiming, Sleeper, FILLER_BYTE, LISTING_END, PROFILE_END, RECORD_START,
    WAIT_MARKER,
};

/// Markers delimiting one kind of response.
///
/// The first `end_kept` bytes of the end marker stay in the payload. When the
/// payload is empty those bytes may be absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSpec {
    pub start: &'static [u8],
    pub end: &'static [u8],
    pub end_kept: usize,
}

impl FrameSpec {
    fn bare_end(&self) -> &'static [u8] {
        &self.end[self.end_kept..]
    }
}

/// Header listing: ends when the unit goes back to waiting at a line start.
pub const LISTING_FRAME: FrameSpec = FrameSpec {
    start: RECORD_START,
    end: LISTING_END,
    end_kept: 2,
};

/// Full dive download.
pub const PROFILE_FRAME: FrameSpec = FrameSpec {
    start: RECORD_START,
    end: PROFILE_END,
    end_kept: 0,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    AwaitingStart,
    Accumulating,
    Done,
}

/// Byte-at-a-time frame recognizer.
#[derive(Debug)]
pub struct FrameReader {
    spec: FrameSpec,
    state: FrameState,
    window: Vec<u8>,
    payload: Vec<u8>,
    noise_run: usize,
    noise_min_bytes: usize,
}

impl FrameReader {
    pub fn new(spec: FrameSpec, noise_run: usize, noise_min_bytes: usize) -> Self {
        Self {
            spec,
            state: FrameState::AwaitingStart,
            window: Vec::with_capacity(spec.start.len()),
            payload: Vec::new(),
            noise_run,
            noise_min_bytes,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Payload so far. Once the frame is done only the kept part of the end marker remains.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn feed(&mut self, byte: u8) -> Result<FrameState> {
        match self.state {
            FrameState::AwaitingStart => {
                if self.window.len() == self.spec.start.len() {
                    self.window.remove(0);
                }
                self.window.push(byte);

                if self.window == self.spec.start {
                    debug!("start marker found");
                    self.state = FrameState::Accumulating;
                }
            }
            FrameState::Accumulating => {
                self.payload.push(byte);

                if self.payload.ends_with(self.spec.end) {
                    let dropped = self.spec.bare_end().len();
                    self.payload.truncate(self.payload.len() - dropped);
                    debug!(bytes = self.payload.len(), "end marker found");
                    self.state = FrameState::Done;
                } else if self.payload == self.spec.bare_end() {
                    self.payload.clear();
                    debug!("empty response");
                    self.state = FrameState::Done;
                } else {
                    self.check_noise()?;
                }
            }
            FrameState::Done => {}
        }

        Ok(self.state)
    }

    fn check_noise(&self) -> Result<()> {
        let len = self.payload.len();
        if self.noise_run == 0 || len < self.noise_min_bytes || len < self.noise_run {
            return Ok(());
        }

        let tail = &self.payload[len - self.noise_run..];
        for noise in [WAIT_MARKER, FILLER_BYTE] {
            if tail.iter().all(|&b| b == noise) {
                return Err(SentinelError::ProtocolNoise {
                    byte: noise,
                    accumulated: len,
                });
            }
        }

        Ok(())
    }
}

/// Poll the link until a complete frame has been read and return its payload
/// without the end marker.
///
/// Before the first byte arrives at most `start_poll_cycles` empty polls are made;
/// afterwards at most `max_idle_polls` consecutive empty polls. At most
/// `max_preamble_bytes` bytes are skipped looking for the start marker. Running out
/// of any of these is a [`SentinelError::DeviceTimeout`].
pub fn read_frame<L, S>(
    link: &mut L,
    sleeper: &mut S,
    spec: FrameSpec,
    timing: &LinkTiming,
) -> Result<Vec<u8>>
where
    L: Link + ?Sized,
    S: Sleeper + ?Sized,
{
    let mut reader = FrameReader::new(spec, timing.noise_run, timing.noise_min_bytes);
    let mut byte = [0u8; 1];
    let mut seen_data = false;
    let mut idle_polls = 0u32;
    let mut preamble = 0u32;

    loop {
        if read_link(link, &mut byte)? == 0 {
            idle_polls += 1;
            let limit = if seen_data {
                timing.max_idle_polls
            } else {
                timing.start_poll_cycles
            };
            if idle_polls >= limit {
                return Err(SentinelError::DeviceTimeout { polls: idle_polls });
            }
            if !seen_data {
                debug!(poll = idle_polls, "waiting for data from device");
            }
            sleeper.sleep(timing.poll_interval);
            continue;
        }

        seen_data = true;
        idle_polls = 0;

        match reader.feed(byte[0])? {
            FrameState::Done => {
                let payload = reader.into_payload();
                info!(bytes = payload.len(), "response received");
                return Ok(payload);
            }
            FrameState::AwaitingStart => {
                preamble += 1;
                if preamble >= timing.max_preamble_bytes {
                    warn!(skipped = preamble, "no start marker from device");
                    return Err(SentinelError::DeviceTimeout { polls: preamble });
                }
            }
            FrameState::Accumulating => {}
        }

        if !timing.read_interval.is_zero() {
            sleeper.sleep(timing.read_interval);
        }
    }
}
