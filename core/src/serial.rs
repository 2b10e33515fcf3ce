//! [`Link`] over a serial character device, 8N1 without flow control.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::info;

use crate::error::{Result, SentinelError};
use crate::link::Link;

/// Baud rate of the unit's download port.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Reads return empty after this long so the protocol loops can poll.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(device: &str, baud_rate: u32) -> Result<Self> {
        check_device(device)?;

        let port = serialport::new(device, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| SentinelError::LinkUnavailable {
                device: device.to_string(),
                reason: e.to_string(),
            })?;

        info!(device, baud_rate, "serial device opened");
        Ok(Self { port })
    }
}

impl Link for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.port.write(buf)?;
        self.port.flush()?;
        Ok(n)
    }
}

fn check_device(device: &str) -> Result<()> {
    let unavailable = |reason: String| SentinelError::LinkUnavailable {
        device: device.to_string(),
        reason,
    };

    let meta = std::fs::metadata(device).map_err(|e| unavailable(e.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if !meta.file_type().is_char_device() {
            return Err(unavailable("not a character device".to_string()));
        }
    }
    #[cfg(not(unix))]
    let _ = meta;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device() {
        let result = SerialLink::open("/nonexistent/ttyUSB9", DEFAULT_BAUD_RATE);
        assert!(matches!(
            result,
            Err(SentinelError::LinkUnavailable { ref device, .. }) if device == "/nonexistent/ttyUSB9"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_regular_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let result = SerialLink::open(path, DEFAULT_BAUD_RATE);
        assert!(matches!(
            result,
            Err(SentinelError::LinkUnavailable { ref reason, .. }) if reason == "not a character device"
        ));
    }
}
