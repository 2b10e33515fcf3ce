//! Command/response exchanges with the unit and their decoding into records.
//!
//! Every exchange is handshake → command → framed response → decode. Exchanges
//! are strictly sequential; a [`Session`] owns the link so two can never overlap.

use tracing::{info, warn};

use crate::error::{Result, SentinelError};
use crate::framing::{read_frame, LISTING_FRAME, PROFILE_FRAME};
use crate::header::{decode_header, decode_header_lines};
use crate::link::{
    dive_command, is_device_idle, send_command, wait_for_idle, Link, LinkTiming, Sleeper,
    ThreadSleeper, LINE_SEPARATOR, LIST_COMMAND,
};
use crate::logline::{decode_log_line, LOG_LINE_TAG};
use crate::models::{DiveHeader, DiveList, RecordFailure};
use crate::split::{append, split_tokens};

/// Separates the dives of a listing payload.
pub const RECORD_SEPARATOR: &str = "d\r\n";

/// Break a listing payload into one payload per dive.
pub fn split_records(payload: &str) -> Result<Vec<&str>> {
    split_tokens(payload, RECORD_SEPARATOR)
}

/// Decode a listing payload. Records that fail are reported next to the ones that
/// decoded instead of failing the listing.
pub fn decode_listing(payload: &str) -> Result<DiveList> {
    let mut list = DiveList::default();
    if payload.is_empty() {
        return Ok(list);
    }

    for (record, text) in split_records(payload)?.into_iter().enumerate() {
        match decode_header(text) {
            Ok(header) => {
                append(&mut list.headers, header);
            }
            Err(error) => {
                warn!(record, %error, "failed to decode dive header");
                list.failures.push(RecordFailure { record, error });
            }
        }
    }

    Ok(list)
}

/// Decode a dive download payload: header lines followed by `#`-tagged sample lines.
///
/// When the payload carries header lines the decoded header replaces `header`;
/// otherwise `header`'s recording interval is used for the samples. `header` is
/// only modified when the whole payload decodes.
pub fn decode_profile(payload: &str, header: &mut DiveHeader) -> Result<()> {
    let lines = split_tokens(payload, LINE_SEPARATOR)?;
    let (samples, header_lines): (Vec<&str>, Vec<&str>) = lines
        .into_iter()
        .partition(|line| line.starts_with(LOG_LINE_TAG));

    let mut decoded = if header_lines.is_empty() {
        header.clone()
    } else {
        decode_header_lines(&header_lines)?
    };

    let mut log = Vec::new();
    for (n, line) in samples.iter().enumerate() {
        let sample = decode_log_line(decoded.record_interval, line).map_err(|e| match e {
            SentinelError::MalformedRecord(msg) => {
                SentinelError::MalformedRecord(format!("log line {n}: {msg}"))
            }
            other => other,
        })?;
        append(&mut log, sample);
    }

    if decoded.log_lines > 0 && usize::try_from(decoded.log_lines).ok() != Some(log.len()) {
        warn!(
            declared = decoded.log_lines,
            received = log.len(),
            "log line count differs from header"
        );
    }

    decoded.log = Some(log);
    *header = decoded;
    Ok(())
}

/// List the headers of every dive stored on the unit.
pub fn list_dives<L, S>(link: &mut L, sleeper: &mut S, timing: &LinkTiming) -> Result<DiveList>
where
    L: Link + ?Sized,
    S: Sleeper + ?Sized,
{
    wait_for_idle(link, sleeper, timing)?;
    send_command(link, LIST_COMMAND)?;
    let payload = read_frame(link, sleeper, LISTING_FRAME, timing)?;

    let list = decode_listing(&String::from_utf8_lossy(&payload))?;
    info!(
        dives = list.headers.len(),
        failed = list.failures.len(),
        "dive listing decoded"
    );
    Ok(list)
}

/// Download dive `index` and attach its samples to `header`.
pub fn download_dive<L, S>(
    link: &mut L,
    sleeper: &mut S,
    timing: &LinkTiming,
    index: u32,
    header: &mut DiveHeader,
) -> Result<()>
where
    L: Link + ?Sized,
    S: Sleeper + ?Sized,
{
    wait_for_idle(link, sleeper, timing)?;
    send_command(link, &dive_command(index))?;
    let payload = read_frame(link, sleeper, PROFILE_FRAME, timing)?;

    decode_profile(&String::from_utf8_lossy(&payload), header)?;
    info!(
        index,
        samples = header.log.as_ref().map_or(0, Vec::len),
        "dive downloaded"
    );
    Ok(())
}

/// Outcome of one dive of a range download.
#[derive(Debug)]
pub struct DiveDownload {
    pub index: u32,
    pub result: Result<DiveHeader>,
}

/// Download dives `from..=to`, one exchange each. A failed dive does not stop the others.
pub fn download_range<L, S>(
    link: &mut L,
    sleeper: &mut S,
    timing: &LinkTiming,
    from: u32,
    to: u32,
) -> Result<Vec<DiveDownload>>
where
    L: Link + ?Sized,
    S: Sleeper + ?Sized,
{
    if from > to {
        return Err(SentinelError::InvalidInput(format!(
            "dive range start {from} is after its end {to}"
        )));
    }

    Ok((from..=to)
        .map(|index| {
            let mut header = DiveHeader::default();
            let result = download_dive(link, sleeper, timing, index, &mut header).map(|()| header);
            if let Err(error) = &result {
                warn!(index, %error, "dive download failed");
            }
            DiveDownload { index, result }
        })
        .collect())
}

/// A connected unit: the link plus the clock and budgets used to talk to it.
pub struct Session<L, S = ThreadSleeper> {
    link: L,
    sleeper: S,
    timing: LinkTiming,
}

impl<L: Link> Session<L, ThreadSleeper> {
    pub fn new(link: L, timing: LinkTiming) -> Self {
        Self::with_sleeper(link, ThreadSleeper, timing)
    }
}

impl<L: Link, S: Sleeper> Session<L, S> {
    pub fn with_sleeper(link: L, sleeper: S, timing: LinkTiming) -> Self {
        Self {
            link,
            sleeper,
            timing,
        }
    }

    pub fn is_idle(&mut self) -> bool {
        is_device_idle(&mut self.link, &mut self.sleeper, &self.timing)
    }

    pub fn list_dives(&mut self) -> Result<DiveList> {
        list_dives(&mut self.link, &mut self.sleeper, &self.timing)
    }

    pub fn download_dive(&mut self, index: u32, header: &mut DiveHeader) -> Result<()> {
        download_dive(&mut self.link, &mut self.sleeper, &self.timing, index, header)
    }

    pub fn download_range(&mut self, from: u32, to: u32) -> Result<Vec<DiveDownload>> {
        download_range(&mut self.link, &mut self.sleeper, &self.timing, from, to)
    }

    pub fn into_link(self) -> L {
        self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link_mock::{MockLink, NoSleep};
    use crate::models::GasMix;

    const SAMPLE: &str = "#1,320,x,150,x,x25,x80,x1200,x1180,x900,x850,x95,x96,x94,x70,x2,\
        S,x210,x211,x212,x213,x214,x215,x216,x217,x0,x12";
    const SAMPLE_WITH_NOTE: &str =
        "#2,640,x,130,x,x24,x79,x1190,x1180,x890,x840,x95,x96,x94,x130,x3,\
        DECO ALARM,S,x200,x201,x202,x203,x204,x205,x206,x207,x0,x14";

    fn session(link: MockLink) -> Session<MockLink, NoSleep> {
        Session::with_sleeper(link, NoSleep::default(), LinkTiming::default())
    }

    #[test]
    fn test_split_records() {
        let payload = "ver=1.0\r\nRecint=10\r\nSN=ABC123\r\nd\r\nver=1.1\r\nRecint=10\r\nSN=XYZ999\r\n";
        let records = split_records(payload).unwrap();
        assert_eq!(records.len(), 2);

        let first = decode_header(records[0]).unwrap();
        let second = decode_header(records[1]).unwrap();
        assert_eq!(first.version, "1.0");
        assert_eq!(first.serial_number, "ABC123");
        assert_eq!(second.version, "1.1");
        assert_eq!(second.serial_number, "XYZ999");
    }

    #[test]
    fn test_list_dives() {
        let link = MockLink::new()
            .then_read(b"PPP")
            .then_read(b"")
            .then_read(b"d\r\nver=1.0\r\nRecint=10\r\nSN=ABC123\r\n")
            .then_read(b"d\r\nver=1.1\r\nRecint=20\r\nSN=XYZ999\r\nP");
        let mut session = session(link);

        let list = session.list_dives().unwrap();
        assert!(list.is_complete());
        assert_eq!(list.headers.len(), 2);
        assert_eq!(list.headers[0].serial_number, "ABC123");
        assert_eq!(list.headers[1].record_interval, 20);
        assert!(list.headers.iter().all(|h| h.log.is_none()));
        assert_eq!(session.into_link().written(), b"M");
    }

    #[test]
    fn test_list_dives_keeps_lines_after_a_wait_marker_byte() {
        let link = MockLink::new().then_read(b"PPP").then_read(
            b"d\r\nver=1.0\r\nSN=ABC\r\nDDecoAlg VPM-B\r\nGas 4010, 79, 0, 560, 1\r\nPPP",
        );
        let mut session = session(link);

        let list = session.list_dives().unwrap();
        assert!(list.is_complete());
        assert_eq!(list.headers.len(), 1);
        let header = &list.headers[0];
        assert_eq!(header.deco_algorithm, "VPM-B");
        assert_eq!(header.gas[0], GasMix::new(79, 0, 560, true));

        // Wait markers after the frame stay on the link for the next handshake
        assert!(!session.into_link().is_drained());
    }

    #[test]
    fn test_list_dives_empty() {
        let link = MockLink::new().then_read(b"PPP").then_read(b"d\r\nP");
        let list = session(link).list_dives().unwrap();
        assert!(list.headers.is_empty());
        assert!(list.is_complete());
    }

    #[test]
    fn test_listing_keeps_good_siblings() {
        let payload = "ver=1.0\r\nSN=A\r\nd\r\nGas 4099, 79, 0, 560, 1\r\nd\r\nver=1.2\r\nSN=C\r\n";
        let list = decode_listing(payload).unwrap();
        assert!(!list.is_complete());
        assert_eq!(list.headers.len(), 2);
        assert_eq!(list.headers[0].serial_number, "A");
        assert_eq!(list.headers[1].serial_number, "C");
        assert_eq!(list.failures.len(), 1);
        assert_eq!(list.failures[0].record, 1);
        assert!(matches!(
            list.failures[0].error,
            SentinelError::MalformedRecord(_)
        ));
    }

    #[test]
    fn test_blank_listing_record_is_a_failure() {
        let payload = "ver=1.0\r\nSN=A\r\nd\r\n\r\nd\r\nver=1.1\r\nSN=B\r\n";
        let list = decode_listing(payload).unwrap();
        assert_eq!(list.headers.len(), 2);
        assert_eq!(list.failures.len(), 1);
        assert_eq!(list.failures[0].record, 1);
        assert!(matches!(
            list.failures[0].error,
            SentinelError::MalformedRecord(_)
        ));
    }

    #[test]
    fn test_list_dives_needs_idle_device() {
        let timing = LinkTiming {
            idle_tries: 2,
            ..LinkTiming::default()
        };
        let mut link = MockLink::new();
        let mut sleeper = NoSleep::default();
        let result = list_dives(&mut link, &mut sleeper, &timing);
        assert_eq!(result, Err(SentinelError::DeviceNotIdle { tries: 2 }));
        assert!(link.written().is_empty());
    }

    #[test]
    fn test_download_dive() {
        let response = format!(
            "d\r\nver=1.0\r\nRecint=10\r\nSN=ABC123\r\nMem 0 0 2\r\n{SAMPLE}\r\n{SAMPLE_WITH_NOTE}\r\nEnd\r\n"
        );
        let link = MockLink::new()
            .then_read(b"xyPPP")
            .then_read(response.as_bytes());
        let mut session = session(link);

        let mut header = DiveHeader::default();
        session.download_dive(7, &mut header).unwrap();

        assert_eq!(header.serial_number, "ABC123");
        let log = header.log.as_ref().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].time_s, 10);
        assert_eq!(log[1].time_s, 20);
        assert!((log[1].depth - 60.0).abs() < f64::EPSILON);
        assert_eq!(log[1].notes.len(), 1);
        assert_eq!(log[1].notes[0].description, "Deco alarm");
        assert_eq!(session.into_link().written(), b"D7");
    }

    #[test]
    fn test_profile_without_header_uses_known_interval() {
        let mut header = DiveHeader {
            record_interval: 30,
            serial_number: "ABC123".to_string(),
            ..DiveHeader::default()
        };
        decode_profile(&format!("{SAMPLE}\r\n"), &mut header).unwrap();
        assert_eq!(header.serial_number, "ABC123");
        assert_eq!(header.log.as_ref().unwrap()[0].time_s, 30);
    }

    #[test]
    fn test_bad_log_line_leaves_header_untouched() {
        let mut header = DiveHeader {
            serial_number: "KEEP".to_string(),
            ..DiveHeader::default()
        };
        let payload = format!("SN=NEW\r\nRecint=10\r\n{SAMPLE}\r\n#3,1,2,3\r\n");
        let result = decode_profile(&payload, &mut header);
        assert!(
            matches!(result, Err(SentinelError::MalformedRecord(ref m)) if m.starts_with("log line 1"))
        );
        assert_eq!(header.serial_number, "KEEP");
        assert!(header.log.is_none());
    }

    #[test]
    fn test_download_dive_noise() {
        let timing = LinkTiming {
            noise_run: 8,
            noise_min_bytes: 8,
            ..LinkTiming::default()
        };
        let mut link = MockLink::new()
            .then_read(b"PPP")
            .then_read(b"d\r\nver=1.0\r\n")
            .then_read(&[b'P'; 16]);
        let mut sleeper = NoSleep::default();
        let mut header = DiveHeader::default();
        let result = download_dive(&mut link, &mut sleeper, &timing, 0, &mut header);
        assert!(matches!(result, Err(SentinelError::ProtocolNoise { .. })));
        assert!(header.log.is_none());
    }

    #[test]
    fn test_download_range() {
        let dive = |sn: &str| format!("PPPd\r\nRecint=10\r\nSN={sn}\r\n{SAMPLE}\r\nEnd\r\n");
        let timing = LinkTiming {
            start_poll_cycles: 2,
            ..LinkTiming::default()
        };
        let mut link = MockLink::new()
            .then_read(dive("A").as_bytes())
            .then_read(b"PPP")
            .then_read(b"")
            .then_read(b"")
            .then_read(dive("C").as_bytes());
        let mut sleeper = NoSleep::default();

        let results = download_range(&mut link, &mut sleeper, &timing, 3, 5).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].index, 3);
        assert_eq!(results[0].result.as_ref().unwrap().serial_number, "A");
        assert!(matches!(
            results[1].result,
            Err(SentinelError::DeviceTimeout { .. })
        ));
        assert_eq!(results[2].result.as_ref().unwrap().serial_number, "C");
        assert_eq!(link.written(), b"D3D4D5");
    }

    #[test]
    fn test_download_range_rejects_inverted_range() {
        let mut session = session(MockLink::new());
        assert!(matches!(
            session.download_range(5, 3),
            Err(SentinelError::InvalidInput(_))
        ));
    }
}
