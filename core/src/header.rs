//! Dive header decoding.
//!
//! A header payload is a run of text lines in three shapes: `Key=value`,
//! `Key v1 v2 ...` (space separated, read at a fixed index) and
//! `Key <id>, v1, v2, ...` (comma separated, indexed by a wire id). Lines are
//! dispatched through a prefix table checked longest prefix first.

use tracing::{debug, warn};

use crate::error::{Result, SentinelError};
use crate::link::LINE_SEPARATOR;
use crate::models::{DiveHeader, GasMix, TissueCompartment, CELL_COUNT, GAS_SLOTS, TISSUE_SLOTS};
use crate::split::split_tokens;
use crate::units::{
    decimal_field, device_to_unix, format_device_time, int_field, seconds_to_hms,
};

/// Wire id of gas slot 0.
pub const GAS_ID_BASE: i32 = 4010;
/// Wire id of tissue compartment 0.
pub const TISSUE_ID_BASE: i32 = 4020;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Version,
    RecordInterval,
    SerialNumber,
    Memory,
    Start,
    Finish,
    MaxDepth,
    Status,
    Otu,
    Atmosphere,
    Stack,
    Usage,
    Cns,
    Safety,
    Expert,
    Tpm,
    DecoAlgorithm,
    VgmMaxSafety,
    VgmStopSafety,
    VgmMidSafety,
    FilterType,
    CellHealth,
    Gas,
    Tissue,
}

/// Ordered by decreasing prefix length.
const FIELD_TABLE: &[(&str, Field)] = &[
    ("DVGMMaxDSafety ", Field::VgmMaxSafety),
    ("DVGMStopSafety ", Field::VgmStopSafety),
    ("DVGMMidSafety ", Field::VgmMidSafety),
    ("Dfiltertype, ", Field::FilterType),
    ("Dcellhealth ", Field::CellHealth),
    ("Dexpert, ", Field::Expert),
    ("DDecoAlg ", Field::DecoAlgorithm),
    ("DSafety ", Field::Safety),
    ("Recint=", Field::RecordInterval),
    ("Finish ", Field::Finish),
    ("Status ", Field::Status),
    ("DAtmos ", Field::Atmosphere),
    ("DStack ", Field::Stack),
    ("DUsage ", Field::Usage),
    ("Tissue ", Field::Tissue),
    ("Start ", Field::Start),
    ("Dtpm, ", Field::Tpm),
    ("MaxD ", Field::MaxDepth),
    ("DCNS ", Field::Cns),
    ("ver=", Field::Version),
    ("Mem ", Field::Memory),
    ("OTU ", Field::Otu),
    ("Gas ", Field::Gas),
    ("SN=", Field::SerialNumber),
];

/// Decode one dive's header payload.
pub fn decode_header(payload: &str) -> Result<DiveHeader> {
    let lines = split_tokens(payload, LINE_SEPARATOR)?;
    decode_header_lines(&lines)
}

/// Decode already separated header lines. Unknown lines are logged and skipped.
pub fn decode_header_lines(lines: &[&str]) -> Result<DiveHeader> {
    if lines.is_empty() {
        return Err(SentinelError::MalformedRecord(
            "dive header has no lines".to_string(),
        ));
    }

    let mut header = DiveHeader::default();

    for line in lines {
        match decode_line(&mut header, line) {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => warn!(line = *line, "skipping unknown header field"),
            Err(e) => return Err(e),
        }
    }

    if header.start_s > 0 && header.start_s < header.end_s {
        header.length_s = header.end_s - header.start_s;
        header.length = seconds_to_hms(header.length_s.unsigned_abs());
    }

    Ok(header)
}

fn decode_line(header: &mut DiveHeader, line: &str) -> Result<()> {
    for &(prefix, field) in FIELD_TABLE {
        if let Some(rest) = line.strip_prefix(prefix) {
            apply(header, field, line, rest)?;
            debug!(?field, line, "decoded header field");
            return Ok(());
        }
    }

    Err(SentinelError::UnknownField(line.to_string()))
}

fn apply(header: &mut DiveHeader, field: Field, line: &str, rest: &str) -> Result<()> {
    match field {
        Field::Version => header.version = rest.to_string(),
        Field::RecordInterval => header.record_interval = int_field(rest, "Recint")?,
        Field::SerialNumber => header.serial_number = rest.to_string(),
        Field::Memory => header.log_lines = spaced_int(line, 3)?,
        Field::Start => {
            let device = i64::from(spaced_int(line, 2)?);
            header.start_device = device;
            header.start_s = device_to_unix(device);
            header.start_time = format_device_time(device)?;
        }
        Field::Finish => {
            let device = i64::from(spaced_int(line, 2)?);
            header.end_device = device;
            header.end_s = device_to_unix(device);
            header.end_time = format_device_time(device)?;
        }
        Field::MaxDepth => header.max_depth = spaced_decimal(line, 2)?,
        Field::Status => header.status = spaced_int(line, 2)?,
        Field::Otu => header.otu = spaced_int(line, 2)?,
        Field::Atmosphere => header.atm = spaced_int(line, 2)?,
        Field::Stack => header.stack = spaced_int(line, 2)?,
        Field::Usage => header.usage = spaced_int(line, 2)?,
        Field::Cns => header.cns = spaced_decimal(line, 2)?,
        Field::Safety => header.safety = spaced_decimal(line, 2)?,
        Field::Expert => header.expert = spaced_int(line, 1)?,
        Field::Tpm => header.tpm = spaced_int(line, 1)?,
        Field::DecoAlgorithm => header.deco_algorithm = spaced(line, 1)?.to_string(),
        Field::VgmMaxSafety => header.vgm_max_safety = decimal_field(rest, line)?,
        Field::VgmStopSafety => header.vgm_stop_safety = decimal_field(rest, line)?,
        Field::VgmMidSafety => header.vgm_mid_safety = decimal_field(rest, line)?,
        Field::FilterType => header.filter_type = int_field(rest, line)?,
        Field::CellHealth => {
            let fields = listed(rest, line)?;
            let cell = int_field(nth(&fields, 0, line)?, line)?;
            let slot = slot_index(cell, 1, CELL_COUNT, line)?;
            header.cell_health[slot] = int_field(nth(&fields, 1, line)?, line)?;
        }
        Field::Gas => {
            let fields = listed(rest, line)?;
            let id = int_field(nth(&fields, 0, line)?, line)?;
            let slot = slot_index(id, GAS_ID_BASE, GAS_SLOTS, line)?;
            header.gas[slot] = GasMix::new(
                int_field(nth(&fields, 1, line)?, line)?,
                int_field(nth(&fields, 2, line)?, line)?,
                int_field(nth(&fields, 3, line)?, line)?,
                int_field(nth(&fields, 4, line)?, line)? != 0,
            );
        }
        Field::Tissue => {
            let fields = listed(rest, line)?;
            let id = int_field(nth(&fields, 0, line)?, line)?;
            let slot = slot_index(id, TISSUE_ID_BASE, TISSUE_SLOTS, line)?;
            header.tissue[slot] = TissueCompartment {
                t1: int_field(nth(&fields, 1, line)?, line)?,
                t2: int_field(nth(&fields, 2, line)?, line)?,
            };
        }
    }

    Ok(())
}

fn nth<'a>(fields: &[&'a str], idx: usize, line: &str) -> Result<&'a str> {
    fields
        .get(idx)
        .copied()
        .ok_or_else(|| SentinelError::MalformedRecord(format!("'{line}' has no field {idx}")))
}

/// Comma separated values after a prefix; nothing after it is a malformed line.
fn listed<'a>(rest: &'a str, line: &str) -> Result<Vec<&'a str>> {
    match split_tokens(rest, ", ") {
        Err(SentinelError::InvalidInput(_)) => Err(SentinelError::MalformedRecord(format!(
            "'{line}' has no values"
        ))),
        other => other,
    }
}

fn spaced<'a>(line: &'a str, idx: usize) -> Result<&'a str> {
    let fields = split_tokens(line, " ")?;
    nth(&fields, idx, line)
}

fn spaced_int(line: &str, idx: usize) -> Result<i32> {
    int_field(spaced(line, idx)?, line)
}

fn spaced_decimal(line: &str, idx: usize) -> Result<f64> {
    decimal_field(spaced(line, idx)?, line)
}

/// Map a wire id onto a fixed array slot, rejecting ids outside it.
fn slot_index(id: i32, base: i32, slots: usize, line: &str) -> Result<usize> {
    usize::try_from(i64::from(id) - i64::from(base))
        .ok()
        .filter(|&slot| slot < slots)
        .ok_or_else(|| SentinelError::MalformedRecord(format!("id {id} out of range in '{line}'")))
}
