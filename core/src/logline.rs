//! Decoding of the comma separated sample lines of a dive download.
//!
//! Sixteen positional fields come first. They are followed by any number of
//! event keywords, then a field starting with `S` that marks the start of the
//! temp-stick block: eight sensor readings, one unused field, and the CO2 reading.

use crate::error::{Result, SentinelError};
use crate::models::{LogLine, CELL_COUNT, TEMPSTICK_SENSORS};
use crate::notes::lookup_note;
use crate::split::{append, split_tokens};
use crate::units::{centi, deci, int_field, pressure_to_depth, seconds_to_hms, tagged_int_field};

/// Marks a sample line in a download payload.
pub const LOG_LINE_TAG: char = '#';

const POSITIONAL_FIELDS: usize = 16;
const SENTINEL_PREFIX: char = 'S';
/// Fields between the last temp-stick reading and the CO2 reading.
const CO2_SKIP: usize = 1;

/// Decode one sample line recorded at `record_interval` seconds per sample.
pub fn decode_log_line(record_interval: i32, line: &str) -> Result<LogLine> {
    let fields = split_tokens(line, ",")?;
    if fields.len() < POSITIONAL_FIELDS {
        return Err(SentinelError::MalformedRecord(format!(
            "log line has {} fields, expected at least {POSITIONAL_FIELDS}: '{line}'",
            fields.len()
        )));
    }

    let interval = u64::try_from(record_interval).map_err(|_| {
        SentinelError::MalformedRecord(format!("negative record interval {record_interval}"))
    })?;
    let index = u32::try_from(tagged_int_field(fields[0], "sample index")?).map_err(|_| {
        SentinelError::MalformedRecord(format!("negative sample index in '{line}'"))
    })?;
    let time_s = u64::from(index) * interval;

    let mut cell_po2 = [0.0; CELL_COUNT];
    for (i, cell) in cell_po2.iter_mut().enumerate() {
        *cell = centi(tagged_int_field(fields[11 + i], "cell pO2")?);
    }

    let mut notes = Vec::new();
    let mut idx = POSITIONAL_FIELDS;
    loop {
        let field = fields.get(idx).ok_or_else(|| {
            SentinelError::MalformedRecord(format!("no temp-stick marker in '{line}'"))
        })?;
        if field.starts_with(SENTINEL_PREFIX) {
            break;
        }
        append(&mut notes, lookup_note(field));
        idx += 1;
    }

    let tail = |offset: usize, what: &str| -> Result<i32> {
        let field = fields.get(idx + offset).ok_or_else(|| {
            SentinelError::MalformedRecord(format!("{what} missing in '{line}'"))
        })?;
        tagged_int_field(field, what)
    };

    let mut tempstick = [0.0; TEMPSTICK_SENSORS];
    for (i, sensor) in tempstick.iter_mut().enumerate() {
        *sensor = deci(tail(1 + i, "temp-stick")?);
    }
    let co2 = tail(1 + TEMPSTICK_SENSORS + CO2_SKIP, "CO2")?;

    Ok(LogLine {
        index,
        time_s,
        time_string: seconds_to_hms(time_s),
        depth: pressure_to_depth(int_field(fields[1], "depth")?),
        po2: centi(int_field(fields[3], "pO2")?),
        temperature: tagged_int_field(fields[5], "temperature")?,
        scrubber_left: deci(tagged_int_field(fields[6], "scrubber")?),
        primary_battery_v: centi(tagged_int_field(fields[7], "primary battery")?),
        secondary_battery_v: centi(tagged_int_field(fields[8], "secondary battery")?),
        diluent_pressure: tagged_int_field(fields[9], "diluent pressure")?,
        o2_pressure: tagged_int_field(fields[10], "O2 pressure")?,
        cell_po2,
        setpoint: centi(tagged_int_field(fields[14], "setpoint")?),
        ceiling: tagged_int_field(fields[15], "ceiling")?,
        notes,
        tempstick,
        co2,
    })
}
