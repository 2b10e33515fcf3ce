//! Conversions baked into the wire format.
//!
//! The unit counts time in seconds from its own epoch, sends depth as a pressure
//! reading, and scales most decimal values to integers (hundredths or tenths).
//! Numbers are read the way the firmware writes them: an optional sign, leading
//! digits, and whatever trailing text follows ignored.

use chrono::{DateTime, Utc};
use nom::{
    character::complete::{char, digit1, one_of, space0},
    combinator::{all_consuming, opt, recognize},
    number::complete::recognize_float,
    sequence::{pair, preceded},
    IResult, Parser,
};

use crate::error::{Result, SentinelError};

/// Unix time of device time 0 (1991-12-31T00:00:00Z).
pub const DEVICE_EPOCH_OFFSET: i64 = 694_137_600;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub fn device_to_unix(device_time: i64) -> i64 {
    device_time + DEVICE_EPOCH_OFFSET
}

pub fn device_to_datetime(device_time: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(device_to_unix(device_time), 0)
}

/// Render a device timestamp as a UTC date string.
pub fn format_device_time(device_time: i64) -> Result<String> {
    device_to_datetime(device_time)
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .ok_or_else(|| {
            SentinelError::MalformedRecord(format!("timestamp {device_time} out of range"))
        })
}

/// `3725` → `"01:02:05"`.
pub fn seconds_to_hms(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

/// Parse `hh:mm:ss` back into seconds.
pub fn hms_to_seconds(hms: &str) -> Result<u64> {
    let invalid = || SentinelError::InvalidInput(format!("not a hh:mm:ss time: '{hms}'"));

    let (_, (h, _, m, _, s)) = all_consuming((digit1, char(':'), digit1, char(':'), digit1))
        .parse(hms)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| invalid())?;

    let h: u64 = h.parse().map_err(|_| invalid())?;
    let m: u64 = m.parse().map_err(|_| invalid())?;
    let s: u64 = s.parse().map_err(|_| invalid())?;
    if m >= 60 || s >= 60 {
        return Err(invalid());
    }

    h.checked_mul(3600)
        .and_then(|t| t.checked_add(m * 60 + s))
        .ok_or_else(invalid)
}

/// Depth in metres from the raw pressure reading.
pub fn pressure_to_depth(raw: i32) -> f64 {
    f64::from(raw) * 6.0 / 64.0
}

/// Hundredths to units (hectobar to bar, centivolt to volt).
pub fn centi(raw: i32) -> f64 {
    f64::from(raw) / 100.0
}

/// Tenths to units (per-mille to percent, decicelsius to celsius).
pub fn deci(raw: i32) -> f64 {
    f64::from(raw) / 10.0
}

fn leading_int(input: &str) -> IResult<&str, &str> {
    preceded(space0, recognize(pair(opt(one_of("+-")), digit1))).parse(input)
}

fn leading_decimal(input: &str) -> IResult<&str, &str> {
    preceded(space0, recognize_float).parse(input)
}

/// Read the leading integer of a wire field.
pub fn int_field(field: &str, what: &str) -> Result<i32> {
    let malformed =
        || SentinelError::MalformedRecord(format!("{what}: expected an integer, got '{field}'"));

    let (_, digits) = leading_int(field).map_err(|_| malformed())?;
    digits.parse().map_err(|_| malformed())
}

/// Read the leading integer of a wire field after dropping its one-character tag.
pub fn tagged_int_field(field: &str, what: &str) -> Result<i32> {
    let mut chars = field.chars();
    if chars.next().is_none() {
        return Err(SentinelError::MalformedRecord(format!(
            "{what}: empty field"
        )));
    }
    int_field(chars.as_str(), what)
}

/// Read the leading decimal number of a wire field.
pub fn decimal_field(field: &str, what: &str) -> Result<f64> {
    let malformed =
        || SentinelError::MalformedRecord(format!("{what}: expected a number, got '{field}'"));

    let (_, number) = leading_decimal(field).map_err(|_| malformed())?;
    number.parse().map_err(|_| malformed())
}
