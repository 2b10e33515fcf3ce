use serde::Serialize;

use crate::error::SentinelError;

/// Number of configurable gas slots in a dive header.
pub const GAS_SLOTS: usize = 10;

/// Number of tissue compartments in a dive header.
pub const TISSUE_SLOTS: usize = 16;

/// Number of oxygen cells on the unit.
pub const CELL_COUNT: usize = 3;

/// Number of sensors along the temp-stick.
pub const TEMPSTICK_SENSORS: usize = 8;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GasMix {
    pub n2: i32,
    pub he: i32,
    /// Always `100 - n2 - he`.
    pub o2: i32,
    /// Configured maximum operating depth, as sent (decimetres).
    pub max_depth: i32,
    pub enabled: bool,
}

impl GasMix {
    pub fn new(n2: i32, he: i32, max_depth: i32, enabled: bool) -> Self {
        Self {
            n2,
            he,
            o2: 100 - n2 - he,
            max_depth,
            enabled,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TissueCompartment {
    pub t1: i32,
    pub t2: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum NoteSeverity {
    #[default]
    Info = 0,
    Warning = 1,
    Alarm = 2,
    Unknown = 3,
}

impl NoteSeverity {
    pub fn label(&self) -> &'static str {
        match self {
            NoteSeverity::Info => "info",
            NoteSeverity::Warning => "warning",
            NoteSeverity::Alarm => "alarm",
            NoteSeverity::Unknown => "unknown",
        }
    }
}

/// An event keyword emitted inline in a log sample.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Note {
    pub keyword: String,
    pub severity: NoteSeverity,
    pub description: String,
}

/// One sample of the dive profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LogLine {
    pub index: u32,
    /// Seconds since dive start, `index * record_interval`.
    pub time_s: u64,
    /// `time_s` as `hh:mm:ss`.
    pub time_string: String,
    /// Metres, derived from the pressure reading.
    pub depth: f64,
    pub po2: f64,
    pub temperature: i32,
    /// Percent of scrubber remaining.
    pub scrubber_left: f64,
    pub primary_battery_v: f64,
    pub secondary_battery_v: f64,
    pub diluent_pressure: i32,
    pub o2_pressure: i32,
    pub cell_po2: [f64; CELL_COUNT],
    pub setpoint: f64,
    pub ceiling: i32,
    pub notes: Vec<Note>,
    /// Degrees Celsius per sensor.
    pub tempstick: [f64; TEMPSTICK_SENSORS],
    pub co2: i32,
}

/// Header of a single dive, optionally with its full sample log.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DiveHeader {
    pub version: String,
    /// Seconds between two log lines.
    pub record_interval: i32,
    pub serial_number: String,
    /// Log-line count declared by the `Mem` line.
    pub log_lines: i32,
    /// Start in device epoch seconds.
    pub start_device: i64,
    /// End in device epoch seconds.
    pub end_device: i64,
    /// Start as unix time, 0 when absent.
    pub start_s: i64,
    /// End as unix time, 0 when absent.
    pub end_s: i64,
    pub start_time: String,
    pub end_time: String,
    /// `end_s - start_s`, only set for `0 < start_s < end_s`.
    pub length_s: i64,
    pub length: String,
    pub max_depth: f64,
    pub status: i32,
    pub otu: i32,
    /// Atmospheric pressure in mbar.
    pub atm: i32,
    pub stack: i32,
    pub usage: i32,
    pub cns: f64,
    pub safety: f64,
    pub expert: i32,
    pub tpm: i32,
    pub deco_algorithm: String,
    pub vgm_max_safety: f64,
    pub vgm_stop_safety: f64,
    pub vgm_mid_safety: f64,
    pub filter_type: i32,
    pub cell_health: [i32; CELL_COUNT],
    pub gas: [GasMix; GAS_SLOTS],
    pub tissue: [TissueCompartment; TISSUE_SLOTS],
    /// `None` for listing-only queries.
    pub log: Option<Vec<LogLine>>,
}

impl DiveHeader {
    pub fn enabled_gases(&self) -> impl Iterator<Item = &GasMix> {
        self.gas.iter().filter(|g| g.enabled)
    }
}

/// A record of a listing that could not be decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordFailure {
    /// Position of the record in the listing payload.
    pub record: usize,
    pub error: SentinelError,
}

/// Dive headers in the order the device listed them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiveList {
    pub headers: Vec<DiveHeader>,
    pub failures: Vec<RecordFailure>,
}

impl DiveList {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_mix_derives_oxygen() {
        let gas = GasMix::new(45, 35, 600, true);
        assert_eq!(gas.o2, 20);

        let air = GasMix::new(79, 0, 560, false);
        assert_eq!(air.o2, 21);
    }

    #[test]
    fn test_default_header_is_zeroed() {
        let header = DiveHeader::default();
        assert!(header.version.is_empty());
        assert_eq!(header.length_s, 0);
        assert_eq!(header.gas.len(), GAS_SLOTS);
        assert_eq!(header.tissue.len(), TISSUE_SLOTS);
        assert!(header.log.is_none());
        assert_eq!(header.enabled_gases().count(), 0);
    }
}
