use thiserror::Error;

/// Error type for the serial exchange and the record decoders.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SentinelError {
    #[error("write failed after {sent} of {expected} bytes: {reason}")]
    LinkWriteFailed {
        sent: usize,
        expected: usize,
        reason: String,
    },

    #[error("read failed: {0}")]
    LinkReadFailed(String),

    #[error("cannot open {device}: {reason}")]
    LinkUnavailable { device: String, reason: String },

    #[error("device did not answer within {polls} polls")]
    DeviceTimeout { polls: u32 },

    #[error("device not idle after {tries} tries")]
    DeviceNotIdle { tries: u32 },

    #[error("runaway 0x{byte:02x} bytes after {accumulated} bytes of payload")]
    ProtocolNoise { byte: u8, accumulated: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("unknown field: {0}")]
    UnknownField(String),
}

impl SentinelError {
    /// Whether the error leaves the surrounding record decodable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SentinelError::UnknownField(_))
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;
