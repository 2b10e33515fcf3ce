pub mod config;
pub mod download;
pub mod error;
pub mod framing;
pub mod header;
pub mod link;
pub mod link_mock;
pub mod logline;
pub mod models;
pub mod notes;
pub mod serial;
pub mod split;
pub mod units;

pub use config::DownloadConfig;
pub use download::{
    decode_listing, decode_profile, download_dive, download_range, list_dives, DiveDownload,
    Session,
};
pub use error::{Result, SentinelError};
pub use header::decode_header;
pub use link::{Link, LinkTiming, Sleeper, ThreadSleeper};
pub use logline::decode_log_line;
pub use models::{
    DiveHeader, DiveList, GasMix, LogLine, Note, NoteSeverity, RecordFailure, TissueCompartment,
};
pub use serial::SerialLink;
