//! Catalog of the event keywords the unit writes into its log lines.

use tracing::warn;

use crate::models::{Note, NoteSeverity};

/// Description given to keywords missing from the catalog.
pub const UNKNOWN_NOTE: &str = "unknown";

struct NoteEntry {
    keyword: &'static str,
    severity: NoteSeverity,
    description: &'static str,
}

const fn entry(
    keyword: &'static str,
    severity: NoteSeverity,
    description: &'static str,
) -> NoteEntry {
    NoteEntry {
        keyword,
        severity,
        description,
    }
}

const CATALOG: &[NoteEntry] = &[
    entry("ASCENT", NoteSeverity::Info, "Ascent"),
    entry("ASCENT FAST", NoteSeverity::Warning, "High ascent rate"),
    entry("CELLmV ERROR", NoteSeverity::Alarm, "Cell voltage error"),
    entry("DECO ALARM", NoteSeverity::Warning, "Deco alarm"),
    entry("FILTERREDDIFF", NoteSeverity::Alarm, "Filter reading difference"),
    entry("HPRATE HI", NoteSeverity::Alarm, "High pressure rate"),
    entry("PPO2 <HIGH", NoteSeverity::Alarm, "PO2 very high"),
    entry("PPO2 HIGH", NoteSeverity::Alarm, "PO2 high"),
    entry("PPO2 LOW", NoteSeverity::Alarm, "PO2 low"),
    entry("PPO2 mHIGH", NoteSeverity::Warning, "PO2 medium high"),
    entry("PPO2 mLOW", NoteSeverity::Warning, "PO2 medium low"),
    entry("PPO2 OFF", NoteSeverity::Alarm, "No pO2-reading"),
    entry("PPO2 SPINC", NoteSeverity::Info, "SP change"),
    entry("PPO2 VHIGH", NoteSeverity::Alarm, "PO2 very high"),
    entry("PREDIVE ABORT", NoteSeverity::Alarm, "No predive check done"),
    entry("VALVE", NoteSeverity::Alarm, "Valve issue detected"),
];

/// Resolve a keyword to a note. Unknown keywords are kept verbatim and never fail.
pub fn lookup_note(keyword: &str) -> Note {
    match CATALOG.iter().find(|e| e.keyword == keyword) {
        Some(e) => Note {
            keyword: keyword.to_string(),
            severity: e.severity,
            description: e.description.to_string(),
        },
        None => {
            warn!(keyword, "unknown note keyword");
            Note {
                keyword: keyword.to_string(),
                severity: NoteSeverity::Unknown,
                description: UNKNOWN_NOTE.to_string(),
            }
        }
    }
}

/// All keywords the catalog recognizes.
pub fn known_keywords() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|e| e.keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let note = lookup_note("ASCENT FAST");
        assert_eq!(note.keyword, "ASCENT FAST");
        assert_eq!(note.severity, NoteSeverity::Warning);
        assert_eq!(note.description, "High ascent rate");

        // A prefix of another keyword must not swallow it
        let note = lookup_note("ASCENT");
        assert_eq!(note.description, "Ascent");
    }

    #[test]
    fn test_every_keyword_resolves_to_itself() {
        for keyword in known_keywords() {
            let note = lookup_note(keyword);
            assert_eq!(note.keyword, keyword);
            assert_ne!(note.severity, NoteSeverity::Unknown);
        }
    }

    #[test]
    fn test_unknown_keyword() {
        let note = lookup_note("FOOBAR");
        assert_eq!(note.keyword, "FOOBAR");
        assert_eq!(note.severity, NoteSeverity::Unknown);
        assert_eq!(note.description, UNKNOWN_NOTE);
    }

    #[test]
    fn test_match_is_case_sensitive() {
        assert_eq!(lookup_note("PPO2 mHIGH").severity, NoteSeverity::Warning);
        assert_eq!(lookup_note("PPO2 MHIGH").severity, NoteSeverity::Unknown);
    }
}
