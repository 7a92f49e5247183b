//! Reply parsing and the aggregated status snapshot.
//!
//! Each query command answers with a free-text line; the extractors below
//! pull the interesting fields out and shrug off everything they do not
//! recognize. A non-match is "field absent", never an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static TEMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"T:\s*(\d+\.?\d*)\s*/\s*(\d+\.?\d*).*B:\s*(\d+\.?\d*)\s*/\s*(\d+\.?\d*)").unwrap()
});
static PROG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"M27\s+(\d+)").unwrap());
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"M992\s+([\d:]+)").unwrap());
static STATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"M997\s+(\w+)").unwrap());

/// Hotend and bed temperatures, actual and target, in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperatures {
    #[serde(rename = "T")]
    pub hotend: f64,
    #[serde(rename = "Tset")]
    pub hotend_target: f64,
    #[serde(rename = "B")]
    pub bed: f64,
    #[serde(rename = "Bset")]
    pub bed_target: f64,
}

/// One full round of status queries.
///
/// A field is `None` when its query failed, timed out, or replied with
/// something the extractor did not match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temps: Option<Temperatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamp: Option<String>,
}

impl Snapshot {
    /// True when no query produced a usable field.
    pub fn is_empty(&self) -> bool {
        self.temps.is_none()
            && self.progress.is_none()
            && self.elapsed.is_none()
            && self.state.is_none()
    }
}

pub(crate) fn parse_temps(payload: &str) -> Option<Temperatures> {
    let caps = TEMP_RE.captures(payload)?;
    Some(Temperatures {
        hotend: caps[1].parse().ok()?,
        hotend_target: caps[2].parse().ok()?,
        bed: caps[3].parse().ok()?,
        bed_target: caps[4].parse().ok()?,
    })
}

pub(crate) fn parse_progress(payload: &str) -> Option<u32> {
    PROG_RE.captures(payload).and_then(|caps| caps[1].parse().ok())
}

pub(crate) fn parse_elapsed(payload: &str) -> Option<String> {
    TIME_RE.captures(payload).map(|caps| caps[1].to_string())
}

pub(crate) fn parse_state(payload: &str) -> Option<String> {
    STATE_RE.captures(payload).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temps_decimal() {
        let temps = parse_temps("T:205.3/210.0 B:60.1/60.0").unwrap();
        assert_eq!(temps.hotend, 205.3);
        assert_eq!(temps.hotend_target, 210.0);
        assert_eq!(temps.bed, 60.1);
        assert_eq!(temps.bed_target, 60.0);
    }

    #[test]
    fn test_temps_integer_with_stray_tokens() {
        // Raw firmware line also reports per-tool and fan fields
        let line = "T:31 /0 B:27 /0 T0:31 /0 T1:0 /0 @:0 B@:0";
        let temps = parse_temps(line).unwrap();
        assert_eq!(temps.hotend, 31.0);
        assert_eq!(temps.hotend_target, 0.0);
        assert_eq!(temps.bed, 27.0);
        assert_eq!(temps.bed_target, 0.0);
    }

    #[test]
    fn test_temps_non_match_is_absent() {
        assert_eq!(parse_temps(""), None);
        assert_eq!(parse_temps("ok"), None);
        assert_eq!(parse_temps("T:bogus B:27/0"), None);
    }

    #[test]
    fn test_progress() {
        assert_eq!(parse_progress("M27 37"), Some(37));
        assert_eq!(parse_progress("M27 100"), Some(100));
        assert_eq!(parse_progress("M27"), None);
        assert_eq!(parse_progress(""), None);
    }

    #[test]
    fn test_elapsed() {
        assert_eq!(parse_elapsed("M992 00:28:43").as_deref(), Some("00:28:43"));
        assert_eq!(parse_elapsed("M992"), None);
    }

    #[test]
    fn test_state() {
        assert_eq!(parse_state("M997 PRINTING").as_deref(), Some("PRINTING"));
        assert_eq!(parse_state("M997 IDLE").as_deref(), Some("IDLE"));
        assert_eq!(parse_state("garbage"), None);
    }

    #[test]
    fn test_snapshot_is_empty() {
        assert!(Snapshot::default().is_empty());
        let snap = Snapshot { progress: Some(5), ..Default::default() };
        assert!(!snap.is_empty());
    }

    #[test]
    fn test_snapshot_serializes_without_absent_fields() {
        let snap = Snapshot {
            progress: Some(37),
            state: Some("PRINTING".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json, serde_json::json!({"progress": 37, "state": "PRINTING"}));
    }
}
