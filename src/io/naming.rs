//! Output file names and human-readable timestamps.

use chrono::{DateTime, Local, TimeZone};

use crate::domain::TimestampMode;

pub const FILE_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `{beamline}[_{timestamp}]_scan_{label}.{extension}`, beamline lowercased.
pub fn format_filename(beamline_id: &str, label: &str, extension: &str, timestamp: Option<f64>) -> String {
    let mut name = beamline_id.to_lowercase();
    if let Some(ts) = timestamp {
        name.push('_');
        name.push_str(&humanize_time(ts, FILE_TIME_FORMAT));
    }
    format!("{name}_scan_{label}.{extension}")
}

/// Label for a set of scans: `42` or `first-last`.
pub fn scan_label(scan_ids: &[i64]) -> String {
    match scan_ids {
        [] => String::new(),
        [only] => only.to_string(),
        [first, .., last] => format!("{first}-{last}"),
    }
}

/// Epoch seconds → local time string.
pub fn humanize_time(timestamp: f64, format: &str) -> String {
    local_time(timestamp)
        .map(|t| t.format(format).to_string())
        .unwrap_or_else(|| format!("{timestamp}"))
}

fn local_time(timestamp: f64) -> Option<DateTime<Local>> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9) as u32;
    Local.timestamp_opt(secs as i64, nanos.min(999_999_999)).single()
}

pub fn current_timestamp() -> f64 {
    let now = Local::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) * 1e-9
}

/// Timestamp to embed in a file name for the chosen mode.
pub fn file_timestamp(mode: Option<TimestampMode>, scan_time: f64) -> Option<f64> {
    match mode? {
        TimestampMode::Scan => Some(scan_time),
        TimestampMode::Current => Some(current_timestamp()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_without_timestamp() {
        assert_eq!(format_filename("SMI", "565", "csv", None), "smi_scan_565.csv");
        assert_eq!(format_filename("CHX", "10-12", "png", None), "chx_scan_10-12.png");
    }

    #[test]
    fn filename_with_timestamp_uses_local_time() {
        let ts = 1_490_000_000.25;
        let expected = Local
            .timestamp_opt(1_490_000_000, 250_000_000)
            .single()
            .unwrap()
            .format(FILE_TIME_FORMAT)
            .to_string();
        assert_eq!(
            format_filename("SRX", "7", "dat", Some(ts)),
            format!("srx_{expected}_scan_7.dat")
        );
    }

    #[test]
    fn labels_for_scan_sets() {
        assert_eq!(scan_label(&[565]), "565");
        assert_eq!(scan_label(&[10, 11, 12]), "10-12");
        assert_eq!(scan_label(&[]), "");
    }

    #[test]
    fn timestamp_modes() {
        assert_eq!(file_timestamp(None, 5.0), None);
        assert_eq!(file_timestamp(Some(TimestampMode::Scan), 5.0), Some(5.0));
        assert!(file_timestamp(Some(TimestampMode::Current), 5.0).unwrap() > 1.6e9);
    }
}
