use humansize::{DECIMAL, format_size};
use std::time::Duration;

/// Format a byte count, e.g. "12.34 MB"
pub fn format_file_size(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// Format a duration as H:MM:SS
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Format an optional kbps figure
pub fn format_kbps(kbps: Option<u64>) -> String {
    kbps.map(|k| format!("{}Kbps", k))
        .unwrap_or_else(|| "n/a".to_string())
}
