//! Duration parsing for human-readable values like "5s" or "500ms".

use std::time::Duration;

/// Parse a duration string like "10s", "1m", "500ms".
///
/// A bare number is taken as seconds. Returns `None` if the string cannot be parsed.
///
/// ```
/// use service_provisioner::config::parse_duration_string;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration_string("5s"), Some(Duration::from_secs(5)));
/// assert_eq!(parse_duration_string("750ms"), Some(Duration::from_millis(750)));
/// assert_eq!(parse_duration_string("2"), Some(Duration::from_secs(2)));
/// ```
pub fn parse_duration_string(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(secs) = s.strip_suffix('s') {
        return secs.parse::<u64>().ok().map(Duration::from_secs);
    }
    if let Some(mins) = s.strip_suffix('m') {
        return mins
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs);
    }
    s.parse::<u64>().ok().map(Duration::from_secs)
}
