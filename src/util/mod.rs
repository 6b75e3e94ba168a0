use chrono::{DateTime, NaiveDateTime};

#[cfg(target_arch = "wasm32")]
pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Parse the backend's timestamps. The API emits naive ISO strings
/// (`2024-05-01T10:00:00` or with fractional seconds), occasionally RFC 3339.
/// Naive values are taken as UTC.
pub(crate) fn parse_timestamp_ms(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// `2024-05-01T10:00:00.123` -> `2024-05-01 10:00`.
pub(crate) fn short_timestamp(s: &str) -> String {
    let s = s.trim();
    match parse_timestamp_ms(s).and_then(DateTime::from_timestamp_millis) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => s.to_string(),
    }
}

/// Epoch millis as `HH:MM:SS`; 0 (unknown) renders empty.
pub(crate) fn clock_time(ms: i64) -> String {
    if ms <= 0 {
        return String::new();
    }
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}

pub(crate) fn percent(v: f64) -> String {
    format!("{:.1}%", v * 100.0)
}
