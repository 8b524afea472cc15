//! Position time-progress helpers for host displays.
//!
//! Everything here is a pure function of a caller-supplied "now"; the
//! library runs no clock of its own.

use chrono::NaiveDateTime;

/// How far an open position has travelled towards its expiry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub elapsed_hours: f64,
    pub remaining_hours: f64,
    /// Elapsed share of the total lifetime, clamped to `0..=100`.
    pub percent: f64,
}

/// Parses a `YYYY-MM-DD HH:MM:SS[.ffffff]` UTC timestamp into Unix seconds.
///
/// Fractional seconds are accepted and truncated.
pub fn parse_open_time(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let head = raw.get(..19)?;
    let parsed = NaiveDateTime::parse_from_str(head, "%Y-%m-%d %H:%M:%S").ok()?;

    let rest = &raw[19..];
    if !rest.is_empty() {
        let digits = rest.strip_prefix('.')?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    Some(parsed.and_utc().timestamp())
}

/// Computes progress for a position opened at `open_time` (Unix seconds)
/// with `hours_to_expiry` left, as of `now` (Unix seconds).
pub fn position_progress(open_time: i64, hours_to_expiry: f64, now: i64) -> Progress {
    let elapsed_hours = (now.saturating_sub(open_time) as f64 / 3600.0).max(0.0);
    let total = elapsed_hours + hours_to_expiry;
    let percent = if total > 0.0 {
        (elapsed_hours / total * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    Progress {
        elapsed_hours,
        remaining_hours: hours_to_expiry,
        percent,
    }
}

/// Derives a spot pair from an option instrument name by joining its first
/// and last dash-separated parts: `BTC-27JUN25-60000-C-USDT` → `BTCUSDT`.
pub fn derive_spot_symbol(instrument: &str) -> Option<String> {
    let parts: Vec<&str> = instrument.split('-').collect();
    if parts.len() < 2 {
        return None;
    }
    let base = parts.first()?;
    let quote = parts.last()?;
    Some(format!("{base}{quote}").to_uppercase())
}
