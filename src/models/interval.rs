//! Allowed kline granularities.

use std::fmt;

/// A candle interval supported by the kline endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    D3,
    W1,
    /// One calendar month, approximated as 30 days (wire name: `"1M"`).
    Mo1,
}

impl Interval {
    /// Every allowed interval, ascending.
    pub const ALL: [Interval; 15] = [
        Interval::M1,
        Interval::M3,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H2,
        Interval::H4,
        Interval::H6,
        Interval::H8,
        Interval::H12,
        Interval::D1,
        Interval::D3,
        Interval::W1,
        Interval::Mo1,
    ];

    /// Returns the wire-format interval name expected by the exchange.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M3 => "3m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H2 => "2h",
            Interval::H4 => "4h",
            Interval::H6 => "6h",
            Interval::H8 => "8h",
            Interval::H12 => "12h",
            Interval::D1 => "1d",
            Interval::D3 => "3d",
            Interval::W1 => "1w",
            Interval::Mo1 => "1M",
        }
    }

    pub fn minutes(&self) -> u32 {
        match self {
            Interval::M1 => 1,
            Interval::M3 => 3,
            Interval::M5 => 5,
            Interval::M15 => 15,
            Interval::M30 => 30,
            Interval::H1 => 60,
            Interval::H2 => 120,
            Interval::H4 => 240,
            Interval::H6 => 360,
            Interval::H8 => 480,
            Interval::H12 => 720,
            Interval::D1 => 1440,
            Interval::D3 => 4320,
            Interval::W1 => 10080,
            Interval::Mo1 => 43200,
        }
    }

    pub fn seconds(&self) -> i64 {
        i64::from(self.minutes()) * 60
    }

    /// Exact lookup; `None` if `minutes` is not an allowed granularity.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.minutes() == minutes)
    }

    /// Snaps an arbitrary minute count to the closest allowed interval.
    ///
    /// Ties resolve to the smaller interval.
    pub fn nearest(minutes: i64) -> Self {
        let mut best = Interval::M1;
        let mut best_diff = minutes.abs_diff(i64::from(best.minutes()));
        for candidate in Self::ALL {
            let diff = minutes.abs_diff(i64::from(candidate.minutes()));
            if diff < best_diff {
                best = candidate;
                best_diff = diff;
            }
        }
        best
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        assert_eq!(Interval::M1.as_str(), "1m");
        assert_eq!(Interval::H1.as_str(), "1h");
        assert_eq!(Interval::D3.as_str(), "3d");
        assert_eq!(Interval::W1.as_str(), "1w");
        assert_eq!(Interval::Mo1.as_str(), "1M");
    }

    #[test]
    fn from_minutes_only_accepts_allowed_values() {
        assert_eq!(Interval::from_minutes(60), Some(Interval::H1));
        assert_eq!(Interval::from_minutes(43200), Some(Interval::Mo1));
        assert_eq!(Interval::from_minutes(7), None);
        assert_eq!(Interval::from_minutes(0), None);
    }

    #[test]
    fn nearest_snaps_to_closest() {
        assert_eq!(Interval::nearest(60), Interval::H1);
        assert_eq!(Interval::nearest(50), Interval::H1);
        assert_eq!(Interval::nearest(200), Interval::H4);
        assert_eq!(Interval::nearest(-10), Interval::M1);
        assert_eq!(Interval::nearest(1_000_000), Interval::Mo1);
    }

    #[test]
    fn nearest_handles_extreme_input() {
        assert_eq!(Interval::nearest(i64::MIN), Interval::M1);
        assert_eq!(Interval::nearest(i64::MAX), Interval::Mo1);
    }

    #[test]
    fn nearest_tie_prefers_smaller() {
        // 2 is equidistant from 1 and 3.
        assert_eq!(Interval::nearest(2), Interval::M1);
        // 90 is equidistant from 60 and 120.
        assert_eq!(Interval::nearest(90), Interval::H1);
    }

    #[test]
    fn all_is_ascending() {
        assert!(Interval::ALL.windows(2).all(|w| w[0].minutes() < w[1].minutes()));
        assert_eq!(Interval::H4.seconds(), 14_400);
    }
}
