//! Clocks and timestamp formatting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::Clock;

/// Format as RFC3339 UTC with millisecond precision, e.g.
/// `2024-05-01T10:00:00.000Z`.
pub fn format_timestamp(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Stamp for a row being rewritten: `now`, unless that would not move past
/// `previous`, in which case one millisecond after `previous`. Unparseable
/// or missing previous stamps are ignored.
pub fn next_timestamp(now: SystemTime, previous: Option<&str>) -> String {
    let now: DateTime<Utc> = now.into();
    let floor = previous
        .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
        .map(|p| p.with_timezone(&Utc) + chrono::Duration::milliseconds(1));
    let stamp = match floor {
        Some(floor) if floor > now => floor,
        _ => now,
    };
    stamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Shift `t` by a signed number of milliseconds, saturating at the epoch.
pub fn offset_millis(t: SystemTime, millis: i64) -> SystemTime {
    let delta = Duration::from_millis(millis.unsigned_abs());
    if millis >= 0 {
        t + delta
    } else {
        t.checked_sub(delta).unwrap_or(UNIX_EPOCH)
    }
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Deterministic clock: every call returns the previous reading plus `step`.
#[derive(Debug)]
pub struct SteppingClock {
    next_millis: AtomicU64,
    step_millis: u64,
}

impl SteppingClock {
    pub fn new(start: SystemTime, step: Duration) -> Self {
        let start = start
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            next_millis: AtomicU64::new(start),
            step_millis: step.as_millis() as u64,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> SystemTime {
        let ms = self.next_millis.fetch_add(self.step_millis, Ordering::Relaxed);
        UNIX_EPOCH + Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_millis_and_z() {
        let t = UNIX_EPOCH + Duration::from_millis(1_714_557_600_123);
        assert_eq!(format_timestamp(t), "2024-05-01T10:00:00.123Z");
    }

    #[test]
    fn next_timestamp_always_moves_forward() {
        let t = UNIX_EPOCH + Duration::from_millis(1_714_557_600_123);
        assert_eq!(next_timestamp(t, None), "2024-05-01T10:00:00.123Z");
        assert_eq!(
            next_timestamp(t, Some("2024-05-01T09:00:00.000Z")),
            "2024-05-01T10:00:00.123Z"
        );
        // same millisecond
        assert_eq!(
            next_timestamp(t, Some("2024-05-01T10:00:00.123Z")),
            "2024-05-01T10:00:00.124Z"
        );
        // clock stepped backwards
        assert_eq!(
            next_timestamp(t, Some("2024-05-01T11:00:00.000Z")),
            "2024-05-01T11:00:00.001Z"
        );
        assert_eq!(next_timestamp(t, Some("garbage")), "2024-05-01T10:00:00.123Z");
    }

    #[test]
    fn offsets_both_ways() {
        let t = UNIX_EPOCH + Duration::from_secs(10);
        assert_eq!(offset_millis(t, 1500), UNIX_EPOCH + Duration::from_millis(11_500));
        assert_eq!(offset_millis(t, -2000), UNIX_EPOCH + Duration::from_secs(8));
        assert_eq!(offset_millis(t, -20_000), UNIX_EPOCH);
    }

    #[test]
    fn stepping_clock_advances() {
        let c = SteppingClock::new(UNIX_EPOCH, Duration::from_millis(5));
        let a = c.now();
        let b = c.now();
        assert_eq!(b.duration_since(a).unwrap(), Duration::from_millis(5));
    }
}
