//! Trading-session window boundaries.

use crate::{Error, Result};
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use chrono_tz::America::New_York;

/// The window a single run replays: a start instant plus a duration in
/// whole minutes, interpreted against the exchange calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl SessionWindow {
    pub fn new(start: DateTime<Utc>, duration_minutes: i64) -> Self {
        Self {
            start,
            duration_minutes,
        }
    }

    /// Simulation start, truncated to the minute.
    pub fn normalized_start(&self) -> DateTime<Utc> {
        self.start
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(self.start)
    }

    /// Exclusive end of the simulated window.
    pub fn end(&self) -> DateTime<Utc> {
        self.normalized_start() + Duration::minutes(self.duration_minutes)
    }

    /// Exchange open (09:30 America/New_York) on the session's calendar day.
    pub fn session_open(&self) -> Result<DateTime<Utc>> {
        self.at_exchange_time(9, 30)
    }

    /// Exchange close (16:00 America/New_York) on the session's calendar day.
    pub fn session_close(&self) -> Result<DateTime<Utc>> {
        self.at_exchange_time(16, 0)
    }

    fn at_exchange_time(&self, hour: u32, minute: u32) -> Result<DateTime<Utc>> {
        let local_day = self.start.with_timezone(&New_York).date_naive();
        let naive = local_day
            .and_hms_opt(hour, minute, 0)
            .ok_or_else(|| Error::SessionTime {
                message: format!("invalid exchange time {hour:02}:{minute:02}"),
            })?;

        // Ambiguous wall times (fall-back) resolve to the earliest instant.
        New_York
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| Error::SessionTime {
                message: format!("nonexistent exchange time {naive} in America/New_York"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_start_truncates_to_minute() {
        let start = Utc.with_ymd_and_hms(2023, 6, 14, 14, 5, 42).unwrap();
        let window = SessionWindow::new(start, 60);

        let normalized = window.normalized_start();
        assert_eq!(normalized.second(), 0);
        assert_eq!(
            normalized,
            Utc.with_ymd_and_hms(2023, 6, 14, 14, 5, 0).unwrap()
        );
    }

    #[test]
    fn test_end_is_exclusive_bound() {
        let start = Utc.with_ymd_and_hms(2023, 6, 14, 14, 5, 10).unwrap();
        let window = SessionWindow::new(start, 90);

        assert_eq!(
            window.end(),
            Utc.with_ymd_and_hms(2023, 6, 14, 15, 35, 0).unwrap()
        );
    }

    #[test]
    fn test_session_boundaries_in_summer() {
        // EDT: 09:30 local == 13:30 UTC
        let start = Utc.with_ymd_and_hms(2023, 6, 14, 15, 0, 0).unwrap();
        let window = SessionWindow::new(start, 60);

        assert_eq!(
            window.session_open().unwrap(),
            Utc.with_ymd_and_hms(2023, 6, 14, 13, 30, 0).unwrap()
        );
        assert_eq!(
            window.session_close().unwrap(),
            Utc.with_ymd_and_hms(2023, 6, 14, 20, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_session_boundaries_in_winter() {
        // EST: 09:30 local == 14:30 UTC
        let start = Utc.with_ymd_and_hms(2023, 1, 18, 15, 0, 0).unwrap();
        let window = SessionWindow::new(start, 60);

        assert_eq!(
            window.session_open().unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 18, 14, 30, 0).unwrap()
        );
    }
}
