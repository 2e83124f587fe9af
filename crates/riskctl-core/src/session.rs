//! Trading session calendar in the exchange timezone.
//!
//! All checks take an explicit UTC instant so jobs can be tested
//! against a fixed clock.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Session boundaries, all in local exchange time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// First hour (inclusive) of the monitoring window.
    #[serde(default = "default_window_start_hour")]
    pub window_start_hour: u32,
    /// Hour (exclusive) at which the monitoring window ends.
    #[serde(default = "default_window_end_hour")]
    pub window_end_hour: u32,
    #[serde(default = "default_open_hour")]
    pub open_hour: u32,
    #[serde(default)]
    pub open_minute: u32,
    #[serde(default = "default_close_hour")]
    pub close_hour: u32,
    #[serde(default = "default_close_minute")]
    pub close_minute: u32,
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_window_start_hour() -> u32 {
    9
}

fn default_window_end_hour() -> u32 {
    16
}

fn default_open_hour() -> u32 {
    9
}

fn default_close_hour() -> u32 {
    15
}

fn default_close_minute() -> u32 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            window_start_hour: default_window_start_hour(),
            window_end_hour: default_window_end_hour(),
            open_hour: default_open_hour(),
            open_minute: 0,
            close_hour: default_close_hour(),
            close_minute: default_close_minute(),
        }
    }
}

/// Resolved session calendar.
#[derive(Debug, Clone)]
pub struct SessionCalendar {
    tz: Tz,
    config: SessionConfig,
}

impl SessionCalendar {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|_| CoreError::InvalidConfig(format!("unknown timezone: {}", config.timezone)))?;

        if config.window_start_hour >= config.window_end_hour || config.window_end_hour > 24 {
            return Err(CoreError::InvalidConfig(format!(
                "invalid session window {}..{}",
                config.window_start_hour, config.window_end_hour
            )));
        }
        if config.open_hour > 23
            || config.close_hour > 23
            || config.open_minute > 59
            || config.close_minute > 59
        {
            return Err(CoreError::InvalidConfig(
                "session open/close time out of range".to_string(),
            ));
        }

        Ok(Self { tz, config })
    }

    #[inline]
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn local(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.tz)
    }

    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date_naive()
    }

    /// Monday to Friday, inside `[window_start_hour, window_end_hour)`.
    #[must_use]
    pub fn is_trading_window(&self, now: DateTime<Utc>) -> bool {
        let local = self.local(now);
        is_weekday(local.weekday())
            && (self.config.window_start_hour..self.config.window_end_hour).contains(&local.hour())
    }

    /// The exact session-open minute on a weekday.
    #[must_use]
    pub fn is_session_open_minute(&self, now: DateTime<Utc>) -> bool {
        let local = self.local(now);
        is_weekday(local.weekday())
            && local.hour() == self.config.open_hour
            && local.minute() == self.config.open_minute
    }

    /// Any minute of the session-open hour.
    #[must_use]
    pub fn is_open_hour(&self, now: DateTime<Utc>) -> bool {
        self.local(now).hour() == self.config.open_hour
    }

    /// Any minute of the session-close hour.
    #[must_use]
    pub fn is_close_hour(&self, now: DateTime<Utc>) -> bool {
        self.local(now).hour() == self.config.close_hour
    }
}

fn is_weekday(day: Weekday) -> bool {
    !matches!(day, Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn calendar() -> SessionCalendar {
        SessionCalendar::new(SessionConfig::default()).unwrap()
    }

    /// Build a UTC instant from Asia/Kolkata wall-clock time.
    fn ist(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(year, month, day, hour, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_trading_window_weekday_hours() {
        let cal = calendar();
        // 2026-03-02 is Monday
        assert!(!cal.is_trading_window(ist(2026, 3, 2, 8, 59)));
        assert!(cal.is_trading_window(ist(2026, 3, 2, 9, 0)));
        assert!(cal.is_trading_window(ist(2026, 3, 2, 15, 59)));
        assert!(!cal.is_trading_window(ist(2026, 3, 2, 16, 0)));
    }

    #[test]
    fn test_trading_window_closed_on_weekend() {
        let cal = calendar();
        // 2026-03-07 is Saturday
        assert!(!cal.is_trading_window(ist(2026, 3, 7, 11, 0)));
        assert!(!cal.is_trading_window(ist(2026, 3, 8, 11, 0)));
    }

    #[test]
    fn test_session_open_minute() {
        let cal = calendar();
        assert!(cal.is_session_open_minute(ist(2026, 3, 3, 9, 0)));
        assert!(!cal.is_session_open_minute(ist(2026, 3, 3, 9, 1)));
        assert!(!cal.is_session_open_minute(ist(2026, 3, 7, 9, 0)));
    }

    #[test]
    fn test_open_and_close_hours() {
        let cal = calendar();
        assert!(cal.is_open_hour(ist(2026, 3, 3, 9, 45)));
        assert!(cal.is_close_hour(ist(2026, 3, 3, 15, 10)));
        assert!(!cal.is_close_hour(ist(2026, 3, 3, 14, 59)));
    }

    #[test]
    fn test_local_date_crosses_utc_midnight() {
        let cal = calendar();
        // 2026-03-02 20:00 UTC is 2026-03-03 01:30 IST
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap();
        assert_eq!(cal.local_date(now), NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SessionConfig {
            timezone: "Mars/Olympus".to_string(),
            ..SessionConfig::default()
        };
        assert!(SessionCalendar::new(config).is_err());

        let config = SessionConfig {
            window_start_hour: 16,
            window_end_hour: 9,
            ..SessionConfig::default()
        };
        assert!(SessionCalendar::new(config).is_err());
    }
}
