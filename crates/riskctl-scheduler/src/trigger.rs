//! Job triggers.
//!
//! Calendar triggers are evaluated in a fixed IANA timezone so that a
//! "Mon-Fri 09:00" job fires at exchange-local time regardless of the
//! host timezone.

use std::time::Duration;

use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};

/// When a job fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Every `Duration`, first fire one period after start.
    Interval(Duration),
    /// Selected weekdays at a local wall-clock time.
    Calendar(CalendarTrigger),
}

impl Trigger {
    pub fn every_secs(seconds: u64) -> SchedulerResult<Self> {
        if seconds == 0 {
            return Err(SchedulerError::InvalidTrigger(
                "interval must be at least 1 second".to_string(),
            ));
        }
        Ok(Self::Interval(Duration::from_secs(seconds)))
    }

    /// Next fire time strictly after `after`.
    ///
    /// Returns `None` only for a calendar trigger that can never fire.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Interval(period) => chrono::Duration::from_std(*period)
                .ok()
                .map(|period| after + period),
            Self::Calendar(calendar) => calendar.next_fire_after(after),
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interval(period) => write!(f, "every {}s", period.as_secs()),
            Self::Calendar(c) => write!(
                f,
                "{:?} at {:02}:{:02} {}",
                c.weekdays, c.hour, c.minute, c.timezone
            ),
        }
    }
}

/// Cron-style day/hour/minute trigger in a fixed timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarTrigger {
    weekdays: Vec<Weekday>,
    hour: u32,
    minute: u32,
    timezone: Tz,
}

impl CalendarTrigger {
    pub fn new(
        weekdays: Vec<Weekday>,
        hour: u32,
        minute: u32,
        timezone: Tz,
    ) -> SchedulerResult<Self> {
        if weekdays.is_empty() {
            return Err(SchedulerError::InvalidTrigger(
                "calendar trigger needs at least one weekday".to_string(),
            ));
        }
        if hour > 23 || minute > 59 {
            return Err(SchedulerError::InvalidTrigger(format!(
                "invalid time of day {hour:02}:{minute:02}"
            )));
        }
        Ok(Self {
            weekdays,
            hour,
            minute,
            timezone,
        })
    }

    pub fn weekdays(&self) -> &[Weekday] {
        &self.weekdays
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Next matching local time strictly after `after`.
    ///
    /// Local times that do not exist (DST gaps) are skipped.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0)?;
        let start = after.with_timezone(&self.timezone).date_naive();

        (0..=7u64).find_map(|offset| {
            let date = start.checked_add_days(Days::new(offset))?;
            if !self.weekdays.contains(&date.weekday()) {
                return None;
            }
            let local = self
                .timezone
                .from_local_datetime(&date.and_time(time))
                .earliest()?;
            let utc = local.with_timezone(&Utc);
            (utc > after).then_some(utc)
        })
    }
}

/// Parse a weekday list: `*`, `mon-fri`, `sat,sun`, `mon-wed,fri`.
pub fn parse_weekdays(spec: &str) -> SchedulerResult<Vec<Weekday>> {
    let spec = spec.trim();
    if spec == "*" {
        return Ok(all_weekdays().collect());
    }

    let parse_day = |s: &str| -> SchedulerResult<Weekday> {
        s.trim()
            .parse::<Weekday>()
            .map_err(|_| SchedulerError::InvalidTrigger(format!("unknown weekday: {s}")))
    };

    let mut days = Vec::new();
    for part in spec.split(',') {
        match part.split_once('-') {
            Some((from, to)) => {
                let from = parse_day(from)?.num_days_from_monday();
                let to = parse_day(to)?.num_days_from_monday();
                if from > to {
                    return Err(SchedulerError::InvalidTrigger(format!(
                        "weekday range runs backwards: {part}"
                    )));
                }
                days.extend(all_weekdays().filter(|d| {
                    let n = d.num_days_from_monday();
                    n >= from && n <= to
                }));
            }
            None => days.push(parse_day(part)?),
        }
    }

    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
    Ok(days)
}

fn all_weekdays() -> impl Iterator<Item = Weekday> {
    [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .into_iter()
}

// ============================================================================
// Configuration
// ============================================================================

fn default_days() -> String {
    "mon-fri".to_string()
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

/// Serializable trigger definition, as it appears in the config file.
///
/// ```toml
/// trigger = { kind = "interval", seconds = 2 }
/// trigger = { kind = "calendar", days = "mon-fri", hour = 9, minute = 0 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerConfig {
    Interval {
        seconds: u64,
    },
    Calendar {
        #[serde(default = "default_days")]
        days: String,
        hour: u32,
        #[serde(default)]
        minute: u32,
        #[serde(default = "default_timezone")]
        timezone: String,
    },
}

impl TriggerConfig {
    pub fn interval(seconds: u64) -> Self {
        Self::Interval { seconds }
    }

    /// Monday to Friday at `hour:minute` exchange time.
    pub fn weekdays_at(hour: u32, minute: u32) -> Self {
        Self::Calendar {
            days: default_days(),
            hour,
            minute,
            timezone: default_timezone(),
        }
    }

    pub fn build(&self) -> SchedulerResult<Trigger> {
        match self {
            Self::Interval { seconds } => Trigger::every_secs(*seconds),
            Self::Calendar {
                days,
                hour,
                minute,
                timezone,
            } => {
                let tz: Tz = timezone.parse().map_err(|_| {
                    SchedulerError::InvalidTrigger(format!("unknown timezone: {timezone}"))
                })?;
                let weekdays = parse_weekdays(days)?;
                Ok(Trigger::Calendar(CalendarTrigger::new(
                    weekdays, *hour, *minute, tz,
                )?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Kolkata;

    fn ist(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Kolkata
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn session_open() -> CalendarTrigger {
        CalendarTrigger::new(parse_weekdays("mon-fri").unwrap(), 9, 0, Kolkata).unwrap()
    }

    #[test]
    fn test_parse_weekdays() {
        assert_eq!(parse_weekdays("mon-fri").unwrap().len(), 5);
        assert_eq!(
            parse_weekdays("sat,sun").unwrap(),
            vec![Weekday::Sat, Weekday::Sun]
        );
        assert_eq!(parse_weekdays("*").unwrap().len(), 7);
        assert_eq!(
            parse_weekdays("mon-tue,tue,fri").unwrap(),
            vec![Weekday::Mon, Weekday::Tue, Weekday::Fri]
        );
        assert!(parse_weekdays("fri-mon").is_err());
        assert!(parse_weekdays("someday").is_err());
    }

    #[test]
    fn test_calendar_fires_later_same_day() {
        // 2026-03-02 is a Monday.
        let next = session_open().next_fire_after(ist(2026, 3, 2, 8, 0)).unwrap();
        assert_eq!(next, ist(2026, 3, 2, 9, 0));
    }

    #[test]
    fn test_calendar_fire_time_is_exclusive() {
        let next = session_open().next_fire_after(ist(2026, 3, 2, 9, 0)).unwrap();
        assert_eq!(next, ist(2026, 3, 3, 9, 0));
    }

    #[test]
    fn test_calendar_skips_weekend() {
        let close = CalendarTrigger::new(parse_weekdays("mon-fri").unwrap(), 15, 30, Kolkata)
            .unwrap();
        // Friday evening -> Monday.
        let next = close.next_fire_after(ist(2026, 3, 6, 16, 0)).unwrap();
        assert_eq!(next, ist(2026, 3, 9, 15, 30));
    }

    #[test]
    fn test_calendar_uses_exchange_timezone() {
        // 03:30 UTC is 09:00 IST.
        let next = session_open()
            .next_fire_after(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap())
            .unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 3, 30, 0).unwrap());
    }

    #[test]
    fn test_trigger_config_build() {
        assert_eq!(
            TriggerConfig::interval(2).build().unwrap(),
            Trigger::Interval(Duration::from_secs(2))
        );
        assert!(TriggerConfig::interval(0).build().is_err());
        assert!(matches!(
            TriggerConfig::weekdays_at(15, 30).build().unwrap(),
            Trigger::Calendar(_)
        ));

        let bad_tz = TriggerConfig::Calendar {
            days: "mon-fri".to_string(),
            hour: 9,
            minute: 0,
            timezone: "Mars/Olympus".to_string(),
        };
        assert!(matches!(
            bad_tz.build(),
            Err(SchedulerError::InvalidTrigger(_))
        ));
        assert!(CalendarTrigger::new(vec![Weekday::Mon], 24, 0, Kolkata).is_err());
    }
}
