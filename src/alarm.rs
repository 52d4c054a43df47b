use std::{fmt, str::FromStr};

use chrono::{NaiveTime, TimeDelta, Timelike};

/// represents a single configured alarm
/// only the time of day is kept, there is no date so an alarm
/// matches whenever the wall clock shows that time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmSpec {
    time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlarmError {
    #[error("`{0}` is not a time of the form HH:MM:SS")]
    Malformed(String),
    #[error("`{0}` is out of range (hours 0-23, minutes and seconds 0-59)")]
    OutOfRange(String),
    #[error("a {countdown}s countdown for the {alarm} alarm would start before midnight")]
    CountdownBeforeMidnight { alarm: AlarmSpec, countdown: u32 },
}

impl AlarmSpec {
    #[must_use]
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, second).map(|time| Self { time })
    }

    #[must_use]
    pub const fn time(&self) -> NaiveTime {
        self.time
    }

    #[must_use]
    pub fn seconds_from_midnight(&self) -> u32 {
        self.time.num_seconds_from_midnight()
    }

    /// the time at which the countdown (and the audio tail) has to start
    /// so that it reaches zero exactly at this alarm
    ///
    /// # Errors
    /// when the countdown is longer than the time elapsed since midnight,
    /// the start would fall on the previous day which we don't support
    pub fn adjusted_fire_time(&self, countdown_seconds: u32) -> Result<NaiveTime, AlarmError> {
        if countdown_seconds > self.seconds_from_midnight() {
            return Err(AlarmError::CountdownBeforeMidnight {
                alarm: *self,
                countdown: countdown_seconds,
            });
        }
        Ok(self.time - TimeDelta::seconds(i64::from(countdown_seconds)))
    }
}

impl FromStr for AlarmSpec {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let fields = trimmed
            .split(':')
            .map(|field| {
                // int parsing would also allow signs, we only want plain digits
                if field.is_empty()
                    || field.len() > 2
                    || !field.bytes().all(|b| b.is_ascii_digit())
                {
                    return None;
                }
                field.parse::<u32>().ok()
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| AlarmError::Malformed(trimmed.to_string()))?;
        let &[hour, minute, second] = fields.as_slice() else {
            return Err(AlarmError::Malformed(trimmed.to_string()));
        };
        Self::from_hms(hour, minute, second)
            .ok_or_else(|| AlarmError::OutOfRange(trimmed.to_string()))
    }
}

impl fmt::Display for AlarmSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time.format("%H:%M:%S"))
    }
}

/// true if both times show the same hour, minute and second
/// anything below a second is ignored
#[must_use]
pub fn same_second(a: NaiveTime, b: NaiveTime) -> bool {
    a.hour() == b.hour() && a.minute() == b.minute() && a.second() == b.second()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_times() {
        let alarm: AlarmSpec = "14:30:15".parse().unwrap();
        assert_eq!(alarm.time(), NaiveTime::from_hms_opt(14, 30, 15).unwrap());
        assert_eq!(alarm.to_string(), "14:30:15");

        let padded: AlarmSpec = " 8:05:00 ".parse().unwrap();
        assert_eq!(padded, AlarmSpec::from_hms(8, 5, 0).unwrap());
    }

    #[test]
    fn rejects_out_of_range_times() {
        for input in ["25:00:00", "23:60:00", "23:59:60", "24:00:00"] {
            assert_eq!(
                input.parse::<AlarmSpec>(),
                Err(AlarmError::OutOfRange(input.to_string())),
                "{input}"
            );
        }
    }

    #[test]
    fn rejects_malformed_times() {
        for input in ["abc", "", "12:00", "12:00:00:00", "12::00", "+1:00:00", "120:0:0", "1a:00:00"] {
            assert!(
                matches!(input.parse::<AlarmSpec>(), Err(AlarmError::Malformed(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn adjusts_fire_time_by_countdown() {
        let alarm = AlarmSpec::from_hms(14, 30, 15).unwrap();
        assert_eq!(
            alarm.adjusted_fire_time(10).unwrap(),
            NaiveTime::from_hms_opt(14, 30, 5).unwrap()
        );
        assert_eq!(
            alarm.adjusted_fire_time(16).unwrap(),
            NaiveTime::from_hms_opt(14, 29, 59).unwrap()
        );
        assert_eq!(
            alarm.adjusted_fire_time(3600).unwrap(),
            NaiveTime::from_hms_opt(13, 30, 15).unwrap()
        );
        assert_eq!(alarm.adjusted_fire_time(0).unwrap(), alarm.time());
    }

    #[test]
    fn adjusted_time_is_exact_for_every_second_of_a_minute() {
        let alarm = AlarmSpec::from_hms(0, 1, 0).unwrap();
        for countdown in 0..=60 {
            let adjusted = alarm.adjusted_fire_time(countdown).unwrap();
            assert_eq!(adjusted.num_seconds_from_midnight(), 60 - countdown);
        }
    }

    #[test]
    fn rejects_countdown_reaching_previous_day() {
        let alarm = AlarmSpec::from_hms(0, 0, 5).unwrap();
        assert!(alarm.adjusted_fire_time(5).is_ok());
        assert_eq!(
            alarm.adjusted_fire_time(6),
            Err(AlarmError::CountdownBeforeMidnight {
                alarm,
                countdown: 6
            })
        );
    }

    #[test]
    fn same_second_ignores_fraction() {
        let a = NaiveTime::from_hms_milli_opt(9, 0, 0, 10).unwrap();
        let b = NaiveTime::from_hms_milli_opt(9, 0, 0, 990).unwrap();
        let c = NaiveTime::from_hms_opt(9, 0, 1).unwrap();
        assert!(same_second(a, b));
        assert!(!same_second(a, c));
    }
}
