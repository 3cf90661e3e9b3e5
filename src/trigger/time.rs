// src/trigger/time.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration as ChronoDuration, LocalResult, NaiveTime, TimeZone};

use crate::errors::MaaflowError;

/// Wall-clock time of day, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    fn naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for TimeOfDay {
    type Err = MaaflowError;

    /// `HH:MM`; a single-digit hour is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MaaflowError::InvalidTime(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;

        let digits = |part: &str, max_len: usize| {
            !part.is_empty() && part.len() <= max_len && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !digits(h, 2) || !digits(m, 2) || m.len() != 2 {
            return Err(invalid());
        }

        let hour = h.parse().map_err(|_| invalid())?;
        let minute = m.parse().map_err(|_| invalid())?;
        TimeOfDay::new(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// First instant strictly after `now` whose local wall clock reads `time`.
///
/// A time skipped by a DST jump fires at the first valid instant after the
/// gap; a repeated time fires at its earlier occurrence.
pub fn next_fire<Tz: TimeZone>(now: &DateTime<Tz>, time: TimeOfDay) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    for offset in 0..=2 {
        let date = today + ChronoDuration::days(offset);
        let naive = date.and_time(time.naive());

        let candidate = match tz.from_local_datetime(&naive) {
            LocalResult::Single(t) => Some(t),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => (1..=4)
                .map(|h| naive + ChronoDuration::minutes(30 * h))
                .find_map(|shifted| tz.from_local_datetime(&shifted).earliest()),
        };

        if let Some(candidate) = candidate {
            if candidate > *now {
                return candidate;
            }
        }
    }

    now.clone() + ChronoDuration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn parses_and_formats() {
        let t: TimeOfDay = "8:05".parse().unwrap();
        assert_eq!(t.to_string(), "08:05");
        assert_eq!("23:59".parse::<TimeOfDay>().unwrap(), TimeOfDay::new(23, 59).unwrap());
    }

    #[test]
    fn rejects_out_of_range_and_malformed() {
        for bad in ["24:00", "12:60", "12:5", "1200", "ab:cd", "", "-1:00", "123:00"] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn next_fire_today_or_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap();
        let later = next_fire(&now, TimeOfDay::new(20, 0).unwrap());
        assert_eq!(later, Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap());

        let earlier = next_fire(&now, TimeOfDay::new(8, 0).unwrap());
        assert_eq!(earlier, Utc.with_ymd_and_hms(2024, 3, 11, 8, 0, 0).unwrap());
    }

    #[test]
    fn exact_time_moves_to_next_day() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let next = next_fire(&now, TimeOfDay::new(9, 0).unwrap());
        assert_eq!(next, tz.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap());
    }
}
