//! Calendar window math.
//!
//! Splits a requested [start, end) range into non-overlapping, contiguous
//! windows aligned to calendar boundaries (UTC). The window is the unit of
//! caching and fetching, so the split must be deterministic: the same inputs
//! always yield the same sequence.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

/// A single time window: [start, end), half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Calendar unit a job's range is split on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowUnit {
    Day,
    Month,
}

impl WindowUnit {
    /// Stable string form, used in fingerprints and config.
    pub fn as_str(self) -> &'static str {
        match self {
            WindowUnit::Day => "day",
            WindowUnit::Month => "month",
        }
    }

    /// Singular noun for progress messages ("month" -> "Fetching missing months.").
    pub fn noun(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for WindowUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(WindowUnit::Day),
            "month" => Ok(WindowUnit::Month),
            other => Err(format!("unknown window unit '{other}' (expected 'day' or 'month')")),
        }
    }
}

/// Rejected range at job creation. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRangeError {
    #[error("range start {start} is not before end {end}")]
    StartNotBeforeEnd {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("range endpoint outside the supported calendar bounds")]
    OutOfBounds,
}

/// Splits [start, end) into chronologically ordered windows aligned to
/// calendar boundaries of `unit`, clipping the first and last to the range.
///
/// Output is contiguous and non-overlapping; its length is the job's
/// `totalWindows`.
pub fn split(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    unit: WindowUnit,
) -> Result<Vec<TimeWindow>, InvalidRangeError> {
    if start >= end {
        return Err(InvalidRangeError::StartNotBeforeEnd { start, end });
    }

    let mut out = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let boundary = next_boundary(cursor, unit)?;
        let window_end = boundary.min(end);
        out.push(TimeWindow {
            start: cursor,
            end: window_end,
        });
        cursor = window_end;
    }
    Ok(out)
}

/// First calendar boundary of `unit` strictly after `t`.
fn next_boundary(t: DateTime<Utc>, unit: WindowUnit) -> Result<DateTime<Utc>, InvalidRangeError> {
    let date = t.date_naive();
    let next = match unit {
        WindowUnit::Day => date.succ_opt(),
        WindowUnit::Month => {
            let (year, month) = if date.month() == 12 {
                (date.year() + 1, 1)
            } else {
                (date.year(), date.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
        }
    };
    let next = next.ok_or(InvalidRangeError::OutOfBounds)?;
    let midnight = next
        .and_hms_opt(0, 0, 0)
        .ok_or(InvalidRangeError::OutOfBounds)?;
    Ok(midnight.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn split_two_whole_months() {
        let windows = split(
            utc("2024-01-01T00:00:00Z"),
            utc("2024-03-01T00:00:00Z"),
            WindowUnit::Month,
        )
        .unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, utc("2024-01-01T00:00:00Z"));
        assert_eq!(windows[0].end, utc("2024-02-01T00:00:00Z"));
        assert_eq!(windows[1].start, utc("2024-02-01T00:00:00Z"));
        assert_eq!(windows[1].end, utc("2024-03-01T00:00:00Z"));
    }

    #[test]
    fn split_clips_first_and_last_window() {
        let windows = split(
            utc("2024-01-15T06:30:00Z"),
            utc("2024-03-10T12:00:00Z"),
            WindowUnit::Month,
        )
        .unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].start, utc("2024-01-15T06:30:00Z"));
        assert_eq!(windows[0].end, utc("2024-02-01T00:00:00Z"));
        assert_eq!(windows[2].start, utc("2024-03-01T00:00:00Z"));
        assert_eq!(windows[2].end, utc("2024-03-10T12:00:00Z"));
    }

    #[test]
    fn split_is_contiguous_and_non_overlapping() {
        let start = utc("2023-11-03T09:00:00Z");
        let end = utc("2024-02-20T00:00:00Z");
        let windows = split(start, end, WindowUnit::Month).unwrap();
        assert_eq!(windows.first().unwrap().start, start);
        assert_eq!(windows.last().unwrap().end, end);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[0].end);
        }
    }

    #[test]
    fn split_by_day() {
        let windows = split(
            utc("2024-02-28T12:00:00Z"),
            utc("2024-03-02T00:00:00Z"),
            WindowUnit::Day,
        )
        .unwrap();
        // 2024 is a leap year: 28th (clipped), 29th, Mar 1st.
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].end, utc("2024-02-29T00:00:00Z"));
        assert_eq!(windows[1].end, utc("2024-03-01T00:00:00Z"));
    }

    #[test]
    fn split_december_rolls_into_next_year() {
        let windows = split(
            utc("2023-12-10T00:00:00Z"),
            utc("2024-01-05T00:00:00Z"),
            WindowUnit::Month,
        )
        .unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].end, utc("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn split_rejects_empty_or_reversed_range() {
        let t = utc("2024-01-01T00:00:00Z");
        assert!(matches!(
            split(t, t, WindowUnit::Month),
            Err(InvalidRangeError::StartNotBeforeEnd { .. })
        ));
        assert!(split(utc("2024-02-01T00:00:00Z"), t, WindowUnit::Month).is_err());
    }

    #[test]
    fn split_is_deterministic() {
        let start = utc("2022-06-11T00:00:00Z");
        let end = utc("2022-09-01T00:00:00Z");
        let a = split(start, end, WindowUnit::Month).unwrap();
        let b = split(start, end, WindowUnit::Month).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unit_parses_from_str() {
        assert_eq!("month".parse::<WindowUnit>().unwrap(), WindowUnit::Month);
        assert_eq!(" Day ".parse::<WindowUnit>().unwrap(), WindowUnit::Day);
        assert!("week".parse::<WindowUnit>().is_err());
    }
}
