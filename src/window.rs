//! Time window resolution
//!
//! Turns the raw start/end arguments into a validated half-open window
//! `[start, end)`. The start argument is either an absolute timestamp or a
//! relative shorthand such as `2d`, `6h` or `15m` counted back from "now".
//!
//! Hour and minute periods are exact durations. Day periods step the local
//! calendar of the supplied `now`, so a one-day step across a DST change
//! spans 23 or 25 hours rather than a fixed 86 400 seconds. Absolute
//! timestamps without an offset are interpreted in the same timezone.

use chrono::{
    DateTime, Days, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, SecondsFormat,
    TimeZone, Utc,
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Naive timestamp layouts accepted for absolute input, tried in order
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Errors produced while resolving a time window
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    /// Input is neither a relative period nor a recognised timestamp
    #[error(
        "invalid date format: \"{0}\". Use ISO 8601 (e.g., 2025-05-01T00:00:00) \
         or a relative period (e.g., 5m, 2h, 1d)"
    )]
    InvalidFormat(String),

    /// Relative shorthand with a unit outside d/h/m
    #[error("invalid relative time unit: '{0}' (expected d, h or m)")]
    UnknownUnit(String),

    /// Relative period reaches outside the representable calendar
    #[error("relative period out of range: {0}")]
    OutOfRange(String),

    /// Resolved start is not before the resolved end
    #[error("start ({start}) must be before end ({end})")]
    EmptyWindow {
        /// Resolved start
        start: DateTime<Utc>,
        /// Resolved end
        end: DateTime<Utc>,
    },
}

/// Unit of a relative period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelativeUnit {
    /// Calendar day
    Days,
    /// Hour
    Hours,
    /// Minute
    Minutes,
}

impl FromStr for RelativeUnit {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "d" | "D" => Ok(RelativeUnit::Days),
            "h" | "H" => Ok(RelativeUnit::Hours),
            "m" | "M" => Ok(RelativeUnit::Minutes),
            other => Err(WindowError::UnknownUnit(other.to_string())),
        }
    }
}

impl fmt::Display for RelativeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelativeUnit::Days => "d",
            RelativeUnit::Hours => "h",
            RelativeUnit::Minutes => "m",
        };
        write!(f, "{s}")
    }
}

/// A parsed relative period such as `2h`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeSpec {
    /// Number of units
    pub magnitude: u32,
    /// Unit of the period
    pub unit: RelativeUnit,
}

impl RelativeSpec {
    /// Step back from `now` by this period.
    ///
    /// Hours and minutes are exact durations. Days step the local calendar
    /// date of `now`'s timezone and keep the wall-clock time of day.
    pub fn subtract_from<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>, WindowError> {
        let out_of_range = || WindowError::OutOfRange(self.to_string());
        let magnitude = i64::from(self.magnitude);
        match self.unit {
            RelativeUnit::Days => {
                let local = now
                    .naive_local()
                    .checked_sub_days(Days::new(u64::from(self.magnitude)))
                    .ok_or_else(out_of_range)?;
                resolve_local(&now.timezone(), local).ok_or_else(out_of_range)
            }
            RelativeUnit::Hours => Duration::try_hours(magnitude)
                .and_then(|d| now.clone().checked_sub_signed(d))
                .ok_or_else(out_of_range),
            RelativeUnit::Minutes => Duration::try_minutes(magnitude)
                .and_then(|d| now.clone().checked_sub_signed(d))
                .ok_or_else(out_of_range),
        }
    }
}

impl fmt::Display for RelativeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit)
    }
}

/// An absolute timestamp as typed by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsoluteInput {
    /// Timestamp carrying an explicit offset (RFC 3339)
    Zoned(DateTime<FixedOffset>),
    /// Wall-clock timestamp, interpreted in the resolver's timezone
    WallClock(NaiveDateTime),
}

impl AbsoluteInput {
    /// Pin the timestamp to an instant, using `tz` for wall-clock input.
    pub fn to_instant<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Utc>> {
        match self {
            AbsoluteInput::Zoned(dt) => Some(dt.with_timezone(&Utc)),
            AbsoluteInput::WallClock(naive) => {
                resolve_local(tz, *naive).map(|dt| dt.with_timezone(&Utc))
            }
        }
    }
}

/// Start/end argument after parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInput {
    /// Relative shorthand (`<magnitude><unit>`)
    Relative(RelativeSpec),
    /// Absolute timestamp
    Absolute(AbsoluteInput),
}

impl DateInput {
    /// Parse a date argument.
    ///
    /// Digits followed by letters are always treated as relative shorthand, so
    /// `5w` is rejected as an unknown unit instead of falling through to the
    /// absolute parser.
    pub fn parse(input: &str) -> Result<Self, WindowError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(WindowError::InvalidFormat(input.to_string()));
        }

        let split = input
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(input.len());
        let (digits, suffix) = input.split_at(split);

        let alphabetic = suffix.chars().all(|c| c.is_ascii_alphabetic());
        if !digits.is_empty() && !suffix.is_empty() && alphabetic {
            let unit = RelativeUnit::from_str(suffix)?;
            let magnitude = digits
                .parse::<u32>()
                .map_err(|_| WindowError::OutOfRange(input.to_string()))?;
            return Ok(DateInput::Relative(RelativeSpec { magnitude, unit }));
        }

        parse_absolute(input)
            .map(DateInput::Absolute)
            .ok_or_else(|| WindowError::InvalidFormat(input.to_string()))
    }
}

fn parse_absolute(input: &str) -> Option<AbsoluteInput> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(AbsoluteInput::Zoned(dt));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(AbsoluteInput::WallClock(naive));
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(AbsoluteInput::WallClock)
}

/// Map a wall-clock time to an instant. Ambiguous times (DST fall-back) take
/// the earlier instant; times inside a DST gap move forward by an hour.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&naive.checked_add_signed(Duration::hours(1))?)
            .earliest(),
    }
}

/// Round a millisecond instant to the nearest epoch second, halves up.
fn to_protocol_secs(dt: &DateTime<Utc>) -> i64 {
    (dt.timestamp_millis() + 500).div_euclid(1000)
}

/// Validated half-open time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, enforcing `start < end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::EmptyWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window start
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Window end (exclusive)
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Window start in device protocol units (epoch seconds)
    pub fn start_secs(&self) -> i64 {
        to_protocol_secs(&self.start)
    }

    /// Window end in device protocol units (epoch seconds)
    pub fn end_secs(&self) -> i64 {
        to_protocol_secs(&self.end)
    }

    /// Length of the window
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

/// Resolve raw start/end input into a [`TimeWindow`].
///
/// - Relative start (`<n>d|h|m`): `end = now`, `start = now - n units`; any end input is ignored.
/// - Absolute start: `end` is the parsed end input, or `now` when it is absent or unparsable.
///
/// # Errors
///
/// Returns [`WindowError`] when the start input cannot be parsed, names an
/// unknown relative unit, or the resolved start is not before the end.
pub fn resolve_window<Tz: TimeZone>(
    start_input: &str,
    end_input: Option<&str>,
    now: DateTime<Tz>,
) -> Result<TimeWindow, WindowError> {
    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);

    let (start, end) = match DateInput::parse(start_input)? {
        DateInput::Relative(spec) => {
            debug!(period = %spec, "Detected relative start date");
            if let Some(end) = end_input {
                debug!(end_input = end, "Ignoring end date for relative period");
            }
            let start = spec.subtract_from(&now)?.with_timezone(&Utc);
            (start, now_utc)
        }
        DateInput::Absolute(abs) => {
            let start = abs
                .to_instant(&tz)
                .ok_or_else(|| WindowError::InvalidFormat(start_input.to_string()))?;

            let end = match end_input {
                None => now_utc,
                Some(raw) => match parse_absolute(raw.trim()).and_then(|a| a.to_instant(&tz)) {
                    Some(end) => end,
                    None => {
                        warn!(end_input = raw, "Unparsable end date, fetching up to now");
                        now_utc
                    }
                },
            };
            (start, end)
        }
    };

    TimeWindow::new(start, end)
}
