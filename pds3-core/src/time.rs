//! Timestamp decoders for label values.
//!
//! Two formats appear in rover camera labels: ISO 8601 calendar time
//! (`2021-02-22T20:41:55.833`) and mission local solar time
//! (`Sol-03039M14:00:29.161`).

use chrono::{NaiveDateTime, NaiveTime};
use std::fmt;
use thiserror::Error;

/// Errors raised by the timestamp decoders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("Malformed timestamp {input:?}: {reason}")]
    MalformedTimestamp { input: String, reason: String },
}

impl TimeError {
    fn malformed(input: &str, reason: impl fmt::Display) -> Self {
        Self::MalformedTimestamp {
            input: input.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// A mission solar day paired with local time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SolTime {
    /// Sol number since landing
    pub sol: u32,
    /// Local mean solar time on that sol
    pub time: NaiveTime,
}

impl fmt::Display for SolTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sol-{:05}M{}", self.sol, self.time.format("%H:%M:%S%.3f"))
    }
}

/// Digits of the zero-padded sol field.
const SOL_DIGITS: usize = 5;

/// Parses a calendar timestamp `YYYY-MM-DDTHH:MM:SS[.ffffff][Z]`.
///
/// Surrounding quotes and a trailing `Z` are accepted.
pub fn parse_calendar(input: &str) -> Result<NaiveDateTime, TimeError> {
    let unquoted = input.replace('"', "");
    let text = unquoted.trim();
    let text = text.strip_suffix('Z').unwrap_or(text);

    let format = if text.contains('.') {
        "%Y-%m-%dT%H:%M:%S%.f"
    } else {
        "%Y-%m-%dT%H:%M:%S"
    };
    NaiveDateTime::parse_from_str(text, format).map_err(|err| TimeError::malformed(input, err))
}

/// Parses a mission solar time `Sol-DDDDDMHH:MM:SS.ffffff`.
///
/// The `Sol-` prefix and surrounding quotes are optional. The character
/// between the sol number and the time of day is not checked.
pub fn parse_sol(input: &str) -> Result<SolTime, TimeError> {
    let unquoted = input.replace('"', "");
    let text = unquoted.trim();
    let text = text.strip_prefix("Sol-").unwrap_or(text);

    let digits = text
        .get(..SOL_DIGITS)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| TimeError::malformed(input, "expected a 5-digit sol number"))?;
    let sol: u32 = digits
        .parse()
        .map_err(|err| TimeError::malformed(input, err))?;

    let time_of_day = text
        .get(SOL_DIGITS..)
        .and_then(|rest| {
            let mut chars = rest.chars();
            chars.next().map(|_| chars.as_str())
        })
        .filter(|time_of_day| time_of_day.contains('.'))
        .ok_or_else(|| TimeError::malformed(input, "expected HH:MM:SS.ffffff after the sol"))?;
    let time = NaiveTime::parse_from_str(time_of_day, "%H:%M:%S%.f")
        .map_err(|err| TimeError::malformed(input, err))?;

    Ok(SolTime { sol, time })
}
