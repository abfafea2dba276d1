//! Time window separating already-processed files from new ones
//!
//! Bounds come from the state file in one of two shapes: a calendar date
//! written at setup (`"2024-03-01"`, taken as local midnight) or a precise
//! Unix timestamp written when a run advances the watermark. Both are
//! accepted transparently.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::setup::parse_date;
use crate::state::{PersistentState, StateKey};

/// Half-open creation-time window
///
/// | start | end  | matches                    |
/// |-------|------|----------------------------|
/// | Some  | Some | `[start, end)`             |
/// | Some  | None | `[start, +inf)`            |
/// | None  | Some | `(-inf, end)`              |
/// | None  | None | everything                 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Watermark {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl Watermark {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Window that matches every timestamp
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Window that starts at `start` and never closes
    pub fn since(start: DateTime<Utc>) -> Self {
        Self::new(Some(start), None)
    }

    /// Derive the window from the `range_start` / `range_end` state keys.
    pub fn from_state(state: &PersistentState) -> Result<Self> {
        let start = parse_bound(StateKey::RangeStart, state.get(StateKey::RangeStart.as_str())?)?;
        let end = parse_bound(StateKey::RangeEnd, state.get(StateKey::RangeEnd.as_str())?)?;

        let watermark = Self::new(start, end);
        if watermark.is_empty() {
            tracing::warn!(%watermark, "watermark start is not before its end; no file can match");
        }
        Ok(watermark)
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// True when both bounds exist and no instant can satisfy them
    pub fn is_empty(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s >= e)
    }

    /// Start inclusive, end exclusive; a missing bound is unbounded.
    pub fn in_range(&self, timestamp: DateTime<Utc>) -> bool {
        let after_start = self.start.is_none_or(|start| timestamp >= start);
        let before_end = self.end.is_none_or(|end| timestamp < end);
        after_start && before_end
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(s), Some(e)) => write!(f, "[{}, {})", s.to_rfc3339(), e.to_rfc3339()),
            (Some(s), None) => write!(f, "[{}, +inf)", s.to_rfc3339()),
            (None, Some(e)) => write!(f, "(-inf, {})", e.to_rfc3339()),
            (None, None) => write!(f, "(-inf, +inf)"),
        }
    }
}

/// Interpret a stored bound.
///
/// `null` and `""` mean "no bound". Strings must be `YYYY-MM-DD`; numbers
/// are Unix seconds and may carry a fractional part.
pub fn parse_bound(key: StateKey, value: &Value) -> Result<Option<DateTime<Utc>>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => {
            let date = parse_date(s).map_err(|_| {
                Error::invalid_value(key.as_str(), format!("'{s}' is neither YYYY-MM-DD nor a timestamp"))
            })?;
            local_midnight(date).map(Some)
        }
        Value::Number(n) => {
            let seconds = n
                .as_f64()
                .ok_or_else(|| Error::invalid_value(key.as_str(), format!("{n} is not a timestamp")))?;
            timestamp_from_secs(seconds)
                .map(Some)
                .ok_or_else(|| Error::invalid_value(key.as_str(), format!("{n} is out of range")))
        }
        other => Err(Error::invalid_value(
            key.as_str(),
            format!("expected date string or timestamp, got {other}"),
        )),
    }
}

/// Encode an advanced watermark bound as Unix seconds with microsecond
/// precision.
pub fn timestamp_value(instant: DateTime<Utc>) -> Value {
    let micros = instant.timestamp_micros();
    let seconds = micros as f64 / 1_000_000.0;
    serde_json::Number::from_f64(seconds)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Encode a calendar-day bound the way setup writes it.
pub fn date_value(date: Option<NaiveDate>) -> Value {
    match date {
        Some(d) => Value::String(d.format(crate::setup::DATE_FORMAT).to_string()),
        None => Value::Null,
    }
}

/// Start of `date` in the local time zone.
///
/// On a DST transition the earliest valid instant wins; if midnight does
/// not exist locally, the first instant after the gap is used.
pub fn local_midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| Error::InvalidDate {
        input: date.to_string(),
    })?;

    let local = Local
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            (1..=4)
                .filter_map(|h| date.and_hms_opt(h, 0, 0))
                .find_map(|t| Local.from_local_datetime(&t).earliest())
        })
        .ok_or_else(|| Error::InvalidDate {
            input: date.to_string(),
        })?;

    Ok(local.with_timezone(&Utc))
}

/// Convert fractional Unix seconds to an instant.
pub fn timestamp_from_secs(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let micros = (seconds * 1_000_000.0).round();
    if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_micros(micros as i64)
}
