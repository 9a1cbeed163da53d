//! Text-protocol values
//!
//! With `parseTime` set, DATE, DATETIME and TIMESTAMP columns decode to
//! [`Value::DateTime`] in the connection's [`Location`]. Everything else
//! stays text.

use crate::protocol::constants::column_types;
use crate::protocol::ColumnDefinition;
use crate::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Time zone temporal values are interpreted in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Location {
    /// The host's local time zone
    Local,
    /// UTC
    #[default]
    Utc,
    /// Fixed offset such as `+08:00`
    Fixed(FixedOffset),
}

impl Location {
    /// Parse a `loc` value: `Local`, `UTC`, or a `±HH:MM` offset
    ///
    /// Named IANA zones are not accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Local" => Some(Self::Local),
            "UTC" => Some(Self::Utc),
            _ => parse_offset(value).map(Self::Fixed),
        }
    }

    fn resolve(&self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Local => Local
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.fixed_offset()),
            Self::Utc => Some(Utc.from_utc_datetime(naive).fixed_offset()),
            Self::Fixed(offset) => offset.from_local_datetime(naive).single(),
        }
    }
}

fn parse_offset(value: &str) -> Option<FixedOffset> {
    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// One column value of a text row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// SQL NULL, or a zero date when temporal decoding is on
    Null,
    /// Text as sent by the server
    Text(String),
    /// Decoded DATE, DATETIME or TIMESTAMP
    DateTime(DateTime<FixedOffset>),
}

impl Value {
    /// Text content, if this is a text value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Decoded timestamp, if this is a temporal value
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// Whether this is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Decode one text-protocol value
///
/// `temporal` carries the connection's location when `parseTime` is on.
pub(crate) fn decode_text(
    column: &ColumnDefinition,
    raw: Option<Bytes>,
    temporal: Option<Location>,
) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };
    let text = String::from_utf8_lossy(&raw);

    match temporal {
        Some(loc) if column_types::is_temporal(column.column_type) => {
            parse_temporal(&text, loc).ok_or_else(|| {
                Error::Protocol(format!(
                    "invalid temporal value '{}' in column {}",
                    text, column.name
                ))
            })
        }
        _ => Ok(Value::Text(text.into_owned())),
    }
}

fn parse_temporal(text: &str, loc: Location) -> Option<Value> {
    if text.starts_with("0000-00-00") {
        return Some(Value::Null);
    }
    let naive = if text.len() == 10 {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
    } else {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").ok()?
    };
    loc.resolve(&naive).map(Value::DateTime)
}
