// Copyright (C) 2025-present The NetGauze Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Decoding of a single JSON Lines record into a validated delivery
//! [`Event`].
//!
//! Each input line is expected to look like:
//!
//! ```text
//! {"timestamp": "2018-12-26 18:11:08.509654", "duration": 20, "event_name": "translation_delivered", ...}
//! ```
//!
//! Only `timestamp` and `duration` are required, `event_name` is checked
//! when [`ParseOptions::strict_event_name`] is set and every other field is
//! ignored. Validation stops at the first violated rule, and the returned
//! [`EventError`] names both the line and the rule.

use chrono::{NaiveDateTime, Timelike};
use serde_json::{Map, Value};
use strum_macros::Display;

/// Format of the `timestamp` field, fixed-width with microsecond precision
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Length of a timestamp rendered with [`TIMESTAMP_FORMAT`]
const TIMESTAMP_LEN: usize = "YYYY-MM-DD HH:MM:SS.ffffff".len();

/// The only `event_name` accepted in strict mode
pub const DELIVERED_EVENT_NAME: &str = "translation_delivered";

/// Classification of the errors a run can surface
#[derive(Display, Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum ErrorKind {
    MalformedInput,
    SchemaViolation,
    RangeViolation,
    OrderViolation,
    ConfigurationError,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("Line {line}: invalid JSON ({reason})")]
    InvalidJson { line: usize, reason: String },

    #[error("Line {line}: JSON value must be an object")]
    NotAnObject { line: usize },

    #[error("Line {line}: missing '{field}'")]
    MissingField { line: usize, field: &'static str },

    #[error("Line {line}: 'timestamp' must be a string")]
    TimestampNotString { line: usize },

    #[error("Line {line}: 'timestamp' does not match format 'YYYY-MM-DD HH:MM:SS.ffffff'")]
    InvalidTimestamp { line: usize },

    #[error("Line {line}: 'duration' must be numeric")]
    DurationNotNumeric { line: usize },

    #[error("Line {line}: 'duration' must be >= 0")]
    NegativeDuration { line: usize },

    #[error("Line {line}: expected event_name 'translation_delivered', got {found}")]
    UnexpectedEventName { line: usize, found: String },

    #[error("Line {line}: timestamp out of order (got {timestamp}, prev {previous})")]
    OutOfOrder {
        line: usize,
        timestamp: NaiveDateTime,
        previous: NaiveDateTime,
    },
}

impl EventError {
    /// 1-based number of the offending input line
    pub const fn line(&self) -> usize {
        match self {
            Self::InvalidJson { line, .. }
            | Self::NotAnObject { line }
            | Self::MissingField { line, .. }
            | Self::TimestampNotString { line }
            | Self::InvalidTimestamp { line }
            | Self::DurationNotNumeric { line }
            | Self::NegativeDuration { line }
            | Self::UnexpectedEventName { line, .. }
            | Self::OutOfOrder { line, .. } => *line,
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidJson { .. } => ErrorKind::MalformedInput,
            Self::NotAnObject { .. }
            | Self::MissingField { .. }
            | Self::TimestampNotString { .. }
            | Self::InvalidTimestamp { .. }
            | Self::DurationNotNumeric { .. }
            | Self::UnexpectedEventName { .. } => ErrorKind::SchemaViolation,
            Self::NegativeDuration { .. } => ErrorKind::RangeViolation,
            Self::OutOfOrder { .. } => ErrorKind::OrderViolation,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ParseOptions {
    /// Require `event_name` to equal [`DELIVERED_EVENT_NAME`]
    pub strict_event_name: bool,
}

/// A single validated delivery event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub timestamp: NaiveDateTime,
    /// Delivery time, always finite and non-negative
    pub duration: f64,
}

impl Event {
    /// Parse and validate one JSON Lines record.
    ///
    /// `line_no` is 1-based and is only used to label errors.
    pub fn parse_line(
        line: &str,
        line_no: usize,
        options: &ParseOptions,
    ) -> Result<Self, EventError> {
        let value: Value =
            serde_json::from_str(line).map_err(|err| EventError::InvalidJson {
                line: line_no,
                reason: err.to_string(),
            })?;
        let Value::Object(object) = value else {
            return Err(EventError::NotAnObject { line: line_no });
        };

        let timestamp = required_field(&object, "timestamp", line_no)?;
        let duration = required_field(&object, "duration", line_no)?;

        let timestamp = timestamp
            .as_str()
            .ok_or(EventError::TimestampNotString { line: line_no })?;
        let timestamp =
            parse_timestamp(timestamp).ok_or(EventError::InvalidTimestamp { line: line_no })?;

        let duration =
            coerce_duration(duration).ok_or(EventError::DurationNotNumeric { line: line_no })?;
        if duration < 0.0 {
            return Err(EventError::NegativeDuration { line: line_no });
        }

        if options.strict_event_name {
            match object.get("event_name") {
                Some(Value::String(name)) if name == DELIVERED_EVENT_NAME => {}
                other => {
                    return Err(EventError::UnexpectedEventName {
                        line: line_no,
                        found: other.map_or_else(|| "none".to_string(), |value| value.to_string()),
                    });
                }
            }
        }

        Ok(Self {
            timestamp,
            duration,
        })
    }
}

fn required_field<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
    line_no: usize,
) -> Result<&'a Value, EventError> {
    object.get(field).ok_or(EventError::MissingField {
        line: line_no,
        field,
    })
}

/// Parse a timestamp in the exact fixed-width [`TIMESTAMP_FORMAT`].
///
/// Second `60` is not a valid wall-clock second, chrono's leap second
/// representation is rejected.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if raw.len() != TIMESTAMP_LEN {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .filter(|ts| ts.nanosecond() < 1_000_000_000)
}

/// Numbers and numeric strings are accepted, anything non-finite is not
fn coerce_duration(value: &Value) -> Option<f64> {
    let duration = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    duration.is_finite().then_some(duration)
}
