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

//! Grouping of an ordered event stream into per-minute buckets.
//!
//! [`MinuteBucketer`] pulls raw lines from any `io::Result<String>` cursor
//! (e.g. [`std::io::BufRead::lines`]), parses them into [`Event`]s and
//! merges consecutive events that share the same effective minute into a
//! single [`MinuteBucket`]. A bucket is only yielded once an event for a
//! different minute is seen or the input is exhausted, so the whole input is
//! never materialized.
//!
//! An event is attributed to the minute in which it is known to be complete:
//! ```text
//! 18:11:08.509654 -> 18:12:00
//! 18:00:00.000000 -> 18:00:00
//! ```

use crate::event::{Event, EventError, ParseOptions};
use chrono::{NaiveDateTime, TimeDelta, Timelike};
use std::io;
use tracing::debug;

/// Truncate a timestamp to the start of its minute
pub fn floor_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts - TimeDelta::seconds(i64::from(ts.second()))
        - TimeDelta::nanoseconds(i64::from(ts.nanosecond()))
}

/// The minute an event is reported in: the minute itself when `ts` lies
/// exactly on a minute boundary, otherwise the following minute.
pub fn effective_minute(ts: NaiveDateTime) -> NaiveDateTime {
    let floored = floor_to_minute(ts);
    if floored == ts {
        floored
    } else {
        floored + TimeDelta::minutes(1)
    }
}

/// Sum and count of all the event durations attributed to one minute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinuteBucket {
    pub minute: NaiveDateTime,
    pub sum: f64,
    pub count: u64,
}

impl MinuteBucket {
    pub const fn new(minute: NaiveDateTime, sum: f64, count: u64) -> Self {
        Self { minute, sum, count }
    }

    fn open(minute: NaiveDateTime, duration: f64) -> Self {
        Self::new(minute, duration, 1)
    }

    fn push(&mut self, duration: f64) {
        self.sum += duration;
        self.count += 1;
    }
}

/// What to do with a line that fails validation
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum ErrorPolicy {
    /// Stop the sequence at the first invalid line
    #[default]
    Abort,
    /// Report the error to the diagnostics sink and continue
    Skip,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct BucketerOptions {
    pub parse: ParseOptions,
    pub error_policy: ErrorPolicy,
    /// Reject events whose timestamp is before the previous accepted one
    pub enforce_order: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum BucketError {
    #[error("Line {line}: reading input failed ({source})")]
    Io {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Event(#[from] EventError),
}

/// Counters describing the input consumed so far
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct BucketerStats {
    pub lines: usize,
    pub events: usize,
    pub skipped: usize,
    pub buckets: usize,
}

/// A bucket sequence that knows the minute its output should start at.
///
/// This is the floored (not effective) minute of the first accepted event,
/// hence it can precede the minute of the first bucket.
pub trait StartMinute {
    fn start_minute(&self) -> Option<NaiveDateTime>;
}

/// Lazy, forward-only iterator of [`MinuteBucket`]s over a line cursor.
///
/// Input is expected in non-decreasing timestamp order, it's never sorted.
/// Errors are handled according to [`BucketerOptions::error_policy`]: with
/// [`ErrorPolicy::Abort`] the first error is yielded and the iterator ends,
/// with [`ErrorPolicy::Skip`] the error is handed to `diagnostics` and the
/// offending line contributes nothing. Read failures always abort.
pub struct MinuteBucketer<L, D> {
    lines: L,
    options: BucketerOptions,
    diagnostics: D,
    line_no: usize,
    start_minute: Option<NaiveDateTime>,
    previous_ts: Option<NaiveDateTime>,
    current: Option<MinuteBucket>,
    stats: BucketerStats,
    finished: bool,
}

impl<L, D> MinuteBucketer<L, D>
where
    L: Iterator<Item = io::Result<String>>,
    D: FnMut(&EventError),
{
    pub fn new(lines: L, options: BucketerOptions, diagnostics: D) -> Self {
        Self {
            lines,
            options,
            diagnostics,
            line_no: 0,
            start_minute: None,
            previous_ts: None,
            current: None,
            stats: BucketerStats::default(),
            finished: false,
        }
    }

    pub const fn stats(&self) -> &BucketerStats {
        &self.stats
    }

    fn accept(&mut self, line: &str) -> Result<Event, EventError> {
        let event = Event::parse_line(line, self.line_no, &self.options.parse)?;
        if self.options.enforce_order {
            if let Some(previous) = self.previous_ts {
                if event.timestamp < previous {
                    return Err(EventError::OutOfOrder {
                        line: self.line_no,
                        timestamp: event.timestamp,
                        previous,
                    });
                }
            }
        }
        self.previous_ts = Some(event.timestamp);
        Ok(event)
    }

    fn close(&mut self, bucket: MinuteBucket) -> MinuteBucket {
        debug!(
            minute = %bucket.minute,
            sum = bucket.sum,
            count = bucket.count,
            "closed minute bucket"
        );
        self.stats.buckets += 1;
        bucket
    }
}

impl<L, D> StartMinute for MinuteBucketer<L, D> {
    fn start_minute(&self) -> Option<NaiveDateTime> {
        self.start_minute
    }
}

impl<L, D> Iterator for MinuteBucketer<L, D>
where
    L: Iterator<Item = io::Result<String>>,
    D: FnMut(&EventError),
{
    type Item = Result<MinuteBucket, BucketError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let Some(line) = self.lines.next() else {
                self.finished = true;
                let last = self.current.take()?;
                return Some(Ok(self.close(last)));
            };
            self.line_no += 1;
            self.stats.lines = self.line_no;
            let line = match line {
                Ok(line) => line,
                Err(source) => {
                    self.finished = true;
                    return Some(Err(BucketError::Io {
                        line: self.line_no,
                        source,
                    }));
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let event = match self.accept(line) {
                Ok(event) => event,
                Err(err) => match self.options.error_policy {
                    ErrorPolicy::Skip => {
                        debug!(line = self.line_no, kind = %err.kind(), "skipping invalid line");
                        (self.diagnostics)(&err);
                        self.stats.skipped += 1;
                        continue;
                    }
                    ErrorPolicy::Abort => {
                        self.finished = true;
                        return Some(Err(err.into()));
                    }
                },
            };
            self.stats.events += 1;
            self.start_minute
                .get_or_insert_with(|| floor_to_minute(event.timestamp));

            let minute = effective_minute(event.timestamp);
            if let Some(bucket) = self.current.as_mut().filter(|b| b.minute == minute) {
                bucket.push(event.duration);
                continue;
            }
            if let Some(closed) = self.current.replace(MinuteBucket::open(minute, event.duration))
            {
                return Some(Ok(self.close(closed)));
            }
        }
    }
}
