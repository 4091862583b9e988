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

//! Gap-free per-minute moving average over a sequence of minute buckets.
//!
//! The main components are:
//! - `MinuteSequencer`: the state machine walking every calendar minute from
//!   the first observed minute to the last bucket, one output per minute
//! - `MovingAverageAdaptor`: iterator adapter feeding a bucket source into the
//!   sequencer
//! - `MovingAverageExt`: extension trait providing `.moving_average(n)` on any
//!   bucket source
//!
//! Example usage:
//! ```text
//! use delivery_analytics::{bucket::MinuteBucketer, moving_average::MovingAverageExt};
//!
//! let records = MinuteBucketer::new(reader.lines(), options, |err| eprintln!("{err}"))
//!     .moving_average(NonZeroUsize::new(10).unwrap())
//!     .collect::<Result<Vec<_>, _>>()?;
//! ```

use crate::{
    bucket::{MinuteBucket, StartMinute},
    window::SlidingWindow,
};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// One line of output: the moving average as of `date`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    #[serde(with = "minute_format")]
    pub date: NaiveDateTime,
    pub average_delivery_time: f64,
}

mod minute_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(
        date: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pending {
    /// The next bucket has not been pulled from the source yet
    Unknown,
    Bucket(MinuteBucket),
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Streaming {
    current: NaiveDateTime,
    pending: Pending,
    /// Newest minute that made it into the window
    latest: NaiveDateTime,
    /// A record has already been produced for `current`
    emitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    AwaitingFirstBucket,
    Streaming(Streaming),
    Done,
}

/// What the sequencer needs before it can make progress
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Demand {
    /// The first bucket (and the start minute) of the sequence
    FirstBucket,
    /// The bucket following the last one fed
    NextBucket,
    /// [`MinuteSequencer::next_record`] can be called
    Ready,
}

/// Walks the output minutes one at a time, feeding buckets into a
/// [`SlidingWindow`] when the walk reaches their minute.
///
/// Buckets are pushed in with [`MinuteSequencer::begin`] and
/// [`MinuteSequencer::feed`] whenever [`MinuteSequencer::demand`] asks for
/// one, and records are pulled with [`MinuteSequencer::next_record`]. A
/// bucket is only requested after the record for the minute before it has
/// been handed out.
#[derive(Debug, Clone)]
pub struct MinuteSequencer {
    window: SlidingWindow,
    state: State,
}

impl MinuteSequencer {
    pub const fn new(window_size: NonZeroUsize) -> Self {
        Self {
            window: SlidingWindow::new(window_size),
            state: State::AwaitingFirstBucket,
        }
    }

    pub const fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub const fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    pub const fn demand(&self) -> Demand {
        match &self.state {
            State::AwaitingFirstBucket => Demand::FirstBucket,
            State::Streaming(Streaming {
                pending: Pending::Unknown,
                emitted: true,
                ..
            }) => Demand::NextBucket,
            State::Streaming(_) | State::Done => Demand::Ready,
        }
    }

    /// Start streaming at `start_minute` with `first` as the first pending
    /// bucket. Ignored unless the sequencer is awaiting its first bucket.
    pub fn begin(&mut self, start_minute: NaiveDateTime, first: MinuteBucket) {
        if let State::AwaitingFirstBucket = self.state {
            self.state = State::Streaming(Streaming {
                current: start_minute,
                pending: Pending::Bucket(first),
                latest: first.minute,
                emitted: false,
            });
        }
    }

    /// Hand over the next bucket, `None` marks the end of the source.
    ///
    /// Before the first bucket, `None` finishes the sequence without any
    /// output and `Some` starts it at the bucket's own minute.
    pub fn feed(&mut self, next: Option<MinuteBucket>) {
        if let State::Streaming(streaming) = &mut self.state {
            streaming.pending = next.map_or(Pending::Exhausted, Pending::Bucket);
            return;
        }
        if self.state == State::AwaitingFirstBucket {
            match next {
                Some(first) => self.begin(first.minute, first),
                None => self.state = State::Done,
            }
        }
    }

    /// Stop producing records, e.g. once the bucket source failed
    pub fn abort(&mut self) {
        self.state = State::Done;
    }

    /// Produce the record for the next output minute.
    ///
    /// Returns `None` once the sequence is done, or while
    /// [`MinuteSequencer::demand`] is not [`Demand::Ready`].
    pub fn next_record(&mut self) -> Option<OutputRecord> {
        if self.demand() != Demand::Ready {
            return None;
        }
        let State::Streaming(streaming) = &mut self.state else {
            return None;
        };

        if streaming.emitted {
            if streaming.pending == Pending::Exhausted && streaming.current >= streaming.latest {
                self.state = State::Done;
                return None;
            }
            streaming.current += TimeDelta::minutes(1);
            // Only reachable when bucket minutes do not increase
            if let Pending::Bucket(next) = streaming.pending {
                if streaming.current > next.minute {
                    streaming.current = next.minute;
                }
            }
        }

        self.window.expire_old(streaming.current);
        if let Pending::Bucket(next) = streaming.pending {
            if next.minute == streaming.current {
                self.window.add_bucket(next);
                streaming.pending = Pending::Unknown;
            }
        }
        if let Some(newest) = self.window.newest_minute() {
            streaming.latest = newest;
        }
        streaming.emitted = true;

        Some(OutputRecord {
            date: streaming.current,
            average_delivery_time: self.window.average(),
        })
    }
}

/// An iterator adaptor computing the per-minute moving average of a bucket
/// source.
///
/// The first error from the source is yielded as is and ends the iteration.
pub struct MovingAverageAdaptor<I> {
    source: I,
    sequencer: MinuteSequencer,
}

impl<I> MovingAverageAdaptor<I> {
    pub const fn new(source: I, window_size: NonZeroUsize) -> Self {
        Self {
            source,
            sequencer: MinuteSequencer::new(window_size),
        }
    }

    pub const fn source(&self) -> &I {
        &self.source
    }

    pub const fn sequencer(&self) -> &MinuteSequencer {
        &self.sequencer
    }
}

impl<I, E> Iterator for MovingAverageAdaptor<I>
where
    I: Iterator<Item = Result<MinuteBucket, E>> + StartMinute,
{
    type Item = Result<OutputRecord, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let demand = self.sequencer.demand();
            if demand == Demand::Ready {
                return self.sequencer.next_record().map(Ok);
            }
            match self.source.next() {
                Some(Ok(bucket)) if demand == Demand::FirstBucket => {
                    let start = self.source.start_minute().unwrap_or(bucket.minute);
                    self.sequencer.begin(start, bucket);
                }
                Some(Ok(bucket)) => self.sequencer.feed(Some(bucket)),
                Some(Err(err)) => {
                    self.sequencer.abort();
                    return Some(Err(err));
                }
                None => self.sequencer.feed(None),
            }
        }
    }
}

pub trait MovingAverageExt<E>:
    Iterator<Item = Result<MinuteBucket, E>> + StartMinute + Sized
{
    fn moving_average(self, window_size: NonZeroUsize) -> MovingAverageAdaptor<Self> {
        MovingAverageAdaptor::new(self, window_size)
    }
}

impl<I, E> MovingAverageExt<E> for I where I: Iterator<Item = Result<MinuteBucket, E>> + StartMinute
{}
