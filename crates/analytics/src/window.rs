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

use crate::bucket::MinuteBucket;
use chrono::{NaiveDateTime, TimeDelta};
use std::{collections::VecDeque, num::NonZeroUsize};
use tracing::trace;

/// Trailing window over the most recent `size` minutes of buckets.
///
/// The running `total_sum`/`total_count` always match the contained buckets,
/// so [`SlidingWindow::average`] is O(1).
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    size: NonZeroUsize,
    buckets: VecDeque<MinuteBucket>,
    total_sum: f64,
    total_count: u64,
}

impl SlidingWindow {
    pub const fn new(size: NonZeroUsize) -> Self {
        Self {
            size,
            buckets: VecDeque::new(),
            total_sum: 0.0,
            total_count: 0,
        }
    }

    /// Oldest minute still inside the window ending at `now`, `None` when the
    /// window reaches back beyond the representable range.
    fn cutoff(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let span = i64::try_from(self.size.get() - 1)
            .ok()
            .and_then(TimeDelta::try_minutes)?;
        now.checked_sub_signed(span)
    }

    /// Drop every bucket older than `now - (size - 1)` minutes, returns the
    /// number of buckets removed.
    pub fn expire_old(&mut self, now: NaiveDateTime) -> usize {
        let Some(cutoff) = self.cutoff(now) else {
            return 0;
        };
        let mut expired = 0;
        while let Some(oldest) = self.buckets.front() {
            if oldest.minute >= cutoff {
                break;
            }
            self.total_sum -= oldest.sum;
            self.total_count -= oldest.count;
            self.buckets.pop_front();
            expired += 1;
        }
        if self.buckets.is_empty() {
            // Avoid carrying floating point residue into the next bucket
            self.total_sum = 0.0;
        }
        if expired > 0 {
            trace!(%now, %cutoff, expired, "expired minute buckets");
        }
        expired
    }

    /// Append a bucket, minutes must be added in increasing order
    pub fn add_bucket(&mut self, bucket: MinuteBucket) {
        self.total_sum += bucket.sum;
        self.total_count += bucket.count;
        self.buckets.push_back(bucket);
    }

    /// Mean duration of all the events in the window, zero when empty
    pub fn average(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.total_sum / self.total_count as f64
        }
    }

    pub fn newest_minute(&self) -> Option<NaiveDateTime> {
        self.buckets.back().map(|bucket| bucket.minute)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub const fn total_sum(&self) -> f64 {
        self.total_sum
    }

    pub const fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn iter(&self) -> impl Iterator<Item = &MinuteBucket> {
        self.buckets.iter()
    }
}
