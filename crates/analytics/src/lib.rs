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

//! Streaming moving average of event durations over calendar minutes.
//!
//! The pipeline is strictly forward:
//! ```text
//! lines -> event::Event -> bucket::MinuteBucketer -> moving_average::MovingAverageAdaptor -> OutputRecord
//! ```
//! Every stage is a pull-based iterator, memory use is bounded by the window
//! size rather than the input size.

pub mod bucket;
pub mod event;
pub mod moving_average;
pub mod window;

pub use bucket::{
    effective_minute, floor_to_minute, BucketError, BucketerOptions, BucketerStats, ErrorPolicy,
    MinuteBucket, MinuteBucketer, StartMinute,
};
pub use event::{ErrorKind, Event, EventError, ParseOptions};
pub use moving_average::{MinuteSequencer, MovingAverageAdaptor, MovingAverageExt, OutputRecord};
pub use window::SlidingWindow;
