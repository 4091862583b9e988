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

//! Delivery Moving Average Library
//!
//! Reads a JSON Lines log of delivery events and writes, as JSON Lines, the
//! moving average of the event durations for every minute between the first
//! event and the last one.

use delivery_analytics::{
    BucketError, BucketerOptions, BucketerStats, ErrorKind, ErrorPolicy, EventError,
    MinuteBucketer, MovingAverageExt, ParseOptions,
};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    num::NonZeroUsize,
    path::PathBuf,
};
use tracing::info;

/// Configuration of a single run
#[derive(Debug, Clone)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    /// Kept signed so non-positive values reach validation
    pub window_size: i64,
    pub strict_event_name: bool,
    pub skip_invalid: bool,
    pub enforce_order: bool,
}

impl Config {
    pub fn validate(&self) -> Result<NonZeroUsize, ConfigurationError> {
        usize::try_from(self.window_size)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or(ConfigurationError::InvalidWindowSize(self.window_size))
    }

    pub const fn bucketer_options(&self) -> BucketerOptions {
        BucketerOptions {
            parse: ParseOptions {
                strict_event_name: self.strict_event_name,
            },
            error_policy: if self.skip_invalid {
                ErrorPolicy::Skip
            } else {
                ErrorPolicy::Abort
            },
            enforce_order: self.enforce_order,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConfigurationError {
    InvalidWindowSize(i64),
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidWindowSize(size) => write!(f, "window_size must be >= 1, got {size}"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    #[error("failed to open input file '{}': {source}", .path.display())]
    OpenInput { path: PathBuf, source: io::Error },

    #[error("failed to create output file '{}': {source}", .path.display())]
    CreateOutput { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Bucket(#[from] BucketError),

    #[error("failed to serialize output record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),

    #[error("failed to write diagnostics: {0}")]
    Diagnostics(#[source] io::Error),
}

impl RunError {
    /// Classification of the error, `None` for I/O and serialization failures
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Configuration(_) => Some(ErrorKind::ConfigurationError),
            Self::Bucket(BucketError::Event(err)) => Some(err.kind()),
            _ => None,
        }
    }
}

/// What a run consumed and produced
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct RunSummary {
    pub input: BucketerStats,
    pub records: usize,
}

/// Validate the configuration, then read the input file and write the
/// moving averages to the configured output file or standard output.
///
/// Lines skipped because of `skip_invalid` are reported on `diagnostics`,
/// never on the output.
pub fn load_events_and_process<D: Write>(
    config: &Config,
    diagnostics: D,
) -> Result<RunSummary, RunError> {
    let window_size = config.validate()?;
    let input = File::open(&config.input_path).map_err(|source| RunError::OpenInput {
        path: config.input_path.clone(),
        source,
    })?;

    let writer: Box<dyn Write> = if let Some(output_path) = &config.output_path {
        let output = File::create(output_path).map_err(|source| RunError::CreateOutput {
            path: output_path.clone(),
            source,
        })?;
        Box::new(BufWriter::new(output))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };

    let summary = process_events(
        BufReader::new(input),
        window_size,
        config.bucketer_options(),
        writer,
        diagnostics,
    )?;
    info!(
        lines = summary.input.lines,
        events = summary.input.events,
        skipped = summary.input.skipped,
        buckets = summary.input.buckets,
        records = summary.records,
        "moving average computed"
    );
    Ok(summary)
}

/// Run the pipeline over an already opened input, one JSON object per line
/// on `output`.
pub fn process_events<R, W, D>(
    input: R,
    window_size: NonZeroUsize,
    options: BucketerOptions,
    mut output: W,
    mut diagnostics: D,
) -> Result<RunSummary, RunError>
where
    R: BufRead,
    W: Write,
    D: Write,
{
    let mut diagnostics_error = None;
    let mut records = 0;

    let mut averages = MinuteBucketer::new(input.lines(), options, |err: &EventError| {
        if let Err(write_err) = writeln!(diagnostics, "{}: {err}", err.kind()) {
            diagnostics_error.get_or_insert(write_err);
        }
    })
    .moving_average(window_size);

    for record in averages.by_ref() {
        let record = record?;
        serde_json::to_writer(&mut output, &record)?;
        output.write_all(b"\n")?;
        records += 1;
    }
    let input = *averages.source().stats();
    drop(averages);

    if let Some(err) = diagnostics_error {
        return Err(RunError::Diagnostics(err));
    }
    output.flush()?;
    Ok(RunSummary { input, records })
}
