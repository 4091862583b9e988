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

use clap::Parser;
use delivery_moving_average::{load_events_and_process, Config};
use std::{io, path::PathBuf, process::ExitCode};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input JSON Lines file, one delivery event per line
    #[clap(long = "input_file", visible_alias = "input-file")]
    input_file: PathBuf,

    /// Number of minutes covered by each moving average
    #[clap(
        long = "window_size",
        visible_alias = "window-size",
        allow_negative_numbers = true
    )]
    window_size: i64,

    /// Require event_name to be 'translation_delivered'
    #[clap(long = "strict_event_name", visible_alias = "strict-event-name")]
    strict_event_name: bool,

    /// Skip invalid lines instead of failing, errors are reported on stderr
    #[clap(long = "skip_invalid", visible_alias = "skip-invalid")]
    skip_invalid: bool,

    /// Check that timestamps are non-decreasing
    #[clap(long = "enforce_order", visible_alias = "enforce-order")]
    enforce_order: bool,

    /// JSON Lines output file path, if not specified
    /// output will be directed to stdout
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Maximum level of the logs written to stderr
    #[clap(long, default_value = "warn")]
    log_level: Level,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            input_path: cli.input_file,
            output_path: cli.output,
            window_size: cli.window_size,
            strict_event_name: cli.strict_event_name,
            skip_invalid: cli.skip_invalid,
            enforce_order: cli.enforce_order,
        }
    }
}

fn init_tracing(level: Level) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(cli.log_level) {
        eprintln!("setting default tracing subscriber failed: {err}");
        return ExitCode::FAILURE;
    }

    let config = Config::from(cli);
    match load_events_and_process(&config, io::stderr()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            match err.kind() {
                Some(kind) => eprintln!("{kind}: {err}"),
                None => eprintln!("{err}"),
            }
            ExitCode::FAILURE
        }
    }
}
