//! Layer and writer construction
//!
//! Builds the JSONL formatting layer shared by console and file output,
//! and the non-blocking file writer behind it.

use std::fs::{self, OpenOptions};

use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{
    self, MakeWriter,
    format::{Format, Json, JsonFields},
};
use tracing_subscriber::registry::LookupSpan;

use crate::config::{FileConfig, JsonlConfig, RotationStrategy};
use crate::error::LogInitError;

/// Create a JSONL formatting layer writing to `writer`
///
/// Optimized for log aggregation: one JSON object per line, event fields
/// flattened to the root by default.
pub fn jsonl_layer<S, W>(writer: W, config: &JsonlConfig) -> fmt::Layer<S, JsonFields, Format<Json>, W>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fmt::layer()
        .json()
        .with_current_span(config.include_current_span)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
        .with_writer(writer)
}

/// Open the non-blocking file writer described by `config`
///
/// `Never` appends to a single `<prefix>.log`; the rolling strategies append
/// to `<prefix>.<date>.jsonl` and prune beyond `max_files`.
pub fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogInitError> {
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            fs::create_dir_all(&config.directory)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(config.directory.join(format!("{}.log", config.prefix)))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.as_str())
        .filename_suffix("jsonl");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }

    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}
