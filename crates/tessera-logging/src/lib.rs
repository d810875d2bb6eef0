//! Structured logging for Tessera
//!
//! Wraps `tracing-subscriber` so every binary and test installs the same
//! subscriber shape.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines for log aggregation (default)
//! - **Pretty Console**: Human-readable output for development
//! - **File Rotation**: Daily/hourly rotation via tracing-appender
//! - **RUST_LOG**: Overrides every configured level when set
//!
//! # Quick Start
//!
//! ```ignore
//! use tessera_logging::{TesseraSubscriberBuilder, LogConfig};
//!
//! // Simple setup with defaults (JSONL to console)
//! TesseraSubscriberBuilder::new().init();
//!
//! // Development mode with pretty human-readable output
//! let _guard = TesseraSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;
pub mod error;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use error::LogInitError;
pub use tracing_appender::non_blocking::WorkerGuard;

use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Builder for configuring and initializing the Tessera logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
pub struct TesseraSubscriberBuilder {
    config: LogConfig,
}

impl TesseraSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// RUST_LOG if set, otherwise `level` or the default level
    fn filter(&self, level: Option<&str>) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or(&self.config.default_level)))
    }

    fn console_layer(&self) -> Option<BoxedLayer> {
        let console = &self.config.console;
        if !console.enabled {
            return None;
        }

        let filter = self.filter(console.level.as_deref());
        let layer = if console.pretty {
            tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_filter(filter)
                .boxed()
        } else {
            layers::jsonl_layer(std::io::stdout, &self.config.jsonl)
                .with_filter(filter)
                .boxed()
        };
        Some(layer)
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns a guard that must be kept alive for the duration of the
    /// program when file output is enabled.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogInitError> {
        let mut stack: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if let Some(layer) = self.console_layer() {
            stack.push(layer);
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = layers::file_writer(file_config)?;
            guard = Some(file_guard);
            stack.push(
                layers::jsonl_layer(writer, &self.config.jsonl)
                    .with_filter(self.filter(None))
                    .boxed(),
            );
        }

        tracing_subscriber::registry().with(stack).try_init()?;
        Ok(guard)
    }

    /// Initialize the subscriber globally
    ///
    /// Failures (a subscriber already set, an unwritable log directory) are
    /// reported on stderr and leave logging as it was.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {e}");
                None
            }
        }
    }
}

impl Default for TesseraSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() {
    TesseraSubscriberBuilder::new().init();
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() {
    TesseraSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init();
}

/// Initialize logging for testing (minimal output)
pub fn init_testing() {
    let _ = TesseraSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
