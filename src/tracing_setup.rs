//! Subscriber installation for the rig binary.
//!
//! The library crates only emit events under the spans they are handed at
//! construction (`velocity_sim`, `camera_sim`, `orchestrator` and its loops).
//! Installing a global subscriber is left to the binary, which calls
//! [`init_from_config`] once after the configuration is loaded.
//!
//! `RUST_LOG` wins over `application.log_level` when it is set.
//!
//! ```no_run
//! use inline_inspection::{config::RigConfig, tracing_setup};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RigConfig::load()?;
//! tracing_setup::init_from_config(&config)?;
//! tracing::info!("Rig started");
//! # Ok(())
//! # }
//! ```

use crate::config::RigConfig;
use crate::error::{RigError, RigResult};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::NoSubscriber;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedFmtLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// How events are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Multi-line, colored; for a terminal on the bench
    Pretty,
    /// One line per event, never colored
    Compact,
    /// Newline-delimited JSON for log shipping
    Json,
}

/// Options for the global subscriber.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Fallback level when `RUST_LOG` is unset
    pub level: Level,
    pub format: OutputFormat,
    /// Emit an event when a span opens and closes (loop lifetimes, dispatch tasks)
    pub with_span_events: bool,
    pub with_file_and_line: bool,
    pub with_thread_names: bool,
    /// Only honoured by [`OutputFormat::Pretty`]
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl TracingConfig {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            format: OutputFormat::Pretty,
            with_span_events: false,
            with_file_and_line: false,
            with_thread_names: true,
            with_ansi: true,
        }
    }

    /// Level and format from the `[application]` section.
    pub fn from_rig_config(config: &RigConfig) -> RigResult<Self> {
        let level = parse_log_level(&config.application.log_level)?;
        Ok(Self::new(level).with_format(config.application.log_format.into()))
    }

    pub fn with_format(self, format: OutputFormat) -> Self {
        Self { format, ..self }
    }

    pub fn with_span_events(self, with_span_events: bool) -> Self {
        Self {
            with_span_events,
            ..self
        }
    }

    pub fn with_ansi(self, with_ansi: bool) -> Self {
        Self { with_ansi, ..self }
    }

    fn span_events(&self) -> FmtSpan {
        if self.with_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .from_env_lossy()
    }

    fn fmt_layer(&self) -> BoxedFmtLayer {
        let layer = fmt::layer()
            .with_span_events(self.span_events())
            .with_file(self.with_file_and_line)
            .with_line_number(self.with_file_and_line)
            .with_thread_names(self.with_thread_names);

        match self.format {
            OutputFormat::Pretty => layer.pretty().with_ansi(self.with_ansi).boxed(),
            OutputFormat::Compact => layer.compact().with_ansi(false).boxed(),
            OutputFormat::Json => layer.json().boxed(),
        }
    }
}

/// Install the subscriber described by the `[application]` section.
pub fn init_from_config(config: &RigConfig) -> RigResult<()> {
    init(TracingConfig::from_rig_config(config)?)
}

/// Install the global subscriber.
///
/// A second call keeps the subscriber that is already installed and returns
/// `Ok(())`.
pub fn init(config: TracingConfig) -> RigResult<()> {
    let installed = tracing_subscriber::registry()
        .with(config.fmt_layer().with_filter(config.env_filter()))
        .try_init();

    match installed {
        Ok(()) => Ok(()),
        Err(_) if subscriber_installed() => {
            tracing::debug!("Global subscriber already installed, keeping it");
            Ok(())
        }
        Err(e) => Err(RigError::Configuration(format!(
            "cannot install tracing subscriber: {e}"
        ))),
    }
}

fn subscriber_installed() -> bool {
    tracing::dispatcher::get_default(|current| !current.is::<NoSubscriber>())
}

fn parse_log_level(level: &str) -> RigResult<Level> {
    level.trim().parse::<Level>().map_err(|_| {
        RigError::Configuration(format!(
            "application.log_level '{level}' is not one of trace, debug, info, warn, error"
        ))
    })
}
