//! Diagnostic logging. Everything goes to stderr; stdout is reserved for the
//! fact document.

use crate::catalog::GATHERED_CONFIG_TARGET;
use clap::ValueEnum;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "warn"
    }
}

/// What the subscriber should let through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// `--debug`: everything at debug and above, `RUST_LOG` ignored.
    pub debug: bool,
    /// Line format.
    pub format: LogFormat,
    /// Let the gathered config dump through whatever the level.
    pub gathered_config: bool,
}

fn gathered_config_directive() -> Option<Directive> {
    format!("{}=info", GATHERED_CONFIG_TARGET).parse().ok()
}

fn env_filter(options: &LogOptions) -> EnvFilter {
    let filter = if options.debug {
        EnvFilter::new(default_directive(true))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(false)))
    };
    match gathered_config_directive() {
        Some(directive) if options.gathered_config => filter.add_directive(directive),
        _ => filter,
    }
}

/// Installs the global subscriber. `--debug` wins over `RUST_LOG`.
pub fn init(options: &LogOptions) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(options));
    match options.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    }
}
