//! Injected logging capability.
//!
//! The library never installs a global subscriber. Components that log are
//! handed a [`LogSink`] when they are built and emit their events inside
//! [`LogSink::in_scope`], so the embedding process decides where events go.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Dispatch;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "tidywatch=info";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A cloneable handle to the dispatcher that receives the crate's events.
#[derive(Clone)]
pub struct LogSink {
    dispatch: Dispatch,
}

impl LogSink {
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Captures whatever dispatcher is the default on the calling thread.
    pub fn current() -> Self {
        Self::new(tracing::dispatcher::get_default(|dispatch| dispatch.clone()))
    }

    /// A sink that drops every event.
    pub fn none() -> Self {
        Self::new(Dispatch::none())
    }

    /// Runs `f` with this sink as the default dispatcher.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}

/// Where the binary sends its log output.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Append plain-text events to this file in addition to stderr.
    pub log_file: Option<PathBuf>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Builds the dispatcher used by the command-line binary.
///
/// Events go to stderr, and to `options.log_file` when one is given.
/// The filter honours `RUST_LOG` and defaults to `tidywatch=info`.
///
/// # Errors
///
/// Returns the I/O error if the log file cannot be opened for appending.
pub fn build_dispatch(options: &LogOptions) -> io::Result<Dispatch> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_filter(env_filter());

    let file_layer = match &options.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                    .with_filter(env_filter()),
            )
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer);

    Ok(Dispatch::new(subscriber))
}
