/// Process-level entry point.
///
/// [`FileOrganizer`] loads the configuration, prepares the directories and
/// records whether the result is usable in a `status` / `status_message`
/// pair. Callers check the status and then call [`FileOrganizer::start`],
/// which blocks until Ctrl+C.
use crate::bootstrap::{BootstrapReport, DirectoryBootstrapper};
use crate::config::OrganizerConfig;
use crate::logging::LogSink;
use crate::reconcile::{ReconciliationLoop, SweepReport};
use crate::source::{AutoSource, FileCreationSource, PollingSource, WatchError};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Errors that stop the organizer from entering its loop.
#[derive(Debug)]
pub enum OrganizeError {
    /// The configuration could not be used; carries the status message.
    ConfigInvalid(String),
    /// Subscribing to the source directory failed.
    Watch(WatchError),
    /// The Ctrl+C handler could not be installed.
    Signal(String),
}

impl std::fmt::Display for OrganizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigInvalid(message) => write!(f, "Configuration not usable: {}", message),
            Self::Watch(e) => write!(f, "{}", e),
            Self::Signal(reason) => write!(f, "Failed to install signal handler: {}", reason),
        }
    }
}

impl std::error::Error for OrganizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Watch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WatchError> for OrganizeError {
    fn from(e: WatchError) -> Self {
        Self::Watch(e)
    }
}

/// Result type for organizer operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// How [`FileOrganizer::start`] learns about new files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMode {
    /// Native notifications, polling if they are unavailable.
    #[default]
    Auto,
    /// Always poll every `sleep_time` seconds.
    Poll,
}

/// Loads the configuration once and runs the reconciliation loop.
pub struct FileOrganizer {
    status: bool,
    status_message: String,
    config: Option<OrganizerConfig>,
    bootstrap: BootstrapReport,
    reconciler: Option<ReconciliationLoop>,
    initial_sweep: bool,
    watch_mode: WatchMode,
    log: LogSink,
}

impl FileOrganizer {
    /// Loads the configuration at `config_path` and prepares directories.
    ///
    /// Never fails: problems are reported through [`status`](Self::status)
    /// and [`status_message`](Self::status_message).
    pub fn new(config_path: &Path, log: LogSink) -> Self {
        match OrganizerConfig::load(config_path) {
            Ok(config) => Self::from_config(config, log),
            Err(e) => Self::invalid(e.to_string(), None, log),
        }
    }

    /// Prepares directories for an already loaded configuration.
    pub fn from_config(config: OrganizerConfig, log: LogSink) -> Self {
        let ignore = match config.ignore_patterns() {
            Ok(ignore) => ignore,
            Err(e) => return Self::invalid(e.to_string(), Some(config), log),
        };

        let bootstrapper = DirectoryBootstrapper::new(log.clone());
        let source = config.source_path();
        if !source.is_dir() {
            if !config.source_dir.create {
                let message = format!("The source directory {} does not exist", source.display());
                return Self::invalid(message, Some(config), log);
            }
            if let Err(reason) = bootstrapper.ensure_dir(source) {
                let message = format!(
                    "The source directory {} could not be created: {}",
                    source.display(),
                    reason
                );
                return Self::invalid(message, Some(config), log);
            }
        }

        let bootstrap = bootstrapper.ensure_destinations(&config.rules());
        let table = config
            .routing_table()
            .without_destinations(&bootstrap.failed_paths());
        let reconciler =
            ReconciliationLoop::new(source, table, config.poll_interval(), log.clone())
                .with_ignore(ignore);

        Self {
            status: true,
            status_message: "Ok".to_string(),
            config: Some(config),
            bootstrap,
            reconciler: Some(reconciler),
            initial_sweep: true,
            watch_mode: WatchMode::default(),
            log,
        }
    }

    fn invalid(message: String, config: Option<OrganizerConfig>, log: LogSink) -> Self {
        log.in_scope(|| tracing::error!("{}", message));
        Self {
            status: false,
            status_message: message,
            config,
            bootstrap: BootstrapReport::default(),
            reconciler: None,
            initial_sweep: true,
            watch_mode: WatchMode::default(),
            log,
        }
    }

    /// Whether the startup sweep runs before waiting for notifications.
    pub fn with_initial_sweep(mut self, initial_sweep: bool) -> Self {
        self.initial_sweep = initial_sweep;
        self
    }

    pub fn with_watch_mode(mut self, watch_mode: WatchMode) -> Self {
        self.watch_mode = watch_mode;
        self
    }

    /// True when the configuration was usable.
    pub fn status(&self) -> bool {
        self.status
    }

    /// `"Ok"`, or the reason the configuration is not usable.
    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn config(&self) -> Option<&OrganizerConfig> {
        self.config.as_ref()
    }

    pub fn bootstrap_report(&self) -> &BootstrapReport {
        &self.bootstrap
    }

    fn reconciler(&self) -> OrganizeResult<&ReconciliationLoop> {
        self.reconciler
            .as_ref()
            .ok_or_else(|| OrganizeError::ConfigInvalid(self.status_message.clone()))
    }

    /// Performs a single full sweep without watching.
    pub fn sweep_once(&self) -> OrganizeResult<SweepReport> {
        Ok(self.reconciler()?.sweep())
    }

    /// Runs the loop until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Refuses to run when the status is invalid. Also fails if the signal
    /// handler or the watcher cannot be installed.
    pub fn start(&self) -> OrganizeResult<()> {
        let reconciler = self.reconciler()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let log = self.log.clone();
        ctrlc::set_handler(move || {
            log.in_scope(|| tracing::info!("Received Ctrl+C, stopping observer..."));
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| OrganizeError::Signal(e.to_string()))?;

        let interval = reconciler.tick_interval();
        match self.watch_mode {
            WatchMode::Auto => {
                self.start_with(&mut AutoSource::new(interval, self.log.clone()), &shutdown)
            }
            WatchMode::Poll => {
                self.start_with(&mut PollingSource::new(interval, self.log.clone()), &shutdown)
            }
        }
    }

    /// Runs the loop on `source` until `shutdown` is set or the source ends.
    ///
    /// The subscription is opened before the startup sweep so that files
    /// created during the sweep still produce a notification.
    pub fn start_with<S: FileCreationSource>(
        &self,
        source: &mut S,
        shutdown: &AtomicBool,
    ) -> OrganizeResult<()> {
        let reconciler = self.reconciler()?;
        let subscription = source.subscribe(reconciler.source_dir())?;

        if self.initial_sweep {
            reconciler.sweep();
        }
        reconciler.run(subscription, shutdown);

        Ok(())
    }
}
