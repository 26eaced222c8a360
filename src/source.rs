//! Sources of "file created" notifications.
//!
//! The reconciliation loop only depends on [`FileCreationSource`]. Native OS
//! notifications and periodic polling are both provided through `notify`;
//! [`ChannelSource`] lets callers push paths by hand.

use crate::logging::LogSink;
use notify::{Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Errors raised while subscribing to a directory.
#[derive(Debug)]
pub enum WatchError {
    /// The underlying watcher could not be created or attached.
    Notify { path: PathBuf, source: notify::Error },
    /// The source hands out a single subscription and it is already taken.
    AlreadySubscribed,
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Notify { path, source } => {
                write!(f, "Failed to watch {}: {}", path.display(), source)
            }
            Self::AlreadySubscribed => write!(f, "Source is already subscribed"),
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Notify { source, .. } => Some(source),
            Self::AlreadySubscribed => None,
        }
    }
}

/// A live stream of created paths.
///
/// Dropping the subscription stops the watcher behind it.
pub struct Subscription {
    receiver: Receiver<PathBuf>,
    watcher: Option<Box<dyn Watcher + Send>>,
}

impl Subscription {
    pub fn new(receiver: Receiver<PathBuf>, watcher: Option<Box<dyn Watcher + Send>>) -> Self {
        Self {
            receiver,
            watcher,
        }
    }

    /// Waits up to `timeout` for the next created path.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<PathBuf, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("watched", &self.watcher.is_some())
            .finish()
    }
}

/// Something that can report files created in a directory.
pub trait FileCreationSource {
    /// Starts delivering paths created directly inside `directory`.
    ///
    /// Created directories are delivered too; the loop skips them but still
    /// sweeps.
    fn subscribe(&mut self, directory: &Path) -> Result<Subscription, WatchError>;
}

fn is_creation(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_))
}

/// Builds the notify callback that forwards creations into `sender`.
fn forward_creations(
    sender: Sender<PathBuf>,
    log: LogSink,
) -> impl FnMut(notify::Result<Event>) + Send + 'static {
    move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if is_creation(&event.kind) {
                for path in event.paths {
                    // receiver gone means the loop is shutting down
                    let _ = sender.send(path);
                }
            }
        }
        Err(e) => log.in_scope(|| tracing::error!("Watch error: {}", e)),
    }
}

fn attach<W: Watcher + Send + 'static>(
    mut watcher: W,
    directory: &Path,
    receiver: Receiver<PathBuf>,
) -> Result<Subscription, WatchError> {
    watcher
        .watch(directory, RecursiveMode::NonRecursive)
        .map_err(|source| WatchError::Notify {
            path: directory.to_path_buf(),
            source,
        })?;
    Ok(Subscription::new(receiver, Some(Box::new(watcher))))
}

/// OS-native notifications (inotify, FSEvents, ReadDirectoryChangesW, ...).
#[derive(Debug, Clone)]
pub struct NativeSource {
    log: LogSink,
}

impl NativeSource {
    pub fn new(log: LogSink) -> Self {
        Self { log }
    }
}

impl FileCreationSource for NativeSource {
    fn subscribe(&mut self, directory: &Path) -> Result<Subscription, WatchError> {
        let (sender, receiver) = mpsc::channel();
        let watcher = notify::recommended_watcher(forward_creations(sender, self.log.clone()))
            .map_err(|source| WatchError::Notify {
                path: directory.to_path_buf(),
                source,
            })?;
        attach(watcher, directory, receiver)
    }
}

/// Fallback that rescans the directory every `interval`.
#[derive(Debug, Clone)]
pub struct PollingSource {
    interval: Duration,
    log: LogSink,
}

impl PollingSource {
    pub fn new(interval: Duration, log: LogSink) -> Self {
        Self { interval, log }
    }
}

impl FileCreationSource for PollingSource {
    fn subscribe(&mut self, directory: &Path) -> Result<Subscription, WatchError> {
        let (sender, receiver) = mpsc::channel();
        let config = notify::Config::default().with_poll_interval(self.interval);
        let watcher = PollWatcher::new(forward_creations(sender, self.log.clone()), config)
            .map_err(|source| WatchError::Notify {
                path: directory.to_path_buf(),
                source,
            })?;
        attach(watcher, directory, receiver)
    }
}

/// Native notifications when available, polling otherwise.
#[derive(Debug, Clone)]
pub struct AutoSource {
    native: NativeSource,
    polling: PollingSource,
}

impl AutoSource {
    pub fn new(poll_interval: Duration, log: LogSink) -> Self {
        Self {
            native: NativeSource::new(log.clone()),
            polling: PollingSource::new(poll_interval, log),
        }
    }
}

impl FileCreationSource for AutoSource {
    fn subscribe(&mut self, directory: &Path) -> Result<Subscription, WatchError> {
        match self.native.subscribe(directory) {
            Ok(subscription) => Ok(subscription),
            Err(e) => {
                self.native.log.in_scope(|| {
                    tracing::warn!("Native watcher unavailable ({}), falling back to polling", e)
                });
                self.polling.subscribe(directory)
            }
        }
    }
}

/// A source fed by hand through the paired [`Sender`].
///
/// Useful for embedding the loop behind another event producer.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: Option<Receiver<PathBuf>>,
}

impl ChannelSource {
    pub fn new() -> (Self, Sender<PathBuf>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                receiver: Some(receiver),
            },
            sender,
        )
    }
}

impl FileCreationSource for ChannelSource {
    fn subscribe(&mut self, _directory: &Path) -> Result<Subscription, WatchError> {
        self.receiver
            .take()
            .map(|receiver| Subscription::new(receiver, None))
            .ok_or(WatchError::AlreadySubscribed)
    }
}
