//! The reconciliation loop.
//!
//! Every trigger ends in a full sweep of the source directory. A file that
//! could not be routed (unknown extension, missing destination, failed move)
//! simply stays where it is and is tried again on the next sweep; there is no
//! retry queue and no backoff.

use crate::collision::CollisionResolver;
use crate::config::IgnoreRules;
use crate::logging::LogSink;
use crate::mover::Mover;
use crate::routing::RoutingTable;
use crate::source::Subscription;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

/// What happened to one file during a routing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Relocated to `to`.
    Moved { from: PathBuf, to: PathBuf },
    /// No rule applies, or every applicable destination is missing.
    Unmatched(PathBuf),
    /// A rule applied but the move failed.
    Failed { path: PathBuf, reason: String },
    /// Matched an `ignore` pattern.
    Ignored(PathBuf),
    /// Not a regular file in the source directory (anymore).
    Skipped(PathBuf),
}

/// Outcomes of a sweep, grouped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub moved: Vec<(PathBuf, PathBuf)>,
    pub unmatched: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub ignored: Vec<PathBuf>,
}

impl SweepReport {
    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Moved { from, to } => self.moved.push((from, to)),
            FileOutcome::Unmatched(path) => self.unmatched.push(path),
            FileOutcome::Failed { path, reason } => self.failed.push((path, reason)),
            FileOutcome::Ignored(path) => self.ignored.push(path),
            FileOutcome::Skipped(_) => {}
        }
    }

    pub fn merge(&mut self, other: SweepReport) {
        self.moved.extend(other.moved);
        self.unmatched.extend(other.unmatched);
        self.failed.extend(other.failed);
        self.ignored.extend(other.ignored);
    }

    /// Returns the total number of files that were looked at.
    pub fn total_processed(&self) -> usize {
        self.moved.len() + self.unmatched.len() + self.failed.len() + self.ignored.len()
    }

    /// Returns true if nothing was left behind because of an error.
    pub fn is_complete_success(&self) -> bool {
        self.unmatched.is_empty() && self.failed.is_empty()
    }
}

/// Routes files out of one source directory.
#[derive(Debug)]
pub struct ReconciliationLoop {
    source_dir: PathBuf,
    table: RoutingTable,
    ignore: IgnoreRules,
    mover: Mover,
    tick: Duration,
    log: LogSink,
}

impl ReconciliationLoop {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        table: RoutingTable,
        tick: Duration,
        log: LogSink,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            table,
            ignore: IgnoreRules::default(),
            mover: Mover::new(log.clone()),
            tick,
            log,
        }
    }

    pub fn with_ignore(mut self, ignore: IgnoreRules) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    /// Routes the file called `file_name` in the source directory.
    ///
    /// The name is used as the OS hands it over; a stem that is not valid
    /// UTF-8 still routes by its extension.
    pub fn route_file<S: AsRef<OsStr> + ?Sized>(&self, file_name: &S) -> FileOutcome {
        let file_name = file_name.as_ref();
        let path = self.source_dir.join(file_name);
        let display_name = file_name.to_string_lossy();

        // an earlier sweep may already have moved it
        if !path.is_file() {
            self.log.in_scope(|| {
                tracing::debug!(path = %path.display(), "Skipping entry that is not a file")
            });
            return FileOutcome::Skipped(path);
        }

        if self.ignore.is_ignored(&display_name) {
            self.log
                .in_scope(|| tracing::debug!(path = %path.display(), "Ignoring file"));
            return FileOutcome::Ignored(path);
        }

        let Some(route) = self.table.resolve(file_name) else {
            self.log.in_scope(|| {
                tracing::error!(
                    file = %display_name,
                    "The file {} has a not recognized extension or target directory does not exist.",
                    display_name
                )
            });
            return FileOutcome::Unmatched(path);
        };

        let target = self.log.in_scope(|| {
            CollisionResolver::resolve(route.destination, file_name, route.padding_width)
        });

        match self.mover.relocate(&path, &target) {
            Ok(()) => FileOutcome::Moved {
                from: path,
                to: target,
            },
            Err(e) => FileOutcome::Failed {
                path,
                reason: e.to_string(),
            },
        }
    }

    /// Lists the source directory (non-recursively) and routes every file.
    ///
    /// Entries are visited in file name order. A listing failure is logged
    /// and produces an empty report.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let entries = match fs::read_dir(&self.source_dir) {
            Ok(entries) => entries,
            Err(e) => {
                self.log.in_scope(|| {
                    tracing::error!(
                        "Error reading directory {}: {}",
                        self.source_dir.display(),
                        e
                    )
                });
                return report;
            }
        };

        let mut names: Vec<OsString> = entries
            .flatten()
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name())
            .collect();
        names.sort();

        for name in names {
            report.record(self.route_file(&name));
        }

        report
    }

    /// Reacts to one creation notification.
    ///
    /// The named file is routed first, then the whole directory is swept so
    /// that anything left behind earlier gets another attempt. A created
    /// directory is skipped and only triggers the sweep.
    pub fn handle_created(&self, created: &Path) -> SweepReport {
        let mut report = SweepReport::default();

        if let Some(name) = created.file_name() {
            report.record(self.route_file(name));
        }
        report.merge(self.sweep());

        report
    }

    /// Consumes notifications until `shutdown` is set or the subscription ends.
    ///
    /// Each notification is handled to completion before the flag is looked
    /// at again. Between notifications the loop wakes up every tick to check
    /// the flag.
    pub fn run(&self, subscription: Subscription, shutdown: &AtomicBool) {
        self.log.in_scope(|| {
            tracing::info!("Observer started");
            tracing::info!("Source dir {}", self.source_dir.display());
        });

        while !shutdown.load(Ordering::SeqCst) {
            match subscription.recv_timeout(self.tick) {
                Ok(created) => {
                    self.handle_created(&created);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.log.in_scope(|| tracing::debug!("Idle tick"));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.log
                        .in_scope(|| tracing::warn!("Notification source disconnected"));
                    break;
                }
            }
        }

        drop(subscription);
        self.log.in_scope(|| tracing::info!("Observer stopped"));
    }
}
