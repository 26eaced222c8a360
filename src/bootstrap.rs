/// Creation of configured directories before routing starts.
use crate::logging::LogSink;
use crate::routing::RoutingRule;
use std::fs;
use std::path::{Path, PathBuf};

/// What the bootstrapper did.
#[derive(Debug, Default)]
pub struct BootstrapReport {
    /// Directories that were created.
    pub created: Vec<PathBuf>,
    /// Directories that could not be created, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl BootstrapReport {
    /// Destinations whose rules must be retired for this run.
    pub fn failed_paths(&self) -> Vec<PathBuf> {
        self.failed.iter().map(|(path, _)| path.clone()).collect()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ensures directories exist, logging each creation or failure.
#[derive(Debug, Clone)]
pub struct DirectoryBootstrapper {
    log: LogSink,
}

impl DirectoryBootstrapper {
    pub fn new(log: LogSink) -> Self {
        Self { log }
    }

    /// Creates every missing destination whose rule has `create_if_missing`.
    ///
    /// Rules without the flag are left alone even if their directory is
    /// missing; they stay unmatchable until someone creates it.
    pub fn ensure_destinations(&self, rules: &[RoutingRule]) -> BootstrapReport {
        let mut report = BootstrapReport::default();

        for rule in rules.iter().filter(|rule| rule.create_if_missing) {
            if rule.destination.is_dir() || report.created.contains(&rule.destination) {
                continue;
            }
            match self.ensure_dir(&rule.destination) {
                Ok(()) => report.created.push(rule.destination.clone()),
                Err(reason) => report.failed.push((rule.destination.clone(), reason)),
            }
        }

        report
    }

    /// Creates `path` and its parents, returning the failure reason if any.
    pub fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        self.log.in_scope(|| match fs::create_dir_all(path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "The {} directory was created", path.display());
                Ok(())
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "Failed to create directory {}: {}", path.display(), e);
                Err(e.to_string())
            }
        })
    }
}
