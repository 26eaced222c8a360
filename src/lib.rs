//! tidywatch - route newly created files out of a watched directory
//!
//! This library watches a source directory and moves each file into the first
//! configured destination directory that accepts its extension, renaming on
//! collision instead of overwriting. An initial sweep handles files already
//! present; every creation notification routes the new file and then sweeps
//! again, which doubles as the retry mechanism for anything left behind.

pub mod bootstrap;
pub mod cli;
pub mod collision;
pub mod config;
pub mod file_organizer;
pub mod logging;
pub mod mover;
pub mod output;
pub mod reconcile;
pub mod routing;
pub mod source;

pub use bootstrap::{BootstrapReport, DirectoryBootstrapper};
pub use collision::CollisionResolver;
pub use config::{ConfigError, IgnoreRules, OrganizerConfig};
pub use file_organizer::{FileOrganizer, OrganizeError, WatchMode};
pub use logging::LogSink;
pub use mover::{MoveError, Mover};
pub use reconcile::{FileOutcome, ReconciliationLoop, SweepReport};
pub use routing::{Route, RoutingRule, RoutingTable};
pub use source::{
    AutoSource, ChannelSource, FileCreationSource, NativeSource, PollingSource, Subscription,
    WatchError,
};

pub use cli::{OrganizeCommand, run_cli};
