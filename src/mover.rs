/// Relocation of a single file.
///
/// On one filesystem the mover hard-links the target and then unlinks the
/// source, so an existing target is refused atomically instead of replaced.
/// Filesystems without hard links get a checked rename; another filesystem
/// gets copy-then-delete. Whatever happens, the file ends up in exactly one
/// place: on failure the source is left where it was.
use crate::logging::LogSink;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Errors that can occur while moving a file.
#[derive(Debug)]
pub enum MoveError {
    /// Something already exists at the target path.
    TargetExists { target: PathBuf },
    /// The link or rename itself failed (permissions, missing source, ...).
    RenameFailed {
        source: PathBuf,
        target: PathBuf,
        source_error: io::Error,
    },
    /// Copying across filesystems failed; the partial copy was removed.
    CopyFailed {
        source: PathBuf,
        target: PathBuf,
        source_error: io::Error,
    },
    /// The target was written but the original could not be removed; the
    /// target was rolled back.
    SourceRemovalFailed {
        source: PathBuf,
        source_error: io::Error,
    },
}

impl std::fmt::Display for MoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetExists { target } => {
                write!(f, "Target {} already exists", target.display())
            }
            Self::RenameFailed {
                source,
                target,
                source_error,
            } => write!(
                f,
                "Failed to move {} to {}: {}",
                source.display(),
                target.display(),
                source_error
            ),
            Self::CopyFailed {
                source,
                target,
                source_error,
            } => write!(
                f,
                "Failed to copy {} to {}: {}",
                source.display(),
                target.display(),
                source_error
            ),
            Self::SourceRemovalFailed {
                source,
                source_error,
            } => write!(
                f,
                "Could not remove {} after moving it: {}",
                source.display(),
                source_error
            ),
        }
    }
}

impl std::error::Error for MoveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TargetExists { .. } => None,
            Self::RenameFailed { source_error, .. }
            | Self::CopyFailed { source_error, .. }
            | Self::SourceRemovalFailed { source_error, .. } => Some(source_error),
        }
    }
}

/// Result type for move operations.
pub type MoveResult<T> = Result<T, MoveError>;

/// Moves files and reports each outcome to its log sink.
#[derive(Debug, Clone)]
pub struct Mover {
    log: LogSink,
}

impl Mover {
    pub fn new(log: LogSink) -> Self {
        Self { log }
    }

    /// Moves `source` to `target`, preserving its bytes.
    ///
    /// Emits an `info` event on success and an `error` event on failure.
    /// Errors are returned to the caller but never leave a partial file
    /// behind.
    pub fn relocate(&self, source: &Path, target: &Path) -> MoveResult<()> {
        let result = Self::relocate_quietly(source, target);

        self.log.in_scope(|| match &result {
            Ok(()) => tracing::info!(
                source = %source.display(),
                target = %target.display(),
                "File {} moved to {}",
                source.display(),
                target.display()
            ),
            Err(e) => tracing::error!(
                source = %source.display(),
                target = %target.display(),
                "{}",
                e
            ),
        });

        result
    }

    fn relocate_quietly(source: &Path, target: &Path) -> MoveResult<()> {
        match fs::hard_link(source, target) {
            Ok(()) => remove_source(source, target),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(MoveError::TargetExists {
                target: target.to_path_buf(),
            }),
            Err(e) if e.kind() == ErrorKind::CrossesDevices => copy_then_remove(source, target),
            Err(e) if links_unsupported(&e) => rename_if_free(source, target),
            Err(e) => Err(MoveError::RenameFailed {
                source: source.to_path_buf(),
                target: target.to_path_buf(),
                source_error: e,
            }),
        }
    }
}

/// FAT, exFAT and some network mounts refuse `link(2)` with EPERM or ENOTSUP.
fn links_unsupported(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::Unsupported | ErrorKind::PermissionDenied)
}

/// Drops the source name once the target is in place.
fn remove_source(source: &Path, target: &Path) -> MoveResult<()> {
    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(target);
        return Err(MoveError::SourceRemovalFailed {
            source: source.to_path_buf(),
            source_error: e,
        });
    }
    Ok(())
}

/// Fallback for filesystems without hard links.
///
/// The existence check and the rename are two steps, so a file appearing in
/// between can still be replaced here.
fn rename_if_free(source: &Path, target: &Path) -> MoveResult<()> {
    // rename(2) silently replaces an existing target on unix
    if fs::symlink_metadata(target).is_ok() {
        return Err(MoveError::TargetExists {
            target: target.to_path_buf(),
        });
    }

    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => copy_then_remove(source, target),
        Err(e) => Err(MoveError::RenameFailed {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            source_error: e,
        }),
    }
}

/// Cross-filesystem fallback for [`Mover::relocate`].
fn copy_then_remove(source: &Path, target: &Path) -> MoveResult<()> {
    copy_new(source, target).map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            return MoveError::TargetExists {
                target: target.to_path_buf(),
            };
        }
        MoveError::CopyFailed {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            source_error: e,
        }
    })?;

    remove_source(source, target)
}

/// Copies `source` into a freshly created `target`, failing if it exists.
///
/// A partial target is removed, but only one this call created.
fn copy_new(source: &Path, target: &Path) -> io::Result<()> {
    let mut reader = File::open(source)?;
    let permissions = reader.metadata()?.permissions();
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)?;

    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.set_permissions(permissions))
        .and_then(|()| writer.sync_all());
    if copied.is_err() {
        drop(writer);
        let _ = fs::remove_file(target);
    }
    copied
}
