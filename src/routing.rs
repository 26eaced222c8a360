//! Extension based routing.
//!
//! A [`RoutingTable`] is an ordered list of [`RoutingRule`]s. Lookup is a
//! linear first-match scan in configuration order: the first rule whose
//! destination directory exists *right now* and whose extension set contains
//! the file's extension wins.
//!
//! # Examples
//!
//! ```
//! use tidywatch::routing::extract_extension;
//!
//! assert_eq!(extract_extension("report.txt"), Some("txt"));
//! // Everything after the first dot, other dots included.
//! assert_eq!(extract_extension("backup.tar.gz"), Some("tar.gz"));
//! assert_eq!(extract_extension("README"), None);
//! ```

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Default number of digits used when numbering colliding file names.
pub const DEFAULT_PADDING_WIDTH: usize = 3;

/// Widest accepted counter; a `u64` never needs more digits.
pub const MAX_PADDING_WIDTH: usize = 20;

/// Maps a set of extensions to one destination directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    /// Extensions without a leading dot, compared case-sensitively.
    pub extensions: HashSet<String>,
    pub destination: PathBuf,
    /// Digits used for the collision counter in this destination.
    pub padding_width: usize,
    /// Whether the bootstrapper should create `destination` when missing.
    pub create_if_missing: bool,
}

impl RoutingRule {
    /// Builds a rule, stripping a leading `.` from each extension.
    pub fn new<I, S>(destination: impl Into<PathBuf>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_string())
                .collect(),
            destination: destination.into(),
            padding_width: DEFAULT_PADDING_WIDTH,
            create_if_missing: false,
        }
    }

    pub fn with_padding_width(mut self, padding_width: usize) -> Self {
        self.padding_width = padding_width;
        self
    }

    pub fn with_create_if_missing(mut self, create_if_missing: bool) -> Self {
        self.create_if_missing = create_if_missing;
        self
    }

    /// Returns true if this rule lists `extension`.
    pub fn matches_extension(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }
}

/// The outcome of a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route<'a> {
    pub destination: &'a Path,
    pub padding_width: usize,
}

/// Splits a file name at its first dot into `(stem, extension)`.
///
/// Works on raw OS names, so a stem that is not valid UTF-8 still splits.
///
/// ```
/// use std::ffi::OsStr;
/// use tidywatch::routing::split_name;
///
/// assert_eq!(split_name("site.tar.gz"), (OsStr::new("site"), Some(OsStr::new("tar.gz"))));
/// assert_eq!(split_name("LICENSE"), (OsStr::new("LICENSE"), None));
/// ```
pub fn split_name<S: AsRef<OsStr> + ?Sized>(file_name: &S) -> (&OsStr, Option<&OsStr>) {
    let file_name = file_name.as_ref();
    let bytes = file_name.as_encoded_bytes();
    match bytes.iter().position(|&b| b == b'.') {
        // SAFETY: both halves are split next to an ASCII dot of a valid OsStr.
        Some(dot) => unsafe {
            (
                OsStr::from_encoded_bytes_unchecked(&bytes[..dot]),
                Some(OsStr::from_encoded_bytes_unchecked(&bytes[dot + 1..])),
            )
        },
        None => (file_name, None),
    }
}

/// Returns the substring after the *first* dot of `file_name`.
///
/// Multi-dot names keep every later dot in the extension, so
/// `archive.tar.gz` yields `tar.gz`. Names without a dot, and names whose
/// extension is not valid UTF-8, have no extension.
pub fn extract_extension<S: AsRef<OsStr> + ?Sized>(file_name: &S) -> Option<&str> {
    split_name(file_name).1?.to_str()
}

/// Ordered, read-only set of routing rules.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    rules: Vec<RoutingRule>,
}

impl RoutingTable {
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns a table without the rules whose destination is in `disabled`.
    ///
    /// Used after bootstrap to retire rules whose directory could not be
    /// created; those rules stay unmatchable for the life of the process.
    pub fn without_destinations(self, disabled: &[PathBuf]) -> Self {
        Self {
            rules: self
                .rules
                .into_iter()
                .filter(|rule| !disabled.contains(&rule.destination))
                .collect(),
        }
    }

    /// Resolves the destination for `file_name`.
    ///
    /// Returns `None` if the name has no extension, if no rule lists the
    /// extension, or if every listing rule points at a missing directory.
    pub fn resolve<S: AsRef<OsStr> + ?Sized>(&self, file_name: &S) -> Option<Route<'_>> {
        let extension = extract_extension(file_name)?;

        self.rules
            .iter()
            .find(|rule| rule.destination.is_dir() && rule.matches_extension(extension))
            .map(|rule| Route {
                destination: &rule.destination,
                padding_width: rule.padding_width,
            })
    }
}
