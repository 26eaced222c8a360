/// Collision-safe naming for files moved into a destination directory.
///
/// If `report.txt` is already taken, candidates are tried as
/// `report_000.txt`, `report_001.txt`, ... with the counter zero-padded to the
/// rule's padding width. Existing files are never overwritten.
use crate::routing::split_name;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns true if anything, including a dangling symlink, occupies `path`.
fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn numbered_name(stem: &OsStr, extension: Option<&OsStr>, counter: u64, width: usize) -> OsString {
    let mut name = stem.to_os_string();
    name.push(format!("_{counter:0width$}"));
    if let Some(extension) = extension {
        name.push(".");
        name.push(extension);
    }
    name
}

/// Computes destination paths that do not collide with existing entries.
pub struct CollisionResolver;

impl CollisionResolver {
    /// Returns a path inside `destination` that is free at the time of the call.
    ///
    /// The original name is used when it is free. Otherwise the counter starts
    /// at zero and increments until a free numbered name is found. There is no
    /// upper bound: once the counter needs more than `padding_width` digits the
    /// name simply grows wider.
    ///
    /// The check is not atomic with the later move; a file created in between
    /// is caught by the mover.
    pub fn resolve<S: AsRef<OsStr> + ?Sized>(
        destination: &Path,
        file_name: &S,
        padding_width: usize,
    ) -> PathBuf {
        let file_name = file_name.as_ref();
        let candidate = destination.join(file_name);
        if !is_occupied(&candidate) {
            return candidate;
        }

        let (stem, extension) = split_name(file_name);
        let capacity = u32::try_from(padding_width)
            .ok()
            .and_then(|width| 10u64.checked_pow(width));
        let mut counter: u64 = 0;

        loop {
            if capacity == Some(counter) {
                tracing::warn!(
                    destination = %destination.display(),
                    file = %Path::new(file_name).display(),
                    padding_width,
                    "Collision counter exceeded padding width, names will grow wider"
                );
            }

            let candidate = destination.join(numbered_name(stem, extension, counter, padding_width));
            if !is_occupied(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}
