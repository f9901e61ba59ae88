//! Host path normalization shared by naming, mount planning and settings.
//!
//! All helpers are lexical: symlinks are never resolved, so the same string a
//! user typed always normalizes to the same absolute path.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;
use path_clean::PathClean;

/// Returns the invoking user's home directory, if it can be determined.
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// Expands a leading `~` (or `~/...`) against `home`.
///
/// Paths that are not valid UTF-8 are returned unchanged.
#[must_use]
pub fn expand_home(path: &Path, home: &Path) -> PathBuf {
    let Some(raw) = path.to_str() else {
        return path.to_path_buf();
    };
    let expanded = shellexpand::tilde_with_context(raw, || home.to_str());
    PathBuf::from(expanded.as_ref())
}

/// Makes `path` absolute relative to `base` and removes `.` and `..` components.
#[must_use]
pub fn absolutize_from(path: &Path, base: &Path) -> PathBuf {
    path.absolutize_from(base)
        .map_or_else(|_| base.join(path).clean(), Cow::into_owned)
}

/// Expands `~` against `home` and makes `path` absolute relative to the
/// current directory.
#[must_use]
pub fn absolutize(path: &Path, home: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    absolutize_from(&expand_home(path, home), &cwd)
}

/// Lexically normalizes a path: drops `.`, resolves `..` against the preceding
/// component and strips trailing separators.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    path.clean()
}
