//! Sensitive host directory detection.
//!
//! Creating a sandbox gives the container read-write access to its workspace.
//! Pointing that at the filesystem root, the home directory or a system
//! directory is almost always a mistake, so those paths require an explicit
//! confirmation (or `--force`) before a sandbox is created for them.
//!
//! # Sensitive Paths
//!
//! Built in:
//! - `/` and the user's home directory
//! - `/etc`, `/var`, `/usr`, `/bin`, `/sbin`
//!
//! Plus any directories listed under `sensitive_dirs` in the configuration.
//!
//! Only exact matches are flagged: a project below `$HOME` is fine, `$HOME`
//! itself is not.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::paths;

/// System directories that are always considered sensitive.
const SENSITIVE_SYSTEM_DIRS: &[&str] = &["/", "/etc", "/var", "/usr", "/bin", "/sbin"];

/// Guard that flags workspaces pointing at sensitive host directories.
#[derive(Debug, Clone)]
pub struct SensitiveDirGuard {
    /// Absolute, normalized sensitive paths.
    sensitive: BTreeSet<PathBuf>,
}

impl SensitiveDirGuard {
    /// Creates a guard from the built-in list, `home`, and extra configured paths.
    ///
    /// Configured paths may start with `~` and may be relative; they are
    /// resolved the same way workspace paths are.
    #[must_use]
    pub fn new<I, P>(home: &Path, custom: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let resolve = |p: &Path| paths::absolutize(p, home);

        let mut sensitive: BTreeSet<PathBuf> = SENSITIVE_SYSTEM_DIRS
            .iter()
            .map(|p| resolve(Path::new(p)))
            .collect();
        sensitive.insert(resolve(home));
        sensitive.extend(custom.into_iter().map(|p| resolve(p.as_ref())));

        Self { sensitive }
    }

    /// Returns a warning if `path` is exactly one of the sensitive directories.
    ///
    /// The check is advisory: callers decide whether to ask for confirmation.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn check(&self, path: &Path) -> Option<String> {
        if !self.is_sensitive(path) {
            return None;
        }
        let abs = paths::normalize(path);

        debug!("Workspace is a sensitive directory");
        Some(format!(
            "Warning: Creating sandbox with access to '{}' is potentially dangerous.\n\
             This gives the sandbox write access to this directory.\n\
             Continue?",
            abs.display()
        ))
    }

    /// Returns true if `path` is flagged as sensitive.
    #[must_use]
    pub fn is_sensitive(&self, path: &Path) -> bool {
        self.sensitive.contains(&paths::normalize(path))
    }
}
