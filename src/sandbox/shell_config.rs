//! Seeding of the user-editable shell configuration.
//!
//! Sandboxes mount the shell configuration from the host so users can tweak
//! their prompt, zsh and neovim setup once for every sandbox:
//!
//! ```text
//! ~/.config/sb/
//! ├── zshrc           # mounted at /home/sandbox/.zshrc
//! ├── starship.toml   # mounted at /home/sandbox/.config/starship.toml
//! └── nvim/           # mounted at /home/sandbox/.config/nvim
//! ```
//!
//! Missing entries are copied from the shipped defaults. Existing files are
//! never overwritten.

use std::fs;
use std::path::Path;

use tracing::{debug, instrument, trace};
use walkdir::WalkDir;

use crate::error::{Result, SandboxError};

/// Shell configuration entries seeded from the defaults, in order.
pub const SHELL_CONFIG_ENTRIES: &[&str] = &["zshrc", "starship.toml", "nvim"];

/// Ensures `config_dir` exists and contains the default shell configuration.
///
/// Entries already present in `config_dir` are left untouched. Entries missing
/// from `defaults_dir` are skipped. Returns the names of the seeded entries.
///
/// # Errors
///
/// Returns `SandboxError::Io` if a directory cannot be created or a file
/// cannot be copied.
#[instrument(skip_all, fields(config_dir = %config_dir.display()))]
pub fn ensure_shell_configs(
    config_dir: &Path,
    defaults_dir: Option<&Path>,
) -> Result<Vec<&'static str>> {
    fs::create_dir_all(config_dir).map_err(|e| SandboxError::Io {
        context: format!("failed to create config directory: {}", config_dir.display()),
        source: e,
    })?;

    let Some(defaults_dir) = defaults_dir else {
        trace!("No default shell configs to seed from");
        return Ok(Vec::new());
    };

    let mut seeded = Vec::new();
    for entry in SHELL_CONFIG_ENTRIES {
        let dest = config_dir.join(entry);
        let src = defaults_dir.join(entry);
        if dest.exists() || !src.exists() {
            continue;
        }

        if src.is_dir() {
            copy_tree(&src, &dest)?;
        } else {
            copy_file(&src, &dest)?;
        }
        debug!(entry, "Seeded default shell config");
        seeded.push(*entry);
    }

    Ok(seeded)
}

/// Recursively copies the directory `src` to `dest`.
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            let context = format!("failed to walk {}", src.display());
            SandboxError::Io {
                context,
                source: e.into(),
            }
        })?;

        // WalkDir only yields paths below `src`
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| SandboxError::Io {
                context: format!("failed to create directory: {}", target.display()),
                source: e,
            })?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    fs::copy(src, dest).map_err(|e| SandboxError::Io {
        context: format!("failed to copy {} to {}", src.display(), dest.display()),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn defaults() -> TempDir {
        let dir = TempDir::new().expect("failed to create temp dir");
        fs::write(dir.path().join("zshrc"), "# default zshrc\n").expect("write");
        fs::create_dir_all(dir.path().join("nvim/lua")).expect("mkdir");
        fs::write(dir.path().join("nvim/init.lua"), "-- init\n").expect("write");
        fs::write(dir.path().join("nvim/lua/plugins.lua"), "return {}\n").expect("write");
        dir
    }

    #[test]
    fn test_seeds_missing_entries() {
        let defaults = defaults();
        let target = TempDir::new().expect("failed to create temp dir");
        let config_dir = target.path().join("sb");

        let seeded = ensure_shell_configs(&config_dir, Some(defaults.path())).expect("seed");

        // starship.toml has no default and is skipped
        assert_eq!(seeded, vec!["zshrc", "nvim"]);
        assert!(config_dir.join("zshrc").is_file());
        assert!(config_dir.join("nvim/lua/plugins.lua").is_file());
        assert!(!config_dir.join("starship.toml").exists());
    }

    #[test]
    fn test_never_overwrites_user_files() {
        let defaults = defaults();
        let target = TempDir::new().expect("failed to create temp dir");
        fs::write(target.path().join("zshrc"), "# mine\n").expect("write");

        let seeded = ensure_shell_configs(target.path(), Some(defaults.path())).expect("seed");

        assert_eq!(seeded, vec!["nvim"]);
        let content = fs::read_to_string(target.path().join("zshrc")).expect("read");
        assert_eq!(content, "# mine\n");
    }

    #[test]
    fn test_without_defaults_only_creates_dir() {
        let target = TempDir::new().expect("failed to create temp dir");
        let config_dir = target.path().join("nested/sb");

        let seeded = ensure_shell_configs(&config_dir, None).expect("seed");
        assert!(seeded.is_empty());
        assert!(config_dir.is_dir());
    }
}
