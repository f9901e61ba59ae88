//! Persistent user settings.
//!
//! Settings live in `~/.config/sb/config.toml`:
//!
//! ```toml
//! [defaults]
//! extra_mounts = ["~/notes"]                  # read-only, every sandbox
//! env_passthrough = ["ANTHROPIC_API_KEY", "EDITOR=nvim"]
//! sensitive_dirs = ["~/work"]                 # require confirmation
//!
//! [docker]
//! image = "ghcr.io/me/dev:latest"             # replaces the built-in image
//! build_context = "/opt/sb/docker"            # where the built-in image is built from
//! configs_dir = "/opt/sb/docker/configs"      # default zshrc, starship.toml, nvim/
//! ```
//!
//! Every key is optional. A missing file means defaults; a file that cannot be
//! read or parsed is reported and then ignored, so a typo never locks a user
//! out of their sandboxes.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::paths;
use crate::sandbox::SandboxConfig;

/// File name of the settings file inside the sb config directory.
pub const SETTINGS_FILE: &str = "config.toml";

/// Returns `{home}/.config/sb/config.toml`.
#[must_use]
pub fn default_path(home: &Path) -> PathBuf {
    home.join(".config").join("sb").join(SETTINGS_FILE)
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub defaults: DefaultsSection,
    pub docker: DockerSection,
}

/// The `[defaults]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DefaultsSection {
    pub extra_mounts: Vec<PathBuf>,
    pub env_passthrough: Vec<String>,
    pub sensitive_dirs: Vec<PathBuf>,
}

/// The `[docker]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DockerSection {
    pub image: Option<String>,
    pub build_context: Option<PathBuf>,
    pub configs_dir: Option<PathBuf>,
}

/// Per-invocation values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mounts: Vec<PathBuf>,
    pub env: Vec<String>,
    pub image: Option<String>,
}

/// Settings combined with per-invocation overrides.
#[derive(Debug, Clone)]
pub struct MergedSettings {
    pub config: SandboxConfig,
    /// Image to use instead of the built-in one, if any.
    pub image: Option<String>,
}

impl Settings {
    /// Parses settings and expands `~` in path values against `home`.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the content is malformed or a value has the
    /// wrong type.
    pub fn parse(content: &str, home: &Path) -> Result<Self, toml::de::Error> {
        let mut settings: Self = toml::from_str(content)?;
        let expand = |p: &PathBuf| paths::expand_home(p, home);

        settings.defaults.extra_mounts = settings.defaults.extra_mounts.iter().map(expand).collect();
        settings.defaults.sensitive_dirs =
            settings.defaults.sensitive_dirs.iter().map(expand).collect();
        settings.docker.build_context = settings.docker.build_context.as_ref().map(expand);
        settings.docker.configs_dir = settings.docker.configs_dir.as_ref().map(expand);
        Ok(settings)
    }

    /// Loads settings from `path`, falling back to defaults.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path, home: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No settings file, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(error = %e, "Cannot read settings file, using defaults");
                return Self::default();
            }
        };

        match Self::parse(&content, home) {
            Ok(settings) => {
                debug!("Settings loaded");
                settings
            }
            Err(e) => {
                warn!(error = %e, "Invalid settings file, using defaults");
                Self::default()
            }
        }
    }

    /// Layers these settings and `overrides` on top of `base`.
    ///
    /// Mounts and environment entries extend the file's lists; an override
    /// image replaces the file's image. A configured build context or configs
    /// directory replaces the one in `base`.
    #[must_use]
    pub fn merge(self, base: SandboxConfig, overrides: Overrides) -> MergedSettings {
        let home = base.home_dir.clone();
        let mut config = base
            .with_extra_mounts(self.defaults.extra_mounts)
            .with_extra_mounts(
                overrides
                    .mounts
                    .iter()
                    .map(|p| paths::expand_home(p, &home)),
            )
            .with_env_passthroughs(self.defaults.env_passthrough)
            .with_env_passthroughs(overrides.env);
        config.sensitive_dirs.extend(self.defaults.sensitive_dirs);
        if let Some(context) = self.docker.build_context {
            config.build_context = Some(context);
        }
        if let Some(configs) = self.docker.configs_dir {
            config.default_configs_dir = Some(configs);
        }

        MergedSettings {
            config,
            image: overrides.image.or(self.docker.image),
        }
    }
}
