//! Configuration for the sandbox manager.

use std::path::PathBuf;

use crate::paths;

/// Image used when no override is given.
pub const DEFAULT_IMAGE_NAME: &str = "sb-sandbox:latest";

/// Manager-wide sandbox configuration.
///
/// This is the merged result of the persistent settings and per-invocation
/// overrides. It is fixed once the manager is constructed.
///
/// # Example
///
/// ```
/// use sb::sandbox::SandboxConfig;
///
/// let config = SandboxConfig::default()
///     .with_image_name("sb-sandbox:dev")
///     .with_extra_mount("~/notes")
///     .with_env_passthrough("ANTHROPIC_API_KEY")
///     .with_sensitive_dir("~/work");
/// ```
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Default image, built from `build_context` when missing locally.
    pub image_name: String,

    /// Docker build context containing the sandbox `Dockerfile`.
    pub build_context: Option<PathBuf>,

    /// Host paths mounted read-only into every sandbox.
    pub extra_mounts: Vec<PathBuf>,

    /// Environment passthrough entries (`KEY` or `KEY=value`).
    pub env_passthrough: Vec<String>,

    /// Additional directories that require confirmation as a workspace.
    pub sensitive_dirs: Vec<PathBuf>,

    /// Host home directory, used for `~` expansion and mount re-rooting.
    pub home_dir: PathBuf,

    /// Directory holding the user-editable shell configuration.
    pub shell_config_dir: PathBuf,

    /// Shipped defaults copied into `shell_config_dir` when missing.
    pub default_configs_dir: Option<PathBuf>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let home_dir = paths::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        Self {
            image_name: String::from(DEFAULT_IMAGE_NAME),
            build_context: None,
            extra_mounts: Vec::new(),
            env_passthrough: Vec::new(),
            sensitive_dirs: Vec::new(),
            shell_config_dir: home_dir.join(".config").join("sb"),
            default_configs_dir: None,
            home_dir,
        }
    }
}

impl SandboxConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default image name.
    #[must_use]
    pub fn with_image_name(mut self, image: impl Into<String>) -> Self {
        self.image_name = image.into();
        self
    }

    /// Sets the build context for the default image.
    #[must_use]
    pub fn with_build_context(mut self, path: impl Into<PathBuf>) -> Self {
        self.build_context = Some(path.into());
        self
    }

    /// Adds a read-only extra mount.
    #[must_use]
    pub fn with_extra_mount(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_mounts.push(path.into());
        self
    }

    /// Adds several read-only extra mounts.
    #[must_use]
    pub fn with_extra_mounts<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.extra_mounts.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Adds an environment passthrough entry.
    #[must_use]
    pub fn with_env_passthrough(mut self, entry: impl Into<String>) -> Self {
        self.env_passthrough.push(entry.into());
        self
    }

    /// Adds several environment passthrough entries.
    #[must_use]
    pub fn with_env_passthroughs<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_passthrough
            .extend(entries.into_iter().map(Into::into));
        self
    }

    /// Adds a sensitive directory.
    #[must_use]
    pub fn with_sensitive_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sensitive_dirs.push(path.into());
        self
    }

    /// Sets the host home directory.
    ///
    /// The shell config directory follows the new home unless it was set explicitly.
    #[must_use]
    pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        if self.shell_config_dir == self.home_dir.join(".config").join("sb") {
            self.shell_config_dir = home.join(".config").join("sb");
        }
        self.home_dir = home;
        self
    }

    /// Sets the shell configuration directory.
    #[must_use]
    pub fn with_shell_config_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.shell_config_dir = path.into();
        self
    }

    /// Sets the directory of shipped default shell configs.
    #[must_use]
    pub fn with_default_configs_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_configs_dir = Some(path.into());
        self
    }
}
