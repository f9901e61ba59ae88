//! Bind-mount planning for sandbox containers.
//!
//! Every sandbox container gets the same mount layout, assembled in this order:
//!
//! 1. The workspace, read-write, at [`WORKSPACE_MOUNT_POINT`]
//! 2. Built-in configuration mounts (agent credentials and settings, git and
//!    shell configuration), each with a fixed mode
//! 3. Extra mounts from the persistent configuration, read-only
//! 4. Extra mounts passed for a single invocation, read-only
//!
//! Host paths that do not exist when the plan is built are skipped, so a
//! missing `~/.codex` or `~/.gitconfig` never breaks sandbox creation.
//! Duplicates are kept; the container runtime decides final precedence.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, trace};

use crate::paths;

/// Home directory of the sandbox user inside the container.
pub const CONTAINER_HOME: &str = "/home/sandbox";

/// The fixed mount point for workspaces inside the sandbox.
pub const WORKSPACE_MOUNT_POINT: &str = "/home/sandbox/workspace";

/// A single bind mount from the host into the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Absolute path on the host.
    pub host_path: PathBuf,
    /// Absolute path inside the container.
    pub container_path: PathBuf,
    /// Whether the container sees the mount read-only.
    pub read_only: bool,
}

impl MountSpec {
    /// Creates a read-write mount.
    #[must_use]
    pub fn rw(host_path: impl Into<PathBuf>, container_path: impl Into<PathBuf>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only: false,
        }
    }

    /// Creates a read-only mount.
    #[must_use]
    pub fn ro(host_path: impl Into<PathBuf>, container_path: impl Into<PathBuf>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only: true,
        }
    }
}

/// Where a built-in mount's host path is rooted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostBase {
    /// Relative to the user's home directory.
    Home,
    /// Relative to the sb shell configuration directory.
    ShellConfig,
}

/// A built-in configuration mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMount {
    pub base: HostBase,
    /// Host path relative to `base`.
    pub host: &'static str,
    /// Absolute container path.
    pub container: &'static str,
    pub read_only: bool,
}

/// Built-in configuration mounts, in mount order.
pub const FIXED_MOUNTS: &[FixedMount] = &[
    // Agents write debug logs and session state next to their config
    FixedMount {
        base: HostBase::Home,
        host: ".claude",
        container: "/home/sandbox/.claude",
        read_only: false,
    },
    FixedMount {
        base: HostBase::Home,
        host: ".claude.json",
        container: "/home/sandbox/.claude.json",
        read_only: false,
    },
    FixedMount {
        base: HostBase::Home,
        host: ".config/claude-code",
        container: "/home/sandbox/.config/claude-code",
        read_only: false,
    },
    FixedMount {
        base: HostBase::Home,
        host: ".codex",
        container: "/home/sandbox/.codex",
        read_only: false,
    },
    FixedMount {
        base: HostBase::Home,
        host: ".gitconfig",
        container: "/home/sandbox/.gitconfig",
        read_only: true,
    },
    FixedMount {
        base: HostBase::ShellConfig,
        host: "zshrc",
        container: "/home/sandbox/.zshrc",
        read_only: true,
    },
    FixedMount {
        base: HostBase::ShellConfig,
        host: "starship.toml",
        container: "/home/sandbox/.config/starship.toml",
        read_only: true,
    },
    // rw so plugin managers can install into it
    FixedMount {
        base: HostBase::ShellConfig,
        host: "nvim",
        container: "/home/sandbox/.config/nvim",
        read_only: false,
    },
];

/// Builds mount plans for sandbox containers.
#[derive(Debug, Clone)]
pub struct MountPlanner {
    home: PathBuf,
    shell_config_dir: PathBuf,
}

impl MountPlanner {
    /// Creates a planner rooted at the given host home and shell config directories.
    #[must_use]
    pub fn new(home: impl Into<PathBuf>, shell_config_dir: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            shell_config_dir: shell_config_dir.into(),
        }
    }

    /// Builds the ordered mount list for a sandbox.
    ///
    /// `workspace` must already be absolute. Configured and per-call extra
    /// mounts may use `~`.
    #[instrument(skip_all, fields(workspace = %workspace.display()))]
    pub fn plan<S: AsRef<Path>>(
        &self,
        workspace: &Path,
        config_mounts: &[S],
        cli_mounts: &[S],
        fixed: &[FixedMount],
    ) -> Vec<MountSpec> {
        let mut mounts = vec![MountSpec::rw(
            paths::normalize(workspace),
            WORKSPACE_MOUNT_POINT,
        )];

        for entry in fixed {
            let base = match entry.base {
                HostBase::Home => &self.home,
                HostBase::ShellConfig => &self.shell_config_dir,
            };
            let host = base.join(entry.host);
            if !host.exists() {
                trace!(host = %host.display(), "Skipping missing built-in mount");
                continue;
            }
            mounts.push(MountSpec {
                host_path: host,
                container_path: PathBuf::from(entry.container),
                read_only: entry.read_only,
            });
        }

        for extra in config_mounts.iter().chain(cli_mounts) {
            if let Some(spec) = self.extra_mount(extra.as_ref()) {
                mounts.push(spec);
            }
        }

        debug!(count = mounts.len(), "Mount plan built");
        mounts
    }

    /// Builds the read-only mount for an extra host path, if it exists.
    #[must_use]
    pub fn extra_mount(&self, host: &Path) -> Option<MountSpec> {
        let host_path = paths::absolutize(host, &self.home);
        if !host_path.exists() {
            trace!(host = %host_path.display(), "Skipping missing extra mount");
            return None;
        }
        let container_path = self.container_path_for(&host_path);
        Some(MountSpec::ro(host_path, container_path))
    }

    /// Maps a host path into the sandbox, re-rooting the host home under
    /// [`CONTAINER_HOME`]. Paths outside home keep their location.
    #[must_use]
    pub fn container_path_for(&self, host_path: &Path) -> PathBuf {
        match host_path.strip_prefix(&self.home) {
            Ok(rest) if rest.as_os_str().is_empty() => PathBuf::from(CONTAINER_HOME),
            Ok(rest) => Path::new(CONTAINER_HOME).join(rest),
            Err(_) => host_path.to_path_buf(),
        }
    }
}
