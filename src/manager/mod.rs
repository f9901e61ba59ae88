//! Sandbox lifecycle management.
//!
//! [`SandboxManager`] drives sandboxes through their lifecycle on top of a
//! [`ContainerRuntime`](crate::runtime::ContainerRuntime). There is no local
//! state: every query is answered from the runtime's labeled containers.
//!
//! # States
//!
//! ```text
//!            create                attach
//!  Absent ────────────▶ Stopped ────────────▶ Running
//!     ▲                   ▲  │                  │
//!     │      destroy      │  └──── stop ◀───────┘
//!     └───────────────────┴─────────────────────┘
//! ```
//!
//! # Confirmation
//!
//! Recreating an existing sandbox, using a sensitive directory as workspace and
//! destroying a sandbox all require confirmation. Callers pass an optional
//! [`Confirmation`]; `force` skips the question even when one is available.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use sb::manager::{CreateOptions, SandboxManager, SandboxTarget};
//! use sb::runtime::InMemoryRuntime;
//! use sb::sandbox::{DEFAULT_IMAGE_NAME, SandboxConfig};
//!
//! let home = tempfile::TempDir::new().unwrap();
//! let workspace = home.path().join("project");
//! std::fs::create_dir(&workspace).unwrap();
//!
//! let config = SandboxConfig::new().with_home_dir(home.path());
//! let runtime = InMemoryRuntime::new().with_local_image(DEFAULT_IMAGE_NAME);
//! let manager = SandboxManager::new(config, runtime).unwrap();
//!
//! let info = manager.create(&workspace, &CreateOptions::default(), None).unwrap();
//! assert!(info.name.starts_with("sb-project-"));
//!
//! let container = manager.attach(&SandboxTarget::Workspace(workspace)).unwrap();
//! assert!(container.status.is_running());
//! ```

mod lifecycle;

pub use lifecycle::SandboxManager;

use std::fmt;
use std::path::PathBuf;

/// A sandbox as reconstructed from the runtime's container labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxInfo {
    /// Sandbox identity, e.g. `sb-my-app-1a2b3c4d`.
    pub name: String,
    /// Absolute workspace path, empty if the label is missing.
    pub workspace: String,
    /// Creation timestamp as reported by the runtime.
    pub created_at: String,
    /// Runtime handle of the backing container.
    pub container_id: Option<String>,
}

/// Coarse sandbox status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxStatus {
    Running,
    Stopped,
    /// The record has no container, or the runtime no longer knows it.
    Unknown,
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// How an existing sandbox is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxTarget {
    /// An exact sandbox identity.
    Name(String),
    /// A workspace path; its identity is derived from the path.
    Workspace(PathBuf),
}

/// Asks the user to confirm a risky action.
pub trait Confirmation {
    /// Returns true if the user agreed.
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirmation for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Per-invocation options for [`SandboxManager::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Explicit identity instead of the one derived from the workspace.
    pub name: Option<String>,
    /// Skip every confirmation.
    pub force: bool,
    /// Extra read-only mounts, after the configured ones.
    pub extra_mounts: Vec<PathBuf>,
    /// Environment passthrough entries, after the configured ones.
    pub env_vars: Vec<String>,
    /// Image to use instead of the default; pulled if missing.
    pub image: Option<String>,
}

impl CreateOptions {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_extra_mount(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_mounts.push(path.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, entry: impl Into<String>) -> Self {
        self.env_vars.push(entry.into());
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}
