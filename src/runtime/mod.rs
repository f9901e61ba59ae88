//! Container runtime abstraction.
//!
//! The sandbox manager never talks to a container engine directly. It goes
//! through [`ContainerRuntime`], which exposes the handful of blocking calls
//! the lifecycle needs. The runtime's labeled containers are the only record
//! of which sandboxes exist: there is no local index to fall out of sync.
//!
//! Two implementations ship with the crate:
//!
//! - [`DockerRuntime`]: talks to the local Docker daemon via bollard
//! - [`InMemoryRuntime`]: a process-local runtime for tests and dry runs

mod docker;
mod memory;

pub use docker::DockerRuntime;
pub use memory::{InMemoryRuntime, RuntimeOp};

use std::collections::HashMap;
use std::path::Path;

use crate::error::RuntimeError;
use crate::sandbox::MountSpec;

/// Label marking a container as managed by sb.
pub const LABEL_MANAGED: &str = "sb.managed";

/// Label carrying the sandbox identity.
pub const LABEL_NAME: &str = "sb.name";

/// Label carrying the absolute workspace path.
pub const LABEL_WORKSPACE: &str = "sb.workspace";

/// Run state reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Exited,
    Dead,
    Removing,
    Other(String),
}

impl ContainerStatus {
    /// Parses a Docker-style state string.
    #[must_use]
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            "removing" => Self::Removing,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Exited => write!(f, "exited"),
            Self::Dead => write!(f, "dead"),
            Self::Removing => write!(f, "removing"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Opaque runtime handle.
    pub id: String,
    /// Unique container name.
    pub name: String,
    pub status: ContainerStatus,
    pub labels: HashMap<String, String>,
    /// Creation timestamp, RFC 3339 when the runtime provides one.
    pub created_at: String,
}

impl Container {
    /// Returns true if the container carries the sb management label.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.labels.get(LABEL_MANAGED).map(String::as_str) == Some("true")
    }
}

/// Everything needed to create (but not start) a sandbox container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub image: String,
    pub name: String,
    pub mounts: Vec<MountSpec>,
    /// `KEY=value` pairs.
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
    pub working_dir: String,
    /// Allocate a TTY and keep stdin open for interactive shells.
    pub interactive_tty: bool,
}

/// Blocking interface to a container engine.
///
/// Implementations own any connection handling and retry policy; callers
/// treat every error as final.
pub trait ContainerRuntime {
    /// Verifies the runtime is reachable.
    fn ping(&self) -> Result<(), RuntimeError>;

    /// Lists containers carrying the management label.
    fn list_managed(&self, include_stopped: bool) -> Result<Vec<Container>, RuntimeError>;

    /// Looks up a container by id or name.
    fn get(&self, id_or_name: &str) -> Result<Option<Container>, RuntimeError>;

    /// Creates a container without starting it.
    fn create(&self, request: &CreateRequest) -> Result<Container, RuntimeError>;

    fn start(&self, id: &str) -> Result<(), RuntimeError>;

    fn stop(&self, id: &str) -> Result<(), RuntimeError>;

    fn remove(&self, id: &str) -> Result<(), RuntimeError>;

    /// Returns true if the image is present locally.
    fn image_exists(&self, image: &str) -> Result<bool, RuntimeError>;

    /// Pulls an image from its registry.
    fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Builds an image from a local build context and tags it.
    fn build_image(&self, context: &Path, tag: &str) -> Result<(), RuntimeError>;
}

impl<R: ContainerRuntime + ?Sized> ContainerRuntime for &R {
    fn ping(&self) -> Result<(), RuntimeError> {
        (**self).ping()
    }

    fn list_managed(&self, include_stopped: bool) -> Result<Vec<Container>, RuntimeError> {
        (**self).list_managed(include_stopped)
    }

    fn get(&self, id_or_name: &str) -> Result<Option<Container>, RuntimeError> {
        (**self).get(id_or_name)
    }

    fn create(&self, request: &CreateRequest) -> Result<Container, RuntimeError> {
        (**self).create(request)
    }

    fn start(&self, id: &str) -> Result<(), RuntimeError> {
        (**self).start(id)
    }

    fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        (**self).stop(id)
    }

    fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        (**self).remove(id)
    }

    fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        (**self).image_exists(image)
    }

    fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        (**self).pull_image(image)
    }

    fn build_image(&self, context: &Path, tag: &str) -> Result<(), RuntimeError> {
        (**self).build_image(context, tag)
    }
}
