//! Process-local container runtime.
//!
//! Mirrors the Docker behaviors the manager relies on: unique container
//! names, create-without-start, refusing to remove a running container, and
//! failing to create from an image that is not present locally. Every mutating
//! call is recorded so tests can assert on the exact sequence of operations.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::trace;

use super::{Container, ContainerRuntime, ContainerStatus, CreateRequest, LABEL_MANAGED};
use crate::error::RuntimeError;

/// A mutating call observed by [`InMemoryRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeOp {
    Create(String),
    Start(String),
    Stop(String),
    Remove(String),
    Pull(String),
    Build(String),
}

#[derive(Debug, Default)]
struct State {
    containers: Vec<Container>,
    requests: Vec<CreateRequest>,
    local_images: HashSet<String>,
    remote_images: HashSet<String>,
    ops: Vec<RuntimeOp>,
    next_id: u64,
    unreachable: bool,
}

/// In-memory [`ContainerRuntime`] implementation.
///
/// # Example
///
/// ```
/// use sb::runtime::{ContainerRuntime, InMemoryRuntime};
///
/// let runtime = InMemoryRuntime::new().with_local_image("sb-sandbox:latest");
/// assert!(runtime.image_exists("sb-sandbox:latest").unwrap());
/// assert!(runtime.list_managed(true).unwrap().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    state: Mutex<State>,
}

impl InMemoryRuntime {
    /// Creates an empty, reachable runtime with no images.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an image as present locally.
    #[must_use]
    pub fn with_local_image(self, image: impl Into<String>) -> Self {
        self.lock().local_images.insert(image.into());
        self
    }

    /// Marks an image as pullable from a registry.
    #[must_use]
    pub fn with_remote_image(self, image: impl Into<String>) -> Self {
        self.lock().remote_images.insert(image.into());
        self
    }

    /// Makes every call fail as if the daemon were down.
    #[must_use]
    pub fn unreachable(self) -> Self {
        self.lock().unreachable = true;
        self
    }

    /// Returns the mutating calls seen so far.
    #[must_use]
    pub fn ops(&self) -> Vec<RuntimeOp> {
        self.lock().ops.clone()
    }

    /// Returns every create request received, in order.
    #[must_use]
    pub fn create_requests(&self) -> Vec<CreateRequest> {
        self.lock().requests.clone()
    }

    /// Forces a container's status, e.g. to simulate it exiting on its own.
    pub fn set_status(&self, id_or_name: &str, status: ContainerStatus) -> bool {
        let mut state = self.lock();
        match find_mut(&mut state.containers, id_or_name) {
            Some(container) => {
                container.status = status;
                true
            }
            None => false,
        }
    }

    /// Adds an existing container, e.g. one not created through sb.
    pub fn insert_container(&self, container: Container) {
        self.lock().containers.push(container);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reachable(&self) -> Result<MutexGuard<'_, State>, RuntimeError> {
        let state = self.lock();
        if state.unreachable {
            return Err(RuntimeError::Connection(String::from(
                "in-memory runtime marked unreachable",
            )));
        }
        Ok(state)
    }
}

fn find_mut<'a>(containers: &'a mut [Container], id_or_name: &str) -> Option<&'a mut Container> {
    containers
        .iter_mut()
        .find(|c| c.id == id_or_name || c.name == id_or_name)
}

fn no_such_container(operation: &str, id: &str) -> RuntimeError {
    RuntimeError::api(operation, format!("No such container: {id}"))
}

impl ContainerRuntime for InMemoryRuntime {
    fn ping(&self) -> Result<(), RuntimeError> {
        self.reachable().map(|_| ())
    }

    fn list_managed(&self, include_stopped: bool) -> Result<Vec<Container>, RuntimeError> {
        let state = self.reachable()?;
        Ok(state
            .containers
            .iter()
            .filter(|c| c.labels.get(LABEL_MANAGED).map(String::as_str) == Some("true"))
            .filter(|c| include_stopped || c.status.is_running())
            .cloned()
            .collect())
    }

    fn get(&self, id_or_name: &str) -> Result<Option<Container>, RuntimeError> {
        let state = self.reachable()?;
        Ok(state
            .containers
            .iter()
            .find(|c| c.id == id_or_name || c.name == id_or_name)
            .cloned())
    }

    fn create(&self, request: &CreateRequest) -> Result<Container, RuntimeError> {
        let mut state = self.reachable()?;

        if state.containers.iter().any(|c| c.name == request.name) {
            return Err(RuntimeError::api(
                "create container",
                format!("Conflict. The container name \"/{}\" is already in use", request.name),
            ));
        }
        if !state.local_images.contains(&request.image) {
            return Err(RuntimeError::api(
                "create container",
                format!("No such image: {}", request.image),
            ));
        }

        state.next_id += 1;
        let container = Container {
            id: format!("{:012x}", 0xc0ffee_000000_u64 + state.next_id),
            name: request.name.clone(),
            status: ContainerStatus::Created,
            labels: request.labels.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        trace!(id = %container.id, name = %container.name, "Created in-memory container");

        state.containers.push(container.clone());
        state.requests.push(request.clone());
        state.ops.push(RuntimeOp::Create(request.name.clone()));
        Ok(container)
    }

    fn start(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.reachable()?;
        let container =
            find_mut(&mut state.containers, id).ok_or_else(|| no_such_container("start", id))?;
        container.status = ContainerStatus::Running;
        state.ops.push(RuntimeOp::Start(id.to_string()));
        Ok(())
    }

    fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.reachable()?;
        let container =
            find_mut(&mut state.containers, id).ok_or_else(|| no_such_container("stop", id))?;
        container.status = ContainerStatus::Exited;
        state.ops.push(RuntimeOp::Stop(id.to_string()));
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.reachable()?;
        let index = state
            .containers
            .iter()
            .position(|c| c.id == id || c.name == id)
            .ok_or_else(|| no_such_container("remove", id))?;

        if state.containers[index].status.is_running() {
            return Err(RuntimeError::api(
                "remove",
                format!("cannot remove running container {id}: stop the container first"),
            ));
        }

        state.containers.remove(index);
        state.ops.push(RuntimeOp::Remove(id.to_string()));
        Ok(())
    }

    fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        Ok(self.reachable()?.local_images.contains(image))
    }

    fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let mut state = self.reachable()?;
        if !state.remote_images.contains(image) {
            return Err(RuntimeError::api(
                "pull",
                format!("pull access denied for {image}, repository does not exist"),
            ));
        }
        state.local_images.insert(image.to_string());
        state.ops.push(RuntimeOp::Pull(image.to_string()));
        Ok(())
    }

    fn build_image(&self, context: &Path, tag: &str) -> Result<(), RuntimeError> {
        let mut state = self.reachable()?;
        if !context.join("Dockerfile").is_file() {
            return Err(RuntimeError::api(
                "build",
                format!("no Dockerfile in build context {}", context.display()),
            ));
        }
        state.local_images.insert(tag.to_string());
        state.ops.push(RuntimeOp::Build(tag.to_string()));
        Ok(())
    }
}
