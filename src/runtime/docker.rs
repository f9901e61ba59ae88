//! Docker-backed container runtime using the `bollard` crate.
//!
//! bollard is async; sandbox management is not. The runtime owns a private
//! current-thread tokio runtime and blocks on every call, so each trait method
//! returns only once the daemon has answered.
//!
//! # Notes
//!
//! - Containers are listed by the `sb.managed=true` label filter and then
//!   inspected one by one, which gives RFC 3339 creation timestamps and the
//!   full label set.
//! - Images are built by streaming a tar of the build context to the daemon.

use std::collections::HashMap;
use std::path::Path;

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::{BuildImageOptions, CreateImageOptions};
use bollard::models::{ContainerInspectResponse, HostConfig, Mount, MountTypeEnum};
use futures::StreamExt;
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument, trace};

use super::{Container, ContainerRuntime, ContainerStatus, CreateRequest, LABEL_MANAGED};
use crate::error::RuntimeError;

/// [`ContainerRuntime`] backed by the local Docker daemon.
#[derive(Debug)]
pub struct DockerRuntime {
    docker: Docker,
    rt: Runtime,
}

impl DockerRuntime {
    /// Connects to the local Docker daemon using the platform defaults
    /// (`DOCKER_HOST` or the standard socket).
    ///
    /// Connecting is lazy; call [`ContainerRuntime::ping`] to verify the
    /// daemon is actually reachable.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Connection` if the client cannot be configured,
    /// or `RuntimeError::Io` if the internal executor cannot be started.
    pub fn connect() -> Result<Self, RuntimeError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RuntimeError::Io {
                context: String::from("failed to start async executor for Docker client"),
                source: e,
            })?;

        let docker = {
            let _guard = rt.enter();
            Docker::connect_with_local_defaults()
                .map_err(|e| RuntimeError::Connection(e.to_string()))?
        };

        Ok(Self { docker, rt })
    }

    fn inspect(&self, id_or_name: &str) -> Result<Option<Container>, RuntimeError> {
        let result = self.rt.block_on(
            self.docker
                .inspect_container(id_or_name, None::<InspectContainerOptions>),
        );
        match result {
            Ok(response) => Ok(Some(container_from_inspect(response))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(RuntimeError::api("inspect container", e)),
        }
    }
}

fn is_not_found(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn container_from_inspect(response: ContainerInspectResponse) -> Container {
    let status = response
        .state
        .and_then(|state| state.status)
        .map_or_else(
            || ContainerStatus::Other(String::from("unknown")),
            |s| ContainerStatus::parse(&s.to_string()),
        );

    Container {
        id: response.id.unwrap_or_default(),
        name: response
            .name
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string(),
        status,
        labels: response
            .config
            .and_then(|config| config.labels)
            .unwrap_or_default(),
        created_at: response.created.unwrap_or_default(),
    }
}

fn bind_mounts(request: &CreateRequest) -> Vec<Mount> {
    request
        .mounts
        .iter()
        .map(|m| Mount {
            target: Some(m.container_path.to_string_lossy().into_owned()),
            source: Some(m.host_path.to_string_lossy().into_owned()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(m.read_only),
            ..Default::default()
        })
        .collect()
}

fn tar_context(context: &Path) -> Result<Vec<u8>, RuntimeError> {
    let io_err = |e| RuntimeError::Io {
        context: format!("failed to archive build context {}", context.display()),
        source: e,
    };
    let mut builder = tar::Builder::new(Vec::new());
    builder.append_dir_all(".", context).map_err(io_err)?;
    builder.into_inner().map_err(io_err)
}

impl ContainerRuntime for DockerRuntime {
    #[instrument(skip(self))]
    fn ping(&self) -> Result<(), RuntimeError> {
        self.rt
            .block_on(self.docker.ping())
            .map(|_| ())
            .map_err(|e| RuntimeError::Connection(e.to_string()))
    }

    #[instrument(skip(self))]
    fn list_managed(&self, include_stopped: bool) -> Result<Vec<Container>, RuntimeError> {
        let filters = HashMap::from([(
            String::from("label"),
            vec![format!("{LABEL_MANAGED}=true")],
        )]);
        let options = ListContainersOptions {
            all: include_stopped,
            filters,
            ..Default::default()
        };

        let summaries = self
            .rt
            .block_on(self.docker.list_containers(Some(options)))
            .map_err(|e| RuntimeError::api("list containers", e))?;
        trace!(count = summaries.len(), "Listed managed containers");

        let mut containers = Vec::with_capacity(summaries.len());
        for id in summaries.into_iter().filter_map(|s| s.id) {
            // A container removed between list and inspect is simply gone
            if let Some(container) = self.inspect(&id)? {
                containers.push(container);
            }
        }
        Ok(containers)
    }

    #[instrument(skip(self))]
    fn get(&self, id_or_name: &str) -> Result<Option<Container>, RuntimeError> {
        self.inspect(id_or_name)
    }

    #[instrument(skip(self, request), fields(name = %request.name, image = %request.image))]
    fn create(&self, request: &CreateRequest) -> Result<Container, RuntimeError> {
        let config = Config {
            image: Some(request.image.clone()),
            env: Some(request.env.clone()),
            labels: Some(request.labels.clone()),
            working_dir: Some(request.working_dir.clone()),
            tty: Some(request.interactive_tty),
            open_stdin: Some(request.interactive_tty),
            attach_stdin: Some(request.interactive_tty),
            host_config: Some(HostConfig {
                mounts: Some(bind_mounts(request)),
                ..Default::default()
            }),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: request.name.clone(),
            platform: None,
        };

        let response = self
            .rt
            .block_on(self.docker.create_container(Some(options), config))
            .map_err(|e| RuntimeError::api("create container", e))?;
        for warning in &response.warnings {
            debug!(%warning, "Docker warning on create");
        }
        info!(id = %response.id, "Container created");

        self.inspect(&response.id)?.ok_or_else(|| {
            RuntimeError::api(
                "inspect container",
                format!("container {} vanished right after creation", response.id),
            )
        })
    }

    #[instrument(skip(self))]
    fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.rt
            .block_on(
                self.docker
                    .start_container(id, None::<StartContainerOptions<String>>),
            )
            .map_err(|e| RuntimeError::api("start container", e))
    }

    #[instrument(skip(self))]
    fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        self.rt
            .block_on(self.docker.stop_container(id, None::<StopContainerOptions>))
            .map_err(|e| RuntimeError::api("stop container", e))
    }

    #[instrument(skip(self))]
    fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        self.rt
            .block_on(
                self.docker
                    .remove_container(id, None::<RemoveContainerOptions>),
            )
            .map_err(|e| RuntimeError::api("remove container", e))
    }

    #[instrument(skip(self))]
    fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        match self.rt.block_on(self.docker.inspect_image(image)) {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(RuntimeError::api("inspect image", e)),
        }
    }

    #[instrument(skip(self))]
    fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        info!("Pulling image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        self.rt.block_on(async {
            let mut stream = self.docker.create_image(Some(options), None, None);
            while let Some(progress) = stream.next().await {
                let progress = progress.map_err(|e| RuntimeError::api("pull image", e))?;
                if let Some(status) = progress.status {
                    trace!(%status, "Pull progress");
                }
            }
            Ok(())
        })
    }

    #[instrument(skip(self, context), fields(context = %context.display()))]
    fn build_image(&self, context: &Path, tag: &str) -> Result<(), RuntimeError> {
        info!("Building image");
        let archive = tar_context(context)?;
        let options = BuildImageOptions {
            dockerfile: String::from("Dockerfile"),
            t: tag.to_string(),
            rm: true,
            ..Default::default()
        };

        self.rt.block_on(async {
            let mut stream = self
                .docker
                .build_image(options, None, Some(archive.into()));
            while let Some(step) = stream.next().await {
                let step = step.map_err(|e| RuntimeError::api("build image", e))?;
                if let Some(error) = step.error {
                    return Err(RuntimeError::api("build image", error));
                }
                if let Some(line) = step.stream {
                    trace!(line = line.trim_end(), "Build output");
                }
            }
            Ok(())
        })
    }
}
