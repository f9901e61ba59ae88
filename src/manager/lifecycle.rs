//! The sandbox lifecycle state machine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, trace, warn};

use super::{Confirmation, CreateOptions, SandboxInfo, SandboxStatus, SandboxTarget};
use crate::error::{Result, SandboxError};
use crate::paths;
use crate::runtime::{
    Container, ContainerRuntime, CreateRequest, LABEL_MANAGED, LABEL_NAME, LABEL_WORKSPACE,
};
use crate::sandbox::mounts::FIXED_MOUNTS;
use crate::sandbox::shell_config::ensure_shell_configs;
use crate::sandbox::{
    Environment, MountPlanner, SandboxConfig, SensitiveDirGuard, WORKSPACE_MOUNT_POINT, matching,
    naming,
};

/// Looks up a host environment variable by name.
pub type EnvLookup = fn(&str) -> Option<String>;

fn host_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Outcome of asking for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Proceed,
    Declined,
    /// Confirmation was needed but nobody could be asked.
    Unavailable,
}

/// The single decision point for every risky action.
fn decide(force: bool, confirm: Option<&dyn Confirmation>, prompt: &str) -> Decision {
    if force {
        return Decision::Proceed;
    }
    match confirm {
        Some(confirm) if confirm.confirm(prompt) => Decision::Proceed,
        Some(_) => Decision::Declined,
        None => Decision::Unavailable,
    }
}

/// Manages sandbox containers on a [`ContainerRuntime`].
///
/// The manager is responsible for:
/// - Creating sandboxes with deterministic identities and mount plans
/// - Resolving sandboxes by name, workspace or fuzzy query
/// - Starting, stopping and destroying their containers
///
/// Configuration is fixed at construction.
#[derive(Debug)]
pub struct SandboxManager<R> {
    config: SandboxConfig,
    runtime: R,
    planner: MountPlanner,
    guard: SensitiveDirGuard,
    host_ids: (u32, u32),
    env_lookup: EnvLookup,
}

impl<R: ContainerRuntime> SandboxManager<R> {
    /// Creates a manager and verifies the runtime is reachable.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::RuntimeUnavailable` if the runtime does not answer.
    #[instrument(skip_all, fields(image = %config.image_name))]
    pub fn new(config: SandboxConfig, runtime: R) -> Result<Self> {
        runtime
            .ping()
            .map_err(|e| SandboxError::RuntimeUnavailable(e.to_string()))?;
        debug!("Container runtime reachable");

        let planner = MountPlanner::new(config.home_dir.clone(), config.shell_config_dir.clone());
        let guard = SensitiveDirGuard::new(&config.home_dir, &config.sensitive_dirs);
        let host_ids = (
            nix::unistd::getuid().as_raw(),
            nix::unistd::getgid().as_raw(),
        );

        Ok(Self {
            config,
            runtime,
            planner,
            guard,
            host_ids,
            env_lookup: host_env,
        })
    }

    /// Overrides the uid/gid passed to new containers.
    #[must_use]
    pub fn with_host_ids(mut self, uid: u32, gid: u32) -> Self {
        self.host_ids = (uid, gid);
        self
    }

    /// Overrides how bare passthrough names are looked up.
    #[must_use]
    pub fn with_env_lookup(mut self, lookup: EnvLookup) -> Self {
        self.env_lookup = lookup;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    #[must_use]
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Returns the uid/gid used for new containers and shells.
    #[must_use]
    pub fn host_ids(&self) -> (u32, u32) {
        self.host_ids
    }

    /// Creates a sandbox for `workspace`. The container is created, not started.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `SandboxError::InvalidWorkspace` if the workspace is not a directory
    /// - `SandboxError::AlreadyExists` if the sandbox exists and nobody can confirm
    /// - `SandboxError::UserCancelled` if recreation was declined
    /// - `SandboxError::SensitiveDirectoryDeclined` if a sensitive workspace was not confirmed
    /// - `SandboxError::ImageUnavailable` if the image cannot be found, pulled or built
    /// - `SandboxError::Runtime` for any other runtime failure
    #[instrument(skip(self, workspace, options, confirm), fields(workspace = %workspace.display()))]
    pub fn create(
        &self,
        workspace: &Path,
        options: &CreateOptions,
        confirm: Option<&dyn Confirmation>,
    ) -> Result<SandboxInfo> {
        let workspace = self.absolute(workspace);
        if !workspace.is_dir() {
            let reason = if workspace.exists() {
                "not a directory"
            } else {
                "does not exist"
            };
            return Err(SandboxError::InvalidWorkspace {
                path: workspace.display().to_string(),
                reason: reason.to_string(),
            });
        }

        let name = options
            .name
            .clone()
            .unwrap_or_else(|| naming::generate_name_for_absolute(&workspace));
        debug!(%name, "Creating sandbox");

        if let Some(existing) = self.get_sandbox(&name)? {
            let prompt = format!("Sandbox '{name}' already exists.\nDo you want to recreate it?");
            match decide(options.force, confirm, &prompt) {
                Decision::Proceed => {}
                Decision::Declined => {
                    return Err(SandboxError::UserCancelled {
                        action: String::from("Sandbox creation"),
                    });
                }
                Decision::Unavailable => return Err(SandboxError::AlreadyExists { name }),
            }
            info!(%name, "Recreating existing sandbox");
            self.destroy_container(&existing)?;
        }

        if let Some(warning) = self.guard.check(&workspace) {
            if decide(options.force, confirm, &warning) != Decision::Proceed {
                return Err(SandboxError::SensitiveDirectoryDeclined {
                    path: workspace.display().to_string(),
                });
            }
            warn!("Creating sandbox for a sensitive directory");
        }

        ensure_shell_configs(
            &self.config.shell_config_dir,
            self.config.default_configs_dir.as_deref(),
        )?;

        let image = self.resolve_image(options.image.as_deref())?;

        let mounts = self.planner.plan(
            &workspace,
            &self.config.extra_mounts,
            &options.extra_mounts,
            FIXED_MOUNTS,
        );

        let (uid, gid) = self.host_ids;
        let mut env = Environment::with_host_ids(uid, gid);
        let lookup = self.env_lookup;
        env.apply_passthrough(
            self.config
                .env_passthrough
                .iter()
                .chain(&options.env_vars)
                .map(String::as_str),
            lookup,
        );
        trace!(vars = env.len(), "Environment composed");

        let labels = HashMap::from([
            (LABEL_MANAGED.to_string(), String::from("true")),
            (LABEL_NAME.to_string(), name.clone()),
            (LABEL_WORKSPACE.to_string(), workspace.display().to_string()),
        ]);

        let request = CreateRequest {
            image,
            name,
            mounts,
            env: env.to_key_values(),
            labels,
            working_dir: WORKSPACE_MOUNT_POINT.to_string(),
            interactive_tty: true,
        };
        let container = self.runtime.create(&request)?;

        info!(name = %request.name, id = %container.id, "Sandbox created");
        Ok(container_to_info(&container))
    }

    /// Starts the sandbox if needed and returns its running container.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::NotFound` if the target has no sandbox and
    /// `SandboxError::RuntimeUnavailable` if its container is gone.
    #[instrument(skip(self))]
    pub fn attach(&self, target: &SandboxTarget) -> Result<Container> {
        let sandbox = self.resolve_target(target)?;
        let container = self.live_container(&sandbox)?;
        if container.status.is_running() {
            trace!(name = %sandbox.name, "Sandbox already running");
            return Ok(container);
        }

        self.runtime.start(&container.id)?;
        info!(name = %sandbox.name, "Sandbox started");

        // Refresh to report the post-start state
        self.runtime
            .get(&container.id)?
            .ok_or_else(|| stale_container(&sandbox))
    }

    /// Stops the sandbox if it is running.
    ///
    /// # Errors
    ///
    /// Same resolution errors as [`attach`](Self::attach).
    #[instrument(skip(self))]
    pub fn stop(&self, target: &SandboxTarget) -> Result<SandboxInfo> {
        let sandbox = self.resolve_target(target)?;
        let container = self.live_container(&sandbox)?;
        if container.status.is_running() {
            self.runtime.stop(&container.id)?;
            info!(name = %sandbox.name, "Sandbox stopped");
        } else {
            trace!(name = %sandbox.name, "Sandbox not running");
        }
        Ok(sandbox)
    }

    /// Stops and removes the sandbox's container.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `SandboxError::NotFound` if the target has no sandbox
    /// - `SandboxError::UserCancelled` if destruction was declined
    /// - `SandboxError::ConfirmationRequired` without `force` or a confirmation
    #[instrument(skip(self, confirm))]
    pub fn destroy(
        &self,
        target: &SandboxTarget,
        force: bool,
        confirm: Option<&dyn Confirmation>,
    ) -> Result<SandboxInfo> {
        let sandbox = self.resolve_target(target)?;

        let prompt = format!(
            "Are you sure you want to destroy sandbox '{}'?\n\
             This will stop and remove the container.",
            sandbox.name
        );
        match decide(force, confirm, &prompt) {
            Decision::Proceed => {}
            Decision::Declined => {
                return Err(SandboxError::UserCancelled {
                    action: String::from("Sandbox destruction"),
                });
            }
            Decision::Unavailable => {
                return Err(SandboxError::ConfirmationRequired {
                    name: sandbox.name,
                });
            }
        }

        self.destroy_container(&sandbox)?;
        info!(name = %sandbox.name, "Sandbox destroyed");
        Ok(sandbox)
    }

    /// Lists every managed sandbox, running or not.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Runtime` if the runtime cannot list containers.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<SandboxInfo>> {
        let sandboxes: Vec<SandboxInfo> = self
            .runtime
            .list_managed(true)?
            .iter()
            .map(container_to_info)
            .collect();
        debug!(count = sandboxes.len(), "Listed sandboxes");
        Ok(sandboxes)
    }

    /// Returns the current status of a sandbox's container.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Runtime` if the runtime lookup fails.
    pub fn status_of(&self, sandbox: &SandboxInfo) -> Result<SandboxStatus> {
        let Some(id) = &sandbox.container_id else {
            return Ok(SandboxStatus::Unknown);
        };
        Ok(match self.runtime.get(id)? {
            Some(container) if container.status.is_running() => SandboxStatus::Running,
            Some(_) => SandboxStatus::Stopped,
            None => SandboxStatus::Unknown,
        })
    }

    /// Looks up a managed sandbox by exact name.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Runtime` if the runtime lookup fails.
    pub fn get_sandbox(&self, name: &str) -> Result<Option<SandboxInfo>> {
        Ok(self
            .runtime
            .get(name)?
            .filter(Container::is_managed)
            .map(|c| container_to_info(&c)))
    }

    /// Looks up the sandbox whose identity derives from `path`.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Runtime` if the runtime lookup fails.
    pub fn get_sandbox_for_path(&self, path: &Path) -> Result<Option<SandboxInfo>> {
        let name = naming::generate_name(path, &self.config.home_dir);
        self.get_sandbox(&name)
    }

    /// Returns the sandboxes matching a partial name, best first.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Runtime` if the runtime cannot list containers.
    pub fn find_sandboxes(&self, query: &str) -> Result<Vec<SandboxInfo>> {
        Ok(matching::find_matching(query, &self.list()?))
    }

    /// Resolves a partial name to exactly one sandbox.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::NotFound` or `SandboxError::AmbiguousMatch`.
    #[instrument(skip(self))]
    pub fn resolve_query(&self, query: &str) -> Result<SandboxInfo> {
        matching::resolve_unique(query, &self.list()?)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        paths::absolutize(path, &self.config.home_dir)
    }

    fn resolve_target(&self, target: &SandboxTarget) -> Result<SandboxInfo> {
        match target {
            SandboxTarget::Name(name) => self
                .get_sandbox(name)?
                .ok_or_else(|| SandboxError::not_found_name(name)),
            SandboxTarget::Workspace(path) => {
                let workspace = self.absolute(path);
                self.get_sandbox_for_path(&workspace)?
                    .ok_or_else(|| {
                        SandboxError::not_found_workspace(&workspace.display().to_string())
                    })
            }
        }
    }

    fn live_container(&self, sandbox: &SandboxInfo) -> Result<Container> {
        let Some(id) = &sandbox.container_id else {
            return Err(SandboxError::RuntimeUnavailable(format!(
                "Sandbox '{}' has no container ID. It may need to be recreated.",
                sandbox.name
            )));
        };
        self.runtime
            .get(id)?
            .ok_or_else(|| stale_container(sandbox))
    }

    /// Stops (if running) and removes a sandbox's container. A container that
    /// is already gone is not an error.
    fn destroy_container(&self, sandbox: &SandboxInfo) -> Result<()> {
        let Some(id) = &sandbox.container_id else {
            return Ok(());
        };
        let Some(container) = self.runtime.get(id)? else {
            trace!(name = %sandbox.name, "Container already gone");
            return Ok(());
        };
        if container.status.is_running() {
            self.runtime.stop(&container.id)?;
        }
        self.runtime.remove(&container.id)?;
        Ok(())
    }

    fn resolve_image(&self, image_override: Option<&str>) -> Result<String> {
        if let Some(image) = image_override {
            if !self.runtime.image_exists(image)? {
                info!(%image, "Pulling image");
                self.runtime
                    .pull_image(image)
                    .map_err(|e| SandboxError::ImageUnavailable {
                        image: image.to_string(),
                        reason: e.to_string(),
                    })?;
            }
            return Ok(image.to_string());
        }

        let image = &self.config.image_name;
        if self.runtime.image_exists(image)? {
            return Ok(image.clone());
        }

        let unavailable = |reason: String| SandboxError::ImageUnavailable {
            image: image.clone(),
            reason,
        };
        let Some(context) = &self.config.build_context else {
            return Err(unavailable(String::from("no build context configured")));
        };
        let dockerfile = context.join("Dockerfile");
        if !dockerfile.is_file() {
            return Err(unavailable(format!(
                "Dockerfile not found at {}",
                dockerfile.display()
            )));
        }

        info!(%image, context = %context.display(), "Building image");
        self.runtime
            .build_image(context, image)
            .map_err(|e| unavailable(e.to_string()))?;
        Ok(image.clone())
    }
}

fn stale_container(sandbox: &SandboxInfo) -> SandboxError {
    SandboxError::RuntimeUnavailable(format!(
        "Container for sandbox '{}' not found. It may need to be recreated.",
        sandbox.name
    ))
}

fn container_to_info(container: &Container) -> SandboxInfo {
    SandboxInfo {
        name: container
            .labels
            .get(LABEL_NAME)
            .cloned()
            .unwrap_or_else(|| container.name.clone()),
        workspace: container
            .labels
            .get(LABEL_WORKSPACE)
            .cloned()
            .unwrap_or_default(),
        created_at: container.created_at.clone(),
        container_id: (!container.id.is_empty()).then(|| container.id.clone()),
    }
}
