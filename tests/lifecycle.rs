//! Integration tests for the sandbox lifecycle.
//!
//! These tests verify:
//! - Creation, recreation and the confirmation protocol
//! - Sensitive workspace protection
//! - Attach/stop/destroy state transitions
//! - Listing, status and fuzzy resolution
//! - Image resolution and shell config seeding
//!
//! Everything runs against the in-memory runtime; no Docker daemon is needed.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use sb::error::SandboxError;
use sb::manager::{CreateOptions, SandboxManager, SandboxStatus, SandboxTarget};
use sb::runtime::{ContainerRuntime, ContainerStatus, InMemoryRuntime, RuntimeOp};
use sb::sandbox::{
    DEFAULT_IMAGE_NAME, MountSpec, SandboxConfig, WORKSPACE_MOUNT_POINT, naming,
};
use tempfile::TempDir;

/// A fake home directory with one project in it.
struct TestHome {
    home: TempDir,
    workspace: PathBuf,
}

impl TestHome {
    fn new() -> Self {
        let home = TempDir::new().expect("failed to create temp dir");
        let workspace = home.path().join("projects").join("my-app");
        fs::create_dir_all(&workspace).expect("failed to create workspace");
        Self { home, workspace }
    }

    fn path(&self) -> &Path {
        self.home.path()
    }

    fn project(&self, name: &str) -> PathBuf {
        let dir = self.path().join("projects").join(name);
        fs::create_dir_all(&dir).expect("failed to create project");
        dir
    }

    fn config(&self) -> SandboxConfig {
        SandboxConfig::new().with_home_dir(self.path())
    }

    fn manager(&self) -> SandboxManager<InMemoryRuntime> {
        self.manager_with(self.config())
    }

    fn manager_with(&self, config: SandboxConfig) -> SandboxManager<InMemoryRuntime> {
        let runtime = InMemoryRuntime::new().with_local_image(DEFAULT_IMAGE_NAME);
        SandboxManager::new(config, runtime)
            .expect("runtime should be reachable")
            .with_host_ids(1000, 1000)
            .with_env_lookup(|_| None)
    }
}

fn accept(_: &str) -> bool {
    true
}

fn decline(_: &str) -> bool {
    false
}

fn create(manager: &SandboxManager<InMemoryRuntime>, workspace: &Path) -> sb::SandboxInfo {
    manager
        .create(workspace, &CreateOptions::default(), None)
        .expect("failed to create sandbox")
}

// =============================================================================
// Create Tests
// =============================================================================

#[test]
fn test_create_new_sandbox_is_stopped() {
    let t = TestHome::new();
    let manager = t.manager();

    let info = create(&manager, &t.workspace);

    assert!(info.name.starts_with("sb-my-app-"));
    assert_eq!(info.workspace, t.workspace.display().to_string());
    assert_eq!(manager.status_of(&info).expect("status"), SandboxStatus::Stopped);
    assert_eq!(
        manager.runtime().ops(),
        vec![RuntimeOp::Create(info.name.clone())]
    );
}

#[test]
fn test_create_is_deterministic_per_workspace() {
    let t = TestHome::new();
    let manager = t.manager();

    let first = create(&manager, &t.workspace);
    manager
        .destroy(&SandboxTarget::Name(first.name.clone()), true, None)
        .expect("destroy");
    let second = create(&manager, &t.workspace);

    assert_eq!(first.name, second.name);

    // Same basename, different parent
    let other = t.path().join("elsewhere").join("my-app");
    fs::create_dir_all(&other).expect("mkdir");
    let third = create(&manager, &other);
    assert_ne!(third.name, second.name);
    assert!(third.name.starts_with("sb-my-app-"));
}

#[test]
fn test_create_with_explicit_name() {
    let t = TestHome::new();
    let manager = t.manager();

    let options = CreateOptions::default().with_name("sb-custom-0badc0de");
    let info = manager
        .create(&t.workspace, &options, None)
        .expect("create");

    assert_eq!(info.name, "sb-custom-0badc0de");
    assert!(manager
        .get_sandbox("sb-custom-0badc0de")
        .expect("get")
        .is_some());
}

#[test]
fn test_create_relative_and_tilde_workspace() {
    let t = TestHome::new();
    let manager = t.manager();

    let info = manager
        .create(Path::new("~/projects/my-app"), &CreateOptions::default(), None)
        .expect("create");
    assert_eq!(info.workspace, t.workspace.display().to_string());

    let found = manager
        .get_sandbox_for_path(&t.workspace.join("."))
        .expect("get")
        .expect("present");
    assert_eq!(found.name, info.name);
}

#[test]
fn test_tilde_identity_uses_configured_home() {
    let t = TestHome::new();
    let manager = t.manager();

    let info = manager
        .create(Path::new("~/projects/my-app"), &CreateOptions::default(), None)
        .expect("create");
    assert_eq!(
        info.name,
        naming::generate_name(Path::new("~/projects/my-app"), t.path())
    );

    let found = manager
        .get_sandbox_for_path(Path::new("~/projects/my-app"))
        .expect("get")
        .expect("present");
    assert_eq!(found.name, info.name);

    manager
        .attach(&SandboxTarget::Workspace(PathBuf::from("~/projects/my-app")))
        .expect("attach by tilde workspace");
}

#[test]
fn test_create_request_contents() {
    let t = TestHome::new();
    fs::create_dir(t.path().join(".claude")).expect("mkdir");
    fs::create_dir(t.path().join("notes")).expect("mkdir");
    let config = t
        .config()
        .with_extra_mount("~/notes")
        .with_env_passthroughs(["TOKEN=abc", "UNSET_VAR"]);
    let manager = t.manager_with(config);

    let options = CreateOptions::default()
        .with_extra_mount(t.path().join("missing"))
        .with_env("MODE=dev");
    manager.create(&t.workspace, &options, None).expect("create");

    let requests = manager.runtime().create_requests();
    let request = &requests[0];
    assert_eq!(
        request.mounts,
        vec![
            MountSpec::rw(&t.workspace, WORKSPACE_MOUNT_POINT),
            MountSpec::rw(t.path().join(".claude"), "/home/sandbox/.claude"),
            MountSpec::ro(t.path().join("notes"), "/home/sandbox/notes"),
        ]
    );
    assert_eq!(
        request.env,
        vec!["HOST_UID=1000", "HOST_GID=1000", "TOKEN=abc", "MODE=dev"]
    );
    assert_eq!(request.working_dir, WORKSPACE_MOUNT_POINT);
    assert_eq!(
        request.labels.get("sb.workspace"),
        Some(&t.workspace.display().to_string())
    );
}

#[test]
fn test_create_rejects_file_as_workspace() {
    let t = TestHome::new();
    let file = t.path().join("file.txt");
    fs::write(&file, "x").expect("write");

    let err = t
        .manager()
        .create(&file, &CreateOptions::default(), None)
        .expect_err("file workspace");
    assert!(matches!(err, SandboxError::InvalidWorkspace { ref reason, .. } if reason == "not a directory"));
}

// =============================================================================
// Recreate Tests
// =============================================================================

#[test]
fn test_recreate_declined_leaves_original_untouched() {
    let t = TestHome::new();
    let manager = t.manager();
    let original = create(&manager, &t.workspace);
    let target = SandboxTarget::Name(original.name.clone());
    manager.attach(&target).expect("attach");

    let err = manager
        .create(&t.workspace, &CreateOptions::default(), Some(&decline))
        .expect_err("declined");

    assert!(matches!(err, SandboxError::UserCancelled { .. }));
    let current = manager
        .get_sandbox(&original.name)
        .expect("get")
        .expect("still present");
    assert_eq!(current.container_id, original.container_id);
    assert_eq!(manager.status_of(&current).expect("status"), SandboxStatus::Running);
    assert_eq!(manager.runtime().create_requests().len(), 1);
}

#[test]
fn test_recreate_without_collaborator_already_exists() {
    let t = TestHome::new();
    let manager = t.manager();
    let original = create(&manager, &t.workspace);

    let err = manager
        .create(&t.workspace, &CreateOptions::default(), None)
        .expect_err("exists");
    assert!(matches!(err, SandboxError::AlreadyExists { ref name } if *name == original.name));
}

#[test]
fn test_recreate_confirmed_replaces_running_container() {
    let t = TestHome::new();
    let manager = t.manager();
    let original = create(&manager, &t.workspace);
    let container = manager
        .attach(&SandboxTarget::Name(original.name.clone()))
        .expect("attach");

    let replacement = manager
        .create(&t.workspace, &CreateOptions::default(), Some(&accept))
        .expect("recreate");

    assert_eq!(replacement.name, original.name);
    assert_ne!(replacement.container_id, original.container_id);
    assert_eq!(
        manager.runtime().ops(),
        vec![
            RuntimeOp::Create(original.name.clone()),
            RuntimeOp::Start(container.id.clone()),
            RuntimeOp::Stop(container.id.clone()),
            RuntimeOp::Remove(container.id.clone()),
            RuntimeOp::Create(original.name.clone()),
        ]
    );
}

#[test]
fn test_force_wins_over_declining_collaborator() {
    let t = TestHome::new();
    let manager = t.manager();
    create(&manager, &t.workspace);

    let asked = Cell::new(0);
    let counting_decline = |_: &str| {
        asked.set(asked.get() + 1);
        false
    };
    let options = CreateOptions::default().with_force(true);
    manager
        .create(&t.workspace, &options, Some(&counting_decline))
        .expect("forced recreate");

    assert_eq!(asked.get(), 0);
    assert_eq!(manager.list().expect("list").len(), 1);
}

// =============================================================================
// Sensitive Directory Tests
// =============================================================================

#[test]
fn test_home_as_workspace_requires_confirmation() {
    let t = TestHome::new();
    let manager = t.manager();

    let err = manager
        .create(t.path(), &CreateOptions::default(), None)
        .expect_err("no collaborator");
    assert!(matches!(err, SandboxError::SensitiveDirectoryDeclined { .. }));

    let err = manager
        .create(t.path(), &CreateOptions::default(), Some(&decline))
        .expect_err("declined");
    assert!(matches!(err, SandboxError::SensitiveDirectoryDeclined { .. }));
    assert!(manager.runtime().ops().is_empty());

    manager
        .create(t.path(), &CreateOptions::default(), Some(&accept))
        .expect("confirmed");
}

#[test]
fn test_configured_sensitive_dir_and_force() {
    let t = TestHome::new();
    let work = t.path().join("work");
    fs::create_dir(&work).expect("mkdir");
    let manager = t.manager_with(t.config().with_sensitive_dir("~/work"));

    let err = manager
        .create(&work, &CreateOptions::default(), None)
        .expect_err("sensitive");
    assert!(matches!(err, SandboxError::SensitiveDirectoryDeclined { .. }));

    manager
        .create(&work, &CreateOptions::default().with_force(true), None)
        .expect("forced");
}

#[test]
fn test_sensitive_prompt_names_the_path() {
    let t = TestHome::new();
    let manager = t.manager();

    let seen = std::cell::RefCell::new(String::new());
    let record = |prompt: &str| {
        seen.replace(prompt.to_string());
        false
    };
    let _ = manager.create(t.path(), &CreateOptions::default(), Some(&record));

    let prompt = seen.into_inner();
    assert!(prompt.contains(&format!("'{}'", t.path().display())));
    assert!(prompt.contains("write access"));
}

// =============================================================================
// Attach / Stop Tests
// =============================================================================

#[test]
fn test_attach_starts_stopped_sandbox_and_is_idempotent() {
    let t = TestHome::new();
    let manager = t.manager();
    create(&manager, &t.workspace);
    let target = SandboxTarget::Workspace(t.workspace.clone());

    let container = manager.attach(&target).expect("first attach");
    assert!(container.status.is_running());
    let ops_after_first = manager.runtime().ops().len();

    let again = manager.attach(&target).expect("second attach");
    assert_eq!(again.id, container.id);
    assert_eq!(manager.runtime().ops().len(), ops_after_first);
}

#[test]
fn test_attach_missing_workspace_sandbox() {
    let t = TestHome::new();
    let manager = t.manager();

    let err = manager
        .attach(&SandboxTarget::Workspace(t.workspace.clone()))
        .expect_err("nothing created");
    let msg = err.to_string();
    assert!(msg.contains("No sandbox found for workspace"));
    assert!(matches!(err, SandboxError::NotFound { ref hint, .. } if hint.contains("sb create")));

    let err = manager
        .attach(&SandboxTarget::Name(String::from("sb-nope-00000000")))
        .expect_err("unknown name");
    assert_eq!(err.to_string(), "Sandbox 'sb-nope-00000000' not found");
}

#[test]
fn test_attach_after_external_removal_is_not_found() {
    let t = TestHome::new();
    let manager = t.manager();
    let info = create(&manager, &t.workspace);
    let id = info.container_id.clone().expect("id");
    manager.runtime().remove(&id).expect("external remove");

    let err = manager
        .attach(&SandboxTarget::Name(info.name.clone()))
        .expect_err("gone");
    assert!(matches!(err, SandboxError::NotFound { .. }));

    // A record captured before the removal no longer has a container
    assert_eq!(manager.status_of(&info).expect("status"), SandboxStatus::Unknown);
    assert!(manager.list().expect("list").is_empty());
}

#[test]
fn test_stop_running_and_stopped() {
    let t = TestHome::new();
    let manager = t.manager();
    let info = create(&manager, &t.workspace);
    let target = SandboxTarget::Name(info.name.clone());

    // Stopping a created-but-never-started sandbox is a no-op
    manager.stop(&target).expect("stop stopped");
    assert_eq!(manager.runtime().ops().len(), 1);

    manager.attach(&target).expect("attach");
    let stopped = manager.stop(&target).expect("stop running");
    assert_eq!(stopped.name, info.name);
    assert_eq!(manager.status_of(&stopped).expect("status"), SandboxStatus::Stopped);
}

#[test]
fn test_container_exiting_on_its_own_reports_stopped() {
    let t = TestHome::new();
    let manager = t.manager();
    let info = create(&manager, &t.workspace);
    manager
        .attach(&SandboxTarget::Name(info.name.clone()))
        .expect("attach");

    assert!(manager.runtime().set_status(&info.name, ContainerStatus::Exited));
    assert_eq!(manager.status_of(&info).expect("status"), SandboxStatus::Stopped);
}

// =============================================================================
// Destroy Tests
// =============================================================================

#[test]
fn test_forced_destroy_of_running_sandbox_stops_then_removes() {
    let t = TestHome::new();
    let manager = t.manager();
    let info = create(&manager, &t.workspace);
    let target = SandboxTarget::Name(info.name.clone());
    let container = manager.attach(&target).expect("attach");

    let destroyed = manager.destroy(&target, true, None).expect("destroy");

    assert_eq!(destroyed.name, info.name);
    let ops = manager.runtime().ops();
    assert_eq!(
        &ops[ops.len() - 2..],
        &[
            RuntimeOp::Stop(container.id.clone()),
            RuntimeOp::Remove(container.id.clone()),
        ]
    );
    assert!(manager.get_sandbox(&info.name).expect("get").is_none());
}

#[test]
fn test_destroy_confirmation_protocol() {
    let t = TestHome::new();
    let manager = t.manager();
    let info = create(&manager, &t.workspace);
    let target = SandboxTarget::Workspace(t.workspace.clone());

    let err = manager.destroy(&target, false, None).expect_err("no collaborator");
    assert!(matches!(err, SandboxError::ConfirmationRequired { ref name } if *name == info.name));

    let err = manager
        .destroy(&target, false, Some(&decline))
        .expect_err("declined");
    assert!(matches!(err, SandboxError::UserCancelled { .. }));
    assert!(manager.get_sandbox(&info.name).expect("get").is_some());

    manager
        .destroy(&target, false, Some(&accept))
        .expect("confirmed");
    assert!(manager.list().expect("list").is_empty());
    // Never started, so only removed
    assert_eq!(
        manager.runtime().ops().last(),
        Some(&RuntimeOp::Remove(info.container_id.expect("id")))
    );
}

#[test]
fn test_destroy_force_skips_collaborator() {
    let t = TestHome::new();
    let manager = t.manager();
    create(&manager, &t.workspace);

    let asked = Cell::new(false);
    let never = |_: &str| {
        asked.set(true);
        false
    };
    manager
        .destroy(&SandboxTarget::Workspace(t.workspace.clone()), true, Some(&never))
        .expect("forced");
    assert!(!asked.get());
}

// =============================================================================
// Listing and Resolution Tests
// =============================================================================

#[test]
fn test_list_includes_running_and_stopped() {
    let t = TestHome::new();
    let manager = t.manager();
    let a = create(&manager, &t.project("alpha"));
    let b = create(&manager, &t.project("beta"));
    manager
        .attach(&SandboxTarget::Name(a.name.clone()))
        .expect("attach");

    let mut statuses: Vec<(String, SandboxStatus)> = manager
        .list()
        .expect("list")
        .into_iter()
        .map(|s| {
            let status = manager.status_of(&s).expect("status");
            (s.name, status)
        })
        .collect();
    statuses.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(
        statuses,
        vec![(a.name, SandboxStatus::Running), (b.name, SandboxStatus::Stopped)]
    );
}

#[test]
fn test_resolve_query() {
    let t = TestHome::new();
    let manager = t.manager();
    let app = create(&manager, &t.project("app"));
    let webapp = create(&manager, &t.project("webapp"));
    create(&manager, &t.project("backend"));

    // Dirname-exact beats dirname-contains
    let matches = manager.find_sandboxes("app").expect("find");
    assert_eq!(matches[0].name, app.name);
    assert_eq!(matches[1].name, webapp.name);

    let err = manager.resolve_query("app").expect_err("ambiguous");
    match err {
        SandboxError::AmbiguousMatch { candidates, .. } => assert_eq!(candidates.len(), 2),
        other => panic!("expected AmbiguousMatch, got {other:?}"),
    }

    assert_eq!(manager.resolve_query("web").expect("unique").name, webapp.name);
    assert_eq!(manager.resolve_query(&app.name).expect("exact").name, app.name);
    assert!(matches!(
        manager.resolve_query("zzz"),
        Err(SandboxError::NotFound { .. })
    ));
}

// =============================================================================
// Image and Shell Config Tests
// =============================================================================

#[test]
fn test_default_image_built_from_context() {
    let t = TestHome::new();
    let context = TempDir::new().expect("failed to create temp dir");
    fs::write(context.path().join("Dockerfile"), "FROM debian\n").expect("write");
    let config = t.config().with_build_context(context.path());
    let manager = SandboxManager::new(config, InMemoryRuntime::new()).expect("reachable");

    manager
        .create(&t.workspace, &CreateOptions::default(), None)
        .expect("create");

    let ops = manager.runtime().ops();
    assert_eq!(ops[0], RuntimeOp::Build(String::from(DEFAULT_IMAGE_NAME)));
    assert!(matches!(ops[1], RuntimeOp::Create(_)));

    // Built once, reused afterwards
    manager
        .create(&t.project("other"), &CreateOptions::default(), None)
        .expect("create");
    let builds = manager
        .runtime()
        .ops()
        .iter()
        .filter(|op| matches!(op, RuntimeOp::Build(_)))
        .count();
    assert_eq!(builds, 1);
}

#[test]
fn test_image_override_that_cannot_be_pulled() {
    let t = TestHome::new();
    let manager = t.manager();

    let options = CreateOptions::default().with_image("ghcr.io/nobody/nothing:1");
    let err = manager
        .create(&t.workspace, &options, None)
        .expect_err("pull fails");
    assert!(matches!(err, SandboxError::ImageUnavailable { ref image, .. } if image == "ghcr.io/nobody/nothing:1"));
    assert!(manager.runtime().create_requests().is_empty());
}

#[test]
fn test_shell_configs_seeded_and_mounted() {
    let t = TestHome::new();
    let defaults = TempDir::new().expect("failed to create temp dir");
    fs::write(defaults.path().join("zshrc"), "# zsh\n").expect("write");
    fs::write(defaults.path().join("starship.toml"), "add_newline = false\n").expect("write");
    fs::create_dir(defaults.path().join("nvim")).expect("mkdir");
    fs::write(defaults.path().join("nvim/init.lua"), "-- nvim\n").expect("write");

    let config = t.config().with_default_configs_dir(defaults.path());
    let shell_dir = config.shell_config_dir.clone();
    let manager = t.manager_with(config);

    manager
        .create(&t.workspace, &CreateOptions::default(), None)
        .expect("create");

    assert!(shell_dir.join("zshrc").is_file());
    assert!(shell_dir.join("nvim/init.lua").is_file());

    let request = &manager.runtime().create_requests()[0];
    let targets: Vec<_> = request
        .mounts
        .iter()
        .map(|m| (m.container_path.display().to_string(), m.read_only))
        .collect();
    assert_eq!(
        targets,
        vec![
            (String::from(WORKSPACE_MOUNT_POINT), false),
            (String::from("/home/sandbox/.zshrc"), true),
            (String::from("/home/sandbox/.config/starship.toml"), true),
            (String::from("/home/sandbox/.config/nvim"), false),
        ]
    );
}
