//! sb - per-workspace Docker development sandboxes for coding agents.
//!
//! Every workspace directory maps to exactly one sandbox container with a
//! deterministic name such as `sb-my-app-1a2b3c4d`. The container mounts the
//! workspace read-write, the agent and shell configuration from the host home,
//! and any extra paths read-only, and runs as the invoking user's uid/gid.
//!
//! # Layout
//!
//! - [`manager`]: the create/attach/stop/destroy lifecycle
//! - [`sandbox`]: naming, fuzzy matching, mount plans, environment, safety checks
//! - [`runtime`]: the container engine interface and its Docker implementation
//! - [`settings`]: `~/.config/sb/config.toml`
//! - [`shell`] and [`display`]: terminal collaborators used by the `sb` binary
//!
//! # Example
//!
//! ```no_run
//! use sb::manager::{CreateOptions, SandboxManager, SandboxTarget};
//! use sb::runtime::DockerRuntime;
//! use sb::sandbox::SandboxConfig;
//!
//! fn main() -> miette::Result<()> {
//!     let manager = SandboxManager::new(SandboxConfig::default(), DockerRuntime::connect()?)?;
//!
//!     let workspace = std::env::current_dir().expect("cwd");
//!     let sandbox = manager.create(&workspace, &CreateOptions::default().with_force(true), None)?;
//!     println!("Created {}", sandbox.name);
//!
//!     let container = manager.attach(&SandboxTarget::Name(sandbox.name))?;
//!     println!("Running as {}", container.id);
//!     Ok(())
//! }
//! ```

pub mod display;
pub mod error;
pub mod manager;
pub mod paths;
pub mod runtime;
pub mod sandbox;
pub mod settings;
pub mod shell;

// Re-export commonly used types
pub use error::{Result, RuntimeError, SandboxError};
pub use manager::{CreateOptions, SandboxInfo, SandboxManager, SandboxStatus, SandboxTarget};
pub use sandbox::SandboxConfig;
