//! Building blocks for sandbox containers.
//!
//! - [`naming`]: deterministic `sb-{dirname}-{hash}` identities
//! - [`matching`]: fuzzy resolution of partial names
//! - [`mounts`]: ordered bind-mount plans
//! - [`security`]: sensitive workspace detection
//! - [`environment`]: container environment composition
//! - [`shell_config`]: seeding of the mounted shell configuration
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use sb::sandbox::naming::{dirname_of, generate_name_for_absolute};
//!
//! let name = generate_name_for_absolute(Path::new("/home/user/projects/my-app"));
//! assert!(name.starts_with("sb-my-app-"));
//! assert_eq!(dirname_of(&name), "my-app");
//! ```

mod config;
pub mod environment;
pub mod matching;
pub mod mounts;
pub mod naming;
pub mod security;
pub mod shell_config;

pub use config::{DEFAULT_IMAGE_NAME, SandboxConfig};
pub use environment::Environment;
pub use mounts::{FIXED_MOUNTS, MountPlanner, MountSpec, WORKSPACE_MOUNT_POINT};
pub use security::SensitiveDirGuard;
