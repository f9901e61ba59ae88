//! Interactive shell sessions inside a sandbox.
//!
//! Attaching hands the terminal to `docker exec`, which deals with TTY
//! resizing and signal forwarding far better than an API stream would.

use std::process::Command;

/// Shell started inside the container.
pub const SHELL: &str = "/bin/zsh";

/// Builds `docker exec -it --user {uid}:{gid} {container_id} /bin/zsh`.
///
/// Running as the host uid/gid keeps files created in the workspace owned by
/// the invoking user.
#[must_use]
pub fn interactive_command(container_id: &str, uid: u32, gid: u32) -> Command {
    let user = format!("{uid}:{gid}");
    let mut command = Command::new("docker");
    command.args(["exec", "-it", "--user", user.as_str(), container_id, SHELL]);
    command
}
