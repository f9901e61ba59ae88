//! Error types for sandbox management.
//!
//! Uses thiserror for deriving std::error::Error and miette for rich diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use crate::manager::SandboxInfo;

/// Errors returned by [`SandboxManager`](crate::manager::SandboxManager) operations.
#[derive(Error, Debug, Diagnostic)]
pub enum SandboxError {
    /// No sandbox exists for the requested name or workspace.
    #[error("{message}")]
    #[diagnostic(code(sb::not_found), help("{hint}"))]
    NotFound { message: String, hint: String },

    /// A fuzzy query matched several sandboxes and none exactly.
    #[error("{}", format_ambiguous(.query, .candidates))]
    #[diagnostic(
        code(sb::ambiguous_match),
        help("Use the full sandbox name or a more specific query.")
    )]
    AmbiguousMatch {
        query: String,
        candidates: Vec<SandboxInfo>,
    },

    /// The target identity already has a container.
    #[error("Sandbox '{name}' already exists")]
    #[diagnostic(code(sb::already_exists), help("Use --force to recreate it."))]
    AlreadyExists { name: String },

    /// The user declined a confirmation prompt.
    #[error("{action} cancelled by user")]
    #[diagnostic(code(sb::cancelled))]
    UserCancelled { action: String },

    /// A destructive action needs confirmation but nobody can be asked.
    #[error("Destroying sandbox '{name}' requires confirmation")]
    #[diagnostic(
        code(sb::confirmation_required),
        help("Use --force to destroy without confirmation.")
    )]
    ConfirmationRequired { name: String },

    /// The workspace is a sensitive host directory and was not confirmed.
    #[error("Workspace '{path}' is a sensitive directory")]
    #[diagnostic(
        code(sb::sensitive_directory),
        help("Use --force to override, or pick a project directory instead.")
    )]
    SensitiveDirectoryDeclined { path: String },

    /// The workspace path cannot back a sandbox.
    #[error("Invalid workspace '{path}': {reason}")]
    #[diagnostic(code(sb::invalid_workspace))]
    InvalidWorkspace { path: String, reason: String },

    /// The container runtime is unreachable, or a record lost its container.
    #[error("{0}")]
    #[diagnostic(
        code(sb::runtime_unavailable),
        help("Check that Docker is running, or recreate the sandbox.")
    )]
    RuntimeUnavailable(String),

    /// The sandbox image could not be found, pulled or built.
    #[error("Image '{image}' is unavailable: {reason}")]
    #[diagnostic(code(sb::image_unavailable))]
    ImageUnavailable { image: String, reason: String },

    /// Any other container runtime failure.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Runtime(#[from] RuntimeError),

    /// I/O error
    #[error("I/O error: {context}")]
    #[diagnostic(code(sb::io))]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl SandboxError {
    /// Builds a not-found error for an explicit sandbox name.
    #[must_use]
    pub fn not_found_name(name: &str) -> Self {
        Self::NotFound {
            message: format!("Sandbox '{name}' not found"),
            hint: String::from("Run `sb list` to see existing sandboxes."),
        }
    }

    /// Builds a not-found error for a workspace without a sandbox.
    #[must_use]
    pub fn not_found_workspace(workspace: &str) -> Self {
        Self::NotFound {
            message: format!("No sandbox found for workspace '{workspace}'"),
            hint: String::from("Use `sb create` to create one."),
        }
    }
}

fn format_ambiguous(query: &str, candidates: &[SandboxInfo]) -> String {
    let mut lines = vec![format!("Multiple sandboxes match '{query}':")];
    for sandbox in candidates {
        lines.push(format!("  {}  ({})", sandbox.name, sandbox.workspace));
    }
    lines.join("\n")
}

/// Errors raised by a [`ContainerRuntime`](crate::runtime::ContainerRuntime) implementation.
#[derive(Error, Debug, Diagnostic)]
pub enum RuntimeError {
    /// The runtime daemon could not be reached.
    #[error("Failed to connect to the container runtime: {0}")]
    #[diagnostic(code(sb::runtime::connection), help("Is Docker running?"))]
    Connection(String),

    /// A runtime API call failed.
    #[error("{operation} failed: {message}")]
    #[diagnostic(code(sb::runtime::api))]
    Api { operation: String, message: String },

    /// Local I/O while preparing a runtime request.
    #[error("{context}")]
    #[diagnostic(code(sb::runtime::io))]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    pub(crate) fn api(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, SandboxError>;
