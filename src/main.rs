//! sb - Entry Point
//!
//! Command-line front end for the sandbox manager.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, fmt};

use sb::display;
use sb::manager::{Confirmation, CreateOptions, SandboxManager, SandboxTarget};
use sb::paths;
use sb::runtime::{Container, DockerRuntime};
use sb::sandbox::SandboxConfig;
use sb::settings::{self, Overrides, Settings};
use sb::shell;

/// Bundled image assets of a source checkout: the Dockerfile and, under
/// `configs/`, the shell configuration seeded into `~/.config/sb`.
const DEFAULT_DOCKER_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/docker");

/// sb: Docker sandbox tool for coding agents.
#[derive(Parser, Debug)]
#[command(name = "sb", author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file [default: ~/.config/sb/config.toml]
    #[arg(long, global = true, value_name = "PATH", env = "SB_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the built-in image's Dockerfile and `configs/`
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "SB_DOCKER_DIR",
        default_value = DEFAULT_DOCKER_DIR
    )]
    docker_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new sandbox for the current directory
    #[command(visible_alias = "c")]
    Create {
        /// Explicit sandbox name (auto-generated if not provided)
        #[arg(short, long)]
        name: Option<String>,

        /// Recreate the sandbox if it already exists
        #[arg(short, long)]
        force: bool,

        /// Attach to the sandbox after creation
        #[arg(short, long)]
        attach: bool,

        /// Additional read-only mount (repeatable)
        #[arg(long = "mount", value_name = "PATH")]
        mounts: Vec<PathBuf>,

        /// Environment variable to pass (VAR or VAR=value, repeatable)
        #[arg(long = "env", value_name = "VAR[=VALUE]")]
        env: Vec<String>,

        /// Override the Docker image to use
        #[arg(long)]
        image: Option<String>,
    },

    /// Attach to a sandbox (auto-starts if stopped)
    #[command(visible_alias = "a")]
    Attach {
        /// Full or partial sandbox name (defaults to the current directory)
        name: Option<String>,
    },

    /// Stop a running sandbox
    Stop {
        /// Full or partial sandbox name (defaults to the current directory)
        name: Option<String>,
    },

    /// Remove a sandbox completely
    #[command(visible_alias = "d")]
    Destroy {
        /// Full or partial sandbox name (defaults to the current directory)
        name: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// List all sandboxes with status
    List,
}

/// Asks on the terminal, defaulting to "no".
struct TerminalConfirm;

impl Confirmation for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    debug!("sb v{}", env!("CARGO_PKG_VERSION"));

    let home = paths::home_dir().ok_or_else(|| miette!("Cannot determine the home directory"))?;
    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(|| settings::default_path(&home));
    let settings = Settings::load(&settings_path, &home);

    let overrides = match &args.command {
        Command::Create {
            mounts, env, image, ..
        } => Overrides {
            mounts: mounts.clone(),
            env: env.clone(),
            image: image.clone(),
        },
        _ => Overrides::default(),
    };
    let base = SandboxConfig::new()
        .with_home_dir(&home)
        .with_build_context(&args.docker_dir)
        .with_default_configs_dir(args.docker_dir.join("configs"));
    let merged = settings.merge(base, overrides);

    let manager = SandboxManager::new(merged.config, DockerRuntime::connect()?)?;
    let cwd = std::env::current_dir().into_diagnostic()?;

    // Prompts need a terminal; without one, risky actions fail instead of hanging
    let terminal = TerminalConfirm;
    let confirm: Option<&dyn Confirmation> = std::io::stdin()
        .is_terminal()
        .then_some(&terminal as &dyn Confirmation);

    match args.command {
        Command::Create {
            name,
            force,
            attach,
            ..
        } => {
            let options = CreateOptions {
                name,
                force,
                image: merged.image,
                ..Default::default()
            };
            let sandbox = manager.create(&cwd, &options, confirm)?;
            println!(
                "Created sandbox '{}' for workspace '{}'",
                sandbox.name, sandbox.workspace
            );

            if attach {
                let container = manager.attach(&SandboxTarget::Name(sandbox.name.clone()))?;
                println!("Attached to sandbox '{}'", sandbox.name);
                return run_shell(&manager, &container);
            }
        }
        Command::Attach { name } => {
            let target = resolve_target(&manager, name, &cwd)?;
            let container = manager.attach(&target)?;
            let label = match &target {
                SandboxTarget::Name(name) => name.clone(),
                SandboxTarget::Workspace(_) => container.name.clone(),
            };
            println!("Attached to sandbox '{label}'");
            return run_shell(&manager, &container);
        }
        Command::Stop { name } => {
            let target = resolve_target(&manager, name, &cwd)?;
            let sandbox = manager.stop(&target)?;
            println!("Stopped sandbox '{}'.", sandbox.name);
        }
        Command::Destroy { name, force } => {
            let target = resolve_target(&manager, name, &cwd)?;
            let sandbox = manager.destroy(&target, force, confirm)?;
            println!("Destroyed sandbox '{}'.", sandbox.name);
        }
        Command::List => {
            let sandboxes = manager.list()?;
            if sandboxes.is_empty() {
                println!("No sandboxes found. Use 'sb create' to create one.");
            } else {
                let mut rows = Vec::with_capacity(sandboxes.len());
                for sandbox in sandboxes {
                    let status = manager.status_of(&sandbox)?;
                    rows.push((sandbox, status));
                }
                println!("{}", display::render_table(&rows));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// A name resolves through fuzzy matching; no name means the current workspace.
fn resolve_target(
    manager: &SandboxManager<DockerRuntime>,
    name: Option<String>,
    cwd: &Path,
) -> Result<SandboxTarget> {
    Ok(match name {
        Some(query) => SandboxTarget::Name(manager.resolve_query(&query)?.name),
        None => SandboxTarget::Workspace(cwd.to_path_buf()),
    })
}

fn run_shell(manager: &SandboxManager<DockerRuntime>, container: &Container) -> Result<ExitCode> {
    let (uid, gid) = manager.host_ids();
    let status = shell::interactive_command(&container.id, uid, gid)
        .status()
        .into_diagnostic()?;
    debug!(?status, "Shell exited");

    let code = status.code().unwrap_or(1);
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
