//! sshlink - open `sshlink://` URLs in a terminal
//!
//! sshlink is the handler behind `sshlink://user@host:port` links. It
//! resolves the link to an SSH target and opens a new terminal window or
//! tab running `ssh` against it.
//!
//! # Features
//!
//! - **Many terminals**: Terminal.app, iTerm2, Warp, kitty, Alacritty,
//!   WezTerm, GNOME Terminal, Konsole, xterm, cmd and Windows Terminal
//! - **Custom terminals**: declare more in `terminals.toml`
//! - **Installer**: registers the URL scheme handler on Linux desktops
//!
//! # Quick Start
//!
//! ```text
//! sshlink --install --terminal=kitty    # register, use kitty by default
//! sshlink sshlink://user@example.com    # what the browser runs
//! sshlink --list                        # terminals known on this OS
//! sshlink --uninstall
//! ```
//!
//! Set `SSHLINK_LOG=debug` for more detail in the log file.

mod config;
mod install;
mod launch;
mod link;
mod shell;
mod terminal;

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::custom::{CustomTerminal, CustomTerminals};
use crate::config::{PreferenceStore, Preferences};
use crate::install::Installer;
use crate::terminal::registry::DEFAULT_TERMINAL;
use crate::terminal::{Platform, Registry};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Flags older releases accepted with a single dash
const LEGACY_FLAGS: &[&str] = &["install", "uninstall", "terminal", "list", "version", "help"];

#[derive(Parser, Debug)]
#[command(
    name = "sshlink",
    about = "Open sshlink:// URLs in your terminal",
    disable_version_flag = true
)]
struct Cli {
    /// Register sshlink as the sshlink:// handler
    #[arg(long, conflicts_with_all = ["uninstall", "list"])]
    install: bool,

    /// Remove the handler registration and preferences
    #[arg(long, conflicts_with = "list")]
    uninstall: bool,

    /// Terminal to use (see --list)
    #[arg(long, value_name = "NAME")]
    terminal: Option<String>,

    /// List the terminals available on this system
    #[arg(long)]
    list: bool,

    /// Print the version
    #[arg(long)]
    version: bool,

    /// URL to open, e.g. sshlink://user@host:22
    url: Option<String>,
}

/// Rewrite `-install`, `-terminal=kitty` and friends to their `--` form
fn normalize_legacy_flags<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut end_of_flags = false;
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 || end_of_flags || arg.starts_with("--") || !arg.starts_with('-') {
                end_of_flags |= arg == "--";
                return arg;
            }
            let name = arg[1..].split('=').next().unwrap_or_default();
            if LEGACY_FLAGS.contains(&name) {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

fn init_logging() {
    let log_path = dirs::cache_dir()
        .map(|dir| dir.join("sshlink").join("sshlink.log"))
        .unwrap_or_else(|| env::temp_dir().join("sshlink.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter =
            EnvFilter::try_from_env("SSHLINK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// What `run` needs from the machine it is running on
struct Environment {
    platform: Platform,
    store: Option<PreferenceStore>,
    custom: Vec<CustomTerminal>,
    applications_dir: Option<PathBuf>,
    executable: Option<PathBuf>,
}

impl Environment {
    fn current() -> Self {
        let platform = Platform::current();
        Self {
            platform,
            store: PreferenceStore::for_platform(platform),
            custom: CustomTerminals::load().terminals,
            applications_dir: dirs::data_dir().map(|dir| dir.join("applications")),
            executable: env::current_exe().ok(),
        }
    }

    fn registry(&self, shell: String) -> Registry {
        Registry::new(self.platform, shell).with_custom(self.custom.clone())
    }

    fn installer(&self) -> anyhow::Result<Installer> {
        let store = self
            .store
            .clone()
            .context("Could not determine the preferences location")?;
        let executable = self
            .executable
            .clone()
            .context("Failed to get executable path")?;
        Ok(Installer::new(
            self.platform,
            store,
            self.applications_dir.clone(),
            executable,
        ))
    }
}

/// Dispatch one invocation. Returns the process exit code.
fn run(
    cli: Cli,
    environment: &Environment,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> anyhow::Result<u8> {
    if cli.version {
        writeln!(out, "sshlink {}", VERSION)?;
        return Ok(0);
    }

    if cli.list {
        let registry = environment.registry(shell::detect_user_shell());
        writeln!(out, "Terminals available on {}:", environment.platform)?;
        for name in registry.names() {
            writeln!(out, "  {}", name)?;
        }
        return Ok(0);
    }

    // Action flags win over a URL given alongside them
    if cli.install {
        let registry = environment.registry(shell::detect_user_shell());
        let terminal = cli.terminal.as_deref().unwrap_or(DEFAULT_TERMINAL);
        environment.installer()?.install(&registry, terminal)?;
        return Ok(0);
    }

    if cli.uninstall {
        environment.installer()?.uninstall()?;
        return Ok(0);
    }

    let Some(url) = cli.url else {
        writeln!(err, "{}", Cli::command().render_usage())?;
        writeln!(err, "Use --help for more information")?;
        return Ok(1);
    };

    let prefs = environment
        .store
        .as_ref()
        .map(PreferenceStore::load)
        .unwrap_or_else(Preferences::default);
    let registry = environment.registry(shell::effective_shell(prefs.shell.as_deref()));

    let target = launch::launch(&url, cli.terminal.as_deref(), &prefs, &registry)?;
    info!("Opened session to {}", target);
    Ok(0)
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_legacy_flags(env::args()));

    init_logging();
    info!(
        "sshlink {} starting (args: {:?})",
        VERSION,
        env::args().skip(1).collect::<Vec<_>>()
    );

    let environment = Environment::current();
    match run(cli, &environment, &mut io::stdout(), &mut io::stderr()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
