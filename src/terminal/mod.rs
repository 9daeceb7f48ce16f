//! Terminal applications that can open an SSH session.
//!
//! This module provides:
//!
//! - **invocation**: Pure launch plans (program, arguments, spawn mode) and
//!   their execution
//! - **app**: `TerminalApp`, the concrete terminal built from a `TerminalKind`
//! - **registry**: Per-OS name → terminal tables and the `TerminalFactory`
//!   used by the launcher
//!
//! # Terminal kinds
//!
//! ```text
//! Scriptable       AppleScript via osascript (Terminal.app, iTerm)
//! ClipboardRelay   copy "ssh target" to the clipboard, open the app (Warp)
//! Generic          <program> <prefix..> ssh <target>
//! ShellWrapped     <program> <prefix..> <shell> -c "ssh <target>; exec <shell>"
//! CommandPrompt    cmd /c start cmd /k ssh <target>   (cmd metacharacters refused)
//! WindowsTerminal  wt new-tab ssh <target>            (`;` escaped as `\;`)
//! ```

pub mod app;
pub mod invocation;
pub mod registry;

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

use crate::link::ConnectionTarget;

pub use app::{ScriptFlavor, TerminalApp, TerminalKind};
pub use invocation::{Invocation, LaunchPlan, SpawnMode};
pub use registry::{Platform, Registry, TerminalFactory};

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("unsupported terminal: {0}")]
    UnsupportedTerminal(String),

    #[error("unsupported operating system: {0}")]
    UnsupportedOs(String),

    #[error("failed to launch {terminal}: {source}")]
    LaunchFailed {
        terminal: String,
        #[source]
        source: io::Error,
    },

    #[error("{terminal} cannot safely open {target:?}: it contains characters the terminal would interpret")]
    UnsafeTarget { terminal: String, target: String },

    #[error("{terminal} exited with {status}: {stderr}")]
    ExitStatus {
        terminal: String,
        status: ExitStatus,
        stderr: String,
    },
}

pub type Result<T> = std::result::Result<T, TerminalError>;

/// Something that can open an SSH session to a target
pub trait Terminal {
    /// Open a new session connected to `target`
    fn open(&self, target: &ConnectionTarget) -> Result<()>;

    /// Human readable terminal name
    fn name(&self) -> &str;

    /// Best-effort check that the application is installed.
    ///
    /// Advisory only: `open` is attempted regardless.
    fn is_available(&self) -> bool;
}
